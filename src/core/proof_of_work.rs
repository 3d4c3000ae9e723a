use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::debug;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

/// Difficulty used when the configuration does not set one.
pub const DEFAULT_DIFFICULTY: u32 = 12;

/// Largest meaningful difficulty for a 256-bit digest.
pub const MAX_DIFFICULTY: u32 = 256;

/// Hashcash-style puzzle: find a nonce whose block hash, read as a big-endian
/// integer, is below `2^(256 - difficulty)`.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    target: BigInt,
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<ProofOfWork> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "Difficulty {difficulty} exceeds maximum of {MAX_DIFFICULTY}"
            )));
        }

        let mut target = BigInt::from(1);
        target.shl_assign(MAX_DIFFICULTY - difficulty);
        Ok(ProofOfWork { target, difficulty })
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_target(&self) -> &BigInt {
        &self.target
    }

    fn prepare_data(&self, pre_block_hash: &[u8], tx_digest: &[u8], nonce: u64) -> Vec<u8> {
        let mut data_bytes = vec![];
        data_bytes.extend_from_slice(pre_block_hash);
        data_bytes.extend_from_slice(tx_digest);
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes.extend(u64::from(self.difficulty).to_be_bytes());
        data_bytes
    }

    pub fn hash_with_nonce(&self, pre_block_hash: &[u8], tx_digest: &[u8], nonce: u64) -> Vec<u8> {
        sha256_digest(&self.prepare_data(pre_block_hash, tx_digest, nonce))
    }

    pub fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    /// Searches nonces upward from zero and returns the first that meets the target,
    /// along with its hash. There is no iteration cap.
    pub fn run(&self, pre_block_hash: &[u8], tx_digest: &[u8]) -> (u64, Vec<u8>) {
        self.run_from(pre_block_hash, tx_digest, 0)
    }

    // The nonce space wraps around after u64::MAX.
    fn run_from(&self, pre_block_hash: &[u8], tx_digest: &[u8], start: u64) -> (u64, Vec<u8>) {
        let mut nonce = start;
        loop {
            let hash = self.hash_with_nonce(pre_block_hash, tx_digest, nonce);
            if self.meets_target(&hash) {
                debug!(
                    "Found nonce {nonce} at difficulty {}: {}",
                    self.difficulty,
                    HEXLOWER.encode(&hash)
                );
                return (nonce, hash);
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    /// Recomputes the block hash from its own nonce. Never errors: any mismatch,
    /// including a transaction set that cannot be digested, is simply `false`.
    pub fn validate(&self, block: &Block) -> bool {
        let tx_digest = match block.hash_transactions() {
            Ok(digest) => digest,
            Err(_) => return false,
        };
        let hash = self.hash_with_nonce(block.get_pre_block_hash(), &tx_digest, block.get_nonce());
        self.meets_target(&hash) && hash.as_slice() == block.get_hash()
    }
}
