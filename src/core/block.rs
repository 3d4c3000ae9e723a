use crate::core::{ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize_exact, serialize, sha256_digest, DIGEST_LEN};
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};

/// Unlock data embedded in the genesis coinbase.
pub const GENESIS_DATA: &str = "First Transaction from Genesis";

// Field order is the on-disk encoding order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
    pre_block_hash: Vec<u8>, // Empty only for genesis
    nonce: u64,
}

impl Block {
    /// Assembles a block over `transactions` and mines it against `pre_block_hash`.
    pub fn new_block(
        pre_block_hash: Vec<u8>,
        transactions: &[Transaction],
        pow: &ProofOfWork,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }
        if let Some(tx) = transactions
            .iter()
            .find(|tx| tx.get_id().len() != DIGEST_LEN)
        {
            return Err(BlockchainError::Transaction(format!(
                "Transaction has no id set ({} inputs, {} outputs)",
                tx.get_vin().len(),
                tx.get_vout().len()
            )));
        }

        let mut block = Block {
            hash: vec![],
            transactions: transactions.to_vec(),
            pre_block_hash,
            nonce: 0,
        };

        let tx_digest = block.hash_transactions()?;
        info!(
            "Starting proof-of-work over {} transactions at difficulty {}",
            block.transactions.len(),
            pow.get_difficulty()
        );
        let (nonce, hash) = pow.run(&block.pre_block_hash, &tx_digest);
        block.nonce = nonce;
        block.hash = hash;
        info!(
            "Proof-of-work completed for block {} (nonce {nonce})",
            HEXLOWER.encode(&block.hash)
        );

        Ok(block)
    }

    pub fn generate_genesis_block(coinbase: &Transaction, pow: &ProofOfWork) -> Result<Block> {
        Block::new_block(vec![], std::slice::from_ref(coinbase), pow)
    }

    /// SHA-256 over the concatenated transaction ids, in block order.
    pub fn hash_transactions(&self) -> Result<Vec<u8>> {
        if self.transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Block has no transactions to digest".to_string(),
            ));
        }
        let mut txhashs = vec![];
        for transaction in &self.transactions {
            txhashs.extend_from_slice(transaction.get_id());
        }
        Ok(sha256_digest(&txhashs))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Decodes a stored block, rejecting anything that is not a complete, well-formed
    /// encoding.
    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        let block: Block = deserialize_exact(bytes)
            .map_err(|e| BlockchainError::CorruptBlockData(e.to_string()))?;

        if block.hash.len() != DIGEST_LEN {
            return Err(BlockchainError::CorruptBlockData(format!(
                "block hash is {} bytes, expected {DIGEST_LEN}",
                block.hash.len()
            )));
        }
        if !block.pre_block_hash.is_empty() && block.pre_block_hash.len() != DIGEST_LEN {
            return Err(BlockchainError::CorruptBlockData(format!(
                "previous hash is {} bytes, expected 0 or {DIGEST_LEN}",
                block.pre_block_hash.len()
            )));
        }
        if block.transactions.is_empty() {
            return Err(BlockchainError::CorruptBlockData(
                "block has no transactions".to_string(),
            ));
        }
        Ok(block)
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    #[cfg(test)]
    pub(crate) fn with_nonce(&self, nonce: u64) -> Block {
        Block {
            nonce,
            ..self.clone()
        }
    }
}
