use crate::error::{BlockchainError, Result};
use crate::utils::{base58_decode, base58_encode, new_key_pair, ripemd160_digest, sha256_digest};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

/// A P-256 key pair. The PKCS#8 secret is wiped when the wallet is dropped.
#[derive(
    Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode, Zeroize, ZeroizeOnDrop,
)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    #[zeroize(skip)]
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng)
            .map_err(|e| BlockchainError::Crypto(format!("Invalid PKCS#8 key: {e}")))?;
        let public_key = key_pair.public_key().as_ref().to_vec();
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_address(&self) -> String {
        convert_address(&hash_pub_key(&self.public_key))
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}

pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    ripemd160_digest(&sha256_digest(pub_key))
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let second_sha = sha256_digest(&sha256_digest(payload));
    second_sha[..ADDRESS_CHECK_SUM_LEN].to_vec()
}

/// version + pub_key_hash + checksum, base58 encoded
pub fn convert_address(pub_key_hash: &[u8]) -> String {
    let mut payload = vec![VERSION];
    payload.extend_from_slice(pub_key_hash);
    let checksum = checksum(&payload);
    payload.extend(checksum);
    base58_encode(&payload)
}

pub fn validate_address(address: &str) -> bool {
    let payload = match base58_decode(address) {
        Ok(payload) => payload,
        Err(_) => return false,
    };
    if payload.len() < ADDRESS_CHECK_SUM_LEN + 1 {
        return false;
    }

    let (body, actual_checksum) = payload.split_at(payload.len() - ADDRESS_CHECK_SUM_LEN);
    body[0] == VERSION && checksum(body) == actual_checksum
}
