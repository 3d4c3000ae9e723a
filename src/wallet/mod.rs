//! Key management for the signature-based ownership proof
//!
//! Wallets hold ECDSA P-256 key pairs and derive base58check addresses from them.

pub mod wallet;
pub mod wallets;

pub use wallet::{convert_address, hash_pub_key, validate_address, Wallet, ADDRESS_CHECK_SUM_LEN};
pub use wallets::{Wallets, WALLET_FILE};
