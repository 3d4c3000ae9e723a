//! # Minichain
//!
//! A single-node proof-of-work ledger with a UTXO value model.
//!
//! ## Layout
//! - `core/`: blocks, transactions, proof-of-work, ownership proofs, the ledger and
//!   unspent-output queries
//! - `storage/`: the byte key-value store the ledger persists into (sled)
//! - `wallet/`: P-256 key pairs and base58 addresses for signature-based ownership
//! - `config/`: TOML file plus environment overrides
//! - `utils/`: digests, base58, ECDSA helpers and the bincode codec
//! - `cli/`: command-line parsing for the binary
//!
//! Blocks are stored under their own hash, with a reserved key pointing at the tip.
//! Balances are computed by walking the chain from the tip back to genesis, so they
//! always reflect exactly what is persisted.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::{Command, Opt};
pub use config::{Config, OwnershipMode};
pub use core::{
    AddressOwnership, Block, ChainReport, EcdsaOwnership, Ledger, LedgerIterator,
    OwnershipProof, ProofOfWork, TXInput, TXOutput, Transaction, UTXOSet, COINBASE_REWARD,
    GENESIS_DATA,
};
pub use error::{BlockchainError, Result};
pub use storage::KvStore;
pub use utils::{base58_decode, base58_encode, ripemd160_digest, sha256_digest};
pub use wallet::{
    convert_address, hash_pub_key, validate_address, Wallet, Wallets, ADDRESS_CHECK_SUM_LEN,
};
