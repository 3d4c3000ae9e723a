//! Error handling for the ledger
//!
//! Every fallible operation returns [`Result`]. Store and encoding failures abort the
//! current operation; `InsufficientFunds` and `InvalidBlock` are expected conditions
//! callers are meant to handle.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// A chain is already persisted at the requested location
    AlreadyExists(String),
    /// No chain persisted, or a key the chain refers to is missing
    NotFound(String),
    /// Stored block bytes could not be decoded
    CorruptBlockData(String),
    /// Spend exceeds what the address can unlock
    InsufficientFunds { required: u64, available: u64 },
    /// Block failed proof-of-work or structural validation
    InvalidBlock(String),
    /// Key-value store errors
    Database(String),
    /// Encoding errors outside of block decoding
    Serialization(String),
    /// Transaction construction or validation errors
    Transaction(String),
    InvalidAddress(String),
    Crypto(String),
    Wallet(String),
    Config(String),
    Io(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::AlreadyExists(msg) => write!(f, "Already exists: {msg}"),
            BlockchainError::NotFound(msg) => write!(f, "Not found: {msg}"),
            BlockchainError::CorruptBlockData(msg) => write!(f, "Corrupt block data: {msg}"),
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}
