//! Core ledger functionality
//!
//! Blocks, transactions, proof-of-work, ownership proofs, the persisted chain,
//! and unspent-output queries over it.

pub mod block;
pub mod ledger;
pub mod ownership;
pub mod proof_of_work;
pub mod transaction;
pub mod utxo_set;

pub use block::{Block, GENESIS_DATA};
pub use ledger::{ChainReport, Ledger, LedgerIterator};
pub use ownership::{AddressOwnership, EcdsaOwnership, OwnershipProof};
pub use proof_of_work::{ProofOfWork, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
pub use transaction::{TXInput, TXOutput, Transaction, COINBASE_OUTPUT_INDEX, COINBASE_REWARD};
pub use utxo_set::UTXOSet;
