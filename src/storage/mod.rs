//! Data storage and persistence
//!
//! The ledger treats its store as an opaque byte key-value map with one atomic
//! read-compare-write primitive.

pub mod kv_store;

pub use kv_store::KvStore;
