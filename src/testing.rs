//! Helpers shared by unit tests

use crate::core::{AddressOwnership, Ledger};
use std::sync::Arc;
use tempfile::TempDir;

/// Low enough that mining is effectively instant.
pub const TEST_DIFFICULTY: u32 = 4;

/// A fresh address-ownership ledger whose genesis pays `genesis_address`.
/// Keep the returned directory alive for as long as the ledger is used.
pub fn address_ledger(genesis_address: &str) -> (TempDir, Ledger) {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::create_with_path(
        &dir.path().join("blocks"),
        genesis_address,
        TEST_DIFFICULTY,
        Arc::new(AddressOwnership),
    )
    .unwrap();
    (dir, ledger)
}
