use crate::error::{BlockchainError, Result};
use sled::transaction::TransactionError;
use sled::{Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";

/// Byte-keyed store over a single sled tree.
///
/// Clones share the same underlying database. sled flushes when the last handle is
/// dropped; [`KvStore::flush`] forces it earlier.
#[derive(Clone)]
pub struct KvStore {
    db: Db,
    tree: Tree,
}

impl KvStore {
    pub fn open(path: &Path) -> Result<KvStore> {
        let db = sled::open(path)
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let tree = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))?;
        Ok(KvStore { db, tree })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .tree
            .get(key)
            .map_err(|e| BlockchainError::Database(format!("Failed to read key: {e}")))?;
        Ok(value.map(|v| v.to_vec()))
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.tree
            .contains_key(key)
            .map_err(|e| BlockchainError::Database(format!("Failed to check key: {e}")))
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree
            .insert(key, value)
            .map_err(|e| BlockchainError::Database(format!("Failed to write key: {e}")))?;
        Ok(())
    }

    pub fn iter_all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.tree
            .iter()
            .map(|item| {
                item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .map_err(|e| BlockchainError::Database(format!("Failed to iterate: {e}")))
            })
            .collect()
    }

    /// Atomically applies `writes` if `guard_key` currently holds `expected`
    /// (`None` meaning absent). Returns whether the writes were applied.
    pub fn compare_and_write(
        &self,
        guard_key: &[u8],
        expected: Option<&[u8]>,
        writes: &[(&[u8], &[u8])],
    ) -> Result<bool> {
        let applied = self
            .tree
            .transaction(|tx_db| {
                let current = tx_db.get(guard_key)?;
                if current.as_deref() != expected {
                    return Ok(false);
                }
                for (key, value) in writes {
                    tx_db.insert(*key, *value)?;
                }
                Ok(true)
            })
            .map_err(|e: TransactionError| {
                BlockchainError::Database(format!("Atomic write failed: {e:?}"))
            })?;

        if applied {
            self.flush()?;
        }
        Ok(applied)
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| BlockchainError::Database(format!("Failed to flush: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_set_contains() {
        let dir = tempdir().unwrap();
        let store = KvStore::open(&dir.path().join("kv")).unwrap();

        assert_eq!(store.get(b"missing").unwrap(), None);
        assert!(!store.contains(b"key").unwrap());

        store.set(b"key", b"value").unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert!(store.contains(b"key").unwrap());
    }

    #[test]
    fn test_compare_and_write_guards_on_expected_value() {
        let dir = tempdir().unwrap();
        let store = KvStore::open(&dir.path().join("kv")).unwrap();
        let write_a = [
            (b"a".as_slice(), b"1".as_slice()),
            (b"tip".as_slice(), b"a".as_slice()),
        ];
        let write_b = [
            (b"b".as_slice(), b"2".as_slice()),
            (b"tip".as_slice(), b"b".as_slice()),
        ];

        assert!(store.compare_and_write(b"tip", None, &write_a).unwrap());

        // Guard no longer absent: nothing is written.
        assert!(!store.compare_and_write(b"tip", None, &write_b).unwrap());
        assert_eq!(store.get(b"b").unwrap(), None);
        assert_eq!(store.get(b"tip").unwrap(), Some(b"a".to_vec()));

        assert!(store
            .compare_and_write(b"tip", Some(b"a".as_slice()), &write_b)
            .unwrap());
        assert_eq!(store.get(b"tip").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_iter_all_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv");
        {
            let store = KvStore::open(&path).unwrap();
            store.set(b"x", b"1").unwrap();
            store.set(b"y", b"2").unwrap();
            store.flush().unwrap();
        }

        let store = KvStore::open(&path).unwrap();
        let entries = store.iter_all().unwrap();
        assert_eq!(
            entries,
            vec![
                (b"x".to_vec(), b"1".to_vec()),
                (b"y".to_vec(), b"2".to_vec())
            ]
        );
    }
}
