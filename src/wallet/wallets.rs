use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::info;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const WALLET_FILE: &str = "wallet.dat";

/// Wallets persisted as one bincode file, keyed by address.
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    path: PathBuf,
}

impl Wallets {
    /// Loads the wallet file at `path`, or starts empty if it does not exist yet.
    pub fn load(path: &Path) -> Result<Wallets> {
        let wallets = if path.exists() {
            let bytes = fs::read(path)?;
            deserialize::<HashMap<String, Wallet>>(&bytes).map_err(|e| {
                BlockchainError::Wallet(format!(
                    "Failed to read wallet file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            HashMap::new()
        };

        Ok(Wallets {
            wallets,
            path: path.to_path_buf(),
        })
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        info!("Created wallet {address}");
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    fn save_to_file(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file: File = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&serialize(&self.wallets)?)?;
        writer.flush()?;
        Ok(())
    }
}
