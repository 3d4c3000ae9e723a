use crate::core::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::error::{BlockchainError, Result};
use crate::wallet::WALLET_FILE;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Read from the working directory when `MINICHAIN_CONFIG` is unset.
pub const CONFIG_FILE: &str = "minichain.toml";

pub const CONFIG_PATH_KEY: &str = "MINICHAIN_CONFIG";
const DATA_DIR_KEY: &str = "MINICHAIN_DATA_DIR";
const DIFFICULTY_KEY: &str = "MINICHAIN_DIFFICULTY";
const OWNERSHIP_KEY: &str = "MINICHAIN_OWNERSHIP";

static DEFAULT_DATA_DIR: &str = "data";
static BLOCKS_DIR: &str = "blocks";

/// Which ownership proof the chain uses. Fixed for the lifetime of a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipMode {
    #[default]
    Address,
    Ecdsa,
}

impl FromStr for OwnershipMode {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "address" => Ok(OwnershipMode::Address),
            "ecdsa" => Ok(OwnershipMode::Ecdsa),
            other => Err(BlockchainError::Config(format!(
                "Unknown ownership mode '{other}', expected 'address' or 'ecdsa'"
            ))),
        }
    }
}

impl fmt::Display for OwnershipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipMode::Address => write!(f, "address"),
            OwnershipMode::Ecdsa => write!(f, "ecdsa"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data_dir: PathBuf,
    pub difficulty: u32,
    pub ownership: OwnershipMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            difficulty: DEFAULT_DIFFICULTY,
            ownership: OwnershipMode::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Config> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit variable lookup.
    pub fn load_with<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_KEY) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(CONFIG_FILE).is_file() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Config::default(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        toml::from_str(contents)
            .map_err(|e| BlockchainError::Config(format!("Invalid configuration: {e}")))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data_dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(difficulty) = lookup(DIFFICULTY_KEY) {
            self.difficulty = difficulty.trim().parse().map_err(|e| {
                BlockchainError::Config(format!("{DIFFICULTY_KEY}='{difficulty}': {e}"))
            })?;
        }
        if let Some(ownership) = lookup(OWNERSHIP_KEY) {
            self.ownership = ownership.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "Difficulty {} exceeds maximum of {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(BlockchainError::Config(
                "Data directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.data_dir.join(BLOCKS_DIR)
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.data_dir.join(WALLET_FILE)
    }
}
