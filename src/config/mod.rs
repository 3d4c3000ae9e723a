//! Configuration management
//!
//! Settings come from an optional TOML file, then environment overrides, then
//! built-in defaults for anything left unset.

pub mod settings;

pub use settings::{Config, OwnershipMode, CONFIG_FILE, CONFIG_PATH_KEY};
