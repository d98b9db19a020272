use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ValidationError};
use crate::types::is_valid_name;

/// Which `RevisionTable` a store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    #[default]
    File,
}

/// Store configuration, usually read from a JSON file.
///
/// ```json
/// { "backend": "file", "directory": "data", "prefix": "kz", "auto_purge": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    /// Directory holding revision files (file backend only).
    pub directory: PathBuf,
    /// File name prefix, `[A-Za-z0-9]+` (file backend only).
    pub prefix: String,
    /// Keep only the newest revision of a key after each write.
    pub auto_purge: bool,
    /// Create `directory` if it does not exist.
    pub create_dir: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            directory: PathBuf::from("."),
            prefix: "kz".into(),
            auto_purge: false,
            create_dir: false,
        }
    }
}

impl StoreConfig {
    /// In-memory store with default settings.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            ..Self::default()
        }
    }

    /// File-backed store in `directory` using `prefix`.
    pub fn file(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            backend: Backend::File,
            directory: directory.into(),
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Read and validate a JSON config file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_valid_name(&self.prefix) {
            return Err(ValidationError::InvalidPrefix(self.prefix.clone()));
        }
        Ok(())
    }
}
