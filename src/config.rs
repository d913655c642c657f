//! Provider configuration.

use crate::error::ConfigError;
use crate::selection::Store;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding [`Config::data_dir`].
pub const DATA_DIR_ENV: &str = "STOCKROOM_DATA_DIR";

const DEFAULT_STORAGE_FILE: &str = "local_storage.json";

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockroom")
}

fn default_storage_file() -> String {
    DEFAULT_STORAGE_FILE.to_string()
}

/// YAML-backed configuration for [`Provider::from_config`](crate::Provider::from_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the local storage file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File name of the local storage file inside `data_dir`.
    #[serde(default = "default_storage_file")]
    pub storage_file: String,
    /// Stores known before the app fetches the live list.
    #[serde(default)]
    pub stores: Vec<Store>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage_file: default_storage_file(),
            stores: Vec::new(),
        }
    }
}

impl Config {
    /// Read a YAML config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        info!(path = %path.display(), stores = config.stores.len(), "Loaded config");
        Ok(config)
    }

    /// Defaults, with `data_dir` taken from `STOCKROOM_DATA_DIR` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
            config.data_dir = PathBuf::from(dir);
            debug!(data_dir = %config.data_dir.display(), "Using data dir from environment");
        }
        config
    }

    /// Full path of the local storage file.
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn minimal_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("stores: []").unwrap();
        assert_eq!(config.storage_file, DEFAULT_STORAGE_FILE);
        assert_eq!(config.data_dir, default_data_dir());
    }

    #[test]
    fn load_reads_stores_and_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stockroom.yaml");
        std::fs::write(
            &path,
            "data_dir: /tmp/stockroom-test\n\
             storage_file: prefs.json\n\
             stores:\n  - id: 1\n    name: Main\n  - id: 2\n    name: Branch\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.stores, vec![Store::new(1, "Main"), Store::new(2, "Branch")]);
        assert_eq!(
            config.storage_path(),
            PathBuf::from("/tmp/stockroom-test/prefs.json")
        );
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "stores: [{id: not-a-number}]").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Yaml(_))));
    }
}
