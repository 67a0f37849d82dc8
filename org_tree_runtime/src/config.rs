//! Runtime configuration.
//!
//! Loaded with precedence:
//! 1. Environment variables (ORG_TREE_*)
//! 2. Config file (TOML)
//! 3. Default values

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

pub const ENV_STORAGE_DIR: &str = "ORG_TREE_STORAGE_DIR";
pub const ENV_AVATAR_MAX_BYTES: &str = "ORG_TREE_AVATAR_MAX_BYTES";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory for the file-backed store
    pub storage_dir: PathBuf,

    /// Storage keys for the three namespaces
    pub keys: KeysConfig,

    /// Size limits
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Key of the persisted tree snapshot
    pub tree: String,

    /// Key of the contract list
    pub contracts: String,

    /// Prefix of per-node avatar keys
    pub avatar_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest avatar payload accepted, in bytes
    pub avatar_max_bytes: usize,

    /// Total capacity of the in-memory store; unlimited when absent.
    /// `FileStore` has no quota and ignores this.
    pub store_quota_bytes: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./data"),
            keys: KeysConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            tree: "orgTree".to_string(),
            contracts: "contracts".to_string(),
            avatar_prefix: "avatar_".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            avatar_max_bytes: 2 * 1024 * 1024,
            store_quota_bytes: None,
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document; missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a file (defaults if it does not exist), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            debug!("Loading config from {:?}", path);
            Self::from_toml_str(&fs::read_to_string(path)?)?
        } else {
            debug!("No config at {:?}, using defaults", path);
            Self::default()
        };
        Ok(config.apply_env_overrides())
    }

    /// Apply ORG_TREE_* environment variables.
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_AVATAR_MAX_BYTES) {
            match raw.trim().parse::<usize>() {
                Ok(bytes) => self.limits.avatar_max_bytes = bytes,
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_AVATAR_MAX_BYTES, raw, e),
            }
        }
        self
    }
}
