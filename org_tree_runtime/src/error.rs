//! Error types for the runtime.

use thiserror::Error;

use org_tree_engine::TreeError;

use crate::snapshot_codec::SnapshotError;

/// Result type alias using the runtime error.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The backing store has no room for the value.
    #[error("Storage quota exceeded writing {key:?}: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// A single payload exceeds its configured size limit.
    #[error("Payload for {key:?} is {size} bytes, limit is {limit}")]
    PayloadTooLarge { key: String, size: usize, limit: usize },

    /// A stored document exists but cannot be decoded; it is left untouched.
    #[error("Stored value under {key:?} is unreadable: {reason}")]
    Unreadable { key: String, reason: String },

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Session lock poisoned")]
    LockPoisoned,
}

impl RuntimeError {
    /// Storage-capacity failures: the write was refused, nothing is corrupt.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            RuntimeError::QuotaExceeded { .. } | RuntimeError::PayloadTooLarge { .. }
        )
    }
}
