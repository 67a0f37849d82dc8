//! Snapshot Codec — plain JSON encoding of a tree, for backups.
//!
//! Side-effect free apart from the two file helpers. Unlike the stored
//! snapshot envelope there is no version or hash field: a backup file is the
//! bare tree document, the same shape older dashboards persisted.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

use org_tree_engine::domain::OrgNode;
use org_tree_engine::hashing::hex_digest;
use org_tree_engine::invariants::validate_invariants;

/// Codec failures, kept apart from `RuntimeError` so a bad backup can be
/// told from a bad store.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("SerializationError: {0}")]
    SerializationError(String),
    /// Malformed JSON or missing required fields.
    #[error("DeserializationError: {0}")]
    DeserializationError(String),
    /// The tree decoded but breaks an engine invariant.
    #[error("InvariantViolation: {0}")]
    InvariantViolation(String),
    #[error("IoError: {0}")]
    IoError(String),
}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Compact JSON. Equal trees encode to equal bytes.
pub fn encode_snapshot(tree: &OrgNode) -> Result<String, SnapshotError> {
    serde_json::to_string(tree).map_err(|e| SnapshotError::SerializationError(e.to_string()))
}

/// Decode without validation.
pub fn decode_snapshot(json: &str) -> Result<OrgNode, SnapshotError> {
    serde_json::from_str(json).map_err(|e| SnapshotError::DeserializationError(e.to_string()))
}

/// Decode, then check invariants. Use this for anything read from disk.
pub fn restore_snapshot(json: &str) -> Result<OrgNode, SnapshotError> {
    let tree = decode_snapshot(json)?;
    match validate_invariants(&tree) {
        Ok(()) => Ok(tree),
        Err(e) => Err(SnapshotError::InvariantViolation(e.to_string())),
    }
}

/// SHA-256 of `encode_snapshot(tree)`, lowercase hex. This is a file
/// checksum, not the canonical tree hash.
pub fn snapshot_hash(tree: &OrgNode) -> Result<String, SnapshotError> {
    Ok(hex_digest(encode_snapshot(tree)?.as_bytes()))
}

// ---------------------------------------------------------------------------
// Backup files
// ---------------------------------------------------------------------------

/// Write a backup atomically: temp sibling, fsync, rename. Missing parent
/// directories are created.
pub fn export_snapshot_to_file(tree: &OrgNode, path: &Path) -> Result<(), SnapshotError> {
    let encoded = encode_snapshot(tree)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(encoded.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read and validate a backup.
pub fn import_snapshot_from_file(path: &Path) -> Result<OrgNode, SnapshotError> {
    restore_snapshot(&fs::read_to_string(path)?)
}
