/// Org Tree Engine — Canonical Hashing
///
/// Deterministic canonical serialization + SHA-256 hashing.
///
/// Rules:
///   - `format_version` is the first field, then the tree
///   - Node fields in declaration order, children in tree order
///   - Absent optional fields are omitted
///   - UTF-8 JSON, no whitespace

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::OrgNode;
use crate::TREE_FORMAT_VERSION;

/// Canonical serialization of a tree to UTF-8 JSON bytes.
pub fn canonical_serialize(tree: &OrgNode) -> serde_json::Result<Vec<u8>> {
    let mut root = Map::new();
    root.insert(
        "format_version".to_string(),
        Value::Number(TREE_FORMAT_VERSION.into()),
    );
    root.insert("tree".to_string(), serde_json::to_value(tree)?);
    serde_json::to_vec(&Value::Object(root))
}

/// SHA-256 of the canonical serialization. Lowercase hex string.
pub fn canonical_hash(tree: &OrgNode) -> serde_json::Result<String> {
    let bytes = canonical_serialize(tree)?;
    Ok(hex_digest(&bytes))
}

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
