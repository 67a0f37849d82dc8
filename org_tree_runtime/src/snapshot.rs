//! Snapshot layer — the persisted tree under a single well-known key.
//!
//! Snapshots carry the format version and canonical hash next to the tree.
//! Anything unreadable (malformed JSON, hash mismatch, invariant violation)
//! is treated as absent and the caller falls back to the seed tree.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use org_tree_engine::domain::{OrgNode, EMBEDDED_IMAGE_PREFIX};
use org_tree_engine::hashing::canonical_hash;
use org_tree_engine::invariants::validate_invariants;
use org_tree_engine::seed::seed_tree;
use org_tree_engine::tree::AvatarUpload;
use org_tree_engine::TREE_FORMAT_VERSION;

use crate::error::Result;
use crate::snapshot_codec::restore_snapshot;
use crate::store::KeyValueStore;

/// Stored snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tree format version at snapshot time.
    pub format_version: u32,
    /// Canonical hash of `tree`.
    pub hash: String,
    pub tree: OrgNode,
}

impl Snapshot {
    pub fn of(tree: &OrgNode) -> Result<Self> {
        Ok(Self {
            format_version: TREE_FORMAT_VERSION,
            hash: canonical_hash(tree)?,
            tree: tree.clone(),
        })
    }
}

/// Verify a snapshot's internal hash consistency.
pub fn verify_snapshot_hash(snap: &Snapshot) -> bool {
    canonical_hash(&snap.tree)
        .map(|computed| computed == snap.hash)
        .unwrap_or(false)
}

/// Tree persistence: `load() -> Option<tree>`, `save(tree)`.
#[derive(Clone)]
pub struct TreeRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl TreeRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist the tree as a hashed snapshot.
    pub fn save(&self, tree: &OrgNode) -> Result<Snapshot> {
        let snap = Snapshot::of(tree)?;
        self.store.set(&self.key, &serde_json::to_string(&snap)?)?;
        debug!("Saved tree snapshot {} under {:?}", snap.hash, self.key);
        Ok(snap)
    }

    /// Load the stored tree. `Ok(None)` when absent or unreadable; only
    /// store failures are errors.
    pub fn load(&self) -> Result<Option<OrgNode>> {
        Ok(self.load_stored()?.map(|stored| stored.tree))
    }

    /// Like `load`, but also hands back embedded avatar payloads found
    /// inline in a bare tree document so they can be moved to avatar storage.
    pub fn load_stored(&self) -> Result<Option<StoredTree>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        Ok(parse_stored_tree(&raw))
    }

    /// Load the stored tree, or the seed tree when there is none.
    pub fn load_or_seed(&self) -> Result<OrgNode> {
        Ok(self.load()?.unwrap_or_else(|| {
            debug!("No usable tree under {:?}, starting from seed", self.key);
            seed_tree()
        }))
    }
}

/// A tree read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTree {
    pub tree: OrgNode,
    /// Data-URL avatars that were stored inside the tree document itself.
    /// Always empty for snapshot envelopes.
    pub inline_avatars: Vec<AvatarUpload>,
}

/// Accepts a snapshot envelope or a bare tree document.
fn parse_stored_tree(raw: &str) -> Option<StoredTree> {
    if let Ok(snap) = serde_json::from_str::<Snapshot>(raw) {
        if snap.format_version != TREE_FORMAT_VERSION {
            warn!(
                "Stored snapshot has format version {}, expected {}; ignoring",
                snap.format_version, TREE_FORMAT_VERSION
            );
            return None;
        }
        if !verify_snapshot_hash(&snap) {
            warn!("Stored snapshot hash mismatch; ignoring");
            return None;
        }
        if let Err(e) = validate_invariants(&snap.tree) {
            warn!("Stored snapshot is invalid: {}; ignoring", e);
            return None;
        }
        return Some(StoredTree {
            tree: snap.tree,
            inline_avatars: Vec::new(),
        });
    }

    match restore_snapshot(raw) {
        Ok(tree) => {
            let mut inline_avatars = Vec::new();
            if let Ok(doc) = serde_json::from_str::<Value>(raw) {
                collect_inline_avatars(&doc, &mut inline_avatars);
            }
            if !inline_avatars.is_empty() {
                info!("Stored tree carries {} inline avatar payloads", inline_avatars.len());
            }
            Some(StoredTree { tree, inline_avatars })
        }
        Err(e) => {
            warn!("Stored tree is unreadable: {}; ignoring", e);
            None
        }
    }
}

fn collect_inline_avatars(node: &Value, out: &mut Vec<AvatarUpload>) {
    if let (Some(Value::String(id)), Some(Value::String(avatar))) = (node.get("id"), node.get("avatar")) {
        let avatar = avatar.trim();
        if avatar.starts_with(EMBEDDED_IMAGE_PREFIX) {
            out.push(AvatarUpload {
                node_id: id.clone(),
                payload: avatar.to_string(),
            });
        }
    }
    if let Some(Value::Array(children)) = node.get("children") {
        for child in children {
            collect_inline_avatars(child, out);
        }
    }
}
