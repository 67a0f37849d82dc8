//! Avatar storage — image payloads keyed by node id, kept out of the tree.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::store::KeyValueStore;

#[derive(Clone)]
pub struct AvatarStore {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    max_bytes: usize,
}

impl AvatarStore {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            max_bytes,
        }
    }

    pub fn key(&self, node_id: &str) -> String {
        format!("{}{}", self.prefix, node_id)
    }

    /// Store a payload. Fails with `PayloadTooLarge` above the configured
    /// limit, or with the store's own quota error.
    pub fn save(&self, node_id: &str, image_data: &str) -> Result<()> {
        let key = self.key(node_id);
        if image_data.len() > self.max_bytes {
            return Err(RuntimeError::PayloadTooLarge {
                key,
                size: image_data.len(),
                limit: self.max_bytes,
            });
        }
        self.store.set(&key, image_data)?;
        debug!("Stored avatar for {} ({} bytes)", node_id, image_data.len());
        Ok(())
    }

    pub fn get(&self, node_id: &str) -> Result<Option<String>> {
        self.store.get(&self.key(node_id))
    }

    /// Remove a payload. Returns whether one existed.
    pub fn remove(&self, node_id: &str) -> Result<bool> {
        let key = self.key(node_id);
        if self.store.get(&key)?.is_none() {
            return Ok(false);
        }
        self.store.delete(&key)?;
        Ok(true)
    }
}
