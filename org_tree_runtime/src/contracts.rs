//! Contract list storage and the read-modify-write side of contract sync.
//!
//! The list is eventually consistent with the tree, not transactional
//! with it: a failed sync never rolls back a tree mutation. Records are only
//! appended; a list that cannot be decoded is never written over.

use std::sync::Arc;

use tracing::{info, warn};

use org_tree_engine::contract_sync::{apply_contract_sync, ContractLink};
use org_tree_engine::domain::Contract;
use org_tree_engine::ids::IdGenerator;

use crate::error::{Result, RuntimeError};
use crate::store::KeyValueStore;

#[derive(Clone)]
pub struct ContractRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl ContractRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored contracts for display; absent or unreadable lists read as empty.
    pub fn load(&self) -> Result<Vec<Contract>> {
        match self.read() {
            Err(RuntimeError::Unreadable { reason, .. }) => {
                warn!("Stored contract list is unreadable: {}; showing it as empty", reason);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Strict read: an undecodable list is an `Unreadable` error.
    fn read(&self) -> Result<Vec<Contract>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| RuntimeError::Unreadable {
            key: self.key.clone(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, contracts: &[Contract]) -> Result<()> {
        self.store.set(&self.key, &serde_json::to_string(contracts)?)
    }

    /// Ensure a record exists for `link`. Writes only when one was appended,
    /// and fails without writing when the stored list cannot be decoded.
    pub fn sync(&self, link: &ContractLink, ids: &mut dyn IdGenerator) -> Result<Option<Contract>> {
        let mut contracts = self.read()?;
        let Some(created) = apply_contract_sync(&mut contracts, link, ids) else {
            return Ok(None);
        };
        self.save(&contracts)?;
        info!(
            "Registered contract {:?} for supervisor {}",
            created.name, created.supervisor_id
        );
        Ok(Some(created))
    }
}
