//! Session manager — one in-memory tree snapshot with persist-after-apply
//! semantics.
//!
//! Apply order:
//!   1. engine.apply(mutation): validation errors abort, nothing is written
//!   2. tree snapshot save: failure is reported, the in-memory tree stays
//!   3. avatar payloads: failure is reported, the mutation stands
//!   4. contract sync: failure is reported, the mutation stands
//!   5. change notifications for every key written
//!
//! Steps 3 and 4 run even when step 2 failed.

use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use org_tree_engine::domain::{Contract, EmployeeRecord, OrgNode};
use org_tree_engine::engine::{MutationOutcome, OrgTreeEngine};
use org_tree_engine::graph::{count_nodes, max_depth};
use org_tree_engine::hashing::canonical_hash;
use org_tree_engine::ids::IdGenerator;
use org_tree_engine::mutation::TreeMutation;
use org_tree_engine::seed::seed_tree;
use org_tree_engine::tree::{flatten_tree_to_employees, visible_nodes};

use crate::avatar::AvatarStore;
use crate::config::RuntimeConfig;
use crate::contracts::ContractRepository;
use crate::drift::{compare_trees, TreeDiff};
use crate::error::{Result, RuntimeError};
use crate::notify::{ChangeBus, ChangeKind, StorageChange};
use crate::snapshot_codec::{export_snapshot_to_file, import_snapshot_from_file, snapshot_hash};
use crate::snapshot::{StoredTree, TreeRepository};
use crate::store::{FileStore, KeyValueStore, MemoryStore};

/// Everything one `apply` did.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub outcome: MutationOutcome,
    pub diff: TreeDiff,
    /// Canonical hash of the tree after the mutation.
    pub hash: String,
    pub contract_created: Option<Contract>,
    /// The tree snapshot could not be written; the in-memory tree is ahead
    /// of the store until the next successful save.
    pub tree_error: Option<String>,
    pub avatar_error: Option<String>,
    pub contract_error: Option<String>,
}

/// A single user's dashboard session over an injected store.
pub struct Session {
    engine: OrgTreeEngine,
    trees: TreeRepository,
    avatars: AvatarStore,
    contracts: ContractRepository,
    bus: ChangeBus,
    config: RuntimeConfig,
}

impl Session {
    /// Load the persisted tree (or the seed) from `store`.
    pub fn open(store: Arc<dyn KeyValueStore>, config: RuntimeConfig) -> Result<Self> {
        let trees = TreeRepository::new(store.clone(), config.keys.tree.clone());
        let avatars = AvatarStore::new(
            store.clone(),
            config.keys.avatar_prefix.clone(),
            config.limits.avatar_max_bytes,
        );
        let contracts = ContractRepository::new(store, config.keys.contracts.clone());

        let tree = match trees.load_stored()? {
            Some(stored) => {
                if !stored.inline_avatars.is_empty() {
                    migrate_inline_avatars(&trees, &avatars, &stored);
                }
                stored.tree
            }
            None => {
                debug!("No usable tree under {:?}, starting from seed", trees.key());
                seed_tree()
            }
        };
        let engine = OrgTreeEngine::new(tree)?;
        info!(
            "Session opened with tree {:?} ({} nodes, depth {})",
            engine.tree().id,
            count_nodes(engine.tree()),
            max_depth(engine.tree())
        );

        Ok(Self {
            engine,
            trees,
            avatars,
            contracts,
            bus: ChangeBus::new(),
            config,
        })
    }

    /// Session over a `FileStore` at `config.storage_dir`. The file store
    /// has no quota; `store_quota_bytes` is not applied here.
    pub fn open_dir(config: RuntimeConfig) -> Result<Self> {
        let store = FileStore::open(&config.storage_dir)?;
        if config.limits.store_quota_bytes.is_some() {
            warn!("store_quota_bytes only applies to the in-memory store; ignored for {}", store.dir().display());
        }
        info!("Using file store at {}", store.dir().display());
        Self::open(Arc::new(store), config)
    }

    /// Session over a fresh `MemoryStore` honouring `store_quota_bytes`.
    pub fn in_memory(config: RuntimeConfig) -> Result<Self> {
        let store = MemoryStore::with_quota(config.limits.store_quota_bytes);
        Self::open(Arc::new(store), config)
    }

    /// Swap the id generator used for nodes and contracts.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.engine = self.engine.with_id_generator(ids);
        self
    }

    /// Apply a mutation, persist, sync contracts and notify subscribers.
    pub fn apply(&mut self, mutation: &TreeMutation) -> Result<ApplyReport> {
        let before = self.engine.tree().clone();
        let outcome = self.engine.apply(mutation)?;
        let diff = compare_trees(&before, self.engine.tree());
        let hash = canonical_hash(self.engine.tree())?;

        let mut report = ApplyReport {
            outcome,
            diff,
            hash,
            contract_created: None,
            tree_error: None,
            avatar_error: None,
            contract_error: None,
        };

        if report.outcome.changed {
            match self.trees.save(self.engine.tree()) {
                Ok(_) => self.publish(self.trees.key().to_string(), ChangeKind::Tree, Some(report.hash.clone())),
                Err(e) => {
                    if e.is_capacity() {
                        warn!("Tree snapshot does not fit in storage: {}", e);
                    } else {
                        warn!("Tree snapshot not saved: {}", e);
                    }
                    report.tree_error = Some(e.to_string());
                }
            }
        } else {
            debug!("{} was a no-op, tree not saved", report.outcome.kind);
        }

        self.persist_avatars(&mut report);
        self.sync_contract(&mut report);
        Ok(report)
    }

    fn persist_avatars(&self, report: &mut ApplyReport) {
        if let Some(upload) = &report.outcome.avatar_upload {
            match self.avatars.save(&upload.node_id, &upload.payload) {
                Ok(()) => self.publish(self.avatars.key(&upload.node_id), ChangeKind::Avatar, None),
                Err(e) => {
                    warn!("Avatar for {} not stored: {}", upload.node_id, e);
                    report.avatar_error = Some(e.to_string());
                }
            }
        }

        for node_id in &report.outcome.removed_ids {
            match self.avatars.remove(node_id) {
                Ok(true) => self.publish(self.avatars.key(node_id), ChangeKind::Avatar, None),
                Ok(false) => {}
                Err(e) => warn!("Avatar for removed node {} not cleared: {}", node_id, e),
            }
        }
    }

    fn sync_contract(&mut self, report: &mut ApplyReport) {
        let Some(link) = report.outcome.contract_link.clone() else {
            return;
        };
        match self.contracts.sync(&link, self.engine.id_generator()) {
            Ok(Some(created)) => {
                self.publish(self.contracts.key().to_string(), ChangeKind::Contracts, None);
                report.contract_created = Some(created);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Contract {:?} not synced: {}", link.contract, e);
                report.contract_error = Some(e.to_string());
            }
        }
    }

    fn publish(&self, key: String, kind: ChangeKind, hash: Option<String>) {
        self.bus.publish(StorageChange { key, kind, hash });
    }

    /// Re-read the persisted tree, e.g. after another writer changed it.
    pub fn reload(&mut self) -> Result<()> {
        let tree = match self.trees.load()? {
            Some(tree) => tree,
            None => self.engine.seed().clone(),
        };
        self.engine.replace_tree(tree)?;
        Ok(())
    }

    /// Write the current tree to `path` as a plain JSON backup. Returns the
    /// SHA-256 of the written bytes.
    pub fn export_tree(&self, path: &Path) -> Result<String> {
        export_snapshot_to_file(self.engine.tree(), path)?;
        let file_hash = snapshot_hash(self.engine.tree())?;
        info!("Exported tree to {} ({})", path.display(), file_hash);
        Ok(file_hash)
    }

    /// Replace the tree with a validated backup and persist it.
    pub fn import_tree(&mut self, path: &Path) -> Result<String> {
        let tree = import_snapshot_from_file(path)?;
        self.engine.replace_tree(tree)?;
        let snap = self.trees.save(self.engine.tree())?;
        self.publish(self.trees.key().to_string(), ChangeKind::Tree, Some(snap.hash.clone()));
        info!("Imported tree from {}", path.display());
        Ok(snap.hash)
    }

    pub fn tree(&self) -> &OrgNode {
        self.engine.tree()
    }

    pub fn visible_nodes(&self) -> Vec<&OrgNode> {
        visible_nodes(self.engine.tree())
    }

    pub fn employees(&self) -> Vec<EmployeeRecord> {
        flatten_tree_to_employees(self.engine.tree())
    }

    pub fn contracts(&self) -> Result<Vec<Contract>> {
        self.contracts.load()
    }

    pub fn avatar(&self, node_id: &str) -> Result<Option<String>> {
        self.avatars.get(node_id)
    }

    pub fn current_hash(&self) -> Result<String> {
        Ok(canonical_hash(self.engine.tree())?)
    }

    pub fn subscribe(&self) -> Receiver<StorageChange> {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

/// Move data-URL avatars found inside a legacy tree document into avatar
/// storage, then rewrite the tree as a snapshot once all of them landed.
fn migrate_inline_avatars(trees: &TreeRepository, avatars: &AvatarStore, stored: &StoredTree) {
    let mut migrated = 0;
    for upload in &stored.inline_avatars {
        match avatars.save(&upload.node_id, &upload.payload) {
            Ok(()) => migrated += 1,
            Err(e) => warn!("Inline avatar for {} not migrated: {}", upload.node_id, e),
        }
    }
    if migrated < stored.inline_avatars.len() {
        return;
    }
    match trees.save(&stored.tree) {
        Ok(snap) => info!("Migrated {} inline avatars, tree rewritten as {}", migrated, snap.hash),
        Err(e) => warn!("Tree not rewritten after avatar migration: {}", e),
    }
}

/// Thread-safe session handle using Mutex.
pub struct SharedSession {
    inner: Mutex<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    /// Apply a mutation under lock.
    pub fn apply(&self, mutation: &TreeMutation) -> Result<ApplyReport> {
        let mut session = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        session.apply(mutation)
    }

    /// Current hash under lock.
    pub fn current_hash(&self) -> Result<String> {
        let session = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        session.current_hash()
    }

    /// Clone of the current tree under lock.
    pub fn tree(&self) -> Result<OrgNode> {
        let session = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(session.tree().clone())
    }

    pub fn subscribe(&self) -> Result<Receiver<StorageChange>> {
        let session = self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(session.subscribe())
    }
}
