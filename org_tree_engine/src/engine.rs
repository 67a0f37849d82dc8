/// Org Tree Engine — Engine
///
/// Stateful wrapper around the pure tree operations. Holds the current
/// snapshot, validates every candidate tree before swapping it in, and
/// guarantees generated ids are never reissued in the same session.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::contract_sync::{contract_link_for, ContractLink};
use crate::domain::OrgNode;
use crate::error::{Result, TreeError};
use crate::graph::collect_ids;
use crate::ids::{IdGenerator, RandomIds};
use crate::invariants::validate_invariants;
use crate::mutation::TreeMutation;
use crate::seed::seed_tree;
use crate::tree::{add_child_node, move_node, remove_node, update_node_fields, AvatarUpload};

/// Attempts at drawing an unused id before giving up.
pub const MAX_ID_ATTEMPTS: usize = 16;

/// What a single mutation did to the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub kind: &'static str,
    /// False when the mutation was a no-op (missing ids, identical values).
    pub changed: bool,
    /// Created node for `AddChild`, edited node for `UpdateNode`.
    pub node_id: Option<String>,
    pub avatar_upload: Option<AvatarUpload>,
    /// Set when a contract was assigned under a contract-sync boundary.
    pub contract_link: Option<ContractLink>,
    /// Ids present before and gone after, pre-order.
    pub removed_ids: Vec<String>,
    /// The root was removed and the tree reset to the seed.
    pub reset: bool,
}

impl MutationOutcome {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            changed: false,
            node_id: None,
            avatar_upload: None,
            contract_link: None,
            removed_ids: Vec::new(),
            reset: false,
        }
    }
}

/// Single-session tree engine.
pub struct OrgTreeEngine {
    tree: OrgNode,
    seed: OrgNode,
    ids: Box<dyn IdGenerator>,
    issued: BTreeSet<String>,
}

impl OrgTreeEngine {
    /// Engine starting from the built-in seed tree.
    pub fn seeded() -> Self {
        let seed = seed_tree();
        let mut engine = Self {
            tree: seed.clone(),
            seed,
            ids: Box::new(RandomIds),
            issued: BTreeSet::new(),
        };
        engine.observe_current();
        engine
    }

    /// Engine over a loaded tree with the built-in seed.
    pub fn new(tree: OrgNode) -> Result<Self> {
        Self::with_seed(tree, seed_tree())
    }

    /// Engine over a loaded tree with a custom seed. Both must be valid.
    pub fn with_seed(tree: OrgNode, seed: OrgNode) -> Result<Self> {
        validate_invariants(&seed)?;
        validate_invariants(&tree)?;
        let mut engine = Self {
            tree,
            seed,
            ids: Box::new(RandomIds),
            issued: BTreeSet::new(),
        };
        engine.observe_current();
        Ok(engine)
    }

    /// Swap the id generator (deterministic ids in tests).
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn tree(&self) -> &OrgNode {
        &self.tree
    }

    pub fn seed(&self) -> &OrgNode {
        &self.seed
    }

    /// Generator shared with collaborators that mint ids (contract sync).
    pub fn id_generator(&mut self) -> &mut dyn IdGenerator {
        self.ids.as_mut()
    }

    /// Whether `node_id` was ever issued or observed in this session.
    pub fn has_issued(&self, node_id: &str) -> bool {
        self.issued.contains(node_id)
    }

    /// Replace the current snapshot wholesale (e.g. after a reload).
    pub fn replace_tree(&mut self, tree: OrgNode) -> Result<()> {
        validate_invariants(&tree)?;
        self.tree = tree;
        self.observe_current();
        Ok(())
    }

    /// Apply one mutation:
    ///   1. Run the pure tree operation against the current snapshot
    ///   2. Validate invariants of the candidate (failure keeps the old tree)
    ///   3. Resolve the contract link for assignments under a Supervisor
    ///   4. Swap the snapshot and report
    pub fn apply(&mut self, mutation: &TreeMutation) -> Result<MutationOutcome> {
        let mut outcome = MutationOutcome::new(mutation.kind());

        let candidate = match mutation {
            TreeMutation::UpdateNode { id, patch } => {
                let updated = update_node_fields(&self.tree, id, patch)?;
                if updated.found {
                    outcome.node_id = Some(id.clone());
                    if let Some(contract) = patch.contract.as_deref() {
                        outcome.contract_link = contract_link_for(&updated.tree, id, contract);
                    }
                }
                outcome.avatar_upload = updated.avatar_upload;
                updated.tree
            }
            TreeMutation::AddChild { parent_id, child } => {
                let mut fresh = FreshIds {
                    inner: self.ids.as_mut(),
                    issued: &mut self.issued,
                    exhausted: false,
                };
                let added = add_child_node(&self.tree, parent_id, child, &mut fresh)?;
                if fresh.exhausted {
                    return Err(TreeError::IdSpaceExhausted(MAX_ID_ATTEMPTS));
                }
                if let (Some(node_id), Some(contract)) = (&added.node_id, child.contract.as_deref()) {
                    outcome.contract_link = contract_link_for(&added.tree, node_id, contract);
                }
                outcome.node_id = added.node_id;
                outcome.avatar_upload = added.avatar_upload;
                added.tree
            }
            TreeMutation::Remove { id } => {
                outcome.reset = *id == self.tree.id;
                remove_node(&self.tree, id, &self.seed)
            }
            TreeMutation::Move {
                dragged_id,
                target_id,
            } => move_node(dragged_id, target_id, &self.tree),
        };

        validate_invariants(&candidate)?;

        outcome.changed = candidate != self.tree;
        if !outcome.changed {
            debug!("{} left the tree unchanged", outcome.kind);
            return Ok(outcome);
        }

        let remaining: BTreeSet<String> = collect_ids(&candidate).into_iter().collect();
        outcome.removed_ids = collect_ids(&self.tree)
            .into_iter()
            .filter(|id| !remaining.contains(id))
            .collect();

        self.tree = candidate;
        self.observe_current();
        info!(
            "Applied {} (node={:?}, removed={}, reset={})",
            outcome.kind,
            outcome.node_id,
            outcome.removed_ids.len(),
            outcome.reset
        );
        Ok(outcome)
    }

    fn observe_current(&mut self) {
        self.issued.extend(collect_ids(&self.tree));
        self.issued.extend(collect_ids(&self.seed));
    }
}

/// Generator adapter that skips ids already issued in the session.
struct FreshIds<'a> {
    inner: &'a mut dyn IdGenerator,
    issued: &'a mut BTreeSet<String>,
    exhausted: bool,
}

impl IdGenerator for FreshIds<'_> {
    fn node_id(&mut self) -> String {
        let mut candidate = self.inner.node_id();
        for _ in 1..MAX_ID_ATTEMPTS {
            if !self.issued.contains(&candidate) {
                break;
            }
            candidate = self.inner.node_id();
        }
        if !self.issued.insert(candidate.clone()) {
            self.exhausted = true;
        }
        candidate
    }

    fn contract_id(&mut self) -> String {
        self.inner.contract_id()
    }
}
