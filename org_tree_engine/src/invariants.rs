/// Org Tree Engine — Invariant Checks
///
/// Validation of a candidate tree before it replaces the current snapshot.
/// Owned children make cycles unrepresentable; a duplicated id is the only
/// way one node could appear twice, so uniqueness is checked instead.

use std::collections::BTreeSet;

use crate::domain::OrgNode;
use crate::error::{Result, TreeError};
use crate::ids::validate_node_id;
use crate::ROOT_ID;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run all checks. Returns the first failure.
pub fn validate_invariants(tree: &OrgNode) -> Result<()> {
    check_root_id(tree)?;
    let mut seen = BTreeSet::new();
    check_node(tree, &mut seen)
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

fn check_root_id(tree: &OrgNode) -> Result<()> {
    if tree.id != ROOT_ID {
        return Err(TreeError::Invariant(format!(
            "[INVARIANT:root_id] Root id is {:?}, expected {:?}",
            tree.id, ROOT_ID
        )));
    }
    Ok(())
}

fn check_node<'a>(node: &'a OrgNode, seen: &mut BTreeSet<&'a str>) -> Result<()> {
    validate_node_id(&node.id).map_err(|_| {
        TreeError::Invariant(format!(
            "[INVARIANT:node_id_format] Node id {:?} must match [a-zA-Z0-9_-]+",
            node.id
        ))
    })?;

    if !seen.insert(node.id.as_str()) {
        return Err(TreeError::Invariant(format!(
            "[INVARIANT:duplicate_node_id] Node id {:?} appears more than once",
            node.id
        )));
    }

    if node.name.trim().is_empty() {
        return Err(TreeError::Invariant(format!(
            "[INVARIANT:empty_name] Node {:?} has an empty name",
            node.id
        )));
    }

    if node.role.is_blank() {
        return Err(TreeError::Invariant(format!(
            "[INVARIANT:empty_role] Node {:?} has an empty role",
            node.id
        )));
    }

    for child in &node.children {
        check_node(child, seen)?;
    }
    Ok(())
}
