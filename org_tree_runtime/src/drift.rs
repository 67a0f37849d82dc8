//! Drift detection — structural comparison of two tree snapshots.
//!
//! Produces the return-value diff that accompanies every applied mutation.

use std::collections::BTreeMap;

use org_tree_engine::domain::OrgNode;
use org_tree_engine::graph::count_nodes;

/// Structured tree diff. Id lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub node_count_a: i64,
    pub node_count_b: i64,
    pub node_count_delta: i64,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Present in both trees under a different parent.
    pub reparented: Vec<String>,
    /// Present in both trees with different own fields.
    pub updated: Vec<String>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.reparented.is_empty()
            && self.updated.is_empty()
    }
}

/// Compare `tree_a` (before) with `tree_b` (after).
pub fn compare_trees(tree_a: &OrgNode, tree_b: &OrgNode) -> TreeDiff {
    let index_a = index_tree(tree_a);
    let index_b = index_tree(tree_b);

    let added = index_b
        .keys()
        .filter(|id| !index_a.contains_key(*id))
        .map(|id| id.to_string())
        .collect();
    let removed = index_a
        .keys()
        .filter(|id| !index_b.contains_key(*id))
        .map(|id| id.to_string())
        .collect();

    let mut reparented = Vec::new();
    let mut updated = Vec::new();
    for (id, (parent_a, node_a)) in &index_a {
        if let Some((parent_b, node_b)) = index_b.get(id) {
            if parent_a != parent_b {
                reparented.push(id.to_string());
            }
            if !same_own_fields(node_a, node_b) {
                updated.push(id.to_string());
            }
        }
    }

    let count_a = count_nodes(tree_a) as i64;
    let count_b = count_nodes(tree_b) as i64;
    TreeDiff {
        node_count_a: count_a,
        node_count_b: count_b,
        node_count_delta: count_b - count_a,
        added,
        removed,
        reparented,
        updated,
    }
}

type Index<'a> = BTreeMap<&'a str, (Option<&'a str>, &'a OrgNode)>;

fn index_tree(tree: &OrgNode) -> Index<'_> {
    let mut index = BTreeMap::new();
    index_into(tree, None, &mut index);
    index
}

fn index_into<'a>(node: &'a OrgNode, parent: Option<&'a str>, index: &mut Index<'a>) {
    index.insert(node.id.as_str(), (parent, node));
    for child in &node.children {
        index_into(child, Some(node.id.as_str()), index);
    }
}

fn same_own_fields(a: &OrgNode, b: &OrgNode) -> bool {
    a.name == b.name
        && a.role == b.role
        && a.avatar == b.avatar
        && a.contact == b.contact
        && a.contract == b.contract
        && a.show_in_neural_net == b.show_in_neural_net
        && a.contract_settings == b.contract_settings
}
