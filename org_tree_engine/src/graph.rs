/// Org Tree Engine — Structural Queries
///
/// Read-only measurements over a tree. No allocation beyond the results.

use crate::domain::OrgNode;

/// Total number of nodes, root included.
pub fn count_nodes(tree: &OrgNode) -> usize {
    1 + tree.children.iter().map(count_nodes).sum::<usize>()
}

/// Depth of the deepest node; a lone root has depth 0.
pub fn max_depth(tree: &OrgNode) -> usize {
    tree.children
        .iter()
        .map(|c| 1 + max_depth(c))
        .max()
        .unwrap_or(0)
}

/// All ids in pre-order.
pub fn collect_ids(tree: &OrgNode) -> Vec<String> {
    let mut ids = Vec::new();
    collect_into(tree, &mut ids);
    ids
}

fn collect_into(node: &OrgNode, out: &mut Vec<String>) {
    out.push(node.id.clone());
    for child in &node.children {
        collect_into(child, out);
    }
}

/// Whether `node_id` lies strictly inside the subtree rooted at `ancestor_id`.
/// Returns false if `ancestor_id` is absent.
pub fn subtree_contains(tree: &OrgNode, ancestor_id: &str, node_id: &str) -> bool {
    match crate::tree::find_node(tree, ancestor_id) {
        Some(ancestor) => ancestor
            .children
            .iter()
            .any(|c| crate::tree::find_node(c, node_id).is_some()),
        None => false,
    }
}
