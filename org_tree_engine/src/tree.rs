/// Org Tree Engine — Traversal and Structural Mutations
///
/// ALL tree-shaping logic lives here.
/// Every operation borrows its input tree and returns a new owned tree;
/// the input is never mutated. Missing ids are silent no-ops.

use tracing::{debug, warn};

use crate::domain::{non_empty, Avatar, EmployeeRecord, NewNode, NodePatch, OrgNode, Role};
use crate::error::{Result, TreeError};
use crate::graph::subtree_contains;
use crate::ids::IdGenerator;
use crate::ROOT_ID;

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Pre-order depth-first search. Returns the first node with `node_id`.
pub fn find_node<'a>(tree: &'a OrgNode, node_id: &str) -> Option<&'a OrgNode> {
    if tree.id == node_id {
        return Some(tree);
    }
    tree.children.iter().find_map(|c| find_node(c, node_id))
}

/// Immediate parent of `node_id` (the node's supervisor in the hierarchy).
/// `None` for the root and for absent ids.
pub fn find_parent<'a>(tree: &'a OrgNode, node_id: &str) -> Option<&'a OrgNode> {
    if tree.children.iter().any(|c| c.id == node_id) {
        return Some(tree);
    }
    tree.children.iter().find_map(|c| find_parent(c, node_id))
}

// ---------------------------------------------------------------------------
// Generic traversal
// ---------------------------------------------------------------------------

/// Copy the tree once, then apply `transform` to every node of the copy in
/// pre-order. Traversal descends into whatever children the transform left
/// in place, so a transform may splice `children` of the node it visits.
pub fn update_tree<F>(tree: &OrgNode, mut transform: F) -> OrgNode
where
    F: FnMut(&mut OrgNode),
{
    let mut copy = tree.clone();
    walk_mut(&mut copy, &mut transform);
    copy
}

fn walk_mut<F>(node: &mut OrgNode, transform: &mut F)
where
    F: FnMut(&mut OrgNode),
{
    transform(node);
    for child in node.children.iter_mut() {
        walk_mut(child, transform);
    }
}

/// Field mapper: `f` sees every node pre-order with its children list
/// detached, so it can only change the node's own fields.
pub fn map_nodes<F>(tree: &OrgNode, mut f: F) -> OrgNode
where
    F: FnMut(&mut OrgNode),
{
    update_tree(tree, |node| {
        let children = std::mem::take(&mut node.children);
        f(node);
        node.children = children;
    })
}

/// Field mapper restricted to the first node with `node_id`.
pub fn update_node<F>(tree: &OrgNode, node_id: &str, f: F) -> OrgNode
where
    F: FnOnce(&mut OrgNode),
{
    let mut edit = Some(f);
    map_nodes(tree, |node| {
        if node.id == node_id {
            if let Some(edit) = edit.take() {
                edit(node);
            }
        }
    })
}

/// Parent-scoped children editor: `f` runs once on the children list of the
/// first node with `parent_id`.
pub fn splice_children<F>(tree: &OrgNode, parent_id: &str, f: F) -> OrgNode
where
    F: FnOnce(&mut Vec<OrgNode>),
{
    let mut edit = Some(f);
    update_tree(tree, |node| {
        if node.id == parent_id {
            if let Some(edit) = edit.take() {
                edit(&mut node.children);
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

/// Embedded avatar payload awaiting storage under `node_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarUpload {
    pub node_id: String,
    pub payload: String,
}

/// Outcome of `add_child_node`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedChild {
    pub tree: OrgNode,
    /// Id of the created node; `None` when the parent was not found.
    pub node_id: Option<String>,
    pub avatar_upload: Option<AvatarUpload>,
}

/// Build a node from `data` with the given id, `children: []` and
/// `show_in_neural_net: Some(true)`.
pub fn build_node(data: &NewNode, node_id: String) -> Result<(OrgNode, Option<AvatarUpload>)> {
    let name = non_empty(Some(data.name.as_str())).ok_or(TreeError::MissingField("name"))?;
    let role = non_empty(Some(data.role.as_str())).ok_or(TreeError::MissingField("role"))?;

    let (avatar, payload) = Avatar::from_input(data.avatar.as_deref().unwrap_or(""));
    let upload = payload.map(|payload| AvatarUpload {
        node_id: node_id.clone(),
        payload,
    });

    let node = OrgNode {
        id: node_id,
        name,
        role: Role::parse(&role),
        avatar,
        contact: non_empty(data.contact.as_deref()),
        contract: non_empty(data.contract.as_deref()),
        show_in_neural_net: Some(true),
        children: Vec::new(),
        contract_settings: data.contract_settings.clone(),
    };
    Ok((node, upload))
}

/// Append a freshly built node under `parent_id`.
///
/// Required fields are checked first. A missing parent leaves the tree
/// unchanged and consumes no id.
pub fn add_child_node(
    tree: &OrgNode,
    parent_id: &str,
    data: &NewNode,
    ids: &mut dyn IdGenerator,
) -> Result<AddedChild> {
    non_empty(Some(data.name.as_str())).ok_or(TreeError::MissingField("name"))?;
    non_empty(Some(data.role.as_str())).ok_or(TreeError::MissingField("role"))?;

    if find_node(tree, parent_id).is_none() {
        debug!("add_child_node: parent {:?} not found, tree unchanged", parent_id);
        return Ok(AddedChild {
            tree: tree.clone(),
            node_id: None,
            avatar_upload: None,
        });
    }

    let (node, avatar_upload) = build_node(data, ids.node_id())?;
    let node_id = node.id.clone();
    let new_tree = splice_children(tree, parent_id, |children| children.push(node));

    debug!("Added node {} under {}", node_id, parent_id);
    Ok(AddedChild {
        tree: new_tree,
        node_id: Some(node_id),
        avatar_upload,
    })
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Outcome of `update_node_fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedNode {
    pub tree: OrgNode,
    pub found: bool,
    pub avatar_upload: Option<AvatarUpload>,
}

/// Apply a field patch to `node_id`. Blank names or roles are rejected.
pub fn update_node_fields(tree: &OrgNode, node_id: &str, patch: &NodePatch) -> Result<UpdatedNode> {
    if let Some(name) = &patch.name {
        non_empty(Some(name.as_str())).ok_or(TreeError::MissingField("name"))?;
    }
    if let Some(role) = &patch.role {
        non_empty(Some(role.as_str())).ok_or(TreeError::MissingField("role"))?;
    }

    if find_node(tree, node_id).is_none() {
        debug!("update_node_fields: node {:?} not found, tree unchanged", node_id);
        return Ok(UpdatedNode {
            tree: tree.clone(),
            found: false,
            avatar_upload: None,
        });
    }

    let mut avatar_upload = None;
    let new_tree = update_node(tree, node_id, |node| {
        if let Some(name) = non_empty(patch.name.as_deref()) {
            node.name = name;
        }
        if let Some(role) = non_empty(patch.role.as_deref()) {
            node.role = Role::parse(&role);
        }
        if let Some(input) = &patch.avatar {
            let (avatar, payload) = Avatar::from_input(input);
            node.avatar = avatar;
            avatar_upload = payload.map(|payload| AvatarUpload {
                node_id: node.id.clone(),
                payload,
            });
        }
        if let Some(contact) = &patch.contact {
            node.contact = non_empty(Some(contact.as_str()));
        }
        if let Some(contract) = &patch.contract {
            node.contract = non_empty(Some(contract.as_str()));
        }
        if let Some(visible) = patch.show_in_neural_net {
            node.show_in_neural_net = Some(visible);
        }
        if let Some(settings) = &patch.contract_settings {
            node.contract_settings = Some(settings.clone());
        }
    });

    Ok(UpdatedNode {
        tree: new_tree,
        found: true,
        avatar_upload,
    })
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

/// Remove `node_id` and its whole subtree.
///
/// Removing the root discards the tree and returns a copy of `seed`.
pub fn remove_node(tree: &OrgNode, node_id: &str, seed: &OrgNode) -> OrgNode {
    if node_id == tree.id {
        debug!("Root {} removed, resetting to seed tree", node_id);
        return seed.clone();
    }
    update_tree(tree, |node| node.children.retain(|c| c.id != node_id))
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// Detach phase of a move: splice `node_id` out of its parent's children.
/// Returns the shrunk tree and the detached subtree, if any.
pub fn detach_node(tree: &OrgNode, node_id: &str) -> (OrgNode, Option<OrgNode>) {
    let mut detached = None;
    let rest = update_tree(tree, |node| {
        if detached.is_some() {
            return;
        }
        if let Some(pos) = node.children.iter().position(|c| c.id == node_id) {
            detached = Some(node.children.remove(pos));
        }
    });
    (rest, detached)
}

/// Re-parent `dragged_id` under `target_id`.
///
/// The dragged subtree is detached first and the reattach point is searched
/// in the post-detachment tree only, so a target inside the dragged subtree
/// is unreachable. No-ops: same ids, dragged node absent (or the root), and
/// target absent from the post-detachment tree.
pub fn move_node(dragged_id: &str, target_id: &str, tree: &OrgNode) -> OrgNode {
    if dragged_id == target_id {
        return tree.clone();
    }

    let (detached_tree, dragged) = detach_node(tree, dragged_id);
    let Some(dragged) = dragged else {
        debug!("move_node: {:?} not found among children, tree unchanged", dragged_id);
        return tree.clone();
    };

    if find_node(&detached_tree, target_id).is_none() {
        warn!(
            "move_node: target {:?} not reachable after detaching {:?}, tree unchanged",
            target_id, dragged_id
        );
        return tree.clone();
    }
    debug_assert!(
        !subtree_contains(tree, dragged_id, target_id),
        "reattach target must not live inside the detached subtree"
    );

    debug!("Moved {} under {}", dragged_id, target_id);
    splice_children(&detached_tree, target_id, |children| children.push(dragged))
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Nodes eligible for the radial diagram, in pre-order. The reserved root
/// is never included; hidden nodes still contribute their descendants.
pub fn visible_nodes(tree: &OrgNode) -> Vec<&OrgNode> {
    let mut out = Vec::new();
    collect_visible(tree, &mut out);
    out
}

fn collect_visible<'a>(node: &'a OrgNode, out: &mut Vec<&'a OrgNode>) {
    if node.id != ROOT_ID && node.is_visible() {
        out.push(node);
    }
    for child in &node.children {
        collect_visible(child, out);
    }
}

/// One flat record per non-root node, pre-order.
pub fn flatten_tree_to_employees(tree: &OrgNode) -> Vec<EmployeeRecord> {
    let mut out = Vec::new();
    flatten_into(tree, None, &mut out);
    out
}

fn flatten_into(node: &OrgNode, parent_id: Option<&str>, out: &mut Vec<EmployeeRecord>) {
    if let Some(supervisor_id) = parent_id {
        out.push(employee_record(node, supervisor_id));
    }
    for child in &node.children {
        flatten_into(child, Some(&node.id), out);
    }
}

fn employee_record(node: &OrgNode, supervisor_id: &str) -> EmployeeRecord {
    let contact = node.contact.clone().unwrap_or_default();
    let (email, phone) = if contact.contains('@') {
        (contact, String::new())
    } else {
        (String::new(), contact)
    };
    EmployeeRecord {
        id: node.id.clone(),
        name: node.name.clone(),
        role: node.role.label().to_string(),
        email,
        phone,
        supervisor_id: supervisor_id.to_string(),
        contract: node.contract.clone().unwrap_or_default(),
        avatar: node.avatar.clone(),
    }
}
