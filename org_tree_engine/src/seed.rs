/// Org Tree Engine — Seed Tree
///
/// The default hierarchy used when no persisted tree exists, and the
/// result of removing the root.

use crate::domain::{OrgNode, Role};
use crate::ROOT_ID;

/// Id of the single director node in the seed tree.
pub const SEED_DIRECTOR_ID: &str = "dir1";

/// Build the seed tree: `arpolar` with a single `dir1` child.
pub fn seed_tree() -> OrgNode {
    let mut root = OrgNode::new(ROOT_ID, "ARPOLAR Refrigeração", Role::Other("Empresa".to_string()));
    root.show_in_neural_net = Some(true);

    let mut director = OrgNode::new(SEED_DIRECTOR_ID, "Diretoria", Role::Director);
    director.show_in_neural_net = Some(true);

    root.with_child(director)
}
