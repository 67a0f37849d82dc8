/// Org Tree Engine — Mutation Requests
///
/// Mutations are pure data issued by the UI. They carry intent and payload
/// only; all shaping logic lives in `tree`.

use serde::{Deserialize, Serialize};

use crate::domain::{NewNode, NodePatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TreeMutation {
    UpdateNode {
        id: String,
        patch: NodePatch,
    },
    AddChild {
        parent_id: String,
        child: NewNode,
    },
    Remove {
        id: String,
    },
    Move {
        dragged_id: String,
        target_id: String,
    },
}

impl TreeMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            TreeMutation::UpdateNode { .. } => "update_node",
            TreeMutation::AddChild { .. } => "add_child",
            TreeMutation::Remove { .. } => "remove",
            TreeMutation::Move { .. } => "move",
        }
    }
}
