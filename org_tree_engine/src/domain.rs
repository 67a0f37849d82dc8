/// Org Tree Engine — Core Domain Types
///
/// Pure data. No traversal, no mutation logic.
/// Persisted JSON uses camelCase keys to stay compatible with stored trees.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

// ── Roles ──────────────────────────────────────────────────────────

/// Organizational role of a node.
///
/// Known roles are tagged so behaviour keyed on them (contract sync) cannot
/// be broken by a typo; anything else is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Director,
    Manager,
    Coordinator,
    Supervisor,
    Technician,
    Other(String),
}

impl Role {
    /// Parse a free-form label. Known labels match case-insensitively,
    /// in Portuguese or English.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "diretor" | "director" => Role::Director,
            "gerente" | "manager" => Role::Manager,
            "coordenador" | "coordinator" => Role::Coordinator,
            "supervisor" => Role::Supervisor,
            "técnico" | "tecnico" | "technician" => Role::Technician,
            _ => Role::Other(trimmed.to_string()),
        }
    }

    /// Display label as stored and shown in the dashboard.
    pub fn label(&self) -> &str {
        match self {
            Role::Director => "Diretor",
            Role::Manager => "Gerente",
            Role::Coordinator => "Coordenador",
            Role::Supervisor => "Supervisor",
            Role::Technician => "Técnico",
            Role::Other(label) => label,
        }
    }

    /// Whether a contract set on a direct child of this role is mirrored
    /// into the contract list.
    pub fn is_contract_sync_boundary(&self) -> bool {
        matches!(self, Role::Supervisor)
    }

    pub fn is_blank(&self) -> bool {
        self.label().trim().is_empty()
    }
}

impl From<String> for Role {
    fn from(label: String) -> Self {
        Role::parse(&label)
    }
}

impl From<&str> for Role {
    fn from(label: &str) -> Self {
        Role::parse(label)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.label().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Avatars ────────────────────────────────────────────────────────

/// Prefix identifying an embedded image payload (data URL).
pub const EMBEDDED_IMAGE_PREFIX: &str = "data:image/";

/// Avatar reference held by a node. Embedded payloads never live in the
/// tree; they sit in avatar storage keyed by the node id.
///
/// Serialized tagged (`{"kind":"external","src":...}`). Plain strings, as
/// found in trees saved before avatars moved to their own storage, are also
/// accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "src", rename_all = "snake_case")]
pub enum Avatar {
    #[default]
    Placeholder,
    External(String),
    Stored,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AvatarRepr {
    Plain(String),
    Tagged(TaggedAvatar),
}

#[derive(Deserialize)]
#[serde(tag = "kind", content = "src", rename_all = "snake_case")]
enum TaggedAvatar {
    Placeholder,
    External(String),
    Stored,
}

impl<'de> Deserialize<'de> for Avatar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match AvatarRepr::deserialize(deserializer)? {
            AvatarRepr::Tagged(TaggedAvatar::Placeholder) => Avatar::Placeholder,
            AvatarRepr::Tagged(TaggedAvatar::External(src)) => Avatar::External(src),
            AvatarRepr::Tagged(TaggedAvatar::Stored) => Avatar::Stored,
            AvatarRepr::Plain(input) => {
                let (avatar, payload) = Avatar::from_input(&input);
                if payload.is_some() {
                    warn!("Embedded avatar found inline in a tree document; payload must be moved to avatar storage");
                }
                avatar
            }
        })
    }
}

impl Avatar {
    /// Classify an avatar input string. Returns the avatar to record on the
    /// node and, for embedded payloads, the payload the caller must store.
    pub fn from_input(input: &str) -> (Avatar, Option<String>) {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            (Avatar::Placeholder, None)
        } else if trimmed.starts_with(EMBEDDED_IMAGE_PREFIX) {
            (Avatar::Stored, Some(trimmed.to_string()))
        } else {
            (Avatar::External(trimmed.to_string()), None)
        }
    }
}

// ── Tree nodes ─────────────────────────────────────────────────────

/// A single entry in the organizational hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgNode {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Avatar,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_neural_net: Option<bool>,
    #[serde(default)]
    pub children: Vec<OrgNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_settings: Option<serde_json::Value>,
}

impl OrgNode {
    /// Bare node with no optional fields and no children.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<Role>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            avatar: Avatar::Placeholder,
            contact: None,
            contract: None,
            show_in_neural_net: None,
            children: Vec::new(),
            contract_settings: None,
        }
    }

    /// Builder-style child append, used for seed and test trees.
    pub fn with_child(mut self, child: OrgNode) -> Self {
        self.children.push(child);
        self
    }

    /// Only an explicit `false` hides a node from the radial view.
    pub fn is_visible(&self) -> bool {
        self.show_in_neural_net != Some(false)
    }
}

// ── Contracts ──────────────────────────────────────────────────────

/// Client/service agreement record, cross-referenced by org nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: String,
    pub name: String,
    pub supervisor_id: String,
    pub supervisor_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub background_image: String,
}

// ── Flat projection ────────────────────────────────────────────────

/// One row of the flat employee list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
    pub supervisor_id: String,
    pub contract: String,
    pub avatar: Avatar,
}

// ── Mutation inputs ────────────────────────────────────────────────

/// Data for a node created by `add_child_node`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub contract_settings: Option<serde_json::Value>,
}

/// Field update for an existing node. `None` leaves a field untouched;
/// `Some("")` on `contact` or `contract` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub show_in_neural_net: Option<bool>,
    #[serde(default)]
    pub contract_settings: Option<serde_json::Value>,
}

/// Empty strings collapse to `None`.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
