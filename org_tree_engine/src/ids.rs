/// Org Tree Engine — Identifier Generation
///
/// Node ids:     `node-<unix-millis>-<9 base36 chars>`
/// Contract ids: `contract-<unix-millis>-<9 base36 chars>`
///
/// Generators are injected so tests can be deterministic.

use rand::Rng;

use crate::error::{Result, TreeError};

/// Length of the random base36 suffix.
pub const SUFFIX_LEN: usize = 9;

/// Source of fresh identifiers.
pub trait IdGenerator: Send {
    fn node_id(&mut self) -> String;
    fn contract_id(&mut self) -> String;
}

/// Timestamp + random suffix, the production generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn node_id(&mut self) -> String {
        format!("node-{}-{}", chrono::Utc::now().timestamp_millis(), base36_suffix())
    }

    fn contract_id(&mut self) -> String {
        format!("contract-{}-{}", chrono::Utc::now().timestamp_millis(), base36_suffix())
    }
}

/// Deterministic generator: `node-<n>-seq`, `contract-<n>-seq`.
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
    next_node: u64,
    next_contract: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn node_id(&mut self) -> String {
        self.next_node += 1;
        format!("node-{}-seq", self.next_node)
    }

    fn contract_id(&mut self) -> String {
        self.next_contract += 1;
        format!("contract-{}-seq", self.next_contract)
    }
}

fn base36_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .filter_map(|_| std::char::from_digit(rng.gen_range(0..36), 36))
        .collect()
}

/// Validate that a node ID matches `[a-zA-Z0-9_-]+`.
pub fn validate_node_id(node_id: &str) -> Result<()> {
    if node_id.is_empty()
        || !node_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(TreeError::InvalidNodeId(node_id.to_string()));
    }
    Ok(())
}
