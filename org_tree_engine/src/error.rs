//! Error types for the tree engine.
//!
//! Not-found conditions (missing parent, target or dragged node) are never
//! errors: operations return the tree unchanged instead.

use thiserror::Error;

/// Result type alias using the engine error.
pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A required node field was empty after trimming.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid node ID {0:?}: must match [a-zA-Z0-9_-]+")]
    InvalidNodeId(String),

    /// A candidate tree failed validation; the previous snapshot is kept.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Could not generate an unused node ID after {0} attempts")]
    IdSpaceExhausted(usize),
}
