#![forbid(unsafe_code)]

//! Organizational tree engine for the ARPOLAR operations dashboard.
//!
//! Pure, synchronous operations over an owned hierarchy of people, roles
//! and contracts. Every mutation returns a new tree; no I/O happens here.

/// Version bound into canonical hashes and persisted snapshots.
pub const TREE_FORMAT_VERSION: u32 = 1;

/// Reserved id of the root node.
pub const ROOT_ID: &str = "arpolar";

pub mod error;
pub mod domain;
pub mod ids;
pub mod seed;
pub mod graph;
pub mod tree;
pub mod contract_sync;
pub mod mutation;
pub mod invariants;
pub mod hashing;
pub mod engine;

pub use error::{Result, TreeError};
