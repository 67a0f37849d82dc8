#![forbid(unsafe_code)]

//! Runtime for the organizational tree engine.
//!
//! Provides the collaborators the engine needs: an injected key-value
//! store, tree snapshot persistence, avatar and contract storage, change
//! notification, tree diffing and session management.
//!
//! No tree algorithms live here; all shaping is delegated to the engine.

pub mod error;
pub mod config;
pub mod store;
pub mod snapshot_codec;
pub mod snapshot;
pub mod avatar;
pub mod contracts;
pub mod notify;
pub mod drift;
pub mod session;

pub use error::{Result, RuntimeError};
