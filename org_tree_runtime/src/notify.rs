//! Change notification — explicit publish/subscribe for storage writes.
//!
//! Dependent views subscribe and refresh when a key they read changes.
//! Subscribers whose receiver was dropped are pruned on the next publish.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use tracing::debug;

/// Which namespace a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Tree,
    Avatar,
    Contracts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub kind: ChangeKind,
    /// Canonical hash of the new tree for `Tree` changes.
    pub hash: Option<String>,
}

#[derive(Debug, Default)]
pub struct ChangeBus {
    subscribers: Mutex<Vec<Sender<StorageChange>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<StorageChange> {
        let (tx, rx) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    /// Deliver `change` to every live subscriber. Returns how many got it.
    pub fn publish(&self, change: StorageChange) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| tx.send(change.clone()).is_ok());
        debug!("Published {:?} change for {:?} to {}", change.kind, change.key, subscribers.len());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
