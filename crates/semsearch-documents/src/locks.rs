//! Per-identifier serialization of vector-store writes.

use semsearch_vector::DocumentId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Async locks keyed by entity identifier.
///
/// Mutation handlers and the bulk indexer share one instance per
/// registration, so a save and a delete for the same identifier never
/// interleave. Entries are pruned once nobody holds or waits on them.
#[derive(Debug, Clone, Default)]
pub struct IdLocks {
    locks: Arc<Mutex<HashMap<DocumentId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl IdLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: &DocumentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no identifier is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
