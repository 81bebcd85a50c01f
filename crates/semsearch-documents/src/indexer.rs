//! Bulk (re)indexing of entity batches.
//!
//! Used to backfill entities created before their index existed and to
//! repair records deleted out of band. Runs independently of the signal
//! path and can be repeated safely.

use futures::{StreamExt, stream};
use semsearch_core::Result;
use semsearch_vector::DocumentId;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::entity::Entity;
use crate::sync::Synchronizer;

/// Entities mapped and saved concurrently by default.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of a bulk indexing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of entities written.
    pub indexed: usize,

    /// Number of entities that failed.
    pub failed: usize,

    /// Run duration in milliseconds.
    pub duration_ms: u64,

    /// Errors encountered (if not fail-fast).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IndexError>,
}

impl IndexStats {
    /// Whether every entity was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// An error for one entity during bulk indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexError {
    /// The entity's identifier, when it has one.
    pub id: Option<DocumentId>,
    /// Error message.
    pub message: String,
}

/// Re-embeds and upserts arbitrary entity batches.
pub struct BulkIndexer<E: Entity> {
    sync: Synchronizer<E>,
    concurrency: usize,
    fail_fast: bool,
}

impl<E: Entity> BulkIndexer<E> {
    /// Create an indexer that collects per-entity errors.
    pub fn new(sync: Synchronizer<E>) -> Self {
        Self {
            sync,
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
        }
    }

    /// Number of entities processed at once (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop at the first failing entity and return its error.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Index every entity in `entities`.
    ///
    /// In fail-fast mode the first error aborts the run; entities already
    /// written stay written. Otherwise failures are counted in the returned
    /// [`IndexStats`].
    pub async fn reindex<I>(&self, entities: I) -> Result<IndexStats>
    where
        I: IntoIterator<Item = E>,
        I::IntoIter: Send,
    {
        let start = Instant::now();
        let entity_type = self.sync.mapper().schema().name().to_string();
        let mut stats = IndexStats::default();

        let mut results = stream::iter(entities)
            .map(|entity| async move {
                self.sync
                    .save(&entity)
                    .await
                    .map_err(|err| (entity.id(), err))
            })
            .buffer_unordered(self.concurrency);

        while let Some(result) = results.next().await {
            match result {
                Ok(_) => stats.indexed += 1,
                Err((id, err)) => {
                    if self.fail_fast {
                        return Err(err);
                    }
                    let label = id.as_ref().map_or("<unsaved>".to_string(), |id| id.to_string());
                    log::warn!("Failed to index {entity_type} {label}: {err}");
                    stats.failed += 1;
                    stats.errors.push(IndexError {
                        id,
                        message: err.to_string(),
                    });
                }
            }
        }

        stats.duration_ms = duration_ms(start.elapsed());
        log::info!(
            "Indexed {} {entity_type} entit(ies), {} failed, in {}ms",
            stats.indexed,
            stats.failed,
            stats.duration_ms
        );
        Ok(stats)
    }
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
