//! Writes that mirror entity mutations into the vector store.

use async_trait::async_trait;
use semsearch_core::Result;
use semsearch_vector::{DocumentId, VectorStoreBackend};
use std::sync::Arc;

use crate::entity::Entity;
use crate::locks::IdLocks;
use crate::mapper::DocumentMapper;
use crate::signals::SignalHandler;

/// Maps entities and applies saves and deletes to one backend.
///
/// Writes for the same identifier are serialized through the shared
/// [`IdLocks`].
pub struct Synchronizer<E: Entity> {
    mapper: Arc<DocumentMapper<E>>,
    backend: Arc<dyn VectorStoreBackend>,
    locks: IdLocks,
}

impl<E: Entity> Synchronizer<E> {
    /// Create a synchronizer.
    pub fn new(
        mapper: Arc<DocumentMapper<E>>,
        backend: Arc<dyn VectorStoreBackend>,
        locks: IdLocks,
    ) -> Self {
        Self {
            mapper,
            backend,
            locks,
        }
    }

    /// The document mapper.
    pub fn mapper(&self) -> &Arc<DocumentMapper<E>> {
        &self.mapper
    }

    /// The backend written to.
    pub fn backend(&self) -> &Arc<dyn VectorStoreBackend> {
        &self.backend
    }

    /// Map `entity` and upsert its record.
    pub async fn save(&self, entity: &E) -> Result<DocumentId> {
        let id = self.mapper.identifier(entity)?;
        let _guard = self.locks.acquire(&id).await;

        let record = self.mapper.to_document(entity).await?;
        self.backend.save(&record).await?;

        log::debug!("Synced {} {id} to vector store", self.mapper.schema().name());
        Ok(id)
    }

    /// Remove `entity`'s record.
    pub async fn delete(&self, entity: &E) -> Result<DocumentId> {
        let id = self.mapper.identifier(entity)?;
        let _guard = self.locks.acquire(&id).await;

        self.backend.delete(&id).await?;

        log::debug!(
            "Removed {} {id} from vector store",
            self.mapper.schema().name()
        );
        Ok(id)
    }
}

impl<E: Entity> Clone for Synchronizer<E> {
    fn clone(&self) -> Self {
        Self {
            mapper: self.mapper.clone(),
            backend: self.backend.clone(),
            locks: self.locks.clone(),
        }
    }
}

/// Saved-signal receiver: upserts the entity's record.
pub struct SaveHandler<E: Entity>(pub Synchronizer<E>);

/// Deleted-signal receiver: removes the entity's record.
pub struct DeleteHandler<E: Entity>(pub Synchronizer<E>);

#[async_trait]
impl<E: Entity> SignalHandler<E> for SaveHandler<E> {
    async fn handle(&self, entity: &E) -> Result<()> {
        self.0.save(entity).await.map(|_| ())
    }
}

#[async_trait]
impl<E: Entity> SignalHandler<E> for DeleteHandler<E> {
    async fn handle(&self, entity: &E) -> Result<()> {
        self.0.delete(entity).await.map(|_| ())
    }
}
