//! LanceDB vector backend.
//!
//! Stores each namespace as a LanceDB table, an embedded vector database
//! built on Apache Arrow and the Lance format.
//!
//! # Schema
//!
//! | Column | Type | Purpose |
//! |--------|------|---------|
//! | `id` | Utf8 | JSON-encoded entity identifier |
//! | `metadata` | Utf8 | JSON-serialized payload |
//! | `<index_name>` | FixedSizeList<Float32> (nullable) | One column per vector slot |
//!
//! Saves delete any rows for the identifier before inserting, so a record
//! is never stored twice.
//!
//! # Feature Gate
//!
//! This module requires the `vector-lancedb` feature.

use crate::backend::VectorStoreBackend;
use crate::types::{Distance, DocumentId, DocumentRecord, IndexConfiguration};
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::DistanceType;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use semsearch_core::{Error, Result};
use std::sync::{Arc, OnceLock};

const ID_COLUMN: &str = "id";
const METADATA_COLUMN: &str = "metadata";

/// LanceDB-backed vector store.
pub struct LancedbBackend {
    connection: lancedb::Connection,
    uri: String,
    config: OnceLock<IndexConfiguration>,
}

impl LancedbBackend {
    /// Connect to the LanceDB database at `uri` (a local directory or object store URL).
    pub async fn connect(uri: &str) -> Result<Self> {
        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Failed to connect to LanceDB: {e}")))?;

        Ok(Self {
            connection,
            uri: uri.to_string(),
            config: OnceLock::new(),
        })
    }

    fn bound(&self) -> Result<&IndexConfiguration> {
        self.config
            .get()
            .ok_or_else(|| Error::config("LanceDB backend used before configure()"))
    }

    async fn open_table(&self, namespace: &str) -> Result<lancedb::Table> {
        self.connection
            .open_table(namespace)
            .execute()
            .await
            .map_err(|e| match e {
                lancedb::Error::TableNotFound { .. } => Error::collection_not_found(namespace),
                other => Error::backend(format!("Failed to open table '{namespace}': {other}")),
            })
    }
}

#[async_trait]
impl VectorStoreBackend for LancedbBackend {
    async fn configure(&self, config: &IndexConfiguration) -> Result<()> {
        for reserved in [ID_COLUMN, METADATA_COLUMN] {
            if config.vector_slots.contains_key(reserved) {
                return Err(Error::config(format!(
                    "Index name '{reserved}' is reserved by the LanceDB backend"
                )));
            }
        }

        let bound = self.config.get_or_init(|| config.clone());
        if bound != config {
            return Err(Error::config(format!(
                "Backend already bound to namespace '{}'; cannot rebind to '{}'",
                bound.namespace, config.namespace
            )));
        }

        let existing = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Failed to list tables: {e}")))?;
        if existing.iter().any(|name| name == &config.namespace) {
            log::debug!("LanceDB table '{}' already exists", config.namespace);
            return Ok(());
        }

        let table = self
            .connection
            .create_empty_table(&config.namespace, make_schema(config)?)
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Failed to create LanceDB table: {e}")))?;

        // Scalar index on the identifier keeps delete-before-insert cheap.
        if let Err(e) = table
            .create_index(&[ID_COLUMN], lancedb::index::Index::BTree(Default::default()))
            .execute()
            .await
        {
            log::warn!(
                "Could not index '{ID_COLUMN}' on '{}': {e}",
                config.namespace
            );
        }

        log::info!(
            "Created LanceDB table '{}' at {} with {} vector slot(s)",
            config.namespace,
            self.uri,
            config.vector_slots.len()
        );
        Ok(())
    }

    async fn search(
        &self,
        index_name: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentId>> {
        let config = self.bound()?;
        config.check_vector(index_name, query)?;
        let distance = config
            .slot(index_name)
            .map(|s| s.distance)
            .unwrap_or_default();

        let table = self.open_table(&config.namespace).await?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let results = table
            .vector_search(query.to_vec())
            .map_err(|e| Error::backend(format!("Failed to create vector search: {e}")))?
            .column(index_name)
            .distance_type(distance_type(distance))
            .limit(limit)
            .select(Select::columns(&[ID_COLUMN]))
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| Error::backend(format!("Failed to collect results: {e}")))?;

        let mut ids = Vec::new();
        for batch in &batches {
            ids.extend(parse_ids(batch)?);
        }
        ids.truncate(limit);
        Ok(ids)
    }

    async fn save(&self, record: &DocumentRecord) -> Result<()> {
        let config = self.bound()?;
        for (index_name, vector) in &record.vectors {
            config.check_vector(index_name, vector)?;
        }

        let table = self.open_table(&config.namespace).await?;
        let batch = build_record_batch(config, record)?;
        let schema = batch.schema();

        table
            .delete(&id_predicate(&record.id)?)
            .await
            .map_err(|e| Error::backend(format!("Failed to replace record {}: {e}", record.id)))?;
        table
            .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Failed to insert record {}: {e}", record.id)))?;

        log::debug!("Saved record {} to LanceDB '{}'", record.id, config.namespace);
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> Result<()> {
        let config = self.bound()?;
        let table = self.open_table(&config.namespace).await?;

        table
            .delete(&id_predicate(id)?)
            .await
            .map_err(|e| Error::backend(format!("Failed to delete record {id}: {e}")))?;

        log::debug!("Deleted record {id} from LanceDB '{}'", config.namespace);
        Ok(())
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

impl std::fmt::Debug for LancedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LancedbBackend")
            .field("uri", &self.uri)
            .field("namespace", &self.config.get().map(|c| c.namespace.as_str()))
            .finish()
    }
}

// ============================================================================
// Arrow schema and batch construction
// ============================================================================

fn distance_type(distance: Distance) -> DistanceType {
    match distance {
        Distance::Cosine => DistanceType::Cosine,
        Distance::Euclidean => DistanceType::L2,
        Distance::DotProduct => DistanceType::Dot,
    }
}

fn vector_field(name: &str, size: usize) -> Result<Field> {
    let size = i32::try_from(size)
        .map_err(|_| Error::config(format!("Vector size {size} for '{name}' is too large")))?;
    Ok(Field::new(
        name,
        DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), size),
        true,
    ))
}

/// Create the Arrow schema for a namespace: identifier, payload, then one
/// column per vector slot in index-name order.
fn make_schema(config: &IndexConfiguration) -> Result<Arc<Schema>> {
    let mut fields = vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(METADATA_COLUMN, DataType::Utf8, false),
    ];
    for (index_name, slot) in &config.vector_slots {
        fields.push(vector_field(index_name, slot.size)?);
    }
    Ok(Arc::new(Schema::new(fields)))
}

/// Build a one-row RecordBatch for a record. Slots the record has no vector
/// for are stored as nulls.
fn build_record_batch(config: &IndexConfiguration, record: &DocumentRecord) -> Result<RecordBatch> {
    let schema = make_schema(config)?;

    let id = serde_json::to_string(&record.id)?;
    let metadata = serde_json::to_string(&record.payload(&config.id_field))?;

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![id])),
        Arc::new(StringArray::from(vec![metadata])),
    ];
    for (index_name, slot) in &config.vector_slots {
        let size = i32::try_from(slot.size)
            .map_err(|_| Error::config(format!("Vector size too large for '{index_name}'")))?;
        let values = record
            .vectors
            .get(index_name)
            .map(|v| v.iter().copied().map(Some).collect::<Vec<_>>());
        columns.push(Arc::new(
            FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vec![values], size),
        ));
    }

    RecordBatch::try_new(schema, columns)
        .map_err(|e| Error::backend(format!("Failed to create RecordBatch: {e}")))
}

/// SQL predicate matching every row stored for `id`.
fn id_predicate(id: &DocumentId) -> Result<String> {
    let encoded = serde_json::to_string(id)?;
    Ok(format!("{ID_COLUMN} = '{}'", encoded.replace('\'', "''")))
}

/// Decode the identifier column of a search result batch.
fn parse_ids(batch: &RecordBatch) -> Result<Vec<DocumentId>> {
    let id_col = batch
        .column_by_name(ID_COLUMN)
        .ok_or_else(|| Error::backend("Missing 'id' column in results"))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::backend("'id' column is not StringArray"))?;

    (0..id_col.len())
        .map(|i| {
            serde_json::from_str(id_col.value(i)).map_err(|e| {
                Error::backend(format!("Undecodable id '{}' in results: {e}", id_col.value(i)))
            })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
