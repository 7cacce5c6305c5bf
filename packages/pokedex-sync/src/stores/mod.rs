//! The transactional import contract and its backends.

mod memory;
mod sqlite;

pub use memory::MemoryEntryStore;
pub use sqlite::SqliteEntryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One imported record of the remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PokedexEntry {
    /// Local row id.
    pub id: i64,
    /// Zero-based position in the collection the record came from.
    pub position: i64,
    /// External identity; imports upsert on it.
    pub name: String,
    /// Details URL used by the per-record fetch.
    pub url: String,
    pub imported_at: DateTime<Utc>,
}

/// One input record for an import: the record's position in the fetched
/// collection plus its decoded JSON object.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub index: usize,
    pub json: Map<String, Value>,
}

impl ImportSource {
    /// Read the identity and details-url fields, rejecting records that
    /// miss or mistype them.
    pub(crate) fn fields(&self) -> Result<(&str, &str), StoreError> {
        let name = self
            .json
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidRecord {
                index: self.index,
                reason: "missing or non-string \"name\" field".to_string(),
            })?;
        let url = self
            .json
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidRecord {
                index: self.index,
                reason: "missing or non-string \"url\" field".to_string(),
            })?;
        Ok((name, url))
    }
}

/// Outcome counts of one atomic import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: u64,
    pub updated: u64,
}

/// An import or read against the entry store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record in the batch is unusable; the whole batch is rejected.
    #[error("invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Atomic batch import plus the read surface over imported records.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Upsert the whole batch by external identity, all-or-nothing: when
    /// this fails, no record of the batch is visible to readers.
    async fn import_entries(&self, sources: Vec<ImportSource>)
        -> Result<ImportSummary, StoreError>;

    /// All imported entries, in collection-position order.
    async fn list_entries(&self) -> Result<Vec<PokedexEntry>, StoreError>;

    async fn entry_count(&self) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S: EntryStore + ?Sized> EntryStore for Arc<S> {
    async fn import_entries(
        &self,
        sources: Vec<ImportSource>,
    ) -> Result<ImportSummary, StoreError> {
        (**self).import_entries(sources).await
    }

    async fn list_entries(&self) -> Result<Vec<PokedexEntry>, StoreError> {
        (**self).list_entries().await
    }

    async fn entry_count(&self) -> Result<u64, StoreError> {
        (**self).entry_count().await
    }
}
