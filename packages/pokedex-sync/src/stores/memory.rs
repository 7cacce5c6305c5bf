//! In-memory entry store for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{EntryStore, ImportSource, ImportSummary, PokedexEntry, StoreError};

/// Entry store keeping everything in process memory.
///
/// Useful for tests and development. Not suitable for production as data
/// is lost on drop.
#[derive(Default)]
pub struct MemoryEntryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, PokedexEntry>,
    next_id: i64,
}

impl MemoryEntryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn import_entries(
        &self,
        sources: Vec<ImportSource>,
    ) -> Result<ImportSummary, StoreError> {
        // Validate the whole batch before touching the map, so a bad
        // record leaves nothing behind.
        let mut rows = Vec::with_capacity(sources.len());
        for source in &sources {
            let (name, url) = source.fields()?;
            rows.push((source.index as i64, name.to_string(), url.to_string()));
        }

        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        let imported_at = Utc::now();
        let mut summary = ImportSummary::default();

        for (position, name, url) in rows {
            if let Some(entry) = inner.by_name.get_mut(&name) {
                entry.position = position;
                entry.url = url;
                entry.imported_at = imported_at;
                summary.updated += 1;
            } else {
                inner.next_id += 1;
                let entry = PokedexEntry {
                    id: inner.next_id,
                    position,
                    name: name.clone(),
                    url,
                    imported_at,
                };
                inner.by_name.insert(name, entry);
                summary.inserted += 1;
            }
        }

        Ok(summary)
    }

    async fn list_entries(&self) -> Result<Vec<PokedexEntry>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<_> = inner.by_name.values().cloned().collect();
        entries.sort_by_key(|entry| entry.position);
        Ok(entries)
    }

    async fn entry_count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().unwrap().by_name.len() as u64)
    }
}
