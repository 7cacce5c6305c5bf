//! Bookkeeping for in-flight fetches, at most one per logical key.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

/// Identifies one logical in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKey {
    /// The collection-level fetch. Only one may run at a time.
    Collection,
    /// A per-record details fetch, keyed by the record's row id.
    Entry(i64),
}

/// Maps each [`FetchKey`] to the cancellation token of its current
/// operation.
///
/// Owned by the service driver task, so no locking is needed. Entries are
/// not pruned on completion: a finished operation's token is harmless, and
/// its slot is reused by the next same-keyed fetch.
#[derive(Debug, Default)]
pub struct InflightRegistry {
    inflight: HashMap<FetchKey, CancellationToken>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` as the live operation for `key`, cancelling any
    /// operation previously registered under the same key.
    pub fn begin(&mut self, key: FetchKey, token: CancellationToken) {
        if let Some(prior) = self.inflight.remove(&key) {
            prior.cancel();
        }
        self.inflight.insert(key, token);
    }

    /// Number of keys with a registered operation, live or finished.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}
