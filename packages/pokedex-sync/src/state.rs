//! Observable sync state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::SyncError;
use crate::service::RetryHandle;

/// Phase of the primary sync operation.
///
/// Exactly one phase holds at any time, so observers can never see a
/// loading flag and an error simultaneously.
#[derive(Debug, Clone)]
pub enum SyncState {
    /// A collection fetch is in flight.
    Loading,
    /// The last collection fetch completed and its batch was imported.
    Ready,
    /// The last collection fetch failed; `retry` restarts it.
    Failed {
        error: Arc<SyncError>,
        retry: RetryHandle,
    },
}

impl SyncState {
    /// True exactly while a collection fetch is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, SyncState::Loading)
    }

    /// The error of the last fetch, present only in the failed phase.
    pub fn last_error(&self) -> Option<&SyncError> {
        match self {
            SyncState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The retry handle of the last failed fetch.
    pub fn retry_handle(&self) -> Option<&RetryHandle> {
        match self {
            SyncState::Failed { retry, .. } => Some(retry),
            _ => None,
        }
    }
}

/// Publishes [`SyncState`] transitions to any number of subscribers.
///
/// Thin wrapper over a watch channel: subscribers always observe the
/// latest state, and a publish is visible to every current subscriber
/// before the publishing task moves on.
#[derive(Debug)]
pub(crate) struct StatePublisher {
    tx: watch::Sender<SyncState>,
}

impl StatePublisher {
    /// New publisher starting in the loading phase.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SyncState::Loading);
        Self { tx }
    }

    pub fn publish(&self, state: SyncState) {
        // send_replace keeps the value current even before the first
        // subscriber arrives.
        self.tx.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.tx.subscribe()
    }
}
