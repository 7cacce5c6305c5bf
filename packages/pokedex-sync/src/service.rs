//! The sync service: fetches the collection, decodes it, imports it, and
//! publishes progress.
//!
//! All mutable service state (the inflight registry and the published
//! state) is owned by one driver task. Entry points and retry handles talk
//! to it over a command channel; pipeline workers report back over a
//! completion channel. Because only the driver publishes, observers never
//! see interleaved or torn updates, and a superseded fetch can never
//! overwrite the state its successor published.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SyncConfig;
use crate::decode::decode_collection;
use crate::error::{Result, SyncError};
use crate::registry::{FetchKey, InflightRegistry};
use crate::state::{StatePublisher, SyncState};
use crate::stores::{EntryStore, ImportSource, ImportSummary, PokedexEntry};
use crate::transport::Transport;

#[derive(Debug)]
enum Command {
    FetchCollection,
    FetchEntryDetails(PokedexEntry),
}

/// Terminal report of one collection pipeline worker.
struct Completion {
    token: CancellationToken,
    result: Result<ImportSummary>,
}

/// Re-triggers the collection fetch when invoked.
///
/// Holds only the service's command channel, so it can be cloned into
/// published state and invoked any number of times without keeping the
/// service alive or forming a reference cycle. Invocations after the
/// service shut down are no-ops.
#[derive(Debug, Clone)]
pub struct RetryHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RetryHandle {
    /// Restart the collection fetch from scratch.
    pub fn retry(&self) {
        let _ = self.commands.send(Command::FetchCollection);
    }
}

/// Keeps a local entry store in sync with the remote collection and
/// publishes progress to observers.
///
/// Construction starts the first collection fetch immediately; dropping
/// the service cancels whatever is still in flight.
pub struct SyncService {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SyncState>,
    shutdown: CancellationToken,
}

impl SyncService {
    /// Spawn the service onto the current Tokio runtime and start the
    /// first collection fetch.
    pub fn spawn<T, S>(config: SyncConfig, transport: T, store: S) -> Self
    where
        T: Transport + 'static,
        S: EntryStore + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let publisher = StatePublisher::new();
        let state = publisher.subscribe();
        let shutdown = CancellationToken::new();

        let driver = Driver {
            config,
            transport: Arc::new(transport),
            store: Arc::new(store),
            registry: InflightRegistry::new(),
            publisher,
            commands: commands_tx.clone(),
            completions: completions_tx,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(driver.run(commands_rx, completions_rx));

        let service = Self {
            commands: commands_tx,
            state,
            shutdown,
        };
        service.fetch_collection();
        service
    }

    /// (Re)start the collection fetch.
    ///
    /// Starting a fetch while one is in flight supersedes the older one;
    /// only the newer outcome reaches observers.
    pub fn fetch_collection(&self) {
        let _ = self.commands.send(Command::FetchCollection);
    }

    /// Fetch the auxiliary details payload for one imported record.
    ///
    /// Details fetches are independent per record: refetching the same
    /// record cancels only its own prior request. The payload is currently
    /// discarded on both success and failure.
    pub fn fetch_entry_details(&self, entry: &PokedexEntry) {
        let _ = self
            .commands
            .send(Command::FetchEntryDetails(entry.clone()));
    }

    /// Observe state transitions. May be called any number of times.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Current state snapshot.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver<T, S> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<S>,
    registry: InflightRegistry,
    publisher: StatePublisher,
    commands: mpsc::UnboundedSender<Command>,
    completions: mpsc::UnboundedSender<Completion>,
    shutdown: CancellationToken,
}

impl<T, S> Driver<T, S>
where
    T: Transport + 'static,
    S: EntryStore + 'static,
{
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(command) = commands.recv() => self.handle_command(command),
                Some(completion) = completions.recv() => self.handle_completion(completion),
            }
        }
        debug!("sync service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::FetchCollection => self.start_collection_fetch(),
            Command::FetchEntryDetails(entry) => self.start_entry_fetch(entry),
        }
    }

    fn start_collection_fetch(&mut self) {
        let token = self.shutdown.child_token();
        self.registry.begin(FetchKey::Collection, token.clone());
        self.publisher.publish(SyncState::Loading);

        let url = self.config.collection_url();
        info!(url = %url, "fetching collection");

        let transport = self.transport.clone();
        let store = self.store.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = run_collection_pipeline(transport, store, url) => result,
            };
            let _ = completions.send(Completion { token, result });
        });
    }

    fn start_entry_fetch(&mut self, entry: PokedexEntry) {
        let url = match Url::parse(&entry.url) {
            Ok(url) => url,
            Err(error) => {
                debug!(entry = %entry.name, error = %error, "entry has unusable details url");
                return;
            }
        };

        let token = self.shutdown.child_token();
        self.registry.begin(FetchKey::Entry(entry.id), token.clone());
        debug!(entry = %entry.name, url = %url, "fetching entry details");

        let transport = self.transport.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = transport.get(&url) => match result {
                    // Nothing consumes the payload yet; both outcomes are
                    // terminal with no published effect.
                    Ok(body) => {
                        debug!(entry = %entry.name, bytes = body.len(), "entry details fetched")
                    }
                    Err(error) => {
                        debug!(entry = %entry.name, error = %error, "entry details fetch failed")
                    }
                }
            }
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        if completion.token.is_cancelled() {
            // A newer same-keyed fetch superseded this one; its outcome no
            // longer owns the published state.
            debug!("discarding stale completion");
            return;
        }

        match completion.result {
            Ok(summary) => {
                info!(
                    inserted = summary.inserted,
                    updated = summary.updated,
                    "collection import complete"
                );
                self.publisher.publish(SyncState::Ready);
            }
            Err(error) => {
                warn!(error = %error, "collection fetch failed");
                self.publisher.publish(SyncState::Failed {
                    error: Arc::new(error),
                    retry: RetryHandle {
                        commands: self.commands.clone(),
                    },
                });
            }
        }
    }
}

/// Transport, decode, and import stages of one collection fetch. The
/// first failing stage short-circuits the rest.
async fn run_collection_pipeline<T, S>(
    transport: Arc<T>,
    store: Arc<S>,
    url: Url,
) -> Result<ImportSummary>
where
    T: Transport,
    S: EntryStore,
{
    let body = transport.get(&url).await?;

    let value: Value =
        serde_json::from_slice(&body).map_err(|e| SyncError::Other(Box::new(e)))?;
    let records = decode_collection(&value)?;

    let sources = records
        .into_iter()
        .enumerate()
        .map(|(index, json)| ImportSource { index, json })
        .collect();

    let summary = store.import_entries(sources).await?;
    Ok(summary)
}
