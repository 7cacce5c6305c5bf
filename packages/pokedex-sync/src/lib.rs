//! Local mirror of a remote pokedex collection.
//!
//! One service object owns the whole fetch-decode-import pipeline:
//!
//! - fetch the collection endpoint over a [`Transport`]
//! - validate the payload shape with the strict decoder in [`decode`]
//! - import the records atomically through an [`EntryStore`]
//! - publish progress as [`SyncState`] to any number of subscribers
//!
//! Failed fetches publish a [`RetryHandle`] alongside the error; invoking
//! it restarts the pipeline from scratch. Details fetches for individual
//! records run independently of the collection fetch and of each other.

pub mod config;
pub mod decode;
pub mod error;
pub mod registry;
pub mod service;
pub mod state;
pub mod stores;
pub mod transport;

// Re-exports for clean API
pub use config::SyncConfig;
pub use decode::{DecodeError, JsonShape};
pub use error::SyncError;
pub use registry::FetchKey;
pub use service::{RetryHandle, SyncService};
pub use state::SyncState;
pub use stores::{
    EntryStore, ImportSource, ImportSummary, MemoryEntryStore, PokedexEntry, SqliteEntryStore,
    StoreError,
};
pub use transport::{HttpTransport, Transport, TransportError};
