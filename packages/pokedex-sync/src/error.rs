//! The closed failure taxonomy of the sync pipeline.

use thiserror::Error;

use crate::decode::DecodeError;
use crate::stores::StoreError;
use crate::transport::TransportError;

/// Everything a sync operation can fail with.
///
/// Every stage failure is normalized into exactly one of these variants
/// before it reaches observers; no transport, decoding, or persistence
/// error type leaks past the pipeline boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport request failed.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// The response body was well-formed JSON of the wrong shape.
    #[error("parse error: {0}")]
    Parse(#[from] DecodeError),

    /// The importer rejected or failed to persist the batch.
    #[error("save error: {0}")]
    Save(#[from] StoreError),

    /// Anything else that went wrong while running the pipeline body,
    /// including bodies that are not valid JSON at all.
    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, SyncError>;
