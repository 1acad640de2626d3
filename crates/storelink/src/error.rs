//! Error types for sessions.

use storelink_core::{CoreError, StoreName};
use storelink_store::StoreError;
use storelink_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Value or identifier error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Debug snapshot could not be rendered.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The session does not mirror this store.
    #[error("store not mirrored: {0}")]
    NotMirrored(StoreName),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
