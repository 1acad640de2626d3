//! Error types for the store module.

use storelink_core::{CoreError, StoreName};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store with this name is already registered.
    #[error("store {0} is already registered")]
    DuplicateStore(StoreName),

    /// No store with this name is registered.
    #[error("store {0} is not registered")]
    NotFound(StoreName),

    /// State could not be converted to or from the requested type.
    #[error("state error: {0}")]
    State(#[from] CoreError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
