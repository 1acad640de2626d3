//! Error types for the sync module.

use storelink_core::{CoreError, StoreName};
use thiserror::Error;

use crate::messages::CorrelationToken;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Payload cannot cross the channel. Raised before anything is sent.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Inbound bytes could not be decoded into an envelope.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// No response arrived for a request within the configured window.
    #[error("no response for {store} (token {token}) before timeout")]
    DeliveryTimeout {
        store: StoreName,
        token: CorrelationToken,
    },

    /// An envelope names a store with no local store or proxy.
    #[error("unknown store id: {0}")]
    UnknownStoreId(StoreName),

    /// No destination accepted a message that expects a reply.
    #[error("no reachable destination for {0}")]
    Unreachable(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The local end of the channel is closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] storelink_store::StoreError),
}

impl From<CoreError> for SyncError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Serialization(msg) | CoreError::Canonical(msg) => {
                SyncError::Serialization(msg)
            }
            CoreError::Deserialization(msg) | CoreError::InvalidContextId(msg) => {
                SyncError::InvalidMessage(msg)
            }
            CoreError::UnknownStoreCode(code) => {
                SyncError::InvalidMessage(format!("unknown store code {code:#06x}"))
            }
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
