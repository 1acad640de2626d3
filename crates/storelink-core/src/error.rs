//! Error types for storelink core.

use thiserror::Error;

/// Errors that can occur while building or reading state values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The value cannot be represented in the cross-context format.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The value could not be read back as the requested type.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The value contains something the canonical encoder rejects.
    #[error("canonical encoding error: {0}")]
    Canonical(String),

    /// A numeric store identity outside the known set.
    #[error("unknown store code: {0:#06x}")]
    UnknownStoreCode(u16),

    /// Context identifier could not be parsed.
    #[error("invalid context id: {0}")]
    InvalidContextId(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
