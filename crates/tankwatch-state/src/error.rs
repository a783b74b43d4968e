//! Error types for the tankwatch reading and forecast stores.

use thiserror::Error;

/// Result type alias for store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised by the reading and forecast stores.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    /// A reading or forecast could not be encoded for storage.
    #[error("failed to encode record: {0}")]
    Encode(String),

    /// A stored row no longer decodes into its record type.
    #[error("corrupt row {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
