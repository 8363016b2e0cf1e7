//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MIME parsing or decoding failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailgate_mime::Error),

    /// The sender header names more than one address.
    #[error("More than one sender: `{0}`")]
    MalformedSender(String),

    /// Rollback state could not be persisted, so the removal was aborted.
    #[error("Cannot write rollback state to {}: {source}", path.display())]
    RollbackState {
        /// State file that could not be written.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// No handler with this name is registered.
    #[error("Unknown module handler: {0}")]
    UnknownHandler(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
