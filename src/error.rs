//! Error types for card_vault

use thiserror::Error;

/// Unified error type for storage, validation and file operations.
///
/// Marketplace failures never appear here: the marketplace client degrades to
/// an empty result set at its own boundary instead of surfacing errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or created. Fatal: nothing can
    /// proceed without durable storage.
    #[error("cannot open database at {path}: {source}")]
    Open {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Entity rejected before any write was made
    #[error("invalid {entity}: {reason}")]
    Validation { entity: &'static str, reason: String },
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for card_vault storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
