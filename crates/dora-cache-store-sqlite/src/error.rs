//! Error types for the SQLite cache store.

use thiserror::Error;

/// Errors that can occur during `SqliteStore` operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite reported a failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database file is damaged.
    #[error("Cache database corrupt: {0}")]
    Corrupt(String),

    /// A stored or supplied document could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored timestamp is out of range.
    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other unclassified error.
    #[error("Other error: {0}")]
    Other(String),
}

impl StoreError {
    /// Reclassify SQLite corruption codes so callers can tell them apart.
    pub(crate) fn classify(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase) => {
                Self::Corrupt(err.to_string())
            }
            _ => Self::Database(err),
        }
    }

    /// Whether the backing file should be considered unusable.
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }
}
