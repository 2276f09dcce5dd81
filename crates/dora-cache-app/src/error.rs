//! Error types surfaced by the cache facade.

use std::fmt;

/// Errors from the fallible (`try_*`) facade operations.
///
/// The fail-open operations never return these; they log them and fall back.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache is enabled but its storage location cannot be used.
    #[error("cache configuration error: {0}")]
    Configuration(String),

    /// A single store operation failed.
    #[error("cache {operation} failed: {message}")]
    Storage {
        /// Facade operation that failed.
        operation: &'static str,
        /// Rendered store error.
        message: String,
    },

    /// The cache is turned off.
    #[error("cache is disabled")]
    Disabled,
}

impl CacheError {
    pub(crate) fn storage(operation: &'static str, err: impl Into<anyhow::Error>) -> Self {
        Self::Storage {
            operation,
            message: format!("{:#}", err.into()),
        }
    }

    pub(crate) fn configuration(subject: impl fmt::Display, err: impl fmt::Display) -> Self {
        Self::Configuration(format!("{subject}: {err}"))
    }
}
