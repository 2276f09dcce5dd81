//! Application layer for Dora's event result cache.
//!
//! This crate provides the fail-open [`EventCache`] facade, configuration
//! loading, the async store seam with its local SQLite and server-mediated
//! implementations, and the cache-aware processing pipeline shared by the
//! CLI, the bot, the HTTP server and the MCP cache server.

pub mod async_store;
pub mod config;
pub mod error;
pub mod event_cache;
pub mod pipeline;
pub mod remote_store;

// Re-exports for convenience
pub use async_store::AsyncCacheStore;
pub use config::{CacheConfig, MAX_TTL_DAYS, ProjectConfig};
pub use error::CacheError;
pub use event_cache::{CacheSettings, EventCache};
pub use remote_store::McpCacheStore;
pub use pipeline::{
    CachedResult, EventProcessor, PipelineReport, ProcessedEvent, process_events_with_cache,
};
