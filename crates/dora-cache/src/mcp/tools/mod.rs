//! MCP tool implementations.

pub mod cache_stats;
pub mod check_event;
pub mod clear_cache;
pub mod common;
pub mod get_event;
pub mod list_events;
pub mod store_event;
