//! Parameter and response definitions for MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_LIST_LIMIT: usize = 10;

const fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

/// Parameters for tools addressing a single event.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EventParams {
    /// Event data containing `name`, `start_date`, `location`, and optionally `url`.
    pub event_data: Value,
}

/// Parameters for storing a processed event.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreEventParams {
    /// Original event data.
    pub event_data: Value,
    /// Event classification (size, importance, audiences).
    pub classification: Value,
    /// Generated notifications.
    pub notifications: Vec<Value>,
    /// Time taken to process the event.
    #[serde(default)]
    pub processing_time_ms: u64,
}

/// Parameters for clearing the cache.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClearCacheParams {
    /// Clear entries older than this many days. Clears everything when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than_days: Option<u32>,
}

/// Parameters for listing cached events.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListEventsParams {
    /// Maximum number of events to return.
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

impl Default for ListEventsParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Response for `check_event`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExistsResponse {
    /// Whether a fresh entry exists.
    pub exists: bool,
}

/// Response for `store_event`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoredResponse {
    /// Fingerprint the entry was stored under.
    pub event_id: String,
}

/// Response for `clear_cache`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClearedResponse {
    /// Number of entries removed.
    pub deleted_entries: u64,
}
