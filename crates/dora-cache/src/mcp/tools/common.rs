//! Shared helpers for MCP tool implementations.

use dora_cache_app::CacheError;
use dora_cache_core::EventData;
use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::Value;

/// Decode an `event_data` argument, rejecting anything but a JSON object.
pub fn parse_event(raw: Value) -> Result<EventData, McpError> {
    match raw {
        Value::Object(map) => Ok(EventData::from(map)),
        _ => Err(McpError::invalid_params("event_data must be an object", None)),
    }
}

/// Map a facade failure onto an MCP internal error.
pub fn cache_error(err: &CacheError) -> McpError {
    McpError::internal_error(err.to_string(), None)
}

/// Render `value` as the single JSON text block of a successful result.
pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json_str = serde_json::to_string(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json_str)]))
}

#[cfg(test)]
pub mod testing {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use dora_cache_app::{CacheSettings, EventCache};
    use dora_cache_core::ManualClock;
    use dora_cache_store_sqlite::SqliteStore;
    use rmcp::model::CallToolResult;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};
    use time::macros::datetime;

    pub fn cache() -> (TempDir, EventCache) {
        let dir = tempdir().expect("create temp dir");
        let store = SqliteStore::open(dir.path().join("cache.db")).expect("open store");
        let clock = Arc::new(ManualClock::new(datetime!(2025-07-01 12:00 UTC)));
        (dir, EventCache::with_store(store, CacheSettings::default(), clock))
    }

    pub fn text_json(result: &CallToolResult) -> Value {
        let content = result
            .content
            .first()
            .and_then(|item| item.as_text().map(|text| text.text.clone()))
            .expect("text content");
        serde_json::from_str(&content).expect("tool output is JSON")
    }
}
