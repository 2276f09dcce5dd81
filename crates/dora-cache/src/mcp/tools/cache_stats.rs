//! Cache statistics tool implementation.

use crate::mcp::tools::common::{cache_error, json_result};
use dora_cache_app::{AsyncCacheStore, EventCache};
use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;

/// Report aggregate cache statistics.
pub async fn handle_cache_stats<S: AsyncCacheStore>(cache: &EventCache<S>) -> Result<CallToolResult, McpError> {
    let stats = cache.try_stats().await.map_err(|e| cache_error(&e))?;
    json_result(&stats)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::mcp::tools::common::testing::{cache, text_json};

    #[tokio::test]
    async fn empty_cache_reports_zero_hit_rate() {
        let (_dir, cache) = cache();
        let stats = text_json(&handle_cache_stats(&cache).await.expect("tool should succeed"));
        assert_eq!(stats["total_entries"], 0);
        assert_eq!(stats["hit_rate"], 0.0);
        assert_eq!(stats["ttl_days"], 7);
        assert!(stats["oldest_entry"].is_null());
    }

    #[tokio::test]
    async fn disabled_cache_is_an_internal_error() {
        let cache: EventCache = EventCache::disabled();
        let err = handle_cache_stats(&cache).await.expect_err("disabled");
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    }
}
