//! List events tool implementation.

use crate::mcp::params::ListEventsParams;
use crate::mcp::tools::common::{cache_error, json_result};
use dora_cache_app::{AsyncCacheStore, EventCache};
use rmcp::ErrorData as McpError;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;

/// List recently accessed entries, newest first.
pub async fn handle_list_events<S: AsyncCacheStore>(
    cache: &EventCache<S>,
    Parameters(params): Parameters<ListEventsParams>,
) -> Result<CallToolResult, McpError> {
    let entries = cache
        .try_list_events(params.limit)
        .await
        .map_err(|e| cache_error(&e))?;
    json_result(&entries)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::mcp::tools::common::testing::{cache, text_json};
    use dora_cache_core::EventData;
    use serde_json::{Value, json};

    #[test]
    fn limit_defaults_to_ten() {
        let params: ListEventsParams = serde_json::from_value(json!({})).expect("params parse");
        assert_eq!(params.limit, 10);
    }

    #[tokio::test]
    async fn lists_summaries_up_to_limit() {
        let (_dir, cache) = cache();
        for name in ["A", "B", "C"] {
            cache
                .try_store_event(&EventData::new(name, "2025-07-01", "Town"), Value::Null, vec![], 1)
                .await
                .expect("store");
        }

        let listed = text_json(
            &handle_list_events(&cache, Parameters(ListEventsParams { limit: 2 }))
                .await
                .expect("tool should succeed"),
        );
        let listed = listed.as_array().expect("array");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["location"], "Town");
        assert_eq!(listed[0]["hit_count"], 0);
    }
}
