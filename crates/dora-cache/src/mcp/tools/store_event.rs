//! Store event tool implementation.

use crate::mcp::params::{StoreEventParams, StoredResponse};
use crate::mcp::tools::common::{cache_error, json_result, parse_event};
use dora_cache_app::{AsyncCacheStore, EventCache};
use rmcp::ErrorData as McpError;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;

/// Store a processed result and return the fingerprint it was stored under.
pub async fn handle_store_event<S: AsyncCacheStore>(
    cache: &EventCache<S>,
    Parameters(params): Parameters<StoreEventParams>,
) -> Result<CallToolResult, McpError> {
    let event = parse_event(params.event_data)?;
    let key = cache
        .try_store_event(
            &event,
            params.classification,
            params.notifications,
            params.processing_time_ms,
        )
        .await
        .map_err(|e| cache_error(&e))?;
    json_result(&StoredResponse {
        event_id: key.to_string(),
    })
}
