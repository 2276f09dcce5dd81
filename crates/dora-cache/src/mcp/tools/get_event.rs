//! Get event tool implementation.

use crate::mcp::params::EventParams;
use crate::mcp::tools::common::{cache_error, json_result, parse_event};
use dora_cache_app::{AsyncCacheStore, EventCache};
use rmcp::ErrorData as McpError;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;

/// Fetch the cached entry for the event, or JSON `null` on a miss.
pub async fn handle_get_event<S: AsyncCacheStore>(
    cache: &EventCache<S>,
    Parameters(params): Parameters<EventParams>,
) -> Result<CallToolResult, McpError> {
    let event = parse_event(params.event_data)?;
    let entry = cache.try_get_event(&event).await.map_err(|e| cache_error(&e))?;
    json_result(&entry)
}
