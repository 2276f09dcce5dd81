//! Check event tool implementation.

use crate::mcp::params::{EventParams, ExistsResponse};
use crate::mcp::tools::common::{cache_error, json_result, parse_event};
use dora_cache_app::{AsyncCacheStore, EventCache};
use rmcp::ErrorData as McpError;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;

/// Report whether a fresh result is cached for the event.
pub async fn handle_check_event<S: AsyncCacheStore>(
    cache: &EventCache<S>,
    Parameters(params): Parameters<EventParams>,
) -> Result<CallToolResult, McpError> {
    let event = parse_event(params.event_data)?;
    let exists = cache.try_check_event(&event).await.map_err(|e| cache_error(&e))?;
    json_result(&ExistsResponse { exists })
}
