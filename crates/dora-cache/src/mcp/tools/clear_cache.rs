//! Clear cache tool implementation.

use crate::mcp::params::{ClearCacheParams, ClearedResponse};
use crate::mcp::tools::common::{cache_error, json_result};
use dora_cache_app::{AsyncCacheStore, EventCache};
use rmcp::ErrorData as McpError;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;

/// Delete all entries, or only those older than the given number of days.
pub async fn handle_clear_cache<S: AsyncCacheStore>(
    cache: &EventCache<S>,
    Parameters(params): Parameters<ClearCacheParams>,
) -> Result<CallToolResult, McpError> {
    let deleted_entries = cache
        .try_clear(params.older_than_days)
        .await
        .map_err(|e| cache_error(&e))?;
    json_result(&ClearedResponse { deleted_entries })
}
