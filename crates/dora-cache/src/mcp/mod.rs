//! MCP server exposing the event cache over stdio.

mod params;
mod tools;

pub use params::*;

use anyhow::Result;
use dora_cache_app::EventCache;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::tool::{ToolCallContext, ToolRouter};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, InitializeResult, ListToolsResult,
    ProtocolVersion, ServerCapabilities,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServiceExt, tool, tool_router};
use std::sync::Arc;

/// MCP server for the event cache.
#[derive(Clone)]
pub struct DoraCacheServer {
    tool_router: ToolRouter<Self>,
    cache: Arc<EventCache>,
}

#[tool_router]
impl DoraCacheServer {
    /// Create a new MCP server instance.
    pub fn new(cache: EventCache) -> Self {
        Self {
            tool_router: Self::tool_router(),
            cache: Arc::new(cache),
        }
    }

    /// Check whether an event is cached.
    #[tool(description = "Check if an event exists in the cache")]
    async fn check_event(&self, params: Parameters<EventParams>) -> Result<CallToolResult, McpError> {
        tools::check_event::handle_check_event(&self.cache, params).await
    }

    /// Retrieve a cached event result.
    #[tool(description = "Retrieve cached event data")]
    async fn get_event(&self, params: Parameters<EventParams>) -> Result<CallToolResult, McpError> {
        tools::get_event::handle_get_event(&self.cache, params).await
    }

    /// Store a processed event result.
    #[tool(description = "Store processed event data in cache")]
    async fn store_event(
        &self,
        params: Parameters<StoreEventParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::store_event::handle_store_event(&self.cache, params).await
    }

    /// Report cache statistics.
    #[tool(description = "Get cache statistics")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        tools::cache_stats::handle_cache_stats(&self.cache).await
    }

    /// Clear cache entries.
    #[tool(description = "Clear cache entries, optionally only those older than a number of days")]
    async fn clear_cache(
        &self,
        params: Parameters<ClearCacheParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::clear_cache::handle_clear_cache(&self.cache, params).await
    }

    /// List recently accessed events.
    #[tool(description = "List cached events for debugging")]
    async fn list_events(
        &self,
        params: Parameters<ListEventsParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::list_events::handle_list_events(&self.cache, params).await
    }
}

impl ServerHandler for DoraCacheServer {
    fn get_info(&self) -> InitializeResult {
        let capabilities = ServerCapabilities::builder()
            .enable_tools()
            .enable_tool_list_changed()
            .build();

        InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities,
            server_info: Implementation {
                name: "dora-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: None,
        }
    }

    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_context = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_context).await
    }
}

/// Serve `cache` over stdin/stdout until the client disconnects.
pub async fn serve(cache: EventCache) -> Result<()> {
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let server = DoraCacheServer::new(cache)
        .serve(transport)
        .await
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
    server.waiting().await.map_err(|e| anyhow::anyhow!("{e:?}"))?;
    Ok(())
}
