//! Server-mediated cache store.
//!
//! [`McpCacheStore`] spawns `dora-cache mcp` as a child process and forwards
//! every operation to one of its tools over stdio, so several processes can
//! share a cache through a single server.

use anyhow::{Context, Result, anyhow, bail};
use dora_cache_core::{CacheEntry, CacheStats, EntrySummary, EventData, EventKey, StoreAggregate};
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::process::Command;
use tracing::debug;

use crate::async_store::AsyncCacheStore;

#[derive(Deserialize)]
struct ExistsReply {
    exists: bool,
}

#[derive(Deserialize)]
struct StoredReply {
    event_id: EventKey,
}

#[derive(Deserialize)]
struct ClearedReply {
    deleted_entries: u64,
}

/// Cache store that lives behind a `dora-cache mcp` server.
///
/// The server owns the database, derives keys itself and applies its own
/// freshness window, so the `fresh_since`/`now` arguments of the store
/// trait are not forwarded. Dropping the store ends the session.
pub struct McpCacheStore {
    service: RunningService<RoleClient, ()>,
}

impl std::fmt::Debug for McpCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpCacheStore").finish_non_exhaustive()
    }
}

impl McpCacheStore {
    /// Spawn `command` and complete the MCP handshake with it.
    ///
    /// # Errors
    /// Returns an error when the process cannot be started or does not
    /// answer the handshake.
    pub async fn spawn(command: Command) -> Result<Self> {
        let transport = TokioChildProcess::new(command).context("failed to start cache server")?;
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| anyhow!("cache server handshake failed: {e}"))?;
        debug!("connected to cache server");
        Ok(Self { service })
    }

    async fn call<T: DeserializeOwned>(&self, tool: &'static str, arguments: Value) -> Result<T> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            _ => None,
        };
        let result = self
            .service
            .peer()
            .call_tool(CallToolRequestParam {
                name: tool.into(),
                arguments,
            })
            .await
            .map_err(|e| anyhow!("{tool} failed: {e}"))?;
        let text = result
            .content
            .first()
            .and_then(|item| item.as_text().map(|text| text.text.as_str()))
            .ok_or_else(|| anyhow!("{tool} returned no text content"))?;
        if result.is_error == Some(true) {
            bail!("{tool} failed: {text}");
        }
        serde_json::from_str(text).with_context(|| format!("{tool} returned malformed JSON"))
    }

    async fn clear(&self, older_than_days: Option<u32>) -> Result<u64> {
        let reply: ClearedReply = self
            .call("clear_cache", json!({ "older_than_days": older_than_days }))
            .await?;
        Ok(reply.deleted_entries)
    }
}

impl AsyncCacheStore for McpCacheStore {
    type Error = anyhow::Error;

    async fn sweep_expired(&self, ttl_days: u32, _now: OffsetDateTime) -> Result<u64> {
        self.clear(Some(ttl_days)).await
    }

    async fn contains(
        &self,
        _key: &EventKey,
        event: &EventData,
        _fresh_since: OffsetDateTime,
    ) -> Result<bool> {
        let reply: ExistsReply = self.call("check_event", json!({ "event_data": event })).await?;
        Ok(reply.exists)
    }

    async fn lookup(
        &self,
        key: &EventKey,
        event: &EventData,
        _fresh_since: OffsetDateTime,
        _now: OffsetDateTime,
    ) -> Result<Option<CacheEntry>> {
        let entry: Option<CacheEntry> = self.call("get_event", json!({ "event_data": event })).await?;
        if let Some(entry) = &entry
            && entry.event_id != *key
        {
            bail!("cache server answered {key} with entry {}", entry.event_id);
        }
        Ok(entry)
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        let reply: StoredReply = self
            .call(
                "store_event",
                json!({
                    "event_data": entry.event_data,
                    "classification": entry.classification,
                    "notifications": entry.notifications,
                    "processing_time_ms": entry.processing_time_ms,
                }),
            )
            .await?;
        if reply.event_id != entry.event_id {
            bail!(
                "cache server stored {} under {}",
                entry.event_id,
                reply.event_id
            );
        }
        Ok(())
    }

    async fn aggregate_stats(&self) -> Result<StoreAggregate> {
        let stats: CacheStats = self.call("cache_stats", json!({})).await?;
        Ok(stats.into_aggregate())
    }

    async fn purge(&self, older_than_days: Option<u32>, _now: OffsetDateTime) -> Result<u64> {
        self.clear(older_than_days).await
    }

    async fn evict_matching(&self, _pattern: &str) -> Result<u64> {
        bail!("evicting by name is not available through the cache server")
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<EntrySummary>> {
        self.call("list_events", json!({ "limit": limit })).await
    }
}
