//! Async storage abstraction for the cache facade and the MCP server.

use anyhow::Error;
use dora_cache_core::{CacheEntry, EntrySummary, EventData, EventKey, StoreAggregate};
use dora_cache_store_sqlite::{SqliteStore, StoreError};
use time::OffsetDateTime;

/// Async storage trait consumed by [`crate::EventCache`].
///
/// This mirrors the synchronous [`SqliteStore`] API so alternative
/// transports can stand behind the facade: [`crate::McpCacheStore`] talks to
/// a `dora-cache mcp` server instead of opening the database itself.
///
/// Reads receive both the precomputed key and the event it came from. A
/// local store addresses rows by key; a remote one forwards the event and
/// lets the server derive the key and apply its own freshness window.
/// Implementations must be ready to use once constructed.
#[allow(async_fn_in_trait)]
pub trait AsyncCacheStore: Send + Sync {
    /// Error type bubbled up from the backing store.
    type Error: Into<Error> + Send;

    /// Delete entries cached more than `ttl_days` before `now`.
    ///
    /// # Errors
    /// Returns a store-specific error when the delete fails.
    async fn sweep_expired(&self, ttl_days: u32, now: OffsetDateTime) -> Result<u64, Self::Error>;

    /// Whether a fresh entry exists for `key`.
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    async fn contains(
        &self,
        key: &EventKey,
        event: &EventData,
        fresh_since: OffsetDateTime,
    ) -> Result<bool, Self::Error>;

    /// Fetch a fresh entry and record the access.
    ///
    /// # Errors
    /// Returns a store-specific error when the read or the access update fails.
    async fn lookup(
        &self,
        key: &EventKey,
        event: &EventData,
        fresh_since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<Option<CacheEntry>, Self::Error>;

    /// Insert or fully replace an entry.
    ///
    /// # Errors
    /// Returns a store-specific error when persisting fails.
    async fn upsert(&self, entry: CacheEntry) -> Result<(), Self::Error>;

    /// Aggregate counters over every stored entry.
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    async fn aggregate_stats(&self) -> Result<StoreAggregate, Self::Error>;

    /// Delete everything, or only entries older than `older_than_days`.
    ///
    /// # Errors
    /// Returns a store-specific error when the delete fails.
    async fn purge(&self, older_than_days: Option<u32>, now: OffsetDateTime) -> Result<u64, Self::Error>;

    /// Delete entries whose event name matches a SQL `LIKE` pattern.
    ///
    /// # Errors
    /// Returns a store-specific error when the delete fails.
    async fn evict_matching(&self, pattern: &str) -> Result<u64, Self::Error>;

    /// Most recently accessed entries, newest first.
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    async fn list_recent(&self, limit: usize) -> Result<Vec<EntrySummary>, Self::Error>;
}

/// Run a blocking store call on the blocking pool with a cloned handle.
async fn offload<T, F>(store: &SqliteStore, action: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(SqliteStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || action(store))
        .await
        .map_err(|e| StoreError::Other(format!("Task join error: {e}")))?
}

impl AsyncCacheStore for SqliteStore {
    type Error = StoreError;

    async fn sweep_expired(&self, ttl_days: u32, now: OffsetDateTime) -> Result<u64, Self::Error> {
        offload(self, move |store| store.sweep_expired(ttl_days, now)).await
    }

    async fn contains(
        &self,
        key: &EventKey,
        _event: &EventData,
        fresh_since: OffsetDateTime,
    ) -> Result<bool, Self::Error> {
        let key = key.clone();
        offload(self, move |store| store.contains(&key, fresh_since)).await
    }

    async fn lookup(
        &self,
        key: &EventKey,
        _event: &EventData,
        fresh_since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<Option<CacheEntry>, Self::Error> {
        let key = key.clone();
        offload(self, move |store| store.lookup(&key, fresh_since, now)).await
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), Self::Error> {
        offload(self, move |store| store.upsert(&entry)).await
    }

    async fn aggregate_stats(&self) -> Result<StoreAggregate, Self::Error> {
        offload(self, |store| store.aggregate_stats()).await
    }

    async fn purge(&self, older_than_days: Option<u32>, now: OffsetDateTime) -> Result<u64, Self::Error> {
        offload(self, move |store| store.purge(older_than_days, now)).await
    }

    async fn evict_matching(&self, pattern: &str) -> Result<u64, Self::Error> {
        let pattern = pattern.to_owned();
        offload(self, move |store| store.evict_matching(&pattern)).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<EntrySummary>, Self::Error> {
        offload(self, move |store| store.list_recent(limit)).await
    }
}
