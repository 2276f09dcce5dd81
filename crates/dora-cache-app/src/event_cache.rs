//! Fail-open facade over the event cache store.
//!
//! Every plain operation degrades to a safe default (a miss, `None`, `0`)
//! when the cache is disabled or the store fails, so callers never have to
//! handle cache errors. The `try_*` variants surface [`CacheError`] for the
//! CLI and the MCP server.

use std::sync::Arc;

use dora_cache_core::{
    CacheEntry, CacheStats, Clock, EntrySummary, EventData, EventKey, SystemClock, days_before,
    fingerprint,
};
use dora_cache_store_sqlite::SqliteStore;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::{
    async_store::AsyncCacheStore, config::CacheConfig, error::CacheError,
    remote_store::McpCacheStore,
};

/// Limits the facade applies on top of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Freshness window in days.
    pub ttl_days: u32,
    /// Advisory size budget in megabytes.
    pub max_size_mb: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl_days: config.ttl_days,
            max_size_mb: config.max_size_mb,
        }
    }
}

/// Cache of processed event results keyed by event fingerprint.
pub struct EventCache<S = SqliteStore> {
    store: Option<S>,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
}

impl<S> std::fmt::Debug for EventCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCache")
            .field("enabled", &self.store.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl EventCache<SqliteStore> {
    /// Open the configured SQLite cache, disabling it if the location is unusable.
    pub async fn open(config: &CacheConfig) -> Self {
        match Self::try_open(config).await {
            Ok(cache) => cache,
            Err(err) => {
                error!(path = %config.path.display(), error = %err, "event cache disabled");
                Self::disabled_with(CacheSettings::from(config))
            }
        }
    }

    /// Open the configured SQLite cache.
    ///
    /// Creates the schema when missing and sweeps expired entries once.
    ///
    /// # Errors
    /// Returns [`CacheError::Configuration`] when the cache is enabled but the
    /// database cannot be created or opened.
    pub async fn try_open(config: &CacheConfig) -> Result<Self, CacheError> {
        let settings = CacheSettings::from(config);
        if !config.enabled {
            debug!("event cache disabled by configuration");
            return Ok(Self::disabled_with(settings));
        }

        let path = config.path.clone();
        let store = tokio::task::spawn_blocking(move || SqliteStore::open(path))
            .await
            .map_err(|e| CacheError::configuration(config.path.display(), e))?
            .map_err(|e| CacheError::configuration(config.path.display(), e))?;

        let cache = Self::with_store(store, settings, Arc::new(SystemClock));
        cache.sweep_expired().await;
        info!(path = %config.path.display(), ttl_days = settings.ttl_days, "event cache ready");
        Ok(cache)
    }
}

impl EventCache<McpCacheStore> {
    /// Connect to a cache server started by `command`, disabling the cache if
    /// it cannot be reached.
    pub async fn open_server(command: tokio::process::Command, settings: CacheSettings) -> Self {
        match Self::try_open_server(command, settings).await {
            Ok(cache) => cache,
            Err(err) => {
                error!(error = %err, "cache server unavailable; event cache disabled");
                Self::disabled_with(settings)
            }
        }
    }

    /// Connect to a cache server started by `command`.
    ///
    /// # Errors
    /// Returns [`CacheError::Configuration`] when the server cannot be
    /// started or does not complete the handshake.
    pub async fn try_open_server(
        command: tokio::process::Command,
        settings: CacheSettings,
    ) -> Result<Self, CacheError> {
        let store = McpCacheStore::spawn(command)
            .await
            .map_err(|e| CacheError::configuration("cache server", format!("{e:#}")))?;
        info!(ttl_days = settings.ttl_days, "event cache connected to cache server");
        Ok(Self::with_store(store, settings, Arc::new(SystemClock)))
    }
}

impl<S> EventCache<S> {
    /// Cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::disabled_with(CacheSettings::default())
    }

    fn disabled_with(settings: CacheSettings) -> Self {
        Self {
            store: None,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    /// Wrap an already-initialized store.
    #[must_use]
    pub fn with_store(store: S, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Some(store),
            settings,
            clock,
        }
    }

    /// Whether a backing store is attached.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Limits in effect.
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        self.settings
    }

    fn store(&self) -> Result<&S, CacheError> {
        self.store.as_ref().ok_or(CacheError::Disabled)
    }

    fn fresh_since(&self, now: OffsetDateTime) -> OffsetDateTime {
        days_before(now, self.settings.ttl_days)
    }
}

impl<S: AsyncCacheStore> EventCache<S> {
    /// Whether a fresh result exists for `event`. Does not count as a hit.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_check_event(&self, event: &EventData) -> Result<bool, CacheError> {
        self.check_keyed(&fingerprint(event), event).await
    }

    /// Fetch the cached result for `event` and record the access.
    ///
    /// The returned entry reflects the row as it was before this access.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_get_event(&self, event: &EventData) -> Result<Option<CacheEntry>, CacheError> {
        self.get_keyed(&fingerprint(event), event).await
    }

    /// Store a processing result for `event`, replacing any previous one.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_store_event(
        &self,
        event: &EventData,
        classification: Value,
        notifications: Vec<Value>,
        processing_time_ms: u64,
    ) -> Result<EventKey, CacheError> {
        self.store_keyed(
            fingerprint(event),
            event,
            classification,
            notifications,
            processing_time_ms,
        )
        .await
    }

    async fn check_keyed(&self, key: &EventKey, event: &EventData) -> Result<bool, CacheError> {
        let store = self.store()?;
        let fresh_since = self.fresh_since(self.clock.now());
        store
            .contains(key, event, fresh_since)
            .await
            .map_err(|e| CacheError::storage("check_event", e))
    }

    async fn get_keyed(
        &self,
        key: &EventKey,
        event: &EventData,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let store = self.store()?;
        let now = self.clock.now();
        store
            .lookup(key, event, self.fresh_since(now), now)
            .await
            .map_err(|e| CacheError::storage("get_event", e))
    }

    async fn store_keyed(
        &self,
        key: EventKey,
        event: &EventData,
        classification: Value,
        notifications: Vec<Value>,
        processing_time_ms: u64,
    ) -> Result<EventKey, CacheError> {
        let store = self.store()?;
        let entry = CacheEntry::keyed(
            key.clone(),
            event.clone(),
            classification,
            notifications,
            processing_time_ms,
            self.clock.now(),
        );
        store
            .upsert(entry)
            .await
            .map_err(|e| CacheError::storage("store_event", e))?;
        Ok(key)
    }

    /// Aggregate statistics for the whole cache.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_stats(&self) -> Result<CacheStats, CacheError> {
        let store = self.store()?;
        let aggregate = store
            .aggregate_stats()
            .await
            .map_err(|e| CacheError::storage("stats", e))?;
        let stats = CacheStats::from_aggregate(aggregate, self.settings.ttl_days, self.settings.max_size_mb);
        if stats.size_budget_exceeded {
            warn!(
                size_mb = stats.database_size_mb,
                max_size_mb = stats.max_size_mb,
                "event cache exceeds its size budget"
            );
        }
        Ok(stats)
    }

    /// Delete all entries, or only those cached more than `older_than_days` ago.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_clear(&self, older_than_days: Option<u32>) -> Result<u64, CacheError> {
        let store = self.store()?;
        store
            .purge(older_than_days, self.clock.now())
            .await
            .map_err(|e| CacheError::storage("clear", e))
    }

    /// Delete entries that fell out of the TTL window.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_sweep_expired(&self) -> Result<u64, CacheError> {
        let store = self.store()?;
        store
            .sweep_expired(self.settings.ttl_days, self.clock.now())
            .await
            .map_err(|e| CacheError::storage("sweep_expired", e))
    }

    /// Delete entries whose event name matches a SQL `LIKE` pattern.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_evict(&self, pattern: &str) -> Result<u64, CacheError> {
        let store = self.store()?;
        store
            .evict_matching(pattern)
            .await
            .map_err(|e| CacheError::storage("evict", e))
    }

    /// Most recently accessed entries.
    ///
    /// # Errors
    /// Returns [`CacheError::Disabled`] or [`CacheError::Storage`].
    pub async fn try_list_events(&self, limit: usize) -> Result<Vec<EntrySummary>, CacheError> {
        let store = self.store()?;
        store
            .list_recent(limit)
            .await
            .map_err(|e| CacheError::storage("list_events", e))
    }

    /// Whether a fresh result exists for `event`; `false` on any failure.
    pub async fn check_event(&self, event: &EventData) -> bool {
        let key = fingerprint(event);
        let result = self.check_keyed(&key, event).await;
        degrade("check_event", &key, result, false)
    }

    /// Cached result for `event`, or `None` on a miss or any failure.
    pub async fn get_event(&self, event: &EventData) -> Option<CacheEntry> {
        let key = fingerprint(event);
        let result = self.get_keyed(&key, event).await;
        degrade("get_event", &key, result, None)
    }

    /// Store a result for `event`; `None` when nothing was written.
    pub async fn store_event(
        &self,
        event: &EventData,
        classification: Value,
        notifications: Vec<Value>,
        processing_time_ms: u64,
    ) -> Option<EventKey> {
        let key = fingerprint(event);
        let result = self
            .store_keyed(key.clone(), event, classification, notifications, processing_time_ms)
            .await
            .map(Some);
        degrade("store_event", &key, result, None)
    }

    /// Cache statistics; `None` when disabled or unavailable.
    pub async fn stats(&self) -> Option<CacheStats> {
        let result = self.try_stats().await.map(Some);
        degrade("stats", "*", result, None)
    }

    /// Delete entries; returns how many were removed, `0` on failure.
    pub async fn clear(&self, older_than_days: Option<u32>) -> u64 {
        let result = self.try_clear(older_than_days).await;
        degrade("clear", "*", result, 0)
    }

    /// Delete expired entries; `0` on failure.
    pub async fn sweep_expired(&self) -> u64 {
        let result = self.try_sweep_expired().await;
        degrade("sweep_expired", "*", result, 0)
    }

    /// Delete entries by name pattern; `0` on failure.
    pub async fn evict(&self, pattern: &str) -> u64 {
        let result = self.try_evict(pattern).await;
        degrade("evict", pattern, result, 0)
    }

    /// Recently accessed entries; empty on failure.
    pub async fn list_events(&self, limit: usize) -> Vec<EntrySummary> {
        let result = self.try_list_events(limit).await;
        degrade("list_events", "*", result, Vec::new())
    }
}

fn degrade<T>(
    operation: &'static str,
    key: impl std::fmt::Display,
    result: Result<T, CacheError>,
    fallback: T,
) -> T {
    match result {
        Ok(value) => value,
        Err(CacheError::Disabled) => fallback,
        Err(err) => {
            warn!(operation, key = %key, error = %err, "cache operation failed; continuing without cache");
            fallback
        }
    }
}
