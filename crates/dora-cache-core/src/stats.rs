use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::entry::CACHE_VERSION;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Raw figures computed by a store in a single pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreAggregate {
    /// Number of stored entries.
    pub total_entries: u64,
    /// Entries that were read at least once.
    pub cache_hits: u64,
    /// Mean `hit_count` (0 when empty).
    pub average_hits_per_entry: f64,
    /// Earliest `cached_at`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub oldest_entry: Option<OffsetDateTime>,
    /// Latest `cached_at`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub newest_entry: Option<OffsetDateTime>,
    /// Mean `processing_time_ms` (0 when empty).
    pub average_processing_time_ms: f64,
    /// Physical size of the backing storage.
    pub storage_size_bytes: u64,
}

/// Cache statistics as reported to operators and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of stored entries.
    pub total_entries: u64,
    /// Entries that were read at least once.
    pub cache_hits: u64,
    /// `cache_hits / total_entries * 100`, 0 when empty.
    pub hit_rate: f64,
    /// Mean `hit_count`.
    pub average_hits_per_entry: f64,
    /// Earliest `cached_at`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub oldest_entry: Option<OffsetDateTime>,
    /// Latest `cached_at`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub newest_entry: Option<OffsetDateTime>,
    /// Mean `processing_time_ms`.
    pub average_processing_time_ms: f64,
    /// Physical size of the backing storage.
    pub database_size_bytes: u64,
    /// Same size in MiB.
    pub database_size_mb: f64,
    /// Configured TTL.
    pub ttl_days: u32,
    /// Advisory size budget. Nothing evicts on it.
    pub max_size_mb: u64,
    /// Storage is larger than `max_size_mb`.
    pub size_budget_exceeded: bool,
    /// Format tag written by this build.
    pub cache_version: String,
}

impl CacheStats {
    /// Combine store figures with the facade's settings.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_aggregate(aggregate: StoreAggregate, ttl_days: u32, max_size_mb: u64) -> Self {
        let database_size_mb = aggregate.storage_size_bytes as f64 / BYTES_PER_MB;
        Self {
            hit_rate: hit_rate(aggregate.cache_hits, aggregate.total_entries),
            total_entries: aggregate.total_entries,
            cache_hits: aggregate.cache_hits,
            average_hits_per_entry: aggregate.average_hits_per_entry,
            oldest_entry: aggregate.oldest_entry,
            newest_entry: aggregate.newest_entry,
            average_processing_time_ms: aggregate.average_processing_time_ms,
            database_size_bytes: aggregate.storage_size_bytes,
            database_size_mb,
            ttl_days,
            max_size_mb,
            size_budget_exceeded: database_size_mb > max_size_mb as f64,
            cache_version: CACHE_VERSION.to_owned(),
        }
    }

    /// Strip the settings-derived fields, leaving the store's raw figures.
    #[must_use]
    pub fn into_aggregate(self) -> StoreAggregate {
        StoreAggregate {
            total_entries: self.total_entries,
            cache_hits: self.cache_hits,
            average_hits_per_entry: self.average_hits_per_entry,
            oldest_entry: self.oldest_entry,
            newest_entry: self.newest_entry,
            average_processing_time_ms: self.average_processing_time_ms,
            storage_size_bytes: self.database_size_bytes,
        }
    }

    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} entries, {:.1}% hit rate, {:.2}MB",
            self.total_entries, self.hit_rate, self.database_size_mb
        )
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Percentage of `hits` over `total`; 0 when `total` is 0.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn hit_rate(hits: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}
