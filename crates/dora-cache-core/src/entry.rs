use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::event::EventData;
use crate::fingerprint::{EventKey, fingerprint};

/// Format tag written with every entry. Readers do not branch on it yet.
pub const CACHE_VERSION: &str = "1.0";

/// One cached processing result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint of `event_data`.
    pub event_id: EventKey,
    /// Payload exactly as supplied by the caller.
    pub event_data: EventData,
    /// Opaque classification document.
    pub classification: Value,
    /// Opaque notifications; order is significant to the caller.
    pub notifications: Vec<Value>,
    /// Time of the write that produced this entry.
    #[serde(with = "time::serde::rfc3339")]
    pub cached_at: OffsetDateTime,
    /// Time of the most recent read (or the write, if never read).
    #[serde(with = "time::serde::rfc3339")]
    pub last_accessed: OffsetDateTime,
    /// Reads served from this entry before the current one.
    pub hit_count: u64,
    /// Wall-clock cost of producing the result.
    pub processing_time_ms: u64,
    /// Format tag, see [`CACHE_VERSION`].
    pub cache_version: String,
}

impl CacheEntry {
    /// Build a fresh entry as written at `now`.
    #[must_use]
    pub fn new(
        event_data: EventData,
        classification: Value,
        notifications: Vec<Value>,
        processing_time_ms: u64,
        now: OffsetDateTime,
    ) -> Self {
        Self::keyed(
            fingerprint(&event_data),
            event_data,
            classification,
            notifications,
            processing_time_ms,
            now,
        )
    }

    /// Same as [`CacheEntry::new`] for a caller that already holds the key.
    #[must_use]
    pub fn keyed(
        event_id: EventKey,
        event_data: EventData,
        classification: Value,
        notifications: Vec<Value>,
        processing_time_ms: u64,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            event_id,
            event_data,
            classification,
            notifications,
            cached_at: now,
            last_accessed: now,
            hit_count: 0,
            processing_time_ms,
            cache_version: CACHE_VERSION.to_owned(),
        }
    }

    /// Whether the entry is still within a TTL whose cutoff is `fresh_since`.
    #[must_use]
    pub fn is_fresh(&self, fresh_since: OffsetDateTime) -> bool {
        self.cached_at >= fresh_since
    }
}

/// Compact listing row, used for debugging and operator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// Cache key.
    pub event_id: EventKey,
    /// Event title.
    pub name: String,
    /// Venue.
    pub location: String,
    /// Start date as stored.
    pub start_date: String,
    /// Write time.
    #[serde(with = "time::serde::rfc3339")]
    pub cached_at: OffsetDateTime,
    /// Last read time.
    #[serde(with = "time::serde::rfc3339")]
    pub last_accessed: OffsetDateTime,
    /// Total reads so far.
    pub hit_count: u64,
}
