//! Domain types for Dora's persistent event result cache.
//!
//! The cache deduplicates expensive event processing (classification and
//! notification generation) by keying results on a fingerprint of the
//! event's identifying fields. This crate holds the storage-agnostic pieces:
//! the event payload, the fingerprint, cached entries, and the statistics model.

/// Injectable time sources.
pub mod clock;
/// Cached entries and listing summaries.
pub mod entry;
/// Event payloads consumed from the agent layer.
pub mod event;
/// Fingerprint derivation for cache keys.
pub mod fingerprint;
/// Aggregate statistics.
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock, days_before};
pub use entry::{CACHE_VERSION, CacheEntry, EntrySummary};
pub use event::{DESCRIPTION, EventData, LOCATION, NAME, START_DATE, URL};
pub use fingerprint::{EventKey, KEY_LEN, KeyParseError, fingerprint, fingerprint_fields};
pub use stats::{CacheStats, StoreAggregate, hit_rate};
