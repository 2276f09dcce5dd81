//! SQLite-backed storage for Dora's event result cache.
//!
//! Every public operation opens its own connection, runs one transaction and
//! closes it again, so several processes (CLI, bot, HTTP server) can share the
//! same database file without holding locks between calls.

mod error;

pub use error::StoreError;

use dora_cache_core::{
    CacheEntry, EntrySummary, EventData, EventKey, StoreAggregate, days_before,
};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// How long a connection waits for another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Value recorded under `schema_version` in `cache_metadata`.
const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS events (
        event_id TEXT PRIMARY KEY,
        event_data TEXT NOT NULL,
        classification TEXT NOT NULL,
        notifications TEXT NOT NULL,
        cached_at INTEGER NOT NULL,
        last_accessed INTEGER NOT NULL,
        hit_count INTEGER DEFAULT 0,
        processing_time_ms INTEGER DEFAULT 0,
        cache_version TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cached_at ON events(cached_at);
    CREATE TABLE IF NOT EXISTS cache_metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );";

const SELECT_ENTRY: &str = "SELECT event_id, event_data, classification, notifications, cached_at,
        last_accessed, hit_count, processing_time_ms, cache_version
    FROM events";

/// Cache store backed by a single SQLite file.
///
/// The handle only holds the path, so cloning it is cheap and clones can be
/// moved into blocking tasks freely.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Handle for the database at `path`. Nothing is touched on disk until
    /// [`SqliteStore::initialize`] or the first operation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the handle and ensure the schema exists.
    ///
    /// A corrupt database file is deleted and recreated; its cached results are
    /// lost, which only costs reprocessing.
    ///
    /// # Errors
    /// Returns an error when the directory or database cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(path);
        match store.initialize() {
            Ok(()) => Ok(store),
            Err(err) if err.is_corrupt() => {
                warn!(path = %store.path.display(), error = %err, "cache database corrupt; recreating");
                store.remove_files()?;
                store.initialize()?;
                Ok(store)
            }
            Err(err) => Err(err),
        }
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(StoreError::classify)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Run `op` inside an IMMEDIATE transaction. Taking the write lock up front
    /// lets the busy timeout apply instead of failing on lock upgrade.
    fn write<T>(
        &self,
        op: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::classify)?;
        let out = op(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn remove_files(&self) -> Result<(), StoreError> {
        for suffix in ["", "-journal"] {
            let mut candidate = self.path.clone().into_os_string();
            candidate.push(suffix);
            let candidate = PathBuf::from(candidate);
            if candidate.exists() {
                fs::remove_file(&candidate)?;
            }
        }
        Ok(())
    }

    /// Create the tables and index if missing. Safe to call on every startup,
    /// including from several processes at once.
    ///
    /// # Errors
    /// Returns an error when the parent directory cannot be created or the
    /// schema statements fail.
    pub fn initialize(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        self.write(|tx| {
            tx.execute_batch(SCHEMA).map_err(StoreError::classify)?;
            tx.execute(
                "INSERT OR IGNORE INTO cache_metadata (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        })?;
        debug!(path = %self.path.display(), "cache schema ready");
        Ok(())
    }

    /// Delete entries written more than `ttl_days` before `now`.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn sweep_expired(&self, ttl_days: u32, now: OffsetDateTime) -> Result<u64, StoreError> {
        let cutoff = days_before(now, ttl_days);
        let deleted = self.write(|tx| {
            Ok(tx.execute(
                "DELETE FROM events WHERE cached_at < ?1",
                params![to_millis(cutoff)],
            )?)
        })?;
        if deleted > 0 {
            info!(deleted, ttl_days, "swept expired cache entries");
        }
        Ok(deleted as u64)
    }

    /// Whether an entry written at or after `fresh_since` exists. Does not
    /// count as an access.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn contains(&self, key: &EventKey, fresh_since: OffsetDateTime) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM events WHERE event_id = ?1 AND cached_at >= ?2",
                params![key.as_str(), to_millis(fresh_since)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Read an entry and record the access.
    ///
    /// Only a row that decodes counts as a hit; a corrupt row is reported as
    /// an error and its counters are left untouched.
    ///
    /// The returned entry is the state *before* this access: `hit_count` is
    /// the number of earlier hits and `last_accessed` the previous access.
    /// The read and the increment share one immediate transaction, so
    /// concurrent readers never lose an increment.
    ///
    /// # Errors
    /// Returns an error when the transaction fails or the row cannot be decoded.
    pub fn lookup(
        &self,
        key: &EventKey,
        fresh_since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let entry = self.write(|tx| {
            let raw = tx
                .query_row(
                    &format!("{SELECT_ENTRY} WHERE event_id = ?1 AND cached_at >= ?2"),
                    params![key.as_str(), to_millis(fresh_since)],
                    RawEntry::from_row,
                )
                .optional()?;
            let Some(raw) = raw else {
                return Ok(None);
            };
            // Decode before counting the hit; an unreadable row rolls back.
            let cached_at = raw.cached_at;
            let entry = raw.into_entry()?;
            // Keep last_accessed >= cached_at even if another process wrote
            // the row with a clock that runs ahead of ours.
            let accessed = to_millis(now).max(cached_at);
            tx.execute(
                "UPDATE events SET last_accessed = ?1, hit_count = hit_count + 1 WHERE event_id = ?2",
                params![accessed, key.as_str()],
            )?;
            Ok(Some(entry))
        })?;

        match &entry {
            Some(entry) => debug!(key = %key, prior_hits = entry.hit_count, "cache hit"),
            None => debug!(key = %key, "cache miss"),
        }
        Ok(entry)
    }

    /// Insert the entry, fully replacing any existing row with the same key.
    ///
    /// # Errors
    /// Returns an error when serialization or the write fails.
    pub fn upsert(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let event_data = serde_json::to_string(&entry.event_data)?;
        let classification = serde_json::to_string(&entry.classification)?;
        let notifications = serde_json::to_string(&entry.notifications)?;

        self.write(|tx| {
            tx.execute(
                "INSERT OR REPLACE INTO events
                    (event_id, event_data, classification, notifications, cached_at,
                     last_accessed, hit_count, processing_time_ms, cache_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.event_id.as_str(),
                    event_data,
                    classification,
                    notifications,
                    to_millis(entry.cached_at),
                    to_millis(entry.last_accessed),
                    to_sql_int(entry.hit_count),
                    to_sql_int(entry.processing_time_ms),
                    entry.cache_version,
                ],
            )?;
            Ok(())
        })?;
        debug!(key = %entry.event_id, "cached event result");
        Ok(())
    }

    /// Compute entry counts, averages and age bounds in one pass.
    ///
    /// # Errors
    /// Returns an error when the aggregate queries fail.
    pub fn aggregate_stats(&self) -> Result<StoreAggregate, StoreError> {
        let conn = self.connect()?;
        let (total, hits, avg_hits, oldest, newest, avg_time) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(hit_count > 0), 0),
                    COALESCE(AVG(hit_count), 0.0),
                    MIN(cached_at),
                    MAX(cached_at),
                    COALESCE(AVG(processing_time_ms), 0.0)
             FROM events",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            },
        )?;
        let size: i64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreAggregate {
            total_entries: from_sql_int(total),
            cache_hits: from_sql_int(hits),
            average_hits_per_entry: avg_hits,
            oldest_entry: oldest.map(from_millis).transpose()?,
            newest_entry: newest.map(from_millis).transpose()?,
            average_processing_time_ms: avg_time,
            storage_size_bytes: from_sql_int(size),
        })
    }

    /// Delete every entry, or only those written more than `older_than_days`
    /// before `now`.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn purge(&self, older_than_days: Option<u32>, now: OffsetDateTime) -> Result<u64, StoreError> {
        let deleted = self.write(|tx| {
            Ok(match older_than_days {
                None => tx.execute("DELETE FROM events", [])?,
                Some(days) => tx.execute(
                    "DELETE FROM events WHERE cached_at < ?1",
                    params![to_millis(days_before(now, days))],
                )?,
            })
        })?;
        info!(deleted, ?older_than_days, "cache cleared");
        Ok(deleted as u64)
    }

    /// Delete entries whose event name matches a SQL `LIKE` pattern
    /// (`%` and `_` wildcards, ASCII case-insensitive).
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn evict_matching(&self, pattern: &str) -> Result<u64, StoreError> {
        let deleted = self.write(|tx| {
            Ok(tx.execute(
                "DELETE FROM events WHERE json_extract(event_data, '$.name') LIKE ?1",
                params![pattern],
            )?)
        })?;
        info!(deleted, pattern, "evicted cache entries by name");
        Ok(deleted as u64)
    }

    /// Most recently accessed entries first.
    ///
    /// # Errors
    /// Returns an error when the query fails or a row cannot be decoded.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<EntrySummary>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT event_id, event_data, cached_at, last_accessed, hit_count
             FROM events
             ORDER BY last_accessed DESC, event_id ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (event_id, event_data, cached_at, last_accessed, hit_count) = row?;
            let event: EventData = serde_json::from_str(&event_data)?;
            summaries.push(EntrySummary {
                event_id: parse_key(&event_id)?,
                name: event.name().into_owned(),
                location: event.location().into_owned(),
                start_date: event.start_date().into_owned(),
                cached_at: from_millis(cached_at)?,
                last_accessed: from_millis(last_accessed)?,
                hit_count: from_sql_int(hit_count),
            });
        }
        Ok(summaries)
    }

    /// Number of stored entries, expired ones included.
    ///
    /// # Errors
    /// Returns an error when the count fails.
    pub fn len(&self) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(from_sql_int(count))
    }

    /// Returns `true` if the store has no entries.
    ///
    /// # Errors
    /// Returns an error when the count fails.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    /// Read a free-form metadata value.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT value FROM cache_metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Write a free-form metadata value.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }
}

/// Row as stored, before JSON and timestamp decoding.
struct RawEntry {
    event_id: String,
    event_data: String,
    classification: String,
    notifications: String,
    cached_at: i64,
    last_accessed: i64,
    hit_count: i64,
    processing_time_ms: i64,
    cache_version: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_id: row.get(0)?,
            event_data: row.get(1)?,
            classification: row.get(2)?,
            notifications: row.get(3)?,
            cached_at: row.get(4)?,
            last_accessed: row.get(5)?,
            hit_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
            processing_time_ms: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
            cache_version: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry, StoreError> {
        Ok(CacheEntry {
            event_id: parse_key(&self.event_id)?,
            event_data: serde_json::from_str(&self.event_data)?,
            classification: serde_json::from_str(&self.classification)?,
            notifications: serde_json::from_str(&self.notifications)?,
            cached_at: from_millis(self.cached_at)?,
            last_accessed: from_millis(self.last_accessed)?,
            hit_count: from_sql_int(self.hit_count),
            processing_time_ms: from_sql_int(self.processing_time_ms),
            cache_version: self.cache_version,
        })
    }
}

fn parse_key(raw: &str) -> Result<EventKey, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("stored key {raw:?}: {e}")))
}

/// Timestamps are stored as unix milliseconds.
fn to_millis(ts: OffsetDateTime) -> i64 {
    i64::try_from(ts.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn from_millis(ms: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|e| StoreError::Timestamp(format!("{ms}: {e}")))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use time::macros::datetime;

    #[test]
    fn millis_round_trip_truncates_sub_millisecond() {
        let ts = datetime!(2025-07-01 18:00:00.123_456 UTC);
        let back = from_millis(to_millis(ts)).unwrap();
        assert_eq!(back, datetime!(2025-07-01 18:00:00.123 UTC));
    }

    #[test]
    fn sql_int_conversions_saturate() {
        assert_eq!(to_sql_int(u64::MAX), i64::MAX);
        assert_eq!(from_sql_int(-5), 0);
        assert_eq!(from_sql_int(42), 42);
    }

    #[test]
    fn parse_key_rejects_garbage_as_corruption() {
        let err = parse_key("not-a-key").unwrap_err();
        assert!(err.is_corrupt());
    }
}
