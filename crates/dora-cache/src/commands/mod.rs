use std::fmt::Write as _;

use anyhow::Result;
use dora_cache_app::{AsyncCacheStore, EventCache};
use dora_cache_core::{CacheStats, EntrySummary, fingerprint};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{Command, OutputFormat};

/// Execute a non-server command and print its output.
pub async fn run<S: AsyncCacheStore>(command: Command, cache: &EventCache<S>) -> Result<()> {
    let output = render(command, cache).await?;
    print!("{output}");
    Ok(())
}

/// Execute a command and return what it would print.
async fn render<S: AsyncCacheStore>(command: Command, cache: &EventCache<S>) -> Result<String> {
    let output = match command {
        Command::Stats { format } => {
            let stats = cache.try_stats().await?;
            match format {
                OutputFormat::Table => render_stats(&stats),
                OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&stats)?),
            }
        }
        Command::Clear { older_than_days } => {
            let deleted = cache.try_clear(older_than_days).await?;
            match older_than_days {
                Some(days) => format!("deleted {deleted} entries older than {days} days\n"),
                None => format!("deleted {deleted} entries\n"),
            }
        }
        Command::Sweep => {
            let deleted = cache.try_sweep_expired().await?;
            format!("swept {deleted} expired entries\n")
        }
        Command::Evict { pattern } => {
            let deleted = cache.try_evict(&pattern).await?;
            format!("evicted {deleted} entries matching {pattern:?}\n")
        }
        Command::List { limit, format } => {
            let entries = cache.try_list_events(limit).await?;
            match format {
                OutputFormat::Table => render_entry_table(&entries),
                OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&entries)?),
            }
        }
        Command::Check { event } => {
            let event = event.into_event()?;
            let key = fingerprint(&event);
            if cache.try_check_event(&event).await? {
                format!("{key} cached\n")
            } else {
                format!("{key} not cached\n")
            }
        }
        Command::Get { event } => {
            let event = event.into_event()?;
            match cache.try_get_event(&event).await? {
                Some(entry) => format!("{}\n", serde_json::to_string_pretty(&entry)?),
                None => format!("{} not cached\n", fingerprint(&event)),
            }
        }
        Command::Mcp => unreachable!("MCP mode is served by main"),
    };
    Ok(output)
}

fn render_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "entries:         {}", stats.total_entries);
    let _ = writeln!(
        out,
        "hit rate:        {:.1}% ({} entries read)",
        stats.hit_rate, stats.cache_hits
    );
    let _ = writeln!(out, "hits per entry:  {:.2}", stats.average_hits_per_entry);
    let _ = writeln!(out, "oldest entry:    {}", format_optional_time(stats.oldest_entry));
    let _ = writeln!(out, "newest entry:    {}", format_optional_time(stats.newest_entry));
    let _ = writeln!(out, "avg processing:  {:.1} ms", stats.average_processing_time_ms);
    let _ = writeln!(
        out,
        "database size:   {:.2} MB of {} MB{}",
        stats.database_size_mb,
        stats.max_size_mb,
        if stats.size_budget_exceeded { " (over budget)" } else { "" }
    );
    let _ = writeln!(out, "ttl:             {} days", stats.ttl_days);
    out
}

fn render_entry_table(entries: &[EntrySummary]) -> String {
    if entries.is_empty() {
        return "no cached events\n".to_owned();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<16}  {:>4}  {:<25}  EVENT", "KEY", "HITS", "LAST ACCESSED");
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<16}  {:>4}  {:<25}  {} @ {} ({})",
            entry.event_id,
            entry.hit_count,
            format_time(entry.last_accessed),
            entry.name,
            entry.location,
            entry.start_date
        );
    }
    out
}

fn format_time(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

fn format_optional_time(at: Option<OffsetDateTime>) -> String {
    at.map_or_else(|| "-".to_owned(), format_time)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::EventArgs;
    use dora_cache_app::CacheSettings;
    use dora_cache_core::{EventData, ManualClock};
    use dora_cache_store_sqlite::SqliteStore;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};
    use time::macros::datetime;

    fn cache() -> (TempDir, EventCache) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("cache.db")).unwrap();
        let clock = Arc::new(ManualClock::new(datetime!(2025-07-01 12:00 UTC)));
        (dir, EventCache::with_store(store, CacheSettings::default(), clock))
    }

    fn jazz_args() -> EventArgs {
        EventArgs {
            name: "Jazz Night".into(),
            start_date: "2025-07-01".into(),
            location: "Blue Note".into(),
            ..EventArgs::default()
        }
    }

    async fn seed(cache: &EventCache) {
        let event = EventData::new("Jazz Night", "2025-07-01", "Blue Note");
        cache
            .try_store_event(&event, json!({"size": "medium"}), vec![], 850)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn check_reports_key_and_presence() {
        let (_dir, cache) = cache();
        let out = render(Command::Check { event: jazz_args() }, &cache).await.unwrap();
        assert_eq!(out, "223a84de573a8468 not cached\n");

        seed(&cache).await;
        let out = render(Command::Check { event: jazz_args() }, &cache).await.unwrap();
        assert_eq!(out, "223a84de573a8468 cached\n");
    }

    #[tokio::test]
    async fn get_prints_entry_json() {
        let (_dir, cache) = cache();
        seed(&cache).await;

        let out = render(Command::Get { event: jazz_args() }, &cache).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["event_id"], "223a84de573a8468");
        assert_eq!(value["classification"]["size"], "medium");
        assert_eq!(value["hit_count"], 0);
    }

    #[tokio::test]
    async fn list_and_stats_render_tables() {
        let (_dir, cache) = cache();
        let empty = render(
            Command::List {
                limit: 5,
                format: OutputFormat::Table,
            },
            &cache,
        )
        .await
        .unwrap();
        assert_eq!(empty, "no cached events\n");

        seed(&cache).await;
        let table = render(
            Command::List {
                limit: 5,
                format: OutputFormat::Table,
            },
            &cache,
        )
        .await
        .unwrap();
        assert!(table.contains("Jazz Night @ Blue Note (2025-07-01)"));

        let stats = render(
            Command::Stats {
                format: OutputFormat::Table,
            },
            &cache,
        )
        .await
        .unwrap();
        assert!(stats.contains("entries:         1"));
        assert!(stats.contains("ttl:             7 days"));
    }

    #[tokio::test]
    async fn stats_json_is_machine_readable() {
        let (_dir, cache) = cache();
        seed(&cache).await;
        let out = render(
            Command::Stats {
                format: OutputFormat::Json,
            },
            &cache,
        )
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["total_entries"], 1);
        assert_eq!(value["cache_version"], "1.0");
    }

    #[tokio::test]
    async fn clear_evict_and_sweep_report_counts() {
        let (_dir, cache) = cache();
        seed(&cache).await;

        let out = render(
            Command::Evict {
                pattern: "Food%".into(),
            },
            &cache,
        )
        .await
        .unwrap();
        assert_eq!(out, "evicted 0 entries matching \"Food%\"\n");

        let out = render(Command::Sweep, &cache).await.unwrap();
        assert_eq!(out, "swept 0 expired entries\n");

        let out = render(Command::Clear { older_than_days: None }, &cache).await.unwrap();
        assert_eq!(out, "deleted 1 entries\n");
    }

    #[tokio::test]
    async fn disabled_cache_is_reported() {
        let cache: EventCache = EventCache::disabled();
        let err = render(Command::Sweep, &cache).await.expect_err("disabled");
        assert!(err.to_string().contains("disabled"));
    }
}
