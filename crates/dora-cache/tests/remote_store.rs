//! Run the cache-aware pipeline against a `dora-cache mcp` child process.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use dora_cache_app::{
    CacheSettings, EventCache, EventProcessor, McpCacheStore, ProcessedEvent,
    process_events_with_cache,
};
use dora_cache_core::EventData;
use serde_json::json;
use tempfile::TempDir;
use tokio::process::Command;

#[derive(Default)]
struct CountingProcessor {
    calls: AtomicUsize,
}

impl EventProcessor for CountingProcessor {
    async fn process(&self, event: &EventData) -> Result<ProcessedEvent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProcessedEvent {
            classification: json!({"size": "medium", "name": event.name()}),
            notifications: vec![json!({"language": "en", "text": format!("{} soon", event.name())})],
        })
    }
}

fn server_command(workdir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dora-cache"));
    cmd.arg("--workdir")
        .arg(workdir.path())
        .arg("--db")
        .arg(workdir.path().join("cache").join("dora_memory.db"))
        .arg("mcp")
        .env_remove("MEMORY_CACHE_ENABLED")
        .env_remove("MEMORY_CACHE_PATH")
        .env_remove("MEMORY_CACHE_TTL_DAYS")
        .env_remove("MEMORY_CACHE_MAX_SIZE_MB");
    cmd
}

fn events() -> Vec<EventData> {
    vec![
        EventData::new("Jazz Night", "2025-07-01", "Blue Note").with_field("url", serde_json::Value::Null),
        EventData::new("Food Fair", "2025-07-02", "Old Harbour").with_description("Street food"),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_reuses_results_through_cache_server() -> Result<()> {
    let workdir = TempDir::with_prefix("dora-cache-remote-")?;
    let cache: EventCache<McpCacheStore> =
        EventCache::try_open_server(server_command(&workdir), CacheSettings::default()).await?;
    assert!(cache.is_enabled());
    let processor = CountingProcessor::default();

    let first = process_events_with_cache(&events(), &cache, &processor).await?;
    assert_eq!((first.hits, first.misses), (0, 2));

    let second = process_events_with_cache(&events(), &cache, &processor).await?;
    assert_eq!((second.hits, second.misses), (2, 0));
    assert_eq!(processor.calls.load(Ordering::SeqCst), 2);
    assert_eq!(second.results[0].classification["name"], "Jazz Night");

    let entry = cache.try_get_event(&events()[0]).await?.expect("cached");
    assert_eq!(entry.event_id.as_str(), "223a84de573a8468");
    assert_eq!(entry.hit_count, 1);
    assert_eq!(serde_json::to_value(&entry.event_data)?["url"], serde_json::Value::Null);

    assert!(cache.try_check_event(&events()[1]).await?);
    let stats = cache.try_stats().await?;
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(cache.try_list_events(10).await?.len(), 2);

    assert!(cache.try_evict("Jazz%").await.is_err());
    assert_eq!(cache.evict("Jazz%").await, 0);
    assert_eq!(cache.try_sweep_expired().await?, 0);
    assert_eq!(cache.try_clear(None).await?, 2);
    assert!(!cache.check_event(&events()[0]).await);
    Ok(())
}
