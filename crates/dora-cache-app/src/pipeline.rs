//! Cache-aware event processing.

use std::time::Instant;

use anyhow::{Context, Result};
use dora_cache_core::{EventData, hit_rate};
use serde_json::Value;
use tracing::{debug, info};

use crate::{async_store::AsyncCacheStore, event_cache::EventCache};

/// Output of the expensive classification and notification step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEvent {
    /// Classification payload.
    pub classification: Value,
    /// Generated notifications.
    pub notifications: Vec<Value>,
}

/// Produces results for events the cache does not know yet.
#[allow(async_fn_in_trait)]
pub trait EventProcessor {
    /// Classify `event` and generate its notifications.
    ///
    /// # Errors
    /// Returns an error when processing fails; the pipeline aborts with it.
    async fn process(&self, event: &EventData) -> Result<ProcessedEvent>;
}

/// One pipeline result, fresh or replayed from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    /// The input event.
    pub event: EventData,
    /// Classification payload.
    pub classification: Value,
    /// Generated notifications.
    pub notifications: Vec<Value>,
    /// Whether the result came from the cache.
    pub from_cache: bool,
    /// Hits the entry had before this access; 0 for fresh results.
    pub cache_hit_count: u64,
}

/// Results of a pipeline run with cache accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    /// Per-event results in input order.
    pub results: Vec<CachedResult>,
    /// Events served from the cache.
    pub hits: usize,
    /// Events that had to be processed.
    pub misses: usize,
}

impl PipelineReport {
    /// Percentage of events served from the cache.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let hits = u64::try_from(self.hits).unwrap_or(u64::MAX);
        let total = u64::try_from(self.hits + self.misses).unwrap_or(u64::MAX);
        hit_rate(hits, total)
    }
}

/// Run `processor` over `events`, reusing cached results where possible.
///
/// Cache failures only cost a recomputation; processor failures abort the run.
///
/// # Errors
/// Returns the first processor error.
pub async fn process_events_with_cache<S, P>(
    events: &[EventData],
    cache: &EventCache<S>,
    processor: &P,
) -> Result<PipelineReport>
where
    S: AsyncCacheStore,
    P: EventProcessor,
{
    let mut report = PipelineReport::default();

    for event in events {
        if let Some(entry) = cache.get_event(event).await {
            report.hits += 1;
            report.results.push(CachedResult {
                event: event.clone(),
                classification: entry.classification,
                notifications: entry.notifications,
                from_cache: true,
                cache_hit_count: entry.hit_count,
            });
            continue;
        }

        let started = Instant::now();
        let processed = processor
            .process(event)
            .await
            .with_context(|| format!("failed to process event {:?}", event.name()))?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        cache
            .store_event(
                event,
                processed.classification.clone(),
                processed.notifications.clone(),
                elapsed_ms,
            )
            .await;
        debug!(name = %event.name(), elapsed_ms, "processed event");

        report.misses += 1;
        report.results.push(CachedResult {
            event: event.clone(),
            classification: processed.classification,
            notifications: processed.notifications,
            from_cache: false,
            cache_hit_count: 0,
        });
    }

    info!(
        hits = report.hits,
        misses = report.misses,
        "processed {} events",
        events.len()
    );
    if let Some(stats) = cache.stats().await {
        info!("cache stats: {stats}");
    }
    Ok(report)
}
