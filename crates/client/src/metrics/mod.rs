//! Process-wide performance counters.
//!
//! Counters are purely observational: nothing reads them for control
//! flow. They increase monotonically for the life of the page process;
//! the explicit [`Metrics::reset`] exists for teardown and tests only.

use courtside_core::Error;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Resident/virtual memory of the current process, in whole megabytes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used_mb: u64,
    pub total_mb: u64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub api_calls: u64,
    pub cache_hits: u64,
    pub errors: u64,
    pub render_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryUsage>,
}

/// Shared counter set for the page process.
#[derive(Debug, Default)]
pub struct Metrics {
    api_calls: AtomicU64,
    cache_hits: AtomicU64,
    errors: AtomicU64,
    render_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count a network attempt leaving the page.
    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a request served from the in-page cache without a network call.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failure (network, parse, or scheduler callback).
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Accumulate time spent flushing UI updates.
    pub fn add_render_time(&self, elapsed: Duration) {
        self.render_time_us.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Current counter values plus memory usage where the platform
    /// exposes it.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            api_calls: self.api_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            render_time_ms: self.render_time_us.load(Ordering::Relaxed) as f64 / 1000.0,
            memory: read_memory_usage(),
        }
    }

    /// Zero every counter. Teardown/tests only; the reporter never resets.
    pub fn reset(&self) {
        self.api_calls.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.render_time_us.store(0, Ordering::Relaxed);
    }

    /// Time an operation for logging and count its failure.
    ///
    /// The original failure is always re-raised, never suppressed.
    pub async fn measure<T, F>(&self, name: &str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let start = tokio::time::Instant::now();
        match fut.await {
            Ok(value) => {
                tracing::debug!(
                    operation = name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "operation completed"
                );
                Ok(value)
            }
            Err(error) => {
                self.record_error();
                Err(error)
            }
        }
    }

    /// Spawn the periodic reporter that logs a snapshot every `interval`
    /// without resetting the counters.
    pub fn spawn_reporter(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let metrics = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so the first log
            // line lands one full interval in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = metrics.snapshot();
                tracing::info!(
                    api_calls = snapshot.api_calls,
                    cache_hits = snapshot.cache_hits,
                    errors = snapshot.errors,
                    render_time_ms = snapshot.render_time_ms,
                    memory_used_mb = snapshot.memory.map(|m| m.used_mb),
                    "performance metrics"
                );
            }
        })
    }
}

/// Read resident/virtual size from /proc/self/statm.
#[cfg(target_os = "linux")]
fn read_memory_usage() -> Option<MemoryUsage> {
    const PAGE_SIZE: u64 = 4096;
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let mut fields = statm.split_whitespace();
    let total_pages: u64 = fields.next()?.parse().ok()?;
    let resident_pages: u64 = fields.next()?.parse().ok()?;
    Some(MemoryUsage {
        used_mb: resident_pages * PAGE_SIZE / (1024 * 1024),
        total_mb: total_pages * PAGE_SIZE / (1024 * 1024),
    })
}

#[cfg(not(target_os = "linux"))]
fn read_memory_usage() -> Option<MemoryUsage> {
    None
}
