//! In-page request cache with TTL freshness and stale fallback.
//!
//! Sits in front of the network call the page itself makes, independent
//! of the interception worker. A fresh entry short-circuits the network
//! entirely; on any network failure an entry of any age is substituted,
//! so callers only observe failures when no fallback exists.
//!
//! Concurrent requests for the same signature are serialized behind a
//! per-signature lock: the second caller waits, re-checks freshness, and
//! returns the first caller's entry instead of racing a duplicate fetch.

use crate::metrics::Metrics;
use crate::net::{Backend, RequestOptions};
use courtside_core::{AppConfig, Error};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Tuning knobs for the request cache.
#[derive(Debug, Clone)]
pub struct ApiCacheConfig {
    /// Freshness window; entries older than this are refetched.
    pub ttl: Duration,
    /// Deadline for a single network attempt.
    pub timeout: Duration,
    /// Concurrent request bound for `preload`.
    pub preload_concurrency: usize,
}

impl Default for ApiCacheConfig {
    fn default() -> Self {
        Self { ttl: Duration::from_millis(300_000), timeout: Duration::from_millis(10_000), preload_concurrency: 4 }
    }
}

impl From<&AppConfig> for ApiCacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self { ttl: config.ttl(), timeout: config.timeout(), preload_concurrency: config.preload_concurrency }
    }
}

struct CacheEntry {
    data: serde_json::Value,
    stored_at: Instant,
}

/// Shared handle to the in-page request cache. Cheap to clone.
#[derive(Clone)]
pub struct ApiCache {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn Backend>,
    metrics: Arc<Metrics>,
    config: ApiCacheConfig,
    entries: StdMutex<HashMap<String, CacheEntry>>,
    // One lock per signature so concurrent callers share a single fetch.
    inflight: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ApiCache {
    pub fn new(config: ApiCacheConfig, backend: Arc<dyn Backend>, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                metrics,
                config,
                entries: StdMutex::new(HashMap::new()),
                inflight: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Fetch a URL through the cache.
    ///
    /// Returns the cached value when it is younger than the TTL; otherwise
    /// issues one network attempt with a cooperative timeout, overwrites
    /// the entry on success, and falls back to the existing entry of any
    /// age on failure. The failure propagates only when no entry exists.
    pub async fn request(&self, url: &str, options: &RequestOptions) -> Result<serde_json::Value, Error> {
        let signature = signature(url, options);

        if let Some(data) = self.lookup_fresh(&signature) {
            self.inner.metrics.record_cache_hit();
            tracing::debug!(url, "request cache hit");
            return Ok(data);
        }

        let lock = self.inflight_lock(&signature);
        let _guard = lock.lock().await;

        // A concurrent caller may have populated the entry while this one
        // waited on the lock.
        if let Some(data) = self.lookup_fresh(&signature) {
            self.inner.metrics.record_cache_hit();
            return Ok(data);
        }

        self.inner.metrics.record_api_call();
        match self.fetch_fresh(url, options).await {
            Ok(data) => {
                self.store(&signature, data.clone());
                tracing::debug!(url, "request cache refreshed");
                Ok(data)
            }
            Err(error) => {
                self.inner.metrics.record_error();
                match self.lookup_any(&signature) {
                    Some(stale) if error.is_recoverable() => {
                        tracing::warn!(url, error = %error, "network failure, serving stale cache entry");
                        Ok(stale)
                    }
                    _ => Err(error),
                }
            }
        }
    }

    /// Warm the cache for a list of URLs.
    ///
    /// One `request` per URL with bounded concurrency; individual
    /// failures are logged and never cancel or fail the others. Always
    /// returns once every attempt has settled.
    pub async fn preload(&self, urls: &[String]) {
        if urls.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.inner.config.preload_concurrency));
        let mut join_set = JoinSet::new();

        for url in urls.iter().cloned() {
            let cache = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                if let Err(error) = cache.request(&url, &RequestOptions::default()).await {
                    tracing::warn!(url = %url, error = %error, "preload fetch failed");
                }
            });
        }

        while join_set.join_next().await.is_some() {}
        tracing::debug!(count = urls.len(), "preload settled");
    }

    /// Discard every entry unconditionally.
    pub fn clear(&self) {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.inner.inflight.lock().unwrap_or_else(|e| e.into_inner()).clear();
        tracing::debug!("request cache cleared");
    }

    /// Number of retained entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fetch_fresh(&self, url: &str, options: &RequestOptions) -> Result<serde_json::Value, Error> {
        let timeout = self.inner.config.timeout;
        let response = tokio::time::timeout(timeout, self.inner.backend.send(url, options))
            .await
            .map_err(|_| Error::Timeout(format!("no response within {}ms", timeout.as_millis())))??;

        if !response.ok() {
            return Err(Error::HttpStatus(response.status));
        }

        serde_json::from_slice(&response.bytes).map_err(|e| Error::Parse(e.to_string()))
    }

    fn lookup_fresh(&self, signature: &str) -> Option<serde_json::Value> {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(signature)
            .filter(|entry| entry.stored_at.elapsed() < self.inner.config.ttl)
            .map(|entry| entry.data.clone())
    }

    fn lookup_any(&self, signature: &str) -> Option<serde_json::Value> {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(signature).map(|entry| entry.data.clone())
    }

    fn store(&self, signature: &str, data: serde_json::Value) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(signature.to_string(), CacheEntry { data, stored_at: Instant::now() });
    }

    fn inflight_lock(&self, signature: &str) -> Arc<AsyncMutex<()>> {
        let mut inflight = self.inner.inflight.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(inflight.entry(signature.to_string()).or_default())
    }
}

/// Composite signature of a request: URL plus serialized options.
fn signature(url: &str, options: &RequestOptions) -> String {
    let options_json = serde_json::to_string(options).unwrap_or_default();
    format!("{url}:{options_json}")
}
