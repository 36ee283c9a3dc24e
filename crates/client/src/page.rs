//! Page-lifetime wiring.
//!
//! The request cache, scheduler, and metrics are singletons with process
//! lifetime, constructed once at page start and passed by reference to
//! whatever builds the page's request layer. This replaces ambient
//! globals with explicit ownership and an explicit teardown.

use crate::cache::{ApiCache, ApiCacheConfig};
use crate::metrics::Metrics;
use crate::net::Backend;
use crate::sched::UpdateScheduler;
use courtside_core::AppConfig;
use std::sync::Arc;

/// The page-side singleton bundle.
pub struct PageContext {
    pub api: ApiCache,
    pub scheduler: UpdateScheduler,
    pub metrics: Arc<Metrics>,
}

impl PageContext {
    /// Construct the page singletons from configuration and a backend.
    pub fn new(config: &AppConfig, backend: Arc<dyn Backend>) -> Self {
        let metrics = Metrics::new();
        let api = ApiCache::new(ApiCacheConfig::from(config), backend, Arc::clone(&metrics));
        let scheduler = UpdateScheduler::new(Arc::clone(&metrics));
        Self { api, scheduler, metrics }
    }

    /// Spawn the periodic metrics log line.
    pub fn spawn_metrics_reporter(&self, config: &AppConfig) -> tokio::task::JoinHandle<()> {
        self.metrics.spawn_reporter(config.metrics_interval())
    }

    /// Tear the page state down: flush pending updates, drop every cache
    /// entry, and zero the counters.
    pub fn teardown(&self) {
        self.scheduler.flush_now();
        self.api.clear();
        self.metrics.reset();
    }
}
