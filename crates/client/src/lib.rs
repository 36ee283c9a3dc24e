//! Page-side client code for courtside.
//!
//! This crate provides the in-page request cache with stale fallback, the
//! batched UI-update scheduler, the metrics collector, and the HTTP
//! backend seam shared with the interception worker.

pub mod cache;
pub mod metrics;
pub mod net;
pub mod page;
pub mod sched;

pub use cache::{ApiCache, ApiCacheConfig};
pub use metrics::{MemoryUsage, Metrics, MetricsSnapshot};
pub use net::{Backend, BackendResponse, HttpBackend, RequestOptions};
pub use page::PageContext;
pub use sched::UpdateScheduler;
