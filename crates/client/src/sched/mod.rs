//! Batched UI-update scheduler.
//!
//! Coalesces update callbacks registered within one frame interval into a
//! single flush, so bursty cache/network events do not trigger redundant
//! redraw work. Callbacks are deduplicated by key, run in registration
//! order, and a failing callback never prevents the rest from running.

use crate::metrics::Metrics;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One rendering opportunity, roughly a 60 Hz frame.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

type UpdateFn = Box<dyn FnMut() -> Result<(), courtside_core::Error> + Send>;

#[derive(Default)]
struct PendingState {
    batch: Vec<(String, UpdateFn)>,
    armed: bool,
}

/// Shared handle to the scheduler. Cheap to clone; all clones feed the
/// same pending set.
#[derive(Clone)]
pub struct UpdateScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    metrics: Arc<Metrics>,
    pending: Mutex<PendingState>,
}

impl UpdateScheduler {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { inner: Arc::new(Inner { metrics, pending: Mutex::new(PendingState::default()) }) }
    }

    /// Register an update for the next flush.
    ///
    /// A key already pending is ignored (set semantics). The first
    /// registration since the last flush arms exactly one flush on the
    /// next frame. Must be called from within a tokio runtime.
    pub fn schedule(&self, key: impl Into<String>, update: impl FnMut() -> Result<(), courtside_core::Error> + Send + 'static) {
        let key = key.into();
        let arm = {
            let mut state = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            if state.batch.iter().any(|(k, _)| *k == key) {
                return;
            }
            state.batch.push((key, Box::new(update)));
            if state.armed {
                false
            } else {
                state.armed = true;
                true
            }
        };

        if arm {
            let scheduler = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(FRAME_INTERVAL).await;
                scheduler.flush_now();
            });
        }
    }

    /// Run the pending batch immediately.
    ///
    /// The pending set is cleared and the armed flag reset before the
    /// callbacks run, so a callback may schedule into the next batch.
    /// Callback failures are logged, counted, and swallowed.
    pub fn flush_now(&self) {
        let batch = {
            let mut state = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            state.armed = false;
            std::mem::take(&mut state.batch)
        };
        if batch.is_empty() {
            return;
        }

        let start = tokio::time::Instant::now();
        for (key, mut update) in batch {
            if let Err(error) = update() {
                tracing::warn!(key = %key, error = %error, "update callback failed");
                self.inner.metrics.record_error();
            }
        }
        self.inner.metrics.add_render_time(start.elapsed());
    }

    /// Number of callbacks waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().unwrap_or_else(|e| e.into_inner()).batch.len()
    }
}
