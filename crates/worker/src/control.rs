//! Inter-process control surface.
//!
//! Commands and replies travel as `{type, payload}` JSON. Replies are
//! delivered on a per-request oneshot channel supplied with the message,
//! never broadcast.

use courtside_core::store::CacheSizeReport;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Commands a page may send to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    /// Skip the waiting-to-activate state immediately.
    SkipWaiting,
    /// Delete every cache generation of every name.
    CacheClear,
    /// Report aggregate byte size across all generations.
    GetCacheSize,
}

/// Replies the worker sends back on the reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    CacheCleared,
    CacheSize { total_size: u64, cache_names: Vec<String> },
}

impl From<CacheSizeReport> for ControlReply {
    fn from(report: CacheSizeReport) -> Self {
        ControlReply::CacheSize { total_size: report.total_size, cache_names: report.cache_names }
    }
}

/// A command paired with its reply channel.
///
/// `SKIP_WAITING` carries no reply in the wire protocol; its sender may
/// simply pass `None`.
#[derive(Debug)]
pub struct ControlMessage {
    pub command: ControlCommand,
    pub reply: Option<oneshot::Sender<ControlReply>>,
}

impl ControlMessage {
    pub fn fire_and_forget(command: ControlCommand) -> Self {
        Self { command, reply: None }
    }

    pub fn with_reply(command: ControlCommand) -> (Self, oneshot::Receiver<ControlReply>) {
        let (tx, rx) = oneshot::channel();
        (Self { command, reply: Some(tx) }, rx)
    }
}
