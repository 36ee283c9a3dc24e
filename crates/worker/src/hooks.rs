//! Background-sync and push hooks.
//!
//! These are external triggers the worker must be able to receive; they
//! carry no business logic of their own in this subsystem.

use serde::{Deserialize, Serialize};

/// Sync tag the platform delivers for deferred data synchronization.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// A notification to display for a push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub date_of_arrival: i64,
    pub primary_key: u32,
}

impl Notification {
    /// Build the notification shown for a push payload.
    pub fn for_push(body: &str) -> Self {
        Self {
            title: "Courtside".to_string(),
            body: body.to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/badge-72x72.png".to_string(),
            vibrate: vec![100, 50, 100],
            date_of_arrival: chrono::Utc::now().timestamp_millis(),
            primary_key: 1,
        }
    }
}

/// Deferred synchronization routine invoked for the background-sync tag.
///
/// TODO: replay queued score submissions once the tablet app exposes its
/// offline mutation queue.
pub async fn background_sync() {
    tracing::info!("background sync triggered");
}
