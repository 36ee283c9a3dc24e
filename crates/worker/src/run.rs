//! Worker event loop.
//!
//! The worker runs on its own event loop and talks to pages only through
//! intercepted requests and explicit control messages, never shared
//! memory. Fetch events are spawned so slow network calls interleave
//! with control handling; replies go back on per-event oneshot channels.

use crate::control::ControlMessage;
use crate::hooks::Notification;
use crate::worker::{InterceptedRequest, InterceptionWorker, ServedResponse};
use courtside_core::Error;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Events delivered to the worker loop.
#[derive(Debug)]
pub enum WorkerEvent {
    /// An intercepted outgoing request; the response (or failure) is sent
    /// back on the reply channel.
    Fetch {
        request: InterceptedRequest,
        reply: oneshot::Sender<Result<ServedResponse, Error>>,
    },
    /// A control message from a page.
    Control(ControlMessage),
    /// Background-synchronization trigger.
    Sync { tag: String },
    /// Push payload to display as a notification.
    Push { payload: String },
}

impl InterceptionWorker {
    /// Drive the worker until the event channel closes.
    ///
    /// `notifications` receives built push notifications; when absent
    /// they are logged and dropped.
    pub async fn run(
        self: Arc<Self>, mut events: mpsc::Receiver<WorkerEvent>, notifications: Option<mpsc::Sender<Notification>>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                WorkerEvent::Fetch { request, reply } => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        let result = worker.handle_fetch(&request).await;
                        // The page may have gone away; nothing to do then.
                        let _ = reply.send(result);
                    });
                }
                WorkerEvent::Control(message) => self.handle_control(message).await,
                WorkerEvent::Sync { tag } => self.on_sync(&tag).await,
                WorkerEvent::Push { payload } => {
                    let notification = self.on_push(&payload);
                    match &notifications {
                        Some(tx) => {
                            let _ = tx.send(notification).await;
                        }
                        None => tracing::info!(title = %notification.title, body = %notification.body, "push notification"),
                    }
                }
            }
        }
        tracing::info!("worker event channel closed, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlCommand, ControlReply};
    use async_trait::async_trait;
    use bytes::Bytes;
    use courtside_client::net::{Backend, BackendResponse, RequestOptions};
    use courtside_core::{AppConfig, CacheDb};

    struct StaticBackend;

    #[async_trait]
    impl Backend for StaticBackend {
        async fn send(&self, _url: &str, _options: &RequestOptions) -> Result<BackendResponse, Error> {
            Ok(BackendResponse {
                status: 200,
                headers: vec![("content-length".to_string(), "2".to_string())],
                bytes: Bytes::from_static(b"ok"),
            })
        }
    }

    async fn spawn_worker(notifications: Option<mpsc::Sender<Notification>>) -> mpsc::Sender<WorkerEvent> {
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = InterceptionWorker::new(&AppConfig::default(), store, Arc::new(StaticBackend)).unwrap();
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(Arc::new(worker).run(rx, notifications));
        tx
    }

    #[tokio::test]
    async fn test_fetch_event_round_trip() {
        let events = spawn_worker(None).await;

        let (reply, rx) = oneshot::channel();
        events
            .send(WorkerEvent::Fetch { request: InterceptedRequest::get("/api/matches"), reply })
            .await
            .unwrap();

        let served = rx.await.unwrap().unwrap();
        assert_eq!(served.status, 200);
        assert_eq!(served.body, Bytes::from_static(b"ok"));
    }

    #[tokio::test]
    async fn test_control_event_replies_on_channel() {
        let events = spawn_worker(None).await;

        let (message, rx) = ControlMessage::with_reply(ControlCommand::GetCacheSize);
        events.send(WorkerEvent::Control(message)).await.unwrap();

        let reply = rx.await.unwrap();
        assert!(matches!(reply, ControlReply::CacheSize { .. }));
    }

    #[tokio::test]
    async fn test_push_event_delivers_notification() {
        let (notify_tx, mut notify_rx) = mpsc::channel(4);
        let events = spawn_worker(Some(notify_tx)).await;

        events
            .send(WorkerEvent::Push { payload: "Finals start now".to_string() })
            .await
            .unwrap();

        let notification = notify_rx.recv().await.unwrap();
        assert_eq!(notification.body, "Finals start now");
    }

    #[tokio::test]
    async fn test_sync_event_is_accepted() {
        let events = spawn_worker(None).await;
        events
            .send(WorkerEvent::Sync { tag: "background-sync".to_string() })
            .await
            .unwrap();
        // The loop stays alive afterwards.
        let (reply, rx) = oneshot::channel();
        events
            .send(WorkerEvent::Fetch { request: InterceptedRequest::get("/api/ping"), reply })
            .await
            .unwrap();
        assert!(rx.await.unwrap().is_ok());
    }
}
