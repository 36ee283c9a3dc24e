//! Interception worker lifecycle and request handling.
//!
//! ### Lifecycle
//! `Installing -> Installed -> Activating -> Activated`. Install fetches
//! every static-manifest asset into the new static generation and is
//! all-or-nothing: one bad asset fails the whole install and leaves the
//! previous generation active and untouched. Activation deletes every
//! generation other than the current static and runtime ones.
//!
//! ### Request routing
//! See [`crate::routes`]. Cache writes always use a cloned snapshot, run
//! fire-and-forget, and never delay or fail the response delivery.

use crate::control::{ControlCommand, ControlMessage, ControlReply};
use crate::hooks::{self, BACKGROUND_SYNC_TAG, Notification};
use crate::routes::{RouteClass, classify};
use bytes::Bytes;
use courtside_client::net::{Backend, BackendResponse, RequestOptions};
use courtside_core::store::key::compute_entry_key;
use courtside_core::{AppConfig, CacheDb, Error, ResponseSnapshot};
use std::sync::{Arc, Mutex};
use url::Url;

/// Worker lifecycle states. `Activated` is terminal per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Installing,
    Installed,
    Activating,
    Activated,
}

/// A request intercepted at the platform boundary.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: String,
}

impl InterceptedRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), url: url.into() }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

/// Response handed back to the page for an intercepted request.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl ServedResponse {
    fn from_network(response: BackendResponse) -> Self {
        Self { status: response.status, headers: response.headers, body: response.bytes, source: ResponseSource::Network }
    }

    fn from_snapshot(snapshot: ResponseSnapshot) -> Self {
        Self {
            status: snapshot.status,
            headers: snapshot.headers(),
            body: Bytes::from(snapshot.body),
            source: ResponseSource::Cache,
        }
    }
}

/// The interception worker. Exclusively owns the persistent cache store.
pub struct InterceptionWorker {
    store: CacheDb,
    backend: Arc<dyn Backend>,
    origin: Url,
    api_prefix: String,
    static_manifest: Vec<String>,
    static_generation: String,
    runtime_generation: String,
    state: Mutex<LifecycleState>,
}

impl InterceptionWorker {
    pub fn new(config: &AppConfig, store: CacheDb, backend: Arc<dyn Backend>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self {
            store,
            backend,
            origin,
            api_prefix: config.api_prefix.clone(),
            static_manifest: config.static_manifest.clone(),
            static_generation: config.static_generation(),
            runtime_generation: config.runtime_generation(),
            state: Mutex::new(LifecycleState::Installing),
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Fetch every static-manifest asset into the new static generation.
    ///
    /// All-or-nothing: every asset is fetched before a single write, so a
    /// failed install leaves the store exactly as it was.
    pub async fn install(&self) -> Result<(), Error> {
        self.set_state(LifecycleState::Installing);
        tracing::info!(generation = %self.static_generation, "worker installing");

        let mut fetched = Vec::with_capacity(self.static_manifest.len());
        for path in &self.static_manifest {
            let url = self.resolve(path)?;
            let response = self
                .backend
                .send(url.as_str(), &RequestOptions::default())
                .await
                .map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            if response.status != 200 {
                return Err(Error::InstallFailed(format!("{path}: status {}", response.status)));
            }
            fetched.push((url, response));
        }

        for (url, response) in fetched {
            let snapshot = ResponseSnapshot::capture(
                &self.static_generation,
                url.as_str(),
                response.status,
                &response.headers,
                response.bytes.to_vec(),
            );
            self.store
                .put_entry(&snapshot)
                .await
                .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;
        }

        self.set_state(LifecycleState::Installed);
        tracing::info!(assets = self.static_manifest.len(), "static assets cached");
        Ok(())
    }

    /// Delete stale generations and begin controlling open pages.
    pub async fn activate(&self) -> Result<(), Error> {
        self.set_state(LifecycleState::Activating);
        tracing::info!(generation = %self.static_generation, "worker activating");

        let keep = [self.static_generation.clone(), self.runtime_generation.clone()];
        let deleted = self.store.retain_generations(&keep).await?;
        if deleted > 0 {
            tracing::info!(deleted, "stale cache generations removed");
        }

        self.set_state(LifecycleState::Activated);
        tracing::info!("worker activated, claiming open pages");
        Ok(())
    }

    /// Skip the waiting-to-activate state immediately.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        match self.state() {
            LifecycleState::Installed => self.activate().await,
            state => {
                tracing::debug!(?state, "skip waiting ignored in current state");
                Ok(())
            }
        }
    }

    /// Satisfy one intercepted request per its route class.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Result<ServedResponse, Error> {
        let url = self.resolve(&request.url)?;
        let route = classify(&request.method, url.path(), &self.static_manifest, &self.api_prefix);

        match route {
            RouteClass::Passthrough | RouteClass::NetworkOnly => {
                let options = RequestOptions { method: request.method.clone(), ..Default::default() };
                let response = self.backend.send(url.as_str(), &options).await?;
                Ok(ServedResponse::from_network(response))
            }
            RouteClass::CacheFirst => self.cache_first(&url).await,
            RouteClass::NetworkFirst => self.network_first(&url).await,
        }
    }

    async fn cache_first(&self, url: &Url) -> Result<ServedResponse, Error> {
        let key = compute_entry_key("GET", url.as_str());

        // A failed cache read degrades to a miss.
        let cached = self
            .store
            .get_entry(&self.static_generation, &key)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(url = %url, %error, "cache read failed, treating as miss");
                None
            });
        if let Some(snapshot) = cached {
            tracing::debug!(url = %url, "cache hit");
            return Ok(ServedResponse::from_snapshot(snapshot));
        }

        let response = self.backend.send(url.as_str(), &RequestOptions::default()).await?;
        if response.status == 200 && self.is_same_origin(url) {
            self.spawn_cache_write(&self.static_generation, url, &response);
        }
        Ok(ServedResponse::from_network(response))
    }

    async fn network_first(&self, url: &Url) -> Result<ServedResponse, Error> {
        match self.backend.send(url.as_str(), &RequestOptions::default()).await {
            Ok(response) => {
                // Non-2xx responses are returned as-is and never cached.
                if response.ok() {
                    self.spawn_cache_write(&self.runtime_generation, url, &response);
                }
                Ok(ServedResponse::from_network(response))
            }
            Err(error) => {
                tracing::warn!(url = %url, %error, "network failure, trying cache");
                let key = compute_entry_key("GET", url.as_str());
                let fallback = self.store.get_entry_any(&key).await.unwrap_or_else(|read_error| {
                    tracing::warn!(url = %url, error = %read_error, "fallback read failed");
                    None
                });
                match fallback {
                    Some(snapshot) => Ok(ServedResponse::from_snapshot(snapshot)),
                    None => Err(error),
                }
            }
        }
    }

    /// Best-effort write-behind of a response clone. Never blocks or
    /// fails the response being delivered.
    fn spawn_cache_write(&self, generation: &str, url: &Url, response: &BackendResponse) {
        let snapshot = ResponseSnapshot::capture(
            generation,
            url.as_str(),
            response.status,
            &response.headers,
            response.bytes.to_vec(),
        );
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(error) = store.put_entry(&snapshot).await {
                tracing::warn!(url = %snapshot.url, %error, "cache write failed");
            }
        });
    }

    /// Handle one control message, replying on its channel when present.
    pub async fn handle_control(&self, message: ControlMessage) {
        match message.command {
            ControlCommand::SkipWaiting => {
                if let Err(error) = self.skip_waiting().await {
                    tracing::warn!(%error, "skip waiting failed");
                }
            }
            ControlCommand::CacheClear => {
                match self.store.clear_all().await {
                    Ok(deleted) => tracing::info!(deleted, "cache cleared"),
                    Err(error) => tracing::warn!(%error, "cache clear failed"),
                }
                if let Some(reply) = message.reply {
                    let _ = reply.send(ControlReply::CacheCleared);
                }
            }
            ControlCommand::GetCacheSize => match self.store.total_size().await {
                Ok(report) => {
                    if let Some(reply) = message.reply {
                        let _ = reply.send(ControlReply::from(report));
                    }
                }
                Err(error) => tracing::warn!(%error, "cache size report failed"),
            },
        }
    }

    /// Background-sync trigger.
    pub async fn on_sync(&self, tag: &str) {
        if tag == BACKGROUND_SYNC_TAG {
            hooks::background_sync().await;
        } else {
            tracing::debug!(tag, "ignoring unknown sync tag");
        }
    }

    /// Push trigger: build the notification to display.
    pub fn on_push(&self, payload: &str) -> Notification {
        Notification::for_push(payload)
    }

    fn resolve(&self, raw: &str) -> Result<Url, Error> {
        if raw.starts_with('/') {
            self.origin.join(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
        } else {
            Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
        }
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone)]
    enum Script {
        Body(&'static str),
        Status(u16),
        Fail,
    }

    struct FakeBackend {
        scripts: Mutex<HashMap<String, Script>>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self { scripts: Mutex::new(HashMap::new()), calls: AtomicUsize::new(0) })
        }

        fn script(&self, url: &str, script: Script) {
            self.scripts.lock().unwrap().insert(url.to_string(), script);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn send(&self, url: &str, _options: &RequestOptions) -> Result<BackendResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let script = self.scripts.lock().unwrap().get(url).cloned();
            match script {
                Some(Script::Body(body)) => Ok(BackendResponse {
                    status: 200,
                    headers: vec![("content-length".to_string(), body.len().to_string())],
                    bytes: Bytes::from_static(body.as_bytes()),
                }),
                Some(Script::Status(status)) => {
                    Ok(BackendResponse { status, headers: vec![], bytes: Bytes::new() })
                }
                Some(Script::Fail) | None => Err(Error::Transport("connection refused".into())),
            }
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            static_manifest: vec!["/".into(), "/index.html".into(), "/app.js".into()],
            ..Default::default()
        }
    }

    fn script_manifest(backend: &FakeBackend) {
        backend.script("http://127.0.0.1:3000/", Script::Body("<html>root</html>"));
        backend.script("http://127.0.0.1:3000/index.html", Script::Body("<html>index</html>"));
        backend.script("http://127.0.0.1:3000/app.js", Script::Body("console.log('app')"));
    }

    async fn installed_worker(backend: Arc<FakeBackend>) -> (InterceptionWorker, CacheDb) {
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = InterceptionWorker::new(&test_config(), store.clone(), backend).unwrap();
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        (worker, store)
    }

    // Lets fire-and-forget cache writes land before assertions.
    async fn settle_writes() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_install_reaches_installed_state() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = InterceptionWorker::new(&test_config(), store.clone(), backend).unwrap();

        assert_eq!(worker.state(), LifecycleState::Installing);
        worker.install().await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Installed);

        let names = store.list_generations().await.unwrap();
        assert_eq!(names, vec!["courtside-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let backend = FakeBackend::new();
        backend.script("http://127.0.0.1:3000/", Script::Body("<html>root</html>"));
        backend.script("http://127.0.0.1:3000/index.html", Script::Status(500));
        backend.script("http://127.0.0.1:3000/app.js", Script::Body("console.log('app')"));

        let store = CacheDb::open_in_memory().await.unwrap();
        // The previously active generation keeps serving.
        store
            .put_entry(&ResponseSnapshot::capture(
                "courtside-v0",
                "http://127.0.0.1:3000/index.html",
                200,
                &[],
                b"old index".to_vec(),
            ))
            .await
            .unwrap();

        let worker = InterceptionWorker::new(&test_config(), store.clone(), backend).unwrap();
        let result = worker.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(worker.state(), LifecycleState::Installing);

        let names = store.list_generations().await.unwrap();
        assert_eq!(names, vec!["courtside-v0".to_string()]);
        let key = compute_entry_key("GET", "http://127.0.0.1:3000/index.html");
        let previous = store.get_entry("courtside-v0", &key).await.unwrap().unwrap();
        assert_eq!(previous.body, b"old index".to_vec());
    }

    #[tokio::test]
    async fn test_activate_evicts_stale_generations() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        let store = CacheDb::open_in_memory().await.unwrap();
        store
            .put_entry(&ResponseSnapshot::capture("courtside-v0", "http://127.0.0.1:3000/", 200, &[], vec![]))
            .await
            .unwrap();
        store
            .put_entry(&ResponseSnapshot::capture(
                "courtside-runtime",
                "http://127.0.0.1:3000/api/matches",
                200,
                &[],
                b"[]".to_vec(),
            ))
            .await
            .unwrap();

        let worker = InterceptionWorker::new(&test_config(), store.clone(), backend).unwrap();
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Activated);

        let names = store.list_generations().await.unwrap();
        assert_eq!(names, vec!["courtside-runtime".to_string(), "courtside-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_from_installed() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = InterceptionWorker::new(&test_config(), store, backend).unwrap();

        worker.install().await.unwrap();
        worker.skip_waiting().await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Activated);
    }

    #[tokio::test]
    async fn test_cache_first_serves_installed_asset_without_network() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        let (worker, _store) = installed_worker(Arc::clone(&backend)).await;
        let calls_after_install = backend.calls();

        let served = worker.handle_fetch(&InterceptedRequest::get("/index.html")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.body, Bytes::from_static(b"<html>index</html>"));
        assert_eq!(backend.calls(), calls_after_install);
    }

    #[tokio::test]
    async fn test_cache_first_miss_populates_static_generation() {
        // The root route is cache-first even when the manifest omits it.
        let backend = FakeBackend::new();
        backend.script("http://127.0.0.1:3000/", Script::Body("<html>root</html>"));
        backend.script("http://127.0.0.1:3000/app.js", Script::Body("console.log('app')"));
        let config = AppConfig { static_manifest: vec!["/app.js".into()], ..Default::default() };
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = InterceptionWorker::new(&config, store.clone(), backend).unwrap();
        worker.install().await.unwrap();

        let served = worker.handle_fetch(&InterceptedRequest::get("/")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        settle_writes().await;

        let key = compute_entry_key("GET", "http://127.0.0.1:3000/");
        let cached = store.get_entry("courtside-v1", &key).await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_cache_first_cross_origin_not_cached() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        backend.script("https://cdn.example.com/index.html", Script::Body("<html>cdn</html>"));
        let (worker, store) = installed_worker(Arc::clone(&backend)).await;

        let served = worker
            .handle_fetch(&InterceptedRequest::get("https://cdn.example.com/index.html"))
            .await
            .unwrap();
        // Served from network: the installed entry is keyed by the
        // same-origin URL, and the cross-origin response is not written.
        assert_eq!(served.source, ResponseSource::Network);
        settle_writes().await;
        let key = compute_entry_key("GET", "https://cdn.example.com/index.html");
        let cached = store.get_entry("courtside-v1", &key).await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_network_first_caches_ok_response() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        backend.script("http://127.0.0.1:3000/api/matches", Script::Body("[1,2,3]"));
        let (worker, store) = installed_worker(backend).await;

        let served = worker.handle_fetch(&InterceptedRequest::get("/api/matches")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.status, 200);
        settle_writes().await;

        let key = compute_entry_key("GET", "http://127.0.0.1:3000/api/matches");
        let cached = store.get_entry("courtside-runtime", &key).await.unwrap().unwrap();
        assert_eq!(cached.body, b"[1,2,3]".to_vec());
    }

    #[tokio::test]
    async fn test_network_first_returns_error_status_uncached() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        backend.script("http://127.0.0.1:3000/api/users/by-telegram/42", Script::Status(404));
        let (worker, store) = installed_worker(backend).await;

        let served = worker
            .handle_fetch(&InterceptedRequest::get("/api/users/by-telegram/42"))
            .await
            .unwrap();
        assert_eq!(served.status, 404);
        assert_eq!(served.source, ResponseSource::Network);
        settle_writes().await;

        let key = compute_entry_key("GET", "http://127.0.0.1:3000/api/users/by-telegram/42");
        let cached = store.get_entry_any(&key).await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_store() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        backend.script("http://127.0.0.1:3000/api/matches", Script::Body("[1,2,3]"));
        let (worker, _store) = installed_worker(Arc::clone(&backend)).await;

        worker.handle_fetch(&InterceptedRequest::get("/api/matches")).await.unwrap();
        settle_writes().await;

        backend.script("http://127.0.0.1:3000/api/matches", Script::Fail);
        let served = worker.handle_fetch(&InterceptedRequest::get("/api/matches")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.body, Bytes::from_static(b"[1,2,3]"));
    }

    #[tokio::test]
    async fn test_network_first_no_fallback_propagates() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        backend.script("http://127.0.0.1:3000/api/standings", Script::Fail);
        let (worker, _store) = installed_worker(backend).await;

        let result = worker.handle_fetch(&InterceptedRequest::get("/api/standings")).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_non_get_passes_through_uncached() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        backend.script("http://127.0.0.1:3000/api/matches", Script::Body("created"));
        let (worker, store) = installed_worker(backend).await;

        let request = InterceptedRequest { method: "POST".to_string(), url: "/api/matches".to_string() };
        let served = worker.handle_fetch(&request).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        settle_writes().await;

        let key = compute_entry_key("GET", "http://127.0.0.1:3000/api/matches");
        let cached = store.get_entry_any(&key).await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_control_cache_clear_replies() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        let (worker, store) = installed_worker(backend).await;

        let (message, rx) = ControlMessage::with_reply(ControlCommand::CacheClear);
        worker.handle_control(message).await;
        assert_eq!(rx.await.unwrap(), ControlReply::CacheCleared);
        assert!(store.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_control_cache_size_replies_with_totals() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        let (worker, _store) = installed_worker(backend).await;

        let (message, rx) = ControlMessage::with_reply(ControlCommand::GetCacheSize);
        worker.handle_control(message).await;
        let reply = rx.await.unwrap();
        match reply {
            ControlReply::CacheSize { total_size, cache_names } => {
                // Install stored content-length for all three assets.
                let expected = ("<html>root</html>".len() + "<html>index</html>".len() + "console.log('app')".len()) as u64;
                assert_eq!(total_size, expected);
                assert_eq!(cache_names, vec!["courtside-v1".to_string()]);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_push_builds_notification() {
        let backend = FakeBackend::new();
        script_manifest(&backend);
        let (worker, _store) = installed_worker(backend).await;

        let notification = worker.on_push("Court 2 is ready");
        assert_eq!(notification.title, "Courtside");
        assert_eq!(notification.body, "Court 2 is ready");
    }
}
