//! HTTP backend seam.
//!
//! Network access goes through the [`Backend`] trait so the request cache
//! and the interception worker can be exercised against a programmable
//! fake in tests. The real implementation is [`HttpBackend`] on reqwest.
//!
//! Backends carry no timeout of their own: callers wrap `send` in
//! `tokio::time::timeout`, and dropping the future aborts the in-flight
//! call. Aborting one request never affects another.

use async_trait::async_trait;
use bytes::Bytes;
use courtside_core::{AppConfig, Error};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options accompanying a page request.
///
/// Serialized form participates in the ephemeral cache signature, so the
/// header map is ordered to keep signatures stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { method: default_method(), headers: BTreeMap::new(), body: None }
    }
}

/// Response produced by a backend: status, header pairs, raw body.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub bytes: Bytes,
}

impl BackendResponse {
    /// Whether the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over the physical network call.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issue a request and collect the full response.
    ///
    /// Errors are transport-class only; a non-2xx response is returned
    /// as-is and classified by the caller.
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<BackendResponse, Error>;
}

/// Real HTTP backend on reqwest.
pub struct HttpBackend {
    http: Client,
}

impl HttpBackend {
    /// Build the HTTP client from application configuration.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<BackendResponse, Error> {
        let method = reqwest::Method::from_bytes(options.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", options.method)))?;

        let mut request = self
            .http
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("network error: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response: {e}")))?;

        Ok(BackendResponse { status, headers, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RequestOptions::default();
        assert_eq!(options.method, "GET");
        assert!(options.headers.is_empty());
        assert!(options.body.is_none());
    }

    #[test]
    fn test_options_signature_is_stable() {
        let mut a = RequestOptions::default();
        a.headers.insert("x-b".into(), "2".into());
        a.headers.insert("x-a".into(), "1".into());

        let mut b = RequestOptions::default();
        b.headers.insert("x-a".into(), "1".into());
        b.headers.insert("x-b".into(), "2".into());

        let sig_a = serde_json::to_string(&a).unwrap();
        let sig_b = serde_json::to_string(&b).unwrap();
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn test_response_ok_range() {
        let make = |status| BackendResponse { status, headers: vec![], bytes: Bytes::new() };
        assert!(make(200).ok());
        assert!(make(204).ok());
        assert!(!make(304).ok());
        assert!(!make(404).ok());
        assert!(!make(500).ok());
    }

    #[test]
    fn test_http_backend_new() {
        let config = AppConfig::default();
        assert!(HttpBackend::new(&config).is_ok());
    }
}
