//! Response snapshot CRUD operations.
//!
//! A snapshot is an immutable capture of a response (status, headers,
//! body), keyed by request identity within a cache generation. Snapshots
//! are overwritten wholesale on rewrite, never merged.

use super::connection::CacheDb;
use super::key::compute_entry_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached response snapshot.
///
/// `content_length` mirrors the response's content-length header and is
/// absent when the header was; size reporting treats it as 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub key: String,
    pub generation: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub content_length: Option<i64>,
    pub stored_at: String,
}

impl ResponseSnapshot {
    /// Build a snapshot for a GET response, deriving the key and reading
    /// content-length out of the header pairs.
    pub fn capture(generation: &str, url: &str, status: u16, headers: &[(String, String)], body: Vec<u8>) -> Self {
        let content_length = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.parse::<i64>().ok());
        let headers_json = serde_json::to_string(headers).ok();

        Self {
            key: compute_entry_key("GET", url),
            generation: generation.to_string(),
            method: "GET".to_string(),
            url: url.to_string(),
            status,
            headers_json,
            body,
            content_length,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Deserialize the stored header pairs, empty when absent or corrupt.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.headers_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }
}

impl CacheDb {
    /// Insert or update a cached snapshot.
    ///
    /// Uses UPSERT semantics: inserts if (key, generation) doesn't exist,
    /// replaces every field if it does.
    pub async fn put_entry(&self, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        let snapshot = snapshot.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                    key, generation, method, url, status,
                    headers_json, body, content_length, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(key, generation) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    content_length = excluded.content_length,
                    stored_at = excluded.stored_at",
                    params![
                        &snapshot.key,
                        &snapshot.generation,
                        &snapshot.method,
                        &snapshot.url,
                        snapshot.status as i64,
                        &snapshot.headers_json,
                        &snapshot.body,
                        &snapshot.content_length,
                        &snapshot.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a snapshot by key within a single generation.
    ///
    /// Returns None if the key doesn't exist in that generation.
    pub async fn get_entry(&self, generation: &str, key: &str) -> Result<Option<ResponseSnapshot>, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, generation, method, url, status,
                            headers_json, body, content_length, stored_at
                     FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], row_to_snapshot);

                match result {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get the newest snapshot for a key across every generation.
    ///
    /// This is the stale-fallback lookup: the network-first strategy
    /// matches any cache, not just the runtime generation.
    pub async fn get_entry_any(&self, key: &str) -> Result<Option<ResponseSnapshot>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, generation, method, url, status,
                            headers_json, body, content_length, stored_at
                     FROM entries WHERE key = ?1
                     ORDER BY stored_at DESC LIMIT 1",
                )?;

                let result = stmt.query_row(params![key], row_to_snapshot);

                match result {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> Result<ResponseSnapshot, rusqlite::Error> {
    Ok(ResponseSnapshot {
        key: row.get(0)?,
        generation: row.get(1)?,
        method: row.get(2)?,
        url: row.get(3)?,
        status: row.get::<_, i64>(4)? as u16,
        headers_json: row.get(5)?,
        body: row.get(6)?,
        content_length: row.get(7)?,
        stored_at: row.get(8)?,
    })
}
