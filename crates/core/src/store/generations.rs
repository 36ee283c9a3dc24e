//! Cache generation lifecycle operations.
//!
//! Generations are named partitions of the entries table. Activation of a
//! new worker retains exactly the current static and runtime generations
//! and deletes everything else; a hard reset deletes them all.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Aggregate size report across all generations.
///
/// `total_size` sums each entry's content-length (0 when the header was
/// absent), matching what the size control message reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSizeReport {
    pub total_size: u64,
    pub cache_names: Vec<String>,
}

impl CacheDb {
    /// List the distinct generation names currently present.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT DISTINCT generation FROM entries ORDER BY generation")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry in a single generation.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_generation(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries WHERE generation = ?1", params![generation])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation whose name is not in `keep`.
    ///
    /// This is the activation-time eviction step. Returns the number of
    /// deleted entries.
    pub async fn retain_generations(&self, keep: &[String]) -> Result<u64, Error> {
        if keep.is_empty() {
            return self.clear_all().await;
        }
        let keep = keep.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let placeholders = (1..=keep.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!("DELETE FROM entries WHERE generation NOT IN ({placeholders})");
                let params = keep
                    .iter()
                    .map(|name| name as &dyn tokio_rusqlite::rusqlite::ToSql)
                    .collect::<Vec<_>>();
                let count = conn.execute(&sql, params.as_slice())?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry of every generation (hard reset).
    ///
    /// Returns the number of deleted entries.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Aggregate byte size across all generations.
    ///
    /// Sums content-length per entry, treating absent values as 0, and
    /// returns the generation names alongside the total.
    pub async fn total_size(&self) -> Result<CacheSizeReport, Error> {
        let cache_names = self.list_generations().await?;
        let total_size: i64 = self
            .conn
            .call(|conn| -> Result<i64, Error> {
                let total = conn.query_row(
                    "SELECT COALESCE(SUM(COALESCE(content_length, 0)), 0) FROM entries",
                    [],
                    |row| row.get(0),
                )?;
                Ok(total)
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheSizeReport { total_size: total_size.max(0) as u64, cache_names })
    }
}
