//! Unified error types for courtside.
//!
//! Failures fall into three classes: transport failures (network
//! unreachable, abort, timeout), protocol failures (response received but
//! non-2xx), and cache-miss-with-no-fallback. The first two are locally
//! recoverable by cache substitution; only the third reaches callers.

use tokio_rusqlite::rusqlite;

/// Unified error types for the courtside caching subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unparseable URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Network-level failure: unreachable host, DNS, connection reset.
    #[error("TRANSPORT_ERROR: {0}")]
    Transport(String),

    /// Request deadline elapsed and the in-flight call was aborted.
    #[error("FETCH_TIMEOUT: {0}")]
    Timeout(String),

    /// Response received with a non-2xx status.
    #[error("HTTP_STATUS: {0}")]
    HttpStatus(u16),

    /// Response body could not be parsed.
    #[error("PARSE_FAILED: {0}")]
    Parse(String),

    /// Worker install aborted; the previous generation stays active.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),
}

impl Error {
    /// Whether a stale cache entry may be substituted for this failure.
    ///
    /// Covers transport failures (including timeout) and protocol
    /// failures. Store errors and invalid input are never substituted.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout(_) | Error::HttpStatus(_) | Error::Parse(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
