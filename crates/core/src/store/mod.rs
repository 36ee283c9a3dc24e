//! SQLite-backed persistent cache store for captured responses.
//!
//! This module provides a durable key-value store of (request identity ->
//! response snapshot), organized into named cache generations, with async
//! access via tokio-rusqlite. It supports:
//!
//! - Request-identity keys as SHA-256 of method + URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Wholesale generation eviction at worker activation

pub mod connection;
pub mod entries;
pub mod generations;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::ResponseSnapshot;
pub use generations::CacheSizeReport;
