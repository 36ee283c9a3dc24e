//! Core types and shared functionality for courtside.
//!
//! This crate provides:
//! - Persistent cache store with SQLite backend, organized into named
//!   cache generations
//! - Unified error types
//! - Application configuration

pub mod config;
pub mod error;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use store::{CacheDb, ResponseSnapshot};
