//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Request/response model shared by the router and its hosts
//! - Partitioned cache storage with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStore, CachedEntry, PendingSubmission};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Request, RequestMode, Response};
