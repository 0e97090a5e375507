//! SQLite-backed storage for cache partitions and queued form submissions.
//!
//! This module provides a persistent, partitioned request/response cache
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named partitions with cascading deletes
//! - Request keys derived from SHA-256 of method and URL
//! - Automatic schema migrations
//! - Age-based cleanup driven by the response `date` header
//! - A FIFO queue of form submissions awaiting background sync

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod store;
pub mod submissions;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use store::CacheStore;
pub use submissions::PendingSubmission;
