//! Storage seam used by the cache router.
//!
//! `CacheDb` is the production backend; tests can substitute their own
//! implementation. Every call is atomic on its own; no ordering is
//! guaranteed between concurrent calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::connection::CacheDb;
use super::submissions::PendingSubmission;
use crate::{Error, Request, Response};

/// Partitioned request/response storage plus the submission queue.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn open_partition(&self, name: &str) -> Result<(), Error>;

    async fn partition_names(&self) -> Result<Vec<String>, Error>;

    async fn delete_partition(&self, name: &str) -> Result<bool, Error>;

    async fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error>;

    async fn remove(&self, partition: &str, request: &Request) -> Result<bool, Error>;

    async fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error>;

    /// Match across every partition.
    async fn lookup_any(&self, request: &Request) -> Result<Option<Response>, Error>;

    async fn purge_older_than(&self, partition: &str, cutoff: DateTime<Utc>) -> Result<u64, Error>;

    async fn enqueue_submission(&self, tag: &str, request: &Request) -> Result<i64, Error>;

    async fn pending_submissions(&self, tag: &str) -> Result<Vec<PendingSubmission>, Error>;

    async fn complete_submission(&self, id: i64) -> Result<bool, Error>;

    async fn record_submission_failure(&self, id: i64, error: &str) -> Result<(), Error>;
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open_partition(&self, name: &str) -> Result<(), Error> {
        CacheDb::open_partition(self, name).await
    }

    async fn partition_names(&self) -> Result<Vec<String>, Error> {
        CacheDb::partition_names(self).await
    }

    async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        CacheDb::delete_partition(self, name).await
    }

    async fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_entry(partition, request, response).await
    }

    async fn remove(&self, partition: &str, request: &Request) -> Result<bool, Error> {
        self.delete_entry(partition, request).await
    }

    async fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        Ok(self
            .get_entry(partition, request)
            .await?
            .map(|entry| entry.into_response()))
    }

    async fn lookup_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        Ok(self.find_entry(request).await?.map(|entry| entry.into_response()))
    }

    async fn purge_older_than(&self, partition: &str, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        self.purge_entries_older_than(partition, cutoff).await
    }

    async fn enqueue_submission(&self, tag: &str, request: &Request) -> Result<i64, Error> {
        CacheDb::enqueue_submission(self, tag, request).await
    }

    async fn pending_submissions(&self, tag: &str) -> Result<Vec<PendingSubmission>, Error> {
        CacheDb::pending_submissions(self, tag).await
    }

    async fn complete_submission(&self, id: i64) -> Result<bool, Error> {
        CacheDb::complete_submission(self, id).await
    }

    async fn record_submission_failure(&self, id: i64, error: &str) -> Result<(), Error> {
        CacheDb::record_submission_failure(self, id, error).await
    }
}
