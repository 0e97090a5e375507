//! Background sync of queued form submissions and periodic cleanup.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Error, PendingSubmission, Request, RequestMode};
use url::Url;

use super::OfflineRouter;

pub const CONTACT_FORM_SYNC: &str = "contact-form";
pub const NEWSLETTER_SYNC: &str = "newsletter-signup";
pub const CLEANUP_SYNC: &str = "cache-cleanup";

const SUBMISSION_TAGS: [&str; 2] = [CONTACT_FORM_SYNC, NEWSLETTER_SYNC];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncReport {
    pub replayed: usize,
    /// Submissions still queued after this run.
    pub remaining: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CleanupReport {
    pub deleted: u64,
}

fn replay_request(submission: &PendingSubmission) -> Result<Request, Error> {
    let url = Url::parse(&submission.url)?;
    let mut request = Request::new(&submission.method, url, RequestMode::SameOrigin);
    request.headers = submission.headers.clone();
    request.body = Some(submission.body.clone());
    Ok(request)
}

impl OfflineRouter {
    /// Store a submission made while offline and ask the host to sync `tag` later.
    pub async fn queue_submission(&self, tag: &str, request: &Request) -> Result<i64, Error> {
        if !SUBMISSION_TAGS.contains(&tag) {
            return Err(Error::InvalidInput(format!("unknown sync tag: {tag}")));
        }
        let id = self.store.enqueue_submission(tag, request).await?;
        self.host.scheduler.register_sync(tag).await?;
        tracing::info!(tag, id, url = %request.url, "submission queued");
        Ok(id)
    }

    /// Replay every submission queued under `tag`, oldest first.
    ///
    /// Entries are removed only after an ok response. A failed bookkeeping
    /// write leaves the entry queued and the drain continues. Unknown tags
    /// do nothing.
    pub async fn handle_sync(&self, tag: &str) -> Result<SyncReport, Error> {
        if !SUBMISSION_TAGS.contains(&tag) {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Ok(SyncReport::default());
        }

        let pending = self.store.pending_submissions(tag).await?;
        let mut report = SyncReport::default();

        for submission in &pending {
            let outcome = match replay_request(submission) {
                Ok(request) => self.network.fetch(&request).await,
                Err(e) => Err(e),
            };
            let failure = match outcome {
                Ok(response) if response.is_ok() => match self.store.complete_submission(submission.id).await {
                    Ok(_) => {
                        report.replayed += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(tag, id = submission.id, error = %e, "delivered submission could not be dequeued");
                        report.remaining += 1;
                        continue;
                    }
                },
                Ok(response) => format!("server returned {}", response.status),
                Err(e) => e.to_string(),
            };

            tracing::warn!(tag, id = submission.id, reason = %failure, "submission replay failed");
            if let Err(e) = self.store.record_submission_failure(submission.id, &failure).await {
                tracing::warn!(tag, id = submission.id, error = %e, "could not record replay failure");
            }
            report.remaining += 1;
        }

        if report.remaining > 0 {
            self.host.scheduler.register_sync(tag).await?;
        }
        tracing::info!(tag, replayed = report.replayed, remaining = report.remaining, "sync finished");
        Ok(report)
    }

    /// Periodic task entry point. Errors are logged, never returned.
    pub async fn handle_periodic_sync(&self, tag: &str) -> CleanupReport {
        if tag != CLEANUP_SYNC {
            tracing::debug!(tag, "ignoring unknown periodic sync tag");
            return CleanupReport::default();
        }
        match self.cleanup_dynamic().await {
            Ok(deleted) => CleanupReport { deleted },
            Err(e) => {
                tracing::warn!(error = %e, "cache cleanup failed");
                CleanupReport::default()
            }
        }
    }

    /// Delete dynamic entries dated before the retention window. Undated entries stay.
    pub async fn cleanup_dynamic(&self) -> Result<u64, Error> {
        let cutoff = Utc::now() - self.config.retention;
        let partition = &self.config.partitions.dynamic;
        let deleted = self.store.purge_older_than(partition, cutoff).await?;
        tracing::info!(partition = %partition, deleted, %cutoff, "cache cleanup");
        Ok(deleted)
    }
}
