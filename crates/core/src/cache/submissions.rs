//! Queue of form submissions captured while offline.
//!
//! Entries are grouped by background-sync tag and drained in FIFO order.

use super::connection::CacheDb;
use super::entries::storage_timestamp;
use crate::{Error, Request};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A queued form submission awaiting replay.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PendingSubmission {
    pub id: i64,
    pub tag: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub queued_at: String,
    pub attempts: i64,
    pub last_error: Option<String>,
}

struct SubmissionRow {
    id: i64,
    tag: String,
    method: String,
    url: String,
    headers_json: String,
    body: Vec<u8>,
    queued_at: String,
    attempts: i64,
    last_error: Option<String>,
}

impl SubmissionRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tag: row.get(1)?,
            method: row.get(2)?,
            url: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
            queued_at: row.get(6)?,
            attempts: row.get(7)?,
            last_error: row.get(8)?,
        })
    }

    fn decode(self) -> Result<PendingSubmission, Error> {
        Ok(PendingSubmission {
            id: self.id,
            tag: self.tag,
            method: self.method,
            url: self.url,
            headers: serde_json::from_str(&self.headers_json)?,
            body: self.body,
            queued_at: self.queued_at,
            attempts: self.attempts,
            last_error: self.last_error,
        })
    }
}

impl CacheDb {
    /// Queue a submission under a sync tag.
    ///
    /// Returns the id of the queued entry.
    pub async fn enqueue_submission(&self, tag: &str, request: &Request) -> Result<i64, Error> {
        let tag = tag.to_string();
        let method = request.method.clone();
        let url = request.url.to_string();
        let headers_json = serde_json::to_string(&request.headers)?;
        let body = request.body.clone().unwrap_or_default();
        let queued_at = storage_timestamp(Utc::now());

        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO submissions (tag, method, url, headers_json, body, queued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![tag, method, url, headers_json, body, queued_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// All queued submissions for a tag, oldest first.
    pub async fn pending_submissions(&self, tag: &str) -> Result<Vec<PendingSubmission>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<PendingSubmission>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, tag, method, url, headers_json, body, queued_at, attempts, last_error
                     FROM submissions WHERE tag = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map(params![tag], SubmissionRow::read)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(SubmissionRow::decode).collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a submission after it was delivered.
    pub async fn complete_submission(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM submissions WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record a failed replay; the submission stays queued.
    pub async fn record_submission_failure(&self, id: i64, error: &str) -> Result<(), Error> {
        let error = error.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE submissions SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
                    params![id, error],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of queued submissions for a tag.
    pub async fn count_submissions(&self, tag: &str) -> Result<u64, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM submissions WHERE tag = ?1", params![tag], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn contact(body: &str) -> Request {
        Request::post(Url::parse("https://example.com/api/contact").unwrap(), body.as_bytes().to_vec())
            .with_header("Content-Type", "application/json")
    }

    #[tokio::test]
    async fn test_enqueue_and_list() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = db.enqueue_submission("contact-form", &contact(r#"{"n":1}"#)).await.unwrap();
        let second = db.enqueue_submission("contact-form", &contact(r#"{"n":2}"#)).await.unwrap();
        db.enqueue_submission("newsletter-signup", &contact("{}")).await.unwrap();

        let pending = db.pending_submissions("contact-form").await.unwrap();
        assert_eq!(pending.iter().map(|p| p.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(pending[0].method, "POST");
        assert_eq!(pending[0].body, br#"{"n":1}"#);
        assert_eq!(pending[0].headers, vec![("Content-Type".to_string(), "application/json".to_string())]);
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_complete_removes() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = db.enqueue_submission("contact-form", &contact("{}")).await.unwrap();

        assert!(db.complete_submission(id).await.unwrap());
        assert_eq!(db.count_submissions("contact-form").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = db.enqueue_submission("newsletter-signup", &contact("{}")).await.unwrap();

        db.record_submission_failure(id, "status 502").await.unwrap();

        let pending = db.pending_submissions("newsletter-signup").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("status 502"));
    }
}
