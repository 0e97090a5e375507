//! Cached request/response entries.
//!
//! Entries are keyed by `(partition, request key)`. Writes upsert, so the
//! last successful write for a key wins.

use super::connection::CacheDb;
use crate::{Error, Request, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const ENTRY_COLUMNS: &str = "partition, key_hash, method, url, status, headers_json, body, response_date, stored_at";

/// A stored response together with the request it answers.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CachedEntry {
    pub partition: String,
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Response `date` header normalised to RFC 3339, if it parsed.
    pub response_date: Option<String>,
    pub stored_at: String,
}

impl CachedEntry {
    pub fn into_response(self) -> Response {
        Response { status: self.status, headers: self.headers, body: self.body }
    }
}

struct EntryRow {
    partition: String,
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
    response_date: Option<String>,
    stored_at: String,
}

impl EntryRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            partition: row.get(0)?,
            key_hash: row.get(1)?,
            method: row.get(2)?,
            url: row.get(3)?,
            status: row.get(4)?,
            headers_json: row.get(5)?,
            body: row.get(6)?,
            response_date: row.get(7)?,
            stored_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<CachedEntry, Error> {
        let headers = serde_json::from_str(&self.headers_json)?;
        Ok(CachedEntry {
            partition: self.partition,
            key_hash: self.key_hash,
            method: self.method,
            url: self.url,
            status: self.status,
            headers,
            body: self.body,
            response_date: self.response_date,
            stored_at: self.stored_at,
        })
    }
}

/// Timestamps are stored in one fixed format so they compare as strings.
pub(crate) fn storage_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CacheDb {
    /// Insert or replace the entry for `request` in `partition`.
    ///
    /// The partition is created if it doesn't exist.
    pub async fn put_entry(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let partition = partition.to_string();
        let key_hash = request.cache_key();
        let method = request.method.clone();
        let url = request.url.to_string();
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.clone();
        let response_date = response.date().map(storage_timestamp);
        let now = storage_timestamp(Utc::now());

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![&partition, &now],
                )?;
                conn.execute(
                    "INSERT INTO entries (
                        partition, key_hash, method, url, status, headers_json, body, response_date, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(partition, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        response_date = excluded.response_date,
                        stored_at = excluded.stored_at",
                    params![partition, key_hash, method, url, status, headers_json, body, response_date, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `request` in one partition.
    pub async fn get_entry(&self, partition: &str, request: &Request) -> Result<Option<CachedEntry>, Error> {
        let partition = partition.to_string();
        let key_hash = request.cache_key();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE partition = ?1 AND key_hash = ?2"
                ))?;

                match stmt.query_row(params![partition, key_hash], EntryRow::read) {
                    Ok(row) => Ok(Some(row.decode()?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Find the entry for `request` in any partition.
    ///
    /// Partitions are searched in creation order; the first hit wins.
    pub async fn find_entry(&self, request: &Request) -> Result<Option<CachedEntry>, Error> {
        let key_hash = request.cache_key();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.partition, e.key_hash, e.method, e.url, e.status, e.headers_json, e.body,
                            e.response_date, e.stored_at
                     FROM entries e JOIN partitions p ON p.name = e.partition
                     WHERE e.key_hash = ?1
                     ORDER BY p.rowid ASC
                     LIMIT 1",
                )?;

                match stmt.query_row(params![key_hash], EntryRow::read) {
                    Ok(row) => Ok(Some(row.decode()?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// List all entries of a partition, oldest write first.
    pub async fn list_entries(&self, partition: &str) -> Result<Vec<CachedEntry>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CachedEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE partition = ?1 ORDER BY stored_at ASC, url ASC"
                ))?;
                let rows = stmt
                    .query_map(params![partition], EntryRow::read)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(EntryRow::decode).collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `request` from a partition.
    pub async fn delete_entry(&self, partition: &str, request: &Request) -> Result<bool, Error> {
        let partition = partition.to_string();
        let key_hash = request.cache_key();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose response date is older than `cutoff`.
    ///
    /// Entries without a parsable `date` header are never removed.
    /// Returns the number of deleted entries.
    pub async fn purge_entries_older_than(&self, partition: &str, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let partition = partition.to_string();
        let cutoff = storage_timestamp(cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries
                     WHERE partition = ?1 AND response_date IS NOT NULL AND response_date < ?2",
                    params![partition, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose URL starts with `prefix`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries_by_url_prefix(&self, partition: &str, prefix: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND substr(url, 1, length(?2)) = ?2",
                    params![partition, prefix],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
