//! cache_purge tool implementation.
//!
//! Purges entries of one partition by age or URL prefix.

use chrono::{Duration, Utc};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::resolve;
use shellcache_core::{CacheDb, Error};
use url::Url;

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Partition to purge.
    pub partition: String,

    /// Purge entries whose response date is older than this many days.
    /// Entries without a date are kept.
    pub older_than_days: Option<i64>,

    /// Purge entries whose URL starts with this route or absolute URL.
    pub url_prefix: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, origin: &Url, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.older_than_days.is_none() && params.url_prefix.is_none() {
        return Err(
            ToolError::InvalidInput("At least one of older_than_days or url_prefix must be specified".to_string()).into(),
        );
    }

    let mut deleted_total = 0u64;

    if let Some(days) = params.older_than_days {
        if days < 0 {
            return Err(ToolError::InvalidInput(format!("older_than_days must not be negative, got {days}")).into());
        }
        let cutoff = Utc::now() - Duration::days(days);
        deleted_total += cache.purge_entries_older_than(&params.partition, cutoff).await?;
    }

    if let Some(prefix) = params.url_prefix {
        let prefix = resolve(origin, &prefix).map_err(Error::from)?;
        deleted_total += cache
            .purge_entries_by_url_prefix(&params.partition, prefix.as_str())
            .await?;
    }

    tracing::info!(partition = %params.partition, deleted = deleted_total, "cache purge");
    json_result(&CachePurgeOutput { deleted: deleted_total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::output;
    use shellcache_core::http::format_http_date;
    use shellcache_core::{Request, Response};

    const PARTITION: &str = "site-dynamic-v1.0.0";

    fn origin() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    async fn seed(cache: &CacheDb, path: &str, age_days: i64) {
        let request = Request::get(origin().join(path).unwrap());
        let response =
            Response::new(200, path).with_header("Date", &format_http_date(Utc::now() - Duration::days(age_days)));
        cache.put_entry(PARTITION, &request, &response).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_by_url_prefix() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        seed(&cache, "/api/feed", 0).await;
        seed(&cache, "/api/status", 0).await;
        seed(&cache, "/docs", 0).await;

        let params = CachePurgeParams { partition: PARTITION.into(), older_than_days: None, url_prefix: Some("/api/".into()) };
        let out: CachePurgeOutput = output(&purge_impl(&cache, &origin(), params).await.unwrap());
        assert_eq!(out.deleted, 2);
    }

    #[tokio::test]
    async fn test_purge_by_age() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        seed(&cache, "/old", 30).await;
        seed(&cache, "/new", 1).await;

        let params = CachePurgeParams { partition: PARTITION.into(), older_than_days: Some(7), url_prefix: None };
        let out: CachePurgeOutput = output(&purge_impl(&cache, &origin(), params).await.unwrap());
        assert_eq!(out.deleted, 1);
    }

    #[tokio::test]
    async fn test_purge_no_params() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let params = CachePurgeParams { partition: PARTITION.into(), older_than_days: None, url_prefix: None };

        let result = purge_impl(&cache, &origin(), params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_purge_negative_days() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let params = CachePurgeParams { partition: PARTITION.into(), older_than_days: Some(-1), url_prefix: None };

        assert_eq!(purge_impl(&cache, &origin(), params).await.unwrap_err().code.0, -32602);
    }
}
