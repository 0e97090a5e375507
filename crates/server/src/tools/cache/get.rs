//! cache_get tool implementation.
//!
//! Retrieves a cached response from a partition by request method and URL.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::resolve;
use shellcache_core::{CacheDb, Error, Request, RequestMode};
use url::Url;

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Partition name, e.g. "site-static-v1.0.0".
    pub partition: String,

    /// Route or absolute URL of the cached request.
    pub url: String,

    /// Method of the cached request (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub partition: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub response_date: Option<String>,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(Error::from)?;
    let request = Request::new(&params.method, url, RequestMode::SameOrigin);

    let entry = cache
        .get_entry(&params.partition, &request)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} {} in {}", request.method, request.url, params.partition)))?;

    let output = CacheGetOutput {
        body: String::from_utf8_lossy(&entry.body).into_owned(),
        partition: entry.partition,
        method: entry.method,
        url: entry.url,
        status: entry.status,
        headers: entry.headers,
        response_date: entry.response_date,
        stored_at: entry.stored_at,
    };
    json_result(&output)
}
