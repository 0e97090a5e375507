//! fetch tool implementation.
//!
//! Sends a request through the offline router. Requests the router does
//! not intercept go straight to the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::resolve;
use shellcache_client::router::{FetchOutcome, Network, OfflineRouter, ResponseSource, Strategy};
use shellcache_core::{Error, Request, RequestMode, Response};

use super::json_result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Site route (e.g. `/faq`) or absolute URL.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin" (default), "cors" or "no-cors".
    #[serde(default = "default_mode")]
    pub mode: RequestMode,

    #[serde(default)]
    pub headers: Vec<Header>,

    /// UTF-8 request body.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

fn default_mode() -> RequestMode {
    RequestMode::SameOrigin
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    pub url: String,
    /// False when the router let the request pass through.
    pub intercepted: bool,
    pub source: Option<ResponseSource>,
    pub strategy: Option<Strategy>,
    pub status: u16,
    pub headers: Vec<Header>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
}

impl FetchOutput {
    fn new(url: String, response: Response, source: Option<ResponseSource>, strategy: Option<Strategy>) -> Self {
        let body = response.text();
        Self {
            url,
            intercepted: source.is_some(),
            source,
            strategy,
            status: response.status,
            headers: response
                .headers
                .into_iter()
                .map(|(name, value)| Header { name, value })
                .collect(),
            body,
        }
    }
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(
    router: &OfflineRouter, network: &dyn Network, params: FetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = resolve(&router.config().origin, &params.url).map_err(Error::from)?;
    let mut request = Request::new(&params.method, url, params.mode);
    for header in &params.headers {
        request = request.with_header(&header.name, &header.value);
    }
    request.body = params.body.map(String::into_bytes);

    let url = request.url.to_string();
    let output = match router.handle_fetch(&request).await? {
        FetchOutcome::Respond(routed) => FetchOutput::new(url, routed.response, Some(routed.source), Some(routed.strategy)),
        FetchOutcome::Passthrough => {
            tracing::debug!(url = %url, "passthrough to network");
            FetchOutput::new(url, network.fetch(&request).await?, None, None)
        }
    };

    json_result(&output)
}
