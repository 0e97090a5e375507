//! Request and response model shared by the router, its storage and hosts.
//!
//! Header names compare case-insensitively; header order is preserved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_cache_key;

/// How the requesting page issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Loading a new document.
    Navigate,
    SameOrigin,
    Cors,
    NoCors,
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Absolute URL with the fragment removed.
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Create a request; the method is upper-cased and the fragment dropped.
    pub fn new(method: &str, mut url: Url, mode: RequestMode) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url, mode, headers: Vec::new(), body: None }
    }

    /// A sub-resource GET.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::SameOrigin)
    }

    /// A document navigation.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    /// A POST carrying `body`.
    pub fn post(url: Url, body: Vec<u8>) -> Self {
        let mut request = Self::new("POST", url, RequestMode::SameOrigin);
        request.body = Some(body);
        request
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Storage key for this request.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }
}

/// A network or cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The parsed `date` header, if present and well-formed.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.header("date").and_then(parse_http_date)
    }

    /// Lossy UTF-8 view of the body.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Synthetic response for requests neither the network nor the cache can satisfy.
    pub fn offline_error() -> Self {
        let body = serde_json::json!({
            "error": "Offline",
            "message": "You are currently offline and this content is not available in the cache.",
        });
        Self::new(503, body.to_string()).with_header("Content-Type", "application/json")
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parse an HTTP date (`Tue, 15 Nov 1994 08:12:31 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Format a timestamp as an HTTP date.
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
