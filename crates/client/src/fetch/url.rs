//! URL canonicalization and origin checks.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for shellcache_core::Error {
    fn from(err: UrlError) -> Self {
        shellcache_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string for consistent cache keys.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a site route (`/faq`) or absolute URL against the site origin.
pub fn resolve(origin: &Url, target: &str) -> Result<Url, UrlError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    if trimmed.contains("://") {
        return canonicalize(trimmed);
    }

    let mut joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    joined.set_fragment(None);
    Ok(joined)
}

/// True when scheme, host and port match.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://example.com/docs?a=1&b=2#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_route() {
        let origin = Url::parse("https://example.com").unwrap();
        let url = resolve(&origin, "/images/hero.jpg#top").unwrap();
        assert_eq!(url.as_str(), "https://example.com/images/hero.jpg");
    }

    #[test]
    fn test_resolve_absolute() {
        let origin = Url::parse("https://example.com").unwrap();
        let url = resolve(&origin, "https://cdn.example.net/lib.js").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.net"));
    }

    #[test]
    fn test_same_origin() {
        let origin = Url::parse("https://example.com").unwrap();
        assert!(is_same_origin(&origin, &Url::parse("https://example.com/faq").unwrap()));
        assert!(!is_same_origin(&origin, &Url::parse("http://example.com/faq").unwrap()));
        assert!(!is_same_origin(&origin, &Url::parse("https://example.com:8443/").unwrap()));
        assert!(!is_same_origin(&origin, &Url::parse("https://www.google-analytics.com/g/collect").unwrap()));
    }
}
