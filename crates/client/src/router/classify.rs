//! Request classification.
//!
//! Rules are evaluated in order and the first match wins. The final rule
//! always matches and selects stale-while-revalidate.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caching strategy for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::NetworkFirst => write!(f, "network-first"),
            Strategy::CacheFirst => write!(f, "cache-first"),
            Strategy::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
        }
    }
}

/// Predicate over a URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    PathPrefix(String),
    PathFragment(String),
    /// Case-insensitive suffix of the path, e.g. `.png`.
    Extension(String),
    Always,
}

impl Matcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::PathPrefix(prefix) => path.starts_with(prefix.as_str()),
            Matcher::PathFragment(fragment) => path.contains(fragment.as_str()),
            Matcher::Extension(ext) => path.to_ascii_lowercase().ends_with(&ext.to_ascii_lowercase()),
            Matcher::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub strategy: Strategy,
}

impl Rule {
    pub fn new(matcher: Matcher, strategy: Strategy) -> Self {
        Self { matcher, strategy }
    }
}

/// Ordered, immutable classification table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// Build from explicit rules, appending the catch-all if the last rule isn't one.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        if !matches!(rules.last(), Some(rule) if rule.matcher == Matcher::Always) {
            rules.push(Rule::new(Matcher::Always, Strategy::StaleWhileRevalidate));
        }
        Self { rules }
    }

    /// Build from the three literal tables.
    ///
    /// Network-first prefixes are checked before cache-first fragments and
    /// extensions, so `/api/logo.png` stays network-first.
    pub fn from_tables(network_first_prefixes: &[String], cache_first_fragments: &[String], extensions: &[String]) -> Self {
        let network_first = network_first_prefixes
            .iter()
            .map(|p| Rule::new(Matcher::PathPrefix(p.clone()), Strategy::NetworkFirst));
        let fragments = cache_first_fragments
            .iter()
            .map(|f| Rule::new(Matcher::PathFragment(f.clone()), Strategy::CacheFirst));
        let extensions = extensions
            .iter()
            .map(|e| Rule::new(Matcher::Extension(e.clone()), Strategy::CacheFirst));

        Self::new(network_first.chain(fragments).chain(extensions).collect())
    }

    pub fn classify(&self, path: &str) -> Strategy {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.strategy)
            .unwrap_or(Strategy::StaleWhileRevalidate)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
