//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_prefix`, `cache_version` or `user_agent` is empty
    /// - `retention_days` is outside 1..=365
    /// - `timeout_ms` is set and below 100ms or above 5 minutes
    /// - a manifest route or the offline page doesn't start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = url::Url::parse(&self.origin).map_err(|e| invalid("origin", e.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_version.is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }
        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !(1..=365).contains(&self.retention_days) {
            return Err(invalid("retention_days", "must be between 1 and 365"));
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(invalid("timeout_ms", "must be at least 100ms"));
            }
            if timeout_ms > 300_000 {
                return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
            }
        }

        if !self.offline_page.starts_with('/') {
            return Err(invalid("offline_page", "must be a site-relative route"));
        }
        for (field, routes) in [("precache", &self.precache), ("on_demand", &self.on_demand)] {
            if let Some(route) = routes.iter().find(|r| !r.starts_with('/')) {
                return Err(invalid(field, format!("route {route:?} must start with '/'")));
            }
        }

        if self.network_first_prefixes.is_empty() && self.cache_first_fragments.is_empty() {
            tracing::warn!("no classification rules configured; every request is stale-while-revalidate");
        }

        Ok(())
    }
}
