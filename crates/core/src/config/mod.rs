//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the site being served; other origins are never intercepted.
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by all partition names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Cache version; bumping it retires every partition on the next activation.
    ///
    /// Set via SHELLCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional network timeout in milliseconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Age after which dynamic entries are removed by periodic cleanup.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Route of the document served to failed navigations.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Routes and assets fetched into the static partition at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Routes meant for caching on first visit. Not consulted by any strategy.
    #[serde(default = "default_on_demand")]
    pub on_demand: Vec<String>,

    /// Path prefixes routed network-first.
    #[serde(default = "default_network_first_prefixes")]
    pub network_first_prefixes: Vec<String>,

    /// Path fragments routed cache-first.
    #[serde(default = "default_cache_first_fragments")]
    pub cache_first_fragments: Vec<String>,

    /// File extensions routed cache-first.
    #[serde(default = "default_cache_first_extensions")]
    pub cache_first_extensions: Vec<String>,

    /// Icon used when a push payload doesn't name one.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Badge used for every push notification.
    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,

    /// Tag used when a push payload doesn't name one.
    #[serde(default = "default_notification_tag")]
    pub notification_tag: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "site".into()
}

fn default_cache_version() -> String {
    "v1.0.0".into()
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_retention_days() -> i64 {
    7
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_precache() -> Vec<String> {
    strings(&[
        "/",
        "/about",
        "/services",
        "/contact",
        "/faq",
        "/docs",
        "/community",
        "/developers",
        "/training",
        "/privacy",
        "/terms",
        "/ai-tools",
        "/ai-tools/chatbot",
        "/ai-tools/analytics",
        "/login",
        "/signup",
        "/manifest.json",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
    ])
}

fn default_on_demand() -> Vec<String> {
    strings(&[
        "/industries/healthcare",
        "/industries/finance",
        "/industries/retail",
        "/industries/manufacturing",
        "/regions/north-america",
        "/regions/europe",
        "/regions/asia-pacific",
        "/business/small-business",
        "/business/enterprise",
    ])
}

fn default_network_first_prefixes() -> Vec<String> {
    strings(&["/api/", "/admin", "/account", "/notifications", "/cart", "/status"])
}

fn default_cache_first_fragments() -> Vec<String> {
    strings(&["/images/", "/icons/", "/screenshots/"])
}

fn default_cache_first_extensions() -> Vec<String> {
    strings(&[
        ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".css", ".js", ".woff", ".woff2", ".ttf",
    ])
}

fn default_notification_icon() -> String {
    "/icons/icon-192x192.png".into()
}

fn default_notification_badge() -> String {
    "/icons/badge-72x72.png".into()
}

fn default_notification_tag() -> String {
    "site-notification".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            timeout_ms: None,
            retention_days: default_retention_days(),
            offline_page: default_offline_page(),
            precache: default_precache(),
            on_demand: default_on_demand(),
            network_first_prefixes: default_network_first_prefixes(),
            cache_first_fragments: default_cache_first_fragments(),
            cache_first_extensions: default_cache_first_extensions(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
            notification_tag: default_notification_tag(),
        }
    }
}

impl AppConfig {
    /// Network timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Retention window for dynamic entries.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    /// Version string reported to pages, e.g. `site-v1.0.0`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    /// Name of one partition, e.g. `site-static-v1.0.0`.
    pub fn partition_name(&self, kind: &str) -> String {
        format!("{}-{}-{}", self.cache_prefix, kind, self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
