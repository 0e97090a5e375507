//! Offline cache router.
//!
//! Intercepts same-origin GET requests, classifies them into one of three
//! caching strategies and serves them from the network or from named cache
//! partitions. Also owns background sync of queued form submissions,
//! periodic cleanup of the dynamic partition and push notifications.
//!
//! ### Partitions
//! - `static`: written at install time and by cache-first requests
//! - `dynamic`: written by network-first and stale-while-revalidate requests
//! - `install`: reserved; kept across activations
//!
//! ### Concurrency
//! - Every request is handled independently; concurrent fetches of the
//!   same URL are not coalesced and the last cache write wins.
//! - Background refreshes run as detached tasks and are never cancelled.

pub mod capabilities;
pub mod classify;
pub mod lifecycle;
pub mod push;
pub mod strategies;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use capabilities::{
    ClientRegistry, DeferredTaskScheduler, HostCapabilities, Network, Notification, NotificationAction,
    NotificationDisplay, WindowClient,
};
pub use classify::{Classifier, Matcher, Rule, Strategy};
pub use lifecycle::{ActivateReport, ControlMessage, InstallReport, LifecycleState, VersionReply};
pub use push::{ClickOutcome, NotificationClick, PushData, PushPayload};
pub use strategies::{FetchOutcome, ResponseSource, RoutedResponse};
pub use sync::{CLEANUP_SYNC, CONTACT_FORM_SYNC, CleanupReport, NEWSLETTER_SYNC, SyncReport};

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use shellcache_core::{AppConfig, CacheStore, Error, Request};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::resolve;

/// Names of the three current partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    pub static_assets: String,
    pub dynamic: String,
    pub install: String,
}

impl PartitionNames {
    pub fn all(&self) -> [&str; 3] {
        [self.static_assets.as_str(), self.dynamic.as_str(), self.install.as_str()]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

/// Values used when a push payload leaves a field out.
#[derive(Debug, Clone)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub url: String,
    pub actions: Vec<NotificationAction>,
}

/// Router configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub origin: Url,
    /// Reported by `GET_VERSION`.
    pub version: String,
    pub partitions: PartitionNames,
    pub precache: Vec<String>,
    /// Routes meant for caching on first visit. Not consulted by any strategy.
    pub on_demand: Vec<String>,
    pub offline_page: String,
    pub classifier: Classifier,
    pub retention: chrono::Duration,
    pub notifications: NotificationDefaults,
}

impl RouterConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin)?;

        Ok(Self {
            origin,
            version: config.cache_name(),
            partitions: PartitionNames {
                static_assets: config.partition_name("static"),
                dynamic: config.partition_name("dynamic"),
                install: config.partition_name("install"),
            },
            precache: config.precache.clone(),
            on_demand: config.on_demand.clone(),
            offline_page: config.offline_page.clone(),
            classifier: Classifier::from_tables(
                &config.network_first_prefixes,
                &config.cache_first_fragments,
                &config.cache_first_extensions,
            ),
            retention: config.retention(),
            notifications: NotificationDefaults {
                title: "New update available".into(),
                body: "There's something new for you on the site.".into(),
                icon: config.notification_icon.clone(),
                badge: config.notification_badge.clone(),
                tag: config.notification_tag.clone(),
                url: "/".into(),
                actions: vec![
                    NotificationAction { action: "explore".into(), title: "View details".into(), icon: None },
                    NotificationAction { action: "close".into(), title: "Close".into(), icon: None },
                ],
            },
        })
    }

    /// Absolute URL of a site route.
    pub fn url_for(&self, route: &str) -> Result<Url, Error> {
        Ok(resolve(&self.origin, route)?)
    }

    /// Requests fetched at install time: the pre-population manifest plus the offline page.
    pub fn install_requests(&self) -> Result<Vec<Request>, Error> {
        let mut requests: Vec<Request> = Vec::with_capacity(self.precache.len() + 1);
        for route in self.precache.iter().chain(std::iter::once(&self.offline_page)) {
            let request = Request::get(self.url_for(route)?);
            if !requests.iter().any(|r| r.url == request.url) {
                requests.push(request);
            }
        }
        Ok(requests)
    }
}

/// The offline cache router.
pub struct OfflineRouter {
    config: Arc<RouterConfig>,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    host: HostCapabilities,
    state: RwLock<LifecycleState>,
    waiting_skipped: AtomicBool,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineRouter {
    pub fn new(
        config: RouterConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>, host: HostCapabilities,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            network,
            host,
            state: RwLock::new(LifecycleState::Parsed),
            waiting_skipped: AtomicBool::new(false),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Start a detached refresh of `request` into `partition`.
    ///
    /// Failures are logged and dropped.
    async fn spawn_refresh(&self, partition: &str, request: &Request) {
        let store = Arc::clone(&self.store);
        let network = Arc::clone(&self.network);
        let partition = partition.to_string();
        let request = request.clone();

        let handle = tokio::spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.is_ok() => match store.put(&partition, &request, &response).await {
                    Ok(()) => tracing::debug!(url = %request.url, partition = %partition, "background refresh stored"),
                    Err(e) => tracing::warn!(url = %request.url, error = %e, "background refresh write failed"),
                },
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "background refresh not cached")
                }
                Err(e) => tracing::debug!(url = %request.url, error = %e, "background refresh failed"),
            }
        });

        let mut tasks = self.background.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Wait for every background refresh started so far.
    pub async fn settle(&self) {
        let tasks = std::mem::take(&mut *self.background.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background refresh task aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_config_from_defaults() {
        let config = RouterConfig::from_app_config(&AppConfig::default()).unwrap();
        assert_eq!(config.version, "site-v1.0.0");
        assert_eq!(config.partitions.static_assets, "site-static-v1.0.0");
        assert!(config.partitions.contains("site-install-v1.0.0"));
        assert!(!config.partitions.contains("site-static-v0.9.0"));
        assert_eq!(config.retention, chrono::Duration::days(7));
    }

    #[test]
    fn test_install_requests_include_offline_page_once() {
        let app = AppConfig {
            precache: vec!["/".into(), "/offline.html".into(), "/faq".into()],
            ..Default::default()
        };
        let config = RouterConfig::from_app_config(&app).unwrap();
        let urls: Vec<String> = config
            .install_requests()
            .unwrap()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect();

        assert_eq!(
            urls,
            vec![
                "http://localhost:3000/",
                "http://localhost:3000/offline.html",
                "http://localhost:3000/faq"
            ]
        );
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let app = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(RouterConfig::from_app_config(&app), Err(Error::InvalidUrl(_))));
    }
}
