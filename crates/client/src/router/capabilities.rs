//! Host capabilities the router depends on.
//!
//! The hosting environment supplies the real implementations; tests use
//! scripted fakes.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Error, Request, Response};
use std::sync::Arc;

/// Network leg of every strategy.
#[async_trait]
pub trait Network: Send + Sync {
    /// Any HTTP status resolves; only transport failures are errors.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// A button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A notification ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub image: Option<String>,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    /// Page opened when the notification is clicked.
    pub url: String,
}

/// Displays and dismisses notifications.
#[async_trait]
pub trait NotificationDisplay: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), Error>;

    async fn close(&self, tag: &str) -> Result<(), Error>;
}

/// An open page controlled by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
    pub focused: bool,
}

/// Open pages of the site.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Take control of every open page; returns how many were claimed.
    async fn claim(&self) -> Result<usize, Error>;

    async fn windows(&self) -> Result<Vec<WindowClient>, Error>;

    async fn focus(&self, id: &str) -> Result<WindowClient, Error>;

    async fn open_window(&self, url: &str) -> Result<WindowClient, Error>;
}

/// Schedules deferred work such as background sync.
#[async_trait]
pub trait DeferredTaskScheduler: Send + Sync {
    /// Ask the host to fire `tag` once connectivity returns.
    async fn register_sync(&self, tag: &str) -> Result<(), Error>;
}

/// Host capabilities injected into the router.
#[derive(Clone)]
pub struct HostCapabilities {
    pub notifications: Arc<dyn NotificationDisplay>,
    pub clients: Arc<dyn ClientRegistry>,
    pub scheduler: Arc<dyn DeferredTaskScheduler>,
}
