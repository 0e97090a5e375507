//! Host capabilities for a router running inside the MCP server.
//!
//! There is no browser here: notifications are logged and recorded, window
//! clients live in memory and sync registrations wait until the `sync` tool
//! drains them.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shellcache_client::router::{
    ClientRegistry, DeferredTaskScheduler, HostCapabilities, Notification, NotificationDisplay, WindowClient,
};
use shellcache_core::Error;

/// The three host capabilities, kept concrete so tools can inspect them.
#[derive(Clone, Default)]
pub struct LocalHost {
    pub notifier: Arc<TracingNotifier>,
    pub clients: Arc<LocalClients>,
    pub sync: Arc<SyncRegistry>,
}

impl LocalHost {
    pub fn capabilities(&self) -> HostCapabilities {
        HostCapabilities {
            notifications: self.notifier.clone(),
            clients: self.clients.clone(),
            scheduler: self.sync.clone(),
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Host("host state lock poisoned".into())
}

/// Logs notifications and keeps the ones still open.
#[derive(Default)]
pub struct TracingNotifier {
    open: Mutex<Vec<Notification>>,
}

impl TracingNotifier {
    pub fn open_notifications(&self) -> Result<Vec<Notification>, Error> {
        Ok(self.open.lock().map_err(poisoned)?.clone())
    }
}

#[async_trait]
impl NotificationDisplay for TracingNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(
            tag = %notification.tag,
            title = %notification.title,
            body = %notification.body,
            url = %notification.url,
            "notification"
        );
        let mut open = self.open.lock().map_err(poisoned)?;
        open.retain(|n| n.tag != notification.tag);
        open.push(notification.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<(), Error> {
        self.open.lock().map_err(poisoned)?.retain(|n| n.tag != tag);
        Ok(())
    }
}

/// In-memory window clients.
#[derive(Default)]
pub struct LocalClients {
    windows: Mutex<Vec<WindowClient>>,
    next_id: Mutex<u64>,
}

#[async_trait]
impl ClientRegistry for LocalClients {
    async fn claim(&self) -> Result<usize, Error> {
        Ok(self.windows.lock().map_err(poisoned)?.len())
    }

    async fn windows(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.windows.lock().map_err(poisoned)?.clone())
    }

    async fn focus(&self, id: &str) -> Result<WindowClient, Error> {
        let mut windows = self.windows.lock().map_err(poisoned)?;
        let mut found = None;
        for window in windows.iter_mut() {
            window.focused = window.id == id;
            if window.focused {
                found = Some(window.clone());
            }
        }
        found.ok_or_else(|| Error::Host(format!("no window with id {id}")))
    }

    async fn open_window(&self, url: &str) -> Result<WindowClient, Error> {
        let id = {
            let mut next = self.next_id.lock().map_err(poisoned)?;
            *next += 1;
            format!("window-{}", *next)
        };
        let window = WindowClient { id, url: url.to_string(), focused: true };

        let mut windows = self.windows.lock().map_err(poisoned)?;
        for other in windows.iter_mut() {
            other.focused = false;
        }
        windows.push(window.clone());
        tracing::info!(id = %window.id, url, "window opened");
        Ok(window)
    }
}

/// Sync tags registered by the router and not yet fired.
#[derive(Default)]
pub struct SyncRegistry {
    pending: Mutex<BTreeSet<String>>,
}

impl SyncRegistry {
    /// Take every registered tag, leaving the registry empty.
    pub fn drain(&self) -> Result<Vec<String>, Error> {
        let mut pending = self.pending.lock().map_err(poisoned)?;
        Ok(std::mem::take(&mut *pending).into_iter().collect())
    }
}

#[async_trait]
impl DeferredTaskScheduler for SyncRegistry {
    async fn register_sync(&self, tag: &str) -> Result<(), Error> {
        tracing::debug!(tag, "sync registered");
        self.pending.lock().map_err(poisoned)?.insert(tag.to_string());
        Ok(())
    }
}
