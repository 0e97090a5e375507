//! Install and activation lifecycle, plus control messages from pages.
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated
//!               |
//!               +-> Redundant (install failed)
//! ```
//!
//! Fetches are intercepted only while `Activated`.

use std::sync::atomic::Ordering;

use futures_util::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::Error;
use tokio::sync::oneshot;

use super::OfflineRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the previous router version stays in charge.
    Redundant,
}

impl LifecycleState {
    pub fn can_intercept_fetch(self) -> bool {
        self == LifecycleState::Activated
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    /// URLs written to the static partition.
    pub cached: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivateReport {
    /// Partitions removed because they belong to an older version.
    pub deleted: Vec<String>,
    pub claimed: usize,
}

/// Message posted by a controlled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
}

impl ControlMessage {
    /// Parse a `{"type": ...}` message. Unknown types are rejected.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidInput(format!("unrecognized message: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VersionReply {
    pub version: String,
}

impl OfflineRouter {
    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    async fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write().await;
        let previous = *state;
        tracing::info!(from = %previous, to = %next, "lifecycle transition");
        *state = next;
    }

    /// Check and transition under one guard; returns the state left behind.
    async fn begin(&self, allowed: &[LifecycleState], next: LifecycleState) -> Result<LifecycleState, Error> {
        let mut state = self.state.write().await;
        let previous = *state;
        if !allowed.contains(&previous) {
            return Err(Error::InvalidState(format!("cannot move to {next} while {previous}")));
        }
        tracing::info!(from = %previous, to = %next, "lifecycle transition");
        *state = next;
        Ok(previous)
    }

    /// Fetch every install request and store them in the static partition.
    ///
    /// All or nothing: if any fetch fails or returns a non-2xx status the
    /// router becomes `Redundant` and nothing is written. A write failure
    /// removes the entries this attempt already stored.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.begin(
            &[LifecycleState::Parsed, LifecycleState::Installed, LifecycleState::Redundant],
            LifecycleState::Installing,
        )
        .await?;

        let requests = match self.config.install_requests() {
            Ok(requests) => requests,
            Err(e) => return self.fail_install(e).await,
        };

        let results = join_all(requests.iter().map(|request| self.network.fetch(request))).await;

        let mut fetched = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(response) if response.is_ok() => fetched.push((request, response)),
                Ok(response) => {
                    return self
                        .fail_install(Error::InstallFailed(format!("{} returned {}", request.url, response.status)))
                        .await;
                }
                Err(e) => return self.fail_install(Error::InstallFailed(format!("{}: {e}", request.url))).await,
            }
        }

        let partition = &self.config.partitions.static_assets;
        if let Err(e) = self.store.open_partition(partition).await {
            return self.fail_install(e).await;
        }
        let mut cached = Vec::with_capacity(fetched.len());
        for (i, (request, response)) in fetched.iter().enumerate() {
            if let Err(e) = self.store.put(partition, request, response).await {
                for (written, _) in &fetched[..i] {
                    if let Err(undo) = self.store.remove(partition, written).await {
                        tracing::warn!(url = %written.url, error = %undo, "could not roll back install entry");
                    }
                }
                return self.fail_install(e).await;
            }
            cached.push(request.url.to_string());
        }

        self.set_state(LifecycleState::Installed).await;
        self.skip_waiting();
        tracing::info!(count = cached.len(), partition = %partition, "install complete");
        Ok(InstallReport { cached })
    }

    async fn fail_install<T>(&self, error: Error) -> Result<T, Error> {
        tracing::error!(error = %error, "install failed");
        self.set_state(LifecycleState::Redundant).await;
        match error {
            Error::InstallFailed(_) => Err(error),
            other => Err(Error::InstallFailed(other.to_string())),
        }
    }

    /// Request activation without waiting for existing pages to close.
    pub fn skip_waiting(&self) {
        self.waiting_skipped.store(true, Ordering::SeqCst);
    }

    pub fn is_waiting_skipped(&self) -> bool {
        self.waiting_skipped.load(Ordering::SeqCst)
    }

    /// Delete partitions of older versions and take control of open pages.
    ///
    /// Running it again on an activated router is a no-op apart from claiming.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let previous = self
            .begin(&[LifecycleState::Installed, LifecycleState::Activated], LifecycleState::Activating)
            .await?;

        match self.prune_and_claim().await {
            Ok(report) => {
                self.set_state(LifecycleState::Activated).await;
                tracing::info!(deleted = report.deleted.len(), claimed = report.claimed, "activation complete");
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "activation failed");
                self.set_state(previous).await;
                Err(e)
            }
        }
    }

    async fn prune_and_claim(&self) -> Result<ActivateReport, Error> {
        let partitions = &self.config.partitions;
        let mut deleted = Vec::new();
        for name in self.store.partition_names().await? {
            if !partitions.contains(&name) {
                tracing::info!(partition = %name, "deleting old partition");
                if self.store.delete_partition(&name).await? {
                    deleted.push(name);
                }
            }
        }
        for name in partitions.all() {
            self.store.open_partition(name).await?;
        }

        let claimed = self.host.clients.claim().await?;
        Ok(ActivateReport { deleted, claimed })
    }

    /// Handle a page message. `GET_VERSION` answers on `reply` when one is given.
    pub async fn handle_message(
        &self, message: ControlMessage, reply: Option<oneshot::Sender<VersionReply>>,
    ) -> Result<(), Error> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting();
                if self.state().await == LifecycleState::Installed {
                    self.activate().await?;
                }
            }
            ControlMessage::GetVersion => {
                let version = VersionReply { version: self.config.version.clone() };
                match reply {
                    Some(port) => {
                        if port.send(version).is_err() {
                            tracing::debug!("version reply port closed");
                        }
                    }
                    None => tracing::debug!("GET_VERSION without reply port"),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::testing::{FlakyStore, Harness, url};
    use shellcache_core::{CacheDb, Request, Response};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_install_caches_every_manifest_entry() {
        let h = Harness::new().await;
        let report = h.router.install().await.unwrap();

        assert_eq!(report.cached.len(), 4);
        assert_eq!(h.router.state().await, LifecycleState::Installed);
        assert!(h.router.is_waiting_skipped());

        let static_partition = &h.partitions().static_assets;
        for path in ["/", "/about", "/images/logo.png", "/offline.html"] {
            let entry = h.db.get_entry(static_partition, &Request::get(url(path))).await.unwrap();
            assert!(entry.is_some(), "{path} not cached");
        }
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let h = Harness::new().await;
        h.network.serve("/about", Response::new(404, "missing"));

        let result = h.router.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(h.router.state().await, LifecycleState::Redundant);

        let entries = h.db.list_entries(&h.partitions().static_assets).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_install_fails_offline() {
        let h = Harness::new().await;
        h.network.set_online(false);

        assert!(matches!(h.router.install().await, Err(Error::InstallFailed(_))));
        assert_eq!(h.router.state().await, LifecycleState::Redundant);
        assert!(!h.router.state().await.can_intercept_fetch());
    }

    #[tokio::test]
    async fn test_install_retry_after_redundant() {
        let h = Harness::new().await;
        h.network.set_online(false);
        assert!(h.router.install().await.is_err());

        h.network.set_online(true);
        h.router.install().await.unwrap();
        assert_eq!(h.router.state().await, LifecycleState::Installed);
    }

    #[tokio::test]
    async fn test_install_write_failure_makes_redundant() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = Arc::new(FlakyStore::new(db.clone()));
        store.fail_writes();
        let h = Harness::with_store(db, store).await;

        assert!(matches!(h.router.install().await, Err(Error::InstallFailed(_))));
        assert_eq!(h.router.state().await, LifecycleState::Redundant);
    }

    #[tokio::test]
    async fn test_install_partial_write_failure_rolls_back() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = Arc::new(FlakyStore::new(db.clone()));
        store.fail_writes_after(2);
        let h = Harness::with_store(db, store).await;

        assert!(matches!(h.router.install().await, Err(Error::InstallFailed(_))));
        assert_eq!(h.router.state().await, LifecycleState::Redundant);
        assert!(h.db.list_entries(&h.partitions().static_assets).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_installs_run_once() {
        let h = Harness::new().await;
        h.network.hold();

        let (first, second) = tokio::join!(h.router.install(), async {
            tokio::task::yield_now().await;
            let result = h.router.install().await;
            h.network.release();
            result
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::InvalidState(_))));
        assert_eq!(h.network.calls_for("/about"), 1);
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let h = Harness::new().await;
        assert!(matches!(h.router.activate().await, Err(Error::InvalidState(_))));
        assert_eq!(h.router.state().await, LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_deletes_old_partitions() {
        let h = Harness::new().await;
        h.db.open_partition("site-static-v0.9.0").await.unwrap();
        h.db.open_partition("site-dynamic-v0.9.0").await.unwrap();
        h.clients.open("a", "https://example.com/");

        h.router.install().await.unwrap();
        let report = h.router.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["site-static-v0.9.0", "site-dynamic-v0.9.0"]);
        assert_eq!(report.claimed, 1);
        assert_eq!(h.router.state().await, LifecycleState::Activated);

        let mut names = h.db.partition_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["site-dynamic-v1.0.0", "site-install-v1.0.0", "site-static-v1.0.0"]);
    }

    #[tokio::test]
    async fn test_activate_twice_is_idempotent() {
        let h = Harness::active().await;
        let before = h.db.partition_names().await.unwrap();

        let report = h.router.activate().await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(h.db.partition_names().await.unwrap(), before);
        assert_eq!(*h.clients.claims.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_control_message_parse() {
        assert_eq!(ControlMessage::parse(r#"{"type":"SKIP_WAITING"}"#).unwrap(), ControlMessage::SkipWaiting);
        assert_eq!(ControlMessage::parse(r#"{"type":"GET_VERSION"}"#).unwrap(), ControlMessage::GetVersion);
        assert!(matches!(ControlMessage::parse(r#"{"type":"RELOAD"}"#), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_version_replies_on_port() {
        let h = Harness::new().await;
        let (tx, rx) = oneshot::channel();

        h.router.handle_message(ControlMessage::GetVersion, Some(tx)).await.unwrap();
        assert_eq!(rx.await.unwrap().version, "site-v1.0.0");
    }

    #[tokio::test]
    async fn test_get_version_without_port() {
        let h = Harness::new().await;
        assert!(h.router.handle_message(ControlMessage::GetVersion, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates_installed_router() {
        let h = Harness::new().await;
        h.router.install().await.unwrap();

        h.router.handle_message(ControlMessage::SkipWaiting, None).await.unwrap();
        assert_eq!(h.router.state().await, LifecycleState::Activated);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_before_install() {
        let h = Harness::new().await;
        h.router.handle_message(ControlMessage::SkipWaiting, None).await.unwrap();

        assert!(h.router.is_waiting_skipped());
        assert_eq!(h.router.state().await, LifecycleState::Parsed);
    }
}
