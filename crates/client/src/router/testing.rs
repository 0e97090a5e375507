//! Scripted fakes of the router's capabilities.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shellcache_core::http::format_http_date;
use shellcache_core::{AppConfig, CacheDb, CacheStore, Error, PendingSubmission, Request, Response};
use tokio::sync::watch;
use url::Url;

use super::{
    ClientRegistry, DeferredTaskScheduler, HostCapabilities, Network, Notification, NotificationDisplay,
    OfflineRouter, RouterConfig, WindowClient,
};

pub(crate) const ORIGIN: &str = "https://example.com";

/// Network fake: scripted responses, an online switch and a gate that holds
/// every fetch until opened.
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    online: AtomicBool,
    calls: Mutex<Vec<String>>,
    gate: watch::Sender<bool>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            gate: watch::Sender::new(true),
        }
    }

    /// Serve `response` for `path`; unscripted paths answer 200 with the path as body.
    pub fn serve(&self, path: &str, response: Response) {
        self.routes.lock().unwrap().insert(url(path).to_string(), response);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Hold all fetches until `release` is called.
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls_for(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.ends_with(&format!(" {target}")))
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method, request.url));

        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.is_ok();
        if !opened {
            return Err(Error::Network("gate closed".into()));
        }

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }

        let scripted = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        Ok(scripted.unwrap_or_else(|| {
            Response::new(200, request.url.path().to_string()).with_header("Date", &format_http_date(Utc::now()))
        }))
    }
}

/// Store whose entry writes or submission bookkeeping can be switched to fail.
pub(crate) struct FlakyStore {
    db: CacheDb,
    writes_fail: AtomicBool,
    writes_left: Mutex<Option<usize>>,
    bookkeeping_fails: AtomicBool,
}

impl FlakyStore {
    pub fn new(db: CacheDb) -> Self {
        Self {
            db,
            writes_fail: AtomicBool::new(false),
            writes_left: Mutex::new(None),
            bookkeeping_fails: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self) {
        self.writes_fail.store(true, Ordering::SeqCst);
    }

    /// Let `count` entry writes through, then fail the rest.
    pub fn fail_writes_after(&self, count: usize) {
        *self.writes_left.lock().unwrap() = Some(count);
    }

    /// Fail dequeuing and failure recording of submissions.
    pub fn fail_bookkeeping(&self) {
        self.bookkeeping_fails.store(true, Ordering::SeqCst);
    }

    fn bookkeeping(&self) -> Result<(), Error> {
        if self.bookkeeping_fails.load(Ordering::SeqCst) {
            return Err(Error::Host("submission table locked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn open_partition(&self, name: &str) -> Result<(), Error> {
        self.db.open_partition(name).await
    }

    async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.db.partition_names().await
    }

    async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        self.db.delete_partition(name).await
    }

    async fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        if self.writes_fail.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry("storage is read-only".into()));
        }
        {
            let mut left = self.writes_left.lock().unwrap();
            match left.as_mut() {
                Some(0) => return Err(Error::CorruptEntry("storage is full".into())),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.db.put_entry(partition, request, response).await
    }

    async fn remove(&self, partition: &str, request: &Request) -> Result<bool, Error> {
        self.db.delete_entry(partition, request).await
    }

    async fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        CacheStore::lookup(&self.db, partition, request).await
    }

    async fn lookup_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        CacheStore::lookup_any(&self.db, request).await
    }

    async fn purge_older_than(&self, partition: &str, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        self.db.purge_entries_older_than(partition, cutoff).await
    }

    async fn enqueue_submission(&self, tag: &str, request: &Request) -> Result<i64, Error> {
        self.db.enqueue_submission(tag, request).await
    }

    async fn pending_submissions(&self, tag: &str) -> Result<Vec<PendingSubmission>, Error> {
        self.db.pending_submissions(tag).await
    }

    async fn complete_submission(&self, id: i64) -> Result<bool, Error> {
        self.bookkeeping()?;
        self.db.complete_submission(id).await
    }

    async fn record_submission_failure(&self, id: i64, error: &str) -> Result<(), Error> {
        self.bookkeeping()?;
        self.db.record_submission_failure(id, error).await
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub shown: Mutex<Vec<Notification>>,
    pub closed: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationDisplay for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<(), Error> {
        self.closed.lock().unwrap().push(tag.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeClients {
    pub windows: Mutex<Vec<WindowClient>>,
    pub claims: Mutex<usize>,
}

impl FakeClients {
    pub fn open(&self, id: &str, url: &str) {
        self.windows
            .lock()
            .unwrap()
            .push(WindowClient { id: id.into(), url: url.into(), focused: false });
    }
}

#[async_trait]
impl ClientRegistry for FakeClients {
    async fn claim(&self) -> Result<usize, Error> {
        *self.claims.lock().unwrap() += 1;
        Ok(self.windows.lock().unwrap().len())
    }

    async fn windows(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.windows.lock().unwrap().clone())
    }

    async fn focus(&self, id: &str) -> Result<WindowClient, Error> {
        let mut windows = self.windows.lock().unwrap();
        for window in windows.iter_mut() {
            window.focused = window.id == id;
        }
        windows
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or_else(|| Error::Host(format!("no window {id}")))
    }

    async fn open_window(&self, url: &str) -> Result<WindowClient, Error> {
        let mut windows = self.windows.lock().unwrap();
        let window = WindowClient { id: format!("window-{}", windows.len() + 1), url: url.into(), focused: true };
        windows.push(window.clone());
        Ok(window)
    }
}

#[derive(Default)]
pub(crate) struct RecordingScheduler {
    pub registered: Mutex<Vec<String>>,
}

#[async_trait]
impl DeferredTaskScheduler for RecordingScheduler {
    async fn register_sync(&self, tag: &str) -> Result<(), Error> {
        self.registered.lock().unwrap().push(tag.to_string());
        Ok(())
    }
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub(crate) fn test_config() -> RouterConfig {
    let app = AppConfig {
        origin: ORIGIN.into(),
        precache: vec!["/".into(), "/about".into(), "/images/logo.png".into()],
        ..Default::default()
    };
    RouterConfig::from_app_config(&app).unwrap()
}

/// A router wired to fakes and an in-memory database.
pub(crate) struct Harness {
    pub router: OfflineRouter,
    pub db: CacheDb,
    pub network: Arc<ScriptedNetwork>,
    pub notifier: Arc<RecordingNotifier>,
    pub clients: Arc<FakeClients>,
    pub scheduler: Arc<RecordingScheduler>,
}

impl Harness {
    pub async fn new() -> Self {
        let db = CacheDb::open_in_memory().await.unwrap();
        Self::with_store(db.clone(), Arc::new(db)).await
    }

    /// Harness over a custom store; `db` must be the database behind it.
    pub async fn with_store(db: CacheDb, store: Arc<dyn CacheStore>) -> Self {
        let network = Arc::new(ScriptedNetwork::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clients = Arc::new(FakeClients::default());
        let scheduler = Arc::new(RecordingScheduler::default());
        let host = HostCapabilities {
            notifications: notifier.clone(),
            clients: clients.clone(),
            scheduler: scheduler.clone(),
        };
        let router = OfflineRouter::new(test_config(), store, network.clone(), host);
        Self { router, db, network, notifier, clients, scheduler }
    }

    /// Installed and activated router.
    pub async fn active() -> Self {
        let harness = Self::new().await;
        harness.router.install().await.unwrap();
        harness.router.activate().await.unwrap();
        harness
    }

    pub fn partitions(&self) -> &super::PartitionNames {
        &self.router.config().partitions
    }
}
