//! Router fixtures for tool and handler tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use shellcache_client::router::{Network, OfflineRouter, RouterConfig};
use shellcache_core::http::format_http_date;
use shellcache_core::{AppConfig, CacheDb, Error, Request, Response};

use crate::host::LocalHost;

/// Answers every request with 200 and the request path as body.
#[derive(Default)]
pub struct EchoNetwork {
    offline: AtomicBool,
}

impl EchoNetwork {
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for EchoNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        Ok(Response::new(200, request.url.path().to_string()).with_header("Date", &format_http_date(Utc::now())))
    }
}

pub struct Fixture {
    pub router: Arc<OfflineRouter>,
    pub db: CacheDb,
    pub host: LocalHost,
    pub network: Arc<EchoNetwork>,
}

pub async fn fixture() -> Fixture {
    let app = AppConfig {
        origin: "https://example.com".into(),
        precache: vec!["/".into(), "/images/logo.png".into()],
        ..Default::default()
    };
    let db = CacheDb::open_in_memory().await.unwrap();
    let host = LocalHost::default();
    let network = Arc::new(EchoNetwork::default());
    let config = RouterConfig::from_app_config(&app).unwrap();
    let router = Arc::new(OfflineRouter::new(config, Arc::new(db.clone()), network.clone(), host.capabilities()));
    Fixture { router, db, host, network }
}

pub async fn active_fixture() -> Fixture {
    let fixture = fixture().await;
    fixture.router.install().await.unwrap();
    fixture.router.activate().await.unwrap();
    fixture
}

/// Deserialize the JSON text of a tool result.
pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
