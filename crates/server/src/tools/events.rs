//! Background sync, periodic sync, push and notification click tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::resolve;
use shellcache_client::router::{
    CLEANUP_SYNC, CleanupReport, Notification, NotificationClick, OfflineRouter, SyncReport,
};
use shellcache_core::{Error, Request};

use super::json_result;
use crate::host::LocalHost;

/// Parameters for the queue_submission tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueSubmissionParams {
    /// Sync tag: "contact-form" or "newsletter-signup".
    pub tag: String,
    /// Form endpoint, route or absolute URL.
    pub url: String,
    /// Form body as sent by the page.
    pub body: String,
    /// Content-Type of the body (default: application/json).
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "application/json".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueSubmissionOutput {
    pub id: i64,
    pub tag: String,
}

pub async fn queue_submission_impl(
    router: &OfflineRouter, params: QueueSubmissionParams,
) -> Result<CallToolResult, McpError> {
    let url = resolve(&router.config().origin, &params.url).map_err(Error::from)?;
    let request = Request::post(url, params.body.into_bytes()).with_header("Content-Type", &params.content_type);

    let id = router.queue_submission(&params.tag, &request).await?;
    json_result(&QueueSubmissionOutput { id, tag: params.tag })
}

/// Parameters for the sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Tag to fire. When omitted, every registered tag is fired.
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncRun {
    pub tag: String,
    #[serde(flatten)]
    pub report: SyncReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncOutput {
    pub runs: Vec<SyncRun>,
}

pub async fn sync_impl(router: &OfflineRouter, host: &LocalHost, params: SyncParams) -> Result<CallToolResult, McpError> {
    let tags = match params.tag {
        Some(tag) => vec![tag],
        None => host.sync.drain()?,
    };

    let mut runs = Vec::with_capacity(tags.len());
    for tag in tags {
        let report = router.handle_sync(&tag).await?;
        runs.push(SyncRun { tag, report });
    }

    json_result(&SyncOutput { runs })
}

/// Parameters for the periodic_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PeriodicSyncParams {
    /// Periodic tag (default: "cache-cleanup").
    #[serde(default = "default_periodic_tag")]
    pub tag: String,
}

fn default_periodic_tag() -> String {
    CLEANUP_SYNC.into()
}

pub async fn periodic_sync_impl(router: &OfflineRouter, params: PeriodicSyncParams) -> Result<CallToolResult, McpError> {
    let report: CleanupReport = router.handle_periodic_sync(&params.tag).await;
    json_result(&report)
}

/// Parameters for the push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Push message data; JSON or plain text.
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushOutput {
    pub shown: Notification,
    /// Notifications currently open, after this one.
    pub open: usize,
}

pub async fn push_impl(router: &OfflineRouter, host: &LocalHost, params: PushParams) -> Result<CallToolResult, McpError> {
    let shown = router.handle_push(params.payload.as_deref().map(str::as_bytes)).await?;
    let open = host.notifier.open_notifications()?.len();
    json_result(&PushOutput { shown, open })
}

pub async fn notification_click_impl(
    router: &OfflineRouter, params: NotificationClick,
) -> Result<CallToolResult, McpError> {
    let outcome = router.handle_notification_click(&params).await?;
    json_result(&outcome)
}
