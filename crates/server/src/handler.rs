//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::host::LocalHost;
use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
use crate::tools::events::{
    PeriodicSyncParams, PushParams, QueueSubmissionParams, SyncParams, notification_click_impl, periodic_sync_impl,
    push_impl, queue_submission_impl, sync_impl,
};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::lifecycle::{MessageParams, activate_impl, install_impl, message_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::router::{Network, NotificationClick, OfflineRouter};
use shellcache_core::CacheDb;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellcacheServer {
    tool_router: ToolRouter<Self>,
    router: Arc<OfflineRouter>,
    network: Arc<dyn Network>,
    cache: CacheDb,
    host: LocalHost,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellcacheServer {
    /// Create a new server handler.
    ///
    /// `network` serves requests the router passes through; `cache` must be
    /// the database behind the router's store.
    pub fn new(router: Arc<OfflineRouter>, network: Arc<dyn Network>, cache: CacheDb, host: LocalHost) -> Self {
        Self { tool_router: Self::tool_router(), router, network, cache, host }
    }

    #[tool(
        description = "Fetch a site route or URL through the offline cache router. Returns the response with its source (network, cache, offline_page, synthetic) and strategy; requests the router does not intercept go straight to the network."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.router, self.network.as_ref(), params.0).await
    }

    #[tool(description = "Install the router: fetch and cache the pre-population manifest and offline page. All or nothing.")]
    async fn install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.router).await
    }

    #[tool(description = "Activate the router: delete partitions from older versions and claim open windows.")]
    async fn activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.router).await
    }

    #[tool(description = "Post a page message to the router: {\"type\":\"SKIP_WAITING\"} or {\"type\":\"GET_VERSION\"}.")]
    async fn message(&self, params: Parameters<MessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.router, params.0).await
    }

    #[tool(description = "Queue a form submission made while offline and register its background sync tag.")]
    async fn queue_submission(&self, params: Parameters<QueueSubmissionParams>) -> Result<CallToolResult, McpError> {
        queue_submission_impl(&self.router, params.0).await
    }

    #[tool(description = "Fire background sync: replay queued submissions for one tag, or for every registered tag.")]
    async fn sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.router, &self.host, params.0).await
    }

    #[tool(description = "Fire a periodic sync tag. \"cache-cleanup\" removes dynamic entries past the retention window.")]
    async fn periodic_sync(&self, params: Parameters<PeriodicSyncParams>) -> Result<CallToolResult, McpError> {
        periodic_sync_impl(&self.router, params.0).await
    }

    #[tool(description = "Deliver a push message. The payload may be JSON (title, body, image, data.url, actions, tag, requireInteraction) or plain text.")]
    async fn push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.router, &self.host, params.0).await
    }

    #[tool(description = "Click a notification: the \"close\" action dismisses it; otherwise focus or open a window at its URL.")]
    async fn notification_click(&self, params: Parameters<NotificationClick>) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.router, params.0).await
    }

    #[tool(description = "Read a cached response from a partition by method and URL.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, &self.router.config().origin, params.0).await
    }

    #[tool(description = "Purge entries of a partition older than N days and/or under a URL prefix.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, &self.router.config().origin, params.0).await
    }
}

impl ServerHandler for ShellcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
