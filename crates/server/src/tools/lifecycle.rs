//! install, activate and message tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::router::{ControlMessage, LifecycleState, OfflineRouter};
use tokio::sync::oneshot;

use super::json_result;

pub async fn install_impl(router: &OfflineRouter) -> Result<CallToolResult, McpError> {
    let report = router.install().await?;
    json_result(&report)
}

pub async fn activate_impl(router: &OfflineRouter) -> Result<CallToolResult, McpError> {
    let report = router.activate().await?;
    json_result(&report)
}

/// Parameters for the message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageParams {
    /// Raw page message, e.g. `{"type":"GET_VERSION"}`.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageOutput {
    pub state: LifecycleState,
    /// Set for `GET_VERSION`.
    pub version: Option<String>,
}

pub async fn message_impl(router: &OfflineRouter, params: MessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::parse(&params.message)?;

    let version = match message {
        ControlMessage::GetVersion => {
            let (tx, rx) = oneshot::channel();
            router.handle_message(message, Some(tx)).await?;
            rx.await.ok().map(|reply| reply.version)
        }
        ControlMessage::SkipWaiting => {
            router.handle_message(message, None).await?;
            None
        }
    };

    json_result(&MessageOutput { state: router.state().await, version })
}
