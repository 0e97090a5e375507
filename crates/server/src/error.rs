//! Tool-level errors for the shellcache server.
//!
//! Router and storage failures arrive as `shellcache_core::Error`, which
//! converts to MCP errors on its own.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised while decoding tool parameters or encoding tool output.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Parameters that parse but make no sense (e.g. a purge with no filter).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be serialized.
    #[error("ENCODE_FAILED: {0}")]
    EncodeFailed(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::EncodeFailed(msg) => (-32000, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
