//! Client side of the Coral coordination server.
//!
//! Coral exposes its agent-to-agent messaging (`wait_for_mentions`,
//! `send_message`, ...) as MCP tools over the HTTP+SSE transport. This module
//! builds the identity-carrying endpoint URL, keeps one session open and
//! forwards tool calls.

mod endpoint;
pub mod protocol;
mod session;

use thiserror::Error;

pub use endpoint::{build_endpoint_url, endpoint_url, AgentIdentity};
pub use protocol::{CallToolResult, McpTool};
pub use session::{connect_with_retry, CoralSession};

#[derive(Debug, Error)]
pub enum CoralError {
    #[error("Invalid Coral URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Coral server returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Event stream error: {0}")]
    Stream(String),

    #[error("Connection to Coral server closed")]
    Closed,

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid message from Coral server: {0}")]
    Protocol(String),
}

impl CoralError {
    /// Whether reconnecting could plausibly fix the error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Stream(_) | Self::Closed | Self::Timeout(_) => true,
            Self::Status(status) => status.is_server_error() || status.as_u16() == 429,
            Self::InvalidUrl(_) | Self::Rpc { .. } | Self::Protocol(_) => false,
        }
    }
}

impl From<reqwest_eventsource::Error> for CoralError {
    fn from(err: reqwest_eventsource::Error) -> Self {
        match err {
            reqwest_eventsource::Error::StreamEnded => Self::Closed,
            reqwest_eventsource::Error::Transport(e) => Self::Http(e),
            reqwest_eventsource::Error::InvalidStatusCode(status, _) => Self::Status(status),
            other => Self::Stream(other.to_string()),
        }
    }
}

/// Whether `err` (anywhere in its chain) is a lost Coral connection.
pub fn is_connection_lost(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<CoralError>()
            .is_some_and(|e| matches!(e, CoralError::Closed | CoralError::Stream(_)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn transient_classification() {
        assert!(CoralError::Closed.is_transient());
        assert!(CoralError::Timeout("initialize".to_string()).is_transient());
        assert!(CoralError::Status(reqwest::StatusCode::BAD_GATEWAY).is_transient());
        assert!(!CoralError::Status(reqwest::StatusCode::NOT_FOUND).is_transient());
        assert!(!CoralError::Rpc {
            code: -32601,
            message: "nope".to_string()
        }
        .is_transient());
    }

    #[test]
    fn detects_lost_connection_through_context() {
        let err = Err::<(), _>(CoralError::Closed)
            .context("send_message failed")
            .unwrap_err();
        assert!(is_connection_lost(&err));
        assert!(!is_connection_lost(&anyhow::anyhow!("model refused")));
    }
}
