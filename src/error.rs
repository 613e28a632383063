//! Error taxonomy for the orchestrator core
//!
//! Each component owns one error enum. Errors that must stay local to a
//! tool invocation (`ToolError`) or be swallowed entirely
//! (`ClassificationError`, feedback submission failures) never reach the
//! page-level path; only `ReadinessError` affects whole-page availability.

use thiserror::Error;

/// Failure talking to the remote query gateway (network or non-2xx)
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// HTTP status code, when the gateway answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            GatewayError::Http(e) => e.status().map(|s| s.as_u16()),
            GatewayError::Decode(_) => None,
        }
    }
}

/// Chart-type inference failure. Never fails the parent tool call.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classifier response could not be decoded: {0}")]
    Decode(String),

    #[error("classifier returned no choices")]
    Empty,
}

/// Failure of a single tool invocation
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("failed to encode tool result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure while waiting for a repository import to conclude
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("failed to fetch repository status: {0}")]
    Fetch(#[source] GatewayError),

    #[error("repository import did not conclude after {attempts} wait window(s)")]
    TimedOut { attempts: u32 },

    #[error("readiness wait was cancelled")]
    Cancelled,
}

/// Failure reading or writing the persisted repository registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry record is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Misuse of the conversation history ordering rules
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("tool call {call_id} of the previous turn has no result yet")]
    PendingToolCall { call_id: String },

    #[error("no turn has been started")]
    NoActiveTurn,

    #[error("unknown tool call: {0}")]
    UnknownToolCall(String),

    #[error("tool call {0} already has a result")]
    AlreadyResolved(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_status_code() {
        let err = GatewayError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "gateway returned 502: bad gateway");

        let err = GatewayError::Decode("missing field".into());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_tool_error_is_transparent_over_gateway() {
        let err: ToolError = GatewayError::Status {
            status: 500,
            body: "boom".into(),
        }
        .into();
        assert_eq!(err.to_string(), "gateway returned 500: boom");
    }
}
