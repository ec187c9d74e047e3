use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Domain(#[from] DomainFailure),

    #[error("operation cancelled")]
    Cancelled,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// True when the error was caused by a caller-initiated cancel, as
    /// opposed to a transport or server failure. Consumers use this to
    /// render "stopped" instead of "broken".
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True when the stream dropped before reaching a terminal state.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Transport(TransportError::ConnectionLost))
    }
}

/// Connection-level failures: the request never produced a well-formed
/// success response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("connection lost before the stream completed")]
    ConnectionLost,
}

/// The transport succeeded but the payload violated the protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid response JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("rpc response carried neither result nor error")]
    MissingResult,
}

/// Server-reported failures delivered inside a structurally successful
/// response: a FAILED sync job, or a tool-level error embedded in an
/// otherwise valid tool result.
#[derive(Debug, Error)]
pub enum DomainFailure {
    #[error("sync job failed: {message}")]
    JobFailed { message: String },

    #[error("tool call failed: {message}")]
    ToolFailed { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
