//! Gateway error types

use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Why a session gave up for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Token rejected by the gateway or by REST
    AuthenticationFailed,
    /// Shard id/count pair rejected
    InvalidShard,
    /// Too many guilds for the configured shard count
    ShardingRequired,
    /// Gateway version no longer supported
    InvalidApiVersion,
    /// Malformed intents bitmask
    InvalidIntents,
    /// Privileged intents not enabled for this application
    DisallowedIntents,
}

impl FailureReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication failed",
            Self::InvalidShard => "invalid shard",
            Self::ShardingRequired => "sharding required",
            Self::InvalidApiVersion => "invalid api version",
            Self::InvalidIntents => "invalid intents",
            Self::DisallowedIntents => "disallowed intents",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single record produced when a session stops reconnecting
#[derive(Debug, Clone)]
pub struct ConnectionFailure {
    pub message: String,
    pub reason: FailureReason,
    pub source: Option<Arc<GatewayError>>,
}

impl ConnectionFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: GatewayError) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl std::fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Inbound frame could not be turned into a message
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("frame is not valid utf-8")]
    NotUtf8,
}

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connect, send or receive failed at the WebSocket level
    #[error("transport error: {0}")]
    Transport(Box<tungstenite::Error>),

    /// Send attempted while no connection is open
    #[error("socket is not open")]
    SocketNotOpen,

    #[error("decode error: {0}")]
    Decode(#[from] FrameError),

    /// Gateway URL lookup failed
    #[error("http error: {0}")]
    Http(#[from] chat_http::HttpError),

    #[error("operation cancelled")]
    Cancelled,

    /// The consumer disconnected the session
    #[error("session disconnected")]
    Disconnected,

    #[error("connection failed: {0}")]
    Fatal(ConnectionFailure),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<tungstenite::Error> for GatewayError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl GatewayError {
    /// Whether a retry on a fresh connection could succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::SocketNotOpen)
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = ConnectionFailure::new(FailureReason::AuthenticationFailed, "closed with 4004");
        assert_eq!(failure.to_string(), "authentication failed: closed with 4004");
        assert!(failure.source.is_none());

        let failure = failure.with_source(GatewayError::SocketNotOpen);
        assert!(matches!(failure.source.as_deref(), Some(GatewayError::SocketNotOpen)));
    }

    #[test]
    fn test_transient() {
        assert!(GatewayError::SocketNotOpen.is_transient());
        assert!(GatewayError::from(tungstenite::Error::ConnectionClosed).is_transient());
        assert!(!GatewayError::Cancelled.is_transient());
        assert!(!GatewayError::Disconnected.is_transient());
    }
}
