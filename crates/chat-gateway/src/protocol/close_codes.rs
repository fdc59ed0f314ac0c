//! WebSocket close codes
//!
//! Maps the gateway's close codes onto what the client does next.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FailureReason;

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Invalid opcode sent
    UnknownOpcode = 4001,
    /// Invalid payload encoding
    DecodeError = 4002,
    /// Sent payload before Identify
    NotAuthenticated = 4003,
    /// Invalid token provided
    AuthenticationFailed = 4004,
    /// Sent Identify twice
    AlreadyAuthenticated = 4005,
    /// Session is no longer valid
    InvalidSession = 4006,
    /// Invalid sequence number for Resume
    InvalidSequence = 4007,
    /// Payloads sent too quickly
    RateLimited = 4008,
    /// Session has timed out
    SessionTimeout = 4009,
    /// Invalid shard configuration
    InvalidShard = 4010,
    /// Too many guilds for a single connection
    ShardingRequired = 4011,
    /// Invalid/outdated API version
    InvalidApiVersion = 4012,
    /// Malformed intents bitmask
    InvalidIntents = 4013,
    /// Intents the application is not allowed to use
    DisallowedIntents = 4014,
}

/// What to do after the connection is lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Reconnect and send Resume with the cached session
    Resume,
    /// Reconnect and Resume, but wait first
    ResumeAfter(Duration),
    /// Reconnect and Identify as a new session
    Fresh,
    /// Stop for good
    Fatal(FailureReason),
}

impl ReconnectAction {
    /// Whether the next handshake should try to Resume
    #[must_use]
    pub const fn resumes(self) -> bool {
        matches!(self, Self::Resume | Self::ResumeAfter(_))
    }
}

impl CloseCode {
    /// Back-off applied after a rate-limited close
    pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);

    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4006 => Some(Self::InvalidSession),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Reconnect decision for this close code
    #[must_use]
    pub const fn action(self) -> ReconnectAction {
        match self {
            Self::UnknownOpcode | Self::DecodeError | Self::AlreadyAuthenticated => {
                ReconnectAction::Resume
            }
            Self::RateLimited => ReconnectAction::ResumeAfter(Self::RATE_LIMIT_DELAY),
            Self::UnknownError
            | Self::NotAuthenticated
            | Self::InvalidSession
            | Self::InvalidSequence
            | Self::SessionTimeout => ReconnectAction::Fresh,
            Self::AuthenticationFailed => ReconnectAction::Fatal(FailureReason::AuthenticationFailed),
            Self::InvalidShard => ReconnectAction::Fatal(FailureReason::InvalidShard),
            Self::ShardingRequired => ReconnectAction::Fatal(FailureReason::ShardingRequired),
            Self::InvalidApiVersion => ReconnectAction::Fatal(FailureReason::InvalidApiVersion),
            Self::InvalidIntents => ReconnectAction::Fatal(FailureReason::InvalidIntents),
            Self::DisallowedIntents => ReconnectAction::Fatal(FailureReason::DisallowedIntents),
        }
    }

    /// Reconnect decision for a raw close code; unknown codes resume
    #[must_use]
    pub fn action_for(code: u16) -> ReconnectAction {
        Self::from_u16(code).map_or(ReconnectAction::Resume, Self::action)
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::UnknownOpcode => "Invalid opcode sent",
            Self::DecodeError => "Invalid payload encoding",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSession => "Invalid session",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimeout => "Session timeout",
            Self::InvalidShard => "Invalid shard configuration",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }

    /// Get the name of this close code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UnknownError",
            Self::UnknownOpcode => "UnknownOpcode",
            Self::DecodeError => "DecodeError",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::AlreadyAuthenticated => "AlreadyAuthenticated",
            Self::InvalidSession => "InvalidSession",
            Self::InvalidSequence => "InvalidSequence",
            Self::RateLimited => "RateLimited",
            Self::SessionTimeout => "SessionTimeout",
            Self::InvalidShard => "InvalidShard",
            Self::ShardingRequired => "ShardingRequired",
            Self::InvalidApiVersion => "InvalidApiVersion",
            Self::InvalidIntents => "InvalidIntents",
            Self::DisallowedIntents => "DisallowedIntents",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
