//! Gateway frame format
//!
//! Every frame in both directions is `{op, d, s?, t?}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HelloPayload, OpCode};
use crate::error::FrameError;

/// Gateway message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(default)]
    pub d: Value,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Same shape with a raw opcode, so unknown opcodes decode far enough to be reported
#[derive(Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

impl GatewayMessage {
    /// Build a client command frame from any serializable payload
    pub fn command<T: Serialize>(op: OpCode, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op,
            d: serde_json::to_value(payload)?,
            s: None,
            t: None,
        })
    }

    /// Heartbeat (op=1) carrying the last seen sequence, or null
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: last_sequence.map_or(Value::Null, |s| Value::Number(s.into())),
            s: None,
            t: None,
        }
    }

    // === Server Messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_type.into()),
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self {
            op: OpCode::Hello,
            d: serde_json::json!({ "heartbeat_interval": heartbeat_interval }),
            s: None,
            t: None,
        }
    }

    /// Create a Heartbeat ACK message (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::bare(OpCode::HeartbeatAck)
    }

    /// Create a Reconnect message (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::bare(OpCode::Reconnect)
    }

    /// Create an Invalid Session message (op=9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self {
            op: OpCode::InvalidSession,
            d: Value::Bool(resumable),
            s: None,
            t: None,
        }
    }

    fn bare(op: OpCode) -> Self {
        Self {
            op,
            d: Value::Null,
            s: None,
            t: None,
        }
    }

    // === Parsing Server Messages ===

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        HelloPayload::deserialize(&self.d).ok()
    }

    /// Resumable flag of an Invalid Session message (op=9); missing means false
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_bool().unwrap_or(false))
    }

    /// Decode a typed payload out of `d`
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.d)
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a text frame
    pub fn from_json(json: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(json)?;
        let op = OpCode::from_u8(raw.op).ok_or(FrameError::UnknownOpcode(raw.op))?;
        Ok(Self {
            op,
            d: raw.d,
            s: raw.s,
            t: raw.t,
        })
    }

    /// Decode a binary frame holding uncompressed JSON
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(bytes).map_err(|_| FrameError::NotUtf8)?;
        Self::from_json(text)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
