//! Command and handshake payloads
//!
//! Client commands are serialized into the `d` field of a frame; `Hello` is
//! the only server payload decoded here.

use chat_common::ShardConfig;
use chat_core::{Activity, Intents, Snowflake, Status};
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    pub compress: bool,
    pub intents: Intents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u32>,
    /// `[shard_id, total_shards]`, omitted for unsharded sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}

impl IdentifyPayload {
    pub fn new(
        token: impl Into<String>,
        intents: Intents,
        large_threshold: Option<u32>,
        shard: ShardConfig,
    ) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::default(),
            compress: false,
            intents,
            large_threshold,
            shard: (shard.count > 1).then_some([shard.id, shard.count]),
        }
    }
}

impl std::fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("large_threshold", &self.large_threshold)
            .field("shard", &self.shard)
            .finish_non_exhaustive()
    }
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Payload for op 6 (Resume)
#[derive(Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last received sequence number
    pub seq: u64,
}

impl std::fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Payload for op 3 (Status Update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    /// Unix ms since the client went idle
    pub since: Option<u64>,
    pub game: Option<Activity>,
    pub status: Status,
    pub afk: bool,
}

impl StatusUpdatePayload {
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            since: None,
            game: None,
            status,
            afk: false,
        }
    }

    #[must_use]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.game = Some(activity);
        self
    }

    #[must_use]
    pub fn idle_since(mut self, since_ms: u64) -> Self {
        self.since = Some(since_ms);
        self.afk = true;
        self
    }
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,
    /// Username prefix; empty matches everyone
    pub query: String,
    /// 0 means no limit
    pub limit: u32,
}

/// Payload for op 4 (Voice State Update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdatePayload {
    pub guild_id: Snowflake,
    /// `None` leaves voice; serialized as `null`
    pub channel_id: Option<Snowflake>,
    pub self_mute: bool,
    pub self_deaf: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identify_omits_shard_when_unsharded() {
        let payload = IdentifyPayload::new("t0k", Intents::GUILDS, None, ShardConfig::SINGLE);
        let value = serde_json::to_value(&payload).unwrap();

        assert!(value.get("shard").is_none());
        assert!(value.get("large_threshold").is_none());
        assert_eq!(value["intents"], json!(1));
        assert_eq!(value["compress"], json!(false));
        assert!(value["properties"]["$os"].is_string());
        assert!(value["properties"]["$browser"].is_string());
        assert!(value["properties"]["$device"].is_string());
    }

    #[test]
    fn test_identify_includes_shard_when_sharded() {
        let shard = ShardConfig::new(1, 4).unwrap();
        let payload = IdentifyPayload::new("t0k", Intents::default(), Some(250), shard);
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["shard"], json!([1, 4]));
        assert_eq!(value["large_threshold"], json!(250));
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let identify = IdentifyPayload::new("secret", Intents::GUILDS, None, ShardConfig::SINGLE);
        assert!(!format!("{identify:?}").contains("secret"));

        let resume = ResumePayload {
            token: "secret".to_string(),
            session_id: "abc123".to_string(),
            seq: 7,
        };
        let debug = format!("{resume:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("abc123"));
    }

    #[test]
    fn test_resume_payload_serialization() {
        let payload = ResumePayload {
            token: "t".to_string(),
            session_id: "abc123".to_string(),
            seq: 42,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"token": "t", "session_id": "abc123", "seq": 42})
        );
    }

    #[test]
    fn test_status_update_serialization() {
        let payload = StatusUpdatePayload::new(Status::Dnd).with_activity(Activity::playing("chess"));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["status"], json!("dnd"));
        assert_eq!(value["game"]["name"], json!("chess"));
        assert_eq!(value["since"], json!(null));
        assert_eq!(value["afk"], json!(false));
    }

    #[test]
    fn test_voice_leave_sends_null_channel() {
        let payload = VoiceStateUpdatePayload {
            guild_id: Snowflake::new(10),
            channel_id: None,
            self_mute: false,
            self_deaf: true,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["guild_id"], json!("10"));
        assert_eq!(value["channel_id"], json!(null));
    }
}
