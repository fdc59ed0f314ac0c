//! Channel entity - DM channels and the typed guild channels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Channel type as numbered on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    #[default]
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildNews,
    GuildStore,
    /// A type this client does not model yet
    Unknown(u8),
}

impl ChannelType {
    /// Whether channels of this type belong to a guild
    #[inline]
    pub fn is_guild(self) -> bool {
        !matches!(self, Self::Dm | Self::GroupDm)
    }
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildNews,
            6 => Self::GuildStore,
            other => Self::Unknown(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(ct: ChannelType) -> Self {
        match ct {
            ChannelType::GuildText => 0,
            ChannelType::Dm => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildNews => 5,
            ChannelType::GuildStore => 6,
            ChannelType::Unknown(other) => other,
        }
    }
}

/// Channel entity
///
/// Type-specific fields are optional and only populated for the channel
/// kinds that carry them (bitrate for voice, topic for text/news, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub kind: ChannelType,
    pub guild_id: Option<Snowflake>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub position: i32,
    pub parent_id: Option<Snowflake>,
    pub nsfw: bool,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
    pub recipient_ids: Vec<Snowflake>,
    pub last_message_id: Option<Snowflake>,
    pub last_pin_timestamp: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn new(id: Snowflake, kind: ChannelType) -> Self {
        Self {
            id,
            kind,
            guild_id: None,
            name: None,
            topic: None,
            position: 0,
            parent_id: None,
            nsfw: false,
            bitrate: None,
            user_limit: None,
            recipient_ids: Vec::new(),
            last_message_id: None,
            last_pin_timestamp: None,
        }
    }

    /// Create a guild text channel
    pub fn new_text(id: Snowflake, guild_id: Snowflake, name: String) -> Self {
        Self {
            guild_id: Some(guild_id),
            name: Some(name),
            ..Self::new(id, ChannelType::GuildText)
        }
    }

    /// Create a one-to-one DM channel
    pub fn new_dm(id: Snowflake, recipient_id: Snowflake) -> Self {
        Self {
            recipient_ids: vec![recipient_id],
            ..Self::new(id, ChannelType::Dm)
        }
    }

    #[inline]
    pub fn is_dm(&self) -> bool {
        matches!(self.kind, ChannelType::Dm | ChannelType::GroupDm)
    }

    #[inline]
    pub fn is_voice(&self) -> bool {
        self.kind == ChannelType::GuildVoice
    }

    /// Mention markup for this channel
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}
