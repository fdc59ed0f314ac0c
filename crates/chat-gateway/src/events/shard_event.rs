//! Events published to consumers of a shard
//!
//! Entity snapshots are `Arc`s taken from the cache at publish time; later
//! cache updates swap in new snapshots and never mutate these.

use std::sync::Arc;

use chat_core::{
    Channel, Emoji, Guild, GuildMember, Message, Presence, ReactionEmoji, Role, Snowflake, User,
    VoiceState,
};
use chrono::{DateTime, Utc};

use super::payloads::MessageUpdatePayload;
use crate::error::ConnectionFailure;

#[derive(Debug, Clone)]
pub enum ShardEvent {
    // Connection
    /// A fresh session was established
    Ready {
        session_id: String,
        user: Arc<User>,
        guilds: usize,
    },
    Resumed,
    /// The session came back after an automatic reconnect
    Reconnected,
    /// The session stopped for good
    Failed(ConnectionFailure),

    // Guilds
    /// A guild not seen before in this session
    GuildCreated(Arc<Guild>),
    /// A guild known to be unavailable came back
    GuildAvailable(Arc<Guild>),
    GuildUpdated {
        guild: Arc<Guild>,
        previous: Option<Arc<Guild>>,
    },
    /// Outage; cached sub-entities are retained
    GuildUnavailable(Arc<Guild>),
    /// The user left or was removed; everything nested is gone
    GuildRemoved {
        guild: Arc<Guild>,
        channels: Vec<Arc<Channel>>,
    },
    BanAdded {
        guild_id: Snowflake,
        user: Arc<User>,
    },
    BanRemoved {
        guild_id: Snowflake,
        user: Arc<User>,
    },
    EmojisUpdated {
        guild_id: Snowflake,
        emojis: Vec<Arc<Emoji>>,
    },

    // Members
    MemberAdded(Arc<GuildMember>),
    MemberUpdated {
        member: Arc<GuildMember>,
        previous: Option<Arc<GuildMember>>,
    },
    MemberRemoved {
        guild_id: Snowflake,
        user: Arc<User>,
        member: Option<Arc<GuildMember>>,
    },
    MembersChunk {
        guild_id: Snowflake,
        members: Vec<Arc<GuildMember>>,
        not_found: Vec<Snowflake>,
    },

    // Roles
    RoleCreated(Arc<Role>),
    RoleUpdated {
        role: Arc<Role>,
        previous: Option<Arc<Role>>,
    },
    RoleDeleted {
        guild_id: Snowflake,
        role_id: Snowflake,
        role: Option<Arc<Role>>,
    },

    // Channels
    ChannelCreated(Arc<Channel>),
    ChannelUpdated {
        channel: Arc<Channel>,
        previous: Option<Arc<Channel>>,
    },
    ChannelDeleted(Arc<Channel>),
    ChannelPinsUpdated {
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
        last_pin_timestamp: Option<DateTime<Utc>>,
    },

    // Messages
    MessageCreated(Arc<Message>),
    /// `message` is `None` when the message was not cached; `update` holds
    /// the raw partial fields either way
    MessageUpdated {
        channel_id: Snowflake,
        message_id: Snowflake,
        message: Option<Arc<Message>>,
        update: Arc<MessageUpdatePayload>,
    },
    MessageDeleted {
        channel_id: Snowflake,
        message_id: Snowflake,
        message: Option<Arc<Message>>,
    },
    ReactionAdded {
        channel_id: Snowflake,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: ReactionEmoji,
        message: Option<Arc<Message>>,
    },
    ReactionRemoved {
        channel_id: Snowflake,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: ReactionEmoji,
        message: Option<Arc<Message>>,
    },
    ReactionsCleared {
        channel_id: Snowflake,
        message_id: Snowflake,
        message: Option<Arc<Message>>,
    },

    // Presence and users
    PresenceUpdated(Arc<Presence>),
    TypingStarted {
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
        user_id: Snowflake,
        timestamp: u64,
    },
    UserUpdated {
        user: Arc<User>,
        previous: Option<Arc<User>>,
    },

    // Voice
    VoiceStateUpdated {
        state: Arc<VoiceState>,
        previous: Option<Arc<VoiceState>>,
    },
    VoiceServerUpdated {
        guild_id: Snowflake,
        token: String,
        endpoint: Option<String>,
    },
}

impl ShardEvent {
    /// Short name, for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Resumed => "resumed",
            Self::Reconnected => "reconnected",
            Self::Failed(_) => "failed",
            Self::GuildCreated(_) => "guild_created",
            Self::GuildAvailable(_) => "guild_available",
            Self::GuildUpdated { .. } => "guild_updated",
            Self::GuildUnavailable(_) => "guild_unavailable",
            Self::GuildRemoved { .. } => "guild_removed",
            Self::BanAdded { .. } => "ban_added",
            Self::BanRemoved { .. } => "ban_removed",
            Self::EmojisUpdated { .. } => "emojis_updated",
            Self::MemberAdded(_) => "member_added",
            Self::MemberUpdated { .. } => "member_updated",
            Self::MemberRemoved { .. } => "member_removed",
            Self::MembersChunk { .. } => "members_chunk",
            Self::RoleCreated(_) => "role_created",
            Self::RoleUpdated { .. } => "role_updated",
            Self::RoleDeleted { .. } => "role_deleted",
            Self::ChannelCreated(_) => "channel_created",
            Self::ChannelUpdated { .. } => "channel_updated",
            Self::ChannelDeleted(_) => "channel_deleted",
            Self::ChannelPinsUpdated { .. } => "channel_pins_updated",
            Self::MessageCreated(_) => "message_created",
            Self::MessageUpdated { .. } => "message_updated",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::ReactionAdded { .. } => "reaction_added",
            Self::ReactionRemoved { .. } => "reaction_removed",
            Self::ReactionsCleared { .. } => "reactions_cleared",
            Self::PresenceUpdated(_) => "presence_updated",
            Self::TypingStarted { .. } => "typing_started",
            Self::UserUpdated { .. } => "user_updated",
            Self::VoiceStateUpdated { .. } => "voice_state_updated",
            Self::VoiceServerUpdated { .. } => "voice_server_updated",
        }
    }

    /// Guild the event belongs to, if any
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::GuildCreated(guild) | Self::GuildAvailable(guild) | Self::GuildUnavailable(guild) => {
                Some(guild.id)
            }
            Self::GuildUpdated { guild, .. } | Self::GuildRemoved { guild, .. } => Some(guild.id),
            Self::BanAdded { guild_id, .. }
            | Self::BanRemoved { guild_id, .. }
            | Self::EmojisUpdated { guild_id, .. }
            | Self::MemberRemoved { guild_id, .. }
            | Self::MembersChunk { guild_id, .. }
            | Self::RoleDeleted { guild_id, .. }
            | Self::VoiceServerUpdated { guild_id, .. } => Some(*guild_id),
            Self::MemberAdded(member) | Self::MemberUpdated { member, .. } => Some(member.guild_id),
            Self::RoleCreated(role) | Self::RoleUpdated { role, .. } => Some(role.guild_id),
            Self::ChannelCreated(channel)
            | Self::ChannelDeleted(channel)
            | Self::ChannelUpdated { channel, .. } => channel.guild_id,
            Self::ChannelPinsUpdated { guild_id, .. } | Self::TypingStarted { guild_id, .. } => {
                *guild_id
            }
            Self::MessageCreated(message) => message.guild_id,
            Self::PresenceUpdated(presence) => Some(presence.guild_id),
            Self::VoiceStateUpdated { state, .. } => Some(state.guild_id),
            _ => None,
        }
    }
}
