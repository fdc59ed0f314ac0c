//! Gateway events
//!
//! Dispatch event names, their payloads, and the events published to
//! consumers once a payload has been applied to the cache.

mod event_types;
mod payloads;
mod shard_event;

pub use event_types::GatewayEventType;
pub use payloads::{
    ChannelPayload, ChannelPinsPayload, EmojiPayload, GuildBanPayload, GuildEmojisPayload,
    GuildParts, GuildPayload, GuildRoleDeletePayload, GuildRolePayload, MemberPayload,
    MemberRemovePayload, MemberUpdatePayload, MembersChunkPayload, MessageDeleteBulkPayload,
    MessageDeletePayload, MessageParts, MessagePayload, MessageReactionPayload,
    MessageReactionRemoveAllPayload, MessageUpdatePayload, PartialMemberPayload,
    PartialUserPayload, PresencePayload, ReactionEmojiPayload, ReactionPayload, ReadyEvent,
    RolePayload, TypingStartPayload, UnavailableGuild, UserPayload, VoiceServerPayload,
    VoiceStatePayload,
};
pub use shard_event::ShardEvent;
