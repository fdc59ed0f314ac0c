//! # chat-core
//!
//! Entities and value objects mirrored from the remote chat platform.
//! Pure data: no I/O, no runtime, no wire framing.

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Activity, ActivityType, Channel, ChannelType, Emoji, Guild, GuildMember, Message, Presence,
    Reaction, ReactionEmoji, Role, Status, User, VoiceState,
};
pub use value_objects::{Intents, Permissions, Snowflake, SnowflakeParseError};
