//! Remote entities as held by the client cache

mod channel;
mod emoji;
mod guild;
mod member;
mod message;
mod presence;
mod reaction;
mod role;
mod user;
mod voice_state;

pub use channel::{Channel, ChannelType};
pub use emoji::{Emoji, ReactionEmoji};
pub use guild::Guild;
pub use member::GuildMember;
pub use message::Message;
pub use presence::{Activity, ActivityType, Presence, Status};
pub use reaction::Reaction;
pub use role::Role;
pub use user::User;
pub use voice_state::VoiceState;
