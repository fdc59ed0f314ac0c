//! Dispatch event handlers
//!
//! Each dispatch event name maps to exactly one handler. A handler decodes the
//! payload, applies it to the cache and returns snapshots of what changed.

mod channel;
mod connection;
mod error;
mod guild;
mod member;
mod message;
mod presence;
mod role;
mod voice;

pub use channel::ChannelHandler;
pub use connection::ConnectionHandler;
pub use error::{HandlerError, HandlerResult};
pub use guild::GuildHandler;
pub use member::MemberHandler;
pub use message::MessageHandler;
pub use presence::PresenceHandler;
pub use role::RoleHandler;
pub use voice::VoiceHandler;

use chat_cache::EntityCache;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::events::{GatewayEventType, ShardEvent};

/// Signature shared by every dispatch handler
pub type Handler = fn(&EntityCache, Value) -> HandlerResult<Vec<ShardEvent>>;

fn decode<T: DeserializeOwned>(data: Value) -> HandlerResult<T> {
    Ok(serde_json::from_value(data)?)
}

/// Routes dispatch payloads to their handlers
pub struct EventDispatcher;

impl EventDispatcher {
    /// The handler for an event
    pub fn handler(event: GatewayEventType) -> Handler {
        use GatewayEventType as E;

        match event {
            E::Ready => ConnectionHandler::ready,
            E::Resumed => ConnectionHandler::resumed,
            E::GuildCreate => GuildHandler::create,
            E::GuildUpdate => GuildHandler::update,
            E::GuildDelete => GuildHandler::delete,
            E::GuildBanAdd => GuildHandler::ban_add,
            E::GuildBanRemove => GuildHandler::ban_remove,
            E::GuildEmojisUpdate => GuildHandler::emojis_update,
            E::GuildMemberAdd => MemberHandler::add,
            E::GuildMemberUpdate => MemberHandler::update,
            E::GuildMemberRemove => MemberHandler::remove,
            E::GuildMembersChunk => MemberHandler::chunk,
            E::GuildRoleCreate => RoleHandler::create,
            E::GuildRoleUpdate => RoleHandler::update,
            E::GuildRoleDelete => RoleHandler::delete,
            E::ChannelCreate => ChannelHandler::create,
            E::ChannelUpdate => ChannelHandler::update,
            E::ChannelDelete => ChannelHandler::delete,
            E::ChannelPinsUpdate => ChannelHandler::pins_update,
            E::MessageCreate => MessageHandler::create,
            E::MessageUpdate => MessageHandler::update,
            E::MessageDelete => MessageHandler::delete,
            E::MessageDeleteBulk => MessageHandler::delete_bulk,
            E::MessageReactionAdd => MessageHandler::reaction_add,
            E::MessageReactionRemove => MessageHandler::reaction_remove,
            E::MessageReactionRemoveAll => MessageHandler::reaction_remove_all,
            E::PresenceUpdate => PresenceHandler::presence_update,
            E::TypingStart => PresenceHandler::typing_start,
            E::UserUpdate => PresenceHandler::user_update,
            E::VoiceStateUpdate => VoiceHandler::state_update,
            E::VoiceServerUpdate => VoiceHandler::server_update,
        }
    }

    /// Apply one event to the cache
    pub fn dispatch(
        cache: &EntityCache,
        event: GatewayEventType,
        data: Value,
    ) -> HandlerResult<Vec<ShardEvent>> {
        Self::handler(event)(cache, data)
    }

    /// Apply an event by wire name, logging instead of failing
    ///
    /// Unknown names and handler errors only cost the one event.
    pub fn handle(cache: &EntityCache, event: &str, data: Value) -> Vec<ShardEvent> {
        let Some(kind) = GatewayEventType::from_str(event) else {
            tracing::warn!(event, "Unhandled dispatch event");
            return Vec::new();
        };

        match Self::dispatch(cache, kind, data) {
            Ok(events) => events,
            Err(err) if err.is_consistency_error() => {
                tracing::warn!(event, error = %err, "Cache out of sync, event skipped");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(event, error = %err, "Dispatch handler failed");
                Vec::new()
            }
        }
    }
}
