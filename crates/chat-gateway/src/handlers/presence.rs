//! Presence, typing and user updates

use chat_cache::EntityCache;
use chat_core::User;
use serde_json::Value;

use super::{decode, HandlerError, HandlerResult};
use crate::events::{PresencePayload, ShardEvent, TypingStartPayload, UserPayload};

pub struct PresenceHandler;

impl PresenceHandler {
    /// PRESENCE_UPDATE
    ///
    /// The user object is partial: only the ID is guaranteed. Any other user
    /// fields present are merged into the shared user.
    pub fn presence_update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: PresencePayload = decode(data)?;
        let guild_id = payload.guild_id.ok_or(HandlerError::MissingField("guild_id"))?;
        let user_id = payload.user.id;

        let presence = cache.update_presence(guild_id, user_id, |p| payload.apply(p))?;

        cache.get_or_create_user(user_id, || User::unknown(user_id));
        if payload.user.has_changes() {
            cache.update_user(user_id, |u| payload.user.apply(u))?;
        }

        if cache.member(guild_id, user_id).is_some() {
            cache.update_member(guild_id, user_id, |m| {
                if let Some(roles) = &payload.roles {
                    m.role_ids.clone_from(roles);
                }
                if let Some(nick) = &payload.nick {
                    m.nickname.clone_from(nick);
                }
            })?;
        }

        tracing::trace!(
            guild_id = %guild_id,
            user_id = %user_id,
            status = presence.status.as_str(),
            "Presence updated"
        );

        Ok(vec![ShardEvent::PresenceUpdated(presence)])
    }

    pub fn typing_start(_cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: TypingStartPayload = decode(data)?;
        Ok(vec![ShardEvent::TypingStarted {
            channel_id: payload.channel_id,
            guild_id: payload.guild_id,
            user_id: payload.user_id,
            timestamp: payload.timestamp,
        }])
    }

    /// USER_UPDATE replaces the user; members see it through the shared table
    pub fn user_update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: UserPayload = decode(data)?;
        let upsert = cache.upsert_user(payload.into_user());
        Ok(vec![ShardEvent::UserUpdated {
            user: upsert.current,
            previous: upsert.previous,
        }])
    }
}
