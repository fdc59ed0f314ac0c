//! Voice state and voice server

use chat_cache::EntityCache;
use serde_json::Value;

use super::{decode, HandlerResult};
use crate::events::{ShardEvent, VoiceServerPayload, VoiceStatePayload};

pub struct VoiceHandler;

impl VoiceHandler {
    /// A state without a channel means the user left voice
    pub fn state_update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let mut payload: VoiceStatePayload = decode(data)?;
        let Some(guild_id) = payload.guild_id else {
            tracing::trace!(user_id = %payload.user_id, "Ignoring private call voice state");
            return Ok(Vec::new());
        };

        if let Some(member) = payload.member.take() {
            let (user, member) = member.into_parts(guild_id);
            cache.upsert_user(user);
            cache.upsert_member(member)?;
        }

        let upsert = cache.update_voice_state(payload.into_voice_state(guild_id))?;
        Ok(vec![ShardEvent::VoiceStateUpdated {
            state: upsert.current,
            previous: upsert.previous,
        }])
    }

    pub fn server_update(_cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: VoiceServerPayload = decode(data)?;
        Ok(vec![ShardEvent::VoiceServerUpdated {
            guild_id: payload.guild_id,
            token: payload.token,
            endpoint: payload.endpoint,
        }])
    }
}
