//! READY and RESUMED

use chat_cache::EntityCache;
use chat_core::Guild;
use serde_json::Value;

use super::{decode, HandlerResult};
use crate::events::{ReadyEvent, ShardEvent};

pub struct ConnectionHandler;

impl ConnectionHandler {
    /// A fresh session: everything cached for the previous one is stale
    pub fn ready(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: ReadyEvent = decode(data)?;

        cache.clear();
        let user = cache.set_current_user(payload.user.into_user());

        for stub in &payload.guilds {
            cache.insert_guild(Guild::unavailable(stub.id));
        }

        for channel in payload.private_channels {
            let (channel, recipients) = channel.into_parts(None);
            for recipient in recipients {
                cache.upsert_user(recipient);
            }
            cache.upsert_channel(channel)?;
        }

        tracing::info!(
            session_id = %payload.session_id,
            user_id = %user.id,
            guilds = payload.guilds.len(),
            "Session ready"
        );

        Ok(vec![ShardEvent::Ready {
            session_id: payload.session_id,
            user,
            guilds: payload.guilds.len(),
        }])
    }

    pub fn resumed(_cache: &EntityCache, _data: Value) -> HandlerResult<Vec<ShardEvent>> {
        tracing::info!("Session resumed");
        Ok(vec![ShardEvent::Resumed])
    }
}
