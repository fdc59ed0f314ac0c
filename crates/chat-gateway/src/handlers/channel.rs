//! Channels

use chat_cache::{CacheError, EntityCache, Upsert};
use chat_core::Channel;
use serde_json::Value;

use super::{decode, HandlerResult};
use crate::events::{ChannelPayload, ChannelPinsPayload, ShardEvent};

pub struct ChannelHandler;

impl ChannelHandler {
    pub fn create(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let upsert = Self::upsert(cache, data)?;
        Ok(vec![ShardEvent::ChannelCreated(upsert.current)])
    }

    pub fn update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let upsert = Self::upsert(cache, data)?;
        Ok(vec![ShardEvent::ChannelUpdated {
            channel: upsert.current,
            previous: upsert.previous,
        }])
    }

    fn upsert(cache: &EntityCache, data: Value) -> HandlerResult<Upsert<Channel>> {
        let payload: ChannelPayload = decode(data)?;
        let (mut channel, recipients) = payload.into_parts(None);
        for recipient in recipients {
            cache.upsert_user(recipient);
        }
        if let Some(previous) = cache.channel(channel.id) {
            // not carried by channel objects after creation
            channel.last_message_id = channel.last_message_id.or(previous.last_message_id);
        }
        Ok(cache.upsert_channel(channel)?)
    }

    /// Removes the channel, its guild index entry and its cached messages
    pub fn delete(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: ChannelPayload = decode(data)?;
        let channel = cache
            .remove_channel(payload.id)
            .ok_or(CacheError::MissingChannel(payload.id))?;
        Ok(vec![ShardEvent::ChannelDeleted(channel)])
    }

    pub fn pins_update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: ChannelPinsPayload = decode(data)?;
        cache.update_channel(payload.channel_id, |c| {
            c.last_pin_timestamp = payload.last_pin_timestamp;
        })?;
        Ok(vec![ShardEvent::ChannelPinsUpdated {
            channel_id: payload.channel_id,
            guild_id: payload.guild_id,
            last_pin_timestamp: payload.last_pin_timestamp,
        }])
    }
}
