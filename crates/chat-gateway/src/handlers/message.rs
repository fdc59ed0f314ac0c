//! Messages and reactions
//!
//! Messages live in a bounded per-channel ring, so updates, deletes and
//! reactions may refer to messages that were never cached or already evicted.
//! Those still produce an event, with `message: None`.

use std::sync::Arc;

use chat_cache::{CacheError, EntityCache};
use chat_core::Message;
use serde_json::Value;

use super::{decode, HandlerResult};
use crate::events::{
    MessageDeleteBulkPayload, MessageDeletePayload, MessageParts, MessagePayload,
    MessageReactionPayload, MessageReactionRemoveAllPayload, MessageUpdatePayload, ShardEvent,
};

pub struct MessageHandler;

impl MessageHandler {
    pub fn create(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MessagePayload = decode(data)?;
        if let Some(guild_id) = payload.guild_id {
            if cache.guild(guild_id).is_none() {
                return Err(CacheError::MissingGuild(guild_id).into());
            }
        }

        let MessageParts {
            message,
            author,
            mentions,
            member,
        } = payload.into_parts();

        cache.upsert_user(author);
        for user in mentions {
            cache.upsert_user(user);
        }
        if let Some(member) = member {
            let (guild_id, user_id) = (member.guild_id, member.user_id);
            match cache.member(guild_id, user_id) {
                // the attached member object lacks fields a full member carries
                Some(_) => {
                    cache.update_member(guild_id, user_id, |m| {
                        m.nickname = member.nickname;
                        m.role_ids = member.role_ids;
                    })?;
                }
                None => {
                    cache.upsert_member(member)?;
                }
            }
        }

        let message = cache.push_message(message);
        Ok(vec![ShardEvent::MessageCreated(message)])
    }

    /// Partial update, merged into the cached copy when there is one
    ///
    /// An uncached message is not fetched; consumers get the raw partial
    /// fields and decide for themselves.
    pub fn update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload = MessageUpdatePayload::from_value(data)?;
        let message = cache.update_message(payload.channel_id, payload.id, |m| payload.apply(m));
        if message.is_none() {
            tracing::trace!(
                channel_id = %payload.channel_id,
                message_id = %payload.id,
                "Update for uncached message"
            );
        }

        Ok(vec![ShardEvent::MessageUpdated {
            channel_id: payload.channel_id,
            message_id: payload.id,
            message,
            update: Arc::new(payload),
        }])
    }

    pub fn delete(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MessageDeletePayload = decode(data)?;
        let message = cache.remove_message(payload.channel_id, payload.id);
        Ok(vec![ShardEvent::MessageDeleted {
            channel_id: payload.channel_id,
            message_id: payload.id,
            message,
        }])
    }

    /// One [`ShardEvent::MessageDeleted`] per ID, in payload order
    pub fn delete_bulk(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MessageDeleteBulkPayload = decode(data)?;
        let channel_id = payload.channel_id;
        Ok(payload
            .ids
            .into_iter()
            .map(|message_id| ShardEvent::MessageDeleted {
                channel_id,
                message_id,
                message: cache.remove_message(channel_id, message_id),
            })
            .collect())
    }

    pub fn reaction_add(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MessageReactionPayload = decode(data)?;
        let me = is_current_user(cache, &payload);
        let emoji = payload.emoji.into_emoji();
        let message = cache.update_message(payload.channel_id, payload.message_id, |m| {
            m.add_reaction(&emoji, me);
        });
        Ok(vec![ShardEvent::ReactionAdded {
            channel_id: payload.channel_id,
            message_id: payload.message_id,
            user_id: payload.user_id,
            emoji,
            message,
        }])
    }

    pub fn reaction_remove(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MessageReactionPayload = decode(data)?;
        let me = is_current_user(cache, &payload);
        let emoji = payload.emoji.into_emoji();
        let message = cache.update_message(payload.channel_id, payload.message_id, |m| {
            m.remove_reaction(&emoji, me);
        });
        Ok(vec![ShardEvent::ReactionRemoved {
            channel_id: payload.channel_id,
            message_id: payload.message_id,
            user_id: payload.user_id,
            emoji,
            message,
        }])
    }

    pub fn reaction_remove_all(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MessageReactionRemoveAllPayload = decode(data)?;
        let message = cache.update_message(
            payload.channel_id,
            payload.message_id,
            Message::clear_reactions,
        );
        Ok(vec![ShardEvent::ReactionsCleared {
            channel_id: payload.channel_id,
            message_id: payload.message_id,
            message,
        }])
    }
}

fn is_current_user(cache: &EntityCache, payload: &MessageReactionPayload) -> bool {
    cache
        .current_user()
        .is_some_and(|user| user.id == payload.user_id)
}
