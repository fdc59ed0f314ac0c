//! Guild lifecycle, bans and emojis

use std::sync::Arc;

use chat_cache::{CacheError, EntityCache};
use chat_core::{Guild, Snowflake, User};
use serde_json::Value;

use super::{decode, HandlerResult};
use crate::events::{
    GuildBanPayload, GuildEmojisPayload, GuildParts, GuildPayload, ShardEvent, UnavailableGuild,
};

pub struct GuildHandler;

impl GuildHandler {
    /// GUILD_CREATE
    ///
    /// Channels, roles, emojis, voice states and presences are replaced
    /// wholesale. Members are upserted since large guilds stream them in chunks.
    pub fn create(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: GuildPayload = decode(data)?;
        let guild_id = payload.id;
        let previous = cache.guild(guild_id);

        if payload.unavailable {
            // still in an outage, nothing authoritative to apply
            if previous.is_none() {
                cache.insert_guild(Guild::unavailable(guild_id));
            }
            tracing::debug!(guild_id = %guild_id, "Guild still unavailable");
            return Ok(Vec::new());
        }

        let GuildParts {
            guild,
            contents,
            users,
            members,
            presence_users,
        } = payload.into_parts(previous.as_deref());

        let upsert = cache.insert_guild(guild);
        cache.replace_guild_contents(guild_id, contents)?;

        for user in users {
            cache.upsert_user(user);
        }
        for partial in presence_users {
            cache.get_or_create_user(partial.id, || User::unknown(partial.id));
            if partial.has_changes() {
                cache.update_user(partial.id, |u| partial.apply(u))?;
            }
        }
        for member in members {
            cache.upsert_member(member)?;
        }

        let event = match previous {
            None => ShardEvent::GuildCreated(upsert.current),
            Some(previous) if !previous.is_available() => {
                tracing::debug!(guild_id = %guild_id, "Guild became available");
                ShardEvent::GuildAvailable(upsert.current)
            }
            Some(previous) => ShardEvent::GuildUpdated {
                guild: upsert.current,
                previous: Some(previous),
            },
        };
        Ok(vec![event])
    }

    /// GUILD_UPDATE replaces the guild row; nested tables are untouched
    pub fn update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: GuildPayload = decode(data)?;
        let previous = cache
            .guild(payload.id)
            .ok_or(CacheError::MissingGuild(payload.id))?;

        let guild = cache.update_guild(payload.id, |g| {
            let mut next = payload.to_guild(Some(&*g));
            next.unavailable = g.unavailable;
            *g = next;
        })?;

        Ok(vec![ShardEvent::GuildUpdated {
            guild,
            previous: Some(previous),
        }])
    }

    /// GUILD_DELETE: an outage keeps the guild, anything else removes it
    pub fn delete(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: UnavailableGuild = decode(data)?;

        if payload.unavailable {
            let guild = cache.update_guild(payload.id, |g| g.unavailable = true)?;
            tracing::info!(guild_id = %payload.id, "Guild became unavailable");
            return Ok(vec![ShardEvent::GuildUnavailable(guild)]);
        }

        let removed = cache
            .remove_guild(payload.id)
            .ok_or(CacheError::MissingGuild(payload.id))?;
        tracing::info!(
            guild_id = %payload.id,
            channels = removed.channels.len(),
            "Guild removed"
        );
        Ok(vec![ShardEvent::GuildRemoved {
            guild: removed.guild,
            channels: removed.channels,
        }])
    }

    pub fn ban_add(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let (guild_id, user) = Self::ban(cache, data)?;
        Ok(vec![ShardEvent::BanAdded { guild_id, user }])
    }

    pub fn ban_remove(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let (guild_id, user) = Self::ban(cache, data)?;
        Ok(vec![ShardEvent::BanRemoved { guild_id, user }])
    }

    fn ban(cache: &EntityCache, data: Value) -> HandlerResult<(Snowflake, Arc<User>)> {
        let payload: GuildBanPayload = decode(data)?;
        if cache.guild(payload.guild_id).is_none() {
            return Err(CacheError::MissingGuild(payload.guild_id).into());
        }
        let user = cache.upsert_user(payload.user.into_user()).current;
        Ok((payload.guild_id, user))
    }

    /// GUILD_EMOJIS_UPDATE always carries the complete list
    pub fn emojis_update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: GuildEmojisPayload = decode(data)?;
        let guild_id = payload.guild_id;
        let emojis = cache.replace_emojis(
            guild_id,
            payload
                .emojis
                .into_iter()
                .map(|e| e.into_emoji(guild_id))
                .collect(),
        )?;
        Ok(vec![ShardEvent::EmojisUpdated { guild_id, emojis }])
    }
}
