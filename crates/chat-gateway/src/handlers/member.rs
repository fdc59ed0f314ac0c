//! Guild members
//!
//! Members only reference users; the user is upserted into the global table
//! first so every member resolves to a cached user.

use chat_cache::{CacheError, EntityCache};
use chat_core::{GuildMember, User};
use serde_json::Value;

use super::{decode, HandlerError, HandlerResult};
use crate::events::{
    MemberPayload, MemberRemovePayload, MemberUpdatePayload, MembersChunkPayload, ShardEvent,
};

pub struct MemberHandler;

impl MemberHandler {
    pub fn add(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MemberPayload = decode(data)?;
        let guild_id = payload.guild_id.ok_or(HandlerError::MissingField("guild_id"))?;
        if cache.guild(guild_id).is_none() {
            return Err(CacheError::MissingGuild(guild_id).into());
        }

        let (user, member) = payload.into_parts(guild_id);
        cache.upsert_user(user);
        let upsert = cache.upsert_member(member)?;
        if upsert.is_new() {
            cache.update_guild(guild_id, |g| g.member_count += 1)?;
        }

        Ok(vec![ShardEvent::MemberAdded(upsert.current)])
    }

    /// Partial: only roles, nick and boost state are carried
    pub fn update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MemberUpdatePayload = decode(data)?;
        let guild_id = payload.guild_id;
        let user_id = payload.user.id;
        if cache.guild(guild_id).is_none() {
            return Err(CacheError::MissingGuild(guild_id).into());
        }

        cache.upsert_user(payload.user.clone().into_user());

        let previous = cache.member(guild_id, user_id);
        let member = if previous.is_some() {
            cache.update_member(guild_id, user_id, |m| payload.apply(m))?
        } else {
            let mut member = GuildMember::new(guild_id, user_id);
            payload.apply(&mut member);
            cache.upsert_member(member)?.current
        };

        Ok(vec![ShardEvent::MemberUpdated { member, previous }])
    }

    pub fn remove(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MemberRemovePayload = decode(data)?;
        let guild_id = payload.guild_id;
        let user_id = payload.user.id;

        let member = cache.remove_member(guild_id, user_id)?;
        if member.is_some() {
            cache.update_guild(guild_id, |g| g.member_count = g.member_count.saturating_sub(1))?;
        }
        let user = cache.get_or_create_user(user_id, || payload.user.into_user());

        Ok(vec![ShardEvent::MemberRemoved {
            guild_id,
            user,
            member,
        }])
    }

    /// Response to a Request Guild Members command
    pub fn chunk(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: MembersChunkPayload = decode(data)?;
        let guild_id = payload.guild_id;
        if cache.guild(guild_id).is_none() {
            return Err(CacheError::MissingGuild(guild_id).into());
        }

        let mut members = Vec::with_capacity(payload.members.len());
        for member in payload.members {
            let (user, member) = member.into_parts(guild_id);
            cache.upsert_user(user);
            members.push(cache.upsert_member(member)?.current);
        }

        for presence in payload.presences {
            let user_id = presence.user.id;
            cache.get_or_create_user(user_id, || User::unknown(user_id));
            cache.update_presence(guild_id, user_id, |p| presence.apply(p))?;
        }

        tracing::debug!(
            guild_id = %guild_id,
            members = members.len(),
            not_found = payload.not_found.len(),
            "Member chunk applied"
        );

        Ok(vec![ShardEvent::MembersChunk {
            guild_id,
            members,
            not_found: payload.not_found,
        }])
    }
}
