//! Guild roles

use chat_cache::EntityCache;
use serde_json::Value;

use super::{decode, HandlerResult};
use crate::events::{GuildRoleDeletePayload, GuildRolePayload, ShardEvent};

pub struct RoleHandler;

impl RoleHandler {
    pub fn create(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: GuildRolePayload = decode(data)?;
        let upsert = cache.upsert_role(payload.role.into_role(payload.guild_id))?;
        Ok(vec![ShardEvent::RoleCreated(upsert.current)])
    }

    pub fn update(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: GuildRolePayload = decode(data)?;
        let upsert = cache.upsert_role(payload.role.into_role(payload.guild_id))?;
        Ok(vec![ShardEvent::RoleUpdated {
            role: upsert.current,
            previous: upsert.previous,
        }])
    }

    /// Also strips the role from every member holding it
    pub fn delete(cache: &EntityCache, data: Value) -> HandlerResult<Vec<ShardEvent>> {
        let payload: GuildRoleDeletePayload = decode(data)?;
        let role = cache.remove_role(payload.guild_id, payload.role_id)?;
        Ok(vec![ShardEvent::RoleDeleted {
            guild_id: payload.guild_id,
            role_id: payload.role_id,
            role,
        }])
    }
}
