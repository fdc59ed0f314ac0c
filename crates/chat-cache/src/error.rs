//! Cache consistency errors
//!
//! Raised when an event references an entity whose parent is not cached.
//! This points at a missed GUILD_CREATE or an ordering bug and is never
//! silently ignored, but it only fails the single event that hit it.

use chat_core::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("guild {0} is not cached")]
    MissingGuild(Snowflake),

    #[error("channel {0} is not cached")]
    MissingChannel(Snowflake),

    #[error("user {0} is not cached")]
    MissingUser(Snowflake),

    #[error("member {user_id} of guild {guild_id} is not cached")]
    MissingMember {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    #[error("role {role_id} of guild {guild_id} is not cached")]
    MissingRole {
        guild_id: Snowflake,
        role_id: Snowflake,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;
