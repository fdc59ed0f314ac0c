//! Guild entity - a remote server as seen by this client

use chrono::{DateTime, Utc};

use crate::value_objects::Snowflake;

/// Guild entity
///
/// Nested members, channels, roles and so on live in the cache next to the
/// guild, not inside it, so a guild snapshot stays cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: Snowflake,
    pub region: Option<String>,
    pub afk_channel_id: Option<Snowflake>,
    pub system_channel_id: Option<Snowflake>,
    pub member_count: u64,
    pub large: bool,
    /// Outage flag; sub-entities are retained but must not be relied on
    pub unavailable: bool,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Guild {
    pub fn new(id: Snowflake, name: String, owner_id: Snowflake) -> Self {
        Self {
            id,
            name,
            icon: None,
            owner_id,
            region: None,
            afk_channel_id: None,
            system_channel_id: None,
            member_count: 0,
            large: false,
            unavailable: false,
            joined_at: None,
        }
    }

    /// Guild announced by READY but not yet delivered by GUILD_CREATE
    pub fn unavailable(id: Snowflake) -> Self {
        let mut guild = Self::new(id, String::new(), Snowflake::default());
        guild.unavailable = true;
        guild
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        !self.unavailable
    }

    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }

    pub fn icon_url(&self) -> Option<String> {
        self.icon
            .as_ref()
            .map(|hash| format!("/icons/{}/{}.png", self.id, hash))
    }
}
