//! Member entity - a user's membership in a guild

use chrono::{DateTime, Utc};

use crate::value_objects::Snowflake;

/// Guild member entity
///
/// Holds only the user ID; the `User` itself lives in the global table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub nickname: Option<String>,
    pub role_ids: Vec<Snowflake>,
    pub joined_at: Option<DateTime<Utc>>,
    pub premium_since: Option<DateTime<Utc>>,
    pub deaf: bool,
    pub mute: bool,
}

impl GuildMember {
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            guild_id,
            user_id,
            nickname: None,
            role_ids: Vec::new(),
            joined_at: None,
            premium_since: None,
            deaf: false,
            mute: false,
        }
    }

    /// Nickname if set, otherwise the given username
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.nickname.as_deref().unwrap_or(username)
    }

    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.role_ids.contains(&role_id)
    }

    /// Drop a role ID, e.g. after GUILD_ROLE_DELETE
    pub fn remove_role(&mut self, role_id: Snowflake) -> bool {
        let before = self.role_ids.len();
        self.role_ids.retain(|&id| id != role_id);
        self.role_ids.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_creation() {
        let member = GuildMember::new(Snowflake::new(100), Snowflake::new(200));
        assert_eq!(member.guild_id, Snowflake::new(100));
        assert_eq!(member.user_id, Snowflake::new(200));
        assert!(member.nickname.is_none());
        assert!(member.role_ids.is_empty());
    }

    #[test]
    fn test_display_name() {
        let mut member = GuildMember::new(Snowflake::new(1), Snowflake::new(2));
        assert_eq!(member.display_name("TestUser"), "TestUser");

        member.nickname = Some("Nickname".to_string());
        assert_eq!(member.display_name("TestUser"), "Nickname");
    }

    #[test]
    fn test_remove_role() {
        let mut member = GuildMember::new(Snowflake::new(1), Snowflake::new(2));
        member.role_ids = vec![Snowflake::new(100), Snowflake::new(101)];

        assert!(member.remove_role(Snowflake::new(100)));
        assert!(!member.remove_role(Snowflake::new(100)));
        assert!(member.has_role(Snowflake::new(101)));
    }
}
