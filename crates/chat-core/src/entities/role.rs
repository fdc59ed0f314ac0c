//! Role entity - a guild role with permissions

use crate::value_objects::{Permissions, Snowflake};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub position: i32,
    pub permissions: Permissions,
    pub managed: bool,
    pub mentionable: bool,
}

impl Role {
    pub fn new(id: Snowflake, guild_id: Snowflake, name: String, permissions: Permissions) -> Self {
        Self {
            id,
            guild_id,
            name,
            color: 0,
            hoist: false,
            position: 0,
            permissions,
            managed: false,
            mentionable: false,
        }
    }

    /// The @everyone role shares its ID with the guild
    #[inline]
    pub fn is_everyone(&self) -> bool {
        self.id == self.guild_id
    }

    #[inline]
    pub fn has_permission(&self, permission: Permissions) -> bool {
        self.permissions.has(permission)
    }

    /// Compare role positions for hierarchy (higher position = more authority)
    #[inline]
    pub fn is_higher_than(&self, other: &Role) -> bool {
        (self.position, other.id) > (other.position, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everyone_role() {
        let role = Role::new(Snowflake::new(5), Snowflake::new(5), "@everyone".to_string(), Permissions::VIEW_CHANNEL);
        assert!(role.is_everyone());
        assert!(role.has_permission(Permissions::VIEW_CHANNEL));
        assert!(!role.has_permission(Permissions::KICK_MEMBERS));
    }

    #[test]
    fn test_hierarchy_ties_broken_by_id() {
        let mut low = Role::new(Snowflake::new(20), Snowflake::new(1), "a".to_string(), Permissions::empty());
        let mut high = Role::new(Snowflake::new(10), Snowflake::new(1), "b".to_string(), Permissions::empty());
        low.position = 3;
        high.position = 3;
        // Same position: the older (lower ID) role ranks higher
        assert!(high.is_higher_than(&low));
        assert!(!low.is_higher_than(&high));

        low.position = 4;
        assert!(low.is_higher_than(&high));
    }
}
