//! User entity - a remote account shared by every guild that references it

use crate::value_objects::Snowflake;

/// User entity
///
/// Stored once in the global user table; members and messages hold only the ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub bot: bool,
}

impl User {
    /// Create a new User with required fields
    pub fn new(id: Snowflake, username: String, discriminator: String) -> Self {
        Self {
            id,
            username,
            discriminator,
            avatar: None,
            bot: false,
        }
    }

    /// Placeholder for a user seen only by ID so far
    pub fn unknown(id: Snowflake) -> Self {
        Self::new(id, String::new(), "0000".to_string())
    }

    /// Get the full tag: username#discriminator
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    /// Mention markup for this user
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Avatar path on the CDN, or the default avatar for the discriminator
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => format!("/avatars/{}/{}.png", self.id, hash),
            None => format!("/embed/avatars/{}.png", self.default_avatar_index()),
        }
    }

    fn default_avatar_index(&self) -> u16 {
        self.discriminator.parse::<u16>().unwrap_or(0) % 5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_tag_and_mention() {
        let user = User::new(Snowflake::new(7), "nelly".to_string(), "1337".to_string());
        assert_eq!(user.tag(), "nelly#1337");
        assert_eq!(user.mention(), "<@7>");
    }

    #[test]
    fn test_avatar_url() {
        let mut user = User::new(Snowflake::new(123), "a".to_string(), "0003".to_string());
        assert_eq!(user.avatar_url(), "/embed/avatars/3.png");

        user.avatar = Some("abc123".to_string());
        assert_eq!(user.avatar_url(), "/avatars/123/abc123.png");
    }

    #[test]
    fn test_unknown_placeholder() {
        let user = User::unknown(Snowflake::new(9));
        assert_eq!(user.id, Snowflake::new(9));
        assert!(user.username.is_empty());
        assert!(!user.bot);
    }
}
