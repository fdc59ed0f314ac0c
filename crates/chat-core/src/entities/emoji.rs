//! Emoji - custom guild emojis and the emoji reference used by reactions

use crate::value_objects::Snowflake;

/// Custom guild emoji
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emoji {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub role_ids: Vec<Snowflake>,
    pub require_colons: bool,
    pub managed: bool,
    pub animated: bool,
}

impl Emoji {
    pub fn new(id: Snowflake, guild_id: Snowflake, name: String) -> Self {
        Self {
            id,
            guild_id,
            name,
            role_ids: Vec::new(),
            require_colons: true,
            managed: false,
            animated: false,
        }
    }

    pub fn mention(&self) -> String {
        let prefix = if self.animated { "a" } else { "" };
        format!("<{prefix}:{}:{}>", self.name, self.id)
    }
}

/// Emoji as referenced from a reaction: either a unicode glyph or a custom emoji
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReactionEmoji {
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    pub animated: bool,
}

impl ReactionEmoji {
    pub fn unicode(glyph: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(glyph.into()),
            animated: false,
        }
    }

    pub fn custom(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            animated: false,
        }
    }

    /// Two references denote the same emoji: custom ones by ID, unicode ones by glyph
    pub fn same_as(&self, other: &ReactionEmoji) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name == other.name,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emoji_mention() {
        let mut emoji = Emoji::new(Snowflake::new(42), Snowflake::new(1), "blob".to_string());
        assert_eq!(emoji.mention(), "<:blob:42>");
        emoji.animated = true;
        assert_eq!(emoji.mention(), "<a:blob:42>");
    }

    #[test]
    fn test_reaction_emoji_identity() {
        let a = ReactionEmoji::custom(Snowflake::new(42), "blob");
        let b = ReactionEmoji::custom(Snowflake::new(42), "renamed");
        assert!(a.same_as(&b));

        assert!(ReactionEmoji::unicode("👍").same_as(&ReactionEmoji::unicode("👍")));
        assert!(!ReactionEmoji::unicode("👍").same_as(&a));
    }
}
