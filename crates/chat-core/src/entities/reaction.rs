//! Reaction - aggregated emoji reaction on a cached message

use super::ReactionEmoji;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: ReactionEmoji,
    pub count: u32,
    /// Whether the current user is one of the reactors
    pub me: bool,
}

impl Reaction {
    pub fn new(emoji: ReactionEmoji, me: bool) -> Self {
        Self { emoji, count: 1, me }
    }
}
