//! Message entity - a chat message held in the per-channel message cache

use chrono::{DateTime, Utc};

use super::reaction::Reaction;
use super::ReactionEmoji;
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author_id: Snowflake,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub tts: bool,
    pub mention_everyone: bool,
    pub mention_ids: Vec<Snowflake>,
    pub pinned: bool,
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn new(id: Snowflake, channel_id: Snowflake, author_id: Snowflake, content: String) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author_id,
            content,
            timestamp: None,
            edited_timestamp: None,
            tts: false,
            mention_everyone: false,
            mention_ids: Vec::new(),
            pinned: false,
            reactions: Vec::new(),
        }
    }

    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    /// Count one more reaction with `emoji`; `me` marks our own reaction
    pub fn add_reaction(&mut self, emoji: &ReactionEmoji, me: bool) {
        match self.reactions.iter_mut().find(|r| r.emoji.same_as(emoji)) {
            Some(reaction) => {
                reaction.count += 1;
                reaction.me |= me;
            }
            None => self.reactions.push(Reaction::new(emoji.clone(), me)),
        }
    }

    /// Count one reaction less; the entry disappears when it reaches zero
    pub fn remove_reaction(&mut self, emoji: &ReactionEmoji, me: bool) {
        if let Some(pos) = self.reactions.iter().position(|r| r.emoji.same_as(emoji)) {
            let reaction = &mut self.reactions[pos];
            reaction.count = reaction.count.saturating_sub(1);
            if me {
                reaction.me = false;
            }
            if reaction.count == 0 {
                self.reactions.remove(pos);
            }
        }
    }

    pub fn clear_reactions(&mut self) {
        self.reactions.clear();
    }

    /// Truncated preview of the content (on a char boundary)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            return &self.content;
        }
        let mut end = max_len;
        while !self.content.is_char_boundary(end) {
            end -= 1;
        }
        &self.content[..end]
    }
}
