//! Voice state - a user's connection to a guild voice channel

use crate::value_objects::Snowflake;

/// Voice state keyed by (guild_id, user_id)
///
/// `channel_id == None` means the user left voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceState {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub channel_id: Option<Snowflake>,
    pub session_id: String,
    pub deaf: bool,
    pub mute: bool,
    pub self_deaf: bool,
    pub self_mute: bool,
    pub suppress: bool,
}

impl VoiceState {
    pub fn new(guild_id: Snowflake, user_id: Snowflake, session_id: String) -> Self {
        Self {
            guild_id,
            user_id,
            channel_id: None,
            session_id,
            deaf: false,
            mute: false,
            self_deaf: false,
            self_mute: false,
            suppress: false,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }
}
