//! Event payload definitions
//!
//! The `d` object of each dispatch event, and the conversions from wire shape
//! into cached entities. Full objects default missing fields; partial updates
//! keep them as `Option` so absent fields leave cached values alone.

use chat_core::{
    Activity, Channel, ChannelType, Emoji, Guild, GuildMember, Message, Permissions, Presence,
    Reaction, ReactionEmoji, Role, Snowflake, Status, User, VoiceState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use chat_cache::GuildContents;

/// Distinguishes an absent field (`None`) from an explicit null (`Some(None)`)
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

// === Connection Events ===

/// READY event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,

    /// The account this session is authenticated as
    pub user: UserPayload,

    /// Guilds the user is in, all initially unavailable
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,

    #[serde(default)]
    pub private_channels: Vec<ChannelPayload>,

    /// Session ID for resuming
    pub session_id: String,
}

/// Guild stub in READY, and the GUILD_DELETE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    /// If true this is an outage; if false the user left or was removed
    #[serde(default)]
    pub unavailable: bool,
}

impl UnavailableGuild {
    #[must_use]
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            unavailable: true,
        }
    }
}

// === User Payloads ===

/// Full user object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: Snowflake,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl UserPayload {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            discriminator: self.discriminator,
            avatar: self.avatar,
            bot: self.bot,
        }
    }
}

/// User object as carried by PRESENCE_UPDATE, where only `id` is guaranteed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialUserPayload {
    pub id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot: Option<bool>,
}

impl PartialUserPayload {
    /// Whether the payload carries anything besides the ID
    pub fn has_changes(&self) -> bool {
        self.username.is_some()
            || self.discriminator.is_some()
            || self.avatar.is_some()
            || self.bot.is_some()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username.clone_from(username);
        }
        if let Some(discriminator) = &self.discriminator {
            user.discriminator.clone_from(discriminator);
        }
        if let Some(avatar) = &self.avatar {
            user.avatar.clone_from(avatar);
        }
        if let Some(bot) = self.bot {
            user.bot = bot;
        }
    }
}

// === Guild Events ===

/// GUILD_CREATE and GUILD_UPDATE payload
///
/// GUILD_UPDATE leaves the nested lists empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildPayload {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub owner_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afk_channel_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channels: Vec<ChannelPayload>,
    #[serde(default)]
    pub roles: Vec<RolePayload>,
    #[serde(default)]
    pub emojis: Vec<EmojiPayload>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    #[serde(default)]
    pub voice_states: Vec<VoiceStatePayload>,
    #[serde(default)]
    pub presences: Vec<PresencePayload>,
}

/// A GUILD_CREATE split into what the cache stores separately
#[derive(Debug)]
pub struct GuildParts {
    pub guild: Guild,
    pub contents: GuildContents,
    /// Users of the members list, complete objects
    pub users: Vec<User>,
    pub members: Vec<GuildMember>,
    /// Users only referenced by presences, possibly just an ID
    pub presence_users: Vec<PartialUserPayload>,
}

impl GuildPayload {
    /// The guild row alone, with `member_count` falling back to `previous`
    pub fn to_guild(&self, previous: Option<&Guild>) -> Guild {
        let member_count = if self.member_count == 0 {
            previous.map_or(0, |g| g.member_count)
        } else {
            self.member_count
        };
        Guild {
            id: self.id,
            name: self.name.clone(),
            icon: self.icon.clone(),
            owner_id: self.owner_id,
            region: self.region.clone(),
            afk_channel_id: self.afk_channel_id,
            system_channel_id: self.system_channel_id,
            member_count,
            large: self.large,
            unavailable: self.unavailable,
            joined_at: self.joined_at.or_else(|| previous.and_then(|g| g.joined_at)),
        }
    }

    pub fn into_parts(self, previous: Option<&Guild>) -> GuildParts {
        let guild = self.to_guild(previous);
        let guild_id = guild.id;

        let (users, members): (Vec<User>, Vec<GuildMember>) = self
            .members
            .into_iter()
            .map(|m| m.into_parts(guild_id))
            .unzip();

        let presence_users = self.presences.iter().map(|p| p.user.clone()).collect();
        let presences = self
            .presences
            .into_iter()
            .map(|p| p.into_presence(guild_id))
            .collect();

        let contents = GuildContents {
            channels: self
                .channels
                .into_iter()
                .map(|c| c.into_parts(Some(guild_id)).0)
                .collect(),
            roles: self.roles.into_iter().map(|r| r.into_role(guild_id)).collect(),
            emojis: self.emojis.into_iter().map(|e| e.into_emoji(guild_id)).collect(),
            voice_states: self
                .voice_states
                .into_iter()
                .map(|v| v.into_voice_state(guild_id))
                .collect(),
            presences,
        };

        GuildParts {
            guild,
            contents,
            users,
            members,
            presence_users,
        }
    }
}

/// GUILD_BAN_ADD and GUILD_BAN_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildBanPayload {
    pub guild_id: Snowflake,
    pub user: UserPayload,
}

/// GUILD_EMOJIS_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildEmojisPayload {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub emojis: Vec<EmojiPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiPayload {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default = "default_true")]
    pub require_colons: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub animated: bool,
}

impl EmojiPayload {
    pub fn into_emoji(self, guild_id: Snowflake) -> Emoji {
        Emoji {
            id: self.id,
            guild_id,
            name: self.name,
            role_ids: self.roles,
            require_colons: self.require_colons,
            managed: self.managed,
            animated: self.animated,
        }
    }
}

// === Channel Events ===

/// Channel object, as sent by CHANNEL_CREATE/UPDATE/DELETE and inside GUILD_CREATE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: ChannelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_limit: Option<u32>,
    #[serde(default)]
    pub recipients: Vec<UserPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pin_timestamp: Option<DateTime<Utc>>,
}

impl ChannelPayload {
    /// The channel and the recipient users it references
    ///
    /// `guild_id` overrides the payload's own field, which GUILD_CREATE omits.
    pub fn into_parts(self, guild_id: Option<Snowflake>) -> (Channel, Vec<User>) {
        let recipients: Vec<User> = self.recipients.into_iter().map(UserPayload::into_user).collect();
        let channel = Channel {
            id: self.id,
            kind: self.kind,
            guild_id: guild_id.or(self.guild_id),
            name: self.name,
            topic: self.topic,
            position: self.position,
            parent_id: self.parent_id,
            nsfw: self.nsfw,
            bitrate: self.bitrate,
            user_limit: self.user_limit,
            recipient_ids: recipients.iter().map(|u| u.id).collect(),
            last_message_id: self.last_message_id,
            last_pin_timestamp: self.last_pin_timestamp,
        };
        (channel, recipients)
    }
}

/// CHANNEL_PINS_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPinsPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pin_timestamp: Option<DateTime<Utc>>,
}

// === Role Events ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePayload {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl RolePayload {
    pub fn into_role(self, guild_id: Snowflake) -> Role {
        Role {
            id: self.id,
            guild_id,
            name: self.name,
            color: self.color,
            hoist: self.hoist,
            position: self.position,
            permissions: self.permissions,
            managed: self.managed,
            mentionable: self.mentionable,
        }
    }
}

/// GUILD_ROLE_CREATE and GUILD_ROLE_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildRolePayload {
    pub guild_id: Snowflake,
    pub role: RolePayload,
}

/// GUILD_ROLE_DELETE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildRoleDeletePayload {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

// === Member Events ===

/// Full member object; GUILD_MEMBER_ADD adds `guild_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPayload {
    pub user: UserPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}

impl MemberPayload {
    /// The shared user and the member row referencing it
    pub fn into_parts(self, guild_id: Snowflake) -> (User, GuildMember) {
        let member = GuildMember {
            guild_id,
            user_id: self.user.id,
            nickname: self.nick,
            role_ids: self.roles,
            joined_at: self.joined_at,
            premium_since: self.premium_since,
            deaf: self.deaf,
            mute: self.mute,
        };
        (self.user.into_user(), member)
    }
}

/// GUILD_MEMBER_UPDATE payload (partial)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberUpdatePayload {
    pub guild_id: Snowflake,
    pub user: UserPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Snowflake>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub nick: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub premium_since: Option<Option<DateTime<Utc>>>,
}

impl MemberUpdatePayload {
    pub fn apply(&self, member: &mut GuildMember) {
        if let Some(roles) = &self.roles {
            member.role_ids.clone_from(roles);
        }
        if let Some(nick) = &self.nick {
            member.nickname.clone_from(nick);
        }
        if let Some(premium_since) = self.premium_since {
            member.premium_since = premium_since;
        }
    }
}

/// GUILD_MEMBER_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRemovePayload {
    pub guild_id: Snowflake,
    pub user: UserPayload,
}

/// GUILD_MEMBERS_CHUNK payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersChunkPayload {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    #[serde(default)]
    pub not_found: Vec<Snowflake>,
    #[serde(default)]
    pub presences: Vec<PresencePayload>,
}

// === Message Events ===

/// MESSAGE_CREATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author: UserPayload,
    #[serde(default)]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<UserPayload>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub reactions: Vec<ReactionPayload>,
    /// Author's member object, for guild messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<PartialMemberPayload>,
}

/// Member object attached to messages and typing events, without the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialMemberPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}

impl PartialMemberPayload {
    pub fn into_member(self, guild_id: Snowflake, user_id: Snowflake) -> GuildMember {
        GuildMember {
            guild_id,
            user_id,
            nickname: self.nick,
            role_ids: self.roles,
            joined_at: self.joined_at,
            premium_since: None,
            deaf: self.deaf,
            mute: self.mute,
        }
    }
}

/// A message split into the entities it references
#[derive(Debug)]
pub struct MessageParts {
    pub message: Message,
    pub author: User,
    pub mentions: Vec<User>,
    pub member: Option<GuildMember>,
}

impl MessagePayload {
    pub fn into_parts(self) -> MessageParts {
        let author = self.author.into_user();
        let member = match (self.guild_id, self.member) {
            (Some(guild_id), Some(member)) => Some(member.into_member(guild_id, author.id)),
            _ => None,
        };
        let mentions: Vec<User> = self.mentions.into_iter().map(UserPayload::into_user).collect();
        let message = Message {
            id: self.id,
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            author_id: author.id,
            content: self.content,
            timestamp: self.timestamp,
            edited_timestamp: self.edited_timestamp,
            tts: self.tts,
            mention_everyone: self.mention_everyone,
            mention_ids: mentions.iter().map(|u| u.id).collect(),
            pinned: self.pinned,
            reactions: self.reactions.into_iter().map(ReactionPayload::into_reaction).collect(),
        };
        MessageParts {
            message,
            author,
            mentions,
            member,
        }
    }
}

/// MESSAGE_UPDATE payload (partial)
///
/// Embed-only updates carry nothing but `id`, `channel_id` and `guild_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageUpdatePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention_everyone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<Snowflake>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

/// Raw form of [`MessageUpdatePayload`] where mentions are full user objects
#[derive(Deserialize)]
struct RawMessageUpdate {
    id: Snowflake,
    channel_id: Snowflake,
    guild_id: Option<Snowflake>,
    content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    edited_timestamp: Option<Option<DateTime<Utc>>>,
    tts: Option<bool>,
    mention_everyone: Option<bool>,
    mentions: Option<Vec<UserPayload>>,
    pinned: Option<bool>,
}

impl MessageUpdatePayload {
    /// Decode a MESSAGE_UPDATE `d` object
    pub fn from_value(data: serde_json::Value) -> Result<Self, serde_json::Error> {
        let raw: RawMessageUpdate = serde_json::from_value(data)?;
        Ok(Self {
            id: raw.id,
            channel_id: raw.channel_id,
            guild_id: raw.guild_id,
            content: raw.content,
            edited_timestamp: raw.edited_timestamp,
            tts: raw.tts,
            mention_everyone: raw.mention_everyone,
            mentions: raw
                .mentions
                .map(|users| users.into_iter().map(|u| u.id).collect()),
            pinned: raw.pinned,
        })
    }

    pub fn apply(&self, message: &mut Message) {
        if let Some(content) = &self.content {
            message.content.clone_from(content);
        }
        if let Some(edited) = self.edited_timestamp {
            message.edited_timestamp = edited;
        }
        if let Some(tts) = self.tts {
            message.tts = tts;
        }
        if let Some(mention_everyone) = self.mention_everyone {
            message.mention_everyone = mention_everyone;
        }
        if let Some(mentions) = &self.mentions {
            message.mention_ids.clone_from(mentions);
        }
        if let Some(pinned) = self.pinned {
            message.pinned = pinned;
        }
    }
}

/// MESSAGE_DELETE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeletePayload {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

/// MESSAGE_DELETE_BULK payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleteBulkPayload {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

// === Reaction Events ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEmojiPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

impl ReactionEmojiPayload {
    pub fn into_emoji(self) -> ReactionEmoji {
        ReactionEmoji {
            id: self.id,
            name: self.name,
            animated: self.animated,
        }
    }
}

/// Reaction summary attached to a message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionPayload {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub me: bool,
    pub emoji: ReactionEmojiPayload,
}

impl ReactionPayload {
    pub fn into_reaction(self) -> Reaction {
        Reaction {
            emoji: self.emoji.into_emoji(),
            count: self.count.max(1),
            me: self.me,
        }
    }
}

/// MESSAGE_REACTION_ADD and MESSAGE_REACTION_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactionPayload {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub emoji: ReactionEmojiPayload,
}

/// MESSAGE_REACTION_REMOVE_ALL payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactionRemoveAllPayload {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

// === Presence Events ===

/// PRESENCE_UPDATE payload, also found in GUILD_CREATE and member chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user: PartialUserPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<Activity>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Snowflake>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub nick: Option<Option<String>>,
}

impl PresencePayload {
    /// `game` if set, otherwise the first entry of `activities`
    pub fn activity(&self) -> Option<Activity> {
        self.game
            .clone()
            .or_else(|| self.activities.first().cloned())
    }

    pub fn apply(&self, presence: &mut Presence) {
        presence.status = self.status;
        presence.activity = self.activity();
    }

    pub fn into_presence(self, guild_id: Snowflake) -> Presence {
        let mut presence = Presence::new(guild_id, self.user.id);
        self.apply(&mut presence);
        presence
    }
}

/// TYPING_START payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingStartPayload {
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    /// Unix time in seconds
    #[serde(default)]
    pub timestamp: u64,
}

// === Voice Events ===

/// VOICE_STATE_UPDATE payload, also found in GUILD_CREATE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceStatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub suppress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<MemberPayload>,
}

impl VoiceStatePayload {
    pub fn into_voice_state(self, guild_id: Snowflake) -> VoiceState {
        VoiceState {
            guild_id,
            user_id: self.user_id,
            channel_id: self.channel_id,
            session_id: self.session_id,
            deaf: self.deaf,
            mute: self.mute,
            self_deaf: self.self_deaf,
            self_mute: self.self_mute,
            suppress: self.suppress,
        }
    }
}

/// VOICE_SERVER_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceServerPayload {
    pub token: String,
    pub guild_id: Snowflake,
    /// Null while the voice server is being reallocated
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ready_with_minimal_user() {
        let ready: ReadyEvent = serde_json::from_value(json!({
            "session_id": "abc123",
            "user": {"id": "1"},
            "guilds": [{"id": "10", "unavailable": true}]
        }))
        .unwrap();

        assert_eq!(ready.session_id, "abc123");
        assert_eq!(ready.user.id, Snowflake::new(1));
        assert!(ready.user.username.is_empty());
        assert_eq!(ready.guilds.len(), 1);
        assert!(ready.guilds[0].unavailable);
    }

    #[test]
    fn test_guild_parts_assign_guild_id() {
        let payload: GuildPayload = serde_json::from_value(json!({
            "id": "10",
            "name": "Test",
            "owner_id": "1",
            "member_count": 2,
            "channels": [{"id": "20", "type": 0, "name": "general"}],
            "roles": [{"id": "10", "name": "@everyone", "permissions": "1024"}],
            "members": [{"user": {"id": "1", "username": "owner"}, "roles": []}],
            "presences": [{"user": {"id": "3", "username": "lurker"}, "status": "idle"}]
        }))
        .unwrap();

        let parts = payload.into_parts(None);
        assert_eq!(parts.guild.name, "Test");
        assert_eq!(parts.contents.channels[0].guild_id, Some(Snowflake::new(10)));
        assert_eq!(parts.contents.roles[0].permissions, Permissions::VIEW_CHANNEL);
        assert_eq!(parts.members[0].guild_id, Snowflake::new(10));
        assert_eq!(parts.contents.presences[0].status, Status::Idle);

        assert_eq!(parts.users.len(), 1);
        assert_eq!(parts.presence_users[0].id, Snowflake::new(3));
        assert_eq!(parts.presence_users[0].username.as_deref(), Some("lurker"));
    }

    #[test]
    fn test_guild_update_keeps_member_count() {
        let previous = Guild {
            member_count: 42,
            ..Guild::new(Snowflake::new(10), "Old".to_string(), Snowflake::new(1))
        };
        let payload: GuildPayload =
            serde_json::from_value(json!({"id": "10", "name": "New", "owner_id": "1"})).unwrap();

        let guild = payload.to_guild(Some(&previous));
        assert_eq!(guild.name, "New");
        assert_eq!(guild.member_count, 42);
    }

    #[test]
    fn test_member_update_null_vs_absent() {
        let mut member = GuildMember::new(Snowflake::new(10), Snowflake::new(1));
        member.nickname = Some("nick".to_string());
        member.role_ids = vec![Snowflake::new(5)];

        let absent: MemberUpdatePayload = serde_json::from_value(json!({
            "guild_id": "10",
            "user": {"id": "1"},
            "roles": ["6"]
        }))
        .unwrap();
        absent.apply(&mut member);
        assert_eq!(member.nickname.as_deref(), Some("nick"));
        assert_eq!(member.role_ids, vec![Snowflake::new(6)]);

        let cleared: MemberUpdatePayload = serde_json::from_value(json!({
            "guild_id": "10",
            "user": {"id": "1"},
            "nick": null
        }))
        .unwrap();
        cleared.apply(&mut member);
        assert!(member.nickname.is_none());
        assert_eq!(member.role_ids, vec![Snowflake::new(6)]);
    }

    #[test]
    fn test_message_update_partial_merge() {
        let mut message = Message::new(
            Snowflake::new(100),
            Snowflake::new(5),
            Snowflake::new(1),
            "before".to_string(),
        );
        message.pinned = true;

        let update = MessageUpdatePayload::from_value(json!({
            "id": "100",
            "channel_id": "5",
            "content": "after",
            "mentions": [{"id": "7", "username": "x"}]
        }))
        .unwrap();
        update.apply(&mut message);

        assert_eq!(message.content, "after");
        assert!(message.pinned);
        assert_eq!(message.mention_ids, vec![Snowflake::new(7)]);
    }

    #[test]
    fn test_message_parts() {
        let payload: MessagePayload = serde_json::from_value(json!({
            "id": "100",
            "channel_id": "5",
            "guild_id": "10",
            "author": {"id": "1", "username": "a", "discriminator": "0001"},
            "content": "hi",
            "timestamp": "2020-01-01T00:00:00+00:00",
            "member": {"nick": "alpha", "roles": ["6"]},
            "reactions": [{"count": 2, "me": true, "emoji": {"name": "👍"}}]
        }))
        .unwrap();

        let parts = payload.into_parts();
        assert_eq!(parts.message.author_id, Snowflake::new(1));
        assert_eq!(parts.author.username, "a");
        assert_eq!(parts.message.reactions[0].count, 2);
        let member = parts.member.unwrap();
        assert_eq!(member.guild_id, Snowflake::new(10));
        assert_eq!(member.nickname.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_presence_prefers_game() {
        let presence: PresencePayload = serde_json::from_value(json!({
            "user": {"id": "1"},
            "status": "dnd",
            "game": null,
            "activities": [{"name": "chess", "type": 0}]
        }))
        .unwrap();

        assert!(!presence.user.has_changes());
        assert_eq!(presence.activity().unwrap().name, "chess");
        let cached = presence.into_presence(Snowflake::new(10));
        assert_eq!(cached.status, Status::Dnd);
    }

    #[test]
    fn test_partial_user_clears_avatar() {
        let mut user = User::new(Snowflake::new(1), "a".to_string(), "0001".to_string());
        user.avatar = Some("hash".to_string());

        let partial: PartialUserPayload =
            serde_json::from_value(json!({"id": "1", "avatar": null})).unwrap();
        assert!(partial.has_changes());
        partial.apply(&mut user);
        assert!(user.avatar.is_none());
        assert_eq!(user.username, "a");
    }

    #[test]
    fn test_dm_channel_recipients() {
        let payload: ChannelPayload = serde_json::from_value(json!({
            "id": "30",
            "type": 1,
            "recipients": [{"id": "2", "username": "friend"}]
        }))
        .unwrap();

        let (channel, users) = payload.into_parts(None);
        assert!(channel.is_dm());
        assert_eq!(channel.recipient_ids, vec![Snowflake::new(2)]);
        assert_eq!(users[0].username, "friend");
    }
}
