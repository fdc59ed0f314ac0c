//! Entity cache
//!
//! Concurrent keyed tables of immutable snapshots. Every entity is stored as
//! an `Arc<T>`; an update clones the current value, applies the change and
//! swaps the `Arc`, so a reader always holds either the old or the new
//! version, never a half-applied one.
//!
//! Guild-scoped entities (members, roles, emojis, voice states, presences)
//! live in per-guild tables. Users and channels are global; guilds index their
//! channels. Structural changes that touch several tables (guild insert and
//! removal, channel insert and removal) run under the `topology` write lock so
//! compound reads such as [`EntityCache::guild_channels`] see them atomically.

use std::collections::VecDeque;
use std::sync::Arc;

use chat_core::{Channel, Emoji, Guild, GuildMember, Message, Presence, Role, Snowflake, User, VoiceState};
use dashmap::DashMap;
use parking_lot::RwLock;

use super::tables::{replace_all, snapshot, update_in, GuildTables};
use crate::error::{CacheError, CacheResult};

/// Result of an insert-or-replace
#[derive(Debug, Clone)]
pub struct Upsert<T> {
    pub current: Arc<T>,
    pub previous: Option<Arc<T>>,
}

impl<T> Upsert<T> {
    /// Whether the entity was not cached before
    #[inline]
    pub fn is_new(&self) -> bool {
        self.previous.is_none()
    }
}

/// Authoritative guild sub-entities delivered with GUILD_CREATE
#[derive(Debug, Clone, Default)]
pub struct GuildContents {
    pub channels: Vec<Channel>,
    pub roles: Vec<Role>,
    pub emojis: Vec<Emoji>,
    pub voice_states: Vec<VoiceState>,
    pub presences: Vec<Presence>,
}

/// What a cascading guild removal took with it
#[derive(Debug, Clone)]
pub struct RemovedGuild {
    pub guild: Arc<Guild>,
    pub channels: Vec<Arc<Channel>>,
}

/// Table sizes, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub unavailable_guilds: usize,
    pub channels: usize,
    pub users: usize,
    pub messages: usize,
}

/// In-memory cache of remote entities for one shard
#[derive(Debug)]
pub struct EntityCache {
    message_cache_size: usize,
    current_user: RwLock<Option<Arc<User>>>,
    users: DashMap<Snowflake, Arc<User>>,
    guilds: DashMap<Snowflake, Arc<Guild>>,
    guild_tables: DashMap<Snowflake, Arc<GuildTables>>,
    channels: DashMap<Snowflake, Arc<Channel>>,
    messages: DashMap<Snowflake, VecDeque<Arc<Message>>>,
    topology: RwLock<()>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(50)
    }
}

impl EntityCache {
    /// Create a cache retaining up to `message_cache_size` messages per channel
    #[must_use]
    pub fn new(message_cache_size: usize) -> Self {
        Self {
            message_cache_size,
            current_user: RwLock::new(None),
            users: DashMap::new(),
            guilds: DashMap::new(),
            guild_tables: DashMap::new(),
            channels: DashMap::new(),
            messages: DashMap::new(),
            topology: RwLock::new(()),
        }
    }

    /// Create a new cache wrapped in Arc
    #[must_use]
    pub fn new_shared(message_cache_size: usize) -> Arc<Self> {
        Arc::new(Self::new(message_cache_size))
    }

    /// Drop every cached entity (a fresh session starts from scratch)
    pub fn clear(&self) {
        let _topology = self.topology.write();
        *self.current_user.write() = None;
        self.users.clear();
        self.guilds.clear();
        self.guild_tables.clear();
        self.channels.clear();
        self.messages.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            guilds: self.guilds.len(),
            unavailable_guilds: self.guilds.iter().filter(|g| g.unavailable).count(),
            channels: self.channels.len(),
            users: self.users.len(),
            messages: self.messages.iter().map(|ring| ring.len()).sum(),
        }
    }

    fn tables(&self, guild_id: Snowflake) -> CacheResult<Arc<GuildTables>> {
        self.guild_tables
            .get(&guild_id)
            .map(|tables| Arc::clone(tables.value()))
            .ok_or(CacheError::MissingGuild(guild_id))
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// The account this session is authenticated as
    pub fn current_user(&self) -> Option<Arc<User>> {
        self.current_user.read().clone()
    }

    pub fn set_current_user(&self, user: User) -> Arc<User> {
        let user = Arc::new(user);
        self.users.insert(user.id, Arc::clone(&user));
        *self.current_user.write() = Some(Arc::clone(&user));
        user
    }

    pub fn user(&self, id: Snowflake) -> Option<Arc<User>> {
        self.users.get(&id).map(|u| Arc::clone(u.value()))
    }

    pub fn users(&self) -> Vec<Arc<User>> {
        snapshot(&self.users)
    }

    /// Return the cached user, creating it with `make` on first sight
    pub fn get_or_create_user<F>(&self, id: Snowflake, make: F) -> Arc<User>
    where
        F: FnOnce() -> User,
    {
        let entry = self.users.entry(id).or_insert_with(|| Arc::new(make()));
        Arc::clone(entry.value())
    }

    /// Insert or fully replace a user
    pub fn upsert_user(&self, user: User) -> Upsert<User> {
        let current = Arc::new(user);
        let previous = self.users.insert(current.id, Arc::clone(&current));
        self.sync_current_user(&current);
        Upsert { current, previous }
    }

    /// Apply a partial update to a cached user
    pub fn update_user<F>(&self, id: Snowflake, f: F) -> CacheResult<Arc<User>>
    where
        F: FnOnce(&mut User),
    {
        let user = update_in(&self.users, &id, f).ok_or(CacheError::MissingUser(id))?;
        self.sync_current_user(&user);
        Ok(user)
    }

    fn sync_current_user(&self, user: &Arc<User>) {
        let mut current = self.current_user.write();
        if current.as_ref().is_some_and(|c| c.id == user.id) {
            *current = Some(Arc::clone(user));
        }
    }

    // ------------------------------------------------------------------
    // Guilds
    // ------------------------------------------------------------------

    pub fn guild(&self, id: Snowflake) -> Option<Arc<Guild>> {
        self.guilds.get(&id).map(|g| Arc::clone(g.value()))
    }

    pub fn guilds(&self) -> Vec<Arc<Guild>> {
        snapshot(&self.guilds)
    }

    /// Insert or replace a guild, keeping any nested tables it already has
    pub fn insert_guild(&self, guild: Guild) -> Upsert<Guild> {
        let _topology = self.topology.write();
        let current = Arc::new(guild);
        let previous = self.guilds.insert(current.id, Arc::clone(&current));
        self.guild_tables.entry(current.id).or_default();
        Upsert { current, previous }
    }

    pub fn update_guild<F>(&self, id: Snowflake, f: F) -> CacheResult<Arc<Guild>>
    where
        F: FnOnce(&mut Guild),
    {
        update_in(&self.guilds, &id, f).ok_or(CacheError::MissingGuild(id))
    }

    /// Replace channels, roles, emojis, voice states and presences of a guild
    ///
    /// Members are not touched; large guilds stream them separately.
    pub fn replace_guild_contents(
        &self,
        guild_id: Snowflake,
        contents: GuildContents,
    ) -> CacheResult<()> {
        let tables = self.tables(guild_id)?;
        let _topology = self.topology.write();

        let stale: Vec<Snowflake> = tables.channel_ids.iter().map(|id| *id.key()).collect();
        for id in stale {
            if !contents.channels.iter().any(|c| c.id == id) {
                self.channels.remove(&id);
                self.messages.remove(&id);
            }
        }
        tables.channel_ids.clear();
        for mut channel in contents.channels {
            channel.guild_id = Some(guild_id);
            tables.channel_ids.insert(channel.id);
            self.channels.insert(channel.id, Arc::new(channel));
        }

        replace_all(&tables.roles, contents.roles, |r| r.id);
        replace_all(&tables.emojis, contents.emojis, |e| e.id);
        replace_all(
            &tables.voice_states,
            contents
                .voice_states
                .into_iter()
                .filter(VoiceState::is_connected)
                .collect(),
            |v| v.user_id,
        );
        replace_all(&tables.presences, contents.presences, |p| p.user_id);
        Ok(())
    }

    /// Remove a guild and everything nested under it
    pub fn remove_guild(&self, guild_id: Snowflake) -> Option<RemovedGuild> {
        let _topology = self.topology.write();
        let (_, guild) = self.guilds.remove(&guild_id)?;

        let mut channels = Vec::new();
        if let Some((_, tables)) = self.guild_tables.remove(&guild_id) {
            let ids: Vec<Snowflake> = tables.channel_ids.iter().map(|id| *id.key()).collect();
            for id in ids {
                if let Some((_, channel)) = self.channels.remove(&id) {
                    channels.push(channel);
                }
                self.messages.remove(&id);
            }
        }

        Some(RemovedGuild { guild, channels })
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    pub fn channel(&self, id: Snowflake) -> Option<Arc<Channel>> {
        self.channels.get(&id).map(|c| Arc::clone(c.value()))
    }

    /// Channels of one guild, copied out under the topology read lock
    pub fn guild_channels(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<Channel>>> {
        let _topology = self.topology.read();
        let tables = self.tables(guild_id)?;
        Ok(tables
            .channel_ids
            .iter()
            .filter_map(|id| self.channel(*id.key()))
            .collect())
    }

    /// DM and group DM channels
    pub fn private_channels(&self) -> Vec<Arc<Channel>> {
        self.channels
            .iter()
            .filter(|c| c.guild_id.is_none())
            .map(|c| Arc::clone(c.value()))
            .collect()
    }

    /// Insert or replace a channel; a guild channel needs its guild cached
    pub fn upsert_channel(&self, channel: Channel) -> CacheResult<Upsert<Channel>> {
        let _topology = self.topology.write();
        let tables = channel.guild_id.map(|id| self.tables(id)).transpose()?;

        let current = Arc::new(channel);
        let previous = self.channels.insert(current.id, Arc::clone(&current));
        if let Some(tables) = tables {
            tables.channel_ids.insert(current.id);
        }
        Ok(Upsert { current, previous })
    }

    pub fn update_channel<F>(&self, id: Snowflake, f: F) -> CacheResult<Arc<Channel>>
    where
        F: FnOnce(&mut Channel),
    {
        update_in(&self.channels, &id, f).ok_or(CacheError::MissingChannel(id))
    }

    /// Remove a channel, its guild index entry and its cached messages
    pub fn remove_channel(&self, id: Snowflake) -> Option<Arc<Channel>> {
        let _topology = self.topology.write();
        let (_, channel) = self.channels.remove(&id)?;
        if let Some(tables) = channel.guild_id.and_then(|gid| self.guild_tables.get(&gid)) {
            tables.channel_ids.remove(&id);
        }
        self.messages.remove(&id);
        Some(channel)
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Arc<GuildMember>> {
        let tables = self.tables(guild_id).ok()?;
        let member = tables.members.get(&user_id)?;
        Some(Arc::clone(member.value()))
    }

    pub fn members(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<GuildMember>>> {
        Ok(snapshot(&self.tables(guild_id)?.members))
    }

    /// The shared user a member refers to
    pub fn member_user(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Arc<User>> {
        self.member(guild_id, user_id)
            .and_then(|member| self.user(member.user_id))
    }

    /// Insert or replace a member; its user must already be cached
    pub fn upsert_member(&self, member: GuildMember) -> CacheResult<Upsert<GuildMember>> {
        let tables = self.tables(member.guild_id)?;
        if !self.users.contains_key(&member.user_id) {
            return Err(CacheError::MissingUser(member.user_id));
        }
        let current = Arc::new(member);
        let previous = tables.members.insert(current.user_id, Arc::clone(&current));
        Ok(Upsert { current, previous })
    }

    pub fn update_member<F>(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        f: F,
    ) -> CacheResult<Arc<GuildMember>>
    where
        F: FnOnce(&mut GuildMember),
    {
        let tables = self.tables(guild_id)?;
        update_in(&tables.members, &user_id, f)
            .ok_or(CacheError::MissingMember { guild_id, user_id })
    }

    /// Remove a member together with its presence
    pub fn remove_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> CacheResult<Option<Arc<GuildMember>>> {
        let tables = self.tables(guild_id)?;
        tables.presences.remove(&user_id);
        Ok(tables.members.remove(&user_id).map(|(_, member)| member))
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    pub fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Arc<Role>> {
        let tables = self.tables(guild_id).ok()?;
        let role = tables.roles.get(&role_id)?;
        Some(Arc::clone(role.value()))
    }

    pub fn roles(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<Role>>> {
        Ok(snapshot(&self.tables(guild_id)?.roles))
    }

    pub fn upsert_role(&self, role: Role) -> CacheResult<Upsert<Role>> {
        let tables = self.tables(role.guild_id)?;
        let current = Arc::new(role);
        let previous = tables.roles.insert(current.id, Arc::clone(&current));
        Ok(Upsert { current, previous })
    }

    /// Remove a role and strip it from every member holding it
    pub fn remove_role(
        &self,
        guild_id: Snowflake,
        role_id: Snowflake,
    ) -> CacheResult<Option<Arc<Role>>> {
        let tables = self.tables(guild_id)?;
        let removed = tables.roles.remove(&role_id).map(|(_, role)| role);

        let holders: Vec<Snowflake> = tables
            .members
            .iter()
            .filter(|m| m.has_role(role_id))
            .map(|m| *m.key())
            .collect();
        for user_id in holders {
            update_in(&tables.members, &user_id, |m| {
                m.remove_role(role_id);
            });
        }

        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Emojis
    // ------------------------------------------------------------------

    pub fn emojis(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<Emoji>>> {
        Ok(snapshot(&self.tables(guild_id)?.emojis))
    }

    /// Emoji updates always carry the complete list
    pub fn replace_emojis(
        &self,
        guild_id: Snowflake,
        emojis: Vec<Emoji>,
    ) -> CacheResult<Vec<Arc<Emoji>>> {
        let tables = self.tables(guild_id)?;
        Ok(replace_all(&tables.emojis, emojis, |e| e.id))
    }

    // ------------------------------------------------------------------
    // Voice states
    // ------------------------------------------------------------------

    pub fn voice_state(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Arc<VoiceState>> {
        let tables = self.tables(guild_id).ok()?;
        let state = tables.voice_states.get(&user_id)?;
        Some(Arc::clone(state.value()))
    }

    pub fn voice_states(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<VoiceState>>> {
        Ok(snapshot(&self.tables(guild_id)?.voice_states))
    }

    /// Record a voice state; one without a channel removes the entry
    pub fn update_voice_state(&self, state: VoiceState) -> CacheResult<Upsert<VoiceState>> {
        let tables = self.tables(state.guild_id)?;
        let current = Arc::new(state);
        let previous = if current.is_connected() {
            tables.voice_states.insert(current.user_id, Arc::clone(&current))
        } else {
            tables.voice_states.remove(&current.user_id).map(|(_, s)| s)
        };
        Ok(Upsert { current, previous })
    }

    // ------------------------------------------------------------------
    // Presences
    // ------------------------------------------------------------------

    pub fn presence(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Arc<Presence>> {
        let tables = self.tables(guild_id).ok()?;
        let presence = tables.presences.get(&user_id)?;
        Some(Arc::clone(presence.value()))
    }

    pub fn presences(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<Presence>>> {
        Ok(snapshot(&self.tables(guild_id)?.presences))
    }

    /// Apply a partial presence update, starting from "offline" if unseen
    pub fn update_presence<F>(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        f: F,
    ) -> CacheResult<Arc<Presence>>
    where
        F: FnOnce(&mut Presence),
    {
        let tables = self.tables(guild_id)?;
        let mut entry = tables
            .presences
            .entry(user_id)
            .or_insert_with(|| Arc::new(Presence::new(guild_id, user_id)));
        let mut next = (**entry).clone();
        f(&mut next);
        let next = Arc::new(next);
        *entry = Arc::clone(&next);
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn message(&self, channel_id: Snowflake, message_id: Snowflake) -> Option<Arc<Message>> {
        let ring = self.messages.get(&channel_id)?;
        ring.iter().find(|m| m.id == message_id).cloned()
    }

    /// Cached messages of a channel, oldest first
    pub fn messages(&self, channel_id: Snowflake) -> Vec<Arc<Message>> {
        self.messages
            .get(&channel_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Add a message to its channel's ring, evicting the oldest beyond capacity
    pub fn push_message(&self, message: Message) -> Arc<Message> {
        let message = Arc::new(message);

        if self.message_cache_size > 0 {
            let mut ring = self.messages.entry(message.channel_id).or_default();
            if let Some(slot) = ring.iter_mut().find(|m| m.id == message.id) {
                *slot = Arc::clone(&message);
            } else {
                ring.push_back(Arc::clone(&message));
                while ring.len() > self.message_cache_size {
                    ring.pop_front();
                }
            }
        }

        update_in(&self.channels, &message.channel_id, |c| {
            c.last_message_id = Some(message.id);
        });
        message
    }

    pub fn update_message<F>(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        f: F,
    ) -> Option<Arc<Message>>
    where
        F: FnOnce(&mut Message),
    {
        let mut ring = self.messages.get_mut(&channel_id)?;
        let slot = ring.iter_mut().find(|m| m.id == message_id)?;
        let mut next = (**slot).clone();
        f(&mut next);
        let next = Arc::new(next);
        *slot = Arc::clone(&next);
        Some(next)
    }

    pub fn remove_message(&self, channel_id: Snowflake, message_id: Snowflake) -> Option<Arc<Message>> {
        let mut ring = self.messages.get_mut(&channel_id)?;
        let pos = ring.iter().position(|m| m.id == message_id)?;
        ring.remove(pos)
    }
}
