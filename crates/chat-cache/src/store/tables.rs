//! Guild-scoped tables and the copy-on-write update helper

use std::hash::Hash;
use std::sync::Arc;

use chat_core::{Emoji, GuildMember, Presence, Role, Snowflake, VoiceState};
use dashmap::{DashMap, DashSet};

/// Nested tables owned by one guild, keyed by the child ID
#[derive(Debug, Default)]
pub(crate) struct GuildTables {
    pub members: DashMap<Snowflake, Arc<GuildMember>>,
    pub roles: DashMap<Snowflake, Arc<Role>>,
    pub emojis: DashMap<Snowflake, Arc<Emoji>>,
    pub voice_states: DashMap<Snowflake, Arc<VoiceState>>,
    pub presences: DashMap<Snowflake, Arc<Presence>>,
    /// Index into the global channel table
    pub channel_ids: DashSet<Snowflake>,
}

/// Replace the snapshot at `key` with a modified copy
///
/// The shard lock is held only for the clone + swap; readers holding the old
/// `Arc` keep seeing the old value.
pub(crate) fn update_in<K, T, F>(table: &DashMap<K, Arc<T>>, key: &K, f: F) -> Option<Arc<T>>
where
    K: Eq + Hash,
    T: Clone,
    F: FnOnce(&mut T),
{
    let mut entry = table.get_mut(key)?;
    let mut next = (**entry).clone();
    f(&mut next);
    let next = Arc::new(next);
    *entry = Arc::clone(&next);
    Some(next)
}

/// Copy out every value of a table
pub(crate) fn snapshot<K, T>(table: &DashMap<K, Arc<T>>) -> Vec<Arc<T>>
where
    K: Eq + Hash,
{
    table.iter().map(|entry| Arc::clone(entry.value())).collect()
}

/// Swap the whole content of a table for `items`
pub(crate) fn replace_all<T>(
    table: &DashMap<Snowflake, Arc<T>>,
    items: Vec<T>,
    key: impl Fn(&T) -> Snowflake,
) -> Vec<Arc<T>> {
    table.clear();
    items
        .into_iter()
        .map(|item| {
            let item = Arc::new(item);
            table.insert(key(&item), Arc::clone(&item));
            item
        })
        .collect()
}
