//! Entity tables

mod entity_cache;
mod tables;

pub use entity_cache::{CacheStats, EntityCache, GuildContents, RemovedGuild, Upsert};
