//! # chat-cache
//!
//! In-memory cache of remote entities kept in sync by gateway dispatch events.
//!
//! ## Example
//!
//! ```
//! use chat_cache::EntityCache;
//! use chat_core::{Guild, Snowflake};
//!
//! let cache = EntityCache::new(50);
//! cache.insert_guild(Guild::unavailable(Snowflake::new(10)));
//!
//! let guild = cache.guild(Snowflake::new(10)).unwrap();
//! assert!(!guild.is_available());
//! ```

pub mod error;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use store::{CacheStats, EntityCache, GuildContents, RemovedGuild, Upsert};
