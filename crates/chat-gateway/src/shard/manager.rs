//! Shard manager
//!
//! Runs several shards of one bot in a single process. Shards share the
//! endpoint cache and the identify limiter; everything else is per shard.

use std::sync::Arc;

use chat_common::{BotConfig, CacheConfig, ShardConfig};
use chat_core::Snowflake;
use tokio_util::sync::CancellationToken;

use super::ShardConnection;
use crate::connection::{GatewayEndpoint, RateLimiter, SessionConfig};
use crate::error::GatewayResult;

/// Owns the shards `first..total` of a bot
pub struct ShardManager {
    total_shards: u32,
    shards: Vec<Arc<ShardConnection>>,
    endpoint: Arc<GatewayEndpoint>,
}

impl ShardManager {
    /// Create every shard from `shards.id` up to `shards.count`
    pub fn new(
        bot: &BotConfig,
        shards: ShardConfig,
        endpoint: Arc<GatewayEndpoint>,
        cache: &CacheConfig,
    ) -> Self {
        let identify_limiter = Arc::new(RateLimiter::identify());
        let total_shards = shards.count.max(1);

        let shards = (shards.id..total_shards)
            .map(|id| {
                let config = SessionConfig {
                    token: bot.token.clone(),
                    intents: bot.intents,
                    large_threshold: bot.large_threshold,
                    shard: ShardConfig {
                        id,
                        count: total_shards,
                    },
                };
                Arc::new(ShardConnection::new(
                    config,
                    Arc::clone(&endpoint),
                    Arc::clone(&identify_limiter),
                    cache,
                ))
            })
            .collect();

        Self {
            total_shards,
            shards,
            endpoint,
        }
    }

    pub fn total_shards(&self) -> u32 {
        self.total_shards
    }

    pub fn endpoint(&self) -> &Arc<GatewayEndpoint> {
        &self.endpoint
    }

    /// Shards run by this manager, in ID order
    pub fn shards(&self) -> &[Arc<ShardConnection>] {
        &self.shards
    }

    pub fn shard(&self, id: u32) -> Option<&Arc<ShardConnection>> {
        self.shards.iter().find(|shard| shard.shard().id == id)
    }

    /// Shard the gateway routes a guild's events to
    #[must_use]
    pub fn shard_id_for_guild(&self, guild_id: Snowflake) -> u32 {
        shard_id_for(guild_id, self.total_shards)
    }

    /// `None` if that shard is run by another process
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> Option<&Arc<ShardConnection>> {
        self.shard(self.shard_id_for_guild(guild_id))
    }

    /// Connect every shard in turn
    ///
    /// Identifies are spaced by the shared limiter, so this takes at least
    /// five seconds per shard after the first. Stops at the first error.
    pub async fn connect_all(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        for shard in &self.shards {
            let id = shard.shard().id;
            tracing::info!(shard_id = id, total_shards = self.total_shards, "Connecting shard");
            if let Err(err) = shard.connect(cancel).await {
                tracing::error!(shard_id = id, error = %err, "Shard failed to connect");
                return Err(err);
            }
        }
        Ok(())
    }

    pub async fn disconnect_all(&self) {
        futures::future::join_all(self.shards.iter().map(|shard| shard.disconnect())).await;
        tracing::info!(shards = self.shards.len(), "All shards disconnected");
    }
}

impl std::fmt::Debug for ShardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("total_shards", &self.total_shards)
            .field("shards", &self.shards)
            .finish_non_exhaustive()
    }
}

fn shard_id_for(guild_id: Snowflake, total_shards: u32) -> u32 {
    // a u32 modulus always fits back into u32
    ((guild_id.get() >> 22) % u64::from(total_shards.max(1))) as u32
}
