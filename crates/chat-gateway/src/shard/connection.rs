//! Consumer-facing shard connection
//!
//! Pairs one [`GatewaySession`] with the [`EntityCache`] its dispatch events
//! keep in sync, and republishes what the handlers return on a broadcast
//! channel.

use std::sync::Arc;
use std::time::Duration;

use chat_cache::EntityCache;
use chat_common::{CacheConfig, ShardConfig};
use chat_core::Snowflake;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::connection::{
    ConnectionState, GatewayEndpoint, GatewaySession, RateLimiter, SessionConfig, SessionListener,
};
use crate::error::{ConnectionFailure, GatewayResult};
use crate::events::ShardEvent;
use crate::handlers::EventDispatcher;
use crate::protocol::{
    GatewayMessage, OpCode, RequestGuildMembersPayload, StatusUpdatePayload,
    VoiceStateUpdatePayload,
};

/// Applies dispatches to the cache and fans the results out
struct EventSink {
    cache: Arc<EntityCache>,
    events: broadcast::Sender<ShardEvent>,
}

impl EventSink {
    fn publish(&self, event: ShardEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }
}

impl SessionListener for EventSink {
    fn on_dispatch(&self, event: &str, data: Value) {
        for event in EventDispatcher::handle(&self.cache, event, data) {
            self.publish(event);
        }
    }

    fn on_reconnected(&self) {
        self.publish(ShardEvent::Reconnected);
    }

    fn on_failed(&self, failure: &ConnectionFailure) {
        self.publish(ShardEvent::Failed(failure.clone()));
    }
}

/// One shard of the event stream
pub struct ShardConnection {
    shard: ShardConfig,
    session: GatewaySession,
    cache: Arc<EntityCache>,
    events: broadcast::Sender<ShardEvent>,
    status_limiter: RateLimiter,
}

impl ShardConnection {
    /// Build a shard; nothing is opened until [`connect`](Self::connect)
    ///
    /// `identify_limiter` is shared by every shard using the same token.
    pub fn new(
        config: SessionConfig,
        endpoint: Arc<GatewayEndpoint>,
        identify_limiter: Arc<RateLimiter>,
        cache_config: &CacheConfig,
    ) -> Self {
        let shard = config.shard;
        let cache = EntityCache::new_shared(cache_config.message_cache_size);
        let (events, _) = broadcast::channel(cache_config.event_buffer.max(1));

        let sink = Arc::new(EventSink {
            cache: Arc::clone(&cache),
            events: events.clone(),
        });
        let session = GatewaySession::new(config, endpoint, identify_limiter, sink);

        Self {
            shard,
            session,
            cache,
            events,
            status_limiter: RateLimiter::status_update(),
        }
    }

    pub fn shard(&self) -> ShardConfig {
        self.shard
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.session.subscribe_state()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.session_id()
    }

    pub fn latency(&self) -> Option<Duration> {
        self.session.latency()
    }

    pub fn failure(&self) -> Option<ConnectionFailure> {
        self.session.failure()
    }

    /// Connect and wait until the session is ready
    pub async fn connect(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        self.session.connect(cancel).await
    }

    /// Close the connection; the cache is kept until the next Ready
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Change the bot's status and activity
    ///
    /// Also counts against the status limiter of 5 per minute.
    pub async fn update_status(
        &self,
        status: StatusUpdatePayload,
        cancel: &CancellationToken,
    ) -> GatewayResult<()> {
        let message = GatewayMessage::command(OpCode::StatusUpdate, &status)?;
        self.session
            .send_command(&message, Some(&self.status_limiter), cancel)
            .await
    }

    /// Ask for members of a guild; they arrive as
    /// [`ShardEvent::MembersChunk`] events
    pub async fn request_guild_members(
        &self,
        guild_id: Snowflake,
        query: impl Into<String>,
        limit: u32,
        cancel: &CancellationToken,
    ) -> GatewayResult<()> {
        let payload = RequestGuildMembersPayload {
            guild_id,
            query: query.into(),
            limit,
        };
        let message = GatewayMessage::command(OpCode::RequestGuildMembers, &payload)?;
        self.session.send_command(&message, None, cancel).await
    }

    /// Join, move between or leave voice channels
    pub async fn update_voice_state(
        &self,
        voice: VoiceStateUpdatePayload,
        cancel: &CancellationToken,
    ) -> GatewayResult<()> {
        let message = GatewayMessage::command(OpCode::VoiceStateUpdate, &voice)?;
        self.session.send_command(&message, None, cancel).await
    }
}

impl std::fmt::Debug for ShardConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardConnection")
            .field("shard", &self.shard)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
