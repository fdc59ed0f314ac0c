//! # chat-gateway
//!
//! Client side of the chat platform's streaming gateway: a resumable
//! WebSocket session per shard, a cache kept in sync by dispatch events, and
//! a typed event stream for consumers.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chat_common::ClientConfig;
//! use chat_gateway::{GatewayEndpoint, ShardManager};
//! use chat_http::RestClient;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let rest = RestClient::new(&config.api.base_url, &config.bot.token)?;
//! let endpoint = Arc::new(GatewayEndpoint::new(Arc::new(rest), config.gateway.version));
//!
//! let manager = ShardManager::new(&config.bot, config.shard, endpoint, &config.cache);
//! let mut events = manager.shards()[0].subscribe();
//! manager.connect_all(&CancellationToken::new()).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod shard;

pub use connection::{ConnectionState, GatewayEndpoint, GatewaySession, RateLimiter};
pub use error::{ConnectionFailure, FailureReason, GatewayError, GatewayResult};
pub use events::{GatewayEventType, ShardEvent};
pub use shard::{ShardConnection, ShardManager};
