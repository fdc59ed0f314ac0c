//! Shards: the consumer-facing side of the gateway

mod connection;
mod manager;

pub use connection::ShardConnection;
pub use manager::ShardManager;
