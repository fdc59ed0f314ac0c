//! # chat-common
//!
//! Shared utilities: client configuration, telemetry and the local settings store.

pub mod config;
pub mod storage;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    ApiConfig, AppSettings, BotConfig, CacheConfig, ClientConfig, ConfigError, Environment,
    GatewayConfig, ShardConfig, StorageConfig,
};
pub use storage::{SettingsError, SettingsStore};
pub use telemetry::{try_init_tracing, TracingConfig, TracingError};
