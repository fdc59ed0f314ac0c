//! Configuration structs

mod app_config;

pub use app_config::{
    ApiConfig, AppSettings, BotConfig, CacheConfig, ClientConfig, ConfigError, Environment,
    GatewayConfig, ShardConfig, StorageConfig,
};
