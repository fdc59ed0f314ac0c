//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use std::env;
use std::path::PathBuf;

use chat_core::Intents;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub bot: BotConfig,
    pub shard: ShardConfig,
    pub gateway: GatewayConfig,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Credentials and Identify options
#[derive(Clone)]
pub struct BotConfig {
    pub token: String,
    pub intents: Intents,
    pub large_threshold: Option<u32>,
}

// The token never ends up in logs
impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("large_threshold", &self.large_threshold)
            .finish()
    }
}

/// Shard identity: this process runs shards `id..` out of `count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardConfig {
    pub id: u32,
    pub count: u32,
}

impl ShardConfig {
    pub const SINGLE: ShardConfig = ShardConfig { id: 0, count: 1 };

    pub fn new(id: u32, count: u32) -> Result<Self, ConfigError> {
        if count == 0 || id >= count {
            return Err(ConfigError::InvalidValue(
                "SHARD_ID",
                format!("shard {id} out of range for {count} shard(s)"),
            ));
        }
        Ok(Self { id, count })
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Fixed gateway URL; when unset it is resolved through the REST API
    pub url_override: Option<String>,
    pub version: u8,
}

/// REST API settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

/// In-memory cache sizing
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Messages retained per channel
    pub message_cache_size: usize,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            message_cache_size: default_message_cache_size(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Local persisted state
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub settings_path: Option<PathBuf>,
}

// Default value functions
fn default_app_name() -> String {
    "chat-gateway-client".to_string()
}

fn default_gateway_version() -> u8 {
    6
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v6".to_string()
}

fn default_message_cache_size() -> usize {
    50
}

fn default_event_buffer() -> usize {
    1024
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `BOT_TOKEN` is missing or a value cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let shard = ShardConfig::new(
            parse_or(&lookup, "SHARD_ID", 0)?,
            parse_or(&lookup, "SHARD_COUNT", 1)?,
        )?;

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            bot: BotConfig {
                token: lookup("BOT_TOKEN")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(ConfigError::MissingVar("BOT_TOKEN"))?,
                intents: match parse_opt::<u64, _>(&lookup, "GATEWAY_INTENTS")? {
                    Some(bits) => Intents::from_bits_truncate(bits),
                    None => Intents::default(),
                },
                large_threshold: parse_opt(&lookup, "GATEWAY_LARGE_THRESHOLD")?,
            },
            shard,
            gateway: GatewayConfig {
                url_override: lookup("GATEWAY_URL").filter(|s| !s.is_empty()),
                version: parse_or(&lookup, "GATEWAY_VERSION", default_gateway_version())?,
            },
            api: ApiConfig {
                base_url: lookup("API_BASE_URL").unwrap_or_else(default_api_base_url),
            },
            cache: CacheConfig {
                message_cache_size: parse_or(
                    &lookup,
                    "MESSAGE_CACHE_SIZE",
                    default_message_cache_size(),
                )?,
                event_buffer: parse_or(&lookup, "EVENT_BUFFER", default_event_buffer())?,
            },
            storage: StorageConfig {
                settings_path: lookup("SETTINGS_PATH").map(PathBuf::from),
            },
        })
    }
}

fn parse_opt<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw.clone()))
        })
        .transpose()
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
