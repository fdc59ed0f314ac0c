//! Handler error types

use chat_cache::CacheError;
use thiserror::Error;

/// Why a single dispatch event could not be applied
///
/// Neither variant tears down the connection; the event is logged and skipped.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload did not match the expected shape
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// A field the cache needs was absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The event references an entity whose parent is not cached
    #[error("Cache consistency error: {0}")]
    Cache(#[from] CacheError),
}

impl HandlerError {
    /// Whether this points at a missed event or an ordering bug
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, Self::Cache(_))
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
