//! Redis connection pool management.

use crmdesk_core::StoreError;
use redis::aio::ConnectionManager;
use thiserror::Error;

/// Redis error types.
#[derive(Error, Debug)]
pub enum RedisError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for Redis operations.
pub type RedisResult<T> = Result<T, RedisError>;

/// Redis connection pool. `ConnectionManager` multiplexes internally and is
/// Clone, so callers clone it to get a mutable handle for each operation.
pub type RedisPool = ConnectionManager;

/// Initialize a Redis connection pool from a URL.
///
/// Example URL: `redis://127.0.0.1:6379`
pub async fn init_pool(redis_url: &str) -> RedisResult<RedisPool> {
    let client = redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        match err {
            RedisError::Connection(e) if e.is_io_error() || e.is_timeout() => StoreError::Transport(e.to_string()),
            RedisError::Connection(e) => StoreError::Backend(e.to_string()),
            RedisError::Serialization(e) => StoreError::Decode(e.to_string()),
            RedisError::Corrupt(msg) => StoreError::Decode(msg),
            RedisError::NotFound(what) => StoreError::NotFound(what),
            RedisError::Conflict(what) => StoreError::Conflict(what),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_store_not_found() {
        let err: StoreError = RedisError::NotFound("deal d1".into()).into();
        assert_eq!(err, StoreError::NotFound("deal d1".into()));
    }

    #[test]
    fn test_conflict_maps_to_store_conflict() {
        let err: StoreError = RedisError::Conflict("deal d1".into()).into();
        assert_eq!(err, StoreError::Conflict("deal d1".into()));
    }

    #[test]
    fn test_bad_json_maps_to_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = RedisError::Serialization(json_err).into();
        assert!(matches!(err, StoreError::Decode(_)));
    }
}
