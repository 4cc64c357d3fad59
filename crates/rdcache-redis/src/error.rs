//! Error types for Redis connections.

use rdcache_core::BackendError;
use thiserror::Error;

/// Result of opening a connection.
pub type RedisResult<T> = Result<T, RedisError>;

/// Failures opening a Redis connection.
#[derive(Debug, Error)]
pub enum RedisError {
    /// The client could not be built from the connection settings.
    #[error("invalid connection `{name}`: {source}")]
    Open {
        /// Registry name of the connection.
        name: String,
        /// Client error.
        #[source]
        source: redis::RedisError,
    },
}

/// Translate a client error into a backend failure.
pub(crate) fn backend_error(err: redis::RedisError) -> BackendError {
    if err.code() == Some("WRONGTYPE") {
        BackendError::WrongType
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Command(err.to_string())
    }
}
