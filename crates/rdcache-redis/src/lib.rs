//! Redis backend for rdcache.
//!
//! [`RedisBackend`] implements every shape of the backend contract over the
//! synchronous `redis` client, and [`ConnectionRegistry`] hands out one shared
//! backend per configured connection name.

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod registry;

pub use backend::RedisBackend;
pub use config::ConnectionConfig;
pub use error::{RedisError, RedisResult};
pub use registry::{ConnectionRegistry, DEFAULT_CONNECTION};
