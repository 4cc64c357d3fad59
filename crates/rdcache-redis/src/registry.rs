//! Named connection registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::backend::RedisBackend;
use crate::config::ConnectionConfig;
use crate::error::{RedisError, RedisResult};

/// Name used when none is given.
pub const DEFAULT_CONNECTION: &str = "default";

/// Lazily opened, shared Redis backends keyed by name.
///
/// Names without settings connect with [`ConnectionConfig::default`].
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    configs: HashMap<String, ConnectionConfig>,
    connections: RwLock<HashMap<String, Arc<RedisBackend>>>,
}

impl ConnectionRegistry {
    /// Create a registry over named settings.
    pub fn new(configs: HashMap<String, ConnectionConfig>) -> Self {
        Self {
            configs,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a backend for `name` has been opened.
    pub fn contains(&self, name: &str) -> bool {
        self.connections.read().contains_key(name)
    }

    /// Settings for `name`, defaults when unconfigured.
    pub fn config(&self, name: &str) -> ConnectionConfig {
        self.configs.get(name).cloned().unwrap_or_default()
    }

    /// Backend for `name`, opening it on first use.
    pub fn get(&self, name: &str) -> RedisResult<Arc<RedisBackend>> {
        if let Some(backend) = self.connections.read().get(name) {
            return Ok(backend.clone());
        }

        let config = self.config(name);
        let backend = RedisBackend::from_config(&config)
            .map(Arc::new)
            .map_err(|source| RedisError::Open {
                name: name.to_string(),
                source,
            })?;
        debug!(name = name, host = %config.host, port = config.port, db = config.db, "Redis connection registered");

        self.connections
            .write()
            .insert(name.to_string(), backend.clone());
        Ok(backend)
    }

    /// Backend for [`DEFAULT_CONNECTION`].
    pub fn default_backend(&self) -> RedisResult<Arc<RedisBackend>> {
        self.get(DEFAULT_CONNECTION)
    }
}
