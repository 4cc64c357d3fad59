//! Configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use rdcache_core::{Backend, Cache, Options, Value, ValueCodec};
use rdcache_log::LogConfig;
use rdcache_redis::{ConnectionConfig, ConnectionRegistry, RedisResult, DEFAULT_CONNECTION};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdcacheConfig {
    /// Cache behavior.
    pub cache: CacheSettings,
    /// Named Redis connections.
    pub connections: HashMap<String, ConnectionConfig>,
    /// Logging.
    pub log: LogConfig,
}

impl RdcacheConfig {
    /// Registry over the configured connections.
    pub fn registry(&self) -> ConnectionRegistry {
        ConnectionRegistry::new(self.connections.clone())
    }

    /// Cache over the connection named in `cache.connection`.
    pub fn redis_cache(&self, registry: &ConnectionRegistry) -> RedisResult<Cache> {
        let backend = registry.get(&self.cache.connection)?;
        Ok(self.cache.build(backend))
    }
}

/// Cache behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Talk to the backend at all.
    pub enabled: bool,
    /// Store string-shaped values as JSON documents.
    pub json: bool,
    /// Serialize compute-and-store per key.
    pub key_locks: bool,
    /// Registry name of the connection to use.
    pub connection: String,
    /// Options applied under every call.
    pub defaults: Options,
    /// Value wrappers return from `cached()` on a miss.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            json: true,
            key_locks: false,
            connection: DEFAULT_CONNECTION.to_string(),
            defaults: Options::default(),
            default: None,
        }
    }
}

impl CacheSettings {
    /// Build a cache over `backend` with these settings.
    pub fn build(&self, backend: Arc<dyn Backend>) -> Cache {
        let builder = Cache::builder(backend)
            .enabled(self.enabled)
            .codec(ValueCodec::new().with_json(self.json))
            .options(self.defaults.clone())
            .key_locks(self.key_locks);
        match &self.default {
            Some(default) => builder.default_value(Value::from(default.clone())),
            None => builder,
        }
        .build()
    }
}
