//! Redis backend implementation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rdcache_core::{Backend, BackendError, BackendResult, Options, RangeReply};
use redis::Commands;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::backend_error;

/// Backend over a Redis server, one connection per operation.
pub struct RedisBackend {
    client: redis::Client,
    prefix: Option<String>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Create a backend for `url`. Does not connect until first use.
    pub fn new(url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            prefix: None,
        })
    }

    /// Create a backend from connection settings.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(config.connection_info()?)?,
            prefix: config.prefix.clone().filter(|p| !p.is_empty()),
        })
    }

    /// Key prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Build a full key with prefix.
    pub fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }

    /// Get a Redis connection.
    fn connection(&self) -> BackendResult<redis::Connection> {
        self.client
            .get_connection()
            .map_err(|e| BackendError::Connection(e.to_string()))
    }
}

fn score_bound(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

impl Backend for RedisBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.get(self.key(key)).map_err(backend_error)?;
        debug!(key = key, hit = value.is_some(), "Redis get");
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, options: &Options) -> BackendResult<()> {
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.key(key)).arg(value);
        if let Some(seconds) = options.time.filter(|t| *t > 0) {
            cmd.arg("EX").arg(seconds);
        }
        cmd.query::<()>(&mut conn).map_err(backend_error)?;
        debug!(key = key, ttl_secs = ?options.time, "Redis set");
        Ok(())
    }

    fn exists(&self, key: &str) -> BackendResult<bool> {
        let mut conn = self.connection()?;
        conn.exists(self.key(key)).map_err(backend_error)
    }

    fn expire(&self, key: &str, seconds: i64) -> BackendResult<bool> {
        let mut conn = self.connection()?;
        let mut cmd = if seconds < 0 {
            redis::cmd("PERSIST")
        } else {
            redis::cmd("EXPIRE")
        };
        cmd.arg(self.key(key));
        if seconds >= 0 {
            cmd.arg(seconds);
        }
        let applied: bool = cmd.query(&mut conn).map_err(backend_error)?;
        debug!(key = key, ttl_secs = seconds, applied = applied, "Redis expire");
        Ok(applied)
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        let mut conn = self.connection()?;
        let removed: usize = conn.del(self.key(key)).map_err(backend_error)?;
        debug!(key = key, removed = removed, "Redis del");
        Ok(removed > 0)
    }

    fn hgetall(&self, key: &str) -> BackendResult<BTreeMap<String, String>> {
        let mut conn = self.connection()?;
        conn.hgetall(self.key(key)).map_err(backend_error)
    }

    fn hset_many(&self, key: &str, fields: &BTreeMap<String, String>) -> BackendResult<()> {
        let mut conn = self.connection()?;
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        conn.hset_multiple::<_, _, _, ()>(self.key(key), &items)
            .map_err(backend_error)
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> BackendResult<Vec<String>> {
        let mut conn = self.connection()?;
        conn.lrange(self.key(key), start, stop).map_err(backend_error)
    }

    fn ltrim(&self, key: &str, start: isize, stop: isize) -> BackendResult<()> {
        let mut conn = self.connection()?;
        conn.ltrim::<_, ()>(self.key(key), start, stop)
            .map_err(backend_error)
    }

    fn rpush(&self, key: &str, value: &str) -> BackendResult<usize> {
        let mut conn = self.connection()?;
        conn.rpush(self.key(key), value).map_err(backend_error)
    }

    fn llen(&self, key: &str) -> BackendResult<usize> {
        let mut conn = self.connection()?;
        conn.llen(self.key(key)).map_err(backend_error)
    }

    fn sunion(&self, keys: &[&str]) -> BackendResult<BTreeSet<String>> {
        let mut conn = self.connection()?;
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let members: HashSet<String> = conn.sunion(keys).map_err(backend_error)?;
        Ok(members.into_iter().collect())
    }

    fn sadd(&self, key: &str, member: &str) -> BackendResult<usize> {
        let mut conn = self.connection()?;
        conn.sadd(self.key(key), member).map_err(backend_error)
    }

    fn zrangebyscore(
        &self,
        key: &str,
        min: f64,
        max: f64,
        options: &Options,
    ) -> BackendResult<RangeReply> {
        let mut conn = self.connection()?;
        let (min, max) = (score_bound(min), score_bound(max));
        if options.is_withscores() {
            let members: Vec<(String, f64)> = conn
                .zrangebyscore_withscores(self.key(key), min, max)
                .map_err(backend_error)?;
            Ok(RangeReply::WithScores(members))
        } else {
            let members: Vec<String> = conn
                .zrangebyscore(self.key(key), min, max)
                .map_err(backend_error)?;
            Ok(RangeReply::Members(members))
        }
    }

    fn zadd(&self, key: &str, score: f64, member: &str) -> BackendResult<usize> {
        let mut conn = self.connection()?;
        conn.zadd(self.key(key), member, score).map_err(backend_error)
    }
}
