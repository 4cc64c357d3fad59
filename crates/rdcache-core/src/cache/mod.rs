//! The cache orchestrator.
//!
//! A [`Cache`] owns the codec, key formatter, backend adapter and handler
//! table. Reads and writes pick a handler by the `type` option, so the same
//! cache can keep plain strings, JSON documents, hashes, lists, sets and
//! sorted sets side by side.

pub mod handlers;
pub mod stats;

pub use handlers::{
    HandlerTable, HashHandler, ListHandler, SetHandler, ShapeHandler, SortedHandler,
    StringHandler,
};
pub use stats::CacheStats;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::{BackendAdapter, Operation};
use crate::backend::Backend;
use crate::codec::ValueCodec;
use crate::error::{CacheError, CacheResult};
use crate::keys::KeyFormatter;
use crate::locks::KeyLocks;
use crate::options::{OptionName, Options, Shape};
use crate::value::{Args, Value};
use crate::wrapper::CacheDecorator;
use stats::StatsInner;

/// Memoization cache over a pluggable backend.
pub struct Cache {
    adapter: BackendAdapter,
    codec: ValueCodec,
    keys: KeyFormatter,
    handlers: HandlerTable,
    enabled: bool,
    defaults: Options,
    default: Option<Value>,
    locks: Option<KeyLocks>,
    stats: StatsInner,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("enabled", &self.enabled)
            .field("defaults", &self.defaults)
            .field("default", &self.default)
            .field("codec", &self.codec)
            .field("handlers", &self.handlers)
            .field("key_locks", &self.locks.is_some())
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Enabled cache with no default options.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::builder(backend).build()
    }

    /// Start configuring a cache over `backend`.
    pub fn builder(backend: Arc<dyn Backend>) -> CacheBuilder {
        CacheBuilder::new(backend)
    }

    /// Whether the cache talks to its backend at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Options applied under every call.
    pub fn default_options(&self) -> &Options {
        &self.defaults
    }

    /// Value wrappers return from `cached()` on a miss, unless they bind
    /// their own.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The value codec.
    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// The backend adapter.
    pub fn adapter(&self) -> &BackendAdapter {
        &self.adapter
    }

    /// Counters since construction.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Layer per-call `overrides` over the default options.
    pub fn format_options(&self, overrides: &Options) -> Options {
        self.defaults.merged(overrides)
    }

    /// Render a key template with call arguments.
    pub fn prepare_key(&self, template: &str, args: &Args) -> CacheResult<String> {
        Ok(self.keys.format(template, args)?)
    }

    /// Read the value at `key`.
    ///
    /// Fails with [`CacheError::NotFound`] when the key is absent, holds an
    /// empty collection, or holds the null sentinel without `fill_none`.
    pub fn get(&self, key: &str, options: &Options) -> CacheResult<Value> {
        if !self.enabled {
            return Err(CacheError::not_found(key));
        }

        let options = self.format_options(options);
        let shape = options.resolved_shape();
        let stored = self.handlers.resolve(shape).load(&self.adapter, key, &options)?;

        let stored = match stored {
            Some(stored) if !self.codec.is_empty(&stored, &options) => stored,
            _ => {
                self.stats.miss();
                debug!(key = key, shape = %shape, "Cache miss");
                return Err(CacheError::not_found(key));
            }
        };

        let value = self.codec.unprepare(stored, shape)?;
        self.stats.hit();
        debug!(key = key, shape = %shape, "Cache hit");

        if options.is_touch() {
            self.expire(key, &options)?;
        }
        Ok(value)
    }

    /// Write `value` at `key`, then apply the `time` option.
    pub fn set(&self, key: &str, value: &Value, options: &Options) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let options = self.format_options(options);
        let shape = options.resolved_shape();
        let stored = self.codec.prepare(value, shape, &options)?;
        self.handlers
            .resolve(shape)
            .store(&self.adapter, key, stored, &options)?;
        self.stats.write();
        debug!(key = key, shape = %shape, "Cache set");

        self.expire(key, &options)
    }

    /// Apply the `time` option to `key`. A missing or negative time leaves
    /// the expiry untouched.
    pub fn expire(&self, key: &str, options: &Options) -> CacheResult<()> {
        if let Some(seconds) = options.expiry() {
            self.adapter.expire(key, seconds)?;
            debug!(key = key, ttl_secs = seconds, "Cache expire");
        }
        Ok(())
    }

    /// Whether `key` exists in the backend.
    pub fn exists(&self, key: &str) -> CacheResult<bool> {
        if !self.enabled {
            return Ok(false);
        }
        self.adapter.exists(key)
    }

    /// Start binding a computation to this cache.
    ///
    /// With no `key`, the key is derived from the computation name.
    pub fn decorator(&self, key: Option<&str>, options: Options) -> CacheDecorator<'_> {
        CacheDecorator::new(self, key.map(str::to_string), options)
    }

    /// Run `f` holding the lock for `key`, when key locking is on.
    pub(crate) fn serialized<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        match &self.locks {
            Some(locks) => locks.with_lock(key, f),
            None => f(),
        }
    }
}

/// Builder for [`Cache`].
pub struct CacheBuilder {
    backend: Arc<dyn Backend>,
    enabled: bool,
    defaults: Options,
    default: Option<Value>,
    codec: ValueCodec,
    handlers: HandlerTable,
    accepted: Vec<(Operation, Vec<OptionName>)>,
    key_locks: bool,
}

impl CacheBuilder {
    fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            enabled: true,
            defaults: Options::default(),
            default: None,
            codec: ValueCodec::default(),
            handlers: HandlerTable::standard(),
            accepted: Vec::new(),
            key_locks: false,
        }
    }

    /// Turn backend interaction on or off.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Default options for every call.
    pub fn options(mut self, defaults: Options) -> Self {
        self.defaults = defaults;
        self
    }

    /// Miss value for every wrapper built from this cache.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Replace the value codec.
    pub fn codec(mut self, codec: ValueCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Replace the handler for one shape.
    pub fn handler(mut self, shape: Shape, handler: Arc<dyn ShapeHandler>) -> Self {
        self.handlers = self.handlers.with(shape, handler);
        self
    }

    /// Override the options a backend operation accepts.
    pub fn accepting(mut self, operation: Operation, names: Vec<OptionName>) -> Self {
        self.accepted.push((operation, names));
        self
    }

    /// Serialize compute-and-store per key, so concurrent misses compute once.
    pub fn key_locks(mut self, enabled: bool) -> Self {
        self.key_locks = enabled;
        self
    }

    /// Build the cache.
    pub fn build(self) -> Cache {
        let adapter = self
            .accepted
            .into_iter()
            .fold(BackendAdapter::new(self.backend), |adapter, (op, names)| {
                adapter.accepting(op, names)
            });

        Cache {
            adapter,
            codec: self.codec,
            keys: KeyFormatter::new(),
            handlers: self.handlers,
            enabled: self.enabled,
            defaults: self.defaults,
            default: self.default,
            locks: self.key_locks.then(KeyLocks::new),
            stats: StatsInner::default(),
        }
    }
}
