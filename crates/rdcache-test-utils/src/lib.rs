//! Test utilities for rdcache crates.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rdcache_core::{Args, Cache, CacheBuilder, Computation, MemoryBackend, Value};
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Creates a project directory holding `.rdcache/config.yaml` with `content`.
pub fn temp_project(content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let config_dir = dir.path().join(".rdcache");
    std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
    let path = config_dir.join("config.yaml");
    std::fs::write(&path, content).expect("Failed to write config file");
    (dir, path)
}

/// Enabled cache over a fresh in-memory backend.
pub fn memory_cache() -> (Arc<MemoryBackend>, Cache) {
    memory_cache_with(|builder| builder)
}

/// Cache over a fresh in-memory backend, configured by `configure`.
pub fn memory_cache_with(
    configure: impl FnOnce(CacheBuilder) -> CacheBuilder,
) -> (Arc<MemoryBackend>, Cache) {
    let backend = Arc::new(MemoryBackend::new());
    let cache = configure(Cache::builder(backend.clone())).build();
    (backend, cache)
}

enum Behavior {
    Count,
    Return(Value),
    Fail(String),
}

/// Computation that counts its invocations.
///
/// By default it returns the invocation number, starting at 1.
pub struct CallCounter {
    name: String,
    calls: AtomicU64,
    behavior: Behavior,
    delay: Option<Duration>,
}

impl CallCounter {
    /// Counter returning its own call count.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Count)
    }

    /// Counter returning `value` every time.
    pub fn returning(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_behavior(name, Behavior::Return(value.into()))
    }

    /// Counter failing with `message` every time.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Fail(message.into()))
    }

    fn with_behavior(name: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU64::new(0),
            behavior,
            delay: None,
        }
    }

    /// Sleep for `delay` inside every call.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Computation for CallCounter {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn compute(&self, _args: &Args) -> anyhow::Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        match &self.behavior {
            Behavior::Count => Ok(Value::Int(call as i64)),
            Behavior::Return(value) => Ok(value.clone()),
            Behavior::Fail(message) => Err(anyhow::anyhow!("{message}")),
        }
    }
}

/// Sample user rows keyed by username: `username`, `gender`, `birthday`.
pub fn user_rows() -> BTreeMap<String, Value> {
    let row = |username: &str, gender: &str, birthday: &str| {
        let mut fields = BTreeMap::new();
        fields.insert("username".to_string(), Value::from(username));
        fields.insert("gender".to_string(), Value::from(gender));
        fields.insert("birthday".to_string(), Value::from(birthday));
        (username.to_string(), Value::Map(fields))
    };

    BTreeMap::from([
        row("alice", "F", "1981-10-10"),
        row("bob", "M", "1988-09-09"),
        row("candy", "F", "1983-07-15"),
        row("david", "M", "1992-01-03"),
    ])
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_temp_project_layout() {
        let (dir, path) = temp_project("cache:\n  enabled: true\n");
        assert!(path.starts_with(dir.path()));
        assert!(path.ends_with(".rdcache/config.yaml"));
        assert!(path.is_file());
    }

    #[test]
    fn test_counter_counts() {
        let counter = CallCounter::new("count");
        assert_eq!(counter.compute(&Args::new()).unwrap(), Value::Int(1));
        assert_eq!(counter.compute(&Args::new()).unwrap(), Value::Int(2));
        assert_eq!(counter.calls(), 2);
    }

    #[test]
    fn test_failing_counter() {
        let counter = CallCounter::failing("boom", "no database");
        let err = assert_err!(counter.compute(&Args::new()));
        assert_eq!(err.to_string(), "no database");
        assert_eq!(counter.calls(), 1);
    }

    proptest! {
        #[test]
        fn test_returning_counter_is_stable(n in any::<i64>(), calls in 1usize..8) {
            let counter = CallCounter::returning("fixed", n);
            for _ in 0..calls {
                prop_assert_eq!(counter.compute(&Args::new()).unwrap(), Value::Int(n));
            }
            prop_assert_eq!(counter.calls(), calls as u64);
        }
    }
}
