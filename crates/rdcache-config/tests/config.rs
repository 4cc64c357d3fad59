//! Loading project config files and building caches from them.

use std::sync::Arc;

use rdcache_config::{ConfigError, ConfigLoader};
use rdcache_core::{Args, Backend, MemoryBackend, Options, Shape, Value};
use rdcache_test_utils::{assert_err, assert_ok, temp_project, CallCounter};

#[test]
fn test_project_config_drives_cache() {
    let (dir, _) = temp_project(
        r#"
cache:
  json: true
  defaults:
    timeout: 120
    valtype: list
"#,
    );

    let config = assert_ok!(ConfigLoader::new(dir.path()).load());
    let backend = Arc::new(MemoryBackend::new());
    let cache = config.cache.build(backend.clone());

    let counter = CallCounter::returning(
        "recent",
        Value::from(vec![Value::from("a"), Value::from("b")]),
    );
    let recent = cache
        .decorator(Some("recent"), Options::new())
        .wrap_computation(&counter);

    assert_ok!(recent.call(&Args::new()));
    assert_ok!(recent.call(&Args::new()));
    assert_eq!(counter.calls(), 1);

    assert_eq!(assert_ok!(backend.lrange("recent", 0, -1)), vec!["a", "b"]);
    let ttl = backend.ttl("recent").expect("list has a ttl");
    assert!(ttl.as_secs() <= 120 && ttl.as_secs() > 100);
}

#[test]
fn test_explicit_file_path() {
    let (_dir, path) = temp_project("cache:\n  defaults:\n    type: hash\n");

    let config = assert_ok!(ConfigLoader::at(&path).load());
    assert_eq!(config.cache.defaults.shape, Some(Shape::Hash));
}

#[test]
fn test_invalid_connection_rejected() {
    let (dir, _) = temp_project("connections:\n  default:\n    host: ''\n");

    let err = assert_err!(ConfigLoader::new(dir.path()).load());
    assert!(matches!(err, ConfigError::ValidationError { .. }));
    assert!(err.to_string().contains("connections.default.host"));
}

#[test]
fn test_expanded_connection_settings() {
    std::env::set_var("RDCACHE_IT_REDIS_DB", "7");
    let (dir, _) = temp_project(
        "connections:\n  default:\n    host: ${RDCACHE_IT_REDIS_HOST:-redis.local}\n    db: ${RDCACHE_IT_REDIS_DB}\n",
    );

    let config = assert_ok!(ConfigLoader::new(dir.path()).load());
    let registry = config.registry();
    assert_eq!(registry.config("default").host, "redis.local");
    assert_eq!(registry.config("default").db, 7);
    assert_eq!(registry.config("default").url(), "redis://redis.local:6379/7");

    std::env::remove_var("RDCACHE_IT_REDIS_DB");
}

#[test]
fn test_cache_default_from_file() {
    let (dir, _) = temp_project("cache:\n  default: 0\n");

    let config = assert_ok!(ConfigLoader::new(dir.path()).load());
    let cache = config.cache.build(Arc::new(MemoryBackend::new()));
    let counter = CallCounter::new("visits");
    let visits = cache
        .decorator(Some("visits"), Options::new())
        .wrap_computation(&counter);

    assert_eq!(assert_ok!(visits.cached(&Args::new())), Value::Int(0));
    assert_eq!(counter.calls(), 0);
}
