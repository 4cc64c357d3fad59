use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rdcache_core::{
    Backend, BackendError, BackendResult, Cache, CacheError, Options, Shape, Stored, Value,
    CACHE_NONE,
};
use rdcache_test_utils::{assert_err, assert_ok, memory_cache, user_rows};

/// Backend serving only the string contract.
#[derive(Default)]
struct StringOnly {
    inner: rdcache_core::MemoryBackend,
}

impl Backend for StringOnly {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str, options: &Options) -> BackendResult<()> {
        self.inner.set(key, value, options)
    }

    fn exists(&self, key: &str) -> BackendResult<bool> {
        self.inner.exists(key)
    }

    fn expire(&self, key: &str, seconds: i64) -> BackendResult<bool> {
        self.inner.expire(key, seconds)
    }
}

#[test]
fn test_hash_roundtrip() {
    let (backend, cache) = memory_cache();
    let options = Options::new().shape(Shape::Hash);
    let mut row = BTreeMap::new();
    row.insert("username".to_string(), Value::from("bob"));
    row.insert("gender".to_string(), Value::from("M"));
    let row = Value::Map(row);

    assert_ok!(cache.set("user:bob", &row, &options));
    assert!(matches!(backend.peek("user:bob"), Some(Stored::Hash(_))));
    assert_eq!(assert_ok!(cache.get("user:bob", &options)), row);
}

#[test]
fn test_hash_dates_are_coerced() {
    let (_, cache) = memory_cache();
    let options = Options::new().valtype("hash");
    let birthday = NaiveDate::from_ymd_opt(1983, 7, 15).unwrap();
    let row = Value::from(BTreeMap::from([
        ("username".to_string(), Value::from("candy")),
        ("birthday".to_string(), Value::from(birthday)),
    ]));

    assert_ok!(cache.set("user:candy", &row, &options));
    let read = assert_ok!(cache.get("user:candy", &options));
    assert_eq!(read.as_map().unwrap()["birthday"], Value::from("1983-07-15"));
}

#[test]
fn test_wrong_shape_read_is_adapter_error() {
    let (_, cache) = memory_cache();
    let rows = user_rows();
    assert_ok!(cache.set("user:bob", &rows["bob"], &Options::new().shape(Shape::Hash)));

    let err = assert_err!(cache.get("user:bob", &Options::new()));
    assert!(matches!(
        err,
        CacheError::Adapter {
            operation: "get",
            source: BackendError::WrongType,
        }
    ));
}

#[test]
fn test_unsupported_shape_is_adapter_error() {
    let cache = Cache::new(Arc::new(StringOnly::default()));

    let err = assert_err!(cache.get("k", &Options::new().shape(Shape::Set)));
    assert!(err.is_adapter());

    assert_ok!(cache.set("k", &Value::from("v"), &Options::new().time(10)));
    assert_eq!(assert_ok!(cache.get("k", &Options::new())), Value::from("v"));
}

#[test]
fn test_sorted_set_with_scores() {
    let (_, cache) = memory_cache();
    let options = Options::new().shape(Shape::Sorted);
    let births = Value::from(vec![
        Value::from(vec![Value::from("bob"), Value::from(1988)]),
        Value::from(vec![Value::from("alice"), Value::from(1981)]),
    ]);

    assert_ok!(cache.set("births", &births, &options));

    let read = assert_ok!(cache.get("births", &options.clone().withscores()));
    assert_eq!(
        read,
        Value::from(vec![
            Value::from(vec![Value::from("alice"), Value::Float(1981.0)]),
            Value::from(vec![Value::from("bob"), Value::Float(1988.0)]),
        ])
    );

    let members = assert_ok!(cache.get("births", &options));
    assert_eq!(members, Value::from(vec!["alice", "bob"]));
}

#[test]
fn test_sorted_scalar_uses_score_option() {
    let (backend, cache) = memory_cache();
    let options = Options::new().shape(Shape::Sorted).score(3.5);

    assert_ok!(cache.set("z", &Value::from("m"), &options));
    assert_eq!(
        backend.peek("z"),
        Some(Stored::Sorted(vec![("m".to_string(), 3.5)]))
    );
}

#[test]
fn test_list_replaces_and_set_unions() {
    let (_, cache) = memory_cache();
    let list = Options::new().shape(Shape::List);
    let set = Options::new().shape(Shape::Set);

    assert_ok!(cache.set("l", &Value::from(vec!["a", "b"]), &list));
    assert_ok!(cache.set("l", &Value::from(vec!["c"]), &list));
    assert_eq!(assert_ok!(cache.get("l", &list)), Value::from(vec!["c"]));

    assert_ok!(cache.set("s", &Value::from(vec!["a", "b"]), &set));
    assert_ok!(cache.set("s", &Value::from("c"), &set));
    let members: BTreeSet<String> = ["a", "b", "c"].iter().map(|m| m.to_string()).collect();
    assert_eq!(assert_ok!(cache.get("s", &set)), Value::Set(members));
}

#[test]
fn test_empty_collection_is_miss() {
    let (_, cache) = memory_cache();
    for shape in [Shape::Hash, Shape::List, Shape::Set, Shape::Sorted] {
        let options = Options::new().shape(shape);
        assert_ok!(cache.set("empty", &empty_for(shape), &options));
        let err = assert_err!(cache.get("empty", &options));
        assert!(err.is_not_found(), "{shape} should miss");
    }
}

#[test]
fn test_null_roundtrip_with_fill_none() {
    let (backend, cache) = memory_cache();
    for shape in Shape::ALL {
        let key = format!("none:{shape}");
        let options = Options::new().shape(shape).fill_none();

        assert_ok!(cache.set(&key, &Value::Null, &options));
        assert!(backend.peek(&key).unwrap().is_sentinel());
        assert_eq!(assert_ok!(cache.get(&key, &options)), Value::Null);

        let plain = Options::new().shape(shape);
        assert!(assert_err!(cache.get(&key, &plain)).is_not_found());
    }

    assert!(assert_err!(cache.get("never-written", &Options::new().fill_none())).is_not_found());
}

#[test]
fn test_null_replaces_existing_collection() {
    let (backend, cache) = memory_cache();
    for shape in [Shape::Hash, Shape::Set, Shape::Sorted] {
        let key = format!("row:{shape}");
        let options = Options::new().shape(shape).fill_none();
        let (row, _) = row_for(shape);

        assert_ok!(cache.set(&key, &row, &options));
        assert_ok!(cache.set(&key, &Value::Null, &options));

        assert_eq!(backend.peek(&key), Some(Stored::sentinel(shape)), "{shape}");
        assert_eq!(assert_ok!(cache.get(&key, &options)), Value::Null, "{shape}");
    }
}

#[test]
fn test_collection_replaces_stored_null() {
    let (backend, cache) = memory_cache();
    for shape in [Shape::Hash, Shape::Set, Shape::Sorted] {
        let key = format!("none:{shape}");
        let options = Options::new().shape(shape).fill_none();
        let (row, read) = row_for(shape);

        assert_ok!(cache.set(&key, &Value::Null, &options));
        assert_ok!(cache.set(&key, &row, &options));

        assert!(!backend.peek(&key).unwrap().is_sentinel(), "{shape}");
        assert_eq!(assert_ok!(cache.get(&key, &options)), read, "{shape}");
    }
}

#[test]
fn test_collection_writes_still_merge_real_members() {
    let (_, cache) = memory_cache();
    let options = Options::new().shape(Shape::Hash);

    let first = Value::from(BTreeMap::from([("username".to_string(), Value::from("bob"))]));
    let second = Value::from(BTreeMap::from([("gender".to_string(), Value::from("M"))]));
    assert_ok!(cache.set("user:bob", &first, &options));
    assert_ok!(cache.set("user:bob", &second, &options));

    assert_eq!(
        assert_ok!(cache.get("user:bob", &options)),
        Value::from(BTreeMap::from([
            ("gender".to_string(), Value::from("M")),
            ("username".to_string(), Value::from("bob")),
        ]))
    );
}

#[test]
fn test_string_shape_stores_plain_scalars() {
    let (backend, cache) = memory_cache();
    let options = Options::new();
    let birthday = NaiveDate::from_ymd_opt(1981, 10, 10).unwrap();
    let cases = [
        ("name", Value::from("bob"), "bob"),
        ("date", Value::from(birthday), "1981-10-10"),
        (
            "at",
            Value::from(birthday.and_hms_opt(8, 30, 5).unwrap()),
            "1981-10-10 08:30:05",
        ),
        (
            "price",
            Value::from(bigdecimal::BigDecimal::from_str("12.50").unwrap()),
            "12.5",
        ),
    ];

    for (key, value, raw) in cases {
        assert_ok!(cache.set(key, &value, &options));
        assert_eq!(backend.peek(key), Some(Stored::Str(raw.to_string())), "{key}");
    }
    assert_eq!(assert_ok!(cache.get("name", &options)), Value::from("bob"));
}

#[test]
fn test_huge_time_means_no_expiry() {
    let (backend, cache) = memory_cache();
    assert_ok!(cache.set("k", &Value::from(1), &Options::new().time(i64::MAX)));
    assert!(backend.ttl("k").is_none());
    assert_eq!(assert_ok!(cache.get("k", &Options::new())), Value::from(1));
}

#[test]
fn test_fill_none_persists_empty_hash() {
    let (backend, cache) = memory_cache();
    let options = Options::new().shape(Shape::Hash).fill_none();

    assert_ok!(cache.set("h", &Value::Map(BTreeMap::new()), &options));
    assert_eq!(
        backend.peek("h"),
        Some(Stored::Hash(BTreeMap::from([(
            CACHE_NONE.to_string(),
            CACHE_NONE.to_string()
        )])))
    );
    assert_eq!(assert_ok!(cache.get("h", &options)), Value::Null);
}

#[test]
fn test_json_shape_keeps_structure() {
    let (backend, cache) = memory_cache();
    let options = Options::new().shape(Shape::Json);
    let value = Value::from(serde_json::json!({"id": 7, "tags": ["x", "y"], "score": 0.5}));

    assert_ok!(cache.set("doc", &value, &options));
    assert!(matches!(backend.peek("doc"), Some(Stored::Str(_))));
    assert_eq!(assert_ok!(cache.get("doc", &options)), value);
}

#[test]
fn test_expire_only_for_non_negative_time() {
    let (backend, cache) = memory_cache();
    assert_ok!(cache.set("k", &Value::from(1), &Options::new()));

    assert_ok!(cache.expire("k", &Options::new()));
    assert_ok!(cache.expire("k", &Options::new().time(-5)));
    assert!(backend.ttl("k").is_none());

    assert_ok!(cache.expire("k", &Options::new().timeout(90)));
    assert!(backend.ttl("k").is_some());
}

/// A non-empty value for `shape` and what reading it back yields.
fn row_for(shape: Shape) -> (Value, Value) {
    match shape {
        Shape::Hash => {
            let row = Value::from(BTreeMap::from([(
                "username".to_string(),
                Value::from("bob"),
            )]));
            (row.clone(), row)
        }
        Shape::Set => (
            Value::from(vec!["a"]),
            Value::Set(BTreeSet::from(["a".to_string()])),
        ),
        _ => (Value::from(vec!["m"]), Value::from(vec!["m"])),
    }
}

fn empty_for(shape: Shape) -> Value {
    match shape {
        Shape::Hash => Value::Map(BTreeMap::new()),
        _ => Value::List(Vec::new()),
    }
}
