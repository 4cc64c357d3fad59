//! Option-filtering invocation of backend operations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::backend::{Backend, RangeReply};
use crate::error::{BackendResult, CacheError, CacheResult};
use crate::options::{OptionName, Options};

/// Backend operations the cache issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read a string.
    Get,
    /// Write a string.
    Set,
    /// Existence check.
    Exists,
    /// Set a TTL.
    Expire,
    /// Remove a key.
    Delete,
    /// Read a whole hash.
    HashGetAll,
    /// Write hash fields.
    HashSetMany,
    /// Read list items.
    ListRange,
    /// Trim a list.
    ListTrim,
    /// Append to a list.
    ListPush,
    /// List length.
    ListLen,
    /// Read set members.
    SetUnion,
    /// Add a set member.
    SetAdd,
    /// Read sorted-set members by score.
    SortedRangeByScore,
    /// Add a sorted-set member.
    SortedAdd,
}

impl Operation {
    /// Command name, as logged and reported in errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Exists => "exists",
            Self::Expire => "expire",
            Self::Delete => "del",
            Self::HashGetAll => "hgetall",
            Self::HashSetMany => "hset",
            Self::ListRange => "lrange",
            Self::ListTrim => "ltrim",
            Self::ListPush => "rpush",
            Self::ListLen => "llen",
            Self::SetUnion => "sunion",
            Self::SetAdd => "sadd",
            Self::SortedRangeByScore => "zrangebyscore",
            Self::SortedAdd => "zadd",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Invokes backend operations, passing each only the options it accepts.
///
/// The allow-list is fixed at construction: `set` accepts `time`,
/// `zrangebyscore` accepts `withscores`, everything else accepts nothing.
/// Backend failures, including unsupported operations, come back as
/// [`CacheError::Adapter`].
#[derive(Clone)]
pub struct BackendAdapter {
    backend: Arc<dyn Backend>,
    accepted: HashMap<Operation, Vec<OptionName>>,
}

impl fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("accepted", &self.accepted)
            .finish_non_exhaustive()
    }
}

impl BackendAdapter {
    /// Wrap `backend` with the default allow-list.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let accepted = HashMap::from([
            (Operation::Set, vec![OptionName::Time]),
            (Operation::SortedRangeByScore, vec![OptionName::WithScores]),
        ]);
        Self { backend, accepted }
    }

    /// Replace the options accepted by `operation`.
    pub fn accepting(mut self, operation: Operation, names: Vec<OptionName>) -> Self {
        self.accepted.insert(operation, names);
        self
    }

    /// Options accepted by `operation`.
    pub fn accepted(&self, operation: Operation) -> &[OptionName] {
        self.accepted
            .get(&operation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Call `f` with the backend and the filtered options.
    pub fn invoke<T>(
        &self,
        operation: Operation,
        options: &Options,
        f: impl FnOnce(&dyn Backend, &Options) -> BackendResult<T>,
    ) -> CacheResult<T> {
        let filtered = options.retain(self.accepted(operation));
        f(self.backend.as_ref(), &filtered).map_err(|source| {
            warn!(operation = operation.name(), error = %source, "Backend operation failed");
            CacheError::Adapter {
                operation: operation.name(),
                source,
            }
        })
    }

    /// `GET key`.
    pub fn get(&self, key: &str, options: &Options) -> CacheResult<Option<String>> {
        self.invoke(Operation::Get, options, |b, _| b.get(key))
    }

    /// `SET key value`, with the filtered options.
    pub fn set(&self, key: &str, value: &str, options: &Options) -> CacheResult<()> {
        self.invoke(Operation::Set, options, |b, opts| b.set(key, value, opts))
    }

    /// `EXISTS key`.
    pub fn exists(&self, key: &str) -> CacheResult<bool> {
        self.invoke(Operation::Exists, &Options::default(), |b, _| b.exists(key))
    }

    /// `EXPIRE key seconds`.
    pub fn expire(&self, key: &str, seconds: i64) -> CacheResult<bool> {
        self.invoke(Operation::Expire, &Options::default(), |b, _| {
            b.expire(key, seconds)
        })
    }

    /// `DEL key`.
    pub fn delete(&self, key: &str, options: &Options) -> CacheResult<bool> {
        self.invoke(Operation::Delete, options, |b, _| b.delete(key))
    }

    /// `HGETALL key`.
    pub fn hgetall(&self, key: &str, options: &Options) -> CacheResult<BTreeMap<String, String>> {
        self.invoke(Operation::HashGetAll, options, |b, _| b.hgetall(key))
    }

    /// `HSET key field value [field value ...]`.
    pub fn hset_many(
        &self,
        key: &str,
        fields: &BTreeMap<String, String>,
        options: &Options,
    ) -> CacheResult<()> {
        self.invoke(Operation::HashSetMany, options, |b, _| b.hset_many(key, fields))
    }

    /// `LRANGE key start stop`.
    pub fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        options: &Options,
    ) -> CacheResult<Vec<String>> {
        self.invoke(Operation::ListRange, options, |b, _| b.lrange(key, start, stop))
    }

    /// `LTRIM key start stop`.
    pub fn ltrim(&self, key: &str, start: isize, stop: isize, options: &Options) -> CacheResult<()> {
        self.invoke(Operation::ListTrim, options, |b, _| b.ltrim(key, start, stop))
    }

    /// `RPUSH key value`.
    pub fn rpush(&self, key: &str, value: &str, options: &Options) -> CacheResult<usize> {
        self.invoke(Operation::ListPush, options, |b, _| b.rpush(key, value))
    }

    /// `LLEN key`.
    pub fn llen(&self, key: &str, options: &Options) -> CacheResult<usize> {
        self.invoke(Operation::ListLen, options, |b, _| b.llen(key))
    }

    /// `SUNION key`.
    pub fn sunion(&self, key: &str, options: &Options) -> CacheResult<BTreeSet<String>> {
        self.invoke(Operation::SetUnion, options, |b, _| b.sunion(&[key]))
    }

    /// `SADD key member`.
    pub fn sadd(&self, key: &str, member: &str, options: &Options) -> CacheResult<usize> {
        self.invoke(Operation::SetAdd, options, |b, _| b.sadd(key, member))
    }

    /// `ZRANGEBYSCORE key min max [WITHSCORES]`.
    pub fn zrangebyscore(
        &self,
        key: &str,
        min: f64,
        max: f64,
        options: &Options,
    ) -> CacheResult<RangeReply> {
        self.invoke(Operation::SortedRangeByScore, options, |b, opts| {
            b.zrangebyscore(key, min, max, opts)
        })
    }

    /// `ZADD key score member`.
    pub fn zadd(&self, key: &str, score: f64, member: &str, options: &Options) -> CacheResult<usize> {
        self.invoke(Operation::SortedAdd, options, |b, _| b.zadd(key, score, member))
    }
}
