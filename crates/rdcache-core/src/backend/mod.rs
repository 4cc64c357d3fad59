//! Key-value backends.
//!
//! [`Backend`] is the contract a store implements. Plain string get/set,
//! existence and expiry are required; every shape operation has a default
//! that reports [`BackendError::Unsupported`], so a minimal backend only
//! serves the string shape.

pub mod memory;

pub use memory::MemoryBackend;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{BackendError, BackendResult};
use crate::options::Options;

/// Reply of a sorted-set range read.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeReply {
    /// Members only, ascending by score.
    Members(Vec<String>),
    /// Members with their scores, ascending by score.
    WithScores(Vec<(String, f64)>),
}

impl RangeReply {
    /// Whether the range holds no members.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Members(members) => members.is_empty(),
            Self::WithScores(members) => members.is_empty(),
        }
    }
}

/// Key-value store a [`Cache`](crate::Cache) reads from and writes to.
///
/// `options` arguments carry only what the adapter's allow-list lets through
/// for the operation.
pub trait Backend: Send + Sync {
    /// Read a string value.
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Write a string value. `options.time` may set an expiry.
    fn set(&self, key: &str, value: &str, options: &Options) -> BackendResult<()>;

    /// Whether `key` exists.
    fn exists(&self, key: &str) -> BackendResult<bool>;

    /// Set a TTL on `key`. A negative TTL removes any expiry.
    fn expire(&self, key: &str, seconds: i64) -> BackendResult<bool>;

    /// Remove `key`, returning whether it existed. Collection writes use it
    /// to swap the null sentinel for real members and back.
    fn delete(&self, _key: &str) -> BackendResult<bool> {
        Err(BackendError::Unsupported)
    }

    /// Read all fields of a hash.
    fn hgetall(&self, _key: &str) -> BackendResult<BTreeMap<String, String>> {
        Err(BackendError::Unsupported)
    }

    /// Write several hash fields.
    fn hset_many(&self, _key: &str, _fields: &BTreeMap<String, String>) -> BackendResult<()> {
        Err(BackendError::Unsupported)
    }

    /// Read list items between `start` and `stop`, inclusive, negative
    /// indices counting from the end.
    fn lrange(&self, _key: &str, _start: isize, _stop: isize) -> BackendResult<Vec<String>> {
        Err(BackendError::Unsupported)
    }

    /// Keep only the list items between `start` and `stop`.
    fn ltrim(&self, _key: &str, _start: isize, _stop: isize) -> BackendResult<()> {
        Err(BackendError::Unsupported)
    }

    /// Append to a list, returning its new length.
    fn rpush(&self, _key: &str, _value: &str) -> BackendResult<usize> {
        Err(BackendError::Unsupported)
    }

    /// Length of a list.
    fn llen(&self, _key: &str) -> BackendResult<usize> {
        Err(BackendError::Unsupported)
    }

    /// Union of the members of several sets.
    fn sunion(&self, _keys: &[&str]) -> BackendResult<BTreeSet<String>> {
        Err(BackendError::Unsupported)
    }

    /// Add a set member, returning how many were new.
    fn sadd(&self, _key: &str, _member: &str) -> BackendResult<usize> {
        Err(BackendError::Unsupported)
    }

    /// Read sorted-set members with scores in `[min, max]`.
    fn zrangebyscore(
        &self,
        _key: &str,
        _min: f64,
        _max: f64,
        _options: &Options,
    ) -> BackendResult<RangeReply> {
        Err(BackendError::Unsupported)
    }

    /// Add or re-score a sorted-set member, returning how many were new.
    fn zadd(&self, _key: &str, _score: f64, _member: &str) -> BackendResult<usize> {
        Err(BackendError::Unsupported)
    }
}
