//! In-process backend.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tracing::debug;

use super::{Backend, RangeReply};
use crate::codec::Stored;
use crate::error::{BackendError, BackendResult};
use crate::options::Options;

/// In-memory entry.
struct Entry {
    data: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Stored) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Backend keeping every shape in a concurrent map, lost on drop.
///
/// Expired entries are removed lazily when touched. Operations against a key
/// holding another shape fail with [`BackendError::WrongType`].
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live of `key`, if it has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.purge_expired(key);
        let entry = self.entries.get(key)?;
        entry
            .expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Copy of the raw stored form of `key`.
    pub fn peek(&self, key: &str) -> Option<Stored> {
        self.purge_expired(key);
        self.entries.get(key).map(|e| e.data.clone())
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
        debug!("Memory backend cleared");
    }

    fn purge_expired(&self, key: &str) {
        let now = Instant::now();
        if self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            debug!(key = key, "Memory backend entry expired");
        }
    }

    fn read<T>(&self, key: &str, f: impl FnOnce(&Stored) -> BackendResult<T>) -> BackendResult<Option<T>> {
        self.purge_expired(key);
        match self.entries.get(key) {
            Some(entry) => f(&entry.data).map(Some),
            None => Ok(None),
        }
    }

    /// Mutate the collection at `key`, creating it with `empty` when absent.
    /// Collections left without members are removed.
    fn update<T>(
        &self,
        key: &str,
        empty: impl FnOnce() -> Stored,
        f: impl FnOnce(&mut Stored) -> BackendResult<T>,
    ) -> BackendResult<T> {
        self.purge_expired(key);
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let result = f(&mut occupied.get_mut().data)?;
                if occupied.get().data.is_backend_empty() {
                    occupied.remove();
                }
                Ok(result)
            }
            MapEntry::Vacant(vacant) => {
                let mut data = empty();
                let result = f(&mut data)?;
                if !data.is_backend_empty() {
                    vacant.insert(Entry::new(data));
                }
                Ok(result)
            }
        }
    }
}

/// Expiry instant `seconds` from now. Non-positive times and times past the
/// clock's range mean no expiry.
fn deadline(seconds: i64) -> Option<Instant> {
    let seconds = u64::try_from(seconds).ok().filter(|s| *s > 0)?;
    Instant::now().checked_add(Duration::from_secs(seconds))
}

/// Resolve a Redis-style inclusive index range against `len`.
fn index_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let value = self.read(key, |data| match data {
            Stored::Str(s) => Ok(s.clone()),
            _ => Err(BackendError::WrongType),
        })?;
        debug!(key = key, hit = value.is_some(), "Memory backend get");
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, options: &Options) -> BackendResult<()> {
        let expires_at = options.time.and_then(deadline);
        self.entries.insert(
            key.to_string(),
            Entry {
                data: Stored::Str(value.to_string()),
                expires_at,
            },
        );
        debug!(key = key, ttl_secs = ?options.time, "Memory backend set");
        Ok(())
    }

    fn exists(&self, key: &str) -> BackendResult<bool> {
        self.purge_expired(key);
        Ok(self.entries.contains_key(key))
    }

    fn expire(&self, key: &str, seconds: i64) -> BackendResult<bool> {
        self.purge_expired(key);
        if seconds == 0 {
            return Ok(self.entries.remove(key).is_some());
        }
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = deadline(seconds);
                debug!(key = key, ttl_secs = seconds, "Memory backend expire");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        self.purge_expired(key);
        let removed = self.entries.remove(key).is_some();
        debug!(key = key, removed = removed, "Memory backend delete");
        Ok(removed)
    }

    fn hgetall(&self, key: &str) -> BackendResult<BTreeMap<String, String>> {
        self.read(key, |data| match data {
            Stored::Hash(fields) => Ok(fields.clone()),
            _ => Err(BackendError::WrongType),
        })
        .map(Option::unwrap_or_default)
    }

    fn hset_many(&self, key: &str, fields: &BTreeMap<String, String>) -> BackendResult<()> {
        self.update(
            key,
            || Stored::Hash(BTreeMap::new()),
            |data| match data {
                Stored::Hash(existing) => {
                    existing.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                    Ok(())
                }
                _ => Err(BackendError::WrongType),
            },
        )
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> BackendResult<Vec<String>> {
        self.read(key, |data| match data {
            Stored::List(items) => Ok(index_range(items.len(), start, stop)
                .map(|(from, to)| items[from..=to].to_vec())
                .unwrap_or_default()),
            _ => Err(BackendError::WrongType),
        })
        .map(Option::unwrap_or_default)
    }

    fn ltrim(&self, key: &str, start: isize, stop: isize) -> BackendResult<()> {
        self.purge_expired(key);
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.update(
            key,
            || Stored::List(Vec::new()),
            |data| match data {
                Stored::List(items) => {
                    *items = index_range(items.len(), start, stop)
                        .map(|(from, to)| items[from..=to].to_vec())
                        .unwrap_or_default();
                    Ok(())
                }
                _ => Err(BackendError::WrongType),
            },
        )
    }

    fn rpush(&self, key: &str, value: &str) -> BackendResult<usize> {
        self.update(
            key,
            || Stored::List(Vec::new()),
            |data| match data {
                Stored::List(items) => {
                    items.push(value.to_string());
                    Ok(items.len())
                }
                _ => Err(BackendError::WrongType),
            },
        )
    }

    fn llen(&self, key: &str) -> BackendResult<usize> {
        self.read(key, |data| match data {
            Stored::List(items) => Ok(items.len()),
            _ => Err(BackendError::WrongType),
        })
        .map(Option::unwrap_or_default)
    }

    fn sunion(&self, keys: &[&str]) -> BackendResult<BTreeSet<String>> {
        let mut union = BTreeSet::new();
        for key in keys {
            let members = self.read(key, |data| match data {
                Stored::Set(members) => Ok(members.clone()),
                _ => Err(BackendError::WrongType),
            })?;
            union.extend(members.unwrap_or_default());
        }
        Ok(union)
    }

    fn sadd(&self, key: &str, member: &str) -> BackendResult<usize> {
        self.update(
            key,
            || Stored::Set(BTreeSet::new()),
            |data| match data {
                Stored::Set(members) => Ok(usize::from(members.insert(member.to_string()))),
                _ => Err(BackendError::WrongType),
            },
        )
    }

    fn zrangebyscore(
        &self,
        key: &str,
        min: f64,
        max: f64,
        options: &Options,
    ) -> BackendResult<RangeReply> {
        let members = self
            .read(key, |data| match data {
                Stored::Sorted(members) => Ok(members
                    .iter()
                    .filter(|(_, score)| *score >= min && *score <= max)
                    .cloned()
                    .collect::<Vec<_>>()),
                _ => Err(BackendError::WrongType),
            })?
            .unwrap_or_default();

        Ok(if options.is_withscores() {
            RangeReply::WithScores(members)
        } else {
            RangeReply::Members(members.into_iter().map(|(member, _)| member).collect())
        })
    }

    fn zadd(&self, key: &str, score: f64, member: &str) -> BackendResult<usize> {
        self.update(
            key,
            || Stored::Sorted(Vec::new()),
            |data| match data {
                Stored::Sorted(members) => {
                    let added = match members.iter().position(|(m, _)| m == member) {
                        Some(index) => {
                            members[index].1 = score;
                            0
                        }
                        None => {
                            members.push((member.to_string(), score));
                            1
                        }
                    };
                    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                    Ok(added)
                }
                _ => Err(BackendError::WrongType),
            },
        )
    }
}
