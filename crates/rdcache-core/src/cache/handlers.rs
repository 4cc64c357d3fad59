//! Per-shape load and store handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::BackendAdapter;
use crate::backend::RangeReply;
use crate::codec::Stored;
use crate::error::{CacheError, CacheResult};
use crate::options::{Options, Shape};

/// Moves one shape of encoded value between the cache and the backend.
pub trait ShapeHandler: Send + Sync {
    /// Read the value at `key`. `None` when the key is absent.
    fn load(&self, adapter: &BackendAdapter, key: &str, options: &Options)
        -> CacheResult<Option<Stored>>;

    /// Write `stored` at `key`.
    fn store(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        stored: Stored,
        options: &Options,
    ) -> CacheResult<()>;
}

fn mismatch(shape: Shape, stored: &Stored) -> CacheError {
    CacheError::codec(format!(
        "{shape} handler cannot store a {} value",
        stored.kind()
    ))
}

/// Remove `key` when the null sentinel is about to replace real members, or
/// real members are about to replace a stored sentinel. Merging writes would
/// otherwise mix the two.
fn clear_sentinel(
    handler: &dyn ShapeHandler,
    adapter: &BackendAdapter,
    key: &str,
    writing_null: bool,
    options: &Options,
) -> CacheResult<()> {
    let replacing = writing_null
        || handler
            .load(adapter, key, options)?
            .is_some_and(|existing| existing.is_sentinel());
    if replacing {
        adapter.delete(key, options)?;
        debug!(key = key, "Null sentinel swapped");
    }
    Ok(())
}

/// String values, also used for JSON payloads.
#[derive(Debug, Default)]
pub struct StringHandler;

impl ShapeHandler for StringHandler {
    fn load(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        options: &Options,
    ) -> CacheResult<Option<Stored>> {
        Ok(adapter.get(key, options)?.map(Stored::Str))
    }

    fn store(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        stored: Stored,
        options: &Options,
    ) -> CacheResult<()> {
        match stored {
            Stored::Str(value) => adapter.set(key, &value, options),
            other => Err(mismatch(Shape::String, &other)),
        }
    }
}

/// Hashes. Writes merge fields into what is already there, except that a
/// stored null and real fields replace each other.
#[derive(Debug, Default)]
pub struct HashHandler;

impl ShapeHandler for HashHandler {
    fn load(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        options: &Options,
    ) -> CacheResult<Option<Stored>> {
        Ok(Some(Stored::Hash(adapter.hgetall(key, options)?)))
    }

    fn store(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        stored: Stored,
        options: &Options,
    ) -> CacheResult<()> {
        let writing_null = stored.is_sentinel();
        match stored {
            Stored::Hash(fields) if fields.is_empty() => Ok(()),
            Stored::Hash(fields) => {
                clear_sentinel(self, adapter, key, writing_null, options)?;
                adapter.hset_many(key, &fields, options)
            }
            other => Err(mismatch(Shape::Hash, &other)),
        }
    }
}

/// Lists. Writes replace the whole list.
#[derive(Debug, Default)]
pub struct ListHandler;

impl ShapeHandler for ListHandler {
    fn load(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        options: &Options,
    ) -> CacheResult<Option<Stored>> {
        Ok(Some(Stored::List(adapter.lrange(key, 0, -1, options)?)))
    }

    fn store(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        stored: Stored,
        options: &Options,
    ) -> CacheResult<()> {
        let items = match stored {
            Stored::List(items) => items,
            other => return Err(mismatch(Shape::List, &other)),
        };
        adapter.ltrim(key, 1, 0, options)?;
        for item in &items {
            adapter.rpush(key, item, options)?;
        }
        let len = adapter.llen(key, options)?;
        debug!(key = key, len = len, "List stored");
        Ok(())
    }
}

/// Sets. Writes add members, except that a stored null and real members
/// replace each other.
#[derive(Debug, Default)]
pub struct SetHandler;

impl ShapeHandler for SetHandler {
    fn load(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        options: &Options,
    ) -> CacheResult<Option<Stored>> {
        Ok(Some(Stored::Set(adapter.sunion(key, options)?)))
    }

    fn store(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        stored: Stored,
        options: &Options,
    ) -> CacheResult<()> {
        let writing_null = stored.is_sentinel();
        let members = match stored {
            Stored::Set(members) if members.is_empty() => return Ok(()),
            Stored::Set(members) => members,
            other => return Err(mismatch(Shape::Set, &other)),
        };
        clear_sentinel(self, adapter, key, writing_null, options)?;
        for member in &members {
            adapter.sadd(key, member, options)?;
        }
        Ok(())
    }
}

/// Sorted sets, read over the full score range.
#[derive(Debug, Default)]
pub struct SortedHandler;

impl ShapeHandler for SortedHandler {
    fn load(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        options: &Options,
    ) -> CacheResult<Option<Stored>> {
        let reply = adapter.zrangebyscore(key, f64::NEG_INFINITY, f64::INFINITY, options)?;
        Ok(Some(match reply {
            RangeReply::WithScores(members) => Stored::Sorted(members),
            // Without scores the members are still sorted; keep them as a list.
            RangeReply::Members(members) => Stored::List(members),
        }))
    }

    fn store(
        &self,
        adapter: &BackendAdapter,
        key: &str,
        stored: Stored,
        options: &Options,
    ) -> CacheResult<()> {
        let writing_null = stored.is_sentinel();
        let members = match stored {
            Stored::Sorted(members) if members.is_empty() => return Ok(()),
            Stored::Sorted(members) => members,
            other => return Err(mismatch(Shape::Sorted, &other)),
        };
        clear_sentinel(self, adapter, key, writing_null, options)?;
        for (member, score) in &members {
            adapter.zadd(key, *score, member, options)?;
        }
        Ok(())
    }
}

/// Maps each [`Shape`] to its handler.
#[derive(Clone)]
pub struct HandlerTable {
    handlers: HashMap<Shape, Arc<dyn ShapeHandler>>,
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shapes: Vec<_> = self.handlers.keys().map(|s| s.name()).collect();
        shapes.sort_unstable();
        f.debug_struct("HandlerTable").field("shapes", &shapes).finish()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl HandlerTable {
    /// Handlers for every built-in shape.
    pub fn standard() -> Self {
        let string: Arc<dyn ShapeHandler> = Arc::new(StringHandler);
        let handlers = HashMap::from([
            (Shape::String, string.clone()),
            (Shape::Json, string),
            (Shape::Hash, Arc::new(HashHandler) as Arc<dyn ShapeHandler>),
            (Shape::List, Arc::new(ListHandler) as Arc<dyn ShapeHandler>),
            (Shape::Set, Arc::new(SetHandler) as Arc<dyn ShapeHandler>),
            (Shape::Sorted, Arc::new(SortedHandler) as Arc<dyn ShapeHandler>),
        ]);
        Self { handlers }
    }

    /// Replace the handler for `shape`.
    pub fn with(mut self, shape: Shape, handler: Arc<dyn ShapeHandler>) -> Self {
        self.handlers.insert(shape, handler);
        self
    }

    /// Handler for `shape`, falling back to the string handler.
    pub fn resolve(&self, shape: Shape) -> Arc<dyn ShapeHandler> {
        self.handlers
            .get(&shape)
            .or_else(|| self.handlers.get(&Shape::String))
            .cloned()
            .unwrap_or_else(|| Arc::new(StringHandler))
    }
}
