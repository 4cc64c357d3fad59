//! Memoization over pluggable key-value backends.
//!
//! A [`Cache`] maps application [`Value`]s onto the native shapes of a
//! [`Backend`] (strings, hashes, lists, sets and sorted sets), and a
//! [`CacheWrapper`] turns any computation into a cached one:
//!
//! ```
//! use std::sync::Arc;
//! use rdcache_core::{Args, Cache, MemoryBackend, Options, Value};
//!
//! let cache = Cache::new(Arc::new(MemoryBackend::new()));
//! let square = cache
//!     .decorator(Some("square:{}"), Options::new().time(60))
//!     .wrap(|args: &Args| {
//!         let n = args.get(0).and_then(Value::as_i64).unwrap_or_default();
//!         anyhow::Ok(n * n)
//!     });
//!
//! assert_eq!(square.call(&Args::positional([7])).unwrap(), Value::Int(49));
//! assert!(cache.exists("square:7").unwrap());
//! ```

#![warn(missing_docs)]

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod codec;
pub mod error;
pub mod keys;
pub mod locks;
pub mod options;
pub mod value;
pub mod wrapper;

pub use adapter::{BackendAdapter, Operation};
pub use backend::{Backend, MemoryBackend, RangeReply};
pub use cache::{Cache, CacheBuilder, CacheStats, HandlerTable, ShapeHandler};
pub use codec::{Stored, ValueCodec, CACHE_NONE};
pub use error::{BackendError, BackendResult, CacheError, CacheResult, FormatError};
pub use keys::KeyFormatter;
pub use locks::KeyLocks;
pub use options::{OptionName, Options, Shape};
pub use value::{Args, Value};
pub use wrapper::{CacheDecorator, CacheWrapper, Computation, FnComputation};
