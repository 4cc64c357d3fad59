//! Computations bound to a cache.
//!
//! ```ignore
//! let users = cache
//!     .decorator(Some("user:{}"), Options::new().shape(Shape::Hash).time(300))
//!     .wrap(|args: &Args| load_user(args.get(0)));
//!
//! let row = users.call(&Args::positional(["alice"]))?;
//! ```

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::keys::KeyFormatter;
use crate::options::Options;
use crate::value::{Args, Value};

/// A computation whose results can be cached.
pub trait Computation: Send + Sync {
    /// Name used to derive a default key.
    fn name(&self) -> Cow<'_, str>;

    /// Compute the value for `args`.
    fn compute(&self, args: &Args) -> anyhow::Result<Value>;
}

impl<C: Computation + ?Sized> Computation for &C {
    fn name(&self) -> Cow<'_, str> {
        (**self).name()
    }

    fn compute(&self, args: &Args) -> anyhow::Result<Value> {
        (**self).compute(args)
    }
}

impl<C: Computation + ?Sized> Computation for Arc<C> {
    fn name(&self) -> Cow<'_, str> {
        (**self).name()
    }

    fn compute(&self, args: &Args) -> anyhow::Result<Value> {
        (**self).compute(args)
    }
}

/// A [`Computation`] backed by a function or closure.
pub struct FnComputation<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> FnComputation<F> {
    /// Wrap `f`, naming it after its type path.
    ///
    /// Plain `fn` items get their own name; closures get the name of the
    /// function they are defined in.
    pub fn from_fn(f: F) -> Self {
        Self {
            name: Cow::Borrowed(computation_name::<F>()),
            f,
        }
    }

    /// Wrap `f` under an explicit name.
    pub fn named(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnComputation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComputation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F, T> Computation for FnComputation<F>
where
    F: Fn(&Args) -> anyhow::Result<T> + Send + Sync,
    T: Into<Value>,
{
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn compute(&self, args: &Args) -> anyhow::Result<Value> {
        (self.f)(args).map(Into::into)
    }
}

fn computation_name<F>() -> &'static str {
    let full = type_name::<F>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::")
        .find(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .unwrap_or(path)
}

/// Key and options waiting for a computation. Created by
/// [`Cache::decorator`].
#[derive(Debug)]
pub struct CacheDecorator<'c> {
    cache: &'c Cache,
    key: Option<String>,
    options: Options,
    default: Option<Value>,
}

impl<'c> CacheDecorator<'c> {
    pub(crate) fn new(cache: &'c Cache, key: Option<String>, options: Options) -> Self {
        Self {
            cache,
            key,
            options,
            default: cache.default_value().cloned(),
        }
    }

    /// Value `cached()` returns on a miss. Takes precedence over the
    /// cache's default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Bind a function or closure, named after its type path.
    pub fn wrap<F, T>(self, f: F) -> CacheWrapper<'c, FnComputation<F>>
    where
        F: Fn(&Args) -> anyhow::Result<T> + Send + Sync,
        T: Into<Value>,
    {
        self.wrap_computation(FnComputation::from_fn(f))
    }

    /// Bind a function or closure under an explicit name.
    pub fn wrap_named<F, T>(
        self,
        name: impl Into<Cow<'static, str>>,
        f: F,
    ) -> CacheWrapper<'c, FnComputation<F>>
    where
        F: Fn(&Args) -> anyhow::Result<T> + Send + Sync,
        T: Into<Value>,
    {
        self.wrap_computation(FnComputation::named(name, f))
    }

    /// Bind any [`Computation`].
    pub fn wrap_computation<C: Computation>(self, computation: C) -> CacheWrapper<'c, C> {
        let template = self
            .key
            .unwrap_or_else(|| KeyFormatter::default_template(&computation.name()));
        CacheWrapper {
            cache: self.cache,
            template,
            options: self.options,
            default: self.default,
            computation,
        }
    }
}

/// A computation whose results are kept in a [`Cache`].
///
/// Holds no state between calls. When the cache is disabled every entry
/// point computes and nothing touches the backend.
pub struct CacheWrapper<'c, C> {
    cache: &'c Cache,
    template: String,
    options: Options,
    default: Option<Value>,
    computation: C,
}

impl<C: Computation> fmt::Debug for CacheWrapper<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheWrapper")
            .field("key", &self.template)
            .field("computation", &self.computation.name())
            .field("options", &self.options)
            .field("default", &self.default)
            .finish()
    }
}

impl<'c, C: Computation> CacheWrapper<'c, C> {
    /// Key template.
    pub fn key(&self) -> &str {
        &self.template
    }

    /// Options passed on every cache call.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Whether a default value is bound.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The bound cache.
    pub fn cache(&self) -> &'c Cache {
        self.cache
    }

    /// Concrete key for `args`.
    pub fn key_for(&self, args: &Args) -> CacheResult<String> {
        self.cache.prepare_key(&self.template, args)
    }

    /// Read the cached value without computing.
    ///
    /// A miss returns the bound default, or [`CacheError::NotFound`].
    pub fn cached(&self, args: &Args) -> CacheResult<Value> {
        if !self.cache.is_enabled() {
            return self.compute(args);
        }

        let key = self.key_for(args)?;
        match self.cache.get(&key, &self.options) {
            Err(CacheError::NotFound { .. }) if self.default.is_some() => {
                debug!(key = %key, "Cache miss, using default");
                Ok(self.default.clone().unwrap_or_default())
            }
            other => other,
        }
    }

    /// Compute and store, whatever is cached.
    pub fn refresh(&self, args: &Args) -> CacheResult<Value> {
        if !self.cache.is_enabled() {
            return self.compute(args);
        }

        let key = self.key_for(args)?;
        self.cache.serialized(&key, || self.store_fresh(&key, args))
    }

    /// Return the cached value, computing and storing it on a miss.
    pub fn get(&self, args: &Args) -> CacheResult<Value> {
        if !self.cache.is_enabled() {
            return self.compute(args);
        }

        let key = self.key_for(args)?;
        self.cache.serialized(&key, || match self.cache.get(&key, &self.options) {
            Err(CacheError::NotFound { .. }) => self.store_fresh(&key, args),
            other => other,
        })
    }

    /// Same as [`CacheWrapper::get`].
    pub fn call(&self, args: &Args) -> CacheResult<Value> {
        self.get(args)
    }

    fn store_fresh(&self, key: &str, args: &Args) -> CacheResult<Value> {
        let value = self.compute(args)?;
        self.cache.set(key, &value, &self.options)?;
        Ok(value)
    }

    fn compute(&self, args: &Args) -> CacheResult<Value> {
        debug!(computation = %self.computation.name(), "Computing value");
        self.computation
            .compute(args)
            .map_err(CacheError::Computation)
    }
}
