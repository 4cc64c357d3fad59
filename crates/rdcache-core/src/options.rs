//! Per-call cache options and value shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Backend-native structure a cache entry is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Shape {
    /// Plain string value (the generic shape).
    #[default]
    String,
    /// String value always holding a JSON document.
    Json,
    /// Field/value mapping.
    Hash,
    /// Ordered sequence.
    List,
    /// Unordered set of members.
    Set,
    /// Members ordered by a numeric score.
    Sorted,
}

impl Shape {
    /// All shapes.
    pub const ALL: [Shape; 6] = [
        Shape::String,
        Shape::Json,
        Shape::Hash,
        Shape::List,
        Shape::Set,
        Shape::Sorted,
    ];

    /// Resolve a shape name. Unknown names fall back to [`Shape::String`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "hash" => Self::Hash,
            "list" => Self::List,
            "set" => Self::Set,
            "zset" | "sorted" | "sorted_set" => Self::Sorted,
            "" | "string" | "str" | "value" | "data" => Self::String,
            other => {
                tracing::debug!(shape = other, "unknown shape, using string");
                Self::String
            }
        }
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Json => "json",
            Self::Hash => "hash",
            Self::List => "list",
            Self::Set => "set",
            Self::Sorted => "zset",
        }
    }

    /// Whether entries of this shape are backend collections.
    pub fn is_collection(self) -> bool {
        matches!(self, Self::Hash | Self::List | Self::Set | Self::Sorted)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Shape {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for Shape {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Shape> for String {
    fn from(shape: Shape) -> Self {
        shape.name().to_string()
    }
}

/// Names of recognized options, used for backend allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    /// Seconds until expiry (`time`, alias `timeout`).
    Time,
    /// Value shape (`type`, alias `valtype`).
    Type,
    /// Refresh the TTL on read hits.
    Touch,
    /// Persist the null sentinel.
    FillNone,
    /// Sorted-set member score.
    Score,
    /// Include scores in sorted-set reads.
    WithScores,
}

impl OptionName {
    /// Resolve an option name, normalizing `timeout` and `valtype`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "time" | "timeout" => Some(Self::Time),
            "type" | "valtype" => Some(Self::Type),
            "touch" => Some(Self::Touch),
            "fill_none" => Some(Self::FillNone),
            "score" => Some(Self::Score),
            "withscores" => Some(Self::WithScores),
            _ => None,
        }
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Type => "type",
            Self::Touch => "touch",
            Self::FillNone => "fill_none",
            Self::Score => "score",
            Self::WithScores => "withscores",
        }
    }
}

/// Options bag for one cache call.
///
/// Every field is optional so that bags can be layered: constructor defaults
/// first, then per-call overrides via [`Options::merged`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Seconds until expiry. Negative means no expiry change.
    #[serde(alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Value shape.
    #[serde(rename = "type", alias = "valtype", skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    /// Refresh the TTL on read hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch: Option<bool>,
    /// Persist the null sentinel so empty results are hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_none: Option<bool>,
    /// Score for sorted-set writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Include scores in sorted-set reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withscores: Option<bool>,
}

impl Options {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from string pairs, as found in env vars or query strings.
    ///
    /// Unrecognized names are ignored so callers may pass superset bags.
    pub fn from_pairs<I, K, V>(pairs: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (name, value) in pairs {
            if let Some(name) = OptionName::parse(name.as_ref()) {
                options.set(name, value.as_ref())?;
            }
        }
        Ok(options)
    }

    /// Set one option from its string form.
    pub fn set(&mut self, name: OptionName, raw: &str) -> CacheResult<()> {
        let invalid = || CacheError::InvalidOption {
            name: name.name(),
            value: raw.to_string(),
        };
        match name {
            OptionName::Time => self.time = Some(raw.trim().parse().map_err(|_| invalid())?),
            OptionName::Type => self.shape = Some(Shape::parse(raw)),
            OptionName::Touch => self.touch = Some(parse_flag(raw).ok_or_else(invalid)?),
            OptionName::FillNone => self.fill_none = Some(parse_flag(raw).ok_or_else(invalid)?),
            OptionName::Score => self.score = Some(raw.trim().parse().map_err(|_| invalid())?),
            OptionName::WithScores => {
                self.withscores = Some(parse_flag(raw).ok_or_else(invalid)?)
            }
        }
        Ok(())
    }

    /// Set the expiry in seconds.
    pub fn time(mut self, seconds: i64) -> Self {
        self.time = Some(seconds);
        self
    }

    /// Alias of [`Options::time`].
    pub fn timeout(self, seconds: i64) -> Self {
        self.time(seconds)
    }

    /// Set the value shape.
    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Set the value shape by name.
    pub fn valtype(self, name: &str) -> Self {
        self.shape(Shape::parse(name))
    }

    /// Refresh the TTL on every read hit.
    pub fn touch(mut self) -> Self {
        self.touch = Some(true);
        self
    }

    /// Persist null and empty results.
    pub fn fill_none(mut self) -> Self {
        self.fill_none = Some(true);
        self
    }

    /// Score for sorted-set writes.
    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Include scores in sorted-set reads.
    pub fn withscores(mut self) -> Self {
        self.withscores = Some(true);
        self
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merged(&self, overrides: &Options) -> Options {
        Options {
            time: overrides.time.or(self.time),
            shape: overrides.shape.or(self.shape),
            touch: overrides.touch.or(self.touch),
            fill_none: overrides.fill_none.or(self.fill_none),
            score: overrides.score.or(self.score),
            withscores: overrides.withscores.or(self.withscores),
        }
    }

    /// Copy keeping only the options named in `accepted`.
    pub fn retain(&self, accepted: &[OptionName]) -> Options {
        let keep = |name| accepted.contains(&name);
        Options {
            time: self.time.filter(|_| keep(OptionName::Time)),
            shape: self.shape.filter(|_| keep(OptionName::Type)),
            touch: self.touch.filter(|_| keep(OptionName::Touch)),
            fill_none: self.fill_none.filter(|_| keep(OptionName::FillNone)),
            score: self.score.filter(|_| keep(OptionName::Score)),
            withscores: self.withscores.filter(|_| keep(OptionName::WithScores)),
        }
    }

    /// Effective shape, defaulting to [`Shape::String`].
    pub fn resolved_shape(&self) -> Shape {
        self.shape.unwrap_or_default()
    }

    /// Expiry to apply after a write, if any.
    pub fn expiry(&self) -> Option<i64> {
        self.time.filter(|t| *t >= 0)
    }

    /// Whether reads refresh the TTL.
    pub fn is_touch(&self) -> bool {
        self.touch.unwrap_or(false)
    }

    /// Whether null results are persisted.
    pub fn is_fill_none(&self) -> bool {
        self.fill_none.unwrap_or(false)
    }

    /// Whether sorted-set reads include scores.
    pub fn is_withscores(&self) -> bool {
        self.withscores.unwrap_or(false)
    }

    /// Sorted-set score, defaulting to 0.0.
    pub fn score_or_default(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
