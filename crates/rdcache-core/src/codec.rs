//! Conversion between application values and backend-native representations.

use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::ToPrimitive;

use crate::error::{CacheError, CacheResult};
use crate::options::{Options, Shape};
use crate::value::{Value, DATETIME_FORMAT, DATE_FORMAT};

/// Stored marker for "the computation returned nothing".
pub const CACHE_NONE: &str = "###CACHE_NONE###";

/// A value in backend-native form.
#[derive(Debug, Clone, PartialEq)]
pub enum Stored {
    /// Plain string.
    Str(String),
    /// Field/value mapping.
    Hash(BTreeMap<String, String>),
    /// Ordered sequence.
    List(Vec<String>),
    /// Unordered members.
    Set(BTreeSet<String>),
    /// Members with scores, ascending by score.
    Sorted(Vec<(String, f64)>),
}

impl Stored {
    /// The null sentinel in the representation of `shape`.
    pub fn sentinel(shape: Shape) -> Self {
        let marker = CACHE_NONE.to_string();
        match shape {
            Shape::String | Shape::Json => Self::Str(marker),
            Shape::Hash => Self::Hash(BTreeMap::from([(marker.clone(), marker)])),
            Shape::List => Self::List(vec![marker]),
            Shape::Set => Self::Set(BTreeSet::from([marker])),
            Shape::Sorted => Self::Sorted(vec![(marker, 0.0)]),
        }
    }

    /// Whether this holds nothing but the null sentinel.
    pub fn is_sentinel(&self) -> bool {
        match self {
            Self::Str(s) => s == CACHE_NONE,
            Self::Hash(fields) => {
                fields.len() == 1 && fields.get(CACHE_NONE).is_some_and(|v| v == CACHE_NONE)
            }
            Self::List(items) => items.len() == 1 && items[0] == CACHE_NONE,
            Self::Set(members) => members.len() == 1 && members.contains(CACHE_NONE),
            Self::Sorted(members) => members.len() == 1 && members[0].0 == CACHE_NONE,
        }
    }

    /// Whether this is a collection with no members.
    pub fn is_backend_empty(&self) -> bool {
        match self {
            Self::Str(_) => false,
            Self::Hash(fields) => fields.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Set(members) => members.is_empty(),
            Self::Sorted(members) => members.is_empty(),
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Hash(_) => "hash",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Sorted(_) => "zset",
        }
    }
}

/// Encodes values for storage and decodes them on the way back.
///
/// Scalars are coerced to backend-safe strings: dates as `YYYY-MM-DD`,
/// datetimes as `YYYY-MM-DD HH:MM:SS`, decimals through `f64`. With `json`
/// enabled (the default), the string shape stores text, dates and decimals
/// in that plain form and everything else as a JSON document. Text that
/// would read back as JSON is quoted so it stays a string.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    json: bool,
}

impl Default for ValueCodec {
    fn default() -> Self {
        Self { json: true }
    }
}

impl ValueCodec {
    /// Codec with JSON payloads enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that stores plain coerced strings on the string shape.
    pub fn raw() -> Self {
        Self { json: false }
    }

    /// Toggle JSON payloads on the string shape.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Whether JSON payloads are enabled.
    pub fn json_enabled(&self) -> bool {
        self.json
    }

    /// Encode `value` into the representation of `shape`.
    pub fn prepare(&self, value: &Value, shape: Shape, options: &Options) -> CacheResult<Stored> {
        if value.is_null() {
            return Ok(Stored::sentinel(shape));
        }
        if shape.is_collection() && value.is_empty_collection() && options.is_fill_none() {
            return Ok(Stored::sentinel(shape));
        }

        match shape {
            Shape::String if self.json => Ok(Stored::Str(self.string_payload(value)?)),
            Shape::String => Ok(Stored::Str(self.coerce_scalar(value)?)),
            Shape::Json => Ok(Stored::Str(to_json_text(value)?)),
            Shape::Hash => match value {
                Value::Map(fields) => fields
                    .iter()
                    .map(|(name, v)| Ok((name.clone(), self.coerce_member(v)?)))
                    .collect::<CacheResult<_>>()
                    .map(Stored::Hash),
                other => Err(CacheError::codec(format!(
                    "hash shape needs a map, got {}",
                    other.kind()
                ))),
            },
            Shape::List => match value {
                Value::List(items) => items
                    .iter()
                    .map(|v| self.coerce_member(v))
                    .collect::<CacheResult<_>>()
                    .map(Stored::List),
                Value::Set(members) => Ok(Stored::List(members.iter().cloned().collect())),
                other => Err(CacheError::codec(format!(
                    "list shape needs a sequence, got {}",
                    other.kind()
                ))),
            },
            Shape::Set => match value {
                Value::List(items) => items
                    .iter()
                    .map(|v| self.coerce_member(v))
                    .collect::<CacheResult<_>>()
                    .map(Stored::Set),
                Value::Set(members) => Ok(Stored::Set(members.clone())),
                Value::Map(_) => Err(CacheError::codec("set shape cannot hold a map")),
                scalar => Ok(Stored::Set(BTreeSet::from([self.coerce_scalar(scalar)?]))),
            },
            Shape::Sorted => match value {
                Value::List(items) => items
                    .iter()
                    .map(|item| self.scored_member(item, options))
                    .collect::<CacheResult<_>>()
                    .map(Stored::Sorted),
                Value::Set(members) => Ok(Stored::Sorted(
                    members
                        .iter()
                        .map(|m| (m.clone(), options.score_or_default()))
                        .collect(),
                )),
                Value::Map(_) => Err(CacheError::codec("sorted set shape cannot hold a map")),
                scalar => Ok(Stored::Sorted(vec![(
                    self.coerce_scalar(scalar)?,
                    options.score_or_default(),
                )])),
            },
        }
    }

    /// Decode a stored value read under `shape`.
    ///
    /// Collection members come back as strings, their backend-native form.
    pub fn unprepare(&self, stored: Stored, shape: Shape) -> CacheResult<Value> {
        if stored.is_sentinel() {
            return Ok(Value::Null);
        }

        match stored {
            Stored::Str(text) => match shape {
                Shape::Json => serde_json::from_str::<serde_json::Value>(&text)
                    .map(Value::from)
                    .map_err(|e| CacheError::codec(format!("invalid JSON payload: {e}"))),
                // Values written by other clients may not be JSON at all.
                _ if self.json => Ok(serde_json::from_str::<serde_json::Value>(&text)
                    .map(Value::from)
                    .unwrap_or(Value::Str(text))),
                _ => Ok(Value::Str(text)),
            },
            Stored::Hash(fields) => Ok(Value::Map(
                fields
                    .into_iter()
                    .map(|(name, v)| (name, decode_member(v)))
                    .collect(),
            )),
            Stored::List(items) => Ok(Value::List(items.into_iter().map(decode_member).collect())),
            Stored::Set(members) => Ok(Value::Set(members)),
            Stored::Sorted(members) => Ok(Value::List(
                members
                    .into_iter()
                    .map(|(member, score)| {
                        Value::List(vec![Value::Str(member), Value::Float(score)])
                    })
                    .collect(),
            )),
        }
    }

    /// Whether a stored value counts as a cache miss.
    ///
    /// Empty collections are always misses. The sentinel is a miss unless
    /// `fill_none` is set, in which case it is a hit decoding to null.
    pub fn is_empty(&self, stored: &Stored, options: &Options) -> bool {
        stored.is_backend_empty() || (stored.is_sentinel() && !options.is_fill_none())
    }

    /// Coerce a scalar to its backend string.
    pub fn coerce_scalar(&self, value: &Value) -> CacheResult<String> {
        match value {
            Value::Null => Ok(CACHE_NONE.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(x) => Ok(x.to_string()),
            Value::Str(s) if s == CACHE_NONE => Err(CacheError::codec(
                "string collides with the null sentinel",
            )),
            Value::Str(s) => Ok(s.clone()),
            Value::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => Ok(dt.format(DATETIME_FORMAT).to_string()),
            Value::Decimal(d) => decimal_to_f64(d).map(|x| x.to_string()),
            structured if self.json => to_json_text(structured),
            structured => Err(CacheError::codec(format!(
                "{} needs JSON payloads to be stored as a string",
                structured.kind()
            ))),
        }
    }

    fn string_payload(&self, value: &Value) -> CacheResult<String> {
        match value {
            Value::Str(s) if s == CACHE_NONE || is_json_text(s) => to_json_text(value),
            Value::Str(_) | Value::Date(_) | Value::DateTime(_) | Value::Decimal(_) => {
                self.coerce_scalar(value)
            }
            _ => to_json_text(value),
        }
    }

    fn coerce_member(&self, value: &Value) -> CacheResult<String> {
        self.coerce_scalar(value)
    }

    fn scored_member(&self, item: &Value, options: &Options) -> CacheResult<(String, f64)> {
        if let Value::List(pair) = item {
            if let [member, score] = pair.as_slice() {
                let score = match score {
                    Value::Decimal(d) => decimal_to_f64(d)?,
                    other => other.as_f64().ok_or_else(|| {
                        CacheError::codec(format!("score must be numeric, got {}", other.kind()))
                    })?,
                };
                return Ok((self.coerce_scalar(member)?, score));
            }
        }
        Ok((self.coerce_scalar(item)?, options.score_or_default()))
    }
}

fn decode_member(member: String) -> Value {
    if member == CACHE_NONE {
        Value::Null
    } else {
        Value::Str(member)
    }
}

fn is_json_text(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn decimal_to_f64(d: &bigdecimal::BigDecimal) -> CacheResult<f64> {
    d.to_f64()
        .ok_or_else(|| CacheError::codec(format!("decimal {d} does not fit a float")))
}

fn to_json(value: &Value) -> CacheResult<serde_json::Value> {
    use serde_json::Value as Json;

    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(Json::Number)
            .ok_or_else(|| CacheError::codec(format!("{x} is not representable in JSON")))?,
        Value::Str(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => Json::String(dt.format(DATETIME_FORMAT).to_string()),
        Value::Decimal(d) => {
            let x = decimal_to_f64(d)?;
            serde_json::Number::from_f64(x)
                .map(Json::Number)
                .ok_or_else(|| CacheError::codec(format!("{d} is not representable in JSON")))?
        }
        Value::List(items) => Json::Array(items.iter().map(to_json).collect::<CacheResult<_>>()?),
        Value::Set(members) => Json::Array(members.iter().cloned().map(Json::String).collect()),
        Value::Map(fields) => Json::Object(
            fields
                .iter()
                .map(|(name, v)| Ok((name.clone(), to_json(v)?)))
                .collect::<CacheResult<_>>()?,
        ),
    })
}

fn to_json_text(value: &Value) -> CacheResult<String> {
    let json = to_json(value)?;
    serde_json::to_string(&json).map_err(|e| CacheError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn birthday() -> NaiveDate {
        NaiveDate::from_ymd_opt(1981, 10, 10).unwrap()
    }

    #[test]
    fn test_null_uses_sentinel_in_every_shape() {
        let codec = ValueCodec::new();
        for shape in Shape::ALL {
            let stored = codec.prepare(&Value::Null, shape, &Options::new()).unwrap();
            assert!(stored.is_sentinel(), "{shape} sentinel");
            assert_eq!(codec.unprepare(stored, shape).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_scalar_coercion() {
        let codec = ValueCodec::raw();
        let at = birthday().and_hms_opt(8, 30, 5).unwrap();

        assert_eq!(codec.coerce_scalar(&Value::from(birthday())).unwrap(), "1981-10-10");
        assert_eq!(codec.coerce_scalar(&Value::from(at)).unwrap(), "1981-10-10 08:30:05");
        assert_eq!(
            codec
                .coerce_scalar(&Value::from(BigDecimal::from_str("12.50").unwrap()))
                .unwrap(),
            "12.5"
        );
        assert_eq!(codec.coerce_scalar(&Value::from(7)).unwrap(), "7");
    }

    #[test]
    fn test_json_string_shape_keeps_types() {
        let codec = ValueCodec::new();
        let value = Value::from(vec![Value::from(1), Value::from("two")]);

        let stored = codec.prepare(&value, Shape::String, &Options::new()).unwrap();
        assert_eq!(stored, Stored::Str(r#"[1,"two"]"#.to_string()));
        assert_eq!(codec.unprepare(stored, Shape::String).unwrap(), value);
    }

    #[test]
    fn test_json_string_shape_stores_plain_scalars() {
        let codec = ValueCodec::new();
        let at = birthday().and_hms_opt(8, 30, 5).unwrap();
        let cases = [
            (Value::from("bob"), "bob"),
            (Value::from(birthday()), "1981-10-10"),
            (Value::from(at), "1981-10-10 08:30:05"),
            (Value::from(BigDecimal::from_str("12.50").unwrap()), "12.5"),
            (Value::from(7), "7"),
            (Value::Float(1.0), "1.0"),
            (Value::from("42"), r#""42""#),
            (Value::from("true"), r#""true""#),
        ];

        for (value, text) in cases {
            let stored = codec.prepare(&value, Shape::String, &Options::new()).unwrap();
            assert_eq!(stored, Stored::Str(text.to_string()), "{value:?}");
        }

        let stored = codec
            .prepare(&Value::from("42"), Shape::String, &Options::new())
            .unwrap();
        assert_eq!(codec.unprepare(stored, Shape::String).unwrap(), Value::from("42"));
    }

    #[test]
    fn test_raw_codec_rejects_structured_strings() {
        let codec = ValueCodec::raw();
        let err = codec
            .prepare(&Value::from(vec![1, 2]), Shape::String, &Options::new())
            .unwrap_err();
        assert!(matches!(err, CacheError::Codec { .. }));
    }

    #[test]
    fn test_raw_codec_rejects_sentinel_collision() {
        let codec = ValueCodec::raw();
        let err = codec
            .prepare(&Value::from(CACHE_NONE), Shape::String, &Options::new())
            .unwrap_err();
        assert!(matches!(err, CacheError::Codec { .. }));
    }

    #[test]
    fn test_json_codec_escapes_sentinel_text() {
        let codec = ValueCodec::new();
        let stored = codec
            .prepare(&Value::from(CACHE_NONE), Shape::String, &Options::new())
            .unwrap();
        assert!(!stored.is_sentinel());
        assert_eq!(
            codec.unprepare(stored, Shape::String).unwrap(),
            Value::from(CACHE_NONE)
        );
    }

    #[test]
    fn test_non_json_text_passes_through() {
        let codec = ValueCodec::new();
        let value = codec
            .unprepare(Stored::Str("plain words".into()), Shape::String)
            .unwrap();
        assert_eq!(value, Value::from("plain words"));

        let err = codec
            .unprepare(Stored::Str("plain words".into()), Shape::Json)
            .unwrap_err();
        assert!(matches!(err, CacheError::Codec { .. }));
    }

    #[test]
    fn test_hash_members_are_coerced() {
        let codec = ValueCodec::new();
        let mut row = BTreeMap::new();
        row.insert("username".to_string(), Value::from("alice"));
        row.insert("birthday".to_string(), Value::from(birthday()));

        let stored = codec
            .prepare(&Value::Map(row), Shape::Hash, &Options::new())
            .unwrap();
        let Stored::Hash(fields) = stored else {
            panic!("expected hash");
        };
        assert_eq!(fields["birthday"], "1981-10-10");
        assert_eq!(fields["username"], "alice");
    }

    #[test]
    fn test_sorted_pairs_carry_their_scores() {
        let codec = ValueCodec::new();
        let value = Value::from(vec![
            Value::from(vec![Value::from("alice"), Value::from(1981)]),
            Value::from("bob"),
        ]);

        let stored = codec
            .prepare(&value, Shape::Sorted, &Options::new().score(5.0))
            .unwrap();
        assert_eq!(
            stored,
            Stored::Sorted(vec![("alice".into(), 1981.0), ("bob".into(), 5.0)])
        );
    }

    #[test]
    fn test_emptiness_policy() {
        let codec = ValueCodec::new();
        let plain = Options::new();
        let fill = Options::new().fill_none();

        assert!(codec.is_empty(&Stored::Hash(BTreeMap::new()), &plain));
        assert!(codec.is_empty(&Stored::Hash(BTreeMap::new()), &fill));
        assert!(codec.is_empty(&Stored::sentinel(Shape::String), &plain));
        assert!(!codec.is_empty(&Stored::sentinel(Shape::String), &fill));
        assert!(!codec.is_empty(&Stored::Str("1".into()), &plain));
    }

    #[test]
    fn test_fill_none_persists_empty_collections() {
        let codec = ValueCodec::new();
        let empty = Value::List(vec![]);

        let stored = codec
            .prepare(&empty, Shape::List, &Options::new().fill_none())
            .unwrap();
        assert!(stored.is_sentinel());

        let stored = codec.prepare(&empty, Shape::List, &Options::new()).unwrap();
        assert!(stored.is_backend_empty());
    }
}
