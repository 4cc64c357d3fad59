//! Application values and call arguments.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

/// Date rendering used for keys and backend storage.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Datetime rendering used for keys and backend storage.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value produced by a computation or read back from the cache.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Logical null: the computation legitimately returned nothing.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Str(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without zone.
    DateTime(NaiveDateTime),
    /// Fixed-point decimal.
    Decimal(BigDecimal),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Set of backend-coerced members.
    Set(BTreeSet<String>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Whether this is the logical null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is a list, set or map.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Map(_))
    }

    /// Whether this is a list, set or map with no members.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Set(members) => members.is_empty(),
            Self::Map(fields) => fields.is_empty(),
            _ => false,
        }
    }

    /// Borrow as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Borrow as a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Borrow as a set.
    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Set(members) => Some(members),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Decimal(_) => "decimal",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Set(members) => {
                f.write_str("{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(member)?;
                }
                f.write_str("}")
            }
            Self::Map(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{name}:{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<BigDecimal> for Value {
    fn from(d: BigDecimal) -> Self {
        Self::Decimal(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(members: BTreeSet<String>) -> Self {
        Self::Set(members)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(fields: BTreeMap<String, V>) -> Self {
        Self::Map(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(fields: HashMap<String, V>) -> Self {
        Self::Map(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Self::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Arguments of one call to a wrapped computation.
///
/// The same arguments render the cache key and are handed to the computation
/// on a miss.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from positional values.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: BTreeMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Positional values in call order.
    pub fn positional_values(&self) -> &[Value] {
        &self.positional
    }

    /// Named values.
    pub fn named_values(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    /// Positional value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Named value for `name`.
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Whether any positional argument was given.
    pub fn has_positional(&self) -> bool {
        !self.positional.is_empty()
    }

    /// Whether no argument at all was given.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalars() {
        let date = NaiveDate::from_ymd_opt(1988, 9, 9).unwrap();
        let at = date.and_hms_opt(7, 5, 0).unwrap();

        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from("bob").to_string(), "bob");
        assert_eq!(Value::from(date).to_string(), "1988-09-09");
        assert_eq!(Value::from(at).to_string(), "1988-09-09 07:05:00");
        assert_eq!(Value::Null.to_string(), "None");
    }

    #[test]
    fn test_from_json_prefers_integers() {
        let json = serde_json::json!({"count": 3, "ratio": 0.5, "tags": ["a", "b"]});
        let value = Value::from(json);
        let fields = value.as_map().unwrap();

        assert_eq!(fields["count"], Value::Int(3));
        assert_eq!(fields["ratio"], Value::Float(0.5));
        assert_eq!(fields["tags"], Value::from(vec!["a", "b"]));
    }

    #[test]
    fn test_option_maps_to_null() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some(7)), Value::Int(7));
    }

    #[test]
    fn test_empty_collection() {
        assert!(Value::List(vec![]).is_empty_collection());
        assert!(Value::Map(BTreeMap::new()).is_empty_collection());
        assert!(!Value::from("").is_empty_collection());
        assert!(!Value::from(vec![1]).is_empty_collection());
    }

    #[test]
    fn test_args_builder() {
        let args = Args::new().arg(1).kwarg("two", 2);

        assert!(args.has_positional());
        assert_eq!(args.get(0), Some(&Value::Int(1)));
        assert_eq!(args.named("two"), Some(&Value::Int(2)));
        assert!(Args::new().is_empty());
    }
}
