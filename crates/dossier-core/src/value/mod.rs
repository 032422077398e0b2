//! Module: value
//! Responsibility: the tagged value type stored in record fields and the
//! comparison functions used for ordering and coercion.
//! Does not own: hashable-key coercion (see `crate::key`) or multi-field
//! sort-key assembly (see `crate::db::order`).

mod compare;
mod float;

pub use compare::canonical_cmp;
pub use float::Float;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::hash::{Hash, Hasher};

///
/// Value
///
/// A dynamically typed field value. Records are sparse maps of field name
/// to `Value`; no schema constrains which variant a given field may hold
/// across different records.
///
/// `PartialOrd` only compares values of the same variant and returns `None`
/// across variants — it is not the canonical total order used by indexing
/// and sorting. Use [`canonical_cmp`] for that.
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(Float),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
    Duration(i64),
    Date(i32),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Duration(_) => "duration",
            Self::Date(_) => "date",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Builds a `Map` value from entries, sorting by canonical key order and
    /// rejecting duplicate keys is intentionally not enforced here — callers
    /// that need uniqueness call `from_map_checked`.
    #[must_use]
    pub fn from_map(mut entries: Vec<(Value, Value)>) -> Self {
        entries.sort_by(|a, b| canonical_cmp(&a.0, &b.0));
        Self::Map(entries)
    }

    /// Attempts to convert the value to an `i128` for use as a numeric sort
    /// key under descending ordering. Composite types have no such
    /// converter.
    #[must_use]
    pub fn to_numeric(&self) -> Option<i128> {
        match self {
            Self::Int(i) => Some(i128::from(*i)),
            Self::Timestamp(t) | Self::Duration(t) => Some(i128::from(*t)),
            Self::Date(d) => Some(i128::from(*d)),
            Self::Bool(b) => Some(i128::from(*b)),
            Self::Float(f) => Some(f.to_order_key()),
            Self::Bytes(b) => Some(
                b.iter()
                    .fold(0i128, |acc, byte| (acc << 8) | i128::from(*byte)),
            ),
            Self::Null | Self::Text(_) | Self::List(_) | Self::Set(_) | Self::Map(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        canonical_cmp(self, other) == CmpOrdering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        crate::key::hash_value(self, state);
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(CmpOrdering::Equal),
            (Self::Bool(a), Self::Bool(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Int(b)) => a.partial_cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.partial_cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.partial_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b))
            | (Self::Duration(a), Self::Duration(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.partial_cmp(b),
            (Self::List(a), Self::List(b)) => a.partial_cmp(b),
            (Self::Set(a), Self::Set(b)) => a.partial_cmp(b),
            (Self::Map(a), Self::Map(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    String => Text,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(Float::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_variant_partial_cmp_is_none() {
        assert_eq!(Value::Int(1).partial_cmp(&Value::Text("1".into())), None);
    }

    #[test]
    fn same_variant_eq_uses_canonical_cmp() {
        assert_eq!(Value::from(1i64), Value::from(1i64));
        assert_ne!(Value::from(1i64), Value::from(2i64));
    }

    #[test]
    fn map_from_entries_sorts_by_key() {
        let map = Value::from_map(vec![
            (Value::from("b"), Value::from(2i64)),
            (Value::from("a"), Value::from(1i64)),
        ]);
        let Value::Map(entries) = map else { panic!("expected map") };
        assert_eq!(entries[0].0, Value::from("a"));
        assert_eq!(entries[1].0, Value::from("b"));
    }
}
