//! Module: record
//! Responsibility: the record type (a sparse field map) and the target
//! resolution rule used by single-item `get`/`update`/`delete` paths.

use crate::value::Value;
use indexmap::IndexMap;

/// A sparse, field-named mapping. Field order is insertion order so that
/// projection and serialization are deterministic.
pub type Record = IndexMap<String, Value>;

///
/// Target
///
/// A caller-supplied reference to a record, resolved to a primary key per
/// the rule in §6: a mapping yields its primary-key field; a bare value is
/// taken as the primary key itself.
///

#[derive(Clone, Debug)]
pub enum Target {
    Pkey(Value),
    Record(Record),
}

impl Target {
    /// Resolves this target to a primary-key value given the field name
    /// that identifies the primary key.
    #[must_use]
    pub fn resolve(&self, pkey_field: &str) -> Option<Value> {
        match self {
            Self::Pkey(value) => Some(value.clone()),
            Self::Record(record) => record.get(pkey_field).cloned(),
        }
    }
}

impl From<Value> for Target {
    fn from(value: Value) -> Self {
        Self::Pkey(value)
    }
}

impl From<Record> for Target {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Self::Pkey(Value::from(value))
    }
}

impl From<i64> for Target {
    fn from(value: i64) -> Self {
        Self::Pkey(Value::from(value))
    }
}
