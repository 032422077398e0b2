//! Module: key
//! Responsibility: coerce a `Value` into a `CoercedKey` usable as an
//! ordered-map key — the bridge between the dynamic value model and the
//! index manager's `BTreeMap` keys.
//! Does not own: variant-cross comparison (see `value::compare`) or
//! multi-field sort-key assembly (see `db::order`).

use crate::error::CoercionError;
use crate::value::{canonical_cmp, Value};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

///
/// CoercedKey
///
/// A normalized `Value`: mapping entries sorted by canonical key order, set
/// elements sorted by canonical order, sequence order preserved. Comparable
/// and hashable so it can key a `BTreeMap`/`HashSet`.
///

#[derive(Clone, Debug)]
pub struct CoercedKey(Value);

impl CoercedKey {
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for CoercedKey {
    fn eq(&self, other: &Self) -> bool {
        canonical_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for CoercedKey {}

impl PartialOrd for CoercedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CoercedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_cmp(&self.0, &other.0)
    }
}

impl Hash for CoercedKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

pub(crate) fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Int(i) => i.hash(state),
        Value::Float(f) => f.to_order_key().hash(state),
        Value::Text(t) => t.hash(state),
        Value::Bytes(b) => b.hash(state),
        Value::Timestamp(t) | Value::Duration(t) => t.hash(state),
        Value::Date(d) => d.hash(state),
        Value::List(items) | Value::Set(items) => {
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Map(entries) => {
            for (k, v) in entries {
                hash_value(k, state);
                hash_value(v, state);
            }
        }
    }
}

/// Coerces a value into an orderable, hashable key.
///
/// `dossier`'s `Value` is a closed enum whose every variant already falls
/// into one of the allowed shapes (scalar, mapping, set, sequence), so this
/// never fails in the current value model; the `Result` is kept because
/// the wider index/store API treats coercion as fallible and a future
/// opaque/extension variant would need to raise `NotHashable` here.
///
/// # Errors
///
/// Returns `CoercionError::NotHashable` if a value cannot be normalized.
pub fn coerce(value: &Value, field: Option<&str>) -> Result<CoercedKey, CoercionError> {
    let _ = field;
    Ok(CoercedKey(normalize(value)))
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.iter().map(normalize).collect()),
        Value::Set(items) => {
            let mut normalized: Vec<Value> = items.iter().map(normalize).collect();
            normalized.sort_by(canonical_cmp);
            normalized.dedup_by(|a, b| canonical_cmp(a, b) == Ordering::Equal);
            Value::Set(normalized)
        }
        Value::Map(entries) => {
            let mut normalized: Vec<(Value, Value)> = entries
                .iter()
                .map(|(k, v)| (normalize(k), normalize(v)))
                .collect();
            normalized.sort_by(|a, b| canonical_cmp(&a.0, &b.0));
            Value::Map(normalized)
        }
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_elements_sort_and_dedup() {
        let value = Value::Set(vec![Value::Int(2), Value::Int(1), Value::Int(1)]);
        let key = coerce(&value, None).unwrap();
        let Value::Set(items) = key.value() else { panic!() };
        assert_eq!(items, &vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn map_entries_sort_by_key() {
        let value = Value::Map(vec![
            (Value::from("b"), Value::Int(2)),
            (Value::from("a"), Value::Int(1)),
        ]);
        let key = coerce(&value, None).unwrap();
        let Value::Map(entries) = key.value() else { panic!() };
        assert_eq!(entries[0].0, Value::from("a"));
    }

    #[test]
    fn equal_values_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        let a = coerce(&Value::from(1i64), None).unwrap();
        let b = coerce(&Value::from(1i64), None).unwrap();
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn list_preserves_order() {
        let value = Value::List(vec![Value::Int(2), Value::Int(1)]);
        let key = coerce(&value, None).unwrap();
        let Value::List(items) = key.value() else { panic!() };
        assert_eq!(items, &vec![Value::Int(2), Value::Int(1)]);
    }

    mod property {
        use super::*;
        use proptest::prelude::*;

        fn arb_scalar() -> impl Strategy<Value = Value> {
            prop_oneof![
                any::<i64>().prop_map(Value::Int),
                any::<bool>().prop_map(Value::Bool),
                "[a-zA-Z0-9_]{0,8}".prop_map(Value::Text),
            ]
        }

        fn arb_value() -> impl Strategy<Value = Value> {
            let leaf = arb_scalar();
            leaf.prop_recursive(3, 16, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Set),
                    prop::collection::vec((inner.clone(), inner), 0..4).prop_map(Value::from_map),
                ]
            })
        }

        proptest! {
            #[test]
            fn normalize_is_idempotent(value in arb_value()) {
                let once = coerce(&value, None).unwrap();
                let twice = coerce(once.value(), None).unwrap();
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn coerced_key_ordering_matches_canonical_cmp(a in arb_value(), b in arb_value()) {
                let ka = coerce(&a, None).unwrap();
                let kb = coerce(&b, None).unwrap();
                prop_assert_eq!(ka.cmp(&kb), canonical_cmp(ka.value(), kb.value()));
            }

            #[test]
            fn equal_coerced_keys_hash_equal(value in arb_value()) {
                use std::collections::hash_map::DefaultHasher;
                let a = coerce(&value, None).unwrap();
                let b = coerce(&value, None).unwrap();
                let mut ha = DefaultHasher::new();
                let mut hb = DefaultHasher::new();
                a.hash(&mut ha);
                b.hash(&mut hb);
                prop_assert_eq!(ha.finish(), hb.finish());
            }
        }
    }
}
