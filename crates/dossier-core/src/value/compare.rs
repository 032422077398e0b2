//! Module: value::compare
//! Responsibility: the canonical, total, cross-variant ordering over
//! `Value`. Used by index maps, predicate range resolution, and the
//! hashable-coercion map-entry sort — never by `Value::partial_cmp`, which
//! stays strictly same-variant.

use super::Value;
use std::cmp::Ordering;

/// Fixed rank assigned to each variant so values of different variants
/// still compare deterministically (ascending by rank, then by payload
/// within a variant).
const fn variant_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Float(_) => 3,
        Value::Text(_) => 4,
        Value::Bytes(_) => 5,
        Value::Date(_) => 6,
        Value::Duration(_) => 7,
        Value::Timestamp(_) => 8,
        Value::List(_) => 9,
        Value::Set(_) => 10,
        Value::Map(_) => 11,
    }
}

/// Total order over `Value`, comparable across variants. Same-variant pairs
/// compare by payload; cross-variant pairs compare by [`variant_rank`].
#[must_use]
pub fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y))
        | (Value::Duration(x), Value::Duration(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) | (Value::Set(x), Value::Set(y)) => {
            compare_sequences(x, y)
        }
        (Value::Map(x), Value::Map(y)) => compare_map_entries(x, y),
        _ => variant_rank(a).cmp(&variant_rank(b)),
    }
}

fn compare_sequences(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = canonical_cmp(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_map_entries(a: &[(Value, Value)], b: &[(Value, Value)]) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let key_ord = canonical_cmp(ka, kb);
        if key_ord != Ordering::Equal {
            return key_ord;
        }
        let val_ord = canonical_cmp(va, vb);
        if val_ord != Ordering::Equal {
            return val_ord;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_variant_orders_by_rank() {
        assert_eq!(canonical_cmp(&Value::Null, &Value::Bool(false)), Ordering::Less);
        assert_eq!(canonical_cmp(&Value::Int(0), &Value::Text("a".into())), Ordering::Less);
    }

    #[test]
    fn sequences_compare_elementwise_then_by_length() {
        let short = Value::List(vec![Value::Int(1)]);
        let long = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(canonical_cmp(&short, &long), Ordering::Less);
    }
}
