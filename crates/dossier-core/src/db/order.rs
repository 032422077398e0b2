//! Module: db::order
//! Responsibility: stable multi-key sort with descending inversion over
//! mixed scalar and composite field values.
//! Does not own: pagination or projection (see `db::query`).

use crate::error::OrderingError;
use crate::record::Record;
use crate::value::Value;
use std::cmp::Ordering as CmpOrdering;

///
/// Direction
///

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

///
/// Ordering
///
/// One column of a multi-key sort: a field name and a direction.
///

#[derive(Clone, Debug)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

impl Ordering {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: Direction::Asc }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: Direction::Desc }
    }
}

/// A single column's projection of one record's sort key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Asc(crate::key::CoercedKey),
    DescText(Vec<u32>),
    DescNumeric(i128),
}

/// A missing field sorts as a literal zero, interleaved among real values
/// rather than always sorting least: flows through the same ascending or
/// descending logic `sort_key_for` applies to a present value.
fn sort_key_for(record: &Record, ordering: &Ordering) -> Result<SortKey, OrderingError> {
    let default = Value::Int(0);
    let value = record.get(&ordering.field).unwrap_or(&default);

    match ordering.direction {
        Direction::Asc => {
            let coerced = crate::key::coerce(value, Some(&ordering.field))
                .expect("coercion is total over Value");
            Ok(SortKey::Asc(coerced))
        }
        Direction::Desc => match value {
            Value::Text(s) => Ok(SortKey::DescText(
                s.chars().map(|c| 0x0010_FFFF - c as u32).collect(),
            )),
            other => match other.to_numeric() {
                Some(n) => Ok(SortKey::DescNumeric(-n)),
                None => Err(OrderingError::NotOrderable { value: other.clone() }),
            },
        },
    }
}

/// Sorts `records` in place by the given orderings, stably, first-to-last
/// column taking priority. Descending text columns invert by Unicode
/// codepoint complement; descending numeric-convertible columns negate;
/// any other descending column fails with `NotOrderable`.
///
/// # Errors
///
/// Returns `OrderingError::NotOrderable` if a descending column holds a
/// value with no numeric converter (composite types: list, set, map).
pub fn sort_records(
    records: &mut [(Value, Record)],
    orderings: &[Ordering],
) -> Result<(), OrderingError> {
    if orderings.is_empty() {
        return Ok(());
    }

    let mut keys = Vec::with_capacity(records.len());
    for (_, record) in records.iter() {
        let mut key = Vec::with_capacity(orderings.len());
        for ordering in orderings {
            key.push(sort_key_for(record, ordering)?);
        }
        keys.push(key);
    }

    let mut indices: Vec<usize> = (0..records.len()).collect();
    indices.sort_by(|&a, &b| {
        keys[a]
            .iter()
            .zip(keys[b].iter())
            .fold(CmpOrdering::Equal, |acc, (x, y)| acc.then_with(|| x.cmp(y)))
    });

    let mut slots: Vec<Option<(Value, Record)>> = records
        .iter_mut()
        .map(|r| Some(std::mem::replace(r, (Value::Null, Record::new()))))
        .collect();
    for (dest, &src) in indices.iter().enumerate() {
        records[dest] = slots[src].take().expect("each source index used once");
    }

    Ok(())
}
