//! Module: db::predicate
//! Responsibility: the boolean predicate tree and its evaluation against
//! an `IndexManager`, producing primary-key sets.
//! Does not own: index storage (see `db::index`) or result materialization
//! (see `db::query`).

use crate::db::index::IndexManager;
use crate::key;
use crate::value::Value;
use std::collections::HashSet;
use std::ops::{BitAnd, BitOr};

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

///
/// Predicate
///
/// A tree of comparisons and boolean compositions. Leaves name a field and
/// an operator; `&`/`|` combine subtrees. `eval` walks the tree once per
/// call, consulting the index manager at each leaf.
///

#[derive(Clone, Debug)]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// `IN` / `NOT IN` against a set of candidate values.
    CompareMany {
        field: String,
        op: CompareOp,
        values: Vec<Value>,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare { field: field.into(), op: CompareOp::Eq, value: value.into() }
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare { field: field.into(), op: CompareOp::Ne, value: value.into() }
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare { field: field.into(), op: CompareOp::Lt, value: value.into() }
    }

    #[must_use]
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare { field: field.into(), op: CompareOp::Le, value: value.into() }
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare { field: field.into(), op: CompareOp::Gt, value: value.into() }
    }

    #[must_use]
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare { field: field.into(), op: CompareOp::Ge, value: value.into() }
    }

    #[must_use]
    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::CompareMany { field: field.into(), op: CompareOp::In, values }
    }

    #[must_use]
    pub fn not_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::CompareMany { field: field.into(), op: CompareOp::NotIn, values }
    }

    /// Evaluates the predicate against `indices`, resolving to the set of
    /// matching primary keys. `universe` is the full set of primary keys
    /// currently in the store; negated operators resolve entirely from the
    /// field's own index (a record that never wrote the field is never a
    /// match), so `universe` only threads through boolean composition.
    #[must_use]
    pub fn eval(&self, indices: &IndexManager, universe: &HashSet<Value>) -> HashSet<Value> {
        match self {
            Self::Compare { field, op, value } => eval_compare(indices, field, *op, value),
            Self::CompareMany { field, op, values } => eval_compare_many(indices, field, *op, values),
            Self::And(lhs, rhs) => {
                let left = lhs.eval(indices, universe);
                if left.is_empty() {
                    return left;
                }
                let right = rhs.eval(indices, universe);
                left.intersection(&right).cloned().collect()
            }
            Self::Or(lhs, rhs) => {
                let mut left = lhs.eval(indices, universe);
                let right = rhs.eval(indices, universe);
                left.extend(right);
                left
            }
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Predicate {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

fn eval_compare(indices: &IndexManager, field: &str, op: CompareOp, value: &Value) -> HashSet<Value> {
    let Some(index) = indices.field(field) else {
        return HashSet::new();
    };
    // Coercion over the closed `Value` type cannot fail (see `key::coerce`).
    let bound = key::coerce(value, Some(field)).expect("coercion is total over Value");

    let union = |iter: &mut dyn Iterator<Item = &std::collections::HashSet<Value>>| {
        let mut out = HashSet::new();
        for set in iter {
            out.extend(set.iter().cloned());
        }
        out
    };

    match op {
        CompareOp::Eq => index.get(&bound).cloned().unwrap_or_default(),
        CompareOp::Ne => union(&mut index.not_equal(&bound)),
        CompareOp::Lt => union(&mut index.below(&bound)),
        CompareOp::Le => union(&mut index.at_most(&bound)),
        CompareOp::Gt => union(&mut index.above(&bound)),
        CompareOp::Ge => union(&mut index.at_least(&bound)),
        CompareOp::In | CompareOp::NotIn => unreachable!("single-value op"),
    }
}

fn eval_compare_many(indices: &IndexManager, field: &str, op: CompareOp, values: &[Value]) -> HashSet<Value> {
    let Some(index) = indices.field(field) else {
        return HashSet::new();
    };

    let bounds: HashSet<key::CoercedKey> = values
        .iter()
        .map(|v| key::coerce(v, Some(field)).expect("coercion is total over Value"))
        .collect();

    let union = |iter: &mut dyn Iterator<Item = &std::collections::HashSet<Value>>| {
        let mut out = HashSet::new();
        for set in iter {
            out.extend(set.iter().cloned());
        }
        out
    };

    match op {
        CompareOp::In => union(&mut bounds.iter().filter_map(|b| index.get(b))),
        // Union only the index's own keys that aren't in `bounds` — a
        // record that never wrote `field` has no posting set to contribute
        // and must not be pulled in via the universe.
        CompareOp::NotIn => union(&mut index.not_in(&bounds)),
        _ => unreachable!("multi-value op"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn setup() -> (IndexManager, HashSet<Value>) {
        let mut mgr = IndexManager::new("id");
        let mut universe = HashSet::new();
        for (id, age) in [("a", 10i64), ("b", 20), ("c", 30)] {
            let mut r = Record::new();
            r.insert("id".to_owned(), Value::from(id));
            r.insert("age".to_owned(), Value::Int(age));
            let pkey = Value::from(id);
            mgr.insert(&pkey, &r).unwrap();
            universe.insert(pkey);
        }
        (mgr, universe)
    }

    #[test]
    fn eq_matches_exact_posting_set() {
        let (mgr, universe) = setup();
        let result = Predicate::eq("age", 20i64).eval(&mgr, &universe);
        assert_eq!(result, HashSet::from([Value::from("b")]));
    }

    #[test]
    fn range_queries_resolve_half_open_intervals() {
        let (mgr, universe) = setup();
        let lt = Predicate::lt("age", 20i64).eval(&mgr, &universe);
        assert_eq!(lt, HashSet::from([Value::from("a")]));

        let ge = Predicate::ge("age", 20i64).eval(&mgr, &universe);
        assert_eq!(ge, HashSet::from([Value::from("b"), Value::from("c")]));
    }

    #[test]
    fn and_short_circuits_on_empty_left() {
        let (mgr, universe) = setup();
        let result = (Predicate::eq("age", 999i64) & Predicate::eq("age", 20i64)).eval(&mgr, &universe);
        assert!(result.is_empty());
    }

    #[test]
    fn or_unions_both_sides() {
        let (mgr, universe) = setup();
        let result = (Predicate::eq("age", 10i64) | Predicate::eq("age", 30i64)).eval(&mgr, &universe);
        assert_eq!(result, HashSet::from([Value::from("a"), Value::from("c")]));
    }

    #[test]
    fn not_in_subtracts_from_universe() {
        let (mut mgr, mut universe) = setup();

        // "d" never writes `age` at all — it must not surface in NOT_IN
        // just because it sits in the universe.
        let mut d = Record::new();
        d.insert("id".to_owned(), Value::from("d"));
        let pkey_d = Value::from("d");
        mgr.insert(&pkey_d, &d).unwrap();
        universe.insert(pkey_d.clone());

        let result = Predicate::not_in("age", vec![Value::Int(10), Value::Int(20)]).eval(&mgr, &universe);
        assert_eq!(result, HashSet::from([Value::from("c")]));
        assert!(!result.contains(&pkey_d));
    }

    #[test]
    fn unindexed_field_matches_nothing() {
        let (mgr, universe) = setup();
        let result = Predicate::eq("missing", 1i64).eval(&mgr, &universe);
        assert!(result.is_empty());
    }
}
