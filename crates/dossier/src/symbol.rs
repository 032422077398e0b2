//! Module: symbol
//! Responsibility: the fluent query-builder front end. A `Symbol` hands
//! out `SymbolicAttribute`s for field names; operations on an attribute
//! produce the `Predicate`/`Ordering` nodes `dossier-core` evaluates.
//! Does not own: predicate evaluation or sort-key assembly — those live in
//! `dossier_core::db`.

use dossier_core::prelude::{CompareOp, Ordering, Predicate, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

///
/// Symbol
///
/// A factory for `SymbolicAttribute`s, memoizing by field name so that
/// repeated references to the same field (e.g. across a chained query
/// built over several statements) share one underlying name allocation.
///

#[derive(Default)]
pub struct Symbol {
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl Symbol {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attr(&self, field: &str) -> SymbolicAttribute {
        let name = {
            let cache = self.cache.read();
            cache.get(field).cloned()
        };
        let name = name.unwrap_or_else(|| {
            let mut cache = self.cache.write();
            cache
                .entry(field.to_owned())
                .or_insert_with(|| Arc::from(field))
                .clone()
        });
        SymbolicAttribute { field: name }
    }
}

///
/// SymbolicAttribute
///
/// A placeholder for a field name. Comparison methods build `Predicate`
/// leaves; `asc`/`desc` build `Ordering` columns. Rust does not let `<` /
/// `==` return anything but `bool`, so these are explicit methods rather
/// than operator overloads (`&`/`|` on `Predicate` itself remain operators
/// since `BitAnd`/`BitOr` ARE overloadable).
///

#[derive(Clone, Debug)]
pub struct SymbolicAttribute {
    field: Arc<str>,
}

impl SymbolicAttribute {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn eq(&self, value: impl Into<Value>) -> Predicate {
        compare(&self.field, CompareOp::Eq, value.into())
    }

    #[must_use]
    pub fn ne(&self, value: impl Into<Value>) -> Predicate {
        compare(&self.field, CompareOp::Ne, value.into())
    }

    #[must_use]
    pub fn lt(&self, value: impl Into<Value>) -> Predicate {
        compare(&self.field, CompareOp::Lt, value.into())
    }

    #[must_use]
    pub fn le(&self, value: impl Into<Value>) -> Predicate {
        compare(&self.field, CompareOp::Le, value.into())
    }

    #[must_use]
    pub fn gt(&self, value: impl Into<Value>) -> Predicate {
        compare(&self.field, CompareOp::Gt, value.into())
    }

    #[must_use]
    pub fn ge(&self, value: impl Into<Value>) -> Predicate {
        compare(&self.field, CompareOp::Ge, value.into())
    }

    #[must_use]
    pub fn one_of(&self, values: impl IntoIterator<Item = impl Into<Value>>) -> Predicate {
        Predicate::one_of(self.field.to_string(), values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn not_in(&self, values: impl IntoIterator<Item = impl Into<Value>>) -> Predicate {
        Predicate::not_in(self.field.to_string(), values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn asc(&self) -> Ordering {
        Ordering::asc(self.field.to_string())
    }

    #[must_use]
    pub fn desc(&self) -> Ordering {
        Ordering::desc(self.field.to_string())
    }
}

fn compare(field: &str, op: CompareOp, value: Value) -> Predicate {
    match op {
        CompareOp::Eq => Predicate::eq(field, value),
        CompareOp::Ne => Predicate::ne(field, value),
        CompareOp::Lt => Predicate::lt(field, value),
        CompareOp::Le => Predicate::le(field, value),
        CompareOp::Gt => Predicate::gt(field, value),
        CompareOp::Ge => Predicate::ge(field, value),
        CompareOp::In | CompareOp::NotIn => unreachable!("built via one_of/not_in"),
    }
}
