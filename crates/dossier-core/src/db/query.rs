//! Module: db::query
//! Responsibility: compose predicate evaluation, ordering, pagination, and
//! projection into one execution pipeline over a `Store`.
//! Does not own: predicate tree structure (`db::predicate`) or sort-key
//! assembly (`db::order`).

use crate::db::order::{self, Ordering};
use crate::db::predicate::Predicate;
use crate::db::store::Store;
use crate::error::Error;
use crate::record::Record;
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// An ordered primary-key -> projected-record result.
pub type QueryResult = IndexMap<Value, Record>;

type Callback = Arc<dyn Fn(&Query, &QueryResult) + Send + Sync>;

///
/// Query
///
/// Holds a back-reference to the `Store` it runs against, so `execute`
/// does not need the store threaded through every call site.
///

#[derive(Clone)]
pub struct Query {
    store: Store,
    selection: Vec<String>,
    predicate: Option<Predicate>,
    orderings: Vec<Ordering>,
    limit: Option<usize>,
    offset: Option<usize>,
    callbacks: Vec<(u64, Callback)>,
    next_callback_id: u64,
}

impl Query {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            selection: Vec::new(),
            predicate: None,
            orderings: Vec::new(),
            limit: None,
            offset: None,
            callbacks: Vec::new(),
            next_callback_id: 0,
        }
    }

    #[must_use]
    pub fn select(mut self, fields: impl IntoIterator<Item = impl Into<String>>, append: bool) -> Self {
        if !append {
            self.selection.clear();
        }
        self.selection.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Combines `predicates` with existing ones via AND (§6: "multiple
    /// predicates combine with AND").
    #[must_use]
    pub fn filter(mut self, predicates: impl IntoIterator<Item = Predicate>, append: bool) -> Self {
        let combined = predicates.into_iter().reduce(|a, b| a & b);
        self.predicate = match (append, self.predicate.take(), combined) {
            (_, None, new) => new,
            (false, Some(_), new) => new,
            (true, Some(existing), Some(new)) => Some(existing & new),
            (true, Some(existing), None) => Some(existing),
        };
        self
    }

    #[must_use]
    pub fn order_by(mut self, orderings: impl IntoIterator<Item = Ordering>, append: bool) -> Self {
        if !append {
            self.orderings.clear();
        }
        self.orderings.extend(orderings);
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub const fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn subscribe(&mut self, callback: Callback) -> u64 {
        let id = self.next_callback_id;
        self.next_callback_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: u64) {
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
    }

    #[must_use]
    pub fn copy(&self, store: Option<Store>) -> Self {
        Self {
            store: store.unwrap_or_else(|| self.store.clone()),
            selection: self.selection.clone(),
            predicate: self.predicate.clone(),
            orderings: self.orderings.clone(),
            limit: self.limit,
            offset: self.offset,
            callbacks: self.callbacks.clone(),
            next_callback_id: self.next_callback_id,
        }
    }

    pub fn clear(&mut self) {
        self.selection.clear();
        self.predicate = None;
        self.orderings.clear();
        self.limit = None;
        self.offset = None;
    }

    /// Runs the pipeline and returns the full ordered result map.
    ///
    /// # Errors
    ///
    /// Returns `OrderingError::NotOrderable` if a configured descending
    /// ordering hits a non-numeric composite value.
    pub fn execute(&self) -> Result<QueryResult, Error> {
        let candidates = self.load_candidates();
        let result = self.finish(candidates)?;
        self.notify(&result);
        Ok(result)
    }

    /// Runs the pipeline and returns only the first result row, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Query::execute`].
    pub fn execute_first(&self) -> Result<Option<Record>, Error> {
        let result = self.execute()?;
        Ok(result.into_iter().next().map(|(_, record)| record))
    }

    fn load_candidates(&self) -> Vec<(Value, Record)> {
        match &self.predicate {
            None => self.store.all_records(),
            Some(predicate) => {
                let pkeys = self
                    .store
                    .with_inner(|indices, universe| predicate.eval(indices, universe));
                self.store.load_records(&pkeys)
            }
        }
    }

    fn finish(&self, records: Vec<(Value, Record)>) -> Result<QueryResult, Error> {
        paginate_and_project(
            records,
            &self.orderings,
            self.offset,
            self.limit,
            &self.selection,
            self.store.pkey_field(),
        )
    }

    fn notify(&self, result: &QueryResult) {
        for (_, callback) in &self.callbacks {
            callback(self, result);
        }
    }
}

/// Sorts, paginates, and projects a candidate row set. Shared by `Query`
/// and the transaction's merged read path (`db::transaction`), since both
/// need the identical sort/paginate/project semantics over a row set that
/// was assembled differently (single store vs. front-over-back merge).
///
/// # Errors
///
/// Returns `OrderingError::NotOrderable` if sorting fails.
pub(crate) fn paginate_and_project(
    mut records: Vec<(Value, Record)>,
    orderings: &[Ordering],
    offset: Option<usize>,
    limit: Option<usize>,
    selection: &[String],
    pkey_field: &str,
) -> Result<QueryResult, Error> {
    if records.is_empty() {
        return Ok(QueryResult::new());
    }

    if !orderings.is_empty() {
        order::sort_records(&mut records, orderings)?;
    }

    let start = offset.unwrap_or(0).min(records.len());
    let end = match limit {
        Some(n) => (start + n).min(records.len()),
        None => records.len(),
    };

    let mut out = QueryResult::new();
    for (pkey, record) in &records[start..end] {
        out.insert(pkey.clone(), project(record, selection, pkey_field));
    }
    Ok(out)
}

fn project(record: &Record, selection: &[String], pkey_field: &str) -> Record {
    if selection.is_empty() {
        return record.clone();
    }
    let mut out = Record::new();
    for field in selection {
        if let Some(value) = record.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    if let Some(pkey_value) = record.get(pkey_field) {
        out.insert(pkey_field.to_owned(), pkey_value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::order::Ordering;

    fn seed() -> Store {
        let store = Store::new("id");
        for (id, age) in [("a", 10i64), ("b", 20), ("c", 30)] {
            let mut r = Record::new();
            r.insert("id".to_owned(), Value::from(id));
            r.insert("age".to_owned(), Value::Int(age));
            store.create(r).unwrap();
        }
        store
    }

    #[test]
    fn no_predicate_returns_everything_in_insertion_order() {
        let store = seed();
        let result = Query::new(store).execute().unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.keys().next(), Some(&Value::from("a")));
    }

    #[test]
    fn predicate_filters_rows() {
        let store = seed();
        let result = Query::new(store)
            .filter([Predicate::ge("age", 20i64)], false)
            .execute()
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn pagination_applies_offset_then_limit() {
        let store = seed();
        let result = Query::new(store)
            .order_by([Ordering::asc("age")], false)
            .offset(1)
            .limit(1)
            .execute()
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.keys().next(), Some(&Value::from("b")));
    }

    #[test]
    fn projection_keeps_pkey_field() {
        let store = seed();
        let result = Query::new(store).select(["age"], false).execute().unwrap();
        let record = result.get(&Value::from("a")).unwrap();
        assert!(record.contains_key("id"));
        assert!(record.contains_key("age"));
    }

    #[test]
    fn empty_selection_returns_full_record() {
        let store = seed();
        let result = Query::new(store).execute().unwrap();
        let record = result.get(&Value::from("a")).unwrap();
        assert_eq!(record.len(), 2);
    }
}
