//! Module: db::transaction
//! Responsibility: front/back layered staging, operation journals, and
//! atomic commit-or-rollback replay.
//! Does not own: index maintenance or query execution (delegated to the
//! front/back `Store`s and `db::query::paginate_and_project`).
//! Boundary: commit is the only place that mutates the back store; every
//! other transaction method writes to the private front store.

use crate::db::order::Ordering;
use crate::db::predicate::Predicate;
use crate::db::query::{paginate_and_project, QueryResult};
use crate::db::store::{Handle, Store};
use crate::error::{Error, TransactionError};
use crate::record::{Record, Target};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type CommitCallback =
    Arc<dyn Fn(&Transaction, &HashSet<Value>, &HashSet<Value>, &HashSet<Value>) + Send + Sync>;

///
/// Transaction
///
/// Owns a private `front` store layered over the caller-visible `back`
/// store, journaling which primary keys were created, updated, deleted, or
/// partially deleted so that `commit` can replay them atomically under the
/// back store's lock.
///

pub struct Transaction {
    front: Store,
    back: Store,
    created: HashSet<Value>,
    updated: HashSet<Value>,
    deleted: HashSet<Value>,
    partially_deleted: HashMap<Value, Vec<String>>,
    on_commit: Option<CommitCallback>,
}

impl Transaction {
    #[must_use]
    pub fn new(back: Store) -> Self {
        let front = Store::new(back.pkey_field().to_owned());
        Self {
            front,
            back,
            created: HashSet::new(),
            updated: HashSet::new(),
            deleted: HashSet::new(),
            partially_deleted: HashMap::new(),
            on_commit: None,
        }
    }

    pub fn on_commit(&mut self, callback: CommitCallback) {
        self.on_commit = Some(callback);
    }

    fn touched(&self) -> HashSet<Value> {
        self.created
            .union(&self.updated)
            .chain(self.deleted.iter())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get(&self, target: impl Into<Target>) -> Option<Handle> {
        let target = target.into();
        let pkey = target.resolve(self.back.pkey_field())?;
        if self.deleted.contains(&pkey) {
            return None;
        }
        if let Some(handle) = self.front.get(pkey.clone()) {
            return Some(handle);
        }
        let back_handle = self.back.get(pkey)?;
        self.front.create(back_handle.record()).ok()
    }

    pub fn create(&mut self, record: Record) -> Result<Handle, Error> {
        let handle = self.front.create(record)?;
        if let Some(pkey) = handle.get(self.back.pkey_field()) {
            self.created.insert(pkey);
        }
        Ok(handle)
    }

    pub fn create_many(&mut self, records: Vec<Record>) -> Result<Vec<Handle>, Error> {
        records.into_iter().map(|r| self.create(r)).collect()
    }

    pub fn update(&mut self, target: Record, fields: Option<Vec<String>>) -> Result<Handle, Error> {
        let pkey = target
            .get(self.back.pkey_field())
            .cloned()
            .ok_or_else(|| TransactionError::Aborted("update target has no primary key".into()))?;

        if !self.front.contains(pkey.clone()) {
            if let Some(back_handle) = self.back.get(pkey.clone()) {
                self.front.create(back_handle.record())?;
            }
        }
        let handle = self.front.update(target, fields)?;
        self.updated.insert(pkey);
        Ok(handle)
    }

    pub fn delete(&mut self, target: impl Into<Target>, fields: Option<Vec<String>>) -> Result<(), Error> {
        let target = target.into();
        let pkey = target
            .resolve(self.back.pkey_field())
            .ok_or_else(|| TransactionError::Aborted("delete target has no primary key".into()))?;

        match fields {
            None => {
                self.deleted.insert(pkey.clone());
                self.created.remove(&pkey);
                self.updated.remove(&pkey);
                self.partially_deleted.remove(&pkey);
                if self.front.contains(pkey.clone()) {
                    self.front.delete(pkey, None)?;
                }
            }
            Some(targets) => {
                if !self.front.contains(pkey.clone()) {
                    if let Some(back_handle) = self.back.get(pkey.clone()) {
                        self.front.create(back_handle.record())?;
                    }
                }
                self.front.delete(pkey.clone(), Some(targets.clone()))?;
                self.partially_deleted.insert(pkey, targets);
            }
        }
        Ok(())
    }

    /// Builds a merged query over both stores: rows already staged in the
    /// front store shadow their back-store counterparts (front wins),
    /// fully deleted rows are excluded from both sides.
    #[must_use]
    pub fn select(&self) -> TransactionQuery<'_> {
        TransactionQuery::new(self)
    }

    /// Commits in fixed order: full deletes, then creates, then updates,
    /// then partial deletes, then the commit callback; finally clears the
    /// front store and all journals. Runs under the back store's
    /// reentrant lock so no observer sees a partial replay.
    ///
    /// # Errors
    ///
    /// Propagates any `StoreError` raised while replaying against the
    /// back store.
    pub fn commit(self) -> Result<(), Error> {
        let _guard = self.back.hold_lock();

        let delete_targets: Vec<Value> = self.deleted.iter().cloned().collect();
        self.back.delete_many(delete_targets)?;

        for pkey in self.created.difference(&self.deleted).cloned().collect::<Vec<_>>() {
            if let Some(handle) = self.front.get(pkey) {
                self.back.create(handle.record())?;
            }
        }

        for pkey in self.updated.difference(&self.deleted).cloned().collect::<Vec<_>>() {
            if let Some(handle) = self.front.get(pkey) {
                self.back.update(handle.record(), None)?;
            }
        }

        let partial: Vec<(Value, Vec<String>)> = self
            .partially_deleted
            .iter()
            .filter(|entry| !self.deleted.contains(entry.0))
            .map(|(pkey, fields)| (pkey.clone(), fields.clone()))
            .collect();
        for (pkey, fields) in partial {
            self.back.delete(pkey, Some(fields))?;
        }

        if let Some(callback) = self.on_commit.clone() {
            callback(&self, &self.created, &self.updated, &self.deleted);
        }

        self.front.clear();
        Ok(())
    }

    pub fn rollback(self) {
        self.front.clear();
    }

    /// Scoped transaction lifecycle: `f` runs against a fresh transaction
    /// over `store`; its return value commits on `Ok`, or the transaction
    /// rolls back and the error is re-surfaced on `Err`.
    ///
    /// # Errors
    ///
    /// Re-surfaces whatever error `f` returned, or a commit-time error.
    pub fn run<T>(
        store: &Store,
        f: impl FnOnce(&mut Transaction) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut tx = Self::new(store.clone());
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }
}

///
/// TransactionQuery
///
/// Mirrors `Query`'s builder surface but evaluates against the
/// transaction's front-over-back view.
///

pub struct TransactionQuery<'a> {
    tx: &'a Transaction,
    selection: Vec<String>,
    predicate: Option<Predicate>,
    orderings: Vec<Ordering>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl<'a> TransactionQuery<'a> {
    fn new(tx: &'a Transaction) -> Self {
        Self {
            tx,
            selection: Vec::new(),
            predicate: None,
            orderings: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn select(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.selection = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicate = predicates.into_iter().reduce(|a, b| a & b);
        self
    }

    #[must_use]
    pub fn order_by(mut self, orderings: impl IntoIterator<Item = Ordering>) -> Self {
        self.orderings = orderings.into_iter().collect();
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

    /// # Errors
    ///
    /// Returns `OrderingError::NotOrderable` if sorting fails.
    pub fn execute(&self) -> Result<QueryResult, Error> {
        let excluded = self.tx.touched();

        let back_rows: Vec<(Value, Record)> = match &self.predicate {
            None => self.tx.back.all_records(),
            Some(predicate) => {
                let pkeys = self
                    .tx
                    .back
                    .with_inner(|indices, universe| predicate.eval(indices, universe));
                self.tx.back.load_records(&pkeys)
            }
        }
        .into_iter()
        .filter(|(pkey, _)| !excluded.contains(pkey))
        .collect();

        let front_rows: Vec<(Value, Record)> = match &self.predicate {
            None => self.tx.front.all_records(),
            Some(predicate) => {
                let pkeys = self
                    .tx
                    .front
                    .with_inner(|indices, universe| predicate.eval(indices, universe));
                self.tx.front.load_records(&pkeys)
            }
        };

        // Back and front each run their own complete sort/offset/limit
        // pipeline before the two are unioned — the transaction's view is
        // the back store's own page plus the front's own page, not a page
        // over the combined row set.
        let back_result = paginate_and_project(
            back_rows,
            &self.orderings,
            self.offset,
            self.limit,
            &self.selection,
            self.tx.back.pkey_field(),
        )?;
        let front_result = paginate_and_project(
            front_rows,
            &self.orderings,
            self.offset,
            self.limit,
            &self.selection,
            self.tx.back.pkey_field(),
        )?;

        let mut merged = back_result;
        merged.extend(front_result);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, age: i64) -> Record {
        let mut r = Record::new();
        r.insert("id".to_owned(), Value::from(id));
        r.insert("age".to_owned(), Value::Int(age));
        r
    }

    #[test]
    fn reads_through_transaction_are_isolated_before_commit() {
        let store = Store::new("id");
        store.create(record("a", 10)).unwrap();

        let mut tx = Transaction::new(store.clone());
        let mut patch = Record::new();
        patch.insert("id".to_owned(), Value::from("a"));
        patch.insert("age".to_owned(), Value::Int(99));
        tx.update(patch, Some(vec!["age".to_owned()])).unwrap();

        assert_eq!(store.get(Value::from("a")).unwrap().get("age"), Some(Value::Int(10)));
        assert_eq!(tx.get(Value::from("a")).unwrap().get("age"), Some(Value::Int(99)));
    }

    #[test]
    fn commit_applies_all_journaled_operations() {
        let store = Store::new("id");
        store.create(record("a", 10)).unwrap();

        let mut tx = Transaction::new(store.clone());
        tx.create(record("b", 20)).unwrap();
        let mut patch = Record::new();
        patch.insert("id".to_owned(), Value::from("a"));
        patch.insert("age".to_owned(), Value::Int(11));
        tx.update(patch, Some(vec!["age".to_owned()])).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.get(Value::from("a")).unwrap().get("age"), Some(Value::Int(11)));
        assert!(store.contains(Value::from("b")));
    }

    #[test]
    fn rollback_applies_nothing() {
        let store = Store::new("id");
        store.create(record("a", 10)).unwrap();

        let mut tx = Transaction::new(store.clone());
        tx.create(record("b", 20)).unwrap();
        tx.rollback();

        assert!(!store.contains(Value::from("b")));
    }

    #[test]
    fn create_then_delete_in_same_transaction_is_a_no_op() {
        let store = Store::new("id");
        let mut tx = Transaction::new(store.clone());
        tx.create(record("b", 20)).unwrap();
        tx.delete(Value::from("b"), None).unwrap();
        tx.commit().unwrap();

        assert!(!store.contains(Value::from("b")));
    }

    #[test]
    fn query_paginates_back_and_front_independently_before_merging() {
        let store = Store::new("id");
        for (id, age) in [("a", 10i64), ("b", 20), ("c", 30), ("d", 40), ("e", 50)] {
            store.create(record(id, age)).unwrap();
        }

        let mut tx = Transaction::new(store);
        for (id, age) in [("f", 5i64), ("g", 6), ("h", 7)] {
            tx.create(record(id, age)).unwrap();
        }

        let result = tx
            .select()
            .order_by([Ordering::asc("age")])
            .limit(2)
            .execute()
            .unwrap();

        // Back's own page ({10, 20}) unioned with front's own page
        // ({5, 6}) — not a single page over all eight rows.
        assert_eq!(result.len(), 4);
        assert!(result.contains_key(&Value::from("a")));
        assert!(result.contains_key(&Value::from("b")));
        assert!(result.contains_key(&Value::from("f")));
        assert!(result.contains_key(&Value::from("g")));
        assert!(!result.contains_key(&Value::from("c")));
        assert!(!result.contains_key(&Value::from("h")));
    }

    #[test]
    fn run_commits_on_ok_and_rolls_back_on_err() {
        let store = Store::new("id");
        let result: Result<(), Error> = Transaction::run(&store, |tx| {
            tx.create(record("a", 1))?;
            Err(TransactionError::Aborted("boom".into()).into())
        });
        assert!(result.is_err());
        assert!(!store.contains(Value::from("a")));

        Transaction::run(&store, |tx| {
            tx.create(record("a", 1))?;
            Ok(())
        })
        .unwrap();
        assert!(store.contains(Value::from("a")));
    }
}
