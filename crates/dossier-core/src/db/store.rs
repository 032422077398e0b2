//! Module: db::store
//! Responsibility: the primary-key -> record table, the index manager that
//! shadows it, the identity map, and the reentrant lock guarding mutation.
//! Does not own: query composition (see `db::query`) or transaction
//! staging (see `db::transaction`).
//! Boundary: every mutating operation here is the sole path through which
//! `records` and the index manager change together, keeping I1-I4 true.

use crate::db::index::IndexManager;
use crate::error::{Error, StoreError};
use crate::record::{Record, Target};
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A live reference to one record's storage cell. Cloning a `Handle`
/// clones the `Arc`, not the record — both clones observe the same
/// content, satisfying the identity-map guarantee (I5).
#[derive(Clone, Debug)]
pub struct Handle(Arc<RwLock<Record>>);

impl Handle {
    #[must_use]
    pub fn record(&self) -> Record {
        self.0.read().clone()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.read().get(field).cloned()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

pub(crate) struct StoreInner {
    pkey_field: String,
    records: IndexMap<Value, Record>,
    identity: HashMap<Value, Weak<RwLock<Record>>>,
    indexer: IndexManager,
}

impl StoreInner {
    fn new(pkey_field: String) -> Self {
        Self {
            indexer: IndexManager::new(pkey_field.clone()),
            pkey_field,
            records: IndexMap::new(),
            identity: HashMap::new(),
        }
    }

    fn universe(&self) -> std::collections::HashSet<Value> {
        self.records.keys().cloned().collect()
    }

    /// The live `Arc` backing `pkey`'s identity-map entry, if some caller
    /// still holds a `Handle` to it.
    fn live_arc(&self, pkey: &Value) -> Option<Arc<RwLock<Record>>> {
        self.identity.get(pkey)?.upgrade()
    }

    /// Returns a `Handle` for `pkey`, reusing the live `Arc` if a caller
    /// already holds one, otherwise minting a fresh `Arc` from the table's
    /// stored record. The table itself never retains a strong reference, so
    /// once every `Handle` for `pkey` is dropped the identity entry's weak
    /// count falls to zero (I5's reclamation half).
    fn handle_for(&mut self, pkey: &Value) -> Option<Handle> {
        if let Some(arc) = self.live_arc(pkey) {
            return Some(Handle(arc));
        }
        let record = self.records.get(pkey)?.clone();
        let arc = Arc::new(RwLock::new(record));
        self.identity.insert(pkey.clone(), Arc::downgrade(&arc));
        Some(Handle(arc))
    }

    fn create_one(&mut self, mut record: Record) -> Result<Handle, Error> {
        let pkey = match record.get(&self.pkey_field) {
            Some(v) => v.clone(),
            None => {
                let generated = generate_pkey();
                record.insert(self.pkey_field.clone(), generated.clone());
                generated
            }
        };
        if self.records.contains_key(&pkey) {
            return Err(StoreError::Conflict(pkey).into());
        }
        self.indexer.insert(&pkey, &record)?;
        self.records.insert(pkey.clone(), record);
        Ok(self.handle_for(&pkey).expect("just inserted"))
    }

    fn get_one(&mut self, pkey: &Value) -> Option<Handle> {
        if !self.records.contains_key(pkey) {
            return None;
        }
        self.handle_for(pkey)
    }

    fn update_one(
        &mut self,
        target: Record,
        fields: Option<Vec<String>>,
    ) -> Result<Handle, Error> {
        let pkey = target
            .get(&self.pkey_field)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(Value::Null))?;
        let snapshot = self
            .records
            .get(&pkey)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(pkey.clone()))?;

        let touched: Vec<String> = fields.unwrap_or_else(|| {
            target
                .keys()
                .filter(|k| *k != &self.pkey_field)
                .cloned()
                .collect()
        });

        let mut updated = snapshot.clone();
        for field in &touched {
            if let Some(value) = target.get(field) {
                updated.insert(field.clone(), value.clone());
            }
        }

        self.indexer.update(&pkey, &snapshot, &updated, &touched)?;
        self.records.insert(pkey.clone(), updated.clone());

        // A live handle must observe the update through its own `Arc`, not
        // just through the table's snapshot.
        if let Some(arc) = self.live_arc(&pkey) {
            *arc.write() = updated;
            return Ok(Handle(arc));
        }
        Ok(self.handle_for(&pkey).expect("just inserted"))
    }

    fn delete_one(&mut self, pkey: &Value, fields: Option<Vec<String>>) -> Result<(), Error> {
        let record = self
            .records
            .get(pkey)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(pkey.clone()))?;

        match fields {
            None => {
                self.indexer.remove(pkey, &record, None)?;
                self.records.shift_remove(pkey);
                self.identity.remove(pkey);
            }
            Some(targets) => {
                let mut updated = record.clone();
                for field in &targets {
                    updated.insert(field.clone(), Value::Null);
                }
                self.indexer.update(pkey, &record, &updated, &targets)?;
                self.records.insert(pkey.clone(), updated.clone());
                if let Some(arc) = self.live_arc(pkey) {
                    *arc.write() = updated;
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.records.clear();
        self.identity.clear();
        self.indexer.clear();
    }
}

fn generate_pkey() -> Value {
    let raw: u128 = rand::random();
    Value::Text(format!("{raw:032x}"))
}

///
/// Store
///
/// Cheaply cloneable handle to shared, lock-guarded record storage. Every
/// mutating or multi-step-reading operation acquires the store's reentrant
/// lock for its full duration; re-entrance is required because transaction
/// commit replays through these same public methods while already holding
/// the lock (see `db::transaction`).
///

#[derive(Clone)]
pub struct Store {
    pkey_field: Arc<str>,
    lock: Arc<parking_lot::ReentrantMutex<Mutex<StoreInner>>>,
}

impl Store {
    #[must_use]
    pub fn new(pkey_field: impl Into<String>) -> Self {
        let pkey_field: String = pkey_field.into();
        Self {
            pkey_field: Arc::from(pkey_field.as_str()),
            lock: Arc::new(parking_lot::ReentrantMutex::new(Mutex::new(StoreInner::new(
                pkey_field,
            )))),
        }
    }

    #[must_use]
    pub fn pkey_field(&self) -> &str {
        &self.pkey_field
    }

    pub fn create(&self, record: Record) -> Result<Handle, Error> {
        tracing::debug!(target: "dossier::store", "create");
        let guard = self.lock.lock();
        guard.lock().create_one(record)
    }

    pub fn create_many(&self, records: Vec<Record>) -> Result<Vec<Handle>, Error> {
        let guard = self.lock.lock();
        let mut inner = guard.lock();
        records.into_iter().map(|r| inner.create_one(r)).collect()
    }

    #[must_use]
    pub fn get(&self, target: impl Into<Target>) -> Option<Handle> {
        let guard = self.lock.lock();
        let mut inner = guard.lock();
        let pkey = target.into().resolve(&self.pkey_field)?;
        inner.get_one(&pkey)
    }

    #[must_use]
    pub fn get_many<T: Into<Target>>(&self, targets: Vec<T>) -> IndexMap<Value, Handle> {
        let guard = self.lock.lock();
        let mut inner = guard.lock();
        let mut out = IndexMap::new();
        for target in targets {
            if let Some(pkey) = target.into().resolve(&self.pkey_field) {
                if let Some(handle) = inner.get_one(&pkey) {
                    out.insert(pkey, handle);
                }
            }
        }
        out
    }

    pub fn update(&self, target: Record, fields: Option<Vec<String>>) -> Result<Handle, Error> {
        tracing::debug!(target: "dossier::store", "update");
        let guard = self.lock.lock();
        guard.lock().update_one(target, fields)
    }

    pub fn delete(&self, target: impl Into<Target>, fields: Option<Vec<String>>) -> Result<(), Error> {
        tracing::debug!(target: "dossier::store", "delete");
        let guard = self.lock.lock();
        let mut inner = guard.lock();
        let pkey = target
            .into()
            .resolve(&self.pkey_field)
            .ok_or_else(|| StoreError::NotFound(Value::Null))?;
        inner.delete_one(&pkey, fields)
    }

    pub fn delete_many<T: Into<Target>>(&self, targets: Vec<T>) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.lock();
        for target in targets {
            if let Some(pkey) = target.into().resolve(&self.pkey_field) {
                if inner.records.contains_key(&pkey) {
                    inner.delete_one(&pkey, None)?;
                }
            }
        }
        Ok(())
    }

    pub fn clear(&self) {
        let guard = self.lock.lock();
        guard.lock().clear();
    }

    #[must_use]
    pub fn contains(&self, target: impl Into<Target>) -> bool {
        let guard = self.lock.lock();
        let inner = guard.lock();
        target
            .into()
            .resolve(&self.pkey_field)
            .is_some_and(|pkey| inner.records.contains_key(&pkey))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let guard = self.lock.lock();
        guard.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diagnostic: number of identity-map entries whose weak handle is
    /// still live (i.e. some caller holds a strong reference).
    #[must_use]
    pub fn identity_len(&self) -> usize {
        let guard = self.lock.lock();
        let inner = guard.lock();
        inner.identity.values().filter(|w| w.strong_count() > 0).count()
    }

    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&IndexManager, &std::collections::HashSet<Value>) -> R) -> R {
        let guard = self.lock.lock();
        let inner = guard.lock();
        f(&inner.indexer, &inner.universe())
    }

    pub(crate) fn all_records(&self) -> Vec<(Value, Record)> {
        let guard = self.lock.lock();
        let inner = guard.lock();
        inner.records.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Acquires the store's reentrant lock and holds it open for the
    /// returned guard's lifetime, so a caller (the transaction commit
    /// path) can make several public `Store` calls in sequence while
    /// guaranteeing no other thread observes an intermediate state.
    /// Re-entrant: each public `Store` method below locks the same outer
    /// mutex again from the same thread while this guard is alive.
    pub(crate) fn hold_lock(&self) -> parking_lot::ReentrantMutexGuard<'_, Mutex<StoreInner>> {
        self.lock.lock()
    }

    pub(crate) fn load_records(&self, pkeys: &std::collections::HashSet<Value>) -> Vec<(Value, Record)> {
        let guard = self.lock.lock();
        let inner = guard.lock();
        pkeys
            .iter()
            .filter_map(|pkey| inner.records.get(pkey).map(|record| (pkey.clone(), record.clone())))
            .collect()
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
    fn create_assigns_pkey_when_absent() {
        let store = Store::new("id");
        let mut r = Record::new();
        r.insert("age".to_owned(), Value::Int(1));
        let handle = store.create(r).unwrap();
        assert!(handle.get("id").is_some());
    }

    #[test]
    fn get_returns_same_handle_while_alive() {
        let store = Store::new("id");
        let created = store.create(record("a", 30)).unwrap();
        let fetched = store.get(Value::from("a")).unwrap();
        assert!(created.ptr_eq(&fetched));
    }

    #[test]
    fn update_reflects_in_same_handle() {
        let store = Store::new("id");
        let handle = store.create(record("a", 30)).unwrap();
        let mut patch = Record::new();
        patch.insert("id".to_owned(), Value::from("a"));
        patch.insert("age".to_owned(), Value::Int(31));
        store.update(patch, Some(vec!["age".to_owned()])).unwrap();
        assert_eq!(handle.get("age"), Some(Value::Int(31)));
    }

    #[test]
    fn delete_removes_from_store_and_indices() {
        let store = Store::new("id");
        store.create(record("a", 30)).unwrap();
        store.delete(Value::from("a"), None).unwrap();
        assert!(!store.contains(Value::from("a")));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn create_duplicate_pkey_conflicts() {
        let store = Store::new("id");
        store.create(record("a", 30)).unwrap();
        let err = store.create(record("a", 99)).unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Conflict(_))));
    }

    #[test]
    fn identity_len_drops_to_zero_after_handle_released() {
        let store = Store::new("id");
        let handle = store.create(record("a", 30)).unwrap();
        assert_eq!(store.identity_len(), 1);

        drop(handle);
        assert_eq!(store.identity_len(), 0);
    }

    #[test]
    fn partial_delete_nulls_field_in_place() {
        let store = Store::new("id");
        store.create(record("a", 30)).unwrap();
        store.delete(Value::from("a"), Some(vec!["age".to_owned()])).unwrap();
        let handle = store.get(Value::from("a")).unwrap();
        assert_eq!(handle.get("age"), Some(Value::Null));
        assert!(store.contains(Value::from("a")));
    }
}
