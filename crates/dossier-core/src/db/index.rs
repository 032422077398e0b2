//! Module: db::index
//! Responsibility: one ordered map per field, mapping coerced values to
//! the set of primary keys holding that value. Supports point lookups and
//! half-open range scans for the predicate engine.
//! Does not own: predicate tree structure or evaluation strategy (see
//! `db::predicate`).
//! Boundary: `db::store` is the only caller that mutates this through
//! `insert`/`remove`/`update`; everything else reads via `field`.

use crate::error::CoercionError;
use crate::key::{self, CoercedKey};
use crate::record::Record;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// The set of primary keys sharing one coerced field value. Never empty —
/// callers remove the map entry instead of leaving an empty set (I3).
pub type PostingSet = HashSet<Value>;

///
/// FieldIndex
///
/// One field's ordered map: coerced value -> posting set.
///

#[derive(Debug, Default)]
pub struct FieldIndex {
    map: BTreeMap<CoercedKey, PostingSet>,
}

impl FieldIndex {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &CoercedKey) -> Option<&PostingSet> {
        self.map.get(key)
    }

    fn insert(&mut self, key: CoercedKey, pkey: Value) {
        self.map.entry(key).or_default().insert(pkey);
    }

    fn remove(&mut self, key: &CoercedKey, pkey: &Value) {
        if let Some(set) = self.map.get_mut(key) {
            set.remove(pkey);
            if set.is_empty() {
                self.map.remove(key);
            }
        }
    }

    /// Posting sets for keys strictly less than `bound` (used by `LT`).
    pub fn below(&self, bound: &CoercedKey) -> impl Iterator<Item = &PostingSet> {
        self.map.range(..bound.clone()).map(|(_, v)| v)
    }

    /// Posting sets for keys less than or equal to `bound` (used by `LE`).
    pub fn at_most(&self, bound: &CoercedKey) -> impl Iterator<Item = &PostingSet> {
        use std::ops::Bound;
        self.map
            .range((Bound::Unbounded, Bound::Included(bound.clone())))
            .map(|(_, v)| v)
    }

    /// Posting sets for keys strictly greater than `bound` (used by `GT`).
    pub fn above(&self, bound: &CoercedKey) -> impl Iterator<Item = &PostingSet> {
        use std::ops::Bound;
        self.map
            .range((Bound::Excluded(bound.clone()), Bound::Unbounded))
            .map(|(_, v)| v)
    }

    /// Posting sets for keys greater than or equal to `bound` (used by `GE`).
    pub fn at_least(&self, bound: &CoercedKey) -> impl Iterator<Item = &PostingSet> {
        self.map.range(bound.clone()..).map(|(_, v)| v)
    }

    /// Posting sets for keys not equal to `bound` (used by `NE`).
    pub fn not_equal(&self, bound: &CoercedKey) -> impl Iterator<Item = &PostingSet> {
        self.map.iter().filter_map(move |(k, v)| (k != bound).then_some(v))
    }

    pub fn all(&self) -> impl Iterator<Item = &PostingSet> {
        self.map.values()
    }

    /// Posting sets for keys not present in `excluded` (used by multi-value
    /// `NOT IN`). Unlike `not_equal`, this only ever considers keys this
    /// index actually holds — a record that never wrote the field
    /// contributes no posting set here.
    pub fn not_in<'a>(
        &'a self,
        excluded: &'a HashSet<CoercedKey>,
    ) -> impl Iterator<Item = &'a PostingSet> {
        self.map.iter().filter_map(move |(k, v)| (!excluded.contains(k)).then_some(v))
    }
}

///
/// IndexManager
///
/// Maintains `indices` (field name -> `FieldIndex`) and `fields` (primary
/// key -> set of field names currently indexed for that record), keeping
/// I1-I4 from the data model invariant to itself.
///

#[derive(Debug, Default)]
pub struct IndexManager {
    indices: HashMap<String, FieldIndex>,
    fields: HashMap<Value, HashSet<String>>,
    pkey_field: String,
}

impl IndexManager {
    #[must_use]
    pub fn new(pkey_field: impl Into<String>) -> Self {
        Self {
            indices: HashMap::new(),
            fields: HashMap::new(),
            pkey_field: pkey_field.into(),
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldIndex> {
        self.indices.get(name)
    }

    #[must_use]
    pub fn fields_for(&self, pkey: &Value) -> Option<&HashSet<String>> {
        self.fields.get(pkey)
    }

    /// Inserts `record`'s non-primary-key fields into their field indices.
    ///
    /// # Errors
    ///
    /// Propagates `CoercionError` if a field value cannot be coerced; any
    /// fields already processed before the failure remain indexed, since
    /// coercion over the closed `Value` type cannot actually fail (see
    /// `crate::key::coerce`).
    pub fn insert(&mut self, pkey: &Value, record: &Record) -> Result<(), CoercionError> {
        let touched = self.fields.entry(pkey.clone()).or_default();
        for (field, value) in record {
            if field == &self.pkey_field {
                continue;
            }
            let coerced = key::coerce(value, Some(field))?;
            self.indices
                .entry(field.clone())
                .or_default()
                .insert(coerced, pkey.clone());
            touched.insert(field.clone());
        }
        Ok(())
    }

    /// Removes `pkey`'s entries from the named fields, or from every field
    /// it is currently indexed under when `fields` is `None`.
    ///
    /// # Errors
    ///
    /// Propagates `CoercionError` from re-coercing the old value (see
    /// `insert`).
    pub fn remove(
        &mut self,
        pkey: &Value,
        record: &Record,
        fields: Option<&[String]>,
    ) -> Result<(), CoercionError> {
        let present = self.fields.get(pkey).cloned().unwrap_or_default();
        let targets: Vec<String> = match fields {
            Some(explicit) => explicit.to_vec(),
            None => present.iter().cloned().collect(),
        };

        for field in &targets {
            let Some(value) = record.get(field) else { continue };
            let coerced = key::coerce(value, Some(field))?;
            if let Some(index) = self.indices.get_mut(field) {
                index.remove(&coerced, pkey);
                if index.is_empty() {
                    self.indices.remove(field);
                }
            }
        }

        if let Some(touched) = self.fields.get_mut(pkey) {
            for field in &targets {
                touched.remove(field);
            }
            if touched.is_empty() {
                self.fields.remove(pkey);
            }
        }

        Ok(())
    }

    /// Diffs `old_record` against `new_record` over `fields`, removing the
    /// stale coerced entries and inserting the fresh ones.
    ///
    /// # Errors
    ///
    /// Propagates `CoercionError` from either phase.
    pub fn update(
        &mut self,
        pkey: &Value,
        old_record: &Record,
        new_record: &Record,
        fields: &[String],
    ) -> Result<(), CoercionError> {
        let present = self.fields.get(pkey).cloned().unwrap_or_default();
        let (already_indexed, newly_indexed): (Vec<String>, Vec<String>) = fields
            .iter()
            .cloned()
            .partition(|f| present.contains(f));

        if !already_indexed.is_empty() {
            self.remove(pkey, old_record, Some(&already_indexed))?;
            self.insert_fields(pkey, new_record, &already_indexed)?;
        }
        if !newly_indexed.is_empty() {
            self.insert_fields(pkey, new_record, &newly_indexed)?;
        }
        Ok(())
    }

    fn insert_fields(
        &mut self,
        pkey: &Value,
        record: &Record,
        fields: &[String],
    ) -> Result<(), CoercionError> {
        let touched = self.fields.entry(pkey.clone()).or_default();
        for field in fields {
            if field == &self.pkey_field {
                continue;
            }
            let Some(value) = record.get(field) else { continue };
            let coerced = key::coerce(value, Some(field))?;
            self.indices
                .entry(field.clone())
                .or_default()
                .insert(coerced, pkey.clone());
            touched.insert(field.clone());
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.indices.clear();
        self.fields.clear();
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
    fn insert_then_point_lookup_finds_pkey() {
        let mut mgr = IndexManager::new("id");
        let r = record("a", 30);
        let pkey = Value::from("a");
        mgr.insert(&pkey, &r).unwrap();

        let coerced = key::coerce(&Value::Int(30), None).unwrap();
        let posting = mgr.field("age").unwrap().get(&coerced).unwrap();
        assert!(posting.contains(&pkey));
    }

    #[test]
    fn remove_drops_empty_posting_set_and_field_index() {
        let mut mgr = IndexManager::new("id");
        let r = record("a", 30);
        let pkey = Value::from("a");
        mgr.insert(&pkey, &r).unwrap();
        mgr.remove(&pkey, &r, None).unwrap();

        assert!(mgr.field("age").is_none());
        assert!(mgr.fields_for(&pkey).is_none());
    }

    #[test]
    fn update_moves_posting_between_coerced_keys() {
        let mut mgr = IndexManager::new("id");
        let pkey = Value::from("a");
        let old = record("a", 30);
        let new = record("a", 31);
        mgr.insert(&pkey, &old).unwrap();
        mgr.update(&pkey, &old, &new, &["age".to_owned()]).unwrap();

        let old_key = key::coerce(&Value::Int(30), None).unwrap();
        let new_key = key::coerce(&Value::Int(31), None).unwrap();
        assert!(mgr.field("age").unwrap().get(&old_key).is_none());
        assert!(mgr.field("age").unwrap().get(&new_key).unwrap().contains(&pkey));
    }

    #[test]
    fn primary_key_field_is_never_indexed() {
        let mut mgr = IndexManager::new("id");
        let r = record("a", 30);
        mgr.insert(&Value::from("a"), &r).unwrap();
        assert!(mgr.field("id").is_none());
    }
}
