//! The parameter registry.
//!
//! [`ParameterStore`] is a keyed registry behind a read-write lock: the
//! event applier is its only writer, and any number of API handlers or
//! renderers can read concurrently. Records are kept in the order their
//! names were first seen.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use paramlink_core::error::{Error, Result};
use paramlink_core::types::{Parameter, ParameterPatch};

#[derive(Debug, Default)]
struct Registry {
    order: Vec<String>,
    records: HashMap<String, Parameter>,
}

/// Concurrent, insertion-ordered parameter registry.
#[derive(Debug, Default)]
pub struct ParameterStore {
    inner: RwLock<Registry>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the registry consistent, so a poisoned
    // lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `name` if absent, then merge the fields `patch` carries.
    ///
    /// Returns the record as it stands after the merge.
    pub fn upsert(&self, name: &str, patch: &ParameterPatch) -> Parameter {
        let mut registry = self.write();
        let Registry { order, records } = &mut *registry;
        let record = records.entry(name.to_string()).or_insert_with(|| {
            order.push(name.to_string());
            Parameter::new(name)
        });
        patch.apply_to(record);
        record.clone()
    }

    /// Store `record` as-is, overwriting every field of an existing record
    /// with the same name. A new name is appended to the order.
    pub fn replace(&self, record: Parameter) -> Parameter {
        let mut registry = self.write();
        let Registry { order, records } = &mut *registry;
        if !records.contains_key(&record.name) {
            order.push(record.name.clone());
        }
        records.insert(record.name.clone(), record.clone());
        record
    }

    pub fn get(&self, name: &str) -> Option<Parameter> {
        self.read().records.get(name).cloned()
    }

    /// Like [`get`](Self::get), but a miss is [`Error::NotFound`].
    pub fn require(&self, name: &str) -> Result<Parameter> {
        self.get(name).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// A copy of every record, in insertion order.
    pub fn snapshot(&self) -> Vec<Parameter> {
        let registry = self.read();
        registry
            .order
            .iter()
            .filter_map(|name| registry.records.get(name).cloned())
            .collect()
    }

    /// Empty the registry. Returns how many records were removed.
    pub fn clear_all(&self) -> usize {
        let mut registry = self.write();
        let removed = registry.records.len();
        registry.order.clear();
        registry.records.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().records.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn list_patch(index: u32, min: &str, max: &str, current: &str) -> ParameterPatch {
        ParameterPatch {
            index: Some(index),
            min: Some(min.into()),
            max: Some(max.into()),
            current: Some(current.into()),
        }
    }

    #[test]
    fn upsert_creates_with_unset_fields() {
        let store = ParameterStore::new();
        let p = store.upsert("gain", &ParameterPatch::empty());
        assert_eq!(p, Parameter::new("gain"));
        assert!(store.contains("gain"));
    }

    #[test]
    fn upsert_merges_only_supplied_fields() {
        let store = ParameterStore::new();
        store.upsert("gain", &list_patch(3, "0", "10", "5"));
        let p = store.upsert("gain", &ParameterPatch::current("7"));
        assert_eq!(p.index, Some(3));
        assert_eq!(p.min.as_deref(), Some("0"));
        assert_eq!(p.max.as_deref(), Some("10"));
        assert_eq!(p.current.as_deref(), Some("7"));
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = ParameterStore::new();
        let patch = ParameterPatch {
            index: Some(1),
            current: Some("4".into()),
            ..ParameterPatch::default()
        };
        let first = store.upsert("mute", &patch);
        let second = store.upsert("mute", &patch);
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_overwrites_every_field_and_keeps_position() {
        let store = ParameterStore::new();
        store.upsert("gain", &list_patch(3, "0", "10", "5"));
        store.upsert("mute", &ParameterPatch::empty());
        let p = store.replace(Parameter {
            current: Some("6".into()),
            ..Parameter::new("gain")
        });
        assert_eq!(p.index, None);
        assert_eq!(p.min, None);
        assert_eq!(store.get("gain"), Some(p));
        let names: Vec<String> = store.snapshot().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["gain", "mute"]);

        store.replace(Parameter::new("tempo"));
        assert_eq!(store.snapshot()[2].name, "tempo");
    }

    #[test]
    fn get_missing_is_none_and_require_is_not_found() {
        let store = ParameterStore::new();
        assert_eq!(store.get("missing"), None);
        assert!(matches!(store.require("missing"), Err(Error::NotFound(n)) if n == "missing"));
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let store = ParameterStore::new();
        store.upsert("zeta", &ParameterPatch::empty());
        store.upsert("alpha", &ParameterPatch::empty());
        store.upsert("zeta", &ParameterPatch::current("1"));
        let names: Vec<String> = store.snapshot().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let store = ParameterStore::new();
        store.upsert("gain", &ParameterPatch::current("1"));
        let snap = store.snapshot();
        store.upsert("gain", &ParameterPatch::current("2"));
        assert_eq!(snap[0].current.as_deref(), Some("1"));
    }

    #[test]
    fn clear_all_empties_registry() {
        let store = ParameterStore::new();
        store.upsert("a", &ParameterPatch::empty());
        store.upsert("b", &ParameterPatch::empty());
        assert_eq!(store.clear_all(), 2);
        assert!(store.snapshot().is_empty());
        assert!(store.is_empty());

        // Names seen after a clear start a fresh order.
        store.upsert("b", &ParameterPatch::empty());
        assert_eq!(store.snapshot()[0].name, "b");
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let store = Arc::new(ParameterStore::new());
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.upsert(&format!("p{}", i % 10), &ParameterPatch::current(i.to_string()));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snap = store.snapshot();
                        assert!(snap.len() <= 10);
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.len(), 10);
    }
}
