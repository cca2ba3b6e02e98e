use std::collections::BTreeMap;
use std::ops::Deref;

/// State that can open a transaction and later keep or discard every write
/// made since
pub trait Transactional {
    fn begin(&mut self);
    fn commit(&mut self);
    fn rollback(&mut self);
}

/// Ordered map that remembers the prior value of each key written while a
/// transaction is open. Rollback costs one entry per touched key instead of
/// a copy of the whole map.
///
/// Reads go through `Deref` to the underlying `BTreeMap`; every write goes
/// through the methods below so it can be journaled.
#[derive(Debug, Clone)]
pub struct JournaledMap<K: Ord, V> {
    entries: BTreeMap<K, V>,
    undo: Option<BTreeMap<K, Option<V>>>,
}

impl<K: Ord, V> Default for JournaledMap<K, V> {
    fn default() -> Self {
        JournaledMap {
            entries: BTreeMap::new(),
            undo: None,
        }
    }
}

impl<K: Ord + Clone, V: Clone> JournaledMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// First write to `key` in this transaction saves what was there
    fn record(&mut self, key: &K) {
        if let Some(undo) = self.undo.as_mut() {
            if !undo.contains_key(key) {
                undo.insert(key.clone(), self.entries.get(key).cloned());
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.record(&key);
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.record(key);
        self.entries.remove(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.record(key);
        self.entries.get_mut(key)
    }

    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        self.record(&key);
        self.entries.entry(key).or_insert_with(default)
    }

    /// Owned copy of the current entries
    pub fn to_map(&self) -> BTreeMap<K, V> {
        self.entries.clone()
    }

    pub fn in_transaction(&self) -> bool {
        self.undo.is_some()
    }
}

impl<K: Ord + Clone, V: Clone> Transactional for JournaledMap<K, V> {
    fn begin(&mut self) {
        self.undo = Some(BTreeMap::new());
    }

    fn commit(&mut self) {
        self.undo = None;
    }

    fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        for (key, prior) in undo {
            match prior {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

impl<K: Ord, V> Deref for JournaledMap<K, V> {
    type Target = BTreeMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl<K: Ord, V> From<BTreeMap<K, V>> for JournaledMap<K, V> {
    fn from(entries: BTreeMap<K, V>) -> Self {
        JournaledMap {
            entries,
            undo: None,
        }
    }
}
