//! # QueryCache
//! Query results are stored as JSON, the same shape they arrive in from the server.
//! Typed access goes through serde on every read and write, so a caller asking for the wrong
//! type gets a `serde_json::Error` rather than a panic.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::data_model::{DirtyState, DirtyTracker, ListenerKey, QueryState};

type Entry = DirtyTracker<QueryState<serde_json::Value>>;

pub struct QueryCache<Key: Eq + Hash + Clone> {
    entries: HashMap<Key, Entry>,

    /// Keys removed since the last drain. Their listeners still need to hear about it.
    evicted: Vec<Key>,
}

impl<Key: Eq + Hash + Clone> Default for QueryCache<Key> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            evicted: Vec::new(),
        }
    }
}

impl<Key: Eq + Hash + Clone> QueryCache<Key> {
    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    fn set_state(
        &mut self,
        key: Key,
        state: QueryState<serde_json::Value>,
        modifier: Option<ListenerKey>,
    ) {
        self.evicted.retain(|evicted| evicted != &key);
        match self.entries.get_mut(&key) {
            Some(entry) => entry.value_mut(modifier).set(state),
            None => {
                let mut entry = DirtyTracker::clean(QueryState::Loading);
                entry.value_mut(modifier).set(state);
                self.entries.insert(key, entry);
            }
        }
    }

    pub fn mark_loading(&mut self, key: Key, modifier: Option<ListenerKey>) {
        self.set_state(key, QueryState::Loading, modifier);
    }

    pub fn write<D: Serialize>(
        &mut self,
        key: Key,
        data: &D,
        modifier: Option<ListenerKey>,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        self.set_state(key, QueryState::Ready(value), modifier);
        Ok(())
    }

    pub fn write_failure(&mut self, key: Key, message: String, modifier: Option<ListenerKey>) {
        self.set_state(key, QueryState::Failed { message }, modifier);
    }

    /// `Ok(None)` means the query was never requested (or was evicted).
    pub fn read<D: DeserializeOwned>(
        &self,
        key: &Key,
    ) -> Result<Option<QueryState<D>>, serde_json::Error> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        entry
            .get()
            .as_ref()
            .map(|value| D::deserialize(value))
            .transpose()
            .inspect_err(|e| log::error!("Cached query data has an unexpected shape: {e}"))
            .map(Some)
    }

    /// Read-modify-write of a ready entry within a single `&mut` borrow, so nobody can observe
    /// the entry between the read and the write.
    ///
    /// Returns `Ok(false)` (and leaves everything untouched) if there is no ready data to update.
    pub fn update<D, F>(
        &mut self,
        key: &Key,
        modifier: Option<ListenerKey>,
        f: F,
    ) -> Result<bool, serde_json::Error>
    where
        D: Serialize + DeserializeOwned,
        F: FnOnce(D) -> D,
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        let QueryState::Ready(value) = entry.get() else {
            return Ok(false);
        };

        let current = D::deserialize(value)
            .inspect_err(|e| log::error!("Cached query data has an unexpected shape: {e}"))?;
        let next = serde_json::to_value(f(current))?;
        entry.value_mut(modifier).set(QueryState::Ready(next));
        Ok(true)
    }

    pub fn evict(&mut self, key: &Key) -> bool {
        if self.entries.remove(key).is_some() {
            self.evicted.push(key.clone());
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        let keys: Vec<Key> = self.entries.keys().cloned().collect();
        for key in keys {
            self.evict(&key);
        }
    }

    /// Every key with a pending change, together with who should hear about it.
    /// All entries are clean afterwards.
    pub fn drain_dirty(&mut self) -> Vec<(Key, DirtyState)> {
        let mut dirty: Vec<(Key, DirtyState)> = self
            .entries
            .iter_mut()
            .filter_map(|(key, entry)| {
                let state = entry.take_dirty();
                state.is_dirty().then(|| (key.clone(), state))
            })
            .collect();
        dirty.extend(
            self.evicted
                .drain(..)
                .map(|key| (key, DirtyState::DirtyAll)),
        );
        dirty
    }
}
