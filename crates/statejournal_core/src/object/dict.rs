//! Durable key/value dictionary.

use crate::error::{CoreError, CoreResult};
use crate::format::FrameTag;
use crate::object::diff::{encode_diff, DiffChange, DictValue, Value};
use crate::object::state::{DurableObject, DurableObjectState};
use crate::types::ObjectId;
use std::collections::{BTreeMap, BTreeSet};

/// A durable map from `u64` keys to values.
///
/// The dictionary keeps its last committed contents and a working overlay
/// separately, plus the exact set of keys that differ between them. That
/// set is what the next commit writes: setting a key back to its committed
/// value makes it clean again, and removing a key that was never committed
/// leaves no tombstone behind.
#[derive(Debug, Clone)]
pub struct DurableDict<V: DictValue = Value> {
    object_id: ObjectId,
    state: DurableObjectState,
    committed: BTreeMap<u64, V>,
    working: BTreeMap<u64, V>,
    removed_from_committed: BTreeSet<u64>,
    dirty_keys: BTreeSet<u64>,
}

impl<V: DictValue> DurableDict<V> {
    /// Creates a dictionary that has never been committed.
    #[must_use]
    pub fn new_transient(object_id: ObjectId) -> Self {
        Self::with_state(object_id, BTreeMap::new(), DurableObjectState::TransientDirty)
    }

    /// Creates a dictionary from committed contents.
    #[must_use]
    pub fn from_committed(object_id: ObjectId, committed: BTreeMap<u64, V>) -> Self {
        Self::with_state(object_id, committed, DurableObjectState::Clean)
    }

    fn with_state(
        object_id: ObjectId,
        committed: BTreeMap<u64, V>,
        state: DurableObjectState,
    ) -> Self {
        Self {
            object_id,
            state,
            committed,
            working: BTreeMap::new(),
            removed_from_committed: BTreeSet::new(),
            dirty_keys: BTreeSet::new(),
        }
    }

    fn ensure_attached(&self) -> CoreResult<()> {
        if self.state == DurableObjectState::Detached {
            return Err(CoreError::ObjectDetached {
                object_id: self.object_id,
            });
        }
        Ok(())
    }

    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn get(&self, key: u64) -> CoreResult<Option<&V>> {
        self.ensure_attached()?;
        Ok(self.lookup(key))
    }

    fn lookup(&self, key: u64) -> Option<&V> {
        if self.removed_from_committed.contains(&key) {
            return None;
        }
        self.working.get(&key).or_else(|| self.committed.get(&key))
    }

    /// Returns `true` if `key` is present.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn contains_key(&self, key: u64) -> CoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns the number of keys.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn len(&self) -> CoreResult<usize> {
        self.ensure_attached()?;
        let added = self
            .working
            .keys()
            .filter(|k| !self.committed.contains_key(k))
            .count();
        Ok(self.committed.len() - self.removed_from_committed.len() + added)
    }

    /// Returns `true` if the dictionary holds no keys.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns every entry in key order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn entries(&self) -> CoreResult<Vec<(u64, V)>> {
        self.ensure_attached()?;
        let mut view: BTreeMap<u64, &V> = self
            .committed
            .iter()
            .filter(|(k, _)| !self.removed_from_committed.contains(k))
            .map(|(k, v)| (*k, v))
            .collect();
        view.extend(self.working.iter().map(|(k, v)| (*k, v)));
        Ok(view.into_iter().map(|(k, v)| (k, v.clone())).collect())
    }

    /// Sets `key` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn set(&mut self, key: u64, value: V) -> CoreResult<()> {
        self.ensure_attached()?;
        self.removed_from_committed.remove(&key);

        if self.committed.get(&key) == Some(&value) {
            self.working.remove(&key);
            self.dirty_keys.remove(&key);
        } else {
            self.working.insert(key, value);
            self.dirty_keys.insert(key);
        }

        self.refresh_state();
        Ok(())
    }

    /// Removes `key` and returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn remove(&mut self, key: u64) -> CoreResult<bool> {
        self.ensure_attached()?;
        let existed = self.lookup(key).is_some();

        self.working.remove(&key);
        if self.committed.contains_key(&key) {
            self.removed_from_committed.insert(key);
            self.dirty_keys.insert(key);
        } else {
            self.dirty_keys.remove(&key);
        }

        self.refresh_state();
        Ok(existed)
    }

    /// Returns the number of keys the next commit will write.
    #[must_use]
    pub fn pending_change_count(&self) -> usize {
        self.dirty_keys.len()
    }

    /// Returns the pending changes in key order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectDetached`] if the dictionary is detached.
    pub fn pending_diff(&self) -> CoreResult<Vec<(u64, DiffChange<V>)>> {
        self.ensure_attached()?;
        let mut entries = Vec::with_capacity(self.dirty_keys.len());
        for &key in &self.dirty_keys {
            if self.removed_from_committed.contains(&key) {
                entries.push((key, DiffChange::Removed));
            } else if let Some(value) = self.working.get(&key) {
                entries.push((key, DiffChange::Present(value.clone())));
            }
        }
        Ok(entries)
    }

    /// Returns the committed value for `key`, ignoring pending changes.
    pub(crate) fn committed_get(&self, key: u64) -> Option<&V> {
        self.committed.get(&key)
    }

    /// Drops pending changes without detaching a never-committed object.
    pub(crate) fn revert_to_committed(&mut self) {
        self.working.clear();
        self.removed_from_committed.clear();
        self.dirty_keys.clear();
        if self.state == DurableObjectState::PersistentDirty {
            self.state = DurableObjectState::Clean;
        }
    }

    fn refresh_state(&mut self) {
        match self.state {
            DurableObjectState::Clean if !self.dirty_keys.is_empty() => {
                self.state = DurableObjectState::PersistentDirty;
            }
            DurableObjectState::PersistentDirty if self.dirty_keys.is_empty() => {
                self.state = DurableObjectState::Clean;
            }
            _ => {}
        }
    }
}

/// Applies one committed diff to a baseline map.
pub(crate) fn apply_diff<V>(map: &mut BTreeMap<u64, V>, entries: Vec<(u64, DiffChange<V>)>) {
    for (key, change) in entries {
        match change {
            DiffChange::Present(value) => {
                map.insert(key, value);
            }
            DiffChange::Removed => {
                map.remove(&key);
            }
        }
    }
}

impl<V: DictValue> DurableObject for DurableDict<V> {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn state(&self) -> DurableObjectState {
        self.state
    }

    fn frame_tag(&self) -> FrameTag {
        FrameTag::DICT_VERSION
    }

    fn write_pending_diff(&self, out: &mut Vec<u8>) -> CoreResult<()> {
        let entries = self.pending_diff()?;
        encode_diff(&entries, out);
        Ok(())
    }

    fn on_commit_succeeded(&mut self) -> CoreResult<()> {
        self.ensure_attached()?;
        for key in std::mem::take(&mut self.removed_from_committed) {
            self.committed.remove(&key);
        }
        self.committed.append(&mut self.working);
        self.dirty_keys.clear();
        self.state = DurableObjectState::Clean;
        Ok(())
    }

    fn discard_changes(&mut self) -> CoreResult<()> {
        match self.state {
            DurableObjectState::PersistentDirty => self.revert_to_committed(),
            DurableObjectState::TransientDirty => {
                self.revert_to_committed();
                self.committed.clear();
                self.state = DurableObjectState::Detached;
            }
            DurableObjectState::Clean | DurableObjectState::Detached => {}
        }
        Ok(())
    }
}
