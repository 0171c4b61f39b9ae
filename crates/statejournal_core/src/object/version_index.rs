//! The version index: object id to newest version frame.

use crate::error::CoreResult;
use crate::format::{FrameTag, Ptr64};
use crate::object::dict::DurableDict;
use crate::object::state::{DurableObject, DurableObjectState};
use crate::types::ObjectId;
use std::collections::BTreeMap;

/// Maps every committed object to the data log address of its newest
/// version frame.
///
/// The index is itself a durable dictionary living at
/// [`ObjectId::VERSION_INDEX`]. Its own newest frame is not recorded
/// inside it; the meta commit record points at it instead.
#[derive(Debug, Clone)]
pub struct VersionIndex {
    dict: DurableDict<Option<Ptr64>>,
}

impl VersionIndex {
    /// Creates the index of a fresh journal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dict: DurableDict::new_transient(ObjectId::VERSION_INDEX),
        }
    }

    /// Creates an index from committed entries.
    #[must_use]
    pub fn from_committed(entries: BTreeMap<u64, Option<Ptr64>>) -> Self {
        Self {
            dict: DurableDict::from_committed(ObjectId::VERSION_INDEX, entries),
        }
    }

    /// Returns the newest version address of `object_id`, including
    /// uncommitted updates.
    #[must_use]
    pub fn try_get_object_version_ptr(&self, object_id: ObjectId) -> Option<Ptr64> {
        self.dict
            .get(object_id.as_u64())
            .ok()
            .flatten()
            .copied()
            .flatten()
    }

    /// Returns the newest committed version address of `object_id`.
    #[must_use]
    pub fn committed_ptr(&self, object_id: ObjectId) -> Option<Ptr64> {
        self.dict.committed_get(object_id.as_u64()).copied().flatten()
    }

    /// Records `ptr` as the newest version of `object_id`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the index was detached, which never
    /// happens to an index owned by a workspace.
    pub fn set_object_version_ptr(&mut self, object_id: ObjectId, ptr: Ptr64) -> CoreResult<()> {
        self.dict.set(object_id.as_u64(), ptr.non_null())
    }

    /// Returns the smallest id above every indexed object, never below
    /// [`ObjectId::MIN_USER`].
    #[must_use]
    pub fn compute_next_object_id(&self) -> ObjectId {
        let max_key = self
            .dict
            .entries()
            .ok()
            .and_then(|entries| entries.last().map(|(k, _)| *k))
            .unwrap_or(0);
        ObjectId::new(max_key.max(ObjectId::MIN_USER.as_u64() - 1) + 1)
    }

    /// Returns every `(object, address)` entry in id order.
    #[must_use]
    pub fn entries(&self) -> Vec<(ObjectId, Ptr64)> {
        self.dict
            .entries()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, ptr)| ptr.map(|p| (ObjectId::new(k), p)))
            .collect()
    }

    /// Returns the number of indexed objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dict.len().unwrap_or(0)
    }

    /// Returns `true` if no object is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops updates staged by an unfinished commit.
    pub(crate) fn revert_to_committed(&mut self) {
        self.dict.revert_to_committed();
    }
}

impl Default for VersionIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableObject for VersionIndex {
    fn object_id(&self) -> ObjectId {
        ObjectId::VERSION_INDEX
    }

    fn state(&self) -> DurableObjectState {
        self.dict.state()
    }

    fn frame_tag(&self) -> FrameTag {
        self.dict.frame_tag()
    }

    fn write_pending_diff(&self, out: &mut Vec<u8>) -> CoreResult<()> {
        self.dict.write_pending_diff(out)
    }

    fn on_commit_succeeded(&mut self) -> CoreResult<()> {
        self.dict.on_commit_succeeded()
    }

    fn discard_changes(&mut self) -> CoreResult<()> {
        self.dict.discard_changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Address64;
    use crate::object::diff::{DiffChange, DiffPayloadReader};

    fn ptr(offset: u64) -> Ptr64 {
        Address64::new(offset).unwrap()
    }

    #[test]
    fn fresh_index_is_transient_and_empty() {
        let index = VersionIndex::new();
        assert_eq!(index.object_id(), ObjectId::new(0));
        assert_eq!(index.state(), DurableObjectState::TransientDirty);
        assert!(index.is_empty());
        assert_eq!(index.compute_next_object_id(), ObjectId::new(16));
    }

    #[test]
    fn set_and_get_pointer() {
        let mut index = VersionIndex::new();
        index.set_object_version_ptr(ObjectId::new(16), ptr(4)).unwrap();
        assert_eq!(index.try_get_object_version_ptr(ObjectId::new(16)), Some(ptr(4)));
        assert_eq!(index.try_get_object_version_ptr(ObjectId::new(17)), None);
        assert_eq!(index.committed_ptr(ObjectId::new(16)), None);
    }

    #[test]
    fn next_object_id_follows_max_key() {
        let mut index = VersionIndex::new();
        index.set_object_version_ptr(ObjectId::new(3), ptr(8)).unwrap();
        assert_eq!(index.compute_next_object_id(), ObjectId::new(16));

        index.set_object_version_ptr(ObjectId::new(40), ptr(12)).unwrap();
        index.set_object_version_ptr(ObjectId::new(20), ptr(16)).unwrap();
        assert_eq!(index.compute_next_object_id(), ObjectId::new(41));
    }

    #[test]
    fn clean_index_becomes_persistent_dirty_then_clean() {
        let mut entries = BTreeMap::new();
        entries.insert(16, Some(ptr(4)));
        let mut index = VersionIndex::from_committed(entries);
        assert_eq!(index.state(), DurableObjectState::Clean);

        index.set_object_version_ptr(ObjectId::new(16), ptr(40)).unwrap();
        assert_eq!(index.state(), DurableObjectState::PersistentDirty);
        assert_eq!(index.committed_ptr(ObjectId::new(16)), Some(ptr(4)));

        index.on_commit_succeeded().unwrap();
        assert_eq!(index.state(), DurableObjectState::Clean);
        assert_eq!(index.committed_ptr(ObjectId::new(16)), Some(ptr(40)));
    }

    #[test]
    fn discard_on_persistent_dirty_restores() {
        let mut entries = BTreeMap::new();
        entries.insert(16, Some(ptr(4)));
        let mut index = VersionIndex::from_committed(entries);
        index.set_object_version_ptr(ObjectId::new(17), ptr(8)).unwrap();

        index.discard_changes().unwrap();
        assert_eq!(index.state(), DurableObjectState::Clean);
        assert_eq!(index.try_get_object_version_ptr(ObjectId::new(17)), None);
    }

    #[test]
    fn discard_on_transient_detaches() {
        let mut index = VersionIndex::new();
        index.discard_changes().unwrap();
        assert_eq!(index.state(), DurableObjectState::Detached);
        assert!(index.is_empty());
    }

    #[test]
    fn pending_diff_carries_pointers() {
        let mut index = VersionIndex::new();
        index.set_object_version_ptr(ObjectId::new(17), ptr(24)).unwrap();
        index.set_object_version_ptr(ObjectId::new(16), ptr(8)).unwrap();

        let mut out = Vec::new();
        index.write_pending_diff(&mut out).unwrap();
        let entries = DiffPayloadReader::new(&out)
            .unwrap()
            .read_all::<Option<Ptr64>>()
            .unwrap();
        assert_eq!(
            entries,
            vec![
                (16, DiffChange::Present(Some(ptr(8)))),
                (17, DiffChange::Present(Some(ptr(24)))),
            ]
        );
    }

    #[test]
    fn revert_drops_staged_pointers() {
        let mut index = VersionIndex::new();
        index.set_object_version_ptr(ObjectId::new(16), ptr(8)).unwrap();
        index.revert_to_committed();
        assert_eq!(index.state(), DurableObjectState::TransientDirty);
        assert!(index.is_empty());
    }
}
