//! Crash recovery: choosing the newest commit both logs agree on.
//!
//! The data log is synced before the meta record that publishes it, so any
//! meta record whose `DataTail` fits inside the data log describes bytes
//! that are really there. A crash can still leave the two logs out of step:
//! the meta log may hold a record whose data never reached the disk (when
//! syncs are relaxed or the OS reordered writes), and the data log may hold
//! frames of a commit whose meta record was torn. Recovery walks the meta
//! records from newest to oldest and stops at the first one that fits.

use crate::commit::meta_record::MetaCommitRecord;
use crate::frame::LOG_HEADER_SIZE;
use crate::types::{EpochSeq, ObjectId};
use tracing::{info, warn};

/// The state a workspace resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryInfo {
    /// Epoch of the chosen commit (`0` when nothing is committed).
    pub epoch_seq: EpochSeq,
    /// Next object id to allocate.
    pub next_object_id: ObjectId,
    /// Address of the newest version index frame (`0` = none).
    pub version_index_ptr: u64,
    /// Data log length published by the chosen commit.
    pub data_tail: u64,
    /// Root object of the chosen commit.
    pub root_object_id: ObjectId,
    /// Whether the data log holds bytes past `data_tail` that must be cut.
    pub was_truncated: bool,
    /// Data log length before truncation (`0` when not truncated).
    pub original_data_size: u64,
    /// Index of the chosen record in the scanned meta records.
    pub record_index: Option<usize>,
}

impl RecoveryInfo {
    /// The state of a journal with no commits.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            epoch_seq: EpochSeq::ZERO,
            next_object_id: ObjectId::MIN_USER,
            version_index_ptr: 0,
            data_tail: 0,
            root_object_id: ObjectId::VERSION_INDEX,
            was_truncated: false,
            original_data_size: 0,
            record_index: None,
        }
    }

    /// Returns `true` if no commit was recovered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.epoch_seq.as_u64() == 0
    }

    fn from_record(index: usize, record: &MetaCommitRecord, actual_data_len: u64) -> Self {
        let was_truncated = record.data_tail < actual_data_len;
        Self {
            epoch_seq: record.epoch_seq,
            next_object_id: record.next_object_id,
            version_index_ptr: record.version_index_ptr,
            data_tail: record.data_tail,
            root_object_id: record.root_object_id,
            was_truncated,
            original_data_size: if was_truncated { actual_data_len } else { 0 },
            record_index: Some(index),
        }
    }
}

impl Default for RecoveryInfo {
    fn default() -> Self {
        Self::empty()
    }
}

/// Recovery decisions. Pure: reads nothing, writes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceRecovery;

impl WorkspaceRecovery {
    /// Returns the data log length recovery works with: a log holding
    /// nothing but its header counts as empty.
    #[must_use]
    pub const fn logical_data_len(file_len: u64) -> u64 {
        if file_len <= LOG_HEADER_SIZE {
            0
        } else {
            file_len
        }
    }

    /// Returns `true` if every byte `record` publishes exists.
    #[must_use]
    pub const fn is_record_valid(record: &MetaCommitRecord, actual_data_len: u64) -> bool {
        record.data_tail <= actual_data_len
    }

    /// Picks the newest usable commit.
    ///
    /// `records` are the meta records in log order (oldest first).
    /// With no usable record the fresh state is returned; if the data log
    /// still holds bytes in that case, they belong to a commit that was
    /// never published and are marked for truncation.
    #[must_use]
    pub fn recover(records: &[MetaCommitRecord], actual_data_len: u64) -> RecoveryInfo {
        if actual_data_len == 0 {
            if !records.is_empty() {
                warn!(
                    records = records.len(),
                    "data log is empty, ignoring every meta record"
                );
            }
            return RecoveryInfo::empty();
        }

        for (index, record) in records.iter().enumerate().rev() {
            if Self::is_record_valid(record, actual_data_len) {
                let skipped = records.len() - 1 - index;
                if skipped > 0 {
                    warn!(
                        skipped,
                        data_len = actual_data_len,
                        "meta records point past the data log, backtracking"
                    );
                }
                let info = RecoveryInfo::from_record(index, record, actual_data_len);
                info!(
                    epoch = info.epoch_seq.as_u64(),
                    data_tail = info.data_tail,
                    truncated = info.was_truncated,
                    "recovered commit point"
                );
                return info;
            }
        }

        if !records.is_empty() {
            warn!(
                records = records.len(),
                data_len = actual_data_len,
                "no meta record fits the data log, starting fresh"
            );
        }
        RecoveryInfo {
            was_truncated: true,
            original_data_size: actual_data_len,
            ..RecoveryInfo::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: u64, tail: u64) -> MetaCommitRecord {
        MetaCommitRecord {
            epoch_seq: EpochSeq::new(epoch),
            root_object_id: ObjectId::new(0),
            version_index_ptr: tail.saturating_sub(16),
            data_tail: tail,
            next_object_id: ObjectId::new(16 + epoch),
        }
    }

    #[test]
    fn empty_meta_log_is_fresh() {
        let info = WorkspaceRecovery::recover(&[], 0);
        assert!(info.is_empty());
        assert_eq!(info.epoch_seq, EpochSeq::new(0));
        assert_eq!(info.next_object_id, ObjectId::new(16));
        assert_eq!(info.version_index_ptr, 0);
        assert_eq!(info.data_tail, 0);
        assert!(!info.was_truncated);
        assert_eq!(info, RecoveryInfo::empty());
    }

    #[test]
    fn header_only_log_counts_as_empty() {
        assert_eq!(WorkspaceRecovery::logical_data_len(0), 0);
        assert_eq!(WorkspaceRecovery::logical_data_len(LOG_HEADER_SIZE), 0);
        assert_eq!(WorkspaceRecovery::logical_data_len(40), 40);
    }

    #[test]
    fn empty_data_log_is_fresh() {
        let records = [record(1, 100), record(2, 200)];
        let info = WorkspaceRecovery::recover(&records, 0);
        assert_eq!(info, RecoveryInfo::empty());
    }

    #[test]
    fn exact_match_is_not_truncated() {
        let records = [record(1, 100), record(2, 200), record(3, 300)];
        let info = WorkspaceRecovery::recover(&records, 300);
        assert_eq!(info.epoch_seq, EpochSeq::new(3));
        assert!(!info.was_truncated);
        assert_eq!(info.original_data_size, 0);
        assert_eq!(info.record_index, Some(2));
    }

    #[test]
    fn backtracks_to_record_that_fits() {
        let records = [record(1, 100), record(2, 200), record(3, 300)];
        let info = WorkspaceRecovery::recover(&records, 200);
        assert_eq!(info.epoch_seq, EpochSeq::new(2));
        assert_eq!(info.data_tail, 200);
        assert!(!info.was_truncated);
    }

    #[test]
    fn backtracks_and_truncates() {
        let records = [record(1, 100), record(2, 200), record(3, 300)];
        let info = WorkspaceRecovery::recover(&records, 150);
        assert_eq!(info.epoch_seq, EpochSeq::new(1));
        assert_eq!(info.data_tail, 100);
        assert!(info.was_truncated);
        assert_eq!(info.original_data_size, 150);
        assert_eq!(info.next_object_id, ObjectId::new(17));
        assert_eq!(info.record_index, Some(0));
    }

    #[test]
    fn four_records_backtrack_to_first() {
        let records = [
            record(1, 100),
            record(2, 200),
            record(3, 300),
            record(4, 400),
        ];
        let info = WorkspaceRecovery::recover(&records, 150);
        assert_eq!(info.epoch_seq, EpochSeq::new(1));
        assert!(info.was_truncated);
        assert_eq!(info.original_data_size, 150);
    }

    #[test]
    fn unpublished_data_is_truncated_to_fresh() {
        let info = WorkspaceRecovery::recover(&[], 64);
        assert!(info.is_empty());
        assert!(info.was_truncated);
        assert_eq!(info.original_data_size, 64);
        assert_eq!(info.data_tail, 0);

        let info = WorkspaceRecovery::recover(&[record(1, 100)], 50);
        assert!(info.is_empty());
        assert!(info.was_truncated);
    }

    #[test]
    fn record_validity() {
        let r = record(1, 100);
        assert!(WorkspaceRecovery::is_record_valid(&r, 100));
        assert!(WorkspaceRecovery::is_record_valid(&r, 101));
        assert!(!WorkspaceRecovery::is_record_valid(&r, 99));
    }
}
