//! Rebuilding objects from their version chains.

use crate::error::{CoreError, CoreResult};
use crate::format::{FrameTag, Ptr64};
use crate::frame::FrameLog;
use crate::object::{apply_diff, DictValue, DiffChange, DiffPayloadReader, ObjectVersionRecord};
use std::collections::BTreeMap;
use tracing::trace;

type Diff<V> = Vec<(u64, DiffChange<V>)>;

/// Reads the dict whose newest version frame sits at `head`.
///
/// Follows `PrevVersionPtr` back to the base version, then replays every
/// diff from oldest to newest. Each step must point strictly backwards in
/// the log, which rules out cycles.
///
/// # Errors
///
/// - [`CoreError::ChecksumMismatch`] if a frame fails its CRC
/// - [`CoreError::FrameCorruption`] for a frame that is not a dict version,
///   runs past the log, or points forward
/// - [`CoreError::Decode`] for a malformed record or diff
pub(crate) fn load_dict_chain<V: DictValue>(
    log: &FrameLog,
    head: Ptr64,
) -> CoreResult<BTreeMap<u64, V>> {
    let mut diffs: Vec<Diff<V>> = Vec::new();
    let mut cursor = head;

    while !cursor.is_null() {
        let offset = cursor.as_u64();
        let frame = log.read_frame(offset)?;
        if frame.tag != FrameTag::DICT_VERSION {
            return Err(CoreError::frame_corruption(
                offset,
                format!("expected a dict version frame, found {}", frame.tag),
            ));
        }

        let record = ObjectVersionRecord::decode(&frame.payload)?;
        diffs.push(DiffPayloadReader::new(record.diff_payload)?.read_all::<V>()?);

        let prev = record.prev_version_ptr;
        if !prev.is_null() && prev.as_u64() >= offset {
            return Err(CoreError::frame_corruption(
                offset,
                format!("previous version {prev} does not precede this frame"),
            ));
        }
        cursor = prev;
    }

    trace!(head = head.as_u64(), versions = diffs.len(), "replaying version chain");
    let mut map = BTreeMap::new();
    for diff in diffs.into_iter().rev() {
        apply_diff(&mut map, diff);
    }
    Ok(map)
}
