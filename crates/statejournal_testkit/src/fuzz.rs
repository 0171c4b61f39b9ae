//! Fuzz testing harnesses for StateJournal.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks. Every target must return normally for any
//! input: malformed bytes are errors, never panics.

use crate::fixtures::TestJournal;
use statejournal_core::format::varint::{read_varint, read_varuint};
use statejournal_core::frame::{decode_frame, DATA_LOG_MAGIC, META_LOG_MAGIC};
use statejournal_core::object::{encode_diff, DiffPayloadReader};
use statejournal_core::{MetaCommitRecord, ObjectId, Value, Workspace};
use statejournal_storage::InMemoryBackend;

/// Fuzz target for varint decoding.
pub fn fuzz_varint_decode(data: &[u8]) {
    let _ = read_varuint(data);
    let _ = read_varint(data);
}

/// Fuzz target for meta record decoding.
///
/// Anything that decodes must re-encode to the same bytes, since the
/// decoder rejects non-canonical varints.
pub fn fuzz_meta_record_decode(data: &[u8]) {
    if let Ok(record) = MetaCommitRecord::decode_exact(data) {
        assert_eq!(record.to_bytes(), data, "meta record re-encoding differs");
    }
}

/// Fuzz target for diff payload decoding.
pub fn fuzz_diff_decode(data: &[u8]) {
    let Ok(reader) = DiffPayloadReader::new(data) else {
        return;
    };
    if let Ok(entries) = reader.read_all::<Value>() {
        let mut encoded = Vec::new();
        encode_diff(&entries, &mut encoded);
        assert_eq!(encoded, data, "diff re-encoding differs");
    }
}

/// Fuzz target for frame decoding.
pub fn fuzz_frame_decode(data: &[u8]) {
    let _ = decode_frame(4, data);
}

/// Fuzz target for recovery over arbitrary log contents.
///
/// The first byte picks where `data[1..]` is split into the data log and
/// the meta log body. If the journal opens, opening it again must resume
/// from the same commit.
pub fn fuzz_recovery(data: &[u8]) {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = (split as usize).min(rest.len());

    let mut data_log = DATA_LOG_MAGIC.to_vec();
    data_log.extend_from_slice(&rest[..split]);
    let mut meta_log = META_LOG_MAGIC.to_vec();
    meta_log.extend_from_slice(&rest[split..]);

    let data_backend = InMemoryBackend::with_data(data_log);
    let meta_backend = InMemoryBackend::with_data(meta_log);
    let open = || {
        Workspace::open_with_backends(
            Default::default(),
            Box::new(data_backend.share()),
            Box::new(meta_backend.share()),
        )
    };

    let first = match open() {
        Ok(ws) => ws.epoch_seq(),
        Err(_) => return,
    };
    let second = open().map(|ws| ws.epoch_seq());
    assert_eq!(second.ok(), Some(first), "reopen after recovery diverged");
}

/// Fuzz target for workspace operations.
///
/// Runs the decoded operations, commits, reopens and checks that every
/// readable object reads back the same.
pub fn fuzz_workspace_operations(data: &[u8]) {
    let ops = operations::parse_sequence(data);
    let mut journal = TestJournal::memory();
    let ids = operations::execute_sequence(&ops, &mut journal);

    if journal.commit().is_err() {
        return;
    }
    let before = operations::snapshot(&mut journal, &ids);
    let mut journal = journal.reopen();
    let after = operations::snapshot(&mut journal, &ids);

    for (id, entries) in before {
        let reread = after.iter().find(|(other, _)| *other == id).map(|(_, e)| e);
        assert_eq!(reread, Some(&entries), "object {} changed across reopen", id);
    }
}

/// Byte-driven workspace operations.
pub mod operations {
    use super::*;

    /// One decoded operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FuzzOp {
        /// Create a dict
        Create,
        /// Set a key on the n-th created dict
        Set {
            /// Index into the created dicts
            object: usize,
            /// The key
            key: u64,
            /// The value
            value: i64,
        },
        /// Remove a key from the n-th created dict
        Remove {
            /// Index into the created dicts
            object: usize,
            /// The key
            key: u64,
        },
        /// Commit the workspace
        Commit,
        /// Discard the n-th created dict's changes
        Discard {
            /// Index into the created dicts
            object: usize,
        },
        /// Drop cached clean objects
        Evict,
    }

    /// Decodes operations, three bytes each.
    pub fn parse_sequence(data: &[u8]) -> Vec<FuzzOp> {
        data.chunks_exact(3)
            .map(|chunk| {
                let object = chunk[1] as usize;
                let key = u64::from(chunk[2] % 8);
                match chunk[0] % 6 {
                    0 => FuzzOp::Create,
                    1 => FuzzOp::Set {
                        object,
                        key,
                        value: i64::from(chunk[1] as i8),
                    },
                    2 => FuzzOp::Remove { object, key },
                    3 => FuzzOp::Commit,
                    4 => FuzzOp::Discard { object },
                    _ => FuzzOp::Evict,
                }
            })
            .collect()
    }

    /// Runs operations, ignoring the errors they are allowed to produce.
    ///
    /// Returns the ids of every created dict.
    pub fn execute_sequence(ops: &[FuzzOp], ws: &mut Workspace) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = Vec::new();
        let pick = |ids: &[ObjectId], n: usize| ids.get(n % ids.len().max(1)).copied();

        for op in ops {
            match *op {
                FuzzOp::Create => ids.push(ws.create_dict()),
                FuzzOp::Set { object, key, value } => {
                    if let Some(id) = pick(&ids, object) {
                        if let Ok(dict) = ws.load_dict(id) {
                            let _ = dict.set(key, Value::Int(value));
                        }
                    }
                }
                FuzzOp::Remove { object, key } => {
                    if let Some(id) = pick(&ids, object) {
                        if let Ok(dict) = ws.load_dict(id) {
                            let _ = dict.remove(key);
                        }
                    }
                }
                FuzzOp::Commit => {
                    let _ = ws.commit();
                }
                FuzzOp::Discard { object } => {
                    if let Some(id) = pick(&ids, object) {
                        let _ = ws.discard_changes(id);
                    }
                }
                FuzzOp::Evict => {
                    ws.evict_clean();
                }
            }
        }
        ids
    }

    /// Returns the entries of every loadable object among `ids`.
    pub fn snapshot(ws: &mut Workspace, ids: &[ObjectId]) -> Vec<(ObjectId, Vec<(u64, Value)>)> {
        ids.iter()
            .filter_map(|&id| {
                let entries = ws.load_dict(id).ok()?.entries().ok()?;
                Some((id, entries))
            })
            .collect()
    }
}
