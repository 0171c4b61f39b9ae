//! Meta commit records.
//!
//! ```text
//! EpochSeq         varuint
//! RootObjectId     varuint
//! VersionIndexPtr  u64 LE
//! DataTail         u64 LE
//! NextObjectId     varuint
//! ```
//!
//! The two offsets are fixed-width so they can be patched or inspected
//! without re-encoding; the counters are varints because they stay small.

use crate::format::varint::{put_varuint, read_varuint, varuint_len};
use crate::format::{DecodeError, DecodeResult, MetaCommitField};
use crate::types::{EpochSeq, ObjectId};

/// One published commit point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaCommitRecord {
    /// Sequence number of the commit.
    pub epoch_seq: EpochSeq,
    /// Application root object (`0` = none).
    pub root_object_id: ObjectId,
    /// Data log offset of the newest version index frame (`0` = none).
    pub version_index_ptr: u64,
    /// Data log length once the commit's frames were written.
    pub data_tail: u64,
    /// Next object id to allocate.
    pub next_object_id: ObjectId,
}

impl MetaCommitRecord {
    /// Smallest possible encoding.
    pub const MIN_SIZE: usize = 19;

    /// Largest possible encoding.
    pub const MAX_SIZE: usize = 46;

    /// Returns the exact number of bytes [`MetaCommitRecord::encode`] emits.
    #[must_use]
    pub const fn serialized_size(&self) -> usize {
        varuint_len(self.epoch_seq.as_u64())
            + varuint_len(self.root_object_id.as_u64())
            + 8
            + 8
            + varuint_len(self.next_object_id.as_u64())
    }

    /// Appends the encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        put_varuint(out, self.epoch_seq.as_u64());
        put_varuint(out, self.root_object_id.as_u64());
        out.extend_from_slice(&self.version_index_ptr.to_le_bytes());
        out.extend_from_slice(&self.data_tail.to_le_bytes());
        put_varuint(out, self.next_object_id.as_u64());
    }

    /// Returns the encoding as a new buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        self.encode(&mut out);
        out
    }

    /// Decodes a record from the front of `bytes`.
    ///
    /// Returns the record and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::MetaCommitRecordTruncated`] naming the field being
    ///   read when input runs out
    /// - Varint overflow and non-canonical errors unchanged
    pub fn decode(bytes: &[u8]) -> DecodeResult<(Self, usize)> {
        let mut pos = 0;

        let epoch_seq = read_field_varuint(bytes, &mut pos, MetaCommitField::EpochSeq)?;
        let root_object_id = read_field_varuint(bytes, &mut pos, MetaCommitField::RootObjectId)?;
        let version_index_ptr = read_field_u64(bytes, &mut pos, MetaCommitField::VersionIndexPtr)?;
        let data_tail = read_field_u64(bytes, &mut pos, MetaCommitField::DataTail)?;
        let next_object_id = read_field_varuint(bytes, &mut pos, MetaCommitField::NextObjectId)?;

        let record = Self {
            epoch_seq: EpochSeq::new(epoch_seq),
            root_object_id: ObjectId::new(root_object_id),
            version_index_ptr,
            data_tail,
            next_object_id: ObjectId::new(next_object_id),
        };
        Ok((record, pos))
    }

    /// Decodes a record that must fill `bytes` exactly.
    ///
    /// # Errors
    ///
    /// Same as [`MetaCommitRecord::decode`], plus
    /// [`DecodeError::TrailingBytes`] for leftover input.
    pub fn decode_exact(bytes: &[u8]) -> DecodeResult<Self> {
        let (record, consumed) = Self::decode(bytes)?;
        if consumed != bytes.len() {
            return Err(DecodeError::TrailingBytes {
                context: "meta commit record",
                count: bytes.len() - consumed,
            });
        }
        Ok(record)
    }
}

fn read_field_varuint(bytes: &[u8], pos: &mut usize, field: MetaCommitField) -> DecodeResult<u64> {
    match read_varuint(&bytes[*pos..]) {
        Ok((value, n)) => {
            *pos += n;
            Ok(value)
        }
        Err(DecodeError::VarIntEof) => Err(DecodeError::MetaCommitRecordTruncated { field }),
        Err(other) => Err(other),
    }
}

fn read_field_u64(bytes: &[u8], pos: &mut usize, field: MetaCommitField) -> DecodeResult<u64> {
    let end = *pos + 8;
    let chunk = bytes
        .get(*pos..end)
        .ok_or(DecodeError::MetaCommitRecordTruncated { field })?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(chunk);
    *pos = end;
    Ok(u64::from_le_bytes(raw))
}
