//! Object version records: the payload of every data log frame.
//!
//! ```text
//! PrevVersionPtr  u64 LE   (0 = base version)
//! DiffPayload     rest of the frame
//! ```
//!
//! Following `PrevVersionPtr` from the newest frame back to a base version
//! yields every diff needed to rebuild the object.

use crate::format::{Address64, ByteCursor, DecodeResult, Ptr64};

/// One decoded object version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectVersionRecord<'a> {
    /// The previous version of the same object, or null.
    pub prev_version_ptr: Ptr64,
    /// The diff against the previous version.
    pub diff_payload: &'a [u8],
}

impl<'a> ObjectVersionRecord<'a> {
    /// Size of the fixed prefix.
    pub const PREFIX_SIZE: usize = 8;

    /// Returns `true` if this record starts a version chain.
    #[must_use]
    pub const fn is_base_version(&self) -> bool {
        self.prev_version_ptr.is_null()
    }

    /// Appends the encoding of a record to `out`.
    pub fn encode(prev_version_ptr: Ptr64, diff_payload: &[u8], out: &mut Vec<u8>) {
        out.reserve(Self::PREFIX_SIZE + diff_payload.len());
        out.extend_from_slice(&prev_version_ptr.as_u64().to_le_bytes());
        out.extend_from_slice(diff_payload);
    }

    /// Decodes a frame payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is shorter than the prefix or the
    /// previous pointer is misaligned.
    pub fn decode(payload: &'a [u8]) -> DecodeResult<Self> {
        let mut cursor = ByteCursor::new(payload);
        let prev = cursor.read_u64_le("prev version ptr")?;
        Ok(Self {
            prev_version_ptr: Address64::new(prev)?,
            diff_payload: cursor.rest(),
        })
    }
}
