//! Staging area for one commit.

use crate::commit::meta_record::MetaCommitRecord;
use crate::error::{CoreError, CoreResult};
use crate::format::{Address64, FrameTag, Ptr64};
use crate::frame::{encode_frame_into, frame_len};
use crate::types::{EpochSeq, ObjectId};

/// One frame written by a commit, kept for auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    /// The object the frame belongs to.
    pub object_id: ObjectId,
    /// Address the frame was placed at.
    pub address: Ptr64,
    /// The frame tag.
    pub frame_tag: FrameTag,
    /// The frame payload (object version record).
    pub payload: Vec<u8>,
}

/// Collects the frames of one transaction.
///
/// Frames are laid out back to back starting at the data tail the commit
/// began with. The encoded bytes are staged in memory so the workspace can
/// append them with a single write.
#[derive(Debug, Clone)]
pub struct CommitContext {
    epoch_seq: EpochSeq,
    base_tail: u64,
    data_tail: u64,
    version_index_ptr: u64,
    written: Vec<WrittenRecord>,
    staged: Vec<u8>,
}

impl CommitContext {
    /// Creates a context for the commit that will publish `epoch_seq`.
    #[must_use]
    pub fn new(epoch_seq: EpochSeq, data_tail: u64, version_index_ptr: u64) -> Self {
        Self {
            epoch_seq,
            base_tail: data_tail,
            data_tail,
            version_index_ptr,
            written: Vec::new(),
            staged: Vec::new(),
        }
    }

    /// Stages one object version frame.
    ///
    /// Returns the address the frame will occupy (the data tail before the
    /// write) and advances the data tail by the frame length.
    ///
    /// # Errors
    ///
    /// Returns an error if the data tail is misaligned or the payload is
    /// too large for a frame.
    pub fn write_object_version(
        &mut self,
        object_id: ObjectId,
        payload: Vec<u8>,
        frame_tag: FrameTag,
    ) -> CoreResult<Ptr64> {
        let address = Address64::new(self.data_tail)?;
        encode_frame_into(&mut self.staged, frame_tag, &payload)?;
        self.data_tail += frame_len(payload.len());

        self.written.push(WrittenRecord {
            object_id,
            address,
            frame_tag,
            payload,
        });
        Ok(address)
    }

    /// Returns the epoch this commit will publish.
    #[must_use]
    pub fn epoch_seq(&self) -> EpochSeq {
        self.epoch_seq
    }

    /// Returns the data tail the commit started from.
    #[must_use]
    pub fn base_tail(&self) -> u64 {
        self.base_tail
    }

    /// Returns the data tail after every staged frame.
    #[must_use]
    pub fn data_tail(&self) -> u64 {
        self.data_tail
    }

    /// Returns the version index address this commit will publish.
    #[must_use]
    pub fn version_index_ptr(&self) -> u64 {
        self.version_index_ptr
    }

    /// Sets the version index address this commit will publish.
    pub fn set_version_index_ptr(&mut self, ptr: Ptr64) {
        self.version_index_ptr = ptr.as_u64();
    }

    /// Returns every staged frame in write order.
    #[must_use]
    pub fn written_records(&self) -> &[WrittenRecord] {
        &self.written
    }

    /// Returns the encoded frames, ready to append at [`Self::base_tail`].
    #[must_use]
    pub fn staged_bytes(&self) -> &[u8] {
        &self.staged
    }

    /// Builds the meta record that publishes this commit.
    #[must_use]
    pub fn build_meta_record(
        &self,
        root_object_id: ObjectId,
        next_object_id: ObjectId,
    ) -> MetaCommitRecord {
        MetaCommitRecord {
            epoch_seq: self.epoch_seq,
            root_object_id,
            version_index_ptr: self.version_index_ptr,
            data_tail: self.data_tail,
            next_object_id,
        }
    }

    /// Checks the staged bytes against the data tail arithmetic.
    pub(crate) fn check_consistency(&self) -> CoreResult<()> {
        let expected = self.data_tail - self.base_tail;
        if self.staged.len() as u64 != expected {
            return Err(CoreError::invalid_operation(format!(
                "commit staged {} bytes but advanced the data tail by {expected}",
                self.staged.len()
            )));
        }
        Ok(())
    }
}
