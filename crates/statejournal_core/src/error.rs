//! Error types for StateJournal core.

use crate::format::DecodeError;
use crate::types::ObjectId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in StateJournal core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] statejournal_storage::StorageError),

    /// Structural decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the frame.
        offset: u64,
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the frame.
        actual: u32,
    },

    /// A frame could not be read in full or carried the wrong tag.
    #[error("frame corruption at offset {offset}: {message}")]
    FrameCorruption {
        /// Offset of the frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Invalid journal layout or unexpected file contents.
    #[error("invalid journal format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// No durable version exists for the requested object.
    #[error("object not found: {object_id}")]
    ObjectNotFound {
        /// The object that was requested.
        object_id: ObjectId,
    },

    /// The object was discarded before it was ever committed.
    #[error("object {object_id} is detached")]
    ObjectDetached {
        /// The detached object.
        object_id: ObjectId,
    },

    /// Journal directory is held by another writer.
    #[error("journal locked: another process has exclusive access")]
    JournalLocked,

    /// Journal directory does not exist and creation was not requested.
    #[error("journal not found: {}", path.display())]
    JournalNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// A previous commit failed part-way; the workspace must be reopened.
    #[error("workspace poisoned by a failed commit; reopen to recover")]
    WorkspacePoisoned,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a frame corruption error.
    pub fn frame_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::FrameCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` if the error marks damaged or torn bytes rather than
    /// an environmental failure such as I/O.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::ChecksumMismatch { .. } | Self::FrameCorruption { .. }
        )
    }
}
