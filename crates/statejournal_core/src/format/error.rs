//! Structural decode errors.

use std::fmt;
use thiserror::Error;

/// Result type for pure decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// A field of a meta commit record, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommitField {
    /// Commit sequence number (varuint).
    EpochSeq,
    /// Root object id (varuint).
    RootObjectId,
    /// Address of the newest version index frame (u64 LE).
    VersionIndexPtr,
    /// Data log length published by the commit (u64 LE).
    DataTail,
    /// Next allocatable object id (varuint).
    NextObjectId,
}

impl MetaCommitField {
    /// Returns the field name as it appears in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EpochSeq => "EpochSeq",
            Self::RootObjectId => "RootObjectId",
            Self::VersionIndexPtr => "VersionIndexPtr",
            Self::DataTail => "DataTail",
            Self::NextObjectId => "NextObjectId",
        }
    }
}

impl fmt::Display for MetaCommitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while decoding journal bytes.
///
/// Every variant marks a truncation or corruption boundary. The type is
/// `Clone` so a reader can keep a terminal error and hand it out again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended while a varint continuation bit was still set.
    #[error("varint truncated: input ended mid-value")]
    VarIntEof,

    /// Varint needs more than 64 bits.
    #[error("varint overflow: value does not fit in 64 bits")]
    VarIntOverflow,

    /// Varint used more bytes than the minimal encoding.
    #[error("non-canonical varint: value {value} encoded in {actual_bytes} bytes, expected {expected_bytes}")]
    VarIntNonCanonical {
        /// The decoded value.
        value: u64,
        /// Bytes actually consumed.
        actual_bytes: usize,
        /// Bytes of the minimal encoding.
        expected_bytes: usize,
    },

    /// A non-null address is not 4-byte aligned.
    #[error("address {value:#x} is not 4-byte aligned")]
    AddressAlignment {
        /// The offending offset.
        value: u64,
    },

    /// Frame tag carries a reserved or unknown record type.
    #[error("unknown record type {value:#06x}")]
    UnknownRecordType {
        /// The raw record type bits.
        value: u16,
    },

    /// Object version tag carries a reserved or unknown object kind.
    #[error("unknown object kind {value:#06x}")]
    UnknownObjectKind {
        /// The raw sub type bits.
        value: u16,
    },

    /// A record type that takes no sub type was given a non-zero one.
    #[error("record type {record_type:#06x} requires sub type 0, found {sub_type:#06x}")]
    InvalidSubType {
        /// The raw record type bits.
        record_type: u16,
        /// The raw sub type bits.
        sub_type: u16,
    },

    /// A meta commit record ended inside `field`.
    #[error("meta commit record truncated while reading {field}")]
    MetaCommitRecordTruncated {
        /// The field being read.
        field: MetaCommitField,
    },

    /// Input ended where more bytes were required.
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof {
        /// What was being read.
        context: &'static str,
    },

    /// Bytes remained after a complete structure.
    #[error("{count} trailing bytes after {context}")]
    TrailingBytes {
        /// What was decoded.
        context: &'static str,
        /// Number of unread bytes.
        count: usize,
    },

    /// Value tag with an unknown low nibble.
    #[error("unknown value type {tag:#04x}")]
    UnknownValueType {
        /// The raw tag byte.
        tag: u8,
    },

    /// Value of the wrong type for the dictionary being decoded.
    #[error("value type mismatch: expected {expected}, found {found}")]
    ValueTypeMismatch {
        /// The accepted value types.
        expected: &'static str,
        /// The type on the wire.
        found: &'static str,
    },

    /// Diff keys were not strictly ascending.
    #[error("diff keys out of order: {key} follows {previous}")]
    DiffKeySorting {
        /// The preceding key.
        previous: u64,
        /// The offending key.
        key: u64,
    },

    /// Any other malformed diff payload.
    #[error("malformed diff payload: {message}")]
    DiffPayloadFormat {
        /// Description of the problem.
        message: String,
    },
}

impl DecodeError {
    /// Creates a diff payload format error.
    pub fn diff_format(message: impl Into<String>) -> Self {
        Self::DiffPayloadFormat {
            message: message.into(),
        }
    }
}
