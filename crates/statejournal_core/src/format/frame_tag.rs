//! Bit-packed frame tags.
//!
//! ```text
//! bit 31            16 15             0
//!     +---------------+---------------+
//!     |   SubType     |  RecordType   |
//!     +---------------+---------------+
//! ```
//!
//! For `ObjectVersion` frames the sub type is the [`ObjectKind`]; every
//! other record type requires a zero sub type.

use crate::format::error::{DecodeError, DecodeResult};
use std::fmt;

/// What a frame holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecordType {
    /// One version of a durable object (data log).
    ObjectVersion = 1,
    /// One commit record (meta log).
    MetaCommit = 2,
}

impl RecordType {
    /// Converts raw bits to a record type. `0` is reserved.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::ObjectVersion),
            2 => Some(Self::MetaCommit),
            _ => None,
        }
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Payload shape of an object version frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ObjectKind {
    /// A durable dictionary (also used by the version index).
    Dict = 1,
}

impl ObjectKind {
    /// Converts raw bits to an object kind. `0` is reserved.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Dict),
            _ => None,
        }
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A validated 32-bit frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTag(u32);

impl FrameTag {
    /// Tag of a dictionary version frame (`0x00010001`).
    pub const DICT_VERSION: Self = Self::object_version(ObjectKind::Dict);

    /// Tag of a meta commit frame (`0x00000002`).
    pub const META_COMMIT: Self = Self::plain(RecordType::MetaCommit);

    const fn pack(record_type: u16, sub_type: u16) -> Self {
        Self(((sub_type as u32) << 16) | record_type as u32)
    }

    /// Creates the tag of an object version frame of `kind`.
    #[must_use]
    pub const fn object_version(kind: ObjectKind) -> Self {
        Self::pack(RecordType::ObjectVersion.as_u16(), kind.as_u16())
    }

    /// Creates the tag of a record type that carries no sub type.
    ///
    /// Only meaningful for record types other than `ObjectVersion`, whose
    /// tags are built with [`FrameTag::object_version`].
    const fn plain(record_type: RecordType) -> Self {
        Self::pack(record_type.as_u16(), 0)
    }

    /// Validates raw tag bits.
    ///
    /// Checks the record type first, then the object kind (for
    /// `ObjectVersion`) or that the sub type is zero (for everything else).
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnknownRecordType`] for a reserved or unknown record type
    /// - [`DecodeError::UnknownObjectKind`] for a reserved or unknown kind
    /// - [`DecodeError::InvalidSubType`] for a non-zero sub type elsewhere
    pub const fn parse(raw: u32) -> DecodeResult<Self> {
        let record_bits = raw as u16;
        let sub_bits = (raw >> 16) as u16;

        match RecordType::from_u16(record_bits) {
            None => Err(DecodeError::UnknownRecordType { value: record_bits }),
            Some(RecordType::ObjectVersion) => match ObjectKind::from_u16(sub_bits) {
                Some(_) => Ok(Self(raw)),
                None => Err(DecodeError::UnknownObjectKind { value: sub_bits }),
            },
            Some(_) if sub_bits != 0 => Err(DecodeError::InvalidSubType {
                record_type: record_bits,
                sub_type: sub_bits,
            }),
            Some(_) => Ok(Self(raw)),
        }
    }

    /// Returns the raw tag bits.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the record type.
    #[must_use]
    pub const fn record_type(self) -> RecordType {
        match RecordType::from_u16(self.0 as u16) {
            Some(record_type) => record_type,
            // Unreachable: tags are validated on construction.
            None => RecordType::ObjectVersion,
        }
    }

    /// Returns the object kind of an object version tag.
    #[must_use]
    pub const fn object_kind(self) -> Option<ObjectKind> {
        match self.record_type() {
            RecordType::ObjectVersion => ObjectKind::from_u16((self.0 >> 16) as u16),
            RecordType::MetaCommit => None,
        }
    }

    /// Returns `true` for tags that belong in the meta log.
    #[must_use]
    pub const fn is_meta_tag(self) -> bool {
        matches!(self.record_type(), RecordType::MetaCommit)
    }

    /// Returns `true` for tags that belong in the data log.
    #[must_use]
    pub const fn is_data_tag(self) -> bool {
        matches!(self.record_type(), RecordType::ObjectVersion)
    }
}

impl fmt::Display for FrameTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object_kind() {
            Some(kind) => write!(f, "{:?}({kind:?})", self.record_type()),
            None => write!(f, "{:?}", self.record_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_values() {
        assert_eq!(FrameTag::DICT_VERSION.as_u32(), 0x0001_0001);
        assert_eq!(FrameTag::META_COMMIT.as_u32(), 0x0000_0002);
        assert_eq!(FrameTag::object_version(ObjectKind::Dict), FrameTag::DICT_VERSION);
    }

    #[test]
    fn parse_accepts_known_tags() {
        let dict = FrameTag::parse(0x0001_0001).unwrap();
        assert_eq!(dict.record_type(), RecordType::ObjectVersion);
        assert_eq!(dict.object_kind(), Some(ObjectKind::Dict));
        assert!(dict.is_data_tag());
        assert!(!dict.is_meta_tag());

        let meta = FrameTag::parse(0x0000_0002).unwrap();
        assert_eq!(meta.record_type(), RecordType::MetaCommit);
        assert_eq!(meta.object_kind(), None);
        assert!(meta.is_meta_tag());
        assert!(!meta.is_data_tag());
    }

    #[test]
    fn parse_rejects_reserved_and_unknown_record_types() {
        assert_eq!(
            FrameTag::parse(0x0000_0000),
            Err(DecodeError::UnknownRecordType { value: 0 })
        );
        assert_eq!(
            FrameTag::parse(0x0001_0000),
            Err(DecodeError::UnknownRecordType { value: 0 })
        );
        assert_eq!(
            FrameTag::parse(0x0000_00FF),
            Err(DecodeError::UnknownRecordType { value: 0xFF })
        );
    }

    #[test]
    fn parse_rejects_bad_object_kind() {
        assert_eq!(
            FrameTag::parse(0x0000_0001),
            Err(DecodeError::UnknownObjectKind { value: 0 })
        );
        assert_eq!(
            FrameTag::parse(0x0007_0001),
            Err(DecodeError::UnknownObjectKind { value: 7 })
        );
    }

    #[test]
    fn parse_rejects_sub_type_on_meta_commit() {
        assert_eq!(
            FrameTag::parse(0x0001_0002),
            Err(DecodeError::InvalidSubType {
                record_type: 2,
                sub_type: 1
            })
        );
    }

    #[test]
    fn display() {
        assert_eq!(FrameTag::DICT_VERSION.to_string(), "ObjectVersion(Dict)");
        assert_eq!(FrameTag::META_COMMIT.to_string(), "MetaCommit");
    }
}
