//! Data log addresses.

use crate::format::error::{DecodeError, DecodeResult};
use std::fmt;

/// Byte offset of a frame in the data log.
///
/// Every frame starts on a 4-byte boundary, so a non-null address is always
/// a multiple of four. Offset `0` is reserved as the null sentinel; it is
/// covered by the log's magic header, so no frame ever lives there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address64(u64);

/// Pointer to an object version frame. Same representation as [`Address64`].
pub type Ptr64 = Address64;

impl Address64 {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Required alignment of every frame start.
    pub const ALIGNMENT: u64 = 4;

    /// Creates an address from a raw offset.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::AddressAlignment`] if `offset` is not a
    /// multiple of four.
    pub const fn new(offset: u64) -> DecodeResult<Self> {
        if offset % Self::ALIGNMENT != 0 {
            return Err(DecodeError::AddressAlignment { value: offset });
        }
        Ok(Self(offset))
    }

    /// Returns the raw offset.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for the null sentinel.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the address is non-null and aligned.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !self.is_null() && self.0 % Self::ALIGNMENT == 0
    }

    /// Returns `None` for the null address.
    #[must_use]
    pub const fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for Address64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "@{:#x}", self.0)
        }
    }
}

impl TryFrom<u64> for Address64 {
    type Error = DecodeError;

    fn try_from(offset: u64) -> DecodeResult<Self> {
        Self::new(offset)
    }
}
