//! Forward-only reader over a byte slice.

use crate::format::error::{DecodeError, DecodeResult};
use crate::format::varint::{read_varint, read_varuint};

/// Reads journal primitives from a borrowed buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor at the start of `bytes`.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Returns the unread bytes.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    /// Reads an unsigned varint.
    ///
    /// # Errors
    ///
    /// Propagates varint decode errors.
    pub fn read_varuint(&mut self) -> DecodeResult<u64> {
        let (value, n) = read_varuint(self.rest())?;
        self.pos += n;
        Ok(value)
    }

    /// Reads a zig-zag signed varint.
    ///
    /// # Errors
    ///
    /// Propagates varint decode errors.
    pub fn read_varint(&mut self) -> DecodeResult<i64> {
        let (value, n) = read_varint(self.rest())?;
        self.pos += n;
        Ok(value)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] naming `context` at end of input.
    pub fn read_u8(&mut self, context: &'static str) -> DecodeResult<u8> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] naming `context` if fewer than
    /// eight bytes remain.
    pub fn read_u64_le(&mut self, context: &'static str) -> DecodeResult<u64> {
        let end = self.pos + 8;
        let chunk = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEof { context })?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        self.pos = end;
        Ok(u64::from_le_bytes(raw))
    }

    /// Fails unless every byte has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TrailingBytes`] naming `context`.
    pub fn finish(&self, context: &'static str) -> DecodeResult<()> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(DecodeError::TrailingBytes { context, count }),
        }
    }
}
