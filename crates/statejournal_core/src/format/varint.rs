//! Canonical variable-length integers.
//!
//! Unsigned values use 7 payload bits per byte, least significant group
//! first, with the high bit as continuation flag. Only the minimal
//! encoding is accepted on decode. Signed values are zig-zag mapped first
//! so small magnitudes of either sign stay short.

use crate::format::error::{DecodeError, DecodeResult};

/// Longest possible encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Returns the number of bytes [`write_varuint`] emits for `value`.
#[must_use]
pub const fn varuint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Returns the number of bytes [`write_varint`] emits for `value`.
#[must_use]
pub const fn varint_len(value: i64) -> usize {
    varuint_len(zigzag_encode(value))
}

/// Maps a signed value onto the unsigned range: `0, -1, 1, -2, ...` become
/// `0, 1, 2, 3, ...`.
#[must_use]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[must_use]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Writes `value` into the front of `buf` and returns the byte count.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`varuint_len`]`(value)`.
pub fn write_varuint(buf: &mut [u8], mut value: u64) -> usize {
    let needed = varuint_len(value);
    assert!(
        buf.len() >= needed,
        "varint destination too small: need {needed} bytes, have {}",
        buf.len()
    );

    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Writes a zig-zag encoded signed value into `buf`.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`varint_len`]`(value)`.
pub fn write_varint(buf: &mut [u8], value: i64) -> usize {
    write_varuint(buf, zigzag_encode(value))
}

/// Appends the encoding of `value` to `out`.
pub fn put_varuint(out: &mut Vec<u8>, value: u64) {
    let mut scratch = [0u8; MAX_VARINT_LEN];
    let n = write_varuint(&mut scratch, value);
    out.extend_from_slice(&scratch[..n]);
}

/// Appends the zig-zag encoding of `value` to `out`.
pub fn put_varint(out: &mut Vec<u8>, value: i64) {
    put_varuint(out, zigzag_encode(value));
}

/// Decodes an unsigned varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// - [`DecodeError::VarIntEof`] if the input ends mid-value
/// - [`DecodeError::VarIntOverflow`] if the value needs more than 64 bits
/// - [`DecodeError::VarIntNonCanonical`] if a shorter encoding exists
pub fn read_varuint(bytes: &[u8]) -> DecodeResult<(u64, usize)> {
    let mut value = 0u64;

    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = bytes.get(i) else {
            return Err(DecodeError::VarIntEof);
        };

        // The tenth byte holds bit 63 only.
        if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(DecodeError::VarIntOverflow);
        }

        value |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            let consumed = i + 1;
            let expected = varuint_len(value);
            if consumed != expected {
                return Err(DecodeError::VarIntNonCanonical {
                    value,
                    actual_bytes: consumed,
                    expected_bytes: expected,
                });
            }
            return Ok((value, consumed));
        }
    }

    Err(DecodeError::VarIntOverflow)
}

/// Decodes a zig-zag signed varint from the front of `bytes`.
///
/// # Errors
///
/// Same as [`read_varuint`].
pub fn read_varint(bytes: &[u8]) -> DecodeResult<(i64, usize)> {
    let (raw, consumed) = read_varuint(bytes)?;
    Ok((zigzag_decode(raw), consumed))
}
