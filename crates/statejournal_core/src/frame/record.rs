//! Frame envelope and checksum.
//!
//! ```text
//! | frame_tag u32 LE | payload_len u32 LE | payload | zero pad 0..=3 | crc32 u32 LE |
//! ```
//!
//! The padding keeps every frame length a multiple of four, so each frame
//! that follows a log header starts on a valid [`Address64`]. The CRC covers
//! the header, the payload and the padding.
//!
//! [`Address64`]: crate::format::Address64

use crate::error::{CoreError, CoreResult};
use crate::format::FrameTag;

/// Size of the tag + length header.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Size of the trailing checksum.
pub const FRAME_CRC_SIZE: usize = 4;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize - 3;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The validated tag.
    pub tag: FrameTag,
    /// The payload, without padding.
    pub payload: Vec<u8>,
}

/// Returns the number of zero bytes that follow a payload of `len` bytes.
#[must_use]
pub const fn padding_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Returns the total on-disk length of a frame carrying `payload_len` bytes.
#[must_use]
pub const fn frame_len(payload_len: usize) -> u64 {
    (FRAME_HEADER_SIZE + payload_len + padding_len(payload_len) + FRAME_CRC_SIZE) as u64
}

/// Encodes a complete frame.
///
/// # Errors
///
/// Returns an error if the payload exceeds [`MAX_PAYLOAD_SIZE`].
pub fn encode_frame(tag: FrameTag, payload: &[u8]) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(frame_len(payload.len()) as usize);
    encode_frame_into(&mut out, tag, payload)?;
    Ok(out)
}

/// Appends a complete frame to `out`.
///
/// # Errors
///
/// Returns an error if the payload exceeds [`MAX_PAYLOAD_SIZE`].
pub fn encode_frame_into(out: &mut Vec<u8>, tag: FrameTag, payload: &[u8]) -> CoreResult<()> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CoreError::invalid_operation(format!(
            "frame payload too large: {} bytes exceeds maximum of {MAX_PAYLOAD_SIZE} bytes",
            payload.len()
        )));
    }
    let len = payload.len() as u32;

    let start = out.len();
    out.extend_from_slice(&tag.as_u32().to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    out.resize(out.len() + padding_len(payload.len()), 0);

    let crc = compute_crc32(&out[start..]);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// Raw header fields, before the tag is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw tag bits.
    pub raw_tag: u32,
    /// Payload length in bytes.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Parses the first [`FRAME_HEADER_SIZE`] bytes of a frame.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`FRAME_HEADER_SIZE`].
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let raw_tag = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let payload_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self {
            raw_tag,
            payload_len,
        }
    }

    /// Returns the total frame length this header announces.
    #[must_use]
    pub const fn frame_len(self) -> u64 {
        frame_len(self.payload_len as usize)
    }
}

/// Decodes a frame from exactly [`FrameHeader::frame_len`] bytes.
///
/// `offset` is only used for error reporting.
///
/// # Errors
///
/// - [`CoreError::FrameCorruption`] if `bytes` is not the announced length
/// - [`CoreError::ChecksumMismatch`] if the CRC does not match
/// - [`CoreError::Decode`] if the tag is invalid
pub fn decode_frame(offset: u64, bytes: &[u8]) -> CoreResult<Frame> {
    if bytes.len() < FRAME_HEADER_SIZE + FRAME_CRC_SIZE {
        return Err(CoreError::frame_corruption(offset, "frame shorter than envelope"));
    }
    let header = FrameHeader::parse(bytes);
    if header.frame_len() != bytes.len() as u64 {
        return Err(CoreError::frame_corruption(
            offset,
            format!(
                "frame length mismatch: header announces {} bytes, have {}",
                header.frame_len(),
                bytes.len()
            ),
        ));
    }

    let crc_start = bytes.len() - FRAME_CRC_SIZE;
    let expected = u32::from_le_bytes([
        bytes[crc_start],
        bytes[crc_start + 1],
        bytes[crc_start + 2],
        bytes[crc_start + 3],
    ]);
    let actual = compute_crc32(&bytes[..crc_start]);
    if expected != actual {
        return Err(CoreError::ChecksumMismatch {
            offset,
            expected,
            actual,
        });
    }

    let tag = FrameTag::parse(header.raw_tag)?;
    let payload_end = FRAME_HEADER_SIZE + header.payload_len as usize;
    Ok(Frame {
        tag,
        payload: bytes[FRAME_HEADER_SIZE..payload_end].to_vec(),
    })
}

/// Computes CRC32 checksum (IEEE polynomial).
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
