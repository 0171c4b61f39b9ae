//! Streaming frame iterator.
//!
//! Reads frames one at a time from a locked backend, so memory use is
//! bounded by the largest frame rather than the log size.

use crate::error::{CoreError, CoreResult};
use crate::frame::record::{decode_frame, Frame, FrameHeader, FRAME_HEADER_SIZE};
use statejournal_storage::StorageBackend;
use parking_lot::MutexGuard;

/// A streaming iterator over the frames of one log.
///
/// # Error Handling
///
/// - A header or frame that extends past the end of the log is a torn
///   trailing write: iteration ends cleanly and [`FrameIterator::is_torn`]
///   reports it
/// - CRC mismatches and invalid tags are returned as errors, after which
///   the iterator is exhausted
///
/// Yields `(offset, frame)` pairs.
pub struct FrameIterator<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    total_size: u64,
    offset: u64,
    torn: bool,
    finished: bool,
}

impl<'a> FrameIterator<'a> {
    /// Creates an iterator starting at `start_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(
        backend: MutexGuard<'a, Box<dyn StorageBackend>>,
        start_offset: u64,
    ) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: start_offset,
            torn: false,
            finished: false,
        })
    }

    /// Returns the offset just past the last frame yielded.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Returns `true` if iteration stopped at an incomplete frame.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    /// Returns the log size captured when the iterator was created.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, Frame)>> {
        let offset = self.offset;
        let remaining = self.total_size.saturating_sub(offset);
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < FRAME_HEADER_SIZE as u64 {
            self.torn = true;
            return Ok(None);
        }

        let header_bytes = self.backend.read_at(offset, FRAME_HEADER_SIZE)?;
        let header = FrameHeader::parse(&header_bytes);
        let len = header.frame_len();
        if len > remaining {
            self.torn = true;
            return Ok(None);
        }

        let bytes = self.backend.read_at(offset, len as usize)?;
        let frame = decode_frame(offset, &bytes)?;
        self.offset = offset + len;
        Ok(Some((offset, frame)))
    }
}

impl Iterator for FrameIterator<'_> {
    type Item = CoreResult<(u64, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for FrameIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameIterator")
            .field("total_size", &self.total_size)
            .field("offset", &self.offset)
            .field("torn", &self.torn)
            .finish_non_exhaustive()
    }
}

/// Converts a frame error into "end of valid data" where that is the right
/// reading of it, keeping environmental failures as errors.
pub(crate) fn stop_on_corruption<T>(result: CoreResult<T>) -> CoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_corruption() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FrameTag;
    use crate::frame::record::encode_frame;
    use parking_lot::Mutex;
    use statejournal_storage::InMemoryBackend;

    fn log_with(frames: &[(FrameTag, &[u8])]) -> Mutex<Box<dyn StorageBackend>> {
        let mut backend = InMemoryBackend::new();
        for (tag, payload) in frames {
            backend.append(&encode_frame(*tag, payload).unwrap()).unwrap();
        }
        Mutex::new(Box::new(backend))
    }

    #[test]
    fn iterates_all_frames() {
        let log = log_with(&[
            (FrameTag::DICT_VERSION, &b"one"[..]),
            (FrameTag::DICT_VERSION, &b"two!"[..]),
            (FrameTag::META_COMMIT, &b""[..]),
        ]);

        let frames: Vec<_> = FrameIterator::new(log.lock(), 0)
            .unwrap()
            .collect::<CoreResult<_>>()
            .unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].0, 0);
        assert_eq!(frames[1].0, 16);
        assert_eq!(frames[2].0, 32);
        assert_eq!(frames[1].1.payload, b"two!");
        assert_eq!(frames[2].1.tag, FrameTag::META_COMMIT);
    }

    #[test]
    fn torn_tail_ends_iteration() {
        let log = log_with(&[(FrameTag::DICT_VERSION, &b"complete"[..])]);
        {
            let mut backend = log.lock();
            let torn = encode_frame(FrameTag::DICT_VERSION, b"torn write").unwrap();
            backend.append(&torn[..torn.len() - 3]).unwrap();
        }

        let mut iter = FrameIterator::new(log.lock(), 0).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().is_none());
        assert!(iter.is_torn());
        assert_eq!(iter.position(), 20);
    }

    #[test]
    fn partial_header_is_torn() {
        let log = log_with(&[]);
        log.lock().append(&[0x01, 0x00, 0x01]).unwrap();

        let mut iter = FrameIterator::new(log.lock(), 0).unwrap();
        assert!(iter.next().is_none());
        assert!(iter.is_torn());
    }

    #[test]
    fn checksum_error_is_reported_once() {
        let log = log_with(&[(FrameTag::DICT_VERSION, &b"data"[..])]);
        {
            let mut backend = log.lock();
            let mut bad = encode_frame(FrameTag::DICT_VERSION, b"evil").unwrap();
            bad[8] ^= 0xFF;
            backend.append(&bad).unwrap();
        }

        let mut iter = FrameIterator::new(log.lock(), 0).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(
            iter.next(),
            Some(Err(CoreError::ChecksumMismatch { offset: 16, .. }))
        ));
        assert!(iter.next().is_none());
        assert!(!iter.is_torn());
    }

    #[test]
    fn stop_on_corruption_keeps_io_errors() {
        let corrupt: CoreResult<()> = Err(CoreError::frame_corruption(0, "x"));
        assert!(stop_on_corruption(corrupt).unwrap().is_none());

        let io: CoreResult<()> = Err(CoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk",
        )));
        assert!(stop_on_corruption(io).is_err());
    }
}
