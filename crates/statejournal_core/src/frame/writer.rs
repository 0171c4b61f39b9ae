//! Frame log writer and reader.

use crate::error::{CoreError, CoreResult};
use crate::format::FrameTag;
use crate::frame::iterator::FrameIterator;
use crate::frame::record::{decode_frame, encode_frame, Frame, FrameHeader, FRAME_HEADER_SIZE};
use parking_lot::Mutex;
use statejournal_storage::{StorageBackend, StorageError};
use tracing::warn;

/// Size of the magic header at the start of every log.
pub const LOG_HEADER_SIZE: u64 = 4;

/// Magic header of the data log.
pub const DATA_LOG_MAGIC: [u8; 4] = *b"SJD1";

/// Magic header of the meta log.
pub const META_LOG_MAGIC: [u8; 4] = *b"SJM1";

/// An append-only log of frames over one storage backend.
///
/// The log starts with a 4-byte magic header, so the first frame sits at
/// offset 4 and offset 0 is never a frame address.
pub struct FrameLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    magic: [u8; 4],
}

impl FrameLog {
    /// Opens a log, writing the magic header if the backend is empty.
    ///
    /// A backend shorter than the header is treated as a torn creation and
    /// reset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the backend starts with a
    /// different magic, or an I/O error.
    pub fn open(mut backend: Box<dyn StorageBackend>, magic: [u8; 4]) -> CoreResult<Self> {
        let size = backend.size()?;
        if size < LOG_HEADER_SIZE {
            if size > 0 {
                warn!(size, "discarding torn log header");
                backend.truncate(0)?;
            }
            backend.append(&magic)?;
        } else {
            let found = backend.read_at(0, LOG_HEADER_SIZE as usize)?;
            if found != magic {
                return Err(CoreError::invalid_format(format!(
                    "bad log magic: expected {:?}, found {:?}",
                    String::from_utf8_lossy(&magic),
                    String::from_utf8_lossy(&found)
                )));
            }
        }

        Ok(Self {
            backend: Mutex::new(backend),
            magic,
        })
    }

    /// Returns the magic header of this log.
    #[must_use]
    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    /// Appends one frame and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large or the write fails.
    pub fn append_frame(&self, tag: FrameTag, payload: &[u8]) -> CoreResult<u64> {
        let bytes = encode_frame(tag, payload)?;
        self.append_encoded(&bytes)
    }

    /// Appends bytes that already hold one or more complete frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn append_encoded(&self, bytes: &[u8]) -> CoreResult<u64> {
        Ok(self.backend.lock().append(bytes)?)
    }

    /// Reads and verifies the frame at `offset`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::FrameCorruption`] if the frame runs past the end of the log
    /// - [`CoreError::ChecksumMismatch`] if the frame fails its CRC
    /// - [`CoreError::Decode`] if the tag is invalid
    pub fn read_frame(&self, offset: u64) -> CoreResult<Frame> {
        let backend = self.backend.lock();
        let header_bytes = backend
            .read_at(offset, FRAME_HEADER_SIZE)
            .map_err(|e| past_end_as_corruption(offset, e))?;
        let header = FrameHeader::parse(&header_bytes);
        let bytes = backend
            .read_at(offset, header.frame_len() as usize)
            .map_err(|e| past_end_as_corruption(offset, e))?;
        decode_frame(offset, &bytes)
    }

    /// Returns the current log length.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Flushes pending writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Makes every appended byte durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Cuts the log back to `offset`, never below the magic header.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is beyond the end or the truncation fails.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(offset.max(LOG_HEADER_SIZE))?;
        backend.sync()?;
        Ok(())
    }

    /// Returns a streaming iterator over all frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be accessed.
    pub fn iter(&self) -> CoreResult<FrameIterator<'_>> {
        self.iter_from(LOG_HEADER_SIZE)
    }

    /// Returns a streaming iterator starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be accessed.
    pub fn iter_from(&self, offset: u64) -> CoreResult<FrameIterator<'_>> {
        FrameIterator::new(self.backend.lock(), offset)
    }
}

fn past_end_as_corruption(offset: u64, err: StorageError) -> CoreError {
    match err {
        StorageError::ReadPastEnd { size, .. } => {
            CoreError::frame_corruption(offset, format!("frame extends past end of log ({size} bytes)"))
        }
        other => CoreError::Storage(other),
    }
}

impl std::fmt::Debug for FrameLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLog")
            .field("magic", &String::from_utf8_lossy(&self.magic))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statejournal_storage::InMemoryBackend;

    fn data_log() -> (FrameLog, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let view = backend.share();
        (FrameLog::open(Box::new(backend), DATA_LOG_MAGIC).unwrap(), view)
    }

    #[test]
    fn open_writes_magic() {
        let (log, view) = data_log();
        assert_eq!(view.data(), b"SJD1");
        assert_eq!(log.size().unwrap(), LOG_HEADER_SIZE);
    }

    #[test]
    fn open_rejects_foreign_magic() {
        let backend = InMemoryBackend::with_data(b"SJM1".to_vec());
        assert!(matches!(
            FrameLog::open(Box::new(backend), DATA_LOG_MAGIC),
            Err(CoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn open_repairs_torn_magic() {
        let backend = InMemoryBackend::with_data(b"SJ".to_vec());
        let view = backend.share();
        FrameLog::open(Box::new(backend), META_LOG_MAGIC).unwrap();
        assert_eq!(view.data(), b"SJM1");
    }

    #[test]
    fn append_and_read_frames() {
        let (log, _) = data_log();
        let first = log.append_frame(FrameTag::DICT_VERSION, b"abc").unwrap();
        let second = log.append_frame(FrameTag::DICT_VERSION, b"defgh").unwrap();

        assert_eq!(first, 4);
        assert_eq!(second, 20);
        assert_eq!(log.read_frame(first).unwrap().payload, b"abc");
        assert_eq!(log.read_frame(second).unwrap().payload, b"defgh");
    }

    #[test]
    fn read_past_end_is_corruption() {
        let (log, _) = data_log();
        log.append_frame(FrameTag::DICT_VERSION, b"abc").unwrap();
        assert!(matches!(
            log.read_frame(40),
            Err(CoreError::FrameCorruption { offset: 40, .. })
        ));
    }

    #[test]
    fn ordinary_read_reports_checksum_mismatch() {
        let (log, view) = data_log();
        let offset = log.append_frame(FrameTag::DICT_VERSION, b"abcd").unwrap();

        let mut bytes = view.data();
        bytes[offset as usize + 9] ^= 0x40;
        let log = FrameLog::open(Box::new(InMemoryBackend::with_data(bytes)), DATA_LOG_MAGIC)
            .unwrap();

        assert!(matches!(
            log.read_frame(offset),
            Err(CoreError::ChecksumMismatch { offset: 4, .. })
        ));
    }

    #[test]
    fn truncate_keeps_header() {
        let (log, view) = data_log();
        log.append_frame(FrameTag::DICT_VERSION, b"abc").unwrap();
        log.truncate(0).unwrap();
        assert_eq!(view.data(), b"SJD1");
    }

    #[test]
    fn iter_skips_header() {
        let (log, _) = data_log();
        log.append_frame(FrameTag::DICT_VERSION, b"x").unwrap();
        log.append_frame(FrameTag::DICT_VERSION, b"y").unwrap();

        let offsets: Vec<u64> = log.iter().unwrap().map(|r| r.unwrap().0).collect();
        assert_eq!(offsets, vec![4, 20]);
    }
}
