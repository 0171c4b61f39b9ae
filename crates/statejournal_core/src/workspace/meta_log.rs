//! Reading the meta log.

use crate::commit::MetaCommitRecord;
use crate::error::{CoreError, CoreResult};
use crate::format::RecordType;
use crate::frame::{stop_on_corruption, FrameLog, LOG_HEADER_SIZE};
use tracing::warn;

/// One meta record and where it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaLogEntry {
    /// Offset of the frame holding the record.
    pub offset: u64,
    /// Offset just past that frame.
    pub end: u64,
    /// The decoded record.
    pub record: MetaCommitRecord,
}

/// Result of scanning the meta log.
#[derive(Debug, Clone, Default)]
pub struct MetaLogScan {
    /// Every readable record, oldest first.
    pub entries: Vec<MetaLogEntry>,
    /// Log length when the scan started.
    pub total_len: u64,
    /// Offset just past the last readable record.
    pub valid_len: u64,
    /// Why the scan stopped before the end of the log, if it did.
    pub stop_reason: Option<String>,
}

impl MetaLogScan {
    /// Returns the decoded records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<MetaCommitRecord> {
        self.entries.iter().map(|e| e.record).collect()
    }

    /// Returns `true` if bytes past the last readable record were found.
    #[must_use]
    pub fn has_garbage_tail(&self) -> bool {
        self.valid_len < self.total_len
    }
}

/// Reads meta records until the first frame that is torn, fails its
/// checksum or does not decode.
///
/// Anything past that point is treated as a torn trailing write.
///
/// # Errors
///
/// Returns I/O errors only; damaged bytes end the scan instead.
pub fn scan_meta_log(log: &FrameLog) -> CoreResult<MetaLogScan> {
    let mut iter = log.iter()?;
    let mut scan = MetaLogScan {
        total_len: iter.total_size(),
        valid_len: LOG_HEADER_SIZE.min(iter.total_size()),
        ..MetaLogScan::default()
    };

    while let Some(item) = iter.next() {
        let Some((offset, frame)) = stop_on_corruption(item).map_err(log_io)? else {
            scan.stop_reason = Some(format!("unreadable frame at offset {}", iter.position()));
            break;
        };

        if frame.tag.record_type() != RecordType::MetaCommit {
            scan.stop_reason = Some(format!("unexpected {} frame at offset {offset}", frame.tag));
            break;
        }
        let record = match MetaCommitRecord::decode_exact(&frame.payload) {
            Ok(record) => record,
            Err(e) => {
                scan.stop_reason = Some(format!("bad meta record at offset {offset}: {e}"));
                break;
            }
        };

        let end = iter.position();
        scan.entries.push(MetaLogEntry {
            offset,
            end,
            record,
        });
        scan.valid_len = end;
    }

    if scan.stop_reason.is_none() && iter.is_torn() {
        scan.stop_reason = Some(format!("torn frame at offset {}", iter.position()));
    }
    if let Some(reason) = &scan.stop_reason {
        warn!(
            records = scan.entries.len(),
            valid_len = scan.valid_len,
            total_len = scan.total_len,
            reason = %reason,
            "meta log has an unreadable tail"
        );
    }
    Ok(scan)
}

fn log_io(err: CoreError) -> CoreError {
    warn!(error = %err, "I/O error while scanning meta log");
    err
}
