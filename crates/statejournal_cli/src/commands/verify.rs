//! Verify command implementation.

use super::JournalSnapshot;
use statejournal_core::commit::WorkspaceRecovery;
use statejournal_core::frame::FrameLog;
use statejournal_core::object::{DiffPayloadReader, ObjectVersionRecord};
use statejournal_core::{scan_meta_log, Value};
use std::path::Path;

/// Verification result for one log.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of frames checked.
    pub frames_checked: usize,
    /// Number of valid frames.
    pub valid_frames: usize,
    /// Number of corrupt frames.
    pub corrupt_frames: usize,
    /// Problems recovery repairs on its own.
    pub warnings: Vec<String>,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.corrupt_frames == 0 && self.errors.is_empty()
    }

    fn corrupt(&mut self, message: String) {
        self.corrupt_frames += 1;
        self.errors.push(message);
    }
}

/// Runs the verify command.
pub fn run(path: &Path, check_data: bool, check_meta: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying journal at {:?}", path);
    println!();

    let snapshot = JournalSnapshot::read(path)?;
    let records = match snapshot.meta_log() {
        Ok(log) => scan_meta_log(&log)?.records(),
        Err(_) => Vec::new(),
    };
    let data_len = WorkspaceRecovery::logical_data_len(snapshot.data.len() as u64);
    let data_tail = WorkspaceRecovery::recover(&records, data_len).data_tail;

    let mut passed = true;

    if check_data {
        println!("Checking data log...");
        let result = match snapshot.data_log() {
            Ok(log) => verify_data_log(&log, data_tail)?,
            Err(e) => header_failure(e),
        };
        print_result("Data log", &result);
        passed &= result.is_ok();
    }

    if check_meta {
        println!("Checking meta log...");
        let result = match snapshot.meta_log() {
            Ok(log) => verify_meta_log(&log)?,
            Err(e) => header_failure(e),
        };
        print_result("Meta log", &result);
        passed &= result.is_ok();
    }

    println!("Checking recovery...");
    let recovery = verify_recovery(&snapshot);
    print_result("Recovery", &recovery);
    passed &= recovery.is_ok();

    println!();
    if passed {
        println!("✓ Journal verification passed");
        Ok(())
    } else {
        println!("✗ Journal verification failed");
        Err("Verification failed".into())
    }
}

fn header_failure(error: Box<dyn std::error::Error>) -> VerifyResult {
    let mut result = VerifyResult::default();
    result.errors.push(format!("Unreadable log header: {}", error));
    result
}

/// Checks every data frame: tag, checksum, version record and diff.
///
/// Frames past `data_tail` belong to a commit that never published and
/// are reported as warnings.
pub fn verify_data_log(
    log: &FrameLog,
    data_tail: u64,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    let mut unpublished = 0usize;
    let mut frames = log.iter()?;

    for item in frames.by_ref() {
        result.frames_checked += 1;
        let (offset, frame) = match item {
            Ok(item) => item,
            Err(e) => {
                result.corrupt(e.to_string());
                break;
            }
        };

        if !frame.tag.is_data_tag() {
            result.corrupt(format!(
                "Frame at offset {} has non-data tag {:#010x}",
                offset,
                frame.tag.as_u32()
            ));
            continue;
        }

        let record = match ObjectVersionRecord::decode(&frame.payload) {
            Ok(record) => record,
            Err(e) => {
                result.corrupt(format!("Frame at offset {}: {}", offset, e));
                continue;
            }
        };
        if record.prev_version_ptr.as_u64() >= offset {
            result.corrupt(format!(
                "Frame at offset {} points forward to {}",
                offset, record.prev_version_ptr
            ));
            continue;
        }
        let diff = DiffPayloadReader::new(record.diff_payload)
            .and_then(|reader| reader.read_all::<Value>());
        if let Err(e) = diff {
            result.corrupt(format!("Frame at offset {} has a bad diff: {}", offset, e));
            continue;
        }

        if offset >= data_tail {
            unpublished += 1;
        }
        result.valid_frames += 1;
    }

    if frames.is_torn() {
        result.warnings.push(format!(
            "Torn frame at offset {} ({} bytes)",
            frames.position(),
            frames.total_size() - frames.position()
        ));
    }
    if unpublished > 0 {
        result
            .warnings
            .push(format!("{} unpublished frames past data tail {}", unpublished, data_tail));
    }

    Ok(result)
}

/// Checks the meta records and that their epochs count up from one.
pub fn verify_meta_log(log: &FrameLog) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    let scan = scan_meta_log(log)?;

    let mut expected_epoch = 1u64;
    for entry in &scan.entries {
        result.frames_checked += 1;
        let epoch = entry.record.epoch_seq.as_u64();
        if epoch == expected_epoch {
            result.valid_frames += 1;
        } else {
            result.corrupt(format!(
                "Record at offset {} has epoch {}, expected {}",
                entry.offset, epoch, expected_epoch
            ));
        }
        expected_epoch = epoch.saturating_add(1);
    }

    if scan.has_garbage_tail() {
        result.warnings.push(format!(
            "{} unreadable bytes at offset {}: {}",
            scan.total_len - scan.valid_len,
            scan.valid_len,
            scan.stop_reason.as_deref().unwrap_or("unknown")
        ));
    }

    Ok(result)
}

/// Opens the journal copy with full verification, replaying every
/// object's version chain.
fn verify_recovery(snapshot: &JournalSnapshot) -> VerifyResult {
    let mut result = VerifyResult::default();
    match snapshot.open_workspace(true) {
        Ok(ws) => {
            result.frames_checked = ws.version_index().len();
            result.valid_frames = result.frames_checked;
        }
        Err(e) => result.errors.push(format!("Recovery failed: {}", e)),
    }
    result
}

fn print_result(name: &str, result: &VerifyResult) {
    println!(
        "  {} frames checked: {}, valid: {}, corrupt: {}",
        name, result.frames_checked, result.valid_frames, result.corrupt_frames
    );
    for warning in &result.warnings {
        println!("    WARNING: {}", warning);
    }
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use std::fs;

    #[test]
    fn clean_journal_passes() {
        let (_temp, path) = committed_journal();
        let snapshot = JournalSnapshot::read(&path).unwrap();

        let data = verify_data_log(&snapshot.data_log().unwrap(), snapshot.data.len() as u64).unwrap();
        // two commits: dict 16 + index, then dict 17 + index
        assert_eq!(data.valid_frames, 4);
        assert!(data.is_ok());
        assert!(data.warnings.is_empty());

        let meta = verify_meta_log(&snapshot.meta_log().unwrap()).unwrap();
        assert_eq!(meta.valid_frames, 2);
        assert!(meta.is_ok());

        assert!(verify_recovery(&snapshot).is_ok());
        assert!(run(&path, true, true).is_ok());
    }

    #[test]
    fn torn_tails_are_warnings() {
        let (_temp, path) = committed_journal();
        append_raw(&path.join("data.log"), &[0x01, 0x00, 0x01, 0x00, 0xFF]);
        append_raw(&path.join("meta.log"), &[0x02]);
        let snapshot = JournalSnapshot::read(&path).unwrap();

        let data = verify_data_log(&snapshot.data_log().unwrap(), 0).unwrap();
        assert!(data.is_ok());
        assert!(data.warnings.iter().any(|w| w.contains("Torn frame")));

        let meta = verify_meta_log(&snapshot.meta_log().unwrap()).unwrap();
        assert!(meta.is_ok());
        assert_eq!(meta.warnings.len(), 1);

        assert!(run(&path, true, true).is_ok());
    }

    #[test]
    fn damaged_frame_fails() {
        let (_temp, path) = committed_journal();
        let data_path = path.join("data.log");
        let mut bytes = fs::read(&data_path).unwrap();
        bytes[4 + 8 + 9] ^= 0xFF;
        fs::write(&data_path, &bytes).unwrap();

        let snapshot = JournalSnapshot::read(&path).unwrap();
        let data = verify_data_log(&snapshot.data_log().unwrap(), snapshot.data.len() as u64).unwrap();
        assert_eq!(data.corrupt_frames, 1);
        assert!(!verify_recovery(&snapshot).is_ok());
        assert!(run(&path, true, true).is_err());
    }

    #[test]
    fn foreign_header_fails() {
        let (_temp, path) = committed_journal();
        fs::write(path.join("meta.log"), b"XXXXXXXX").unwrap();
        assert!(run(&path, false, true).is_err());
    }
}
