//! Inspect command implementation.

use super::{format_size, JournalSnapshot};
use serde::Serialize;
use statejournal_core::commit::WorkspaceRecovery;
use statejournal_core::frame::LOG_HEADER_SIZE;
use statejournal_core::scan_meta_log;
use std::path::Path;

/// Journal inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal path.
    pub path: String,
    /// Data log size in bytes.
    pub data_log_size: u64,
    /// Meta log size in bytes.
    pub meta_log_size: u64,
    /// Readable meta records.
    pub meta_record_count: usize,
    /// Unreadable bytes at the end of the meta log.
    pub meta_garbage_bytes: u64,
    /// Epoch recovery would resume from.
    pub epoch_seq: u64,
    /// Next object id recovery would hand out.
    pub next_object_id: u64,
    /// Root object of the recovered commit.
    pub root_object_id: u64,
    /// Newest version index frame.
    pub version_index_ptr: u64,
    /// Published end of the data log.
    pub data_tail: u64,
    /// Whether recovery would cut the data log.
    pub truncates_data: bool,
    /// Bytes past the published tail.
    pub unpublished_bytes: u64,
    /// Meta records skipped because their data is missing.
    pub skipped_records: usize,
    /// Object table (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectInfo>>,
}

/// One entry of the object table.
#[derive(Debug, Serialize)]
pub struct ObjectInfo {
    /// Object id.
    pub id: u64,
    /// Address of the newest version.
    pub address: u64,
    /// Number of live keys.
    pub key_count: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_objects: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_objects)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    Ok(())
}

/// Computes what opening the journal would recover, without changing it.
pub fn inspect(path: &Path, show_objects: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let snapshot = JournalSnapshot::read(path)?;
    let data_log_size = snapshot.data.len() as u64;

    let scan = scan_meta_log(&snapshot.meta_log()?)?;
    let records = scan.records();
    let info = WorkspaceRecovery::recover(&records, WorkspaceRecovery::logical_data_len(data_log_size));
    let skipped_records = match info.record_index {
        Some(index) => records.len() - index - 1,
        None => records.len(),
    };

    let objects = if show_objects {
        let mut ws = snapshot.open_workspace(false)?;
        let mut objects = Vec::new();
        for (id, address) in ws.version_index().entries() {
            let key_count = ws.load_dict(id)?.len()?;
            objects.push(ObjectInfo {
                id: id.as_u64(),
                address: address.as_u64(),
                key_count,
            });
        }
        Some(objects)
    } else {
        None
    };

    let data_tail = info.data_tail.max(LOG_HEADER_SIZE);
    let unpublished_bytes = if info.was_truncated {
        data_log_size.saturating_sub(data_tail)
    } else {
        0
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        data_log_size,
        meta_log_size: scan.total_len,
        meta_record_count: records.len(),
        meta_garbage_bytes: scan.total_len - scan.valid_len,
        epoch_seq: info.epoch_seq.as_u64(),
        next_object_id: info.next_object_id.as_u64(),
        root_object_id: info.root_object_id.as_u64(),
        version_index_ptr: info.version_index_ptr,
        data_tail,
        truncates_data: info.was_truncated,
        unpublished_bytes,
        skipped_records,
        objects,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("StateJournal Inspection Report");
    println!("==============================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Storage:");
    println!("  Data log: {}", format_size(result.data_log_size));
    println!("  Meta log: {}", format_size(result.meta_log_size));
    println!();
    println!("Meta log:");
    println!("  Records:       {}", result.meta_record_count);
    println!("  Skipped:       {}", result.skipped_records);
    println!("  Garbage tail:  {} bytes", result.meta_garbage_bytes);
    println!();
    println!("Recovered state:");
    println!("  Epoch:          {}", result.epoch_seq);
    println!("  Next object id: {}", result.next_object_id);
    println!("  Root object:    {}", result.root_object_id);
    println!("  Version index:  {}", result.version_index_ptr);
    println!("  Data tail:      {}", result.data_tail);
    if result.truncates_data {
        println!(
            "  Unpublished:    {} bytes would be truncated",
            result.unpublished_bytes
        );
    }

    if let Some(objects) = &result.objects {
        println!();
        println!("Objects:");
        for object in objects {
            println!(
                "  [{}] @{} {} keys",
                object.id, object.address, object.key_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn reports_recovered_state() {
        let (_temp, path) = committed_journal();
        let result = inspect(&path, true).unwrap();

        assert_eq!(result.epoch_seq, 2);
        assert_eq!(result.next_object_id, 18);
        assert_eq!(result.root_object_id, 16);
        assert_eq!(result.meta_record_count, 2);
        assert_eq!(result.skipped_records, 0);
        assert_eq!(result.data_tail, result.data_log_size);
        assert!(!result.truncates_data);

        let objects = result.objects.unwrap();
        let ids: Vec<u64> = objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![16, 17]);
        assert!(objects.iter().all(|o| o.key_count == 1));
    }

    #[test]
    fn reports_unpublished_and_torn_bytes() {
        let (_temp, path) = committed_journal();
        append_raw(&path.join("data.log"), &[0xAB; 12]);
        append_raw(&path.join("meta.log"), &[0x02, 0x00]);

        let result = inspect(&path, false).unwrap();
        assert!(result.truncates_data);
        assert_eq!(result.unpublished_bytes, 12);
        assert_eq!(result.meta_garbage_bytes, 2);
        assert_eq!(result.epoch_seq, 2);
        assert!(result.objects.is_none());
    }

    #[test]
    fn json_output_skips_missing_objects() {
        let (_temp, path) = committed_journal();
        let result = inspect(&path, false).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"epoch_seq\":2"));
        assert!(!json.contains("objects"));
    }
}
