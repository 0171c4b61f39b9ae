//! Dump meta command implementation.

use super::JournalSnapshot;
use serde::Serialize;
use statejournal_core::commit::WorkspaceRecovery;
use statejournal_core::scan_meta_log;
use std::path::Path;

/// Meta commit record representation for output.
#[derive(Debug, Serialize)]
pub struct MetaRecordInfo {
    /// Offset in the meta log.
    pub offset: u64,
    /// Epoch of the commit.
    pub epoch_seq: u64,
    /// Root object id.
    pub root_object_id: u64,
    /// Version index pointer.
    pub version_index_ptr: u64,
    /// Published data log length.
    pub data_tail: u64,
    /// Next object id.
    pub next_object_id: u64,
    /// Whether the data log holds everything this record publishes.
    pub valid: bool,
    /// Whether recovery would resume from this record.
    pub recovered: bool,
}

/// Runs the dump-meta command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_meta_records(path, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads the newest `limit` meta records, oldest first.
pub fn read_meta_records(
    path: &Path,
    limit: Option<usize>,
) -> Result<Vec<MetaRecordInfo>, Box<dyn std::error::Error>> {
    let snapshot = JournalSnapshot::read(path)?;
    let data_len = WorkspaceRecovery::logical_data_len(snapshot.data.len() as u64);
    let scan = scan_meta_log(&snapshot.meta_log()?)?;
    let recovered = WorkspaceRecovery::recover(&scan.records(), data_len).record_index;

    let skip = limit.map_or(0, |n| scan.entries.len().saturating_sub(n));
    let records = scan
        .entries
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(index, entry)| {
            let record = &entry.record;
            MetaRecordInfo {
                offset: entry.offset,
                epoch_seq: record.epoch_seq.as_u64(),
                root_object_id: record.root_object_id.as_u64(),
                version_index_ptr: record.version_index_ptr,
                data_tail: record.data_tail,
                next_object_id: record.next_object_id.as_u64(),
                valid: WorkspaceRecovery::is_record_valid(record, data_len),
                recovered: recovered == Some(index),
            }
        })
        .collect();

    Ok(records)
}

fn print_text_output(records: &[MetaRecordInfo]) {
    println!("Meta Commit Records");
    println!("===================");
    println!();

    if records.is_empty() {
        println!("(no commits)");
        return;
    }

    for record in records {
        let marker = if record.recovered {
            " <- recovered"
        } else if !record.valid {
            " (data missing)"
        } else {
            ""
        };
        println!(
            "[{:>8}] epoch={} root={} index={} tail={} next_id={}{}",
            record.offset,
            record.epoch_seq,
            record.root_object_id,
            record.version_index_ptr,
            record.data_tail,
            record.next_object_id,
            marker
        );
    }
}
