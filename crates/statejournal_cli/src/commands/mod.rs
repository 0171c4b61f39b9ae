//! CLI command implementations.

pub mod dump_meta;
pub mod inspect;
pub mod verify;

use statejournal_core::frame::{FrameLog, DATA_LOG_MAGIC, META_LOG_MAGIC};
use statejournal_core::{Config, Workspace};
use statejournal_storage::InMemoryBackend;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Raw bytes of both logs of a journal directory.
///
/// Commands work on these copies so that reading a journal never cuts its
/// torn tails or writes a missing header.
pub(crate) struct JournalSnapshot {
    pub data: Vec<u8>,
    pub meta: Vec<u8>,
}

impl JournalSnapshot {
    /// Reads both logs of the journal at `path`.
    pub fn read(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data_path = path.join("data.log");
        let meta_path = path.join("meta.log");

        if !data_path.exists() || !meta_path.exists() {
            return Err(format!("No journal found at {:?}", path).into());
        }

        let snapshot = Self {
            data: fs::read(data_path)?,
            meta: fs::read(meta_path)?,
        };
        debug!(
            data_len = snapshot.data.len(),
            meta_len = snapshot.meta.len(),
            "read journal logs"
        );
        Ok(snapshot)
    }

    /// Opens the data log copy.
    pub fn data_log(&self) -> Result<FrameLog, Box<dyn std::error::Error>> {
        let backend = InMemoryBackend::with_data(self.data.clone());
        Ok(FrameLog::open(Box::new(backend), DATA_LOG_MAGIC)?)
    }

    /// Opens the meta log copy.
    pub fn meta_log(&self) -> Result<FrameLog, Box<dyn std::error::Error>> {
        let backend = InMemoryBackend::with_data(self.meta.clone());
        Ok(FrameLog::open(Box::new(backend), META_LOG_MAGIC)?)
    }

    /// Runs full recovery against the copies and returns the workspace.
    pub fn open_workspace(&self, verify: bool) -> Result<Workspace, Box<dyn std::error::Error>> {
        let config = Config::default().verify_on_open(verify);
        let ws = Workspace::open_with_backends(
            config,
            Box::new(InMemoryBackend::with_data(self.data.clone())),
            Box::new(InMemoryBackend::with_data(self.meta.clone())),
        )?;
        Ok(ws)
    }
}

/// Formats a byte count for humans.
pub(crate) fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use statejournal_core::{ObjectId, Value, Workspace};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Creates a journal with two commits: dict 16 holds `{1: 10}` and
    /// dict 17 holds `{2: ObjRef(16)}`.
    pub fn committed_journal() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal");
        {
            let mut ws = Workspace::open(&path).unwrap();
            let a = ws.create_dict();
            ws.load_dict(a).unwrap().set(1, Value::Int(10)).unwrap();
            ws.set_root_object_id(a);
            ws.commit().unwrap();

            let b = ws.create_dict();
            ws.load_dict(b).unwrap().set(2, Value::ObjRef(ObjectId::new(16))).unwrap();
            ws.commit().unwrap();
        }
        (temp, path)
    }

    pub fn append_raw(path: &Path, bytes: &[u8]) {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
    }
}
