//! Journal directory management.
//!
//! ```text
//! <journal>/
//! ├─ LOCK        # Advisory lock for single-writer
//! ├─ data.log    # Object version frames
//! └─ meta.log    # Meta commit frames
//! ```
//!
//! The LOCK file ensures only one process writes to a journal at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use statejournal_storage::FileBackend;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "data.log";
const META_FILE: &str = "meta.log";

/// Holds the exclusive lock on a journal directory.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct JournalDir {
    path: PathBuf,
    _lock_file: File,
}

impl JournalDir {
    /// Opens or creates a journal directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock (returns `JournalLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::JournalNotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::JournalLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the journal directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the data log.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    /// Returns the path of the meta log.
    #[must_use]
    pub fn meta_path(&self) -> PathBuf {
        self.path.join(META_FILE)
    }

    /// Returns `true` if neither log exists yet.
    #[must_use]
    pub fn is_new_journal(&self) -> bool {
        !self.data_path().exists() && !self.meta_path().exists()
    }

    /// Opens both logs, creating them if needed.
    ///
    /// Returns `(data, meta)`.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened.
    pub fn open_logs(&self) -> CoreResult<(FileBackend, FileBackend)> {
        let created = self.is_new_journal();
        let data = FileBackend::open(&self.data_path())?;
        let meta = FileBackend::open(&self.meta_path())?;
        if created {
            self.sync_directory()?;
        }
        Ok((data, meta))
    }

    /// Makes newly created files durable in the directory.
    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
