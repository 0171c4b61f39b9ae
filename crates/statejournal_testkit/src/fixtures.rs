//! Test fixtures and journal helpers.
//!
//! Provides convenience functions for setting up test journals and
//! common test scenarios.

use statejournal_core::{Config, Workspace};
use statejournal_storage::InMemoryBackend;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

enum Storage {
    Memory {
        data: InMemoryBackend,
        meta: InMemoryBackend,
    },
    File {
        temp_dir: TempDir,
        path: PathBuf,
    },
}

/// A test journal with automatic cleanup.
///
/// Both flavors can be reopened, which runs recovery against the bytes the
/// previous workspace left behind.
pub struct TestJournal {
    /// The workspace instance.
    pub ws: Workspace,
    storage: Storage,
    config: Config,
}

impl TestJournal {
    /// Creates a new in-memory test journal.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates a new in-memory test journal with a custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        let data = InMemoryBackend::new();
        let meta = InMemoryBackend::new();
        let ws = Workspace::open_with_backends(
            config.clone(),
            Box::new(data.share()),
            Box::new(meta.share()),
        )
        .expect("Failed to open in-memory journal");
        Self {
            ws,
            storage: Storage::Memory { data, meta },
            config,
        }
    }

    /// Creates a new journal in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("journal");
        let config = Config::default();
        let ws = Workspace::open_with_config(&path, config.clone())
            .expect("Failed to open file journal");
        Self {
            ws,
            storage: Storage::File { temp_dir, path },
            config,
        }
    }

    /// Returns the journal directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::File { path, .. } => Some(path),
            Storage::Memory { .. } => None,
        }
    }

    /// Drops the workspace and opens the journal again.
    pub fn reopen(self) -> Self {
        let Self { ws, storage, config } = self;
        // Release the directory lock before reopening
        drop(ws);

        let ws = match &storage {
            Storage::Memory { data, meta } => Workspace::open_with_backends(
                config.clone(),
                Box::new(data.share()),
                Box::new(meta.share()),
            ),
            Storage::File { path, .. } => Workspace::open_with_config(path, config.clone()),
        }
        .expect("Failed to reopen journal");
        Self { ws, storage, config }
    }

    /// Returns the raw bytes of `(data log, meta log)`.
    pub fn log_bytes(&self) -> (Vec<u8>, Vec<u8>) {
        match &self.storage {
            Storage::Memory { data, meta } => (data.data(), meta.data()),
            Storage::File { path, .. } => (
                std::fs::read(path.join("data.log")).expect("Failed to read data log"),
                std::fs::read(path.join("meta.log")).expect("Failed to read meta log"),
            ),
        }
    }

    /// Returns the temporary directory holding a file journal.
    pub fn temp_dir(&self) -> Option<&Path> {
        match &self.storage {
            Storage::File { temp_dir, .. } => Some(temp_dir.path()),
            Storage::Memory { .. } => None,
        }
    }
}

impl std::ops::Deref for TestJournal {
    type Target = Workspace;

    fn deref(&self) -> &Self::Target {
        &self.ws
    }
}

impl std::ops::DerefMut for TestJournal {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ws
    }
}

/// Runs a test with a temporary in-memory journal.
///
/// # Example
///
/// ```rust,ignore
/// use statejournal_testkit::with_temp_journal;
///
/// #[test]
/// fn my_test() {
///     with_temp_journal(|ws| {
///         let id = ws.create_dict();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_journal<F, R>(f: F) -> R
where
    F: FnOnce(&mut Workspace) -> R,
{
    let mut journal = TestJournal::memory();
    f(&mut journal.ws)
}

/// Runs a test with a temporary file-based journal.
pub fn with_file_journal<F, R>(f: F) -> R
where
    F: FnOnce(&mut Workspace, &Path) -> R,
{
    let mut journal = TestJournal::file();
    let path = journal
        .path()
        .expect("File journal should have a path")
        .to_path_buf();
    f(&mut journal.ws, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use statejournal_core::{ObjectId, Value};

    /// Creates a journal with `objects` committed dicts of
    /// `keys_per_object` integer entries each.
    ///
    /// Entry `k` of object number `n` holds `n * 1000 + k`.
    pub fn populated_journal(objects: usize, keys_per_object: u64) -> (TestJournal, Vec<ObjectId>) {
        let mut journal = TestJournal::memory();
        let mut ids = Vec::with_capacity(objects);

        for n in 0..objects {
            let id = journal.create_dict();
            let dict = journal.load_dict(id).expect("Failed to load new dict");
            for k in 0..keys_per_object {
                dict.set(k, Value::Int((n as i64) * 1000 + k as i64))
                    .expect("Failed to set entry");
            }
            ids.push(id);
        }
        journal.commit().expect("Failed to commit populated journal");

        (journal, ids)
    }

    /// Creates a journal whose single dict went through `commits` commits,
    /// each overwriting key `0` with the commit number.
    pub fn long_chain_journal(commits: u64) -> (TestJournal, ObjectId) {
        let mut journal = TestJournal::memory();
        let id = journal.create_dict();
        for i in 1..=commits {
            journal
                .load_dict(id)
                .expect("Failed to load dict")
                .set(0, Value::Int(i as i64))
                .expect("Failed to set entry");
            journal.commit().expect("Failed to commit");
        }
        (journal, id)
    }
}

#[cfg(test)]
mod tests {
    use super::scenarios::*;
    use super::*;
    use statejournal_core::{EpochSeq, Value};

    #[test]
    fn memory_journal_reopens() {
        let mut journal = TestJournal::memory();
        let id = journal.create_dict();
        journal.load_dict(id).unwrap().set(1, Value::Int(1)).unwrap();
        journal.commit().unwrap();

        let mut journal = journal.reopen();
        assert_eq!(journal.epoch_seq(), EpochSeq::new(1));
        assert_eq!(journal.load_dict(id).unwrap().len().unwrap(), 1);
        assert!(journal.path().is_none());
    }

    #[test]
    fn file_journal_reopens() {
        let mut journal = TestJournal::file();
        assert!(journal.path().unwrap().starts_with(journal.temp_dir().unwrap()));
        let id = journal.create_dict();
        journal.commit().unwrap();

        let (data, meta) = journal.log_bytes();
        assert!(data.starts_with(b"SJD1"));
        assert!(meta.starts_with(b"SJM1"));

        let mut journal = journal.reopen();
        assert_eq!(journal.epoch_seq(), EpochSeq::new(1));
        assert!(journal.load_dict(id).unwrap().is_empty().unwrap());
    }

    #[test]
    fn helpers_run_closures() {
        let epoch = with_temp_journal(|ws| {
            ws.create_dict();
            ws.commit().unwrap();
            ws.epoch_seq()
        });
        assert_eq!(epoch, EpochSeq::new(1));

        with_file_journal(|ws, path| {
            assert_eq!(ws.path(), Some(path));
        });
    }

    #[test]
    fn populated_journal_contents() {
        let (journal, ids) = populated_journal(3, 4);
        let mut journal = journal.reopen();
        assert_eq!(ids.len(), 3);
        assert_eq!(
            journal.load_dict(ids[2]).unwrap().get(3).unwrap(),
            Some(&Value::Int(2003))
        );
    }

    #[test]
    fn long_chain_replays_to_newest() {
        let (journal, id) = long_chain_journal(25);
        let mut journal = journal.reopen();
        assert_eq!(journal.epoch_seq(), EpochSeq::new(25));
        assert_eq!(
            journal.load_dict(id).unwrap().get(0).unwrap(),
            Some(&Value::Int(25))
        );
    }
}
