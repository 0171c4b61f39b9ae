//! The workspace and everything it needs to open a journal.
//!
//! Opening runs in a fixed order:
//! 1. Take the directory lock
//! 2. Scan the meta log, stopping at the first damaged frame
//! 3. Pick the newest commit whose data is all present
//! 4. Cut both logs back to that commit
//! 5. Load the version index it points at

mod dir;
mod handle;
mod loader;
mod meta_log;

pub use dir::JournalDir;
pub use handle::Workspace;
pub use meta_log::{scan_meta_log, MetaLogEntry, MetaLogScan};
