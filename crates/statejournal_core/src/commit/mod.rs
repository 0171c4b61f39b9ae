//! Commit records, commit staging and recovery.

mod context;
mod meta_record;
mod recovery;

pub use context::{CommitContext, WrittenRecord};
pub use meta_record::MetaCommitRecord;
pub use recovery::{RecoveryInfo, WorkspaceRecovery};
