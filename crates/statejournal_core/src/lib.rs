//! # StateJournal Core
//!
//! A crash-safe journal of durable objects.
//!
//! This crate provides:
//! - Canonical VarInt, address and frame tag codecs
//! - Checksummed frames in an append-only data log and meta log
//! - Durable dictionaries that track their own pending diffs
//! - The version index mapping every object to its newest version
//! - Two-phase commits published by one meta record each
//! - Recovery of the newest commit both logs agree on
//!
//! ## Example
//!
//! ```rust
//! use statejournal_core::{Value, Workspace};
//!
//! let mut ws = Workspace::open_in_memory().unwrap();
//! let id = ws.create_dict();
//! ws.load_dict(id).unwrap().set(1, Value::Int(42)).unwrap();
//! ws.commit().unwrap();
//!
//! assert_eq!(ws.epoch_seq().as_u64(), 1);
//! assert_eq!(ws.load_dict(id).unwrap().get(1).unwrap(), Some(&Value::Int(42)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod commit;
mod config;
mod error;
pub mod format;
pub mod frame;
pub mod object;
mod types;
mod workspace;

pub use commit::{CommitContext, MetaCommitRecord, RecoveryInfo, WorkspaceRecovery, WrittenRecord};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use format::{Address64, DecodeError, FrameTag, ObjectKind, Ptr64, RecordType};
pub use object::{DurableDict, DurableObject, DurableObjectState, Value, VersionIndex};
pub use types::{EpochSeq, ObjectId};
pub use workspace::{scan_meta_log, JournalDir, MetaLogEntry, MetaLogScan, Workspace};

/// Crate version, reported by the operator CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
