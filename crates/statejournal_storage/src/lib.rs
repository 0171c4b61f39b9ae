//! # StateJournal Storage
//!
//! Append-only byte stores underneath the StateJournal data log and meta log.
//!
//! Backends are **opaque**: they know nothing about frames, commit records or
//! durable objects. The journal core owns every byte of interpretation; a
//! backend only has to append, read back, make data durable and cut a torn
//! tail off during recovery.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - one OS file per log
//! - [`InMemoryBackend`] - ephemeral journals and crash-simulation tests
//!
//! ## Example
//!
//! ```rust
//! use statejournal_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut log = InMemoryBackend::new();
//! let offset = log.append(b"frame bytes").unwrap();
//! assert_eq!(log.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
