//! # StateJournal Testkit
//!
//! Test utilities for StateJournal.
//!
//! This crate provides:
//! - Test fixtures and journal helpers
//! - Property-based test generators using proptest
//! - Crash simulation backends and a crash recovery harness
//! - Fuzz targets for the decoders, recovery and workspace operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use statejournal_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_journal() {
//!     with_temp_journal(|ws| {
//!         let id = ws.create_dict();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod fuzz;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::{CrashControl, CrashPoint, CrashRecoveryHarness, CrashRecoveryResult, CrashableBackend};
pub use fixtures::*;
pub use generators::*;
