//! Wire-level primitives shared by both logs.
//!
//! Everything in this module is pure: it turns bytes into values and back,
//! and reports structural problems as [`DecodeError`]s.

mod address;
mod cursor;
mod error;
mod frame_tag;
pub mod varint;

pub use address::{Address64, Ptr64};
pub use cursor::ByteCursor;
pub use error::{DecodeError, DecodeResult, MetaCommitField};
pub use frame_tag::{FrameTag, ObjectKind, RecordType};
