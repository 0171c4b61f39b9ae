//! Durable objects and their diff encoding.

mod dict;
mod diff;
mod state;
mod version_index;
mod version_record;

pub(crate) use dict::apply_diff;
pub use dict::DurableDict;
pub use diff::{encode_diff, DictValue, DiffChange, DiffPayloadReader, Value, ValueType};
pub use state::{DurableObject, DurableObjectState};
pub use version_index::VersionIndex;
pub use version_record::ObjectVersionRecord;
