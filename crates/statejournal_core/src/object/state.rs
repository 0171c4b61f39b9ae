//! Durable object lifecycle.

use crate::error::CoreResult;
use crate::format::FrameTag;
use crate::types::ObjectId;

/// Lifecycle state of an in-memory durable object.
///
/// | From | Event | To |
/// |---|---|---|
/// | new object | create | `TransientDirty` |
/// | loaded from the log | load | `Clean` |
/// | `Clean` | mutate | `PersistentDirty` |
/// | `TransientDirty` / `PersistentDirty` | commit succeeds | `Clean` |
/// | `TransientDirty` | discard | `Detached` |
/// | `PersistentDirty` | discard | `Clean` |
/// | `Clean` / `Detached` | discard | unchanged |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurableObjectState {
    /// In-memory state equals the last committed version.
    Clean,
    /// Committed before, with uncommitted changes on top.
    PersistentDirty,
    /// Never committed.
    TransientDirty,
    /// Discarded before its first commit; unusable.
    Detached,
}

impl DurableObjectState {
    /// Returns `true` for the two dirty states.
    #[must_use]
    pub const fn has_changes(self) -> bool {
        matches!(self, Self::PersistentDirty | Self::TransientDirty)
    }
}

/// Contract every durable object obeys across transactions.
///
/// Writing a diff never changes the object; only a successful commit or an
/// explicit discard moves it to another state.
pub trait DurableObject {
    /// Returns the object's identity.
    fn object_id(&self) -> ObjectId;

    /// Returns the current lifecycle state.
    fn state(&self) -> DurableObjectState;

    /// Returns `true` if the object has uncommitted changes.
    fn has_changes(&self) -> bool {
        self.state().has_changes()
    }

    /// Returns the tag its version frames carry.
    fn frame_tag(&self) -> FrameTag;

    /// Appends the diff since the last committed version to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ObjectDetached`] for detached objects.
    fn write_pending_diff(&self, out: &mut Vec<u8>) -> CoreResult<()>;

    /// Folds pending changes into the committed baseline.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ObjectDetached`] for detached objects.
    fn on_commit_succeeded(&mut self) -> CoreResult<()>;

    /// Drops pending changes.
    ///
    /// # Errors
    ///
    /// Implementations may fail if the object cannot be restored.
    fn discard_changes(&mut self) -> CoreResult<()>;
}
