//! Core type definitions for StateJournal.

use std::fmt;

/// Global identity of a durable object.
///
/// Ids `0..=15` are reserved for well-known objects; `0` is permanently the
/// version index. User objects are allocated from [`ObjectId::MIN_USER`]
/// upward and an id is never handed out twice, even across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The reserved id of the version index.
    pub const VERSION_INDEX: Self = Self(0);

    /// The first id available to user objects.
    pub const MIN_USER: Self = Self(16);

    /// Creates an object id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for ids in the reserved well-known range.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::MIN_USER.0
    }

    /// Returns the id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// Commit sequence number.
///
/// Epoch `0` means "nothing committed yet"; every successful commit
/// advances the epoch by exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EpochSeq(pub u64);

impl EpochSeq {
    /// The epoch of a journal with no commits.
    pub const ZERO: Self = Self(0);

    /// Creates an epoch.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw epoch value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next epoch.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EpochSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_reserved_range() {
        assert!(ObjectId::VERSION_INDEX.is_reserved());
        assert!(ObjectId::new(15).is_reserved());
        assert!(!ObjectId::MIN_USER.is_reserved());
        assert_eq!(ObjectId::new(16).next(), ObjectId::new(17));
    }

    #[test]
    fn epoch_next() {
        assert_eq!(EpochSeq::ZERO.next(), EpochSeq::new(1));
        assert_eq!(EpochSeq::new(41).next().as_u64(), 42);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", ObjectId::new(16)), "obj:16");
        assert_eq!(format!("{}", EpochSeq::new(3)), "epoch:3");
    }
}
