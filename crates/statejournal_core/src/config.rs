//! Workspace configuration.

use crate::types::ObjectId;

/// Configuration for opening a workspace.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the journal directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to `sync` both logs on every commit (safer but slower).
    ///
    /// When disabled, commits only flush to the OS; a power loss may then
    /// roll back recent commits, but recovery still finds a consistent one.
    pub sync_on_commit: bool,

    /// Root object recorded in the first commit of a fresh journal
    /// (`0` = no root).
    pub root_object_id: ObjectId,

    /// Whether to checksum every frame the recovered version index points
    /// at while opening.
    pub verify_on_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            root_object_id: ObjectId::VERSION_INDEX,
            verify_on_open: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the journal if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync both logs on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the root object of a fresh journal.
    #[must_use]
    pub const fn root_object_id(mut self, id: ObjectId) -> Self {
        self.root_object_id = id;
        self
    }

    /// Sets whether to verify version frames on open.
    #[must_use]
    pub const fn verify_on_open(mut self, value: bool) -> Self {
        self.verify_on_open = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_commit);
        assert!(config.verify_on_open);
        assert_eq!(config.root_object_id, ObjectId::new(0));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .root_object_id(ObjectId::new(16))
            .verify_on_open(false);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert!(!config.verify_on_open);
        assert_eq!(config.root_object_id, ObjectId::new(16));
    }
}
