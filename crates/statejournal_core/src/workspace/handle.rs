//! The workspace: live objects, commits and recovery-based opening.

use crate::commit::{CommitContext, MetaCommitRecord, RecoveryInfo, WorkspaceRecovery};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::format::{Address64, FrameTag, Ptr64};
use crate::frame::{FrameLog, DATA_LOG_MAGIC, LOG_HEADER_SIZE, META_LOG_MAGIC};
use crate::object::{
    DurableDict, DurableObject, DurableObjectState, ObjectVersionRecord, Value, VersionIndex,
};
use crate::types::{EpochSeq, ObjectId};
use crate::workspace::dir::JournalDir;
use crate::workspace::loader::load_dict_chain;
use crate::workspace::meta_log::scan_meta_log;
use statejournal_storage::StorageBackend;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// The top-level handle of a journal.
///
/// A workspace owns the data log and the meta log, the version index and
/// an identity map of every live object. It hands out object ids, loads
/// objects lazily through the version index and runs commits.
///
/// # Opening
///
/// ```rust,ignore
/// use statejournal_core::{Config, Value, Workspace};
/// use std::path::Path;
///
/// let mut ws = Workspace::open_with_config(Path::new("my_journal"), Config::default())?;
/// let id = ws.create_dict();
/// ws.load_dict(id)?.set(1, Value::Int(42))?;
/// ws.commit()?;
/// ```
///
/// # Commits
///
/// A commit writes every dirty object as a new version frame, then the
/// version index, then one meta record. The data log is made durable before
/// the meta record is written, and objects only become clean after the meta
/// record is durable. If any of those writes fails the workspace is
/// poisoned: later commits fail with [`CoreError::WorkspacePoisoned`] until
/// the journal is reopened and recovered.
pub struct Workspace {
    config: Config,
    /// Journal directory (holds the lock). None for caller-supplied backends.
    dir: Option<JournalDir>,
    data_log: FrameLog,
    meta_log: FrameLog,
    version_index: VersionIndex,
    /// Identity map of live user objects.
    objects: BTreeMap<ObjectId, DurableDict>,
    /// Objects discarded before their first commit.
    detached: BTreeSet<ObjectId>,
    epoch_seq: EpochSeq,
    next_object_id: ObjectId,
    data_tail: u64,
    version_index_ptr: u64,
    root_object_id: ObjectId,
    poisoned: bool,
}

impl Workspace {
    /// Opens a journal directory with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Workspace::open_with_config`].
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a journal directory.
    ///
    /// The method:
    /// - Creates the directory if missing (unless `create_if_missing` is false)
    /// - Takes the directory lock
    /// - Recovers the newest commit both logs agree on, cutting torn tails
    /// - Loads the version index
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process holds the journal (`JournalLocked`)
    /// - The directory is missing and may not be created (`JournalNotFound`)
    /// - A log has a foreign header or a committed frame is damaged
    /// - I/O errors occur
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = JournalDir::open(path, config.create_if_missing)?;
        let (data, meta) = dir.open_logs()?;

        let mut workspace = Self::open_with_backends(config, Box::new(data), Box::new(meta))?;
        workspace.dir = Some(dir);
        Ok(workspace)
    }

    /// Opens a journal stored in caller-supplied backends.
    ///
    /// Runs the same recovery as [`Workspace::open_with_config`].
    ///
    /// # Errors
    ///
    /// Returns an error if a log has a foreign header, a committed frame is
    /// damaged, or I/O fails.
    pub fn open_with_backends(
        config: Config,
        data_backend: Box<dyn StorageBackend>,
        meta_backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        let data_log = FrameLog::open(data_backend, DATA_LOG_MAGIC)?;
        let meta_log = FrameLog::open(meta_backend, META_LOG_MAGIC)?;

        let scan = scan_meta_log(&meta_log)?;
        let data_len = WorkspaceRecovery::logical_data_len(data_log.size()?);
        let info = WorkspaceRecovery::recover(&scan.records(), data_len);

        let meta_end = info
            .record_index
            .and_then(|index| scan.entries.get(index))
            .map_or(LOG_HEADER_SIZE, |entry| entry.end);
        if meta_end < scan.total_len {
            warn!(
                from = scan.total_len,
                to = meta_end,
                "truncating meta log past the recovered commit"
            );
            meta_log.truncate(meta_end)?;
        }

        Self::from_recovery(info, data_log, meta_log, config)
    }

    /// Opens a fresh journal held entirely in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other constructors.
    pub fn open_in_memory() -> CoreResult<Self> {
        use statejournal_storage::InMemoryBackend;
        Self::open_with_backends(
            Config::default(),
            Box::new(InMemoryBackend::new()),
            Box::new(InMemoryBackend::new()),
        )
    }

    /// Resumes from a recovered commit point.
    ///
    /// Cuts the data log back to `info.data_tail` (never below the log
    /// header) when `info.was_truncated` is set, then loads the version
    /// index `info` points at. The meta log is used as is.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidFormat`] if the data log does not end where
    ///   `info` says it should
    /// - Any error from reading the version index chain
    pub fn from_recovery(
        info: RecoveryInfo,
        data_log: FrameLog,
        meta_log: FrameLog,
        config: Config,
    ) -> CoreResult<Self> {
        let data_tail = info.data_tail.max(LOG_HEADER_SIZE);
        Address64::new(data_tail).map_err(|e| {
            CoreError::invalid_format(format!("recovered data tail {data_tail} is unusable: {e}"))
        })?;

        if info.was_truncated {
            warn!(
                from = info.original_data_size,
                to = data_tail,
                "truncating data log to the recovered commit"
            );
            data_log.truncate(data_tail)?;
        }
        let data_len = data_log.size()?;
        if data_len != data_tail {
            return Err(CoreError::invalid_format(format!(
                "data log is {data_len} bytes but the commit point ends at {data_tail}"
            )));
        }

        let version_index = if info.version_index_ptr == 0 {
            VersionIndex::new()
        } else {
            let head = Address64::new(info.version_index_ptr)?;
            VersionIndex::from_committed(load_dict_chain::<Option<Ptr64>>(&data_log, head)?)
        };

        if config.verify_on_open {
            for (object_id, head) in version_index.entries() {
                load_dict_chain::<Value>(&data_log, head).map_err(|e| {
                    error!(object = %object_id, error = %e, "committed object failed verification");
                    e
                })?;
            }
        }

        let next_object_id = info
            .next_object_id
            .max(version_index.compute_next_object_id());
        let root_object_id = if info.is_empty() {
            config.root_object_id
        } else {
            info.root_object_id
        };

        info!(
            epoch = info.epoch_seq.as_u64(),
            objects = version_index.len(),
            next_object_id = next_object_id.as_u64(),
            data_tail,
            "workspace opened"
        );

        Ok(Self {
            config,
            dir: None,
            data_log,
            meta_log,
            version_index,
            objects: BTreeMap::new(),
            detached: BTreeSet::new(),
            epoch_seq: info.epoch_seq,
            next_object_id,
            data_tail,
            version_index_ptr: info.version_index_ptr,
            root_object_id,
            poisoned: false,
        })
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Creates a new, never-committed dictionary and returns its id.
    ///
    /// Ids are allocated immediately and never reused, even if the object
    /// is discarded before it is committed.
    pub fn create_dict(&mut self) -> ObjectId {
        let id = self.next_object_id;
        self.next_object_id = id.next();
        self.objects.insert(id, DurableDict::new_transient(id));
        debug!(object = %id, "created dict");
        id
    }

    /// Returns the live dictionary `id`, loading it from the data log if it
    /// is not cached.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ObjectDetached`] if the object was discarded before
    ///   its first commit
    /// - [`CoreError::ObjectNotFound`] if no committed version exists
    /// - Any error from reading its version chain
    pub fn load_dict(&mut self, id: ObjectId) -> CoreResult<&mut DurableDict> {
        if self.detached.contains(&id) {
            return Err(CoreError::ObjectDetached { object_id: id });
        }
        match self.objects.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let head = self
                    .version_index
                    .committed_ptr(id)
                    .ok_or(CoreError::ObjectNotFound { object_id: id })?;
                let committed = load_dict_chain::<Value>(&self.data_log, head)?;
                debug!(object = %id, head = head.as_u64(), keys = committed.len(), "loaded dict");
                Ok(entry.insert(DurableDict::from_committed(id, committed)))
            }
        }
    }

    /// Returns the dictionary `id` if it is live in the identity map.
    #[must_use]
    pub fn cached_dict(&self, id: ObjectId) -> Option<&DurableDict> {
        self.objects.get(&id)
    }

    /// Drops the pending changes of object `id`.
    ///
    /// A never-committed object becomes detached and leaves the identity
    /// map; a committed one returns to its committed contents.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectNotFound`] for an id the workspace has
    /// never seen.
    pub fn discard_changes(&mut self, id: ObjectId) -> CoreResult<()> {
        if let Some(object) = self.objects.get_mut(&id) {
            object.discard_changes()?;
            if object.state() == DurableObjectState::Detached {
                self.objects.remove(&id);
                self.detached.insert(id);
                debug!(object = %id, "detached never-committed object");
            }
            return Ok(());
        }
        if self.detached.contains(&id) || self.version_index.committed_ptr(id).is_some() {
            return Ok(());
        }
        Err(CoreError::ObjectNotFound { object_id: id })
    }

    /// Drops every clean object from the identity map and returns how many
    /// were dropped. They are reloaded on their next access.
    pub fn evict_clean(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, object| object.has_changes());
        before - self.objects.len()
    }

    /// Returns the number of objects with uncommitted changes.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.objects.values().filter(|o| o.has_changes()).count()
    }

    /// Returns the number of live objects in the identity map.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.objects.len()
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Commits every pending change and returns the finished context.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WorkspacePoisoned`] after an earlier failed commit
    /// - Any error writing or syncing the logs (which poisons the workspace)
    pub fn commit(&mut self) -> CoreResult<CommitContext> {
        let ctx = self.prepare_commit()?;
        self.finalize_commit(&ctx)?;
        Ok(ctx)
    }

    /// Stages the next commit without writing anything.
    ///
    /// Every dirty object is encoded as a version frame in id order, each
    /// pointing at its previous committed version. The version index is
    /// updated with the new addresses and staged last. Calling this again
    /// discards the previous staging.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WorkspacePoisoned`] after an earlier failed commit
    /// - An error if a payload does not fit in a frame
    pub fn prepare_commit(&mut self) -> CoreResult<CommitContext> {
        self.ensure_not_poisoned()?;
        self.version_index.revert_to_committed();

        let mut ctx = CommitContext::new(
            self.epoch_seq.next(),
            self.data_tail,
            self.version_index_ptr,
        );

        for (&id, object) in &self.objects {
            if !object.has_changes() {
                continue;
            }
            let prev = self.version_index.committed_ptr(id).unwrap_or(Address64::NULL);
            let payload = encode_version(prev, object)?;
            let len = payload.len();
            let address = ctx.write_object_version(id, payload, object.frame_tag())?;
            self.version_index.set_object_version_ptr(id, address)?;
            debug!(object = %id, %address, %prev, len, "staged object version");
        }

        if self.version_index.has_changes() {
            let prev = Address64::new(self.version_index_ptr)?;
            let payload = encode_version(prev, &self.version_index)?;
            let tag = self.version_index.frame_tag();
            let address = ctx.write_object_version(ObjectId::VERSION_INDEX, payload, tag)?;
            ctx.set_version_index_ptr(address);
            debug!(%address, %prev, "staged version index");
        }

        Ok(ctx)
    }

    /// Writes a staged commit and publishes it.
    ///
    /// Appends the staged frames, makes them durable, appends the meta
    /// record, makes it durable, and only then marks every written object
    /// clean and advances the epoch.
    ///
    /// `ctx` must come from the latest [`Workspace::prepare_commit`], with
    /// no changes to the written objects in between.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WorkspacePoisoned`] after an earlier failed commit
    /// - [`CoreError::InvalidOperation`] for a stale context
    /// - Any error writing or syncing the logs (which poisons the workspace)
    pub fn finalize_commit(&mut self, ctx: &CommitContext) -> CoreResult<()> {
        self.ensure_not_poisoned()?;
        self.check_context(ctx)?;

        let record = ctx.build_meta_record(self.root_object_id, self.next_object_id);
        if let Err(e) = self.publish(ctx, &record) {
            self.poisoned = true;
            error!(epoch = ctx.epoch_seq().as_u64(), error = %e, "commit failed, workspace poisoned");
            return Err(e);
        }

        for written in ctx.written_records() {
            if written.object_id == ObjectId::VERSION_INDEX {
                self.version_index.on_commit_succeeded()?;
            } else if let Some(object) = self.objects.get_mut(&written.object_id) {
                object.on_commit_succeeded()?;
            }
        }

        self.epoch_seq = ctx.epoch_seq();
        self.data_tail = ctx.data_tail();
        self.version_index_ptr = ctx.version_index_ptr();

        info!(
            epoch = self.epoch_seq.as_u64(),
            frames = ctx.written_records().len(),
            data_tail = self.data_tail,
            version_index_ptr = self.version_index_ptr,
            "committed"
        );
        Ok(())
    }

    fn ensure_not_poisoned(&self) -> CoreResult<()> {
        if self.poisoned {
            return Err(CoreError::WorkspacePoisoned);
        }
        Ok(())
    }

    /// Rejects a context that no longer matches the workspace.
    fn check_context(&self, ctx: &CommitContext) -> CoreResult<()> {
        if ctx.epoch_seq() != self.epoch_seq.next() || ctx.base_tail() != self.data_tail {
            return Err(CoreError::invalid_operation(format!(
                "stale commit context for {} at tail {}",
                ctx.epoch_seq(),
                ctx.base_tail()
            )));
        }
        ctx.check_consistency()?;

        for written in ctx.written_records() {
            let expected = if written.object_id == ObjectId::VERSION_INDEX {
                encode_version(Address64::new(self.version_index_ptr)?, &self.version_index)?
            } else {
                let object = self.objects.get(&written.object_id).ok_or_else(|| {
                    CoreError::invalid_operation(format!(
                        "{} left the workspace after prepare_commit",
                        written.object_id
                    ))
                })?;
                let prev = self
                    .version_index
                    .committed_ptr(written.object_id)
                    .unwrap_or(Address64::NULL);
                encode_version(prev, object)?
            };
            if expected != written.payload {
                return Err(CoreError::invalid_operation(format!(
                    "{} changed after prepare_commit",
                    written.object_id
                )));
            }
        }
        Ok(())
    }

    fn publish(&self, ctx: &CommitContext, record: &MetaCommitRecord) -> CoreResult<()> {
        let data_len = self.data_log.size()?;
        if data_len != ctx.base_tail() {
            return Err(CoreError::frame_corruption(
                data_len,
                format!("data log ends at {data_len}, expected {}", ctx.base_tail()),
            ));
        }

        if !ctx.staged_bytes().is_empty() {
            self.data_log.append_encoded(ctx.staged_bytes())?;
        }
        self.make_durable(&self.data_log)?;

        self.meta_log
            .append_frame(FrameTag::META_COMMIT, &record.to_bytes())?;
        self.make_durable(&self.meta_log)
    }

    fn make_durable(&self, log: &FrameLog) -> CoreResult<()> {
        if self.config.sync_on_commit {
            log.sync()
        } else {
            log.flush()
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Returns the epoch of the last successful commit (`0` = none).
    #[must_use]
    pub fn epoch_seq(&self) -> EpochSeq {
        self.epoch_seq
    }

    /// Returns the id the next created object will get.
    #[must_use]
    pub fn next_object_id(&self) -> ObjectId {
        self.next_object_id
    }

    /// Returns the committed length of the data log.
    #[must_use]
    pub fn data_tail(&self) -> u64 {
        self.data_tail
    }

    /// Returns the address of the committed version index (`0` = none).
    #[must_use]
    pub fn version_index_ptr(&self) -> u64 {
        self.version_index_ptr
    }

    /// Returns the committed version index.
    #[must_use]
    pub fn version_index(&self) -> &VersionIndex {
        &self.version_index
    }

    /// Returns the root object id (`0` = none).
    #[must_use]
    pub fn root_object_id(&self) -> ObjectId {
        self.root_object_id
    }

    /// Sets the root object id recorded by the next commit.
    pub fn set_root_object_id(&mut self, id: ObjectId) {
        self.root_object_id = id;
    }

    /// Returns `true` if a failed commit poisoned the workspace.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the journal directory, if the workspace was opened from one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(JournalDir::path)
    }
}

/// Encodes an object's pending diff as a version record.
fn encode_version(prev: Ptr64, object: &dyn DurableObject) -> CoreResult<Vec<u8>> {
    let mut diff = Vec::new();
    object.write_pending_diff(&mut diff)?;
    let mut payload = Vec::with_capacity(ObjectVersionRecord::PREFIX_SIZE + diff.len());
    ObjectVersionRecord::encode(prev, &diff, &mut payload);
    Ok(payload)
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("path", &self.path())
            .field("epoch_seq", &self.epoch_seq)
            .field("next_object_id", &self.next_object_id)
            .field("data_tail", &self.data_tail)
            .field("version_index_ptr", &self.version_index_ptr)
            .field("cached", &self.objects.len())
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
