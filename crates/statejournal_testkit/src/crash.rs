//! Crash recovery testing for StateJournal.
//!
//! This module simulates crashes at every interesting point of a commit
//! and checks that reopening the journal lands on a consistent epoch.
//!
//! ## Test Strategy
//!
//! 1. **Crash during data write** - torn frames must be cut off
//! 2. **Crash before the meta record** - the commit must not be visible
//! 3. **Crash during the meta write** - a torn meta frame must be ignored
//! 4. **Sync failure** - nothing may be published
//! 5. **Crash after the meta record** - the commit must survive
//!
//! Both logs of a journal share one [`CrashControl`], so a single byte
//! budget covers the whole commit sequence: data frames first, then the
//! meta record.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use statejournal_testkit::crash::{CrashRecoveryHarness, CrashPoint};
//!
//! let mut harness = CrashRecoveryHarness::new();
//! assert!(harness.test_crash_at(CrashPoint::DuringMetaWrite).passed);
//! ```

use statejournal_core::frame::frame_len;
use statejournal_core::{Config, CoreError, CoreResult, ObjectId, Value, Workspace};
use statejournal_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Points at which a crash can be simulated during a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// Crash half way through the data frames.
    DuringDataWrite,
    /// Crash after the data frames, before any meta byte.
    BeforeMetaWrite,
    /// Crash half way through the meta frame.
    DuringMetaWrite,
    /// Syncing the data log fails.
    DataSyncFailure,
    /// Crash right after the meta record is durable.
    AfterMetaWrite,
}

impl CrashPoint {
    /// Every crash point, in commit order.
    pub const ALL: [Self; 5] = [
        Self::DuringDataWrite,
        Self::BeforeMetaWrite,
        Self::DuringMetaWrite,
        Self::DataSyncFailure,
        Self::AfterMetaWrite,
    ];

    /// Returns a short description of the crash point.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::DuringDataWrite => "crash during data write",
            Self::BeforeMetaWrite => "crash before meta write",
            Self::DuringMetaWrite => "crash during meta write",
            Self::DataSyncFailure => "data sync failure",
            Self::AfterMetaWrite => "crash after meta write",
        }
    }

    /// Arms `control` for this point and returns the epoch recovery must
    /// land on (the baseline is epoch 1).
    fn arm(self, control: &CrashControl, size: CommitSize) -> u64 {
        match self {
            Self::DuringDataWrite => {
                control.arm(size.data_bytes / 2);
                1
            }
            Self::BeforeMetaWrite => {
                control.arm(size.data_bytes);
                1
            }
            Self::DuringMetaWrite => {
                control.arm(size.data_bytes + size.meta_bytes / 2);
                1
            }
            Self::DataSyncFailure => {
                control.set_fail_on_flush(true);
                1
            }
            Self::AfterMetaWrite => {
                control.arm(size.total());
                2
            }
        }
    }
}

/// Bytes one commit appends to each log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSize {
    /// Bytes of version frames.
    pub data_bytes: usize,
    /// Bytes of the meta frame.
    pub meta_bytes: usize,
}

impl CommitSize {
    /// Returns the bytes of the whole commit.
    #[must_use]
    pub fn total(self) -> usize {
        self.data_bytes + self.meta_bytes
    }
}

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// Description of what was tested.
    pub description: String,
    /// Epoch recovery should land on.
    pub expected_epoch: u64,
    /// Epoch recovery landed on.
    pub actual_epoch: u64,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Creates a passing result.
    pub fn pass(description: &str, epoch: u64) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            expected_epoch: epoch,
            actual_epoch: epoch,
            error: None,
        }
    }

    /// Creates a failing result.
    pub fn fail(description: &str, expected: u64, actual: u64, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            expected_epoch: expected,
            actual_epoch: actual,
            error: Some(error.to_string()),
        }
    }
}

/// Crash switches shared by every backend of one journal.
#[derive(Debug)]
pub struct CrashControl {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
}

impl CrashControl {
    /// Creates a control that never crashes.
    pub fn new() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
        }
    }

    /// Crashes once the total bytes written reach `bytes`.
    pub fn crash_after(&self, bytes: usize) {
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Crashes once `bytes` more bytes have been written.
    pub fn arm(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after(written.saturating_add(bytes));
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Resets the crash state.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.bytes_written.store(0, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_flush.store(false, Ordering::SeqCst);
    }

    /// Returns whether a crash has been simulated.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns the bytes written through every backend so far.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::SeqCst)
    }

    fn crash(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated crash during {what}"),
        ))
    }
}

impl Default for CrashControl {
    fn default() -> Self {
        Self::new()
    }
}

/// A storage backend wrapper that can simulate crashes.
///
/// Once crashed, every later write fails as well; reads keep working so
/// the surviving bytes can be inspected.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    control: Arc<CrashControl>,
}

impl CrashableBackend {
    /// Creates a crashable backend with its own control.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self::with_control(inner, Arc::new(CrashControl::new()))
    }

    /// Creates a crashable backend driven by a shared control.
    pub fn with_control(inner: Box<dyn StorageBackend>, control: Arc<CrashControl>) -> Self {
        Self { inner, control }
    }

    /// Returns the control of this backend.
    pub fn control(&self) -> Arc<CrashControl> {
        Arc::clone(&self.control)
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        if self.control.has_crashed() {
            return Err(self.control.crash("write after crash"));
        }

        let current = self
            .control
            .bytes_written
            .fetch_add(bytes.len(), Ordering::SeqCst);
        let crash_threshold = self.control.crash_after_bytes.load(Ordering::SeqCst);

        if current >= crash_threshold {
            return Err(self.control.crash("write"));
        }

        // Check if this write will cross the crash threshold
        if current + bytes.len() > crash_threshold {
            let partial_len = crash_threshold - current;
            // Write partial data up to crash point
            let _ = self.inner.append(&bytes[..partial_len]);
            return Err(self.control.crash("partial write"));
        }

        self.inner.append(bytes)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.control.fail_on_flush.load(Ordering::SeqCst) || self.control.has_crashed() {
            return Err(self.control.crash("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.control.fail_on_flush.load(Ordering::SeqCst) || self.control.has_crashed() {
            return Err(self.control.crash("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

/// Test harness for crash recovery scenarios.
///
/// Every scenario builds the same journal: epoch 1 holds one dict, and
/// the commit under test rewrites that dict and adds a second one that
/// points at it. After the crash the journal is reopened from whatever
/// bytes reached the backends.
#[derive(Debug, Default)]
pub struct CrashRecoveryHarness {
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
}

impl CrashRecoveryHarness {
    /// Creates a new crash recovery harness.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests recovery from one crash point.
    pub fn test_crash_at(&mut self, point: CrashPoint) -> CrashRecoveryResult {
        let description = point.description();
        let expected = match point {
            CrashPoint::AfterMetaWrite => 2,
            _ => 1,
        };
        let result = run_scenario(description, |control, size| point.arm(control, size))
            .map(|(result, _)| result)
            .unwrap_or_else(|e| CrashRecoveryResult::fail(description, expected, 0, &e.to_string()));

        self.results.push(result.clone());
        result
    }

    /// Tests every crash point.
    pub fn test_all_points(&mut self) -> Vec<CrashRecoveryResult> {
        CrashPoint::ALL
            .iter()
            .map(|&point| self.test_crash_at(point))
            .collect()
    }

    /// Crashes the commit after every possible byte count.
    ///
    /// Any prefix shorter than the whole commit must recover to epoch 1;
    /// the complete commit must recover to epoch 2.
    pub fn test_every_byte(&mut self) -> Vec<CrashRecoveryResult> {
        let probe = run_scenario("probe commit size", |control, size| {
            control.arm(size.total());
            2
        });
        let total = match probe {
            Ok((result, size)) => {
                self.results.push(result);
                size.total()
            }
            Err(e) => {
                let result = CrashRecoveryResult::fail("probe commit size", 2, 0, &e.to_string());
                self.results.push(result.clone());
                return vec![result];
            }
        };

        let mut results = Vec::with_capacity(total);
        for budget in 0..total {
            let description = format!("crash after {budget} of {total} commit bytes");
            let result = run_scenario(&description, |control, _| {
                control.arm(budget);
                1
            })
            .map(|(result, _)| result)
            .unwrap_or_else(|e| CrashRecoveryResult::fail(&description, 1, 0, &e.to_string()));
            self.results.push(result.clone());
            results.push(result);
        }
        results
    }

    /// Returns `true` if every recorded test passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Returns the failed results.
    pub fn failures(&self) -> Vec<&CrashRecoveryResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Runs the standard scenario. `arm` sets up the crash and returns the
/// epoch recovery must land on.
fn run_scenario<F>(description: &str, arm: F) -> CoreResult<(CrashRecoveryResult, CommitSize)>
where
    F: FnOnce(&CrashControl, CommitSize) -> u64,
{
    let data = InMemoryBackend::new();
    let meta = InMemoryBackend::new();
    let control = Arc::new(CrashControl::new());

    let mut ws = Workspace::open_with_backends(
        Config::default(),
        Box::new(CrashableBackend::with_control(
            Box::new(data.share()),
            Arc::clone(&control),
        )),
        Box::new(CrashableBackend::with_control(
            Box::new(meta.share()),
            Arc::clone(&control),
        )),
    )?;

    // Epoch 1: the baseline.
    let first = ws.create_dict();
    ws.load_dict(first)?.set(1, Value::Int(1))?;
    ws.load_dict(first)?.set(2, Value::Int(2))?;
    ws.commit()?;
    let before = ws.load_dict(first)?.entries()?;

    // Epoch 2: the commit under test.
    ws.load_dict(first)?.set(1, Value::Int(10))?;
    ws.load_dict(first)?.remove(2)?;
    let second = ws.create_dict();
    ws.load_dict(second)?.set(5, Value::ObjRef(first))?;
    let after = ws.load_dict(first)?.entries()?;

    let ctx = ws.prepare_commit()?;
    let record = ctx.build_meta_record(ws.root_object_id(), ws.next_object_id());
    let size = CommitSize {
        data_bytes: ctx.staged_bytes().len(),
        meta_bytes: frame_len(record.serialized_size()) as usize,
    };
    let expected = arm(&control, size);
    let committed = ws.finalize_commit(&ctx).is_ok();
    drop(ws);

    let mut ws = Workspace::open_with_backends(
        Config::default(),
        Box::new(data.share()),
        Box::new(meta.share()),
    )?;
    let actual = ws.epoch_seq().as_u64();

    let fail = |message: &str| -> CoreResult<(CrashRecoveryResult, CommitSize)> {
        Ok((
            CrashRecoveryResult::fail(description, expected, actual, message),
            size,
        ))
    };
    if committed && expected != 2 {
        return fail("commit reported success despite the crash");
    }
    if actual != expected {
        return fail("recovered the wrong epoch");
    }

    let expected_first = if expected == 2 { &after } else { &before };
    if ws.load_dict(first)?.entries()? != *expected_first {
        return fail("first dict does not match the recovered epoch");
    }
    let second_matches = match ws.load_dict(second) {
        Ok(dict) => expected == 2 && dict.entries()? == vec![(5, Value::ObjRef(first))],
        Err(CoreError::ObjectNotFound { .. }) => expected == 1,
        Err(e) => return Err(e),
    };
    if !second_matches {
        return fail("second dict does not match the recovered epoch");
    }

    // The recovered journal must accept the next commit.
    let probe = if expected == 2 { ObjectId::new(second.as_u64() + 1) } else { second };
    let id = ws.create_dict();
    if id != probe {
        return fail("object id allocation did not resume after the last commit");
    }
    ws.load_dict(first)?.set(99, Value::Int(99))?;
    ws.commit()?;
    if ws.epoch_seq().as_u64() != expected + 1 {
        return fail("first commit after recovery did not advance the epoch by one");
    }

    Ok((CrashRecoveryResult::pass(description, actual), size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crashable_backend_normal_operation() {
        let mut backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));

        let data = b"test data";
        let offset = backend.append(data).unwrap();
        backend.flush().unwrap();
        assert_eq!(backend.read_at(offset, data.len()).unwrap(), data);
        assert!(!backend.control().has_crashed());
    }

    #[test]
    fn crashable_backend_partial_write() {
        let inner = InMemoryBackend::new();
        let view = inner.share();
        let mut backend = CrashableBackend::new(Box::new(inner));
        backend.control().crash_after(10);

        backend.append(&[1u8; 6]).unwrap();
        assert!(backend.append(&[2u8; 10]).is_err());
        assert!(backend.control().has_crashed());
        assert_eq!(view.data(), vec![1, 1, 1, 1, 1, 1, 2, 2, 2, 2]);

        // nothing gets through after a crash
        assert!(backend.append(&[3u8]).is_err());
        assert!(backend.sync().is_err());
    }

    #[test]
    fn crashable_backend_fail_on_flush() {
        let mut backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
        backend.control().set_fail_on_flush(true);
        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());

        backend.control().reset();
        backend.sync().unwrap();
        assert!(!backend.control().has_crashed());
    }

    #[test]
    fn shared_control_counts_every_backend() {
        let control = Arc::new(CrashControl::new());
        let mut a = CrashableBackend::with_control(
            Box::new(InMemoryBackend::new()),
            Arc::clone(&control),
        );
        let mut b = CrashableBackend::with_control(
            Box::new(InMemoryBackend::new()),
            Arc::clone(&control),
        );

        a.append(&[0; 4]).unwrap();
        control.arm(2);
        assert!(b.append(&[0; 4]).is_err());
        assert!(control.has_crashed());
        assert_eq!(control.bytes_written(), 8);
    }

    #[test]
    fn every_crash_point_recovers() {
        let mut harness = CrashRecoveryHarness::new();
        for result in harness.test_all_points() {
            assert!(result.passed, "{}: {:?}", result.description, result.error);
        }
        assert!(harness.all_passed());
    }

    #[test]
    fn every_byte_of_a_commit_recovers() {
        let mut harness = CrashRecoveryHarness::new();
        let results = harness.test_every_byte();
        assert!(results.len() > 20);
        assert!(harness.all_passed(), "{:?}", harness.failures());
    }
}
