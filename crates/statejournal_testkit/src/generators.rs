//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data that keeps the
//! journal's invariants (aligned addresses, user object ids).

use proptest::prelude::*;
use statejournal_core::{Address64, EpochSeq, MetaCommitRecord, ObjectId, Value};

/// Strategy for generating user object ids.
pub fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    (ObjectId::MIN_USER.as_u64()..1 << 32).prop_map(ObjectId::new)
}

/// Strategy for generating valid, non-null data log addresses.
pub fn address_strategy() -> impl Strategy<Value = Address64> {
    (1u64..1 << 40).prop_filter_map("address must be aligned", |n| {
        Address64::new(n * Address64::ALIGNMENT).ok()
    })
}

/// Strategy for generating dict values of every wire type.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        4 => any::<i64>().prop_map(Value::Int),
        2 => object_id_strategy().prop_map(Value::ObjRef),
        1 => address_strategy().prop_map(Value::Ptr),
    ]
}

/// Strategy for generating meta commit records.
pub fn meta_record_strategy() -> impl Strategy<Value = MetaCommitRecord> {
    (
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
    )
        .prop_map(|(epoch, root, vi, tail, next)| MetaCommitRecord {
            epoch_seq: EpochSeq::new(epoch),
            root_object_id: ObjectId::new(root),
            version_index_ptr: vi,
            data_tail: tail,
            next_object_id: ObjectId::new(next),
        })
}

/// One step of a random workload against a single dict.
#[derive(Debug, Clone)]
pub enum DictOperation {
    /// Set a key
    Set {
        /// The key
        key: u64,
        /// The value
        value: Value,
    },
    /// Remove a key
    Remove {
        /// The key
        key: u64,
    },
    /// Commit the workspace
    Commit,
    /// Discard the dict's pending changes
    Discard,
}

/// Strategy for generating dict operations.
///
/// Keys come from a small range so sets and removes collide often.
pub fn dict_operation_strategy() -> impl Strategy<Value = DictOperation> {
    prop_oneof![
        6 => (0u64..16, value_strategy())
            .prop_map(|(key, value)| DictOperation::Set { key, value }),
        3 => (0u64..16).prop_map(|key| DictOperation::Remove { key }),
        2 => Just(DictOperation::Commit),
        1 => Just(DictOperation::Discard),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<DictOperation>> {
    prop::collection::vec(dict_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
