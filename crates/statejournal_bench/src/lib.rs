//! Benchmark utilities.

use rand::Rng;
use statejournal_core::{ObjectId, Value, Workspace};

/// Generate `count` random dict entries with keys below `key_space`.
pub fn random_entries(count: usize, key_space: u64) -> Vec<(u64, Value)> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| (rng.gen_range(0..key_space), Value::Int(rng.gen())))
        .collect()
}

/// Creates a workspace holding `objects` committed dicts of
/// `keys_per_object` entries each, and returns their ids.
pub fn populated_workspace(
    ws: &mut Workspace,
    objects: usize,
    keys_per_object: u64,
) -> Vec<ObjectId> {
    let mut ids = Vec::with_capacity(objects);
    for _ in 0..objects {
        let id = ws.create_dict();
        let dict = ws.load_dict(id).expect("new dict");
        for key in 0..keys_per_object {
            dict.set(key, Value::Int(key as i64)).expect("set");
        }
        ids.push(id);
    }
    ws.commit().expect("commit");
    ids
}
