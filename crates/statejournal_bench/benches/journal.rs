//! Workspace benchmarks: commits, reopening and chain replay.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use statejournal_bench::{populated_workspace, random_entries};
use statejournal_core::{Config, Value, Workspace};
use statejournal_storage::InMemoryBackend;

/// Benchmark committing one dict with a growing number of changed keys.
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");

    for changes in [1usize, 16, 256].iter() {
        group.throughput(Throughput::Elements(*changes as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(changes),
            changes,
            |b, &changes| {
                let mut ws = Workspace::open_in_memory().unwrap();
                let id = ws.create_dict();
                ws.commit().unwrap();
                let entries = random_entries(changes, 4096);

                b.iter(|| {
                    let dict = ws.load_dict(id).unwrap();
                    for (key, value) in &entries {
                        dict.set(*key, *value).unwrap();
                    }
                    black_box(ws.commit().unwrap());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark a commit touching many objects at once.
fn bench_commit_many_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_many_objects");

    for objects in [10usize, 100].iter() {
        group.throughput(Throughput::Elements(*objects as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(objects),
            objects,
            |b, &objects| {
                let mut ws = Workspace::open_in_memory().unwrap();
                let ids = populated_workspace(&mut ws, objects, 4);
                let mut round = 0i64;

                b.iter(|| {
                    round += 1;
                    for id in &ids {
                        ws.load_dict(*id).unwrap().set(0, Value::Int(round)).unwrap();
                    }
                    black_box(ws.commit().unwrap());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark recovery plus replay of one long version chain.
fn bench_reopen_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("reopen_chain");

    for commits in [10u64, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(commits),
            commits,
            |b, &commits| {
                let data = InMemoryBackend::new();
                let meta = InMemoryBackend::new();
                let config = Config::default().sync_on_commit(false);
                {
                    let mut ws = Workspace::open_with_backends(
                        config.clone(),
                        Box::new(data.share()),
                        Box::new(meta.share()),
                    )
                    .unwrap();
                    let id = ws.create_dict();
                    for i in 0..commits {
                        ws.load_dict(id).unwrap().set(i % 64, Value::Int(i as i64)).unwrap();
                        ws.commit().unwrap();
                    }
                }

                b.iter(|| {
                    let ws = Workspace::open_with_backends(
                        config.clone(),
                        Box::new(data.share()),
                        Box::new(meta.share()),
                    )
                    .unwrap();
                    black_box(ws.epoch_seq());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark commits that reach the disk.
fn bench_file_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_commit");
    group.sample_size(20);

    for sync in [false, true].iter() {
        let name = if *sync { "sync" } else { "flush" };
        group.bench_function(name, |b| {
            let temp = tempfile::tempdir().unwrap();
            let config = Config::default().sync_on_commit(*sync);
            let mut ws = Workspace::open_with_config(&temp.path().join("journal"), config).unwrap();
            let id = ws.create_dict();
            let mut i = 0i64;

            b.iter(|| {
                i += 1;
                ws.load_dict(id).unwrap().set(1, Value::Int(i)).unwrap();
                black_box(ws.commit().unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_commit,
    bench_commit_many_objects,
    bench_reopen_chain,
    bench_file_commit,
);

criterion_main!(benches);
