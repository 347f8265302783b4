//! Benchmarks for the in-memory group store.

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use arbordb_core::catalog::{Group, GroupBuilder, IndexDef};
use arbordb_core::{Field, Value, ValueType};
use arbordb_storage::{GroupStore, MemoryStore, SeekMode, SeekTarget};

fn group() -> Arc<Group> {
    GroupBuilder::new("bench")
        .root("parent", vec![Field::not_null("pid", ValueType::Int), Field::new("tag", ValueType::Int)], &["pid"])
        .child(
            "child",
            "parent",
            vec![Field::not_null("cid", ValueType::Int), Field::new("pid", ValueType::Int)],
            &["cid"],
            &["pid"],
        )
        .build()
        .unwrap()
}

fn populated(parents: i64, children_per_parent: i64) -> (MemoryStore, Arc<IndexDef>) {
    let group = group();
    let index = IndexDef::table(&group, "parent_tag", "parent", &["tag"]).unwrap();
    let mut store = MemoryStore::new(group);
    store.add_index(Arc::clone(&index)).unwrap();
    let mut rows = Vec::new();
    for p in 0..parents {
        rows.push(("parent", vec![Value::Int(p), Value::Int(p % 17)]));
        for c in 0..children_per_parent {
            rows.push(("child", vec![Value::Int(p * children_per_parent + c), Value::Int(p)]));
        }
    }
    store.insert_all(rows).unwrap();
    (store, index)
}

/// Benchmark snapshot construction.
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_build");

    for size in [100i64, 1000] {
        group.throughput(Throughput::Elements((size * 5) as u64));
        group.bench_function(format!("build_{size}"), |b| {
            b.iter_batched(|| (), |()| black_box(populated(size, 4)), BatchSize::SmallInput);
        });
    }

    group.finish();
}

/// Benchmark a full group scan.
fn bench_group_scan(c: &mut Criterion) {
    let (store, _) = populated(1000, 4);
    let mut group = c.benchmark_group("memory_group_scan");
    group.throughput(Throughput::Elements(store.row_count() as u64));

    group.bench_function("scan_all", |b| {
        b.iter(|| {
            let mut cursor = store.group_cursor().unwrap();
            let mut count = 0usize;
            while cursor.next().unwrap().is_some() {
                count += 1;
            }
            black_box(count)
        });
    });

    group.finish();
}

/// Benchmark index prefix seeks.
fn bench_index_seek(c: &mut Criterion) {
    let (store, index) = populated(1000, 4);
    let mut group = c.benchmark_group("memory_index_seek");
    group.throughput(Throughput::Elements(1));

    group.bench_function("seek_at_or_after", |b| {
        let mut cursor = store.index_cursor(&index).unwrap();
        let mut tag = 0i64;
        b.iter(|| {
            tag = (tag + 1) % 17;
            let key = [Value::Int(tag)];
            black_box(cursor.seek(SeekTarget::Key(&key), SeekMode::AtOrAfter).unwrap())
        });
    });

    group.bench_function("seek_at_or_before", |b| {
        let mut cursor = store.index_cursor(&index).unwrap();
        let mut tag = 0i64;
        b.iter(|| {
            tag = (tag + 1) % 17;
            let key = [Value::Int(tag)];
            black_box(cursor.seek(SeekTarget::Key(&key), SeekMode::AtOrBefore).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_group_scan, bench_index_seek);
criterion_main!(benches);
