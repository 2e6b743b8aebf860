//! Throughput benchmarks for the single-document CRUD path and
//! explicit multi-document transactions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docdb_engine::Database;
use tempfile::TempDir;

fn open_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open("bench", dir.path()).unwrap();
    (dir, db)
}

fn bench_create(c: &mut Criterion) {
    let (_dir, db) = open_db();
    let mut doc_id = 0u64;
    c.bench_function("create_document", |b| {
        b.iter(|| {
            doc_id += 1;
            db.create("_default", doc_id, br#"{"a":1,"b":2}"#).unwrap();
        })
    });
}

fn bench_get(c: &mut Criterion) {
    let (_dir, db) = open_db();
    for i in 0..1000u64 {
        db.create("_default", i, br#"{"a":1}"#).unwrap();
    }
    c.bench_function("get_document", |b| {
        b.iter(|| black_box(db.get("_default", 500).unwrap()))
    });
}

fn bench_patch(c: &mut Criterion) {
    let (_dir, db) = open_db();
    db.create("_default", 1, br#"{"counter":0}"#).unwrap();
    let path = docdb_core::JsonPath::parse("/counter").unwrap();
    c.bench_function("patch_document", |b| {
        b.iter(|| {
            let patch = docdb_core::JsonPatch::new().set(path.clone(), serde_json::json!(1));
            db.patch("_default", 1, &patch).unwrap();
        })
    });
}

fn bench_transaction_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("explicit_transaction");
    for &size in &[1usize, 4, 16, 64] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (_dir, db) = open_db();
            let mut base = 0u64;
            b.iter(|| {
                let tx = db.begin_transaction();
                for i in 0..size as u64 {
                    db.tx_create(&tx, "_default", base + i, br#"{"v":1}"#).unwrap();
                }
                db.commit(tx).unwrap();
                base += size as u64;
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_create, bench_get, bench_patch, bench_transaction_size);
criterion_main!(benches);
