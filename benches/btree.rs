use std::{cell::RefCell, rc::Rc};

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use learnql::{BPlusTree, RecordId, StorageConfig, StorageEngine};
use tempfile::TempDir;

fn fresh_tree(dir: &TempDir) -> BPlusTree<u64, RecordId> {
    let path = dir.path().join("bench.db");
    let _ = std::fs::remove_file(&path);
    let storage = Rc::new(RefCell::new(
        StorageEngine::open(&path, StorageConfig::default()).unwrap(),
    ));
    BPlusTree::open(storage, 0).unwrap()
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("btree_insert_1k", |b| {
        b.iter_with_setup(
            || TempDir::new().unwrap(),
            |dir| {
                let mut tree = fresh_tree(&dir);
                for key in 0..1000u64 {
                    tree.insert(key, RecordId::new(key + 1, 0)).unwrap();
                }
                black_box(tree.size());
            },
        )
    });
}

fn bench_find(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut tree = fresh_tree(&dir);
    for key in 0..1000u64 {
        tree.insert(key, RecordId::new(key + 1, 0)).unwrap();
    }

    c.bench_function("btree_find_1k", |b| {
        b.iter(|| {
            for key in 0..1000u64 {
                black_box(tree.find(&key).unwrap());
            }
        })
    });
}

fn bench_sequential_scan(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut tree = fresh_tree(&dir);
    for key in 0..1000u64 {
        tree.insert(key, RecordId::new(key + 1, 0)).unwrap();
    }

    c.bench_function("btree_scan_1k", |b| {
        b.iter(|| {
            let mut cursor = tree.batch_cursor(64).unwrap();
            let mut total = 0usize;
            loop {
                let batch = cursor.next_batch().unwrap();
                if batch.is_empty() {
                    break;
                }
                total += batch.len();
            }
            black_box(total);
        })
    });
}

criterion_group!(benches, bench_insert, bench_find, bench_sequential_scan);
criterion_main!(benches);
