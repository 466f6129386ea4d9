mod common;

use common::temp_storage;
use learnql::{BPlusTree, RecordId};

fn rid(page_id: u64) -> RecordId {
    RecordId::new(page_id, 0)
}

fn populated_tree(count: u64) -> (tempfile::TempDir, BPlusTree<u64, RecordId>) {
    let (dir, storage) = temp_storage();
    let mut tree = BPlusTree::open(storage, 0).unwrap();
    for key in 1..=count {
        tree.insert(key, rid(key)).unwrap();
    }
    (dir, tree)
}

#[test]
fn test_cursor_visits_keys_in_ascending_order() {
    let (_dir, mut tree) = populated_tree(35);
    let mut cursor = tree.batch_cursor(10).unwrap();

    let mut seen = Vec::new();
    while cursor.has_more() {
        let batch = cursor.next_batch().unwrap();
        seen.extend(batch.into_iter().map(|(k, _)| k));
    }

    assert_eq!(seen, (1..=35).collect::<Vec<u64>>());
}

#[test]
fn test_cursor_batch_sizes() {
    let (_dir, mut tree) = populated_tree(25);
    let mut cursor = tree.batch_cursor(10).unwrap();

    let first = cursor.next_batch().unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].0, 1);
    assert_eq!(first[9].0, 10);

    let second = cursor.next_batch().unwrap();
    assert_eq!(second.len(), 10);
    assert_eq!(second[0].0, 11);

    let third = cursor.next_batch().unwrap();
    assert_eq!(third.len(), 5);
    assert!(!cursor.has_more());
}

#[test]
fn test_cursor_on_empty_tree() {
    let (_dir, storage) = temp_storage();
    let mut tree: BPlusTree<u64, RecordId> = BPlusTree::open(storage, 0).unwrap();

    let mut cursor = tree.batch_cursor(10).unwrap();
    assert!(cursor.next_batch().unwrap().is_empty());
    assert!(!cursor.has_more());
}

#[test]
fn test_cursor_exhaustion_is_sticky() {
    let (_dir, mut tree) = populated_tree(3);
    let mut cursor = tree.batch_cursor(10).unwrap();

    assert_eq!(cursor.next_batch().unwrap().len(), 3);
    assert!(!cursor.has_more());
    assert!(cursor.next_batch().unwrap().is_empty());
    assert!(cursor.next_batch().unwrap().is_empty());
}

#[test]
fn test_cursor_reset() {
    let (_dir, mut tree) = populated_tree(12);
    let mut cursor = tree.batch_cursor(5).unwrap();

    while cursor.has_more() {
        cursor.next_batch().unwrap();
    }
    assert!(!cursor.has_more());

    cursor.reset().unwrap();
    assert!(cursor.has_more());
    let batch = cursor.next_batch().unwrap();
    assert_eq!(batch[0].0, 1);
}

#[test]
fn test_cursor_sees_unflushed_mutations() {
    let (_dir, storage) = temp_storage();
    let mut tree: BPlusTree<u64, RecordId> = BPlusTree::open(storage, 0).unwrap();

    // No flush between inserts and iteration: the cursor reads through
    // the node cache.
    for key in 1..=8u64 {
        tree.insert(key, rid(key)).unwrap();
    }

    let mut cursor = tree.batch_cursor(3).unwrap();
    let mut seen = Vec::new();
    while cursor.has_more() {
        seen.extend(cursor.next_batch().unwrap().into_iter().map(|(k, _)| k));
    }
    assert_eq!(seen, (1..=8).collect::<Vec<u64>>());
}

#[test]
fn test_batch_size_of_one() {
    let (_dir, mut tree) = populated_tree(4);
    let mut cursor = tree.batch_cursor(1).unwrap();

    for expected in 1..=4u64 {
        let batch = cursor.next_batch().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].0, expected);
    }
    assert!(!cursor.has_more());
}
