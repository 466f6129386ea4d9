mod common;

use common::{Student, temp_storage};
use learnql::{CompositeKey, MultiValueIndex, RecordId, UniqueIndex};
use learnql::index::SecondaryIndex;

fn rid(page_id: u64) -> RecordId {
    RecordId::new(page_id, 0)
}

fn name_index(
    storage: std::rc::Rc<std::cell::RefCell<learnql::StorageEngine>>,
) -> UniqueIndex<Student, String> {
    UniqueIndex::open("name", |s: &Student| s.name.clone(), storage, 0).unwrap()
}

fn department_index(
    storage: std::rc::Rc<std::cell::RefCell<learnql::StorageEngine>>,
) -> MultiValueIndex<Student, String> {
    MultiValueIndex::open("department", |s: &Student| s.department.clone(), storage, 0).unwrap()
}

#[test]
fn test_unique_index_insert_and_find() {
    let (_dir, storage) = temp_storage();
    let mut index = name_index(storage);

    let alice = Student::new(1, "Alice", "CS", 20, 3.8);
    assert!(index.insert_record(&alice, rid(10)).unwrap());

    assert_eq!(index.find(&"Alice".to_string()).unwrap(), Some(rid(10)));
    assert_eq!(index.find(&"Bob".to_string()).unwrap(), None);
    assert!(index.is_unique());
    assert_eq!(index.field_name(), "name");
}

#[test]
fn test_unique_index_rejects_duplicate_value() {
    let (_dir, storage) = temp_storage();
    let mut index = name_index(storage);

    let first = Student::new(1, "Alice", "CS", 20, 3.8);
    let second = Student::new(2, "Alice", "Math", 21, 3.0);

    assert!(index.insert_record(&first, rid(10)).unwrap());
    assert!(!index.insert_record(&second, rid(20)).unwrap());

    // The original mapping is untouched.
    assert_eq!(index.find(&"Alice".to_string()).unwrap(), Some(rid(10)));
}

#[test]
fn test_unique_index_update() {
    let (_dir, storage) = temp_storage();
    let mut index = name_index(storage);

    let old = Student::new(1, "Alice", "CS", 20, 3.8);
    index.insert_record(&old, rid(10)).unwrap();

    // Unchanged field value: no-op, reports success.
    let same = Student::new(1, "Alice", "Math", 21, 3.9);
    assert!(index.update_record(&old, &same, rid(10)).unwrap());
    assert_eq!(index.find(&"Alice".to_string()).unwrap(), Some(rid(10)));

    // Changed field value: old entry replaced by new.
    let renamed = Student::new(1, "Alicia", "CS", 20, 3.8);
    assert!(index.update_record(&old, &renamed, rid(10)).unwrap());
    assert_eq!(index.find(&"Alice".to_string()).unwrap(), None);
    assert_eq!(index.find(&"Alicia".to_string()).unwrap(), Some(rid(10)));
}

#[test]
fn test_unique_index_update_detects_missing_old_entry() {
    let (_dir, storage) = temp_storage();
    let mut index = name_index(storage);

    let never_inserted = Student::new(1, "Ghost", "CS", 20, 3.0);
    let renamed = Student::new(1, "Phantom", "CS", 20, 3.0);

    // Removing the absent old value fails; nothing is inserted.
    assert!(!index.update_record(&never_inserted, &renamed, rid(10)).unwrap());
    assert_eq!(index.find(&"Phantom".to_string()).unwrap(), None);
}

#[test]
fn test_unique_index_remove_and_range() {
    let (_dir, storage) = temp_storage();
    let mut index = name_index(storage);

    for (i, name) in ["Alice", "Bob", "Carol", "Dave", "Eve"].iter().enumerate() {
        let student = Student::new(i as u64, name, "CS", 20, 3.0);
        index.insert_record(&student, rid(i as u64 + 1)).unwrap();
    }

    assert!(index.remove_by_value(&"Carol".to_string()).unwrap());
    assert!(!index.remove_by_value(&"Carol".to_string()).unwrap());

    let rids = index
        .range(&"Alice".to_string(), &"Dave".to_string())
        .unwrap();
    assert_eq!(rids, vec![rid(1), rid(2), rid(4)]);
}

#[test]
fn test_multi_value_index_groups_by_value() {
    let (_dir, storage) = temp_storage();
    let mut index = department_index(storage);

    for student in common::sample_students() {
        let page = student.id - 1000;
        assert!(index.insert_record(&student, rid(page)).unwrap());
    }

    let cs = index.find(&"CS".to_string()).unwrap();
    assert_eq!(cs.len(), 4);
    assert_eq!(cs, vec![rid(1), rid(3), rid(6), rid(9)]);

    assert_eq!(index.count(&"Math".to_string()).unwrap(), 3);
    assert_eq!(index.count(&"Physics".to_string()).unwrap(), 3);
    assert_eq!(index.count(&"Biology".to_string()).unwrap(), 0);
    assert!(index.contains(&"CS".to_string()).unwrap());
    assert!(!index.contains(&"Biology".to_string()).unwrap());
}

#[test]
fn test_multi_value_index_unique_values_sorted() {
    let (_dir, storage) = temp_storage();
    let mut index = department_index(storage);

    for student in common::sample_students() {
        index.insert_record(&student, rid(student.id - 1000)).unwrap();
    }

    let values = index.unique_values().unwrap();
    assert_eq!(values, vec!["CS", "Math", "Physics"]);
}

#[test]
fn test_multi_value_index_remove_specific_record() {
    let (_dir, storage) = temp_storage();
    let mut index = department_index(storage);

    let a = Student::new(1, "A", "CS", 20, 3.0);
    let b = Student::new(2, "B", "CS", 21, 3.1);
    index.insert_record(&a, rid(1)).unwrap();
    index.insert_record(&b, rid(2)).unwrap();

    assert!(index.remove_record(&a, rid(1)).unwrap());
    assert_eq!(index.find(&"CS".to_string()).unwrap(), vec![rid(2)]);
}

#[test]
fn test_multi_value_index_remove_all() {
    let (_dir, storage) = temp_storage();
    let mut index = department_index(storage);

    for student in common::sample_students() {
        index.insert_record(&student, rid(student.id - 1000)).unwrap();
    }

    assert_eq!(index.remove_all(&"CS".to_string()).unwrap(), 4);
    assert_eq!(index.count(&"CS".to_string()).unwrap(), 0);
    assert_eq!(index.count(&"Math".to_string()).unwrap(), 3);
}

#[test]
fn test_multi_value_index_update_moves_entry() {
    let (_dir, storage) = temp_storage();
    let mut index = department_index(storage);

    let old = Student::new(1, "A", "CS", 20, 3.0);
    index.insert_record(&old, rid(1)).unwrap();

    let moved = Student::new(1, "A", "Math", 20, 3.0);
    assert!(index.update_record(&old, &moved, rid(1)).unwrap());

    assert!(index.find(&"CS".to_string()).unwrap().is_empty());
    assert_eq!(index.find(&"Math".to_string()).unwrap(), vec![rid(1)]);
}

#[test]
fn test_secondary_index_batch_cursor() {
    let (_dir, storage) = temp_storage();
    let mut index = name_index(storage);

    for (i, name) in ["Eve", "Alice", "Dave", "Bob", "Carol"].iter().enumerate() {
        let student = Student::new(i as u64, name, "CS", 20, 3.0);
        index.insert_record(&student, rid(i as u64 + 1)).unwrap();
    }

    let mut cursor = index.batch_cursor(2).unwrap();
    let mut names = Vec::new();
    loop {
        let batch = cursor.next_batch().unwrap();
        if batch.is_empty() {
            break;
        }
        names.extend(batch.into_iter().map(|(name, _)| name));
    }
    assert_eq!(names, vec!["Alice", "Bob", "Carol", "Dave", "Eve"]);
}

#[test]
fn test_composite_key_ordering() {
    let a = CompositeKey::new("CS".to_string(), 1);
    let b = CompositeKey::new("CS".to_string(), 2);
    let c = CompositeKey::new("Math".to_string(), 1);

    assert!(a < b);
    assert!(b < c);
    assert!(a < c);
}

#[test]
fn test_multi_value_entries_are_contiguous() {
    let (_dir, storage) = temp_storage();
    let mut index = department_index(storage);

    for student in common::sample_students() {
        index.insert_record(&student, rid(student.id - 1000)).unwrap();
    }

    // get_all is sorted by composite key, so equal field values form one
    // contiguous run.
    let fields: Vec<String> = index.get_all().unwrap().into_iter().map(|(f, _)| f).collect();
    let mut deduped = fields.clone();
    deduped.dedup();
    assert_eq!(deduped, vec!["CS", "Math", "Physics"]);
}
