mod common;

use common::{Student, sample_students, temp_storage};
use learnql::{DatabaseError, IndexKind, QueryExpr, Table};

fn student_table() -> (tempfile::TempDir, Table<Student>) {
    let (dir, storage) = temp_storage();
    let table = Table::open(storage, "students", 0).unwrap();
    (dir, table)
}

#[test]
fn test_insert_and_find() {
    let (_dir, mut table) = student_table();

    let alice = Student::new(1001, "Alice Johnson", "CS", 20, 3.8);
    table.insert(&alice).unwrap();

    assert_eq!(table.size(), 1);
    let found = table.find(&1001).unwrap().unwrap();
    assert_eq!(found, alice);
    assert!(table.contains(&1001).unwrap());
    assert!(!table.contains(&9999).unwrap());
}

#[test]
fn test_duplicate_primary_key_is_rejected() {
    let (_dir, mut table) = student_table();

    table
        .insert(&Student::new(1, "Alice", "CS", 20, 3.8))
        .unwrap();
    let result = table.insert(&Student::new(1, "Bob", "Math", 21, 3.0));

    assert!(matches!(result, Err(DatabaseError::DuplicateKey { .. })));
    assert_eq!(table.size(), 1);
    assert_eq!(table.find(&1).unwrap().unwrap().name, "Alice");
}

#[test]
fn test_update() {
    let (_dir, mut table) = student_table();

    let alice = Student::new(1, "Alice", "CS", 20, 3.8);
    table.insert(&alice).unwrap();

    let promoted = Student::new(1, "Alice", "CS", 21, 3.95);
    table.update(&promoted).unwrap();

    assert_eq!(table.find(&1).unwrap().unwrap(), promoted);
    assert_eq!(table.size(), 1);
}

#[test]
fn test_update_missing_record() {
    let (_dir, mut table) = student_table();
    let result = table.update(&Student::new(404, "Nobody", "CS", 20, 3.0));
    assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
}

#[test]
fn test_remove() {
    let (_dir, mut table) = student_table();

    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    assert!(table.remove(&1005).unwrap());
    assert!(!table.remove(&1005).unwrap());
    assert_eq!(table.size(), 9);
    assert_eq!(table.find(&1005).unwrap(), None);
}

#[test]
fn test_removed_page_is_recycled() {
    let (_dir, storage) = temp_storage();
    let mut table: Table<Student> = Table::open(storage.clone(), "students", 0).unwrap();

    table.insert(&Student::new(1, "A", "CS", 20, 3.0)).unwrap();
    let pages_before = storage.borrow().page_count();

    table.remove(&1).unwrap();
    table.insert(&Student::new(2, "B", "CS", 20, 3.0)).unwrap();

    // The freed data page is reused; the file does not grow.
    assert_eq!(storage.borrow().page_count(), pages_before);
}

#[test]
fn test_record_too_large() {
    let (_dir, mut table) = student_table();

    let oversized = Student::new(1, &"x".repeat(5000), "CS", 20, 3.0);
    let result = table.insert(&oversized);
    assert!(matches!(result, Err(DatabaseError::RecordTooLarge { .. })));
    assert_eq!(table.size(), 0);
}

#[test]
fn test_iteration_in_key_order() {
    let (_dir, mut table) = student_table();

    // Insert in scrambled order.
    let mut students = sample_students();
    students.reverse();
    students.swap(2, 7);
    for student in &students {
        table.insert(student).unwrap();
    }

    let mut cursor = table.iter().unwrap();
    let mut ids = Vec::new();
    while let Some(student) = cursor.next_record().unwrap() {
        ids.push(student.id);
    }
    assert_eq!(ids, (1001..=1010).collect::<Vec<u64>>());
}

#[test]
fn test_find_if_batched_filtering() {
    let (_dir, mut table) = student_table();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    let mut filtered = table.find_if(|s: &Student| s.department == "CS").unwrap();
    let batch = filtered.next_batch().unwrap();
    assert_eq!(batch.len(), 4);
    assert!(batch.iter().all(|s| s.department == "CS"));
    assert!(filtered.next_batch().unwrap().is_empty());
}

#[test]
fn test_where_expression() {
    let (_dir, mut table) = student_table();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    let young_cs = table
        .where_(Student::DEPARTMENT.eq("CS").and(Student::AGE.le(20u32)))
        .unwrap()
        .collect_all()
        .unwrap();
    let ids: Vec<u64> = young_cs.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1001, 1009]);

    let extremes = table
        .where_(Student::GPA.ge(3.9).or(Student::GPA.lt(2.8)))
        .unwrap()
        .collect_all()
        .unwrap();
    let ids: Vec<u64> = extremes.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1003, 1006]);
}

#[test]
fn test_unique_index_lookup() {
    let (_dir, mut table) = student_table();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    table.add_index(Student::NAME, IndexKind::Unique).unwrap();

    let grace = table
        .find_by(Student::NAME, &"Grace Wilson".to_string())
        .unwrap()
        .unwrap();
    assert_eq!(grace.id, 1007);

    assert_eq!(
        table.find_by(Student::NAME, &"Nobody".to_string()).unwrap(),
        None
    );
}

#[test]
fn test_unique_index_blocks_duplicate_field_value() {
    let (_dir, mut table) = student_table();
    table.add_index(Student::NAME, IndexKind::Unique).unwrap();

    table
        .insert(&Student::new(1, "Alice", "CS", 20, 3.8))
        .unwrap();
    let result = table.insert(&Student::new(2, "Alice", "Math", 21, 3.0));
    assert!(matches!(result, Err(DatabaseError::DuplicateKey { .. })));

    // Best-effort failure mode: the primary entry exists until the caller
    // removes it.
    assert!(table.contains(&2).unwrap());
    assert!(table.remove(&2).unwrap());
    assert_eq!(table.size(), 1);
}

#[test]
fn test_index_backfill_covers_existing_records() {
    let (_dir, mut table) = student_table();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    // Index added after the fact sees the existing rows.
    table
        .add_index(Student::DEPARTMENT, IndexKind::MultiValue)
        .unwrap();

    let cs = table
        .find_all_by(Student::DEPARTMENT, &"CS".to_string())
        .unwrap();
    assert_eq!(cs.len(), 4);
}

#[test]
fn test_indexes_follow_mutations() {
    let (_dir, mut table) = student_table();
    table
        .add_index(Student::DEPARTMENT, IndexKind::MultiValue)
        .unwrap();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    table.remove(&1001).unwrap();
    assert_eq!(
        table
            .find_all_by(Student::DEPARTMENT, &"CS".to_string())
            .unwrap()
            .len(),
        3
    );

    // Move a student between departments.
    let moved = Student::new(1003, "Carol White", "Physics", 21, 3.9);
    table.update(&moved).unwrap();
    assert_eq!(
        table
            .find_all_by(Student::DEPARTMENT, &"CS".to_string())
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        table
            .find_all_by(Student::DEPARTMENT, &"Physics".to_string())
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn test_unique_values() {
    let (_dir, mut table) = student_table();
    table
        .add_index(Student::DEPARTMENT, IndexKind::MultiValue)
        .unwrap();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    let departments = table.unique_values(Student::DEPARTMENT).unwrap();
    assert_eq!(departments, vec!["CS", "Math", "Physics"]);
}

#[test]
fn test_range_query_on_gpa() {
    let (_dir, mut table) = student_table();
    table.add_index(Student::GPA, IndexKind::Unique).unwrap();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    let strong = table.range_query(Student::GPA, &3.5, &4.0).unwrap();
    let mut ids: Vec<u64> = strong.iter().map(|s| s.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1001, 1003, 1005, 1007]);
    assert!(strong.iter().all(|s| s.gpa >= 3.5 && s.gpa <= 4.0));
}

#[test]
fn test_drop_index() {
    let (_dir, mut table) = student_table();
    table.add_index(Student::NAME, IndexKind::Unique).unwrap();
    table
        .insert(&Student::new(1, "Alice", "CS", 20, 3.8))
        .unwrap();

    assert!(table.drop_index("name").unwrap());
    assert!(!table.drop_index("name").unwrap());

    // Without the index the lookup finds nothing.
    assert_eq!(
        table.find_by(Student::NAME, &"Alice".to_string()).unwrap(),
        None
    );
}

#[test]
fn test_clear() {
    let (_dir, mut table) = student_table();
    for student in sample_students() {
        table.insert(&student).unwrap();
    }

    table.clear().unwrap();
    assert_eq!(table.size(), 0);
    assert_eq!(table.find(&1001).unwrap(), None);

    // The table stays usable after clear.
    table
        .insert(&Student::new(1, "Fresh", "CS", 18, 4.0))
        .unwrap();
    assert_eq!(table.size(), 1);
}
