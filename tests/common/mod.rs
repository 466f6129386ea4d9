#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use learnql::{
    BinaryReader, BinaryWriter, Codec, FieldDescriptor, FieldRef, Record, Result, StorageConfig,
    StorageEngine,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: u64,
    pub name: String,
    pub department: String,
    pub age: u32,
    pub gpa: f64,
}

impl Student {
    pub const ID: FieldRef<Student, u64> = FieldRef::new("id", |s| s.id);
    pub const NAME: FieldRef<Student, String> = FieldRef::new("name", |s| s.name.clone());
    pub const DEPARTMENT: FieldRef<Student, String> =
        FieldRef::new("department", |s| s.department.clone());
    pub const AGE: FieldRef<Student, u32> = FieldRef::new("age", |s| s.age);
    pub const GPA: FieldRef<Student, f64> = FieldRef::new("gpa", |s| s.gpa);

    pub fn new(id: u64, name: &str, department: &str, age: u32, gpa: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            department: department.to_string(),
            age,
            gpa,
        }
    }
}

impl Codec for Student {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u64(self.id);
        writer.write_string(&self.name);
        writer.write_string(&self.department);
        writer.write_u32(self.age);
        writer.write_f64(self.gpa);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read_u64()?,
            name: reader.read_string()?,
            department: reader.read_string()?,
            age: reader.read_u32()?,
            gpa: reader.read_f64()?,
        })
    }
}

impl Record for Student {
    type Key = u64;

    fn primary_key(&self) -> u64 {
        self.id
    }

    fn type_name() -> &'static str {
        "Student"
    }

    fn field_descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("id", "u64", 0).primary_key(),
            FieldDescriptor::new("name", "String", 1),
            FieldDescriptor::new("department", "String", 2),
            FieldDescriptor::new("age", "u32", 3),
            FieldDescriptor::new("gpa", "f64", 4),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub code: String,
    pub title: String,
    pub credits: u32,
}

impl Course {
    pub const CODE: FieldRef<Course, String> = FieldRef::new("code", |c| c.code.clone());
    pub const TITLE: FieldRef<Course, String> = FieldRef::new("title", |c| c.title.clone());
    pub const CREDITS: FieldRef<Course, u32> = FieldRef::new("credits", |c| c.credits);

    pub fn new(code: &str, title: &str, credits: u32) -> Self {
        Self {
            code: code.to_string(),
            title: title.to_string(),
            credits,
        }
    }
}

impl Codec for Course {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_string(&self.code);
        writer.write_string(&self.title);
        writer.write_u32(self.credits);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            code: reader.read_string()?,
            title: reader.read_string()?,
            credits: reader.read_u32()?,
        })
    }
}

impl Record for Course {
    type Key = String;

    fn primary_key(&self) -> String {
        self.code.clone()
    }

    fn type_name() -> &'static str {
        "Course"
    }

    fn field_descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("code", "String", 0).primary_key(),
            FieldDescriptor::new("title", "String", 1),
            FieldDescriptor::new("credits", "u32", 2),
        ]
    }
}

/// Ten students: four in CS, three in Math, three in Physics; all names
/// and GPAs distinct.
pub fn sample_students() -> Vec<Student> {
    vec![
        Student::new(1001, "Alice Johnson", "CS", 20, 3.8),
        Student::new(1002, "Bob Smith", "Math", 22, 3.2),
        Student::new(1003, "Carol White", "CS", 21, 3.9),
        Student::new(1004, "David Brown", "Physics", 23, 2.9),
        Student::new(1005, "Eve Davis", "Math", 20, 3.5),
        Student::new(1006, "Frank Miller", "CS", 22, 2.7),
        Student::new(1007, "Grace Wilson", "Physics", 21, 3.6),
        Student::new(1008, "Henry Moore", "Math", 24, 3.1),
        Student::new(1009, "Iris Taylor", "CS", 20, 3.4),
        Student::new(1010, "Jack Anderson", "Physics", 22, 2.8),
    ]
}

/// Storage engine over a fresh file in a temp directory. The directory
/// guard must be kept alive for the duration of the test.
pub fn temp_storage() -> (TempDir, Rc<RefCell<StorageEngine>>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let engine = StorageEngine::open(&path, StorageConfig::default()).unwrap();
    (dir, Rc::new(RefCell::new(engine)))
}
