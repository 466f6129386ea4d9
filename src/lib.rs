//! LearnQL: an embedded, single-file, typed database library.
//!
//! The core is a fixed-size paged storage engine with a free list and page
//! cache, a disk-resident B+tree used for both primary and secondary
//! indexes, typed tables over user record types, a self-describing system
//! catalog, and a small typed predicate DSL.
//!
//! ```no_run
//! use learnql::{Database, IndexKind};
//! # use learnql::{BinaryReader, BinaryWriter, Codec, FieldDescriptor, FieldRef, Record, Result};
//! # #[derive(Clone)]
//! # struct Student { id: u64, name: String }
//! # impl Student {
//! #     const NAME: FieldRef<Student, String> = FieldRef::new("name", |s| s.name.clone());
//! # }
//! # impl Codec for Student {
//! #     fn encode(&self, w: &mut BinaryWriter) { w.write_u64(self.id); w.write_string(&self.name); }
//! #     fn decode(r: &mut BinaryReader<'_>) -> Result<Self> {
//! #         Ok(Self { id: r.read_u64()?, name: r.read_string()? })
//! #     }
//! # }
//! # impl Record for Student {
//! #     type Key = u64;
//! #     fn primary_key(&self) -> u64 { self.id }
//! #     fn type_name() -> &'static str { "Student" }
//! #     fn field_descriptors() -> Vec<FieldDescriptor> { Vec::new() }
//! # }
//!
//! # fn main() -> learnql::Result<()> {
//! let mut db = Database::open("school.db")?;
//! let students = db.table::<Student>("students")?;
//! students.borrow_mut().add_index(Student::NAME, IndexKind::Unique)?;
//! students.borrow_mut().insert(&Student { id: 1001, name: "Alice".into() })?;
//! let _alice = students.borrow_mut().find_by(Student::NAME, &"Alice".to_string())?;
//! db.flush()?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod codec;
pub mod database;
pub mod index;
pub mod query;
pub mod storage;
pub mod table;
pub mod types;

pub use catalog::{FieldMeta, IndexMeta, SystemCatalog, TableMeta};
pub use codec::{BinaryReader, BinaryWriter, Codec, FieldDescriptor, Record};
pub use database::Database;
pub use index::{BPlusTree, BatchCursor, CompositeKey, IndexKind, MultiValueIndex, UniqueIndex};
pub use query::{FieldRef, QueryExpr};
pub use storage::{StorageConfig, StorageEngine};
pub use table::{ReadOnlyTable, Table};
pub use types::{
    error::{DatabaseError, Result},
    page::{Page, PageType},
    record_id::RecordId,
};
