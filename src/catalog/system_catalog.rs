use std::{cell::RefCell, rc::Rc};

use tracing::debug;

use crate::{
    catalog::{
        SYS_FIELDS, SYS_INDEXES, SYS_TABLES,
        meta::{FieldMeta, IndexMeta, TableMeta},
    },
    storage::StorageEngine,
    table::ReadOnlyTable,
    types::{
        PageId,
        error::{DatabaseError, Result},
    },
};

/// The system catalog: three reserved tables holding table, field, and
/// index metadata, stored with the same page/B+tree machinery as user
/// tables and queryable through the same DSL.
///
/// Users see only the read-only views; mutation happens through the
/// `pub(crate)` API invoked by table CRUD and DDL paths. The catalog's own
/// tables carry no catalog back-reference, which breaks the bootstrap
/// cycle.
pub struct SystemCatalog {
    storage: Rc<RefCell<StorageEngine>>,
    tables: ReadOnlyTable<TableMeta>,
    fields: ReadOnlyTable<FieldMeta>,
    indexes: ReadOnlyTable<IndexMeta>,
    next_field_id: u64,
    next_index_id: u64,
}

impl SystemCatalog {
    /// Opens the catalog over the three persisted roots (0 allocates a
    /// fresh tree). Auto-increment counters resume from the maximum ids
    /// already on disk.
    pub(crate) fn open(
        storage: Rc<RefCell<StorageEngine>>,
        tables_root: PageId,
        fields_root: PageId,
        indexes_root: PageId,
    ) -> Result<Self> {
        let tables: ReadOnlyTable<TableMeta> =
            ReadOnlyTable::open(storage.clone(), SYS_TABLES, tables_root)?;
        let fields: ReadOnlyTable<FieldMeta> =
            ReadOnlyTable::open(storage.clone(), SYS_FIELDS, fields_root)?;
        let indexes: ReadOnlyTable<IndexMeta> =
            ReadOnlyTable::open(storage.clone(), SYS_INDEXES, indexes_root)?;

        let next_field_id = fields
            .all()?
            .iter()
            .map(|f| f.field_id)
            .max()
            .unwrap_or(0)
            + 1;
        let next_index_id = indexes
            .all()?
            .iter()
            .map(|i| i.index_id)
            .max()
            .unwrap_or(0)
            + 1;

        Ok(Self {
            storage,
            tables,
            fields,
            indexes,
            next_field_id,
            next_index_id,
        })
    }

    /// Read-only view of `_sys_tables`.
    pub fn tables(&self) -> &ReadOnlyTable<TableMeta> {
        &self.tables
    }

    /// Read-only view of `_sys_fields`.
    pub fn fields(&self) -> &ReadOnlyTable<FieldMeta> {
        &self.fields
    }

    /// Read-only view of `_sys_indexes`.
    pub fn indexes(&self) -> &ReadOnlyTable<IndexMeta> {
        &self.indexes
    }

    /// Registers a table and its fields. Field ids are assigned here.
    pub(crate) fn register_table(
        &mut self,
        meta: TableMeta,
        field_metas: Vec<FieldMeta>,
    ) -> Result<()> {
        if self.tables.contains(&meta.table_name)? {
            return Err(DatabaseError::DuplicateKey {
                key: meta.table_name,
                context: format!("table '{}'", SYS_TABLES),
            });
        }

        debug!(table = %meta.table_name, system = meta.is_system_table, "registering table");
        self.tables.internal().insert(&meta)?;

        for mut field_meta in field_metas {
            field_meta.field_id = self.next_field_id;
            self.next_field_id += 1;
            self.fields.internal().insert(&field_meta)?;
        }

        self.persist_roots()
    }

    /// Removes the table row and every field row carrying its name.
    pub(crate) fn unregister_table(&mut self, table_name: &str) -> Result<()> {
        self.tables.internal().remove(&table_name.to_string())?;

        let all_fields = self.fields.all()?;
        for field in all_fields {
            if field.table_name == table_name {
                self.fields.internal().remove(&field.field_id)?;
            }
        }

        self.persist_roots()
    }

    /// Idempotent; silently ignores unregistered names so system-table
    /// bootstrap can proceed.
    pub(crate) fn update_record_count(&mut self, table_name: &str, count: u64) -> Result<()> {
        let meta = self.tables.find(&table_name.to_string())?;
        let Some(mut meta) = meta else {
            return Ok(());
        };

        if meta.record_count != count {
            meta.record_count = count;
            self.tables.internal().update(&meta)?;
            self.persist_roots()?;
        }
        Ok(())
    }

    /// Keeps `_sys_tables.index_root_page` current after primary-root
    /// splits; silent no-op for unregistered names.
    pub(crate) fn update_table_root(&mut self, table_name: &str, root: PageId) -> Result<()> {
        let meta = self.tables.find(&table_name.to_string())?;
        let Some(mut meta) = meta else {
            return Ok(());
        };

        if meta.index_root_page != root {
            meta.index_root_page = root;
            self.tables.internal().update(&meta)?;
            self.persist_roots()?;
        }
        Ok(())
    }

    pub(crate) fn register_index(
        &mut self,
        table_name: &str,
        field_name: &str,
        field_type: &str,
        is_unique: bool,
        root_page_id: PageId,
    ) -> Result<u64> {
        let index_id = self.next_index_id;
        self.next_index_id += 1;

        let meta = IndexMeta {
            index_id,
            table_name: table_name.to_string(),
            field_name: field_name.to_string(),
            field_type: field_type.to_string(),
            is_unique,
            index_root_page: root_page_id,
            created_timestamp: chrono::Utc::now().timestamp() as u64,
            is_active: true,
        };

        debug!(table = table_name, field = field_name, unique = is_unique, "registering index");
        self.indexes.internal().insert(&meta)?;
        self.persist_roots()?;
        Ok(index_id)
    }

    pub(crate) fn unregister_index(&mut self, table_name: &str, field_name: &str) -> Result<bool> {
        let all_indexes = self.indexes.all()?;
        for index in all_indexes {
            if index.table_name == table_name && index.field_name == field_name {
                self.indexes.internal().remove(&index.index_id)?;
                self.persist_roots()?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every index registered for `table_name`.
    pub(crate) fn table_indexes(&self, table_name: &str) -> Result<Vec<IndexMeta>> {
        if self.indexes.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .indexes
            .all()?
            .into_iter()
            .filter(|index| index.table_name == table_name)
            .collect())
    }

    /// Keeps `_sys_indexes.index_root_page` current after index-root
    /// splits; silent no-op when nothing matches or nothing changed.
    pub(crate) fn update_index_root(
        &mut self,
        table_name: &str,
        field_name: &str,
        root: PageId,
    ) -> Result<()> {
        let all_indexes = self.indexes.all()?;
        for mut index in all_indexes {
            if index.table_name == table_name
                && index.field_name == field_name
                && index.index_root_page != root
            {
                index.index_root_page = root;
                self.indexes.internal().update(&index)?;
                self.persist_roots()?;
            }
        }
        Ok(())
    }

    /// Convenience lookup used by `Database::table`.
    pub(crate) fn table_meta(&self, table_name: &str) -> Result<Option<TableMeta>> {
        self.tables.find(&table_name.to_string())
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        self.tables.internal().flush()?;
        self.fields.internal().flush()?;
        self.indexes.internal().flush()?;
        self.persist_roots()
    }

    /// Persists the catalog's own tree roots into metadata page 0 whenever
    /// they move.
    fn persist_roots(&mut self) -> Result<()> {
        let tables_root = self.tables.root_page();
        let fields_root = self.fields.root_page();
        let indexes_root = self.indexes.root_page();

        let mut storage = self.storage.borrow_mut();
        if storage.sys_tables_root() != tables_root {
            storage.set_sys_tables_root(tables_root)?;
        }
        if storage.sys_fields_root() != fields_root {
            storage.set_sys_fields_root(fields_root)?;
        }
        if storage.sys_indexes_root() != indexes_root {
            storage.set_sys_indexes_root(indexes_root)?;
        }
        Ok(())
    }
}
