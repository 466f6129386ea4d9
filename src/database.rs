use std::{
    any::{Any, TypeId},
    cell::{Ref, RefCell},
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use tracing::{debug, warn};

use crate::{
    catalog::{
        SYS_FIELDS, SYS_INDEXES, SYS_TABLES, SystemCatalog, is_system_table,
        meta::{FieldMeta, IndexMeta, TableMeta},
    },
    codec::Record,
    storage::{StorageConfig, StorageEngine},
    table::Table,
    types::error::{DatabaseError, Result},
};

struct StoredTable {
    type_id: TypeId,
    type_name: &'static str,
    handle: Rc<dyn Any>,
    flush: Box<dyn Fn() -> Result<()>>,
}

/// Database context: owns the storage engine and the system catalog, and
/// opens typed tables by name.
///
/// Table handles are cached by name with the record type recorded beside
/// them; requesting a cached name with a different type fails with
/// `TypeMismatch` at runtime.
pub struct Database {
    storage: Rc<RefCell<StorageEngine>>,
    catalog: Rc<RefCell<SystemCatalog>>,
    tables: HashMap<String, StoredTable>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, StorageConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        let storage = Rc::new(RefCell::new(StorageEngine::open(path, config)?));
        let catalog = Self::initialize_catalog(&storage)?;

        Ok(Self {
            storage,
            catalog: Rc::new(RefCell::new(catalog)),
            tables: HashMap::new(),
        })
    }

    /// Opens (or creates and registers) the typed table `name`.
    ///
    /// A previously registered table is reopened from its persisted root;
    /// a new one allocates a fresh tree and registers itself plus its
    /// field descriptors in the catalog.
    pub fn table<R: Record>(&mut self, name: &str) -> Result<Rc<RefCell<Table<R>>>> {
        if is_system_table(name) {
            return Err(DatabaseError::InvalidArgument {
                details: format!("'{}' is a reserved system table name", name),
            });
        }

        if let Some(stored) = self.tables.get(name) {
            if stored.type_id != TypeId::of::<R>() {
                return Err(DatabaseError::TypeMismatch {
                    table: name.to_string(),
                    stored: stored.type_name.to_string(),
                    requested: R::type_name().to_string(),
                });
            }
            let handle = stored
                .handle
                .clone()
                .downcast::<RefCell<Table<R>>>()
                .expect("type id verified above");
            return Ok(handle);
        }

        let existing = self.catalog.borrow().table_meta(name)?;
        let root_page_id = match &existing {
            Some(meta) => {
                if meta.type_name != R::type_name() {
                    return Err(DatabaseError::TypeMismatch {
                        table: name.to_string(),
                        stored: meta.type_name.clone(),
                        requested: R::type_name().to_string(),
                    });
                }
                meta.index_root_page
            }
            None => 0,
        };

        let mut table = Table::open(self.storage.clone(), name, root_page_id)?;
        table.set_catalog(Rc::downgrade(&self.catalog));

        if existing.is_none() {
            let meta = TableMeta {
                table_name: name.to_string(),
                type_name: R::type_name().to_string(),
                index_root_page: table.root_page(),
                record_count: 0,
                created_timestamp: chrono::Utc::now().timestamp() as u64,
                is_system_table: false,
            };
            let field_metas = field_metas_for::<R>(name);
            self.catalog.borrow_mut().register_table(meta, field_metas)?;
            debug!(table = name, "created table");
        }

        let handle = Rc::new(RefCell::new(table));
        let flush_handle = handle.clone();
        self.tables.insert(
            name.to_string(),
            StoredTable {
                type_id: TypeId::of::<R>(),
                type_name: R::type_name(),
                handle: handle.clone(),
                flush: Box::new(move || flush_handle.borrow_mut().flush()),
            },
        );

        Ok(handle)
    }

    /// Drops a non-system table: frees its data pages, its primary tree,
    /// and every secondary index attached this session, then unregisters
    /// table, fields, and indexes from the catalog.
    ///
    /// Index trees registered in the catalog but never attached this
    /// session cannot be reconstructed type-safely; their pages are
    /// leaked.
    pub fn drop_table<R: Record>(&mut self, name: &str) -> Result<()> {
        if is_system_table(name) {
            return Err(DatabaseError::InvalidArgument {
                details: format!("Cannot drop system table '{}'", name),
            });
        }

        let registered = self.catalog.borrow().table_meta(name)?.is_some();
        if !registered && !self.tables.contains_key(name) {
            return Err(DatabaseError::TableNotFound {
                name: name.to_string(),
            });
        }

        let handle = self.table::<R>(name)?;
        handle.borrow_mut().destroy()?;

        let index_metas = self.catalog.borrow().table_indexes(name)?;
        {
            let mut catalog = self.catalog.borrow_mut();
            for index in &index_metas {
                catalog.unregister_index(name, &index.field_name)?;
            }
            catalog.unregister_table(name)?;
        }

        self.tables.remove(name);
        debug!(table = name, "dropped table");
        Ok(())
    }

    /// Read-only catalog views. Drop the returned guard before mutating
    /// any table; table CRUD synchronizes counts and roots through the
    /// same catalog cell.
    pub fn metadata(&self) -> Ref<'_, SystemCatalog> {
        self.catalog.borrow()
    }

    /// Names of all registered non-system tables.
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self
            .catalog
            .borrow()
            .tables()
            .all()?
            .into_iter()
            .filter(|meta| !meta.is_system_table)
            .map(|meta| meta.table_name)
            .collect())
    }

    pub fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.tables.contains_key(name) || self.catalog.borrow().table_meta(name)?.is_some())
    }

    pub fn page_count(&self) -> u64 {
        self.storage.borrow().page_count()
    }

    pub fn path(&self) -> PathBuf {
        self.storage.borrow().path().to_path_buf()
    }

    /// Flushes every open table, the catalog, and the storage engine.
    pub fn flush(&mut self) -> Result<()> {
        for stored in self.tables.values() {
            (stored.flush)()?;
        }
        self.catalog.borrow_mut().flush()?;
        self.storage.borrow_mut().flush_all()
    }

    fn initialize_catalog(storage: &Rc<RefCell<StorageEngine>>) -> Result<SystemCatalog> {
        let (tables_root, fields_root, indexes_root) = {
            let engine = storage.borrow();
            (
                engine.sys_tables_root(),
                engine.sys_fields_root(),
                engine.sys_indexes_root(),
            )
        };

        if tables_root == 0 || fields_root == 0 {
            return Self::bootstrap_catalog(storage);
        }

        // v2 file: the indexes table does not exist yet. Create it lazily
        // and persist its root; the header upgrades to v3 on save.
        let indexes_root = if indexes_root == 0 {
            let root = {
                let mut sys_indexes: Table<IndexMeta> =
                    Table::open(storage.clone(), SYS_INDEXES, 0)?;
                sys_indexes.flush()?;
                sys_indexes.root_page()
            };
            storage.borrow_mut().set_sys_indexes_root(root)?;
            root
        } else {
            indexes_root
        };

        SystemCatalog::open(storage.clone(), tables_root, fields_root, indexes_root)
    }

    /// New database: create the three catalog tables, persist their roots
    /// into page 0, then register each of them as rows in themselves.
    /// Count sync is suppressed throughout (the catalog tables carry no
    /// catalog back-reference).
    fn bootstrap_catalog(storage: &Rc<RefCell<StorageEngine>>) -> Result<SystemCatalog> {
        debug!("bootstrapping system catalog");

        let tables_root = {
            let mut sys_tables: Table<TableMeta> = Table::open(storage.clone(), SYS_TABLES, 0)?;
            sys_tables.flush()?;
            sys_tables.root_page()
        };
        storage.borrow_mut().set_sys_tables_root(tables_root)?;

        let fields_root = {
            let mut sys_fields: Table<FieldMeta> = Table::open(storage.clone(), SYS_FIELDS, 0)?;
            sys_fields.flush()?;
            sys_fields.root_page()
        };
        storage.borrow_mut().set_sys_fields_root(fields_root)?;

        let indexes_root = {
            let mut sys_indexes: Table<IndexMeta> = Table::open(storage.clone(), SYS_INDEXES, 0)?;
            sys_indexes.flush()?;
            sys_indexes.root_page()
        };
        storage.borrow_mut().set_sys_indexes_root(indexes_root)?;

        let mut catalog =
            SystemCatalog::open(storage.clone(), tables_root, fields_root, indexes_root)?;

        register_system_table::<TableMeta>(&mut catalog, SYS_TABLES, tables_root)?;
        register_system_table::<FieldMeta>(&mut catalog, SYS_FIELDS, fields_root)?;
        register_system_table::<IndexMeta>(&mut catalog, SYS_INDEXES, indexes_root)?;

        Ok(catalog)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(error = %err, "flush on drop failed");
        }
    }
}

fn field_metas_for<R: Record>(table_name: &str) -> Vec<FieldMeta> {
    R::field_descriptors()
        .into_iter()
        .map(|descriptor| FieldMeta {
            field_id: 0, // assigned by the catalog
            table_name: table_name.to_string(),
            field_name: descriptor.name.to_string(),
            field_type: descriptor.type_name.to_string(),
            field_order: descriptor.ordinal,
            is_primary_key: descriptor.is_primary_key,
        })
        .collect()
}

fn register_system_table<R: Record>(
    catalog: &mut SystemCatalog,
    name: &str,
    root_page_id: u64,
) -> Result<()> {
    let meta = TableMeta {
        table_name: name.to_string(),
        type_name: R::type_name().to_string(),
        index_root_page: root_page_id,
        record_count: 0,
        created_timestamp: chrono::Utc::now().timestamp() as u64,
        is_system_table: true,
    };

    catalog.register_table(meta, field_metas_for::<R>(name))
}
