use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use tracing::{debug, warn};

use crate::{
    catalog::SystemCatalog,
    codec::{BinaryWriter, Record},
    index::{
        BPlusTree, DEFAULT_BATCH_SIZE, IndexKind, MultiValueIndex, SecondaryIndex, UniqueIndex,
        secondary::IndexableField,
    },
    query::{FieldRef, QueryExpr},
    storage::StorageEngine,
    table::{
        cursor::{FilteredRecords, RecordCursor},
        load_record,
    },
    types::{
        PAGE_DATA_SIZE, PAGE_HEADER_SIZE, PageId,
        error::{DatabaseError, Result},
        page::{Page, PageType},
        record_id::RecordId,
    },
};

/// Typed table: a primary B+tree mapping `R::Key -> RecordId`, the data
/// pages those RecordIds point at, and a list of secondary indexes kept in
/// sync on every mutation.
///
/// One record per data page; records that do not fit a single page are
/// rejected rather than chained.
pub struct Table<R: Record> {
    name: String,
    storage: Rc<RefCell<StorageEngine>>,
    primary: BPlusTree<R::Key, RecordId>,
    secondary: Vec<Box<dyn SecondaryIndex<R>>>,
    count: usize,
    catalog: Option<Weak<RefCell<SystemCatalog>>>,
    batch_size: usize,
}

impl<R: Record> Table<R> {
    /// Opens a table over an existing primary tree root, or a fresh empty
    /// tree when `root_page_id` is 0.
    pub fn open(
        storage: Rc<RefCell<StorageEngine>>,
        name: &str,
        root_page_id: PageId,
    ) -> Result<Self> {
        let primary = BPlusTree::open(storage.clone(), root_page_id)?;
        let count = primary.size();

        Ok(Self {
            name: name.to_string(),
            storage,
            primary,
            secondary: Vec::new(),
            count,
            catalog: None,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn root_page(&self) -> PageId {
        self.primary.root_page_id()
    }

    /// Attaches the catalog back-reference for record-count and root sync.
    /// Non-owning by construction; the three catalog tables never get one.
    pub(crate) fn set_catalog(&mut self, catalog: Weak<RefCell<SystemCatalog>>) {
        self.catalog = Some(catalog);
    }

    pub fn insert(&mut self, record: &R) -> Result<()> {
        let key = record.primary_key();
        if self.primary.contains(&key)? {
            return Err(DatabaseError::DuplicateKey {
                key: format!("{:?}", key),
                context: format!("table '{}'", self.name),
            });
        }

        let mut writer = BinaryWriter::new();
        record.encode(&mut writer);
        let data = writer.into_bytes();
        if data.len() > PAGE_DATA_SIZE {
            return Err(DatabaseError::RecordTooLarge { size: data.len() });
        }

        let page_id = self.storage.borrow_mut().allocate_page(PageType::Data)?;
        let mut page = Page::new(page_id, PageType::Data);
        page.write_data(0, &data)?;
        page.record_count = 1;
        page.free_space_offset = (PAGE_HEADER_SIZE + data.len()) as u16;
        self.storage.borrow_mut().write_page(page_id, page)?;

        let rid = RecordId::new(page_id, 0);
        self.primary.insert(key, rid)?;

        for index in &mut self.secondary {
            if !index.insert_record(record, rid)? {
                // Primary entry and earlier indexes already carry the
                // record; the caller is expected to remove it.
                return Err(DatabaseError::DuplicateKey {
                    key: format!("{:?}", record.primary_key()),
                    context: format!("unique index '{}'", index.field_name()),
                });
            }
        }

        self.count += 1;
        self.sync_catalog()
    }

    pub fn update(&mut self, record: &R) -> Result<()> {
        let key = record.primary_key();
        let rid = self
            .primary
            .find(&key)?
            .ok_or_else(|| DatabaseError::NotFound {
                key: format!("{:?}", key),
            })?;

        let old: R = load_record(&self.storage, rid)?;

        let mut writer = BinaryWriter::new();
        record.encode(&mut writer);
        let data = writer.into_bytes();
        if data.len() > PAGE_DATA_SIZE {
            return Err(DatabaseError::RecordTooLarge { size: data.len() });
        }

        // Rewrite the data page in place under the same RecordId.
        let mut page = Page::new(rid.page_id, PageType::Data);
        page.write_data(0, &data)?;
        page.record_count = 1;
        page.free_space_offset = (PAGE_HEADER_SIZE + data.len()) as u16;
        self.storage.borrow_mut().write_page(rid.page_id, page)?;

        for index in &mut self.secondary {
            if !index.update_record(&old, record, rid)? {
                return Err(DatabaseError::IndexOutOfSync {
                    index: index.field_name().to_string(),
                    reason: "old entry missing or new entry rejected during update".to_string(),
                });
            }
        }

        self.sync_catalog()
    }

    /// Removes a record by primary key; false when absent.
    pub fn remove(&mut self, key: &R::Key) -> Result<bool> {
        let Some(rid) = self.primary.find(key)? else {
            return Ok(false);
        };

        let old: R = load_record(&self.storage, rid)?;

        for index in &mut self.secondary {
            index.remove_record(&old, rid)?;
        }

        self.storage.borrow_mut().deallocate_page(rid.page_id)?;
        self.primary.remove(key)?;
        self.count -= 1;
        self.sync_catalog()?;
        Ok(true)
    }

    pub fn find(&mut self, key: &R::Key) -> Result<Option<R>> {
        match self.primary.find(key)? {
            Some(rid) => Ok(Some(load_record(&self.storage, rid)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&mut self, key: &R::Key) -> Result<bool> {
        self.primary.contains(key)
    }

    pub fn get_record_id(&mut self, key: &R::Key) -> Result<Option<RecordId>> {
        self.primary.find(key)
    }

    /// Adds a secondary index on `field`. When the catalog already records
    /// an index for `(table, field)`, its persisted root is reopened and no
    /// rebuild happens; otherwise a fresh tree is populated with one scan
    /// of the primary index and registered in the catalog.
    pub fn add_index<F: IndexableField>(
        &mut self,
        field: FieldRef<R, F>,
        kind: IndexKind,
    ) -> Result<&mut Self> {
        let existing = match self.upgrade_catalog() {
            Some(catalog) => catalog
                .borrow()
                .table_indexes(&self.name)?
                .into_iter()
                .find(|meta| meta.field_name == field.name()),
            None => None,
        };

        if let Some(meta) = existing {
            if meta.field_type != std::any::type_name::<F>() {
                return Err(DatabaseError::TypeMismatch {
                    table: self.name.clone(),
                    stored: meta.field_type,
                    requested: std::any::type_name::<F>().to_string(),
                });
            }

            let index: Box<dyn SecondaryIndex<R>> = if meta.is_unique {
                Box::new(UniqueIndex::open(
                    field.name(),
                    field.getter(),
                    self.storage.clone(),
                    meta.index_root_page,
                )?)
            } else {
                Box::new(MultiValueIndex::open(
                    field.name(),
                    field.getter(),
                    self.storage.clone(),
                    meta.index_root_page,
                )?)
            };
            self.secondary.push(index);
            return Ok(self);
        }

        let mut index: Box<dyn SecondaryIndex<R>> = match kind {
            IndexKind::Unique => Box::new(UniqueIndex::open(
                field.name(),
                field.getter(),
                self.storage.clone(),
                0,
            )?),
            IndexKind::MultiValue => Box::new(MultiValueIndex::open(
                field.name(),
                field.getter(),
                self.storage.clone(),
                0,
            )?),
        };

        // Backfill from the primary index with one batched scan.
        let storage = self.storage.clone();
        let mut cursor = self.primary.batch_cursor(self.batch_size)?;
        loop {
            let batch = cursor.next_batch()?;
            if batch.is_empty() {
                break;
            }
            for (_, rid) in batch {
                let record: R = load_record(&storage, rid)?;
                if !index.insert_record(&record, rid)? {
                    return Err(DatabaseError::DuplicateKey {
                        key: format!("{:?}", record.primary_key()),
                        context: format!("unique index '{}' during backfill", field.name()),
                    });
                }
            }
        }

        if let Some(catalog) = self.upgrade_catalog() {
            catalog.borrow_mut().register_index(
                &self.name,
                field.name(),
                index.field_type_name(),
                index.is_unique(),
                index.root_page_id(),
            )?;
        }

        debug!(table = %self.name, field = field.name(), "created secondary index");
        self.secondary.push(index);
        Ok(self)
    }

    /// Detaches the first index on `field_name` and unregisters it from
    /// the catalog; false when no such index is attached.
    pub fn drop_index(&mut self, field_name: &str) -> Result<bool> {
        let Some(position) = self
            .secondary
            .iter()
            .position(|index| index.field_name() == field_name)
        else {
            return Ok(false);
        };

        if let Some(catalog) = self.upgrade_catalog() {
            catalog.borrow_mut().unregister_index(&self.name, field_name)?;
        }

        self.secondary.remove(position);
        Ok(true)
    }

    /// Point lookup through the first unique index on `field`.
    pub fn find_by<F: IndexableField>(
        &mut self,
        field: FieldRef<R, F>,
        value: &F,
    ) -> Result<Option<R>> {
        for index in &mut self.secondary {
            if index.field_name() == field.name() && index.is_unique() {
                if let Some(unique) = index.as_any_mut().downcast_mut::<UniqueIndex<R, F>>() {
                    return match unique.find(value)? {
                        Some(rid) => Ok(Some(load_record(&self.storage, rid)?)),
                        None => Ok(None),
                    };
                }
            }
        }
        Ok(None)
    }

    /// All matches through the first multi-value index on `field`.
    pub fn find_all_by<F: IndexableField>(
        &mut self,
        field: FieldRef<R, F>,
        value: &F,
    ) -> Result<Vec<R>> {
        for index in &mut self.secondary {
            if index.field_name() == field.name() && !index.is_unique() {
                if let Some(multi) = index.as_any_mut().downcast_mut::<MultiValueIndex<R, F>>() {
                    let rids = multi.find(value)?;
                    let mut records = Vec::with_capacity(rids.len());
                    for rid in rids {
                        records.push(load_record(&self.storage, rid)?);
                    }
                    return Ok(records);
                }
            }
        }
        Ok(Vec::new())
    }

    /// Range scan through the first unique index on `field`.
    pub fn range_query<F: IndexableField>(
        &mut self,
        field: FieldRef<R, F>,
        min: &F,
        max: &F,
    ) -> Result<Vec<R>> {
        for index in &mut self.secondary {
            if index.field_name() == field.name() && index.is_unique() {
                if let Some(unique) = index.as_any_mut().downcast_mut::<UniqueIndex<R, F>>() {
                    let rids = unique.range(min, max)?;
                    let mut records = Vec::with_capacity(rids.len());
                    for rid in rids {
                        records.push(load_record(&self.storage, rid)?);
                    }
                    return Ok(records);
                }
            }
        }
        Ok(Vec::new())
    }

    /// Distinct values of the first multi-value index on `field`.
    pub fn unique_values<F: IndexableField>(&mut self, field: FieldRef<R, F>) -> Result<Vec<F>> {
        for index in &mut self.secondary {
            if index.field_name() == field.name() && !index.is_unique() {
                if let Some(multi) = index.as_any_mut().downcast_mut::<MultiValueIndex<R, F>>() {
                    return multi.unique_values();
                }
            }
        }
        Ok(Vec::new())
    }

    /// Removes every record and replaces the primary tree with a fresh
    /// empty one. Secondary indexes are not cleared.
    pub fn clear(&mut self) -> Result<()> {
        let mut rids = Vec::new();
        {
            let mut cursor = self.primary.batch_cursor(self.batch_size)?;
            loop {
                let batch = cursor.next_batch()?;
                if batch.is_empty() {
                    break;
                }
                rids.extend(batch.into_iter().map(|(_, rid)| rid));
            }
        }

        for rid in rids {
            self.storage.borrow_mut().deallocate_page(rid.page_id)?;
        }

        self.primary.destroy()?;
        self.primary = BPlusTree::open(self.storage.clone(), 0)?;
        self.count = 0;
        self.sync_catalog()
    }

    /// Cursor over all records in ascending primary-key order.
    pub fn iter(&mut self) -> Result<RecordCursor<'_, R>> {
        let storage = self.storage.clone();
        let cursor = self.primary.batch_cursor(self.batch_size)?;
        Ok(RecordCursor::new(cursor, storage))
    }

    /// Lazy batched filter: loads records from the primary cursor and
    /// yields the ones satisfying `predicate`, one batch of matches at a
    /// time.
    pub fn find_if<P: FnMut(&R) -> bool>(
        &mut self,
        predicate: P,
    ) -> Result<FilteredRecords<'_, R, P>> {
        let storage = self.storage.clone();
        let cursor = self.primary.batch_cursor(self.batch_size)?;
        Ok(FilteredRecords::new(cursor, storage, predicate))
    }

    /// Lowers a DSL expression to a predicate and filters with it.
    pub fn where_<E: QueryExpr<R>>(
        &mut self,
        expr: E,
    ) -> Result<FilteredRecords<'_, R, impl FnMut(&R) -> bool>> {
        self.find_if(move |record| expr.evaluate(record))
    }

    /// Flushes the primary tree, every secondary index, and the storage
    /// engine, after pushing current roots and count into the catalog.
    pub fn flush(&mut self) -> Result<()> {
        self.sync_catalog()?;
        self.primary.flush()?;
        for index in &mut self.secondary {
            index.flush()?;
        }
        self.storage.borrow_mut().flush_all()
    }

    /// Frees every page owned by this table: data pages, primary tree
    /// nodes, and the trees of all attached secondary indexes. Used by
    /// `Database::drop_table`.
    pub(crate) fn destroy(&mut self) -> Result<()> {
        self.catalog = None;

        let mut rids = Vec::new();
        {
            let mut cursor = self.primary.batch_cursor(self.batch_size)?;
            loop {
                let batch = cursor.next_batch()?;
                if batch.is_empty() {
                    break;
                }
                rids.extend(batch.into_iter().map(|(_, rid)| rid));
            }
        }
        for rid in rids {
            self.storage.borrow_mut().deallocate_page(rid.page_id)?;
        }

        self.primary.destroy()?;
        for index in &mut self.secondary {
            index.destroy()?;
        }
        self.secondary.clear();
        self.count = 0;
        Ok(())
    }

    /// Pushes record count and current tree roots to the catalog. Silent
    /// no-op for tables without a catalog reference (the catalog's own
    /// tables, and user tables during bootstrap).
    fn sync_catalog(&mut self) -> Result<()> {
        let Some(catalog) = self.upgrade_catalog() else {
            return Ok(());
        };

        let mut catalog = catalog.borrow_mut();
        catalog.update_record_count(&self.name, self.count as u64)?;
        catalog.update_table_root(&self.name, self.primary.root_page_id())?;
        for index in &self.secondary {
            catalog.update_index_root(&self.name, index.field_name(), index.root_page_id())?;
        }
        Ok(())
    }

    fn upgrade_catalog(&self) -> Option<Rc<RefCell<SystemCatalog>>> {
        self.catalog.as_ref().and_then(Weak::upgrade)
    }
}

impl<R: Record> Drop for Table<R> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(table = %self.name, error = %err, "flush on drop failed");
        }
    }
}
