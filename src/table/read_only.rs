use std::{
    cell::{RefCell, RefMut},
    rc::Rc,
};

use crate::{
    codec::Record,
    query::QueryExpr,
    storage::StorageEngine,
    table::Table,
    types::{PageId, error::Result},
};

/// Read-only view over a table. The system catalog hands these out so
/// metadata stays queryable while mutation remains a compile error for
/// callers; internal CRUD goes through `internal()`.
pub struct ReadOnlyTable<R: Record> {
    inner: RefCell<Table<R>>,
}

impl<R: Record> ReadOnlyTable<R> {
    pub(crate) fn open(
        storage: Rc<RefCell<StorageEngine>>,
        name: &str,
        root_page_id: PageId,
    ) -> Result<Self> {
        Ok(Self {
            inner: RefCell::new(Table::open(storage, name, root_page_id)?),
        })
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name().to_string()
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().size()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn root_page(&self) -> PageId {
        self.inner.borrow().root_page()
    }

    pub fn find(&self, key: &R::Key) -> Result<Option<R>> {
        self.inner.borrow_mut().find(key)
    }

    pub fn contains(&self, key: &R::Key) -> Result<bool> {
        self.inner.borrow_mut().contains(key)
    }

    /// Every record in ascending primary-key order.
    pub fn all(&self) -> Result<Vec<R>> {
        let mut table = self.inner.borrow_mut();
        let cursor = table.iter()?;
        cursor.collect_all()
    }

    /// Records matching a DSL expression, evaluated through the same
    /// batched cursor machinery as user tables.
    pub fn where_<E: QueryExpr<R>>(&self, expr: E) -> Result<Vec<R>> {
        let mut table = self.inner.borrow_mut();
        let filtered = table.where_(expr)?;
        filtered.collect_all()
    }

    pub(crate) fn internal(&self) -> RefMut<'_, Table<R>> {
        self.inner.borrow_mut()
    }
}
