use std::{any::Any, cell::RefCell, cmp::Ordering, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    codec::{BinaryReader, BinaryWriter, Codec, Record},
    index::{bplus_tree::BPlusTree, cursor::BatchCursor},
    storage::StorageEngine,
    types::{
        PageId,
        error::Result,
        record_id::RecordId,
    },
};

/// Secondary index flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// One record per field value.
    Unique,
    /// Multiple records per field value, keyed by `(value, page_id)`.
    MultiValue,
}

/// Key type admissible for a secondary index.
pub trait IndexableField: Codec + Clone + PartialOrd + std::fmt::Debug + 'static {}

impl<T> IndexableField for T where T: Codec + Clone + PartialOrd + std::fmt::Debug + 'static {}

/// Composite key for multi-value indexes: the indexed field value paired
/// with the owning record's page id. Lexicographic ordering keeps all
/// entries sharing a field value contiguous in the leaf chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeKey<F> {
    pub field_value: F,
    pub page_id: PageId,
}

impl<F> CompositeKey<F> {
    pub fn new(field_value: F, page_id: PageId) -> Self {
        Self { field_value, page_id }
    }
}

impl<F: PartialOrd> PartialOrd for CompositeKey<F> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.field_value.partial_cmp(&other.field_value) {
            Some(Ordering::Equal) | None => self.page_id.partial_cmp(&other.page_id),
            ordering => ordering,
        }
    }
}

impl<F: Codec> Codec for CompositeKey<F> {
    fn encode(&self, writer: &mut BinaryWriter) {
        self.field_value.encode(writer);
        writer.write_u64(self.page_id);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let field_value = F::decode(reader)?;
        let page_id = reader.read_u64()?;
        Ok(Self { field_value, page_id })
    }
}

/// Type-erased interface the table uses to keep every secondary index in
/// sync on each mutation. Concrete wrappers are re-acquired through
/// `as_any` on the typed query paths.
pub trait SecondaryIndex<R: Record> {
    /// Returns false when a unique constraint rejects the record.
    fn insert_record(&mut self, record: &R, rid: RecordId) -> Result<bool>;

    fn remove_record(&mut self, record: &R, rid: RecordId) -> Result<bool>;

    /// Returns false when the old entry could not be removed (index out
    /// of sync) or the new entry was rejected.
    fn update_record(&mut self, old: &R, new: &R, rid: RecordId) -> Result<bool>;

    fn flush(&mut self) -> Result<()>;

    /// Deallocates every node page of the underlying tree.
    fn destroy(&mut self) -> Result<()>;

    fn root_page_id(&self) -> PageId;
    fn field_name(&self) -> &str;
    fn field_type_name(&self) -> &'static str;
    fn is_unique(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Unique secondary index: `field value -> RecordId`, one entry per value.
pub struct UniqueIndex<R: Record, F: IndexableField> {
    field_name: String,
    getter: fn(&R) -> F,
    tree: BPlusTree<F, RecordId>,
}

impl<R: Record, F: IndexableField> UniqueIndex<R, F> {
    pub fn open(
        field_name: &str,
        getter: fn(&R) -> F,
        storage: Rc<RefCell<StorageEngine>>,
        root_page_id: PageId,
    ) -> Result<Self> {
        Ok(Self {
            field_name: field_name.to_string(),
            getter,
            tree: BPlusTree::open(storage, root_page_id)?,
        })
    }

    pub fn find(&mut self, value: &F) -> Result<Option<RecordId>> {
        self.tree.find(value)
    }

    pub fn contains(&mut self, value: &F) -> Result<bool> {
        self.tree.contains(value)
    }

    pub fn remove_by_value(&mut self, value: &F) -> Result<bool> {
        self.tree.remove(value)
    }

    pub fn range(&mut self, min: &F, max: &F) -> Result<Vec<RecordId>> {
        self.tree.range(min, max)
    }

    pub fn get_all(&mut self) -> Result<Vec<(F, RecordId)>> {
        self.tree.all()
    }

    pub fn batch_cursor(&mut self, batch_size: usize) -> Result<BatchCursor<'_, F, RecordId>> {
        self.tree.batch_cursor(batch_size)
    }

    pub fn size(&self) -> usize {
        self.tree.size()
    }
}

impl<R: Record, F: IndexableField> SecondaryIndex<R> for UniqueIndex<R, F> {
    fn insert_record(&mut self, record: &R, rid: RecordId) -> Result<bool> {
        let value = (self.getter)(record);
        self.tree.insert(value, rid)
    }

    fn remove_record(&mut self, record: &R, _rid: RecordId) -> Result<bool> {
        let value = (self.getter)(record);
        self.tree.remove(&value)
    }

    fn update_record(&mut self, old: &R, new: &R, rid: RecordId) -> Result<bool> {
        let old_value = (self.getter)(old);
        let new_value = (self.getter)(new);

        if cmp_eq(&old_value, &new_value) {
            return Ok(true);
        }

        if !self.tree.remove(&old_value)? {
            return Ok(false);
        }
        self.tree.insert(new_value, rid)
    }

    fn flush(&mut self) -> Result<()> {
        self.tree.flush()
    }

    fn destroy(&mut self) -> Result<()> {
        self.tree.destroy()
    }

    fn root_page_id(&self) -> PageId {
        self.tree.root_page_id()
    }

    fn field_name(&self) -> &str {
        &self.field_name
    }

    fn field_type_name(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn is_unique(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Multi-value secondary index over composite keys `(field value, page_id)`.
pub struct MultiValueIndex<R: Record, F: IndexableField> {
    field_name: String,
    getter: fn(&R) -> F,
    tree: BPlusTree<CompositeKey<F>, RecordId>,
}

impl<R: Record, F: IndexableField> MultiValueIndex<R, F> {
    pub fn open(
        field_name: &str,
        getter: fn(&R) -> F,
        storage: Rc<RefCell<StorageEngine>>,
        root_page_id: PageId,
    ) -> Result<Self> {
        Ok(Self {
            field_name: field_name.to_string(),
            getter,
            tree: BPlusTree::open(storage, root_page_id)?,
        })
    }

    /// All RecordIds whose record carries `value`, via one contiguous
    /// range scan over `[(value, 0), (value, u64::MAX)]`.
    pub fn find(&mut self, value: &F) -> Result<Vec<RecordId>> {
        let min = CompositeKey::new(value.clone(), 0);
        let max = CompositeKey::new(value.clone(), u64::MAX);
        self.tree.range(&min, &max)
    }

    pub fn contains(&mut self, value: &F) -> Result<bool> {
        Ok(!self.find(value)?.is_empty())
    }

    pub fn count(&mut self, value: &F) -> Result<usize> {
        Ok(self.find(value)?.len())
    }

    /// Removes every entry sharing `value`; returns how many were erased.
    pub fn remove_all(&mut self, value: &F) -> Result<usize> {
        let rids = self.find(value)?;
        let mut removed = 0;
        for rid in rids {
            let key = CompositeKey::new(value.clone(), rid.page_id);
            if self.tree.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Distinct field values in ascending order. Entries are sorted by
    /// composite key, so one linear scan with deduplication suffices.
    pub fn unique_values(&mut self) -> Result<Vec<F>> {
        let entries = self.tree.all()?;
        let mut unique = Vec::new();

        for (key, _) in entries {
            let is_new = match unique.last() {
                Some(last) => !cmp_eq::<F>(last, &key.field_value),
                None => true,
            };
            if is_new {
                unique.push(key.field_value);
            }
        }

        Ok(unique)
    }

    pub fn get_all(&mut self) -> Result<Vec<(F, RecordId)>> {
        let entries = self.tree.all()?;
        Ok(entries
            .into_iter()
            .map(|(key, rid)| (key.field_value, rid))
            .collect())
    }

    pub fn batch_cursor(
        &mut self,
        batch_size: usize,
    ) -> Result<BatchCursor<'_, CompositeKey<F>, RecordId>> {
        self.tree.batch_cursor(batch_size)
    }

    pub fn size(&self) -> usize {
        self.tree.size()
    }
}

impl<R: Record, F: IndexableField> SecondaryIndex<R> for MultiValueIndex<R, F> {
    fn insert_record(&mut self, record: &R, rid: RecordId) -> Result<bool> {
        let key = CompositeKey::new((self.getter)(record), rid.page_id);
        self.tree.insert(key, rid)
    }

    fn remove_record(&mut self, record: &R, rid: RecordId) -> Result<bool> {
        let key = CompositeKey::new((self.getter)(record), rid.page_id);
        self.tree.remove(&key)
    }

    fn update_record(&mut self, old: &R, new: &R, rid: RecordId) -> Result<bool> {
        let old_value = (self.getter)(old);
        let new_value = (self.getter)(new);

        if cmp_eq(&old_value, &new_value) {
            return Ok(true);
        }

        let old_key = CompositeKey::new(old_value, rid.page_id);
        if !self.tree.remove(&old_key)? {
            return Ok(false);
        }
        let new_key = CompositeKey::new(new_value, rid.page_id);
        self.tree.insert(new_key, rid)
    }

    fn flush(&mut self) -> Result<()> {
        self.tree.flush()
    }

    fn destroy(&mut self) -> Result<()> {
        self.tree.destroy()
    }

    fn root_page_id(&self) -> PageId {
        self.tree.root_page_id()
    }

    fn field_name(&self) -> &str {
        &self.field_name
    }

    fn field_type_name(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn is_unique(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn cmp_eq<F: PartialOrd>(a: &F, b: &F) -> bool {
    matches!(a.partial_cmp(b), Some(Ordering::Equal))
}
