use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::{
    codec::Record,
    index::BatchCursor,
    storage::StorageEngine,
    table::load_record,
    types::{error::Result, record_id::RecordId},
};

/// Forward cursor over a table, yielding deserialized records in primary
/// key order by wrapping the primary tree's batch cursor.
pub struct RecordCursor<'t, R: Record> {
    cursor: BatchCursor<'t, R::Key, RecordId>,
    storage: Rc<RefCell<StorageEngine>>,
    pending: VecDeque<(R::Key, RecordId)>,
}

impl<'t, R: Record> RecordCursor<'t, R> {
    pub(crate) fn new(
        cursor: BatchCursor<'t, R::Key, RecordId>,
        storage: Rc<RefCell<StorageEngine>>,
    ) -> Self {
        Self {
            cursor,
            storage,
            pending: VecDeque::new(),
        }
    }

    pub fn next_record(&mut self) -> Result<Option<R>> {
        if self.pending.is_empty() && self.cursor.has_more() {
            self.pending.extend(self.cursor.next_batch()?);
        }

        match self.pending.pop_front() {
            Some((_, rid)) => Ok(Some(load_record(&self.storage, rid)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` records; fewer signals the cursor ran dry.
    pub fn next_records(&mut self, limit: usize) -> Result<Vec<R>> {
        let mut records = Vec::with_capacity(limit);
        while records.len() < limit {
            match self.next_record()? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(records)
    }

    pub fn collect_all(mut self) -> Result<Vec<R>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Lazy, batched filter over a table: pulls primary entries, loads the
/// records, and emits the ones satisfying the predicate until a batch is
/// full. Forward-only; restart by constructing a new cursor.
pub struct FilteredRecords<'t, R: Record, P> {
    cursor: BatchCursor<'t, R::Key, RecordId>,
    storage: Rc<RefCell<StorageEngine>>,
    predicate: P,
    pending: VecDeque<(R::Key, RecordId)>,
    batch_size: usize,
}

impl<'t, R, P> FilteredRecords<'t, R, P>
where
    R: Record,
    P: FnMut(&R) -> bool,
{
    pub(crate) fn new(
        cursor: BatchCursor<'t, R::Key, RecordId>,
        storage: Rc<RefCell<StorageEngine>>,
        predicate: P,
    ) -> Self {
        let batch_size = cursor.batch_size();
        Self {
            cursor,
            storage,
            predicate,
            pending: VecDeque::new(),
            batch_size,
        }
    }

    pub fn has_more(&self) -> bool {
        !self.pending.is_empty() || self.cursor.has_more()
    }

    /// Up to `batch_size` matching records; an empty vector means the
    /// underlying cursor is exhausted.
    pub fn next_batch(&mut self) -> Result<Vec<R>> {
        let mut matches = Vec::with_capacity(self.batch_size);

        loop {
            if self.pending.is_empty() {
                if !self.cursor.has_more() {
                    break;
                }
                self.pending.extend(self.cursor.next_batch()?);
                continue;
            }

            while let Some((_, rid)) = self.pending.pop_front() {
                let record: R = load_record(&self.storage, rid)?;
                if (self.predicate)(&record) {
                    matches.push(record);
                    if matches.len() >= self.batch_size {
                        return Ok(matches);
                    }
                }
            }
        }

        Ok(matches)
    }

    pub fn collect_all(mut self) -> Result<Vec<R>> {
        let mut records = Vec::new();
        loop {
            let batch = self.next_batch()?;
            if batch.is_empty() {
                return Ok(records);
            }
            records.extend(batch);
        }
    }
}
