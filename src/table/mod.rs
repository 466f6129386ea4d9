pub mod cursor;
pub mod read_only;
#[allow(clippy::module_inception)]
pub mod table;

pub use cursor::{FilteredRecords, RecordCursor};
pub use read_only::ReadOnlyTable;
pub use table::Table;

use std::{cell::RefCell, rc::Rc};

use crate::{
    codec::{BinaryReader, Record},
    storage::StorageEngine,
    types::{error::Result, record_id::RecordId},
};

/// Loads and deserializes the record stored on `rid`'s data page.
pub(crate) fn load_record<R: Record>(
    storage: &Rc<RefCell<StorageEngine>>,
    rid: RecordId,
) -> Result<R> {
    let page = storage.borrow_mut().read_page(rid.page_id)?;
    let mut reader = BinaryReader::new(page.data());
    R::decode(&mut reader)
}
