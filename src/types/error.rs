use thiserror::Error;

use crate::types::PageId;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt database: {reason}")]
    CorruptDatabase { reason: String },

    #[error("Corrupt page: page_id={page_id}, reason={reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("Page access out of bounds: offset {offset} + {len} bytes exceeds payload")]
    OutOfBounds { offset: usize, len: usize },

    #[error("End of buffer: needed {wanted} bytes at position {position}")]
    EndOfBuffer { position: usize, wanted: usize },

    #[error("Record of {size} bytes does not fit a single page")]
    RecordTooLarge { size: usize },

    #[error("B+tree node on page {page_id} serializes to {size} bytes (max {max})")]
    NodeTooLarge {
        page_id: PageId,
        size: usize,
        max: usize,
    },

    #[error("Duplicate key {key} in {context}")]
    DuplicateKey { key: String, context: String },

    #[error("Record not found: {key}")]
    NotFound { key: String },

    #[error("Secondary index '{index}' out of sync: {reason}")]
    IndexOutOfSync { index: String, reason: String },

    #[error("Unsupported database version: {found} (expected 2 or 3)")]
    VersionMismatch { found: u32 },

    #[error("Type mismatch for table '{table}': stored {stored}, requested {requested}")]
    TypeMismatch {
        table: String,
        stored: String,
        requested: String,
    },

    #[error("Table '{name}' not found")]
    TableNotFound { name: String },
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
