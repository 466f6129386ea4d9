pub mod bplus_tree;
pub mod cursor;
pub mod secondary;

pub use bplus_tree::BPlusTree;
pub use cursor::BatchCursor;
pub use secondary::{CompositeKey, IndexKind, MultiValueIndex, SecondaryIndex, UniqueIndex};

/// Default number of entries fetched per cursor batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;
