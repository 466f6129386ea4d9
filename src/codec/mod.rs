pub mod reader;
pub mod traits;
pub mod writer;

pub use reader::BinaryReader;
pub use traits::{Codec, FieldDescriptor, Record};
pub use writer::BinaryWriter;
