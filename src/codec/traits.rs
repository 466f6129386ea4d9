use serde::Serialize;

use crate::codec::{BinaryReader, BinaryWriter};
use crate::types::error::Result;
use crate::types::record_id::RecordId;

/// A value with a binary wire form: symmetric `encode`/`decode` over the
/// length-prefixed little-endian format of [`BinaryWriter`]/[`BinaryReader`].
pub trait Codec: Sized {
    fn encode(&self, writer: &mut BinaryWriter);
    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self>;
}

macro_rules! codec_primitive {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Codec for $ty {
            fn encode(&self, writer: &mut BinaryWriter) {
                writer.$write(*self);
            }

            fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
                reader.$read()
            }
        }
    };
}

codec_primitive!(u8, write_u8, read_u8);
codec_primitive!(u16, write_u16, read_u16);
codec_primitive!(u32, write_u32, read_u32);
codec_primitive!(u64, write_u64, read_u64);
codec_primitive!(i8, write_i8, read_i8);
codec_primitive!(i16, write_i16, read_i16);
codec_primitive!(i32, write_i32, read_i32);
codec_primitive!(i64, write_i64, read_i64);
codec_primitive!(f32, write_f32, read_f32);
codec_primitive!(f64, write_f64, read_f64);
codec_primitive!(bool, write_bool, read_bool);

impl Codec for String {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_string(self);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        reader.read_string()
    }
}

impl<T: Codec> Codec for Vec<T> {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.len() as u32);
        for item in self {
            item.encode(writer);
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}

impl Codec for RecordId {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u64(self.page_id);
        writer.write_u32(self.slot);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let page_id = reader.read_u64()?;
        let slot = reader.read_u32()?;
        Ok(RecordId { page_id, slot })
    }
}

/// Static description of one field of a record type, as registered in
/// `_sys_fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub type_name: &'static str,
    pub ordinal: u16,
    pub is_primary_key: bool,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, type_name: &'static str, ordinal: u16) -> Self {
        Self {
            name,
            type_name,
            ordinal,
            is_primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }
}

/// A record type storable in a [`Table`](crate::table::Table).
///
/// Implementors supply the primary-key accessor, the binary codec (via the
/// `Codec` supertrait), and the static field descriptors the catalog
/// persists in `_sys_fields`.
pub trait Record: Codec + Clone + 'static {
    type Key: Codec + Clone + PartialOrd + std::fmt::Debug + 'static;

    fn primary_key(&self) -> Self::Key;

    /// Stable type name recorded in `_sys_tables.type_name`.
    fn type_name() -> &'static str;

    fn field_descriptors() -> Vec<FieldDescriptor>;
}
