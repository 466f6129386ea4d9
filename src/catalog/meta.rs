use serde::{Deserialize, Serialize};

use crate::{
    codec::{BinaryReader, BinaryWriter, Codec, FieldDescriptor, Record},
    query::FieldRef,
    types::{PageId, error::Result},
};

/// One row of `_sys_tables`: a registered table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub table_name: String,
    pub type_name: String,
    pub index_root_page: PageId,
    pub record_count: u64,
    pub created_timestamp: u64,
    pub is_system_table: bool,
}

impl TableMeta {
    pub const NAME: FieldRef<TableMeta, String> =
        FieldRef::new("table_name", |m| m.table_name.clone());
    pub const TYPE_NAME: FieldRef<TableMeta, String> =
        FieldRef::new("type_name", |m| m.type_name.clone());
    pub const ROOT_PAGE: FieldRef<TableMeta, u64> =
        FieldRef::new("index_root_page", |m| m.index_root_page);
    pub const RECORD_COUNT: FieldRef<TableMeta, u64> =
        FieldRef::new("record_count", |m| m.record_count);
    pub const CREATED: FieldRef<TableMeta, u64> =
        FieldRef::new("created_timestamp", |m| m.created_timestamp);
    pub const IS_SYSTEM: FieldRef<TableMeta, bool> =
        FieldRef::new("is_system_table", |m| m.is_system_table);
}

impl Codec for TableMeta {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_string(&self.table_name);
        writer.write_string(&self.type_name);
        writer.write_u64(self.index_root_page);
        writer.write_u64(self.record_count);
        writer.write_u64(self.created_timestamp);
        writer.write_bool(self.is_system_table);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            table_name: reader.read_string()?,
            type_name: reader.read_string()?,
            index_root_page: reader.read_u64()?,
            record_count: reader.read_u64()?,
            created_timestamp: reader.read_u64()?,
            is_system_table: reader.read_bool()?,
        })
    }
}

impl Record for TableMeta {
    type Key = String;

    fn primary_key(&self) -> String {
        self.table_name.clone()
    }

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn field_descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("table_name", "String", 0).primary_key(),
            FieldDescriptor::new("type_name", "String", 1),
            FieldDescriptor::new("index_root_page", "u64", 2),
            FieldDescriptor::new("record_count", "u64", 3),
            FieldDescriptor::new("created_timestamp", "u64", 4),
            FieldDescriptor::new("is_system_table", "bool", 5),
        ]
    }
}

/// One row of `_sys_fields`: a field of a registered table. `field_id` is
/// assigned by the catalog's auto-increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub field_id: u64,
    pub table_name: String,
    pub field_name: String,
    pub field_type: String,
    pub field_order: u16,
    pub is_primary_key: bool,
}

impl FieldMeta {
    pub const ID: FieldRef<FieldMeta, u64> = FieldRef::new("field_id", |m| m.field_id);
    pub const TABLE: FieldRef<FieldMeta, String> =
        FieldRef::new("table_name", |m| m.table_name.clone());
    pub const NAME: FieldRef<FieldMeta, String> =
        FieldRef::new("field_name", |m| m.field_name.clone());
    pub const TYPE_NAME: FieldRef<FieldMeta, String> =
        FieldRef::new("field_type", |m| m.field_type.clone());
    pub const ORDER: FieldRef<FieldMeta, u16> = FieldRef::new("field_order", |m| m.field_order);
    pub const IS_PK: FieldRef<FieldMeta, bool> =
        FieldRef::new("is_primary_key", |m| m.is_primary_key);
}

impl Codec for FieldMeta {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u64(self.field_id);
        writer.write_string(&self.table_name);
        writer.write_string(&self.field_name);
        writer.write_string(&self.field_type);
        writer.write_u16(self.field_order);
        writer.write_bool(self.is_primary_key);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            field_id: reader.read_u64()?,
            table_name: reader.read_string()?,
            field_name: reader.read_string()?,
            field_type: reader.read_string()?,
            field_order: reader.read_u16()?,
            is_primary_key: reader.read_bool()?,
        })
    }
}

impl Record for FieldMeta {
    type Key = u64;

    fn primary_key(&self) -> u64 {
        self.field_id
    }

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn field_descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("field_id", "u64", 0).primary_key(),
            FieldDescriptor::new("table_name", "String", 1),
            FieldDescriptor::new("field_name", "String", 2),
            FieldDescriptor::new("field_type", "String", 3),
            FieldDescriptor::new("field_order", "u16", 4),
            FieldDescriptor::new("is_primary_key", "bool", 5),
        ]
    }
}

/// One row of `_sys_indexes`: a registered secondary index. `index_id` is
/// assigned by the catalog's auto-increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub index_id: u64,
    pub table_name: String,
    pub field_name: String,
    pub field_type: String,
    pub is_unique: bool,
    pub index_root_page: PageId,
    pub created_timestamp: u64,
    pub is_active: bool,
}

impl IndexMeta {
    pub const ID: FieldRef<IndexMeta, u64> = FieldRef::new("index_id", |m| m.index_id);
    pub const TABLE: FieldRef<IndexMeta, String> =
        FieldRef::new("table_name", |m| m.table_name.clone());
    pub const FIELD: FieldRef<IndexMeta, String> =
        FieldRef::new("field_name", |m| m.field_name.clone());
    pub const TYPE_NAME: FieldRef<IndexMeta, String> =
        FieldRef::new("field_type", |m| m.field_type.clone());
    pub const IS_UNIQUE: FieldRef<IndexMeta, bool> = FieldRef::new("is_unique", |m| m.is_unique);
    pub const ROOT_PAGE: FieldRef<IndexMeta, u64> =
        FieldRef::new("index_root_page", |m| m.index_root_page);
    pub const CREATED: FieldRef<IndexMeta, u64> =
        FieldRef::new("created_timestamp", |m| m.created_timestamp);
    pub const IS_ACTIVE: FieldRef<IndexMeta, bool> = FieldRef::new("is_active", |m| m.is_active);
}

impl Codec for IndexMeta {
    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u64(self.index_id);
        writer.write_string(&self.table_name);
        writer.write_string(&self.field_name);
        writer.write_string(&self.field_type);
        writer.write_bool(self.is_unique);
        writer.write_u64(self.index_root_page);
        writer.write_u64(self.created_timestamp);
        writer.write_bool(self.is_active);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            index_id: reader.read_u64()?,
            table_name: reader.read_string()?,
            field_name: reader.read_string()?,
            field_type: reader.read_string()?,
            is_unique: reader.read_bool()?,
            index_root_page: reader.read_u64()?,
            created_timestamp: reader.read_u64()?,
            is_active: reader.read_bool()?,
        })
    }
}

impl Record for IndexMeta {
    type Key = u64;

    fn primary_key(&self) -> u64 {
        self.index_id
    }

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn field_descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("index_id", "u64", 0).primary_key(),
            FieldDescriptor::new("table_name", "String", 1),
            FieldDescriptor::new("field_name", "String", 2),
            FieldDescriptor::new("field_type", "String", 3),
            FieldDescriptor::new("is_unique", "bool", 4),
            FieldDescriptor::new("index_root_page", "u64", 5),
            FieldDescriptor::new("created_timestamp", "u64", 6),
            FieldDescriptor::new("is_active", "bool", 7),
        ]
    }
}
