use crate::storage::{DB_SIGNATURE, DB_VERSION};
use crate::types::{PAGE_SIZE, PageId, error::DatabaseError};

/*
 * Page 0 Layout (byte offsets within the page)
 *
 * Offset 0-15:   ASCII "LearnQL Database"
 * Offset 16-23:  next_page_id (u64)
 * Offset 24-31:  free_list_head (u64)
 * Offset 32-39:  sys_tables_root (u64)
 * Offset 40-47:  sys_fields_root (u64)
 * Offset 48-51:  version (u32, 2 or 3)
 * Offset 52-59:  created_timestamp (u64)
 * Offset 60-67:  sys_indexes_root (u64, version 3 only)
 */

/// In-memory form of metadata page 0.
///
/// Version 2 files lack `sys_indexes_root`; readers accept them, treat the
/// missing root as 0, and upgrade in place by writing version 3 on the next
/// save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub next_page_id: PageId,
    pub free_list_head: PageId,
    pub sys_tables_root: PageId,
    pub sys_fields_root: PageId,
    pub version: u32,
    pub created_timestamp: u64,
    pub sys_indexes_root: PageId,
}

impl Default for DatabaseHeader {
    fn default() -> Self {
        Self {
            next_page_id: 1,
            free_list_head: 0,
            sys_tables_root: 0,
            sys_fields_root: 0,
            version: DB_VERSION,
            created_timestamp: chrono::Utc::now().timestamp() as u64,
            sys_indexes_root: 0,
        }
    }
}

impl DatabaseHeader {
    /// Serialize into a full page-0 frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; PAGE_SIZE];

        buffer[0..16].copy_from_slice(DB_SIGNATURE);
        buffer[16..24].copy_from_slice(&self.next_page_id.to_le_bytes());
        buffer[24..32].copy_from_slice(&self.free_list_head.to_le_bytes());
        buffer[32..40].copy_from_slice(&self.sys_tables_root.to_le_bytes());
        buffer[40..48].copy_from_slice(&self.sys_fields_root.to_le_bytes());
        buffer[48..52].copy_from_slice(&self.version.to_le_bytes());
        buffer[52..60].copy_from_slice(&self.created_timestamp.to_le_bytes());
        buffer[60..68].copy_from_slice(&self.sys_indexes_root.to_le_bytes());

        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() < PAGE_SIZE {
            return Err(DatabaseError::CorruptDatabase {
                reason: "Metadata page too short".to_string(),
            });
        }

        if &bytes[0..16] != DB_SIGNATURE {
            return Err(DatabaseError::CorruptDatabase {
                reason: "Invalid database file signature".to_string(),
            });
        }

        let next_page_id = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let free_list_head = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        let sys_tables_root = u64::from_le_bytes(bytes[32..40].try_into().unwrap());
        let sys_fields_root = u64::from_le_bytes(bytes[40..48].try_into().unwrap());
        let version = u32::from_le_bytes(bytes[48..52].try_into().unwrap());
        let created_timestamp = u64::from_le_bytes(bytes[52..60].try_into().unwrap());

        let sys_indexes_root = match version {
            2 => 0,
            3 => u64::from_le_bytes(bytes[60..68].try_into().unwrap()),
            other => return Err(DatabaseError::VersionMismatch { found: other }),
        };

        Ok(Self {
            next_page_id,
            free_list_head,
            sys_tables_root,
            sys_fields_root,
            // v2 files are upgraded in place on the next save
            version: DB_VERSION,
            created_timestamp,
            sys_indexes_root,
        })
    }
}
