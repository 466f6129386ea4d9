use serde::{Deserialize, Serialize};

use crate::types::{PAGE_DATA_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, PageId, error::DatabaseError};

/// Magic bytes at the start of every page header.
pub const PAGE_MAGIC: [u8; 4] = *b"LQL1";

/// Current page format version.
pub const PAGE_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    Free = 0,
    Data = 1,
    Index = 2,
    Metadata = 3,
    Overflow = 4,
}

impl PageType {
    pub fn from_u8(value: u8) -> Result<Self, DatabaseError> {
        match value {
            0 => Ok(PageType::Free),
            1 => Ok(PageType::Data),
            2 => Ok(PageType::Index),
            3 => Ok(PageType::Metadata),
            4 => Ok(PageType::Overflow),
            _ => Err(DatabaseError::CorruptDatabase {
                reason: format!("Invalid page type: {}", value),
            }),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/*
 * Page Layout on Disk (4096 bytes)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (64 bytes)                       │
 * │  magic(4) | page_id(8) | page_type(1) | version(1) |            │
 * │  record_count(2) | free_space_offset(2) | next_page_id(8) |     │
 * │  checksum(4) | reserved(34)                                     │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    PAYLOAD (4032 bytes)                         │
 * └─────────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_id: PageId,
    pub page_type: PageType,
    pub version: u8,
    pub record_count: u16,
    pub free_space_offset: u16,
    pub next_page_id: PageId,
    pub checksum: u32,
    data: Vec<u8>,
}

impl Page {
    pub fn new(page_id: PageId, page_type: PageType) -> Self {
        Self {
            page_id,
            page_type,
            version: PAGE_VERSION,
            record_count: 0,
            free_space_offset: PAGE_HEADER_SIZE as u16,
            next_page_id: 0,
            checksum: 0,
            data: vec![0; PAGE_DATA_SIZE],
        }
    }

    /// Serialize the page to a full 4096-byte frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; PAGE_SIZE];

        buffer[0..4].copy_from_slice(&PAGE_MAGIC);
        buffer[4..12].copy_from_slice(&self.page_id.to_le_bytes());
        buffer[12] = self.page_type.as_u8();
        buffer[13] = self.version;
        buffer[14..16].copy_from_slice(&self.record_count.to_le_bytes());
        buffer[16..18].copy_from_slice(&self.free_space_offset.to_le_bytes());
        buffer[18..26].copy_from_slice(&self.next_page_id.to_le_bytes());
        buffer[26..30].copy_from_slice(&self.checksum.to_le_bytes());
        // bytes 30..64 reserved

        buffer[PAGE_HEADER_SIZE..].copy_from_slice(&self.data);
        buffer
    }

    /// Deserialize a page from a full 4096-byte frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::CorruptDatabase {
                reason: format!("Invalid page size: expected {}, got {}", PAGE_SIZE, bytes.len()),
            });
        }

        let page_id = u64::from_le_bytes(bytes[4..12].try_into().unwrap());

        if bytes[0..4] != PAGE_MAGIC {
            return Err(DatabaseError::CorruptPage {
                page_id,
                reason: "Invalid page magic".to_string(),
            });
        }

        let page_type = PageType::from_u8(bytes[12]).map_err(|_| DatabaseError::CorruptPage {
            page_id,
            reason: format!("Invalid page type: {}", bytes[12]),
        })?;
        let version = bytes[13];
        let record_count = u16::from_le_bytes(bytes[14..16].try_into().unwrap());
        let free_space_offset = u16::from_le_bytes(bytes[16..18].try_into().unwrap());
        let next_page_id = u64::from_le_bytes(bytes[18..26].try_into().unwrap());
        let checksum = u32::from_le_bytes(bytes[26..30].try_into().unwrap());

        if (free_space_offset as usize) < PAGE_HEADER_SIZE
            || (free_space_offset as usize) > PAGE_SIZE
        {
            return Err(DatabaseError::CorruptPage {
                page_id,
                reason: format!("Invalid free_space_offset: {}", free_space_offset),
            });
        }

        let data = bytes[PAGE_HEADER_SIZE..].to_vec();

        Ok(Page {
            page_id,
            page_type,
            version,
            record_count,
            free_space_offset,
            next_page_id,
            checksum,
            data,
        })
    }

    /// Payload view (4032 bytes after the header).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn write_data(&mut self, offset: usize, src: &[u8]) -> Result<(), DatabaseError> {
        if offset + src.len() > PAGE_DATA_SIZE {
            return Err(DatabaseError::OutOfBounds {
                offset,
                len: src.len(),
            });
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    pub fn read_data(&self, offset: usize, len: usize) -> Result<&[u8], DatabaseError> {
        if offset + len > PAGE_DATA_SIZE {
            return Err(DatabaseError::OutOfBounds { offset, len });
        }
        Ok(&self.data[offset..offset + len])
    }

    pub fn available_space(&self) -> usize {
        PAGE_DATA_SIZE - (self.free_space_offset as usize - PAGE_HEADER_SIZE)
    }

    pub fn can_fit(&self, size: usize) -> bool {
        self.available_space() >= size
    }

    /// Reset to an empty free page, preserving the page id.
    pub fn clear(&mut self) {
        self.page_type = PageType::Free;
        self.version = PAGE_VERSION;
        self.record_count = 0;
        self.free_space_offset = PAGE_HEADER_SIZE as u16;
        self.next_page_id = 0;
        self.checksum = 0;
        self.data.fill(0);
    }

    fn compute_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.data);
        hasher.finalize()
    }

    pub fn update_checksum(&mut self) {
        self.checksum = self.compute_checksum();
    }

    pub fn validate_checksum(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}
