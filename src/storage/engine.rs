use std::{
    collections::{HashMap, HashSet},
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    storage::header::DatabaseHeader,
    types::{
        PAGE_SIZE, PageId,
        error::{DatabaseError, Result},
        page::{Page, PageType},
    },
};

/// Tunables for the storage layer.
#[derive(Debug, Clone, Copy)]
pub struct StorageConfig {
    /// Maximum number of pages held in the page cache.
    pub cache_size: usize,
    /// Maximum number of B+tree nodes cached per open tree.
    pub node_cache_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_size: 64,
            node_cache_size: 32,
        }
    }
}

/// Page-based storage over a single file.
///
/// Page 0 holds database metadata; all other pages carry the 64-byte page
/// header. Deallocated pages are chained into a free list headed from
/// page 0 and reused before the file grows.
///
/// The page cache is a performance optimization only: correctness does not
/// depend on its size. Mutations are buffered in the cache and written back
/// by `flush_all`, on eviction, or when the dirty set exceeds half the
/// cache capacity.
pub struct StorageEngine {
    path: PathBuf,
    file: File,
    header: DatabaseHeader,
    cache_size: usize,
    node_cache_size: usize,
    page_cache: HashMap<PageId, Page>,
    dirty_pages: HashSet<PageId>,
}

impl StorageEngine {
    pub fn open<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::open_existing(path, config)
        } else {
            Self::create_new(path, config)
        }
    }

    fn create_new(path: &Path, config: StorageConfig) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let header = DatabaseHeader::default();
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;

        debug!(path = %path.display(), "created new database file");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            cache_size: config.cache_size.max(1),
            node_cache_size: config.node_cache_size.max(1),
            page_cache: HashMap::new(),
            dirty_pages: HashSet::new(),
        })
    }

    fn open_existing(path: &Path, config: StorageConfig) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut buffer = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut buffer).map_err(|_| DatabaseError::CorruptDatabase {
            reason: "Cannot read metadata page".to_string(),
        })?;

        let header = DatabaseHeader::from_bytes(&buffer)?;

        debug!(
            path = %path.display(),
            next_page_id = header.next_page_id,
            free_list_head = header.free_list_head,
            "opened existing database file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            cache_size: config.cache_size.max(1),
            node_cache_size: config.node_cache_size.max(1),
            page_cache: HashMap::new(),
            dirty_pages: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of page ids handed out, including page 0.
    pub fn page_count(&self) -> u64 {
        self.header.next_page_id
    }

    /// Node-cache capacity handed to each open B+tree.
    pub fn node_cache_size(&self) -> usize {
        self.node_cache_size
    }

    /// Allocates a page, reusing the free list head when one is available.
    pub fn allocate_page(&mut self, page_type: PageType) -> Result<PageId> {
        let page_id = if self.header.free_list_head != 0 {
            let page_id = self.header.free_list_head;
            let page = self.read_page(page_id)?;
            self.header.free_list_head = page.next_page_id;
            debug!(page_id, "reusing page from free list");

            let page = Page::new(page_id, page_type);
            self.write_page(page_id, page)?;
            page_id
        } else {
            let page_id = self.header.next_page_id;
            self.header.next_page_id += 1;

            let page = Page::new(page_id, page_type);
            self.write_page(page_id, page)?;
            page_id
        };

        self.save_metadata()?;
        Ok(page_id)
    }

    /// Clears a page and pushes it onto the free list.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if page_id == 0 {
            return Err(DatabaseError::InvalidArgument {
                details: "Cannot deallocate metadata page".to_string(),
            });
        }

        let mut page = self.read_page(page_id)?;
        page.clear();
        page.page_type = PageType::Free;
        page.next_page_id = self.header.free_list_head;
        self.header.free_list_head = page_id;
        self.write_page(page_id, page)?;

        self.save_metadata()
    }

    /// Reads a page, serving it from the cache when present.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id == 0 {
            return Err(DatabaseError::InvalidArgument {
                details: "Page 0 is the metadata page".to_string(),
            });
        }

        if let Some(page) = self.page_cache.get(&page_id) {
            return Ok(page.clone());
        }

        let mut buffer = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(page_id * PAGE_SIZE as u64))?;
        self.file.read_exact(&mut buffer)?;

        let page = Page::from_bytes(&buffer)?;
        if !page.validate_checksum() {
            return Err(DatabaseError::CorruptPage {
                page_id,
                reason: "Checksum mismatch".to_string(),
            });
        }

        if self.page_cache.len() >= self.cache_size {
            self.evict_page()?;
        }
        self.page_cache.insert(page_id, page.clone());

        Ok(page)
    }

    /// Caches the page and marks it dirty; actual I/O is deferred.
    pub fn write_page(&mut self, page_id: PageId, page: Page) -> Result<()> {
        self.page_cache.insert(page_id, page);
        self.dirty_pages.insert(page_id);

        if self.dirty_pages.len() > self.cache_size / 2 {
            self.flush_all()?;
        }

        Ok(())
    }

    /// Writes every dirty page (checksummed) and syncs the file.
    pub fn flush_all(&mut self) -> Result<()> {
        if self.dirty_pages.is_empty() {
            return Ok(());
        }

        let dirty: Vec<PageId> = self.dirty_pages.iter().copied().collect();
        for page_id in dirty {
            if let Some(page) = self.page_cache.get_mut(&page_id) {
                page.update_checksum();
                let bytes = page.to_bytes();
                self.file.seek(SeekFrom::Start(page_id * PAGE_SIZE as u64))?;
                self.file.write_all(&bytes)?;
            }
        }

        self.dirty_pages.clear();
        self.file.sync_all()?;
        Ok(())
    }

    fn flush_page(&mut self, page_id: PageId) -> Result<()> {
        if !self.dirty_pages.contains(&page_id) {
            return Ok(());
        }

        if let Some(page) = self.page_cache.get_mut(&page_id) {
            page.update_checksum();
            let bytes = page.to_bytes();
            self.file.seek(SeekFrom::Start(page_id * PAGE_SIZE as u64))?;
            self.file.write_all(&bytes)?;
        }

        self.dirty_pages.remove(&page_id);
        Ok(())
    }

    /// Evicts one cached page, preferring a clean one.
    fn evict_page(&mut self) -> Result<()> {
        if let Some(&victim) = self
            .page_cache
            .keys()
            .find(|id| !self.dirty_pages.contains(*id))
        {
            self.page_cache.remove(&victim);
            return Ok(());
        }

        // All cached pages are dirty: write one back, then drop it.
        if let Some(&victim) = self.page_cache.keys().next() {
            self.flush_page(victim)?;
            self.page_cache.remove(&victim);
        }
        Ok(())
    }

    pub fn sys_tables_root(&self) -> PageId {
        self.header.sys_tables_root
    }

    pub fn sys_fields_root(&self) -> PageId {
        self.header.sys_fields_root
    }

    pub fn sys_indexes_root(&self) -> PageId {
        self.header.sys_indexes_root
    }

    pub fn set_sys_tables_root(&mut self, root: PageId) -> Result<()> {
        self.header.sys_tables_root = root;
        self.save_metadata()
    }

    pub fn set_sys_fields_root(&mut self, root: PageId) -> Result<()> {
        self.header.sys_fields_root = root;
        self.save_metadata()
    }

    pub fn set_sys_indexes_root(&mut self, root: PageId) -> Result<()> {
        self.header.sys_indexes_root = root;
        self.save_metadata()
    }

    /// Writes the metadata page in place.
    fn save_metadata(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        Ok(())
    }
}

impl Drop for StorageEngine {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all() {
            warn!(error = %err, "flush on drop failed");
        }
    }
}
