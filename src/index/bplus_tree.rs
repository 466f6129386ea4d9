use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use tracing::debug;

use crate::{
    codec::{BinaryReader, BinaryWriter, Codec},
    index::cursor::BatchCursor,
    storage::StorageEngine,
    types::{
        PAGE_DATA_SIZE, PageId,
        error::{DatabaseError, Result},
        page::{Page, PageType},
    },
};

/// B+tree order: maximum children per internal node.
pub const ORDER: usize = 4;
pub const MAX_KEYS: usize = ORDER - 1;
pub const MIN_KEYS: usize = ORDER / 2 - 1;

/// Total order used for tree keys. Incomparable pairs (NaN) collapse to
/// `Equal`, which keeps traversal deterministic.
pub(crate) fn cmp_keys<K: PartialOrd>(a: &K, b: &K) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// One B+tree node, occupying a single INDEX page.
///
/// Leaves hold all `(key, value)` pairs in sorted order and are doubly
/// linked through `next_page_id`/`prev_page_id`. Internal nodes hold only
/// separator keys and child page ids.
#[derive(Debug, Clone)]
pub struct Node<K, V> {
    pub page_id: PageId,
    pub is_leaf: bool,
    pub next_page_id: PageId,
    pub prev_page_id: PageId,
    pub keys: Vec<K>,
    pub values: Vec<V>,
    pub children: Vec<PageId>,
}

impl<K: Codec, V: Codec> Node<K, V> {
    fn new(page_id: PageId, is_leaf: bool) -> Self {
        Self {
            page_id,
            is_leaf,
            next_page_id: 0,
            prev_page_id: 0,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u64(self.page_id);
        writer.write_bool(self.is_leaf);
        writer.write_u64(self.next_page_id);
        writer.write_u64(self.prev_page_id);

        writer.write_u32(self.keys.len() as u32);
        for key in &self.keys {
            key.encode(writer);
        }

        writer.write_u32(self.values.len() as u32);
        for value in &self.values {
            value.encode(writer);
        }

        writer.write_u32(self.children.len() as u32);
        for child in &self.children {
            writer.write_u64(*child);
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let page_id = reader.read_u64()?;
        let is_leaf = reader.read_bool()?;
        let next_page_id = reader.read_u64()?;
        let prev_page_id = reader.read_u64()?;

        let key_count = reader.read_u32()? as usize;
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            keys.push(K::decode(reader)?);
        }

        let value_count = reader.read_u32()? as usize;
        let mut values = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            values.push(V::decode(reader)?);
        }

        let child_count = reader.read_u32()? as usize;
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            children.push(reader.read_u64()?);
        }

        Ok(Self {
            page_id,
            is_leaf,
            next_page_id,
            prev_page_id,
            keys,
            values,
            children,
        })
    }
}

/// Persistent ordered map `K -> V` over INDEX pages.
///
/// Splits follow the duplicate-separator B+tree convention: a leaf split
/// copies the first key of the new right leaf into the parent (both copies
/// coexist); an internal split pushes the middle key up. Routing in
/// internals picks the first child whose separator is strictly greater
/// than the key, so keys equal to a separator descend right.
///
/// Mutations are memory-only until `flush`; deletion never rebalances and
/// only prunes an emptied internal root.
pub struct BPlusTree<K, V> {
    storage: Rc<RefCell<StorageEngine>>,
    root_page_id: PageId,
    size: usize,
    node_cache: HashMap<PageId, Node<K, V>>,
    dirty_nodes: HashSet<PageId>,
    cache_size: usize,
}

impl<K, V> BPlusTree<K, V>
where
    K: Codec + Clone + PartialOrd + std::fmt::Debug,
    V: Codec + Clone,
{
    /// Opens an existing tree rooted at `root_page_id`, or creates an
    /// empty one when the root is 0.
    pub fn open(storage: Rc<RefCell<StorageEngine>>, root_page_id: PageId) -> Result<Self> {
        let cache_size = storage.borrow().node_cache_size();
        let mut tree = Self {
            storage,
            root_page_id,
            size: 0,
            node_cache: HashMap::new(),
            dirty_nodes: HashSet::new(),
            cache_size,
        };

        if tree.root_page_id == 0 {
            tree.root_page_id = tree.allocate_node(true)?;
        } else {
            tree.size = tree.count_entries()?;
        }

        Ok(tree)
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Inserts a key-value pair. Returns false (without updating) when an
    /// equal key is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool> {
        let root = self.load_node(self.root_page_id)?;
        if root.keys.len() >= MAX_KEYS {
            let new_root_id = self.allocate_node(false)?;
            let mut new_root = self.load_node(new_root_id)?;
            new_root.children.push(self.root_page_id);
            self.split_child(&mut new_root, 0)?;
            debug!(old_root = self.root_page_id, new_root = new_root_id, "root split");
            self.root_page_id = new_root_id;
        }

        let root = self.load_node(self.root_page_id)?;
        let inserted = self.insert_non_full(root, key, value)?;
        if inserted {
            self.size += 1;
        }
        Ok(inserted)
    }

    pub fn find(&mut self, key: &K) -> Result<Option<V>> {
        let leaf_id = self.find_leaf_for_key(self.root_page_id, key)?;
        let leaf = self.load_node(leaf_id)?;

        for (i, k) in leaf.keys.iter().enumerate() {
            match cmp_keys(key, k) {
                Ordering::Equal => return Ok(Some(leaf.values[i].clone())),
                Ordering::Less => return Ok(None),
                Ordering::Greater => {}
            }
        }
        Ok(None)
    }

    pub fn contains(&mut self, key: &K) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Removes a key. No rebalancing: leaves may become under-full; an
    /// internal root left without keys promotes its only child.
    pub fn remove(&mut self, key: &K) -> Result<bool> {
        let root = self.load_node(self.root_page_id)?;
        let removed = self.remove_from_node(root, key)?;

        let root = self.load_node(self.root_page_id)?;
        if !root.is_leaf && root.keys.is_empty() && !root.children.is_empty() {
            let old_root_id = self.root_page_id;
            self.root_page_id = root.children[0];
            self.deallocate_node(old_root_id)?;
        }

        if removed {
            self.size -= 1;
        }
        Ok(removed)
    }

    /// All values with `min <= key <= max`, in ascending key order.
    pub fn range(&mut self, min: &K, max: &K) -> Result<Vec<V>> {
        let mut results = Vec::new();
        let mut leaf_id = self.find_leaf_for_key(self.root_page_id, min)?;

        while leaf_id != 0 {
            let leaf = self.load_node(leaf_id)?;
            for (i, key) in leaf.keys.iter().enumerate() {
                if cmp_keys(key, min) == Ordering::Less {
                    continue;
                }
                if cmp_keys(key, max) == Ordering::Greater {
                    return Ok(results);
                }
                results.push(leaf.values[i].clone());
            }
            leaf_id = leaf.next_page_id;
        }

        Ok(results)
    }

    /// Every `(key, value)` pair in ascending key order.
    pub fn all(&mut self) -> Result<Vec<(K, V)>> {
        let mut results = Vec::with_capacity(self.size);
        let mut leaf_id = self.find_leftmost_leaf(self.root_page_id)?;

        while leaf_id != 0 {
            let leaf = self.load_node(leaf_id)?;
            for (i, key) in leaf.keys.iter().enumerate() {
                results.push((key.clone(), leaf.values[i].clone()));
            }
            leaf_id = leaf.next_page_id;
        }

        Ok(results)
    }

    pub fn batch_cursor(&mut self, batch_size: usize) -> Result<BatchCursor<'_, K, V>> {
        BatchCursor::new(self, batch_size)
    }

    /// Writes every dirty node to its page and flushes the storage engine.
    pub fn flush(&mut self) -> Result<()> {
        let dirty: Vec<PageId> = self.dirty_nodes.iter().copied().collect();
        for page_id in dirty {
            if let Some(node) = self.node_cache.get(&page_id) {
                let node = node.clone();
                self.write_node_to_page(&node)?;
            }
        }
        self.dirty_nodes.clear();
        self.storage.borrow_mut().flush_all()
    }

    /// Deallocates every node page of this tree. The tree is unusable
    /// afterwards; used by `drop_table` sweeps.
    pub fn destroy(&mut self) -> Result<()> {
        if self.root_page_id == 0 {
            return Ok(());
        }
        let root = self.root_page_id;
        self.free_subtree(root)?;
        self.node_cache.clear();
        self.dirty_nodes.clear();
        self.root_page_id = 0;
        self.size = 0;
        Ok(())
    }

    fn free_subtree(&mut self, node_id: PageId) -> Result<()> {
        let node = self.load_node(node_id)?;
        if !node.is_leaf {
            for child in node.children.clone() {
                self.free_subtree(child)?;
            }
        }
        self.deallocate_node(node_id)
    }

    fn allocate_node(&mut self, is_leaf: bool) -> Result<PageId> {
        let page_id = self.storage.borrow_mut().allocate_page(PageType::Index)?;
        let node = Node::new(page_id, is_leaf);
        self.save_node(node);
        Ok(page_id)
    }

    fn deallocate_node(&mut self, page_id: PageId) -> Result<()> {
        // Invalidate before the page can be recycled for another node.
        self.node_cache.remove(&page_id);
        self.dirty_nodes.remove(&page_id);
        self.storage.borrow_mut().deallocate_page(page_id)
    }

    pub(crate) fn load_node(&mut self, page_id: PageId) -> Result<Node<K, V>> {
        if let Some(node) = self.node_cache.get(&page_id) {
            return Ok(node.clone());
        }

        let page = self.storage.borrow_mut().read_page(page_id)?;
        let mut reader = BinaryReader::new(page.data());
        let node = Node::decode(&mut reader).map_err(|err| DatabaseError::CorruptPage {
            page_id,
            reason: format!("Cannot decode B+tree node: {}", err),
        })?;

        if self.node_cache.len() >= self.cache_size {
            self.evict_node()?;
        }
        self.node_cache.insert(page_id, node.clone());

        Ok(node)
    }

    fn save_node(&mut self, node: Node<K, V>) {
        self.dirty_nodes.insert(node.page_id);
        self.node_cache.insert(node.page_id, node);
    }

    fn write_node_to_page(&mut self, node: &Node<K, V>) -> Result<()> {
        let mut writer = BinaryWriter::with_capacity(256);
        node.encode(&mut writer);

        if writer.len() > PAGE_DATA_SIZE {
            return Err(DatabaseError::NodeTooLarge {
                page_id: node.page_id,
                size: writer.len(),
                max: PAGE_DATA_SIZE,
            });
        }

        let mut page = Page::new(node.page_id, PageType::Index);
        page.write_data(0, writer.as_slice())?;
        self.storage.borrow_mut().write_page(node.page_id, page)
    }

    fn evict_node(&mut self) -> Result<()> {
        if let Some(&victim) = self
            .node_cache
            .keys()
            .find(|id| !self.dirty_nodes.contains(*id))
        {
            self.node_cache.remove(&victim);
            return Ok(());
        }

        // All cached nodes are dirty: write one back, then drop it.
        if let Some(&victim) = self.node_cache.keys().next() {
            if let Some(node) = self.node_cache.get(&victim) {
                let node = node.clone();
                self.write_node_to_page(&node)?;
            }
            self.dirty_nodes.remove(&victim);
            self.node_cache.remove(&victim);
        }
        Ok(())
    }

    /// First child index whose separator is strictly greater than `key`,
    /// falling back to the last child.
    fn child_index(node: &Node<K, V>, key: &K) -> usize {
        let mut i = 0;
        while i < node.keys.len() && cmp_keys(key, &node.keys[i]) != Ordering::Less {
            i += 1;
        }
        i
    }

    /// Leaf insert position: first index with `keys[i] >= key`.
    fn insert_position(node: &Node<K, V>, key: &K) -> usize {
        let mut i = 0;
        while i < node.keys.len() && cmp_keys(&node.keys[i], key) == Ordering::Less {
            i += 1;
        }
        i
    }

    fn insert_non_full(&mut self, mut node: Node<K, V>, key: K, value: V) -> Result<bool> {
        if node.is_leaf {
            let pos = Self::insert_position(&node, &key);
            if pos < node.keys.len() && cmp_keys(&node.keys[pos], &key) == Ordering::Equal {
                return Ok(false);
            }
            node.keys.insert(pos, key);
            node.values.insert(pos, value);
            self.save_node(node);
            return Ok(true);
        }

        let mut i = Self::child_index(&node, &key);
        let child = self.load_node(node.children[i])?;
        if child.keys.len() >= MAX_KEYS {
            self.split_child(&mut node, i)?;
            // Separator key k routes keys >= k to the new right sibling.
            if cmp_keys(&key, &node.keys[i]) != Ordering::Less {
                i += 1;
            }
        }
        let child = self.load_node(node.children[i])?;
        self.insert_non_full(child, key, value)
    }

    fn split_child(&mut self, parent: &mut Node<K, V>, index: usize) -> Result<()> {
        let child_id = parent.children[index];
        let mut full_child = self.load_node(child_id)?;
        let new_node_id = self.allocate_node(full_child.is_leaf)?;
        let mut new_node = self.load_node(new_node_id)?;

        let mid = MAX_KEYS / 2;

        if full_child.is_leaf {
            // Leaf split: the first key of the new right leaf is copied up
            // as the separator; both copies coexist.
            new_node.keys = full_child.keys.split_off(mid);
            new_node.values = full_child.values.split_off(mid);

            new_node.next_page_id = full_child.next_page_id;
            new_node.prev_page_id = full_child.page_id;
            full_child.next_page_id = new_node_id;

            if new_node.next_page_id != 0 {
                let mut next_leaf = self.load_node(new_node.next_page_id)?;
                next_leaf.prev_page_id = new_node_id;
                self.save_node(next_leaf);
            }

            parent.keys.insert(index, new_node.keys[0].clone());
            parent.children.insert(index + 1, new_node_id);
        } else {
            // Internal split: the middle key is pushed up, not copied.
            let up_key = full_child.keys[mid].clone();
            new_node.keys = full_child.keys.split_off(mid + 1);
            full_child.keys.truncate(mid);
            new_node.children = full_child.children.split_off(mid + 1);

            parent.keys.insert(index, up_key);
            parent.children.insert(index + 1, new_node_id);
        }

        self.save_node(full_child);
        self.save_node(new_node);
        self.save_node(parent.clone());
        Ok(())
    }

    fn remove_from_node(&mut self, mut node: Node<K, V>, key: &K) -> Result<bool> {
        if node.is_leaf {
            for i in 0..node.keys.len() {
                match cmp_keys(key, &node.keys[i]) {
                    Ordering::Equal => {
                        node.keys.remove(i);
                        node.values.remove(i);
                        self.save_node(node);
                        return Ok(true);
                    }
                    Ordering::Less => return Ok(false),
                    Ordering::Greater => {}
                }
            }
            return Ok(false);
        }

        let i = Self::child_index(&node, key);
        let child = self.load_node(node.children[i])?;
        self.remove_from_node(child, key)
    }

    pub(crate) fn find_leaf_for_key(&mut self, node_id: PageId, key: &K) -> Result<PageId> {
        let mut current = node_id;
        loop {
            let node = self.load_node(current)?;
            if node.is_leaf {
                return Ok(current);
            }
            current = node.children[Self::child_index(&node, key)];
        }
    }

    pub(crate) fn find_leftmost_leaf(&mut self, node_id: PageId) -> Result<PageId> {
        let mut current = node_id;
        loop {
            let node = self.load_node(current)?;
            if node.is_leaf {
                return Ok(current);
            }
            current = node.children[0];
        }
    }

    fn count_entries(&mut self) -> Result<usize> {
        let mut count = 0;
        let mut leaf_id = self.find_leftmost_leaf(self.root_page_id)?;
        while leaf_id != 0 {
            let leaf = self.load_node(leaf_id)?;
            count += leaf.keys.len();
            leaf_id = leaf.next_page_id;
        }
        Ok(count)
    }
}
