use crate::{
    codec::Codec,
    index::bplus_tree::BPlusTree,
    types::{PageId, error::Result},
};

/// Stateful forward iterator over a B+tree, yielding `(key, value)` pairs
/// in fixed-size batches by walking the leaf chain.
///
/// The cursor borrows the tree mutably so it observes unflushed nodes
/// through the node cache. Keys are visited in strict ascending order;
/// mutating the tree during iteration is undefined.
pub struct BatchCursor<'t, K, V> {
    tree: &'t mut BPlusTree<K, V>,
    root_page_id: PageId,
    current_leaf_id: PageId,
    current_index: usize,
    exhausted: bool,
    batch_size: usize,
}

impl<'t, K, V> BatchCursor<'t, K, V>
where
    K: Codec + Clone + PartialOrd + std::fmt::Debug,
    V: Codec + Clone,
{
    pub(crate) fn new(tree: &'t mut BPlusTree<K, V>, batch_size: usize) -> Result<Self> {
        let root_page_id = tree.root_page_id();
        let current_leaf_id = tree.find_leftmost_leaf(root_page_id)?;

        Ok(Self {
            tree,
            root_page_id,
            current_leaf_id,
            current_index: 0,
            exhausted: current_leaf_id == 0,
            batch_size: batch_size.max(1),
        })
    }

    pub fn has_more(&self) -> bool {
        !self.exhausted && self.current_leaf_id != 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns up to `batch_size` pairs, advancing through the leaf chain.
    /// An empty vector means the cursor is exhausted.
    pub fn next_batch(&mut self) -> Result<Vec<(K, V)>> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while self.has_more() && batch.len() < self.batch_size {
            let leaf = self.tree.load_node(self.current_leaf_id)?;

            while self.current_index < leaf.keys.len() && batch.len() < self.batch_size {
                batch.push((
                    leaf.keys[self.current_index].clone(),
                    leaf.values[self.current_index].clone(),
                ));
                self.current_index += 1;
            }

            if self.current_index >= leaf.keys.len() {
                self.current_leaf_id = leaf.next_page_id;
                self.current_index = 0;
                if self.current_leaf_id == 0 {
                    self.exhausted = true;
                }
            }
        }

        Ok(batch)
    }

    /// Returns the cursor to the leftmost leaf.
    pub fn reset(&mut self) -> Result<()> {
        self.current_index = 0;
        self.current_leaf_id = self.tree.find_leftmost_leaf(self.root_page_id)?;
        self.exhausted = self.current_leaf_id == 0;
        Ok(())
    }
}
