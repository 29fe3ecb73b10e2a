//! Mutation engine: entry insert, remove and update, with lazy splits,
//! threshold merges and accumulator propagation along the live path.
//!
//! Splits happen only when a node write reports out-of-memory. Every node
//! edit is decoded, applied and committed whole, so a failed write leaves
//! the block as it was and the split can start from a clean copy.

#![allow(clippy::cast_possible_truncation)]

use tracing::{debug, warn};

use crate::btree::accumulator::AccumulatorDelta;
use crate::btree::cursor::Cursor;
use crate::btree::node::{NODE_HEADER_SIZE, Node};
use crate::btree::path::TreePath;
use crate::btree::tree::{Tree, TreeError};
use crate::store::BlockStore;

impl<S: BlockStore> Tree<S> {
    /// Insert `row` before the cursor's entry, or at the end for an end
    /// cursor. The cursor is left on the new entry.
    pub fn ctr_insert(
        &mut self,
        cursor: &mut Cursor,
        row: &[u64],
    ) -> Result<AccumulatorDelta, TreeError> {
        self.schema.validate_row(row)?;
        if cursor.is_before_begin() {
            *cursor = self.begin()?;
        }
        let position = cursor.position();
        let delta = AccumulatorDelta::adding(&self.schema.row_accumulator(row)?)?;

        let mut path = cursor.path.clone();
        self.check_update_up(&path, 0, &delta)?;
        let mut leaf = self.load(path.leaf()?)?;
        leaf.insert_entry(&self.schema, cursor.idx, row)?;
        match self.save(&leaf) {
            Ok(()) => {}
            Err(e) if e.is_out_of_memory() => {
                path = self.insert_with_split(path, cursor.idx, row)?;
            }
            Err(e) => return Err(e),
        }

        self.update_up(&path, 0, &delta)?;
        *cursor = self.seek(position)?;
        Ok(delta)
    }

    /// Split the full leaf on `path` and insert into the half that covers
    /// `idx`. Returns the path to the leaf that took the entry.
    fn insert_with_split(
        &mut self,
        mut path: TreePath,
        idx: usize,
        row: &[u64],
    ) -> Result<TreePath, TreeError> {
        let leaf = self.load(path.leaf()?)?;
        let mut probe = leaf.sibling(leaf.id());
        probe.insert_entry(&self.schema, 0, row)?;
        if leaf.size() == 0 || !probe.fits(self.config.block_size) {
            warn!(block_size = self.config.block_size, "entry does not fit in an empty node");
            return Err(TreeError::EntryTooLarge {
                block_size: self.config.block_size,
            });
        }

        let size = leaf.size();
        let at = if size == 1 { idx } else { size.div_ceil(2) };
        let right_path = self.split_path(&mut path, 0, at)?;

        let into_left = idx < at || (idx == at && at <= size - at);
        let (mut target_path, local) = if into_left {
            (path, idx)
        } else {
            (right_path, idx - at)
        };

        let mut target = self.load(target_path.leaf()?)?;
        target.insert_entry(&self.schema, local, row)?;
        match self.save(&target) {
            Ok(()) => {}
            Err(e) if e.is_out_of_memory() => {
                warn!(
                    node = target.id(),
                    block_size = self.config.block_size,
                    "entry does not fit after split"
                );
                return Err(TreeError::EntryTooLarge {
                    block_size: self.config.block_size,
                });
            }
            Err(e) => return Err(e),
        }
        target_path.set(0, target.id())?;
        Ok(target_path)
    }

    /// Split the node at `level` of `path`, moving entries `[at, size)` to a
    /// new right sibling, and register the sibling with the parent. A full
    /// parent is split in turn; splitting the root grows the tree by one
    /// level.
    ///
    /// `path` is kept pointing at the left half. The returned path points at
    /// the right half and shares every level above `level` with `path`.
    pub(super) fn split_path(
        &mut self,
        path: &mut TreePath,
        level: usize,
        at: usize,
    ) -> Result<TreePath, TreeError> {
        let mut node = self.load(path.get(level)?)?;
        let new_id = self.store.allocate_block(self.config.block_size)?;
        let mut right = node.sibling(new_id);
        node.split_to(&mut right, at)?;
        let was_root = node.is_root();
        node.set_root(false);
        self.save(&node)?;
        self.save(&right)?;
        debug!(level, node = node.id(), sibling = new_id, at, "split node");

        let left_acc = node.accumulator(&self.schema)?;
        let right_acc = right.accumulator(&self.schema)?;
        let mut right_path = path.clone();
        right_path.set(level, new_id)?;

        if was_root {
            let root_id = self.store.allocate_block(self.config.block_size)?;
            let mut root = Node::new_branch(&self.schema, root_id, (level + 1) as u16);
            root.set_root(true);
            root.insert_child(0, node.id(), &left_acc)?;
            root.insert_child(1, new_id, &right_acc)?;
            self.save(&root)?;
            debug!(root = root_id, level = level + 1, "new root");
            self.root = root_id;
            path.add_root(root_id);
            right_path.add_root(root_id);
            return Ok(right_path);
        }

        let parent_level = level + 1;
        let mut parent = self.load(path.get(parent_level)?)?;
        let ci = parent.child_index(node.id())?;
        parent.set_child_accumulator(ci, &left_acc)?;
        parent.insert_child(ci + 1, new_id, &right_acc)?;
        match self.save(&parent) {
            Ok(()) => return Ok(right_path),
            Err(e) if e.is_out_of_memory() => {}
            Err(e) => return Err(e),
        }

        // The parent still holds the pre-split accumulator for `ci`, which
        // equals the sum of both halves, so its own totals are current.
        let pat = self.load(path.get(parent_level)?)?.size().div_ceil(2);
        let parent_right = self.split_path(path, parent_level, pat)?;
        let (holder, local) = if ci < pat {
            (path.get(parent_level)?, ci)
        } else {
            (parent_right.get(parent_level)?, ci - pat)
        };
        let mut parent = self.load(holder)?;
        parent.set_child_accumulator(local, &left_acc)?;
        parent.insert_child(local + 1, new_id, &right_acc)?;
        self.save(&parent)?;

        if ci >= pat {
            path.copy_from(&parent_right, parent_level);
        }
        right_path.copy_from(path, parent_level);
        Ok(right_path)
    }

    /// Fail without writing anything if `delta` would push the tree total or
    /// any ancestor accumulator of the node at `level` out of range.
    ///
    /// Run before the first save of an edit so that [`Self::update_up`] cannot
    /// fail halfway up the path.
    fn check_update_up(
        &self,
        path: &TreePath,
        level: usize,
        delta: &AccumulatorDelta,
    ) -> Result<(), TreeError> {
        if delta.is_zero() {
            return Ok(());
        }
        self.total()?.apply(delta)?;
        for parent_level in level + 1..path.len() {
            let parent = self.load(path.get(parent_level)?)?;
            let ci = parent.child_index(path.get(parent_level - 1)?)?;
            parent.child_accumulator(ci)?.apply(delta)?;
        }
        Ok(())
    }

    /// Apply `delta` to the accumulator of every ancestor of the node at
    /// `level`, one level at a time.
    pub(super) fn update_up(
        &mut self,
        path: &TreePath,
        level: usize,
        delta: &AccumulatorDelta,
    ) -> Result<(), TreeError> {
        if delta.is_zero() {
            return Ok(());
        }
        for parent_level in level + 1..path.len() {
            let child = path.get(parent_level - 1)?;
            let mut parent = self.load(path.get(parent_level)?)?;
            let ci = parent.child_index(child)?;
            let mut acc = parent.child_accumulator(ci)?;
            acc.apply(delta)?;
            parent.set_child_accumulator(ci, &acc)?;
            self.save(&parent)?;
        }
        Ok(())
    }

    /// Remove the cursor's entry. The cursor is left on the entry that
    /// followed it, or on the end sentinel.
    pub fn ctr_remove(&mut self, cursor: &mut Cursor) -> Result<AccumulatorDelta, TreeError> {
        if !cursor.is_valid() {
            return Err(TreeError::InvalidCursor(cursor.state()));
        }
        let position = cursor.position();
        let mut path = cursor.path.clone();
        let mut leaf = self.load(path.leaf()?)?;
        let row = leaf.entry(&self.schema, cursor.idx)?;
        let delta = AccumulatorDelta::removing(&self.schema.row_accumulator(&row)?)?;

        if leaf.size() == 1 && !leaf.is_root() {
            self.remove_node(&mut path, 0)?;
        } else {
            leaf.remove_entry(cursor.idx)?;
            self.save(&leaf)?;
            self.update_up(&path, 0, &delta)?;
            self.try_merge(&mut path, 0)?;
        }
        self.collapse_root()?;

        let size = self.size()?;
        *cursor = self.seek(position.min(size))?;
        Ok(delta)
    }

    /// Overwrite the cursor's entry with `row`.
    pub fn ctr_set(&mut self, cursor: &Cursor, row: &[u64]) -> Result<AccumulatorDelta, TreeError> {
        if !cursor.is_valid() {
            return Err(TreeError::InvalidCursor(cursor.state()));
        }
        self.schema.validate_row(row)?;
        let mut leaf = self.load(cursor.leaf())?;
        let old = self.schema.row_accumulator(&leaf.entry(&self.schema, cursor.idx)?)?;
        let new = self.schema.row_accumulator(row)?;
        let delta = AccumulatorDelta::between(&old, &new)?;
        self.check_update_up(&cursor.path, 0, &delta)?;

        leaf.set_entry(&self.schema, cursor.idx, row)?;
        self.save(&leaf)?;
        self.update_up(&cursor.path, 0, &delta)?;
        Ok(delta)
    }

    /// Detach the node at `level` from its parent and release it. A parent
    /// left without children goes the same way; an emptied root becomes an
    /// empty leaf.
    fn remove_node(&mut self, path: &mut TreePath, level: usize) -> Result<(), TreeError> {
        let id = path.get(level)?;
        let parent_level = level + 1;
        let mut parent = self.load(path.get(parent_level)?)?;
        let ci = parent.child_index(id)?;
        let removed = parent.child_accumulator(ci)?;
        debug!(level, node = id, parent = parent.id(), "remove node");

        if parent.size() == 1 {
            self.store.release(id)?;
            if parent.is_root() {
                let mut leaf = Node::new_leaf(&self.schema, parent.id());
                leaf.set_root(true);
                self.save(&leaf)?;
                path.clear();
                path.add_root(leaf.id());
                debug!(root = leaf.id(), "tree emptied");
                return Ok(());
            }
            return self.remove_node(path, parent_level);
        }

        parent.remove_child(ci)?;
        self.save(&parent)?;
        self.store.release(id)?;
        self.update_up(path, parent_level, &AccumulatorDelta::removing(&removed)?)?;
        self.try_merge(path, parent_level)
    }

    /// Merge the node at `level` into a sibling under the same parent if it
    /// is below the fill threshold and the result fits. The right sibling is
    /// tried first. Repeats one level up after a merge.
    fn try_merge(&mut self, path: &mut TreePath, level: usize) -> Result<(), TreeError> {
        if !self.config.merges_enabled() || level >= path.root_level()? {
            return Ok(());
        }
        let node = self.load(path.get(level)?)?;
        if !self.is_underfull(&node) {
            return Ok(());
        }

        let mut parent = self.load(path.get(level + 1)?)?;
        let ci = parent.child_index(node.id())?;
        let candidates = [Some(ci + 1).filter(|&i| i < parent.size()), ci.checked_sub(1)];
        for sibling_idx in candidates.into_iter().flatten() {
            let sibling = self.load(parent.child(sibling_idx)?)?;
            let (mut left, right, left_idx) = if sibling_idx > ci {
                (node.clone(), sibling, ci)
            } else {
                (sibling, node.clone(), sibling_idx)
            };
            right.merge_into(&mut left)?;
            if !left.fits(self.config.block_size) {
                continue;
            }

            self.save(&left)?;
            parent.remove_child(left_idx + 1)?;
            parent.set_child_accumulator(left_idx, &left.accumulator(&self.schema)?)?;
            self.save(&parent)?;
            self.store.release(right.id())?;
            debug!(level, survivor = left.id(), released = right.id(), "merged nodes");

            path.set(level, left.id())?;
            return self.try_merge(path, level + 1);
        }
        Ok(())
    }

    fn is_underfull(&self, node: &Node) -> bool {
        let client_area = self.config.block_size - NODE_HEADER_SIZE;
        let used = node.used_bytes() - NODE_HEADER_SIZE;
        used * 100 < usize::from(self.config.merge_threshold_percent) * client_area
    }

    /// Replace a root branch that has a single child with that child.
    fn collapse_root(&mut self) -> Result<(), TreeError> {
        loop {
            let root = self.load(self.root)?;
            if root.is_leaf() || root.size() != 1 {
                return Ok(());
            }
            let mut child = self.load(root.child(0)?)?;
            child.set_root(true);
            self.save(&child)?;
            self.store.release(root.id())?;
            debug!(old_root = root.id(), root = child.id(), "collapsed root");
            self.root = child.id();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::btree::accumulator::AccumulatorError;
    use crate::btree::schema::Schema;
    use crate::btree::tree::{Tree, TreeError};
    use crate::config::TreeConfig;
    use crate::packed::StreamSpec;
    use crate::store::{BlockStore, MemoryStore};

    fn keyed_tree(block_size: usize, merge_threshold: u8) -> Tree<MemoryStore> {
        let schema = Schema::new(vec![
            StreamSpec::SumTree { columns: 1 },
            StreamSpec::Array {
                columns: 1,
                indexed: false,
            },
        ])
        .expect("schema");
        let config = TreeConfig::default()
            .with_block_size(block_size)
            .with_merge_threshold(merge_threshold);
        Tree::create(MemoryStore::new(block_size), schema, config).expect("tree")
    }

    fn append(tree: &mut Tree<MemoryStore>, rows: impl IntoIterator<Item = u64>) {
        for value in rows {
            let mut cursor = tree.end().expect("end");
            tree.ctr_insert(&mut cursor, &[1, value]).expect("insert");
        }
    }

    #[test]
    fn test_insert_keeps_cursor_on_new_entry() {
        let mut tree = keyed_tree(512, 50);
        append(&mut tree, [10, 30]);
        let mut cursor = tree.seek(1).expect("seek");
        let delta = tree.ctr_insert(&mut cursor, &[1, 20]).expect("insert");
        assert_eq!(delta.as_slice(), &[1, 1]);
        assert_eq!(cursor.position(), 1);
        assert_eq!(tree.entry(&cursor).expect("entry"), vec![1, 20]);
        assert_eq!(tree.size().expect("size"), 3);
    }

    #[test]
    fn test_growth_splits_and_keeps_order() {
        let mut tree = keyed_tree(256, 50);
        append(&mut tree, 0..500);
        assert!(tree.height().expect("height") >= 2);
        tree.check().expect("consistent");

        let mut cursor = tree.begin().expect("begin");
        for expected in 0..500 {
            assert_eq!(tree.entry(&cursor).expect("entry")[1], expected);
            tree.next(&mut cursor).expect("next");
        }
        assert!(cursor.is_end());
    }

    #[test]
    fn test_front_inserts_split_left_edge() {
        let mut tree = keyed_tree(256, 50);
        for value in 0..300 {
            let mut cursor = tree.begin().expect("begin");
            tree.ctr_insert(&mut cursor, &[1, value]).expect("insert");
        }
        tree.check().expect("consistent");
        let first = tree.begin().expect("begin");
        assert_eq!(tree.entry(&first).expect("entry")[1], 299);
    }

    #[test]
    fn test_remove_everything_shrinks_to_empty_root() {
        let mut tree = keyed_tree(256, 50);
        append(&mut tree, 0..200);
        let mut cursor = tree.seek(50).expect("seek");
        for _ in 0..150 {
            tree.ctr_remove(&mut cursor).expect("remove");
            if cursor.is_end() {
                cursor = tree.begin().expect("begin");
            }
        }
        tree.check().expect("consistent");
        while !tree.is_empty().expect("empty") {
            let mut cursor = tree.begin().expect("begin");
            tree.ctr_remove(&mut cursor).expect("remove");
        }
        tree.check().expect("consistent");
        assert_eq!(tree.height().expect("height"), 0);
        assert_eq!(tree.store().live_blocks(), 1);
    }

    #[test]
    fn test_set_propagates_delta() {
        let mut tree = keyed_tree(256, 50);
        append(&mut tree, 0..100);
        let cursor = tree.seek(70).expect("seek");
        let delta = tree.ctr_set(&cursor, &[5, 7]).expect("set");
        assert_eq!(delta.as_slice(), &[0, 4]);
        assert_eq!(tree.total().expect("total").as_slice(), &[100, 104]);
        tree.check().expect("consistent");
    }

    fn rows(tree: &Tree<MemoryStore>) -> Vec<Vec<u64>> {
        let mut out = Vec::new();
        let mut cursor = tree.begin().expect("begin");
        while cursor.is_valid() {
            out.push(tree.entry(&cursor).expect("entry"));
            tree.next(&mut cursor).expect("next");
        }
        out
    }

    #[test]
    fn test_overflowing_edits_change_nothing() {
        let overflow = TreeError::Accumulator(AccumulatorError::Overflow { dim: 1 });
        let mut tree = keyed_tree(256, 50);
        append(&mut tree, 0..60);
        assert!(tree.height().expect("height") >= 1);

        // Leaves the sum column 40 short of u64::MAX.
        let mut cursor = tree.begin().expect("begin");
        tree.ctr_insert(&mut cursor, &[u64::MAX - 100, 7]).expect("insert");
        let before = rows(&tree);
        let blocks = tree.store().live_blocks();

        // Overflows the leaf and its ancestors.
        let mut cursor = tree.seek(1).expect("seek");
        assert_eq!(tree.ctr_insert(&mut cursor, &[50, 0]), Err(overflow.clone()));
        // Overflows only the tree total.
        let mut cursor = tree.seek(45).expect("seek");
        assert_eq!(tree.ctr_insert(&mut cursor, &[50, 0]), Err(overflow.clone()));
        let cursor = tree.seek(45).expect("seek");
        assert_eq!(tree.ctr_set(&cursor, &[50, 0]), Err(overflow));

        tree.check().expect("consistent");
        assert_eq!(rows(&tree), before);
        assert_eq!(tree.size().expect("size"), 61);
        assert_eq!(tree.store().live_blocks(), blocks);

        // Reaching the limit exactly is fine.
        tree.ctr_set(&cursor, &[41, 0]).expect("set");
        assert_eq!(tree.total().expect("total").get(1), u64::MAX);
        tree.check().expect("consistent");
    }

    #[test]
    fn test_remove_requires_entry() {
        let mut tree = keyed_tree(256, 50);
        let mut cursor = tree.end().expect("end");
        assert!(tree.ctr_remove(&mut cursor).is_err());
    }
}
