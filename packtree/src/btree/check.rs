//! Full structural validation.

use crate::btree::accumulator::Accumulator;
use crate::btree::node::{Node, NodeKind};
use crate::btree::tree::{Tree, TreeError};
use crate::packed::PackedStream;
use crate::store::{BlockStore, NodeId};

impl<S: BlockStore> Tree<S> {
    /// Walk the whole tree and verify every structural invariant: levels,
    /// root flags, node layouts, equal stream sizes within a leaf, non-empty
    /// non-root nodes, branch accumulators against their subtrees, and that
    /// every live block is reachable.
    pub fn check(&self) -> Result<(), TreeError> {
        let mut visited = 0;
        self.check_subtree(self.root, None, &mut visited)?;
        let live = self.store.live_blocks();
        if visited != live {
            return Err(TreeError::Inconsistent {
                node: self.root,
                reason: format!("{visited} reachable nodes but {live} live blocks"),
            });
        }
        Ok(())
    }

    /// Returns the aggregate of the subtree rooted at `id`.
    fn check_subtree(
        &self,
        id: NodeId,
        parent_level: Option<u16>,
        visited: &mut usize,
    ) -> Result<Accumulator, TreeError> {
        *visited += 1;
        let node = self.load(id)?;
        let fail = |reason: String| TreeError::Inconsistent { node: id, reason };

        if node.id() != id {
            return Err(fail(format!("header names node {}", node.id())));
        }
        let is_root = parent_level.is_none();
        if node.is_root() != is_root {
            return Err(fail(format!("root flag {} does not match position", node.is_root())));
        }
        if let Some(level) = parent_level {
            if node.level() + 1 != level {
                return Err(fail(format!("level {} under a level {level} parent", node.level())));
            }
        }
        if !is_root && node.size() == 0 {
            return Err(fail("empty non-root node".to_string()));
        }

        let kind = if node.is_leaf() {
            NodeKind::Leaf
        } else {
            NodeKind::Branch
        };
        let expected = Node::layout(&self.schema, kind, self.schema.full_mask());
        let actual: Vec<_> = node.streams().iter().map(|s| s.spec()).collect();
        if expected != actual {
            return Err(fail(format!("layout {actual:?}, expected {expected:?}")));
        }

        if node.is_leaf() {
            if node.level() != 0 {
                return Err(fail(format!("leaf at level {}", node.level())));
            }
            if node.streams().iter().any(|s| s.size() != node.size()) {
                return Err(fail("leaf streams differ in size".to_string()));
            }
            return Ok(node.accumulator(&self.schema)?);
        }

        if node.size() == 0 {
            return Err(fail("branch without children".to_string()));
        }
        let mut total = Accumulator::zero(self.schema.accumulator_width());
        for idx in 0..node.size() {
            let child = node.child(idx)?;
            let actual = self.check_subtree(child, Some(node.level()), visited)?;
            let stored = node.child_accumulator(idx)?;
            if stored != actual {
                return Err(fail(format!(
                    "child {idx} (node {child}) stored {:?} but holds {:?}",
                    stored.as_slice(),
                    actual.as_slice()
                )));
            }
            total.add(&actual)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use crate::btree::accumulator::Accumulator;
    use crate::btree::schema::Schema;
    use crate::btree::tree::{Tree, TreeError};
    use crate::config::TreeConfig;
    use crate::packed::StreamSpec;
    use crate::store::MemoryStore;

    fn bitmap_tree() -> Tree<MemoryStore> {
        let schema = Schema::new(vec![StreamSpec::Bitmap]).expect("schema");
        let config = TreeConfig::default().with_block_size(256);
        Tree::create(MemoryStore::new(256), schema, config).expect("tree")
    }

    #[test]
    fn test_fresh_and_grown_trees_pass() {
        let mut tree = bitmap_tree();
        tree.check().expect("empty tree");
        for i in 0..2000 {
            let mut cursor = tree.end().expect("end");
            tree.ctr_insert(&mut cursor, &[i % 2]).expect("insert");
        }
        tree.check().expect("grown tree");
    }

    #[test]
    fn test_detects_stale_accumulator() {
        let mut tree = bitmap_tree();
        for _ in 0..2000 {
            let mut cursor = tree.end().expect("end");
            tree.ctr_insert(&mut cursor, &[1]).expect("insert");
        }
        let mut root = tree.load(tree.root()).expect("root");
        assert!(!root.is_leaf());
        root.set_child_accumulator(0, &Accumulator::from_vec(vec![1, 0, 1]))
            .expect("corrupt");
        tree.save(&root).expect("save");

        assert!(matches!(tree.check(), Err(TreeError::Inconsistent { .. })));
    }
}
