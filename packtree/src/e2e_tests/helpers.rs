//! Common helpers for end-to-end tests.

use crate::btree::{MIN_BRANCH_FANOUT, Node, NodeKind, Schema, Tree};
use crate::config::TreeConfig;
use crate::packed::StreamSpec;
use crate::store::MemoryStore;

/// Key deltas in a sum tree plus one plain value column.
pub fn keyed_schema() -> Schema {
    Schema::new(vec![
        StreamSpec::SumTree { columns: 1 },
        StreamSpec::Array {
            columns: 1,
            indexed: false,
        },
    ])
    .expect("keyed schema")
}

/// Two summed columns and two plain ones; heavy enough that a leaf of four
/// entries sits next to a branch of three children.
pub fn wide_schema() -> Schema {
    Schema::new(vec![
        StreamSpec::SumTree { columns: 2 },
        StreamSpec::Array {
            columns: 2,
            indexed: false,
        },
    ])
    .expect("wide schema")
}

/// Weights, one bit and one two-bit symbol per entry.
pub fn mixed_schema() -> Schema {
    Schema::new(vec![
        StreamSpec::SumTree { columns: 1 },
        StreamSpec::Bitmap,
        StreamSpec::Sequence { bits: 2 },
    ])
    .expect("mixed schema")
}

pub fn tree_with(schema: Schema, config: TreeConfig) -> Tree<MemoryStore> {
    Tree::create(MemoryStore::new(config.block_size), schema, config).expect("create tree")
}

pub fn tree_of(schema: Schema, block_size: usize) -> Tree<MemoryStore> {
    tree_with(schema, TreeConfig::default().with_block_size(block_size))
}

/// Append every row at the end of the tree.
pub fn push_rows(tree: &mut Tree<MemoryStore>, rows: &[Vec<u64>]) {
    for row in rows {
        let mut cursor = tree.end().expect("end");
        tree.ctr_insert(&mut cursor, row).expect("insert");
    }
}

/// Every row in order, walked with `next`.
pub fn collect_rows(tree: &Tree<MemoryStore>) -> Vec<Vec<u64>> {
    let mut rows = Vec::new();
    let mut cursor = tree.begin().expect("begin");
    while cursor.is_valid() {
        rows.push(tree.entry(&cursor).expect("entry"));
        tree.next(&mut cursor).expect("next");
    }
    rows
}

/// Smallest block size at which a leaf holds exactly `capacity` entries and
/// a branch still holds the minimum fanout.
pub fn block_size_for_leaf_capacity(schema: &Schema, capacity: usize) -> Option<usize> {
    let mask = schema.full_mask();
    (TreeConfig::MIN_BLOCK_SIZE..4096).step_by(8).find(|&size| {
        Node::capacity_for(schema, NodeKind::Leaf, mask, size) == capacity
            && Node::capacity_for(schema, NodeKind::Branch, mask, size) >= MIN_BRANCH_FANOUT
    })
}

/// Number of children of the root (0 for a leaf root).
pub fn root_children(tree: &Tree<MemoryStore>) -> usize {
    let root = tree.node(tree.root()).expect("root");
    if root.is_leaf() { 0 } else { root.size() }
}
