//! Emptying a leaf removes it from its parent; thinning one merges it into
//! a sibling.

use crate::btree::Tree;
use crate::config::TreeConfig;
use crate::e2e_tests::helpers::*;
use crate::store::{BlockStore, MemoryStore};

/// Wide tree with four entries per leaf, laid out as leaves of 2, 2 and 4.
/// Any leaf that is not full counts as underfull.
fn three_leaf_tree() -> (Tree<MemoryStore>, Vec<Vec<u64>>) {
    let schema = wide_schema();
    let block_size = block_size_for_leaf_capacity(&schema, 4).expect("block size");
    let config = TreeConfig::default()
        .with_block_size(block_size)
        .with_merge_threshold(100);
    let mut tree = tree_with(schema, config);
    let rows: Vec<Vec<u64>> = (0..8).map(|i| vec![1, i, 10 * i, 0]).collect();
    push_rows(&mut tree, &rows);

    let root = tree.node(tree.root()).expect("root");
    let sizes: Vec<usize> = (0..root.size())
        .map(|i| tree.node(root.child(i).expect("child")).expect("leaf").size())
        .collect();
    assert_eq!(sizes, vec![2, 2, 4]);
    (tree, rows)
}

fn leaf_ids(tree: &Tree<MemoryStore>) -> Vec<u64> {
    let root = tree.node(tree.root()).expect("root");
    (0..root.size()).map(|i| root.child(i).expect("child")).collect()
}

#[test]
fn test_underfull_leaf_merges_into_right_sibling() {
    let (mut tree, mut rows) = three_leaf_tree();
    let leaves = leaf_ids(&tree);
    let blocks = tree.store().live_blocks();

    let mut cursor = tree.begin().expect("begin");
    tree.ctr_remove(&mut cursor).expect("remove");
    rows.remove(0);

    assert_eq!(root_children(&tree), 2);
    assert_eq!(tree.store().live_blocks(), blocks - 1);
    assert_eq!(leaf_ids(&tree), vec![leaves[0], leaves[2]]);
    assert!(tree.node(leaves[1]).is_err());

    let root = tree.node(tree.root()).expect("root");
    let survivor = root.child_accumulator(0).expect("accumulator");
    assert_eq!(survivor.as_slice(), &[3, 3, 6]);
    assert_eq!(tree.node(leaves[0]).expect("leaf").size(), 3);
    assert_eq!(collect_rows(&tree), rows);
    tree.check().expect("check");
}

#[test]
fn test_merge_falls_back_to_left_sibling() {
    let (mut tree, mut rows) = three_leaf_tree();
    let leaves = leaf_ids(&tree);

    // The right neighbour is full, so the middle leaf joins the first.
    let mut cursor = tree.seek(2).expect("seek");
    tree.ctr_remove(&mut cursor).expect("remove");
    rows.remove(2);

    assert_eq!(leaf_ids(&tree), vec![leaves[0], leaves[2]]);
    let root = tree.node(tree.root()).expect("root");
    let survivor = root.child_accumulator(0).expect("accumulator");
    assert_eq!(survivor.as_slice(), &[3, 3, 4]);
    assert_eq!(collect_rows(&tree), rows);
    assert_eq!(tree.entry(&cursor).expect("entry"), rows[2]);
    tree.check().expect("check");
}

#[test]
fn test_emptied_leaf_leaves_parent() {
    let schema = wide_schema();
    let block_size = block_size_for_leaf_capacity(&schema, 4).expect("block size");
    let config = TreeConfig::default()
        .with_block_size(block_size)
        .with_merge_threshold(0);
    let mut tree = tree_with(schema, config);

    let rows: Vec<Vec<u64>> = (0..8).map(|i| vec![1, i, i, 0]).collect();
    push_rows(&mut tree, &rows);
    assert_eq!(tree.height().expect("height"), 1);
    let children = root_children(&tree);
    assert!(children >= 3, "only {children} children");

    let root = tree.node(tree.root()).expect("root");
    let first = tree.node(root.child(0).expect("child")).expect("leaf");
    let blocks = tree.store().live_blocks();

    for _ in 0..first.size() {
        let mut cursor = tree.begin().expect("begin");
        tree.ctr_remove(&mut cursor).expect("remove");
    }

    assert_eq!(root_children(&tree), children - 1);
    assert_eq!(tree.store().live_blocks(), blocks - 1);
    assert_eq!(collect_rows(&tree), rows[first.size()..].to_vec());
    tree.check().expect("check");
}

#[test]
fn test_removal_with_merges_keeps_order() {
    let mut tree = tree_of(keyed_schema(), 256);
    let rows: Vec<Vec<u64>> = (0..120).map(|i| vec![1, i]).collect();
    push_rows(&mut tree, &rows);

    // Remove every other entry, then the rest from the back.
    let mut expected = rows;
    let mut pos = 0;
    while pos < expected.len() {
        let mut cursor = tree.seek(pos as u64).expect("seek");
        tree.ctr_remove(&mut cursor).expect("remove");
        expected.remove(pos);
        pos += 1;
    }
    assert_eq!(collect_rows(&tree), expected);
    tree.check().expect("check");

    while !expected.is_empty() {
        let mut cursor = tree.seek(expected.len() as u64 - 1).expect("seek");
        tree.ctr_remove(&mut cursor).expect("remove");
        expected.pop();
        assert!(cursor.is_end());
    }
    assert!(tree.is_empty().expect("is_empty"));
    assert_eq!(tree.height().expect("height"), 0);
    assert_eq!(tree.store().live_blocks(), 1);
}
