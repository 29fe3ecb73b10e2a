//! A full leaf splits into two and a new root is grown above them.

use crate::btree::NodeKind;
use crate::config::TreeConfig;
use crate::e2e_tests::helpers::*;

#[test]
fn test_fifth_entry_splits_leaf_of_four() {
    let schema = wide_schema();
    let block_size = block_size_for_leaf_capacity(&schema, 4).expect("block size");
    let mut tree = tree_with(schema, TreeConfig::default().with_block_size(block_size));

    let rows: Vec<Vec<u64>> = (1..=5).map(|i| vec![i, 1, i * 10, 0]).collect();
    push_rows(&mut tree, &rows[..4]);
    assert_eq!(tree.height().expect("height"), 0);

    push_rows(&mut tree, &rows[4..]);
    assert_eq!(tree.height().expect("height"), 1);
    assert_eq!(root_children(&tree), 2);

    let root = tree.node(tree.root()).expect("root");
    assert_eq!(root.header().kind, NodeKind::Branch);
    let sizes: Vec<usize> = (0..2)
        .map(|i| tree.node(root.child(i).expect("child")).expect("leaf").size())
        .collect();
    assert_eq!(sizes.iter().sum::<usize>(), 5);
    assert!(sizes.iter().all(|&s| s >= 2), "unbalanced split: {sizes:?}");

    assert_eq!(collect_rows(&tree), rows);
    assert_eq!(tree.total().expect("total").as_slice(), &[5, 15, 5]);
    tree.check().expect("check");
}

#[test]
fn test_root_split_grows_height() {
    let schema = wide_schema();
    let block_size = block_size_for_leaf_capacity(&schema, 4).expect("block size");
    let mut tree = tree_with(schema, TreeConfig::default().with_block_size(block_size));

    let rows: Vec<Vec<u64>> = (0..40).map(|i| vec![i, 2, i, i]).collect();
    push_rows(&mut tree, &rows);

    assert!(tree.height().expect("height") >= 2);
    assert_eq!(collect_rows(&tree), rows);
    tree.check().expect("check");
}
