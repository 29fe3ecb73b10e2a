//! A node that no longer fits leaves its block untouched.

use crate::btree::Node;
use crate::e2e_tests::helpers::*;
use crate::packed::Block;

const BLOCK_SIZE: usize = 256;

#[test]
fn test_failed_write_leaves_block_unchanged() {
    let schema = keyed_schema();
    let mut node = Node::new_leaf(&schema, 1);
    node.set_root(true);
    for i in 0..5 {
        node.insert_entry(&schema, 0, &[i, i * 2]).expect("insert");
    }

    let mut block = Block::new(BLOCK_SIZE);
    node.write(&mut block).expect("write");
    let before = block.as_bytes().to_vec();

    let mut grown = node.clone();
    while grown.fits(BLOCK_SIZE) {
        grown.insert_entry(&schema, 0, &[9, 9]).expect("insert");
    }
    let err = grown.write(&mut block).expect_err("should not fit");
    assert!(err.is_out_of_memory(), "unexpected error: {err}");
    assert_eq!(block.as_bytes(), before.as_slice());
    assert_eq!(Node::read(&block).expect("read"), node);
}

#[test]
fn test_tree_splits_instead_of_overflowing() {
    let mut tree = tree_of(keyed_schema(), BLOCK_SIZE);
    let rows: Vec<Vec<u64>> = (0..40).map(|i| vec![1, i]).collect();
    push_rows(&mut tree, &rows);

    assert!(tree.height().expect("height") >= 1);
    let mut cursor = tree.begin().expect("begin");
    while cursor.is_valid() {
        let leaf = tree.node(cursor.leaf()).expect("leaf");
        assert!(leaf.fits(BLOCK_SIZE));
        tree.next(&mut cursor).expect("next");
    }
    assert_eq!(collect_rows(&tree), rows);
    tree.check().expect("check");
}
