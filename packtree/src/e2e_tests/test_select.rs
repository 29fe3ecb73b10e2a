//! Select and rank over a bitmap stream.

use crate::btree::Schema;
use crate::e2e_tests::helpers::*;
use crate::packed::StreamSpec;

fn bitmap_tree(bits: &[u64]) -> crate::btree::Tree<crate::store::MemoryStore> {
    let schema = Schema::new(vec![StreamSpec::Bitmap]).expect("schema");
    let mut tree = tree_of(schema, 256);
    let rows: Vec<Vec<u64>> = bits.iter().map(|&b| vec![b]).collect();
    push_rows(&mut tree, &rows);
    tree
}

#[test]
fn test_select_third_one() {
    let tree = bitmap_tree(&[0, 0, 1, 1, 1, 0]);

    let cursor = tree.select(0, 1, 3).expect("select");
    assert!(cursor.is_valid());
    assert_eq!(cursor.position(), 4);
    assert_eq!(tree.rank(0, 1, 4).expect("rank"), 2);
    assert_eq!(tree.rank(0, 0, 6).expect("rank"), 3);

    assert!(tree.select(0, 1, 4).expect("select").is_end());
    assert!(tree.select(0, 1, 0).is_err());
}

#[test]
fn test_select_relative_to_cursor() {
    let tree = bitmap_tree(&[1, 0, 1, 0, 1, 0, 1]);
    let from = tree.seek(3).expect("seek");

    let forward = tree.select_fw(&from, 0, 1, 2).expect("select");
    assert_eq!(forward.position(), 6);

    let backward = tree.select_bw(&from, 0, 1, 1).expect("select");
    assert_eq!(backward.position(), 2);
    let backward = tree.select_bw(&from, 0, 1, 2).expect("select");
    assert_eq!(backward.position(), 0);
    assert!(tree.select_bw(&from, 0, 1, 3).expect("select").is_before_begin());
}

#[test]
fn test_select_spanning_leaves() {
    let bits: Vec<u64> = (0..5000).map(|i| u64::from(i % 7 == 3)).collect();
    let tree = bitmap_tree(&bits);
    assert!(tree.height().expect("height") >= 1);

    let ones = bits.iter().filter(|&&b| b == 1).count() as u64;
    for nth in [1, 2, 100, ones] {
        let cursor = tree.select(0, 1, nth).expect("select");
        assert_eq!(cursor.position(), (nth - 1) * 7 + 3, "nth {nth}");
    }
    assert!(tree.select(0, 1, ones + 1).expect("select").is_end());
    tree.check().expect("check");
}
