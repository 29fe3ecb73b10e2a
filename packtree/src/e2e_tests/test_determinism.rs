//! Test that the same sequence of operations produces identical trees.

use crate::btree::Comparison;
use crate::e2e_tests::helpers::*;
use crate::store::BlockStore;

fn run_sequence() -> (Vec<Vec<u64>>, Vec<u64>, Vec<Vec<u8>>) {
    let mut tree = tree_of(mixed_schema(), 512);
    let rows: Vec<Vec<u64>> = (0..500).map(|i| vec![i % 13, i % 2, i % 4]).collect();
    push_rows(&mut tree, &rows);

    for pos in (0..200).step_by(3) {
        let mut cursor = tree.seek(pos).expect("seek");
        tree.ctr_remove(&mut cursor).expect("remove");
    }

    let answers = vec![
        tree.rank(1, 1, 250).expect("rank"),
        tree.select(2, 3, 40).expect("select").position(),
        tree.find(1, 900, Comparison::Ge).expect("find").position(),
    ];

    let mut blocks = Vec::new();
    let mut cursor = tree.begin().expect("begin");
    while cursor.is_valid() {
        let leaf = cursor.leaf();
        blocks.push(tree.store().resolve(leaf).expect("block").as_bytes().to_vec());
        let rest = i64::try_from(cursor.leaf_size() - cursor.idx()).expect("offset");
        tree.skip(&mut cursor, rest).expect("skip");
    }

    (collect_rows(&tree), answers, blocks)
}

#[test]
fn test_deterministic_sequence() {
    let run1 = run_sequence();
    let run2 = run_sequence();

    assert_eq!(run1.0, run2.0);
    assert_eq!(run1.1, run2.1);
    assert_eq!(run1.2.len(), run2.2.len());
    for (i, (b1, b2)) in run1.2.iter().zip(run2.2.iter()).enumerate() {
        assert_eq!(b1, b2, "leaf block mismatch at {i}");
    }
}
