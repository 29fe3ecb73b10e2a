//! Ordered key search over delta-encoded keys.

use crate::btree::Comparison;
use crate::e2e_tests::helpers::*;

#[test]
fn test_find_by_key() {
    let mut tree = tree_of(keyed_schema(), 256);
    // Keys 10, 20, 30 stored as deltas.
    push_rows(&mut tree, &[vec![10, 100], vec![10, 200], vec![10, 300]]);

    let ge = tree.find(1, 20, Comparison::Ge).expect("find");
    assert_eq!(ge.position(), 1);
    assert_eq!(tree.key(&ge, 1).expect("key"), 20);

    let gt = tree.find(1, 20, Comparison::Gt).expect("find");
    assert_eq!(gt.position(), 2);
    assert_eq!(tree.entry(&gt).expect("entry"), vec![10, 300]);

    let eq = tree.find(1, 30, Comparison::Eq).expect("find");
    assert_eq!(eq.position(), 2);
    assert!(tree.find(1, 25, Comparison::Eq).expect("find").is_end());

    let lt = tree.find(1, 20, Comparison::Lt).expect("find");
    assert_eq!(lt.position(), 0);
    let le = tree.find(1, 20, Comparison::Le).expect("find");
    assert_eq!(le.position(), 1);

    assert!(tree.find(1, 31, Comparison::Ge).expect("find").is_end());
    assert!(tree.find(1, 10, Comparison::Lt).expect("find").is_before_begin());
}

#[test]
fn test_find_across_many_leaves() {
    let mut tree = tree_of(keyed_schema(), 256);
    let rows: Vec<Vec<u64>> = (0..300).map(|i| vec![3, i]).collect();
    push_rows(&mut tree, &rows);
    assert!(tree.height().expect("height") >= 1);

    for key in [1, 3, 4, 450, 897, 900] {
        let cursor = tree.find(1, key, Comparison::Ge).expect("find");
        let expected = key.div_ceil(3) - 1;
        assert_eq!(cursor.position(), expected, "key {key}");
        assert_eq!(tree.key(&cursor, 1).expect("key"), (expected + 1) * 3);
    }
    assert!(tree.find(1, 901, Comparison::Ge).expect("find").is_end());
}

#[test]
fn test_unknown_dimension_is_rejected() {
    let tree = tree_of(keyed_schema(), 256);
    assert!(tree.find(2, 0, Comparison::Ge).is_err());
}
