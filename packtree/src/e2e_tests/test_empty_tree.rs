//! Queries and cursor movement on a tree with no entries.

use crate::btree::{Comparison, CursorState};
use crate::e2e_tests::helpers::*;

#[test]
fn test_find_on_empty_tree_is_end() {
    let tree = tree_of(keyed_schema(), 256);

    let cursor = tree.find(1, 0, Comparison::Ge).expect("find");
    assert_eq!(cursor.state(), CursorState::End);
    assert_eq!(cursor.position(), 0);

    let cursor = tree.find(1, 7, Comparison::Le).expect("find");
    assert!(!cursor.is_valid());
}

#[test]
fn test_skip_on_empty_tree_covers_nothing() {
    let tree = tree_of(keyed_schema(), 256);

    let mut cursor = tree.begin().expect("begin");
    assert!(cursor.is_end());
    assert_eq!(tree.skip(&mut cursor, 5).expect("skip"), 0);
    assert!(cursor.is_end());

    let mut cursor = tree.before_begin().expect("before_begin");
    assert_eq!(tree.skip(&mut cursor, 1).expect("skip"), 0);
    assert!(cursor.is_end());

    let mut cursor = tree.before_begin().expect("before_begin");
    assert_eq!(tree.skip(&mut cursor, -2).expect("skip"), 0);
    assert!(cursor.is_before_begin());
    assert_eq!(tree.skip(&mut cursor, 5).expect("skip"), 0);
    assert!(cursor.is_end());
}

#[test]
fn test_empty_tree_totals() {
    let tree = tree_of(mixed_schema(), 512);

    assert!(tree.is_empty().expect("is_empty"));
    assert_eq!(tree.height().expect("height"), 0);
    assert!(tree.total().expect("total").as_slice().iter().all(|&v| v == 0));
    assert_eq!(tree.rank(1, 1, 0).expect("rank"), 0);
    assert!(tree.select(2, 3, 1).expect("select").is_end());
    assert!(tree.seek(1).is_err());
    tree.check().expect("check");
}
