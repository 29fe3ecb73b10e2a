//! Skipping and weight search agree with absolute positions.

use crate::btree::{Comparison, CursorState};
use crate::e2e_tests::helpers::*;

const WEIGHT_DIM: usize = 1;

fn weighted_tree(count: u64) -> crate::btree::Tree<crate::store::MemoryStore> {
    let mut tree = tree_of(mixed_schema(), 512);
    let rows: Vec<Vec<u64>> = (0..count).map(|i| vec![i % 5 + 1, i % 2, i % 4]).collect();
    push_rows(&mut tree, &rows);
    tree
}

#[test]
fn test_skip_there_and_back() {
    let tree = weighted_tree(700);

    for (from, offset) in [(0_u64, 1_i64), (10, 300), (699, -699), (350, -20), (5, 600)] {
        let mut cursor = tree.seek(from).expect("seek");
        assert_eq!(tree.skip(&mut cursor, offset).expect("skip"), offset.unsigned_abs());
        assert_eq!(cursor.position(), from.checked_add_signed(offset).expect("target"));
        assert_eq!(cursor.prefix(), tree.seek(cursor.position()).expect("seek").prefix());

        assert_eq!(tree.skip(&mut cursor, -offset).expect("skip"), offset.unsigned_abs());
        assert_eq!(cursor.position(), from);
    }
}

#[test]
fn test_skip_past_either_end() {
    let tree = weighted_tree(100);

    let mut cursor = tree.seek(90).expect("seek");
    assert_eq!(tree.skip(&mut cursor, 50).expect("skip"), 10);
    assert_eq!(cursor.state(), CursorState::End);
    assert_eq!(cursor.position(), 100);

    let mut cursor = tree.seek(5).expect("seek");
    assert_eq!(tree.skip(&mut cursor, -50).expect("skip"), 6);
    assert_eq!(cursor.state(), CursorState::BeforeBegin);

    assert_eq!(tree.skip(&mut cursor, 1).expect("skip"), 1);
    assert_eq!(cursor.position(), 0);
    assert!(cursor.is_valid());
}

#[test]
fn test_find_by_prefix_returns_position() {
    let tree = weighted_tree(400);

    let mut cursor = tree.begin().expect("begin");
    while cursor.is_valid() {
        let before = cursor.prefix().get(WEIGHT_DIM);
        let found = tree.find(WEIGHT_DIM, before, Comparison::Gt).expect("find");
        assert_eq!(found.position(), cursor.position());
        assert_eq!(found.prefix(), cursor.prefix());
        tree.next(&mut cursor).expect("next");
    }

    let total = tree.total().expect("total").get(WEIGHT_DIM);
    assert!(tree.find(WEIGHT_DIM, total, Comparison::Gt).expect("find").is_end());
}

#[test]
fn test_next_and_prev_walk_every_entry() {
    let tree = weighted_tree(300);

    let mut cursor = tree.end().expect("end");
    let mut seen = 0;
    loop {
        tree.prev(&mut cursor).expect("prev");
        if !cursor.is_valid() {
            break;
        }
        seen += 1;
        assert_eq!(cursor.position(), 300 - seen);
    }
    assert_eq!(seen, 300);
    assert!(cursor.is_before_begin());
}
