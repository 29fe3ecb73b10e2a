//! `select(nth)` lands where `rank` steps from `nth - 1` to `nth`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::e2e_tests::helpers::*;

const BIT_STREAM: usize = 1;
const SYMBOL_STREAM: usize = 2;

#[test]
fn test_rank_select_agree() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut tree = tree_of(mixed_schema(), 512);
    let rows: Vec<Vec<u64>> = (0..1500)
        .map(|_| {
            vec![
                rng.random_range(0..10),
                rng.random_range(0..2),
                rng.random_range(0..4),
            ]
        })
        .collect();
    push_rows(&mut tree, &rows);
    let len = rows.len() as u64;

    for (stream, symbols) in [(BIT_STREAM, 2), (SYMBOL_STREAM, 4)] {
        for symbol in 0..symbols {
            let count = tree.rank(stream, symbol, len).expect("rank");
            let expected = rows.iter().filter(|r| r[stream] == symbol).count() as u64;
            assert_eq!(count, expected);

            for nth in (1..=count).step_by(37).chain([count]) {
                let cursor = tree.select(stream, symbol, nth).expect("select");
                let pos = cursor.position();
                assert_eq!(tree.entry(&cursor).expect("entry")[stream], symbol);
                assert_eq!(tree.rank(stream, symbol, pos).expect("rank"), nth - 1);
                assert_eq!(tree.rank(stream, symbol, pos + 1).expect("rank"), nth);
            }
            assert!(tree.select(stream, symbol, count + 1).expect("select").is_end());
        }
    }
}

#[test]
fn test_ranks_partition_positions() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut tree = tree_of(mixed_schema(), 512);
    let rows: Vec<Vec<u64>> = (0..600)
        .map(|_| vec![1, rng.random_range(0..2), rng.random_range(0..4)])
        .collect();
    push_rows(&mut tree, &rows);

    for pos in (0..=600).step_by(23) {
        let bits: u64 = (0..2).map(|s| tree.rank(BIT_STREAM, s, pos).expect("rank")).sum();
        let symbols: u64 = (0..4)
            .map(|s| tree.rank(SYMBOL_STREAM, s, pos).expect("rank"))
            .sum();
        assert_eq!(bits, pos);
        assert_eq!(symbols, pos);
    }
}
