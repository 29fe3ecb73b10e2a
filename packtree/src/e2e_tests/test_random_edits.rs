//! Random inserts, removals and updates keep contents and structure intact
//! through splits and merges.

#![allow(clippy::cast_possible_truncation)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TreeConfig;
use crate::e2e_tests::helpers::*;

fn run_edits(seed: u64, config: TreeConfig, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tree = tree_with(keyed_schema(), config);
    let mut model: Vec<Vec<u64>> = Vec::new();

    for step in 0..steps {
        let len = model.len() as u64;
        // Grow for the first half, shrink for the second.
        let insert_bias = if step < steps / 2 { 0.7 } else { 0.3 };
        if len == 0 || rng.random_bool(insert_bias) {
            let pos = rng.random_range(0..=len);
            let row = vec![rng.random_range(0..50), step as u64];
            let mut cursor = tree.seek(pos).expect("seek");
            tree.ctr_insert(&mut cursor, &row).expect("insert");
            assert_eq!(cursor.position(), pos);
            model.insert(pos as usize, row);
        } else if rng.random_bool(0.8) {
            let pos = rng.random_range(0..len);
            let mut cursor = tree.seek(pos).expect("seek");
            assert_eq!(tree.entry(&cursor).expect("entry"), model[pos as usize]);
            tree.ctr_remove(&mut cursor).expect("remove");
            model.remove(pos as usize);
        } else {
            let pos = rng.random_range(0..len);
            let row = vec![rng.random_range(0..50), 0];
            let cursor = tree.seek(pos).expect("seek");
            tree.ctr_set(&cursor, &row).expect("set");
            model[pos as usize] = row;
        }

        if step % 97 == 0 {
            tree.check().expect("check");
            assert_eq!(collect_rows(&tree), model, "step {step}");
        }
    }

    tree.check().expect("check");
    assert_eq!(collect_rows(&tree), model);
    let keys: u64 = model.iter().map(|row| row[0]).sum();
    assert_eq!(tree.total().expect("total").as_slice(), &[model.len() as u64, keys]);
}

#[test]
fn test_random_edits_with_merges() {
    run_edits(5, TreeConfig::default().with_block_size(256), 3000);
}

#[test]
fn test_random_edits_without_merges() {
    let config = TreeConfig::default()
        .with_block_size(256)
        .with_merge_threshold(0);
    run_edits(6, config, 3000);
}

#[test]
fn test_random_edits_aggressive_merges() {
    let config = TreeConfig::default()
        .with_block_size(512)
        .with_merge_threshold(100);
    run_edits(7, config, 2000);
}
