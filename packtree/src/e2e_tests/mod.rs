//! End-to-end tests at the tree API level.
//!
//! Each test file covers a specific scenario, using deterministic inputs
//! to exercise whole insert, remove and query cycles on real trees.

#![cfg(test)]

mod helpers;

mod test_determinism;
mod test_empty_tree;
mod test_keyed_find;
mod test_leaf_split;
mod test_node_removal;
mod test_out_of_memory;
mod test_random_edits;
mod test_rank_select_duality;
mod test_select;
mod test_skip_find;
