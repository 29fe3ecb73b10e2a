#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
// Layers, bottom up:
//  - packed: fixed-size blocks holding several typed streams
//  - store: node handles and block buffers
//  - btree: nodes built from packed blocks, cursors, walkers and mutation
//  - containers: maps and succinct sequences on top of the tree
//
// The simulation module drives all of it with seeded workloads and checks
// the tree against a plain row model after every operation.

pub mod btree;
pub mod config;
pub mod containers;
pub mod packed;
pub mod simulation;
pub mod store;

mod e2e_tests;

pub use btree::{Comparison, Cursor, CursorState, Schema, Tree, TreeError};
pub use config::TreeConfig;
pub use packed::StreamSpec;
pub use store::{BlockStore, MemoryStore};
