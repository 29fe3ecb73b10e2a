//! The augmented B+tree: node model, paths, cursors, walkers, the descent
//! driver and the mutation engine.
//!
//! Every branch stores, per child, the accumulator of that child's subtree.
//! Walkers use those accumulators to descend without visiting leaves they
//! skip, and the mutation engine keeps them exact after every edit.

pub mod accumulator;
mod check;
pub mod cursor;
mod mutation;
pub mod node;
pub mod path;
pub mod schema;
pub mod tree;
pub mod walker;

pub use accumulator::{Accumulator, AccumulatorDelta, AccumulatorError};
pub use cursor::{Cursor, CursorState};
pub use node::{Node, NodeError, NodeHeader, NodeKind};
pub use path::{PathError, TreePath};
pub use schema::{Schema, SchemaError};
pub use tree::{Comparison, MIN_BRANCH_FANOUT, Tree, TreeError, TreeStats};
pub use walker::{Direction, FindWalker, RankWalker, SelectWalker, SkipWalker, Walker};
