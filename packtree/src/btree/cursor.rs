//! Cursor produced by a completed walk.

use crate::btree::accumulator::Accumulator;
use crate::btree::path::TreePath;
use crate::store::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// On an entry.
    Valid,
    /// One past the last entry.
    End,
    /// One before the first entry.
    BeforeBegin,
}

/// Position in a tree: the live path, the local index in its leaf and the
/// aggregate of every entry before it.
///
/// Any mutation other than one made through this cursor leaves it stale;
/// call `Tree::refresh` before reusing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub(crate) path: TreePath,
    pub(crate) idx: usize,
    pub(crate) leaf_size: usize,
    pub(crate) prefix: Accumulator,
    pub(crate) state: CursorState,
}

impl Cursor {
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        &self.path
    }

    /// Leaf the cursor points into.
    #[must_use]
    pub fn leaf(&self) -> NodeId {
        self.path.as_slice().first().copied().unwrap_or_default()
    }

    /// Local index within the leaf.
    #[must_use]
    pub const fn idx(&self) -> usize {
        self.idx
    }

    #[must_use]
    pub const fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    /// Sum of every dimension over all entries strictly before the cursor.
    #[must_use]
    pub const fn prefix(&self) -> &Accumulator {
        &self.prefix
    }

    /// Absolute entry position. The end sentinel reports the tree size and
    /// the before-begin sentinel reports 0.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.prefix.get(0)
    }

    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state == CursorState::Valid
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        self.state == CursorState::End
    }

    #[must_use]
    pub fn is_before_begin(&self) -> bool {
        self.state == CursorState::BeforeBegin
    }
}
