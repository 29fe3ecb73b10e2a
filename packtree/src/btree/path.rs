//! Root-to-leaf chain of node handles held during one descent or mutation.
//!
//! `path[0]` is the leaf and `path[len - 1]` the root. Handles are plain
//! ids; the path never owns nodes.

use crate::store::{NULL_HANDLE, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreePath {
    nodes: Vec<NodeId>,
}

impl TreePath {
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// A path of `len` levels with `top` as root and every other level empty.
    #[must_use]
    pub fn build(top: NodeId, len: usize) -> Self {
        let mut nodes = vec![NULL_HANDLE; len];
        if let Some(root) = nodes.last_mut() {
            *root = top;
        }
        Self { nodes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, level: usize) -> Result<NodeId, PathError> {
        self.nodes.get(level).copied().ok_or(PathError::OutOfRange {
            level,
            len: self.nodes.len(),
        })
    }

    pub fn set(&mut self, level: usize, id: NodeId) -> Result<(), PathError> {
        let len = self.nodes.len();
        let slot = self
            .nodes
            .get_mut(level)
            .ok_or(PathError::OutOfRange { level, len })?;
        *slot = id;
        Ok(())
    }

    pub fn leaf(&self) -> Result<NodeId, PathError> {
        self.nodes.first().copied().ok_or(PathError::Empty)
    }

    pub fn root(&self) -> Result<NodeId, PathError> {
        self.nodes.last().copied().ok_or(PathError::Empty)
    }

    /// Level of the root.
    pub fn root_level(&self) -> Result<usize, PathError> {
        self.nodes.len().checked_sub(1).ok_or(PathError::Empty)
    }

    /// Grow by one level with `id` as the new root.
    pub fn add_root(&mut self, id: NodeId) {
        self.nodes.push(id);
    }

    /// Drop the root level.
    pub fn remove_root(&mut self) -> Result<NodeId, PathError> {
        self.nodes.pop().ok_or(PathError::Empty)
    }

    /// Truncate or extend to `len` levels; new levels are empty.
    pub fn resize(&mut self, len: usize) {
        self.nodes.resize(len, NULL_HANDLE);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Copy levels `from..` of `other` into this path, growing it if needed.
    pub fn copy_from(&mut self, other: &Self, from: usize) {
        if self.nodes.len() < other.nodes.len() {
            self.resize(other.nodes.len());
        }
        for level in from..other.nodes.len() {
            self.nodes[level] = other.nodes[level];
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[NodeId] {
        &self.nodes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    OutOfRange { level: usize, len: usize },
    Empty,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { level, len } => {
                write!(f, "path level {level} out of range (length {len})")
            }
            Self::Empty => write!(f, "path is empty"),
        }
    }
}

impl std::error::Error for PathError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_access() {
        let path = TreePath::build(9, 3);
        assert_eq!(path.as_slice(), &[0, 0, 9]);
        assert_eq!(path.root().expect("root"), 9);
        assert_eq!(path.leaf().expect("leaf"), 0);
        assert_eq!(path.root_level().expect("level"), 2);
        assert_eq!(
            path.get(3),
            Err(PathError::OutOfRange { level: 3, len: 3 })
        );
    }

    #[test]
    fn test_set_bounds() {
        let mut path = TreePath::build(1, 2);
        path.set(0, 5).expect("set");
        assert_eq!(path.leaf().expect("leaf"), 5);
        assert_eq!(
            path.set(2, 5),
            Err(PathError::OutOfRange { level: 2, len: 2 })
        );
    }

    #[test]
    fn test_root_growth_and_shrink() {
        let mut path = TreePath::build(4, 1);
        path.add_root(8);
        assert_eq!(path.len(), 2);
        assert_eq!(path.root().expect("root"), 8);
        assert_eq!(path.remove_root(), Ok(8));
        assert_eq!(path.remove_root(), Ok(4));
        assert_eq!(path.remove_root(), Err(PathError::Empty));
        assert_eq!(path.root(), Err(PathError::Empty));
    }

    #[test]
    fn test_resize_and_copy() {
        let mut path = TreePath::build(3, 2);
        path.resize(4);
        assert_eq!(path.as_slice(), &[0, 3, 0, 0]);
        path.resize(1);
        assert_eq!(path.as_slice(), &[0]);

        let mut other = TreePath::build(10, 1);
        other.add_root(11);
        other.add_root(12);
        let mut copy = TreePath::build(1, 2);
        copy.copy_from(&other, 1);
        assert_eq!(copy.as_slice(), &[0, 11, 12]);

        copy.clear();
        assert!(copy.is_empty());
    }
}
