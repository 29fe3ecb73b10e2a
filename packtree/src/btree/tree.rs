//! The tree engine: creation, the walker descent driver, cursor queries and
//! diagnostics. Structural mutation lives in `mutation`.

#![allow(clippy::cast_possible_truncation)]

use std::fmt::Write as _;

use tracing::{debug, trace};

use crate::btree::accumulator::{Accumulator, AccumulatorError};
use crate::btree::cursor::{Cursor, CursorState};
use crate::btree::node::{Node, NodeError, NodeKind, dump_block};
use crate::btree::path::{PathError, TreePath};
use crate::btree::schema::{Schema, SchemaError};
use crate::btree::walker::{Direction, FindWalker, RankWalker, SelectWalker, SkipWalker, Walker};
use crate::config::{ConfigError, TreeConfig};
use crate::packed::{SearchType, StreamError};
use crate::store::{BlockStore, NodeId, StoreError};

/// Fewest children a branch block must hold so that splits always make room.
pub const MIN_BRANCH_FANOUT: usize = 3;

/// How `Tree::find` compares running sums against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Last entry whose running sum is below the target.
    Lt,
    /// Last entry whose running sum is at most the target.
    Le,
    /// Entry whose running sum equals the target.
    Eq,
    /// First entry whose running sum reaches the target.
    Ge,
    /// First entry whose running sum exceeds the target.
    Gt,
}

/// Structural statistics for a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStats {
    /// Level of the root.
    pub height: usize,
    /// Node count per level, leaves first.
    pub nodes_per_level: Vec<usize>,
    pub entries: u64,
    /// Bytes used across every node.
    pub used_bytes: usize,
    pub block_size: usize,
}

impl TreeStats {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes_per_level.iter().sum()
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes_per_level.first().copied().unwrap_or(0)
    }

    /// Fraction of allocated block bytes in use.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fill_ratio(&self) -> f64 {
        let capacity = self.node_count() * self.block_size;
        if capacity == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / capacity as f64
    }
}

/// A multi-stream augmented B+tree over a block store.
pub struct Tree<S: BlockStore> {
    pub(super) store: S,
    pub(super) schema: Schema,
    pub(super) config: TreeConfig,
    pub(super) root: NodeId,
}

impl<S: BlockStore> Tree<S> {
    /// Create an empty tree: a single root leaf.
    ///
    /// # Errors
    ///
    /// Returns `BlockTooSmall` if a block cannot hold one entry or
    /// `MIN_BRANCH_FANOUT` children.
    pub fn create(mut store: S, schema: Schema, config: TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        let mask = schema.full_mask();
        let leaf_capacity = Node::capacity_for(&schema, NodeKind::Leaf, mask, config.block_size);
        let branch_capacity =
            Node::capacity_for(&schema, NodeKind::Branch, mask, config.block_size);
        if leaf_capacity == 0 || branch_capacity < MIN_BRANCH_FANOUT {
            return Err(TreeError::BlockTooSmall {
                block_size: config.block_size,
                leaf_capacity,
                branch_capacity,
            });
        }

        let root = store.allocate_block(config.block_size)?;
        let mut leaf = Node::new_leaf(&schema, root);
        leaf.set_root(true);
        leaf.write(store.resolve_mut(root)?)?;
        debug!(
            root,
            block_size = config.block_size,
            leaf_capacity,
            branch_capacity,
            "created tree"
        );

        Ok(Self {
            store,
            schema,
            config,
            root,
        })
    }

    /// Reattach to an existing tree rooted at `root`.
    pub fn open(
        store: S,
        schema: Schema,
        config: TreeConfig,
        root: NodeId,
    ) -> Result<Self, TreeError> {
        config.validate()?;
        let tree = Self {
            store,
            schema,
            config,
            root,
        };
        let node = tree.load(root)?;
        if !node.is_root() {
            return Err(TreeError::NotRoot(root));
        }
        let kind = if node.is_leaf() {
            NodeKind::Leaf
        } else {
            NodeKind::Branch
        };
        let expected = Node::layout(&tree.schema, kind, node.header().stream_mask);
        let actual: Vec<_> = node.streams().iter().map(|s| s.spec()).collect();
        if expected != actual {
            return Err(TreeError::Inconsistent {
                node: root,
                reason: "root layout does not match schema".to_string(),
            });
        }
        Ok(tree)
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub(super) fn load(&self, id: NodeId) -> Result<Node, TreeError> {
        Ok(Node::read(self.store.resolve(id)?)?)
    }

    /// Decode the node behind `id`.
    pub fn node(&self, id: NodeId) -> Result<Node, TreeError> {
        self.load(id)
    }

    pub(super) fn save(&mut self, node: &Node) -> Result<(), TreeError> {
        let block = self.store.resolve_mut(node.id())?;
        node.write(block)?;
        Ok(())
    }

    /// Level of the root; 0 for a single-leaf tree.
    pub fn height(&self) -> Result<usize, TreeError> {
        Ok(usize::from(self.load(self.root)?.level()))
    }

    /// Aggregate over the whole tree.
    pub fn total(&self) -> Result<Accumulator, TreeError> {
        Ok(self.load(self.root)?.accumulator(&self.schema)?)
    }

    /// Number of entries.
    pub fn size(&self) -> Result<u64, TreeError> {
        Ok(self.total()?.get(0))
    }

    pub fn is_empty(&self) -> Result<bool, TreeError> {
        Ok(self.size()? == 0)
    }

    /// Run a walker from the root.
    pub fn ctr_descend<W: Walker>(&self, mut walker: W) -> Result<(Cursor, W::Output), TreeError> {
        let root = self.load(self.root)?;
        if root.size() == 0 {
            walker.empty();
            let cursor = self.sentinel(walker.direction())?;
            let output = walker.finish(&cursor);
            return Ok((cursor, output));
        }
        let path = TreePath::build(self.root, usize::from(root.level()) + 1);
        let level = path.root_level()?;
        self.drive(walker, path, level, None)
    }

    /// Run a walker starting at a cursor's leaf position.
    pub fn walk_from<W: Walker>(
        &self,
        cursor: &Cursor,
        walker: W,
    ) -> Result<(Cursor, W::Output), TreeError> {
        self.drive(walker, cursor.path.clone(), 0, Some(cursor.idx))
    }

    /// Step the walker level by level until it stops on an entry or runs
    /// off the tree.
    ///
    /// `start` is the scan origin at `level`; `None` means the near edge of
    /// the node for the walk direction.
    fn drive<W: Walker>(
        &self,
        mut walker: W,
        mut path: TreePath,
        mut level: usize,
        mut start: Option<usize>,
    ) -> Result<(Cursor, W::Output), TreeError> {
        let direction = walker.direction();
        let top = path.root_level()?;

        loop {
            let id = path.get(level)?;
            let node = self.load(id)?;
            let from = start.unwrap_or(match direction {
                Direction::Forward => 0,
                Direction::Backward => node.size(),
            });

            if level == 0 {
                if let Some(idx) = walker.leaf_step(&self.schema, &node, from)? {
                    let cursor = self.cursor_at(path, &node, idx, CursorState::Valid)?;
                    let output = walker.finish(&cursor);
                    return Ok((cursor, output));
                }
            } else if let Some(child_idx) = walker.branch_step(node.accumulators()?, from)? {
                let child = node.child(child_idx)?;
                trace!(level, node = id, child_idx, child, "descend");
                path.set(level - 1, child)?;
                level -= 1;
                start = None;
                continue;
            }

            if level == top {
                let cursor = self.sentinel(direction)?;
                let output = walker.finish(&cursor);
                return Ok((cursor, output));
            }
            let parent = self.load(path.get(level + 1)?)?;
            let idx = parent.child_index(id)?;
            trace!(level, node = id, "climb");
            start = Some(match direction {
                Direction::Forward => idx + 1,
                Direction::Backward => idx,
            });
            level += 1;
        }
    }

    /// Build a cursor, computing its prefix from the leaf and every ancestor.
    fn cursor_at(
        &self,
        path: TreePath,
        leaf: &Node,
        idx: usize,
        state: CursorState,
    ) -> Result<Cursor, TreeError> {
        let mut prefix = leaf.prefix(&self.schema, idx)?;
        for level in 1..path.len() {
            let parent = self.load(path.get(level)?)?;
            let child_idx = parent.child_index(path.get(level - 1)?)?;
            prefix.add(&parent.prefix(&self.schema, child_idx)?)?;
        }
        Ok(Cursor {
            path,
            idx,
            leaf_size: leaf.size(),
            prefix,
            state,
        })
    }

    /// Path to the first or last leaf.
    fn edge_path(&self, last: bool) -> Result<(TreePath, Node), TreeError> {
        let mut node = self.load(self.root)?;
        let mut path = TreePath::build(self.root, usize::from(node.level()) + 1);
        while !node.is_leaf() {
            let idx = if last {
                node.size().checked_sub(1).ok_or_else(|| TreeError::Inconsistent {
                    node: node.id(),
                    reason: "branch has no children".to_string(),
                })?
            } else {
                0
            };
            let child = node.child(idx)?;
            path.set(usize::from(node.level()) - 1, child)?;
            node = self.load(child)?;
        }
        Ok((path, node))
    }

    fn sentinel(&self, direction: Direction) -> Result<Cursor, TreeError> {
        match direction {
            Direction::Forward => self.end(),
            Direction::Backward => self.before_begin(),
        }
    }

    /// Cursor on the first entry, or the end sentinel for an empty tree.
    pub fn begin(&self) -> Result<Cursor, TreeError> {
        let (path, leaf) = self.edge_path(false)?;
        let state = if leaf.size() == 0 {
            CursorState::End
        } else {
            CursorState::Valid
        };
        self.cursor_at(path, &leaf, 0, state)
    }

    /// One past the last entry.
    pub fn end(&self) -> Result<Cursor, TreeError> {
        let (path, leaf) = self.edge_path(true)?;
        let idx = leaf.size();
        self.cursor_at(path, &leaf, idx, CursorState::End)
    }

    /// One before the first entry.
    pub fn before_begin(&self) -> Result<Cursor, TreeError> {
        let (path, leaf) = self.edge_path(false)?;
        self.cursor_at(path, &leaf, 0, CursorState::BeforeBegin)
    }

    /// Cursor on the entry at absolute position `pos`; `pos == size` gives
    /// the end sentinel.
    pub fn seek(&self, pos: u64) -> Result<Cursor, TreeError> {
        let size = self.size()?;
        if pos > size {
            return Err(TreeError::PositionOutOfRange { pos, size });
        }
        let walker = FindWalker::new(0, pos, SearchType::Gt, Direction::Forward);
        Ok(self.ctr_descend(walker)?.0)
    }

    fn check_dim(&self, dim: usize) -> Result<(), TreeError> {
        let width = self.schema.accumulator_width();
        if dim >= width {
            return Err(TreeError::NoSuchDimension { dim, width });
        }
        Ok(())
    }

    /// Locate an entry by the running sum of dimension `dim`.
    ///
    /// For a dimension holding key deltas the running sum is the key, so
    /// this is an ordered key search.
    pub fn find(
        &self,
        dim: usize,
        target: u64,
        comparison: Comparison,
    ) -> Result<Cursor, TreeError> {
        self.check_dim(dim)?;
        let forward = |search| {
            let walker = FindWalker::new(dim, target, search, Direction::Forward);
            self.ctr_descend(walker).map(|(cursor, ())| cursor)
        };
        match comparison {
            Comparison::Ge => forward(SearchType::Ge),
            Comparison::Gt => forward(SearchType::Gt),
            Comparison::Lt | Comparison::Le => {
                let search = if comparison == Comparison::Lt {
                    SearchType::Ge
                } else {
                    SearchType::Gt
                };
                let mut cursor = forward(search)?;
                self.prev(&mut cursor)?;
                Ok(cursor)
            }
            Comparison::Eq => {
                let cursor = forward(SearchType::Ge)?;
                if cursor.is_valid() && self.key(&cursor, dim)? == target {
                    Ok(cursor)
                } else {
                    self.end()
                }
            }
        }
    }

    /// Occurrences of `symbol` in stream `stream` over positions `[0, pos)`.
    pub fn rank(&self, stream: usize, symbol: u64, pos: u64) -> Result<u64, TreeError> {
        let size = self.size()?;
        if pos > size {
            return Err(TreeError::PositionOutOfRange { pos, size });
        }
        let walker = RankWalker::new(&self.schema, stream, symbol, pos)?;
        Ok(self.ctr_descend(walker)?.1)
    }

    /// Cursor on the `nth` (1-based) occurrence of `symbol`, or the end
    /// sentinel if there are fewer.
    pub fn select(&self, stream: usize, symbol: u64, nth: u64) -> Result<Cursor, TreeError> {
        let walker = SelectWalker::new(&self.schema, stream, symbol, nth, Direction::Forward)?;
        Ok(self.ctr_descend(walker)?.0)
    }

    /// The `nth` occurrence of `symbol` at or after the cursor.
    pub fn select_fw(
        &self,
        cursor: &Cursor,
        stream: usize,
        symbol: u64,
        nth: u64,
    ) -> Result<Cursor, TreeError> {
        let walker = SelectWalker::new(&self.schema, stream, symbol, nth, Direction::Forward)?;
        Ok(self.walk_from(cursor, walker)?.0)
    }

    /// The `nth` occurrence of `symbol` before the cursor, counting backwards.
    pub fn select_bw(
        &self,
        cursor: &Cursor,
        stream: usize,
        symbol: u64,
        nth: u64,
    ) -> Result<Cursor, TreeError> {
        let walker = SelectWalker::new(&self.schema, stream, symbol, nth, Direction::Backward)?;
        Ok(self.walk_from(cursor, walker)?.0)
    }

    /// Move the cursor by `offset` entries and return the distance actually
    /// covered.
    ///
    /// Running off either end parks the cursor on the matching sentinel; the
    /// end sentinel sits one past the last entry and the before-begin
    /// sentinel one before the first. On an empty tree nothing is covered.
    pub fn skip(&self, cursor: &mut Cursor, offset: i64) -> Result<u64, TreeError> {
        if offset == 0 {
            return Ok(0);
        }
        let distance = offset.unsigned_abs();
        let direction = if offset > 0 {
            Direction::Forward
        } else {
            Direction::Backward
        };

        match (cursor.state, direction) {
            (CursorState::BeforeBegin, Direction::Backward) => Ok(0),
            (CursorState::BeforeBegin, Direction::Forward) => {
                *cursor = self.begin()?;
                if cursor.is_end() {
                    return Ok(0);
                }
                if distance == 1 {
                    return Ok(1);
                }
                let rest = self.skip(cursor, offset - 1)?;
                Ok(rest + 1)
            }
            _ => {
                let walker = SkipWalker::new(distance, direction);
                let (moved, covered) = self.walk_from(cursor, walker)?;
                *cursor = moved;
                Ok(covered)
            }
        }
    }

    /// Advance one entry, updating the prefix in place when staying in the
    /// same leaf.
    pub fn next(&self, cursor: &mut Cursor) -> Result<(), TreeError> {
        match cursor.state {
            CursorState::Valid if cursor.idx + 1 < cursor.leaf_size => {
                let leaf = self.load(cursor.leaf())?;
                let row = leaf.entry(&self.schema, cursor.idx)?;
                cursor.prefix.add(&self.schema.row_accumulator(&row)?)?;
                cursor.idx += 1;
                Ok(())
            }
            CursorState::End => Ok(()),
            _ => self.skip(cursor, 1).map(|_| ()),
        }
    }

    /// Step back one entry.
    pub fn prev(&self, cursor: &mut Cursor) -> Result<(), TreeError> {
        match cursor.state {
            CursorState::Valid | CursorState::End if cursor.idx > 0 => {
                let leaf = self.load(cursor.leaf())?;
                let row = leaf.entry(&self.schema, cursor.idx - 1)?;
                cursor.prefix.sub(&self.schema.row_accumulator(&row)?)?;
                cursor.idx -= 1;
                cursor.state = CursorState::Valid;
                Ok(())
            }
            CursorState::BeforeBegin => Ok(()),
            _ => self.skip(cursor, -1).map(|_| ()),
        }
    }

    /// Row at the cursor.
    pub fn entry(&self, cursor: &Cursor) -> Result<Vec<u64>, TreeError> {
        if !cursor.is_valid() {
            return Err(TreeError::InvalidCursor(cursor.state));
        }
        Ok(self.load(cursor.leaf())?.entry(&self.schema, cursor.idx)?)
    }

    /// Running sum of `dim` up to and including the cursor's entry.
    pub fn key(&self, cursor: &Cursor, dim: usize) -> Result<u64, TreeError> {
        self.check_dim(dim)?;
        let row = self.entry(cursor)?;
        let own = self.schema.row_accumulator(&row)?.get(dim);
        cursor
            .prefix
            .get(dim)
            .checked_add(own)
            .ok_or(TreeError::Accumulator(AccumulatorError::Overflow { dim }))
    }

    /// Rebuild a stale cursor at its absolute position.
    pub fn refresh(&self, cursor: &mut Cursor) -> Result<(), TreeError> {
        *cursor = if cursor.is_before_begin() {
            self.before_begin()?
        } else {
            let size = self.size()?;
            self.seek(cursor.position().min(size))?
        };
        Ok(())
    }

    /// Text dump of one node block.
    pub fn ctr_dump_node(&self, id: NodeId) -> Result<String, TreeError> {
        Ok(dump_block(self.store.resolve(id)?)?)
    }

    /// One line per path level, leaf first.
    pub fn ctr_dump_path(&self, path: &TreePath) -> Result<String, TreeError> {
        let mut out = String::new();
        for (level, &id) in path.as_slice().iter().enumerate() {
            let node = self.load(id)?;
            let _ = writeln!(
                out,
                "level {level}: node {id} {:?} root={} size={}",
                node.header().kind,
                node.is_root(),
                node.size()
            );
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<TreeStats, TreeError> {
        let root = self.load(self.root)?;
        let height = usize::from(root.level());
        let mut stats = TreeStats {
            height,
            nodes_per_level: vec![0; height + 1],
            entries: root.accumulator(&self.schema)?.get(0),
            used_bytes: 0,
            block_size: self.config.block_size,
        };

        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            let node = self.load(id)?;
            stats.nodes_per_level[usize::from(node.level())] += 1;
            stats.used_bytes += node.used_bytes();
            if !node.is_leaf() {
                for idx in 0..node.size() {
                    pending.push(node.child(idx)?);
                }
            }
        }
        Ok(stats)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    Store(StoreError),
    Node(NodeError),
    Path(PathError),
    Stream(StreamError),
    Schema(SchemaError),
    Accumulator(AccumulatorError),
    Config(ConfigError),
    /// An entry does not fit even in a freshly split node.
    EntryTooLarge { block_size: usize },
    BlockTooSmall {
        block_size: usize,
        leaf_capacity: usize,
        branch_capacity: usize,
    },
    /// The operation needs a cursor on an entry.
    InvalidCursor(CursorState),
    PositionOutOfRange { pos: u64, size: u64 },
    NoSuchDimension { dim: usize, width: usize },
    /// A structural invariant does not hold.
    Inconsistent { node: NodeId, reason: String },
    NotRoot(NodeId),
}

impl TreeError {
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::Node(e) if e.is_out_of_memory())
    }
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Node(e) => write!(f, "node error: {e}"),
            Self::Path(e) => write!(f, "path error: {e}"),
            Self::Stream(e) => write!(f, "stream error: {e}"),
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::Accumulator(e) => write!(f, "accumulator error: {e}"),
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::EntryTooLarge { block_size } => {
                write!(f, "entry does not fit in an empty {block_size}-byte node")
            }
            Self::BlockTooSmall {
                block_size,
                leaf_capacity,
                branch_capacity,
            } => write!(
                f,
                "block size {block_size} too small: leaf capacity {leaf_capacity}, \
                 branch capacity {branch_capacity}"
            ),
            Self::InvalidCursor(state) => write!(f, "cursor is not on an entry ({state:?})"),
            Self::PositionOutOfRange { pos, size } => {
                write!(f, "position {pos} out of range (size {size})")
            }
            Self::NoSuchDimension { dim, width } => {
                write!(f, "dimension {dim} does not exist (width {width})")
            }
            Self::Inconsistent { node, reason } => {
                write!(f, "inconsistent tree at node {node}: {reason}")
            }
            Self::NotRoot(id) => write!(f, "node {id} is not a root"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Node(e) => Some(e),
            Self::Path(e) => Some(e),
            Self::Stream(e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::Accumulator(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for TreeError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<NodeError> for TreeError {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}

impl From<PathError> for TreeError {
    fn from(e: PathError) -> Self {
        Self::Path(e)
    }
}

impl From<StreamError> for TreeError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<SchemaError> for TreeError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<AccumulatorError> for TreeError {
    fn from(e: AccumulatorError) -> Self {
        Self::Accumulator(e)
    }
}

impl From<ConfigError> for TreeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packed::StreamSpec;
    use crate::store::MemoryStore;

    fn schema() -> Schema {
        Schema::new(vec![
            StreamSpec::SumTree { columns: 1 },
            StreamSpec::Bitmap,
        ])
        .expect("schema")
    }

    fn filled(count: u64) -> Tree<MemoryStore> {
        let config = TreeConfig::default().with_block_size(256);
        let mut tree = Tree::create(MemoryStore::new(256), schema(), config).expect("create");
        for i in 0..count {
            let mut cursor = tree.end().expect("end");
            tree.ctr_insert(&mut cursor, &[i % 3, i % 2]).expect("insert");
        }
        tree
    }

    #[test]
    fn test_create_rejects_small_blocks() {
        let config = TreeConfig::default().with_block_size(128);
        let err = Tree::create(MemoryStore::new(128), schema(), config)
            .err()
            .expect("too small");
        assert!(matches!(err, TreeError::BlockTooSmall { block_size: 128, .. }));

        let config = TreeConfig::default().with_block_size(100);
        let err = Tree::create(MemoryStore::new(100), schema(), config)
            .err()
            .expect("invalid");
        assert!(matches!(err, TreeError::Config(_)));
    }

    #[test]
    fn test_open_existing_root() {
        let tree = filled(200);
        let root = tree.root();
        let config = *tree.config();
        let total = tree.total().expect("total");

        let store = tree.into_store();
        let reopened = Tree::open(store, schema(), config, root).expect("open");
        assert_eq!(reopened.total().expect("total"), total);
        reopened.check().expect("check");

        let leaf = reopened.begin().expect("begin").leaf();
        assert_ne!(leaf, root);
        let store = reopened.into_store();
        assert_eq!(
            Tree::open(store, schema(), config, leaf).err(),
            Some(TreeError::NotRoot(leaf))
        );
    }

    #[test]
    fn test_open_with_wrong_schema() {
        let tree = filled(3);
        let root = tree.root();
        let config = *tree.config();
        let other = Schema::new(vec![StreamSpec::SumTree { columns: 2 }]).expect("schema");
        let err = Tree::open(tree.into_store(), other, config, root).err();
        assert!(matches!(err, Some(TreeError::Inconsistent { .. })));
    }

    #[test]
    fn test_stats_count_levels() {
        let tree = filled(500);
        let stats = tree.stats().expect("stats");
        assert_eq!(stats.entries, 500);
        assert_eq!(stats.height, tree.height().expect("height"));
        assert_eq!(stats.nodes_per_level.len(), stats.height + 1);
        assert_eq!(stats.nodes_per_level[stats.height], 1);
        assert_eq!(stats.node_count(), tree.store().live_blocks());
        assert!(stats.leaf_count() > 1);
        assert!(stats.fill_ratio() > 0.0 && stats.fill_ratio() <= 1.0);
    }

    #[test]
    fn test_refresh_stale_cursor() {
        let mut tree = filled(50);
        let stale = tree.seek(40).expect("seek");
        for _ in 0..20 {
            let mut cursor = tree.begin().expect("begin");
            tree.ctr_remove(&mut cursor).expect("remove");
        }

        let mut cursor = stale;
        tree.refresh(&mut cursor).expect("refresh");
        assert!(cursor.is_end());
        assert_eq!(cursor.position(), 30);

        let mut cursor = tree.before_begin().expect("before_begin");
        tree.refresh(&mut cursor).expect("refresh");
        assert!(cursor.is_before_begin());
    }

    #[test]
    fn test_dumps_name_every_level() {
        let tree = filled(300);
        let cursor = tree.seek(150).expect("seek");
        let dump = tree.ctr_dump_path(cursor.path()).expect("dump");
        assert_eq!(dump.lines().count(), cursor.path().len());
        assert!(dump.contains("root=true"));

        let node = tree.ctr_dump_node(cursor.leaf()).expect("dump");
        assert!(node.contains("crc32="));
    }

    #[test]
    fn test_entry_requires_valid_cursor() {
        let tree = filled(2);
        let end = tree.end().expect("end");
        assert_eq!(
            tree.entry(&end),
            Err(TreeError::InvalidCursor(CursorState::End))
        );
        assert_eq!(
            tree.key(&end, 4).err(),
            Some(TreeError::NoSuchDimension { dim: 4, width: 4 })
        );
        let err = TreeError::PositionOutOfRange { pos: 9, size: 2 };
        assert_eq!(err.to_string(), "position 9 out of range (size 2)");
    }
}
