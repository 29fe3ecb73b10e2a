//! Tree nodes.
//!
//! A node is one fixed-size block: a 32-byte header followed by a packed
//! allocator region with one slot per stream.
//!
//! ```text
//! [0]       node kind (0 = branch, 1 = leaf)
//! [1]       flags (bit 0: root)
//! [2..4)    level (u16, 0 = leaf)
//! [4..8)    active stream mask (u32)
//! [8..16)   node id (u64)
//! [16..32)  reserved
//! [32..)    packed allocator region
//! ```
//!
//! Leaves hold one slot per active schema stream. Branches hold two: a
//! quick-sum tree of per-child accumulators and a dense array of child ids.
//!
//! Nodes are decoded into owned streams, edited, and written back with a
//! single allocator commit. A write that does not fit fails before touching
//! the block.

#![allow(clippy::cast_possible_truncation)]

use std::fmt::Write as _;

use crate::btree::accumulator::Accumulator;
use crate::btree::schema::{Schema, SchemaError};
use crate::packed::allocator::required_size;
use crate::packed::{
    AllocError, AnyStream, ArrayStream, Block, PackedAllocator, PackedStream, StreamError,
    StreamKind, StreamSpec, SumTreeStream,
};
use crate::store::NodeId;

/// Size of the node header in bytes.
pub const NODE_HEADER_SIZE: usize = 32;

const FLAG_ROOT: u8 = 0x01;

/// Branch slot holding per-child accumulators.
const ACCUMULATOR_SLOT: usize = 0;

/// Branch slot holding child ids.
const CHILDREN_SLOT: usize = 1;

/// Rows shown per stream in a dump.
const DUMP_ROWS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    Branch = 0,
    Leaf = 1,
}

impl TryFrom<u8> for NodeKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Branch),
            1 => Ok(Self::Leaf),
            _ => Err(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub kind: NodeKind,
    pub is_root: bool,
    pub level: u16,
    pub stream_mask: u32,
    pub id: NodeId,
}

impl NodeHeader {
    pub fn read(block: &Block) -> Result<Self, NodeError> {
        if block.len() < NODE_HEADER_SIZE {
            return Err(NodeError::BlockTooSmall { size: block.len() });
        }
        let kind = NodeKind::try_from(block.read_u8(0)).map_err(NodeError::InvalidKind)?;
        Ok(Self {
            kind,
            is_root: block.read_u8(1) & FLAG_ROOT != 0,
            level: block.read_u16(2),
            stream_mask: block.read_u32(4),
            id: block.read_u64(8),
        })
    }

    fn write_to(&self, bytes: &mut [u8]) {
        bytes[..NODE_HEADER_SIZE].fill(0);
        bytes[0] = self.kind as u8;
        bytes[1] = if self.is_root { FLAG_ROOT } else { 0 };
        bytes[2..4].copy_from_slice(&self.level.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.stream_mask.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.id.to_le_bytes());
    }
}

/// A decoded node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    header: NodeHeader,
    streams: Vec<AnyStream>,
}

impl Node {
    /// Stream specs a node of this kind carries.
    #[must_use]
    pub fn layout(schema: &Schema, kind: NodeKind, mask: u32) -> Vec<StreamSpec> {
        match kind {
            NodeKind::Leaf => schema
                .streams()
                .iter()
                .enumerate()
                .filter(|(stream, _)| mask & (1 << stream) != 0)
                .map(|(_, &spec)| spec)
                .collect(),
            NodeKind::Branch => vec![
                StreamSpec::SumTree {
                    columns: schema.accumulator_width() as u8,
                },
                StreamSpec::Array {
                    columns: 1,
                    indexed: false,
                },
            ],
        }
    }

    /// Entries (leaf) or children (branch) that fit in a block of `block_size`.
    #[must_use]
    pub fn capacity_for(schema: &Schema, kind: NodeKind, mask: u32, block_size: usize) -> usize {
        let specs = Self::layout(schema, kind, mask);
        let fits = |count: usize| {
            let sizes: Vec<usize> = specs.iter().map(|spec| spec.encoded_len(count)).collect();
            NODE_HEADER_SIZE + required_size(&sizes) <= block_size
        };
        if !fits(0) {
            return 0;
        }
        // Every entry costs at least one bit.
        let mut lo = 0;
        let mut hi = block_size * 8 + 1;
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            if fits(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn empty(schema: &Schema, kind: NodeKind, level: u16, mask: u32, id: NodeId) -> Self {
        Self {
            header: NodeHeader {
                kind,
                is_root: false,
                level,
                stream_mask: mask,
                id,
            },
            streams: Self::layout(schema, kind, mask)
                .into_iter()
                .map(StreamSpec::empty)
                .collect(),
        }
    }

    /// An empty leaf with every schema stream active.
    #[must_use]
    pub fn new_leaf(schema: &Schema, id: NodeId) -> Self {
        Self::empty(schema, NodeKind::Leaf, 0, schema.full_mask(), id)
    }

    #[must_use]
    pub fn new_branch(schema: &Schema, id: NodeId, level: u16) -> Self {
        Self::empty(schema, NodeKind::Branch, level, schema.full_mask(), id)
    }

    /// An empty, non-root node shaped like this one.
    #[must_use]
    pub fn sibling(&self, id: NodeId) -> Self {
        Self {
            header: NodeHeader {
                is_root: false,
                id,
                ..self.header
            },
            streams: self.streams.iter().map(|s| s.spec().empty()).collect(),
        }
    }

    pub fn read(block: &Block) -> Result<Self, NodeError> {
        let header = NodeHeader::read(block)?;
        let alloc = PackedAllocator::open(&block.as_bytes()[NODE_HEADER_SIZE..]);
        alloc.validate()?;
        let streams = (0..alloc.slot_count())
            .map(|slot| -> Result<AnyStream, NodeError> {
                Ok(AnyStream::decode(alloc.slot(slot)?)?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        match header.kind {
            NodeKind::Leaf => {
                let expected = header.stream_mask.count_ones() as usize;
                if streams.len() != expected {
                    return Err(NodeError::StreamCountMismatch {
                        expected,
                        actual: streams.len(),
                    });
                }
            }
            NodeKind::Branch => {
                let kinds: Vec<StreamKind> = streams.iter().map(PackedStream::kind).collect();
                if kinds != [StreamKind::SumTree, StreamKind::Array] {
                    return Err(NodeError::BadBranchLayout);
                }
            }
        }
        Ok(Self { header, streams })
    }

    /// Encode into `block`. On error the block is unchanged.
    pub fn write(&self, block: &mut Block) -> Result<(), NodeError> {
        if block.len() < NODE_HEADER_SIZE {
            return Err(NodeError::BlockTooSmall { size: block.len() });
        }
        let images = self
            .streams
            .iter()
            .map(PackedStream::encode)
            .collect::<Result<Vec<_>, _>>()?;
        let slices: Vec<&[u8]> = images.iter().map(Vec::as_slice).collect();

        let (head, region) = block.as_bytes_mut().split_at_mut(NODE_HEADER_SIZE);
        PackedAllocator::open(region).commit(&slices)?;
        self.header.write_to(head);
        Ok(())
    }

    /// Bytes this node needs once written: header, slot table and slots.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        let sizes: Vec<usize> = self.streams.iter().map(PackedStream::encoded_len).collect();
        NODE_HEADER_SIZE + required_size(&sizes)
    }

    #[must_use]
    pub fn fits(&self, block_size: usize) -> bool {
        self.used_bytes() <= block_size
    }

    #[must_use]
    pub const fn header(&self) -> &NodeHeader {
        &self.header
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.header.id
    }

    #[must_use]
    pub const fn level(&self) -> u16 {
        self.header.level
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.header.kind == NodeKind::Leaf
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.header.is_root
    }

    pub const fn set_root(&mut self, is_root: bool) {
        self.header.is_root = is_root;
    }

    #[must_use]
    pub fn streams(&self) -> &[AnyStream] {
        &self.streams
    }

    pub fn stream(&self, stream: usize) -> Result<&AnyStream, NodeError> {
        self.expect_leaf()?;
        self.streams.get(stream).ok_or(NodeError::StreamCountMismatch {
            expected: stream + 1,
            actual: self.streams.len(),
        })
    }

    /// Entries in a leaf, children in a branch.
    #[must_use]
    pub fn size(&self) -> usize {
        match self.header.kind {
            NodeKind::Leaf => self.streams.first().map_or(0, PackedStream::size),
            NodeKind::Branch => self.streams.get(CHILDREN_SLOT).map_or(0, PackedStream::size),
        }
    }

    fn expect_leaf(&self) -> Result<(), NodeError> {
        if self.is_leaf() {
            Ok(())
        } else {
            Err(NodeError::NotALeaf(self.id()))
        }
    }

    fn expect_full_leaf(&self, schema: &Schema) -> Result<(), NodeError> {
        self.expect_leaf()?;
        if self.streams.len() != schema.len() {
            return Err(NodeError::StreamCountMismatch {
                expected: schema.len(),
                actual: self.streams.len(),
            });
        }
        Ok(())
    }

    /// Schema index of every stream present in this leaf.
    fn schema_streams(&self) -> impl Iterator<Item = (usize, &AnyStream)> {
        let mask = self.header.stream_mask;
        (0..32)
            .filter(move |stream| mask & (1 << stream) != 0)
            .zip(&self.streams)
    }

    /// Concatenated row of every stream at `idx`.
    pub fn entry(&self, schema: &Schema, idx: usize) -> Result<Vec<u64>, NodeError> {
        self.expect_full_leaf(schema)?;
        let mut row = Vec::with_capacity(schema.entry_width());
        for stream in &self.streams {
            row.extend(stream.row(idx)?);
        }
        Ok(row)
    }

    pub fn insert_entry(
        &mut self,
        schema: &Schema,
        idx: usize,
        row: &[u64],
    ) -> Result<(), NodeError> {
        self.expect_full_leaf(schema)?;
        schema.validate_row(row)?;
        if idx > self.size() {
            return Err(StreamError::OutOfRange {
                pos: idx,
                size: self.size(),
            }
            .into());
        }
        for (stream, data) in self.streams.iter_mut().enumerate() {
            data.insert_range(idx, &row[schema.columns(stream)])?;
        }
        Ok(())
    }

    pub fn remove_entry(&mut self, idx: usize) -> Result<(), NodeError> {
        self.expect_leaf()?;
        for stream in &mut self.streams {
            stream.remove_range(idx, idx + 1)?;
        }
        Ok(())
    }

    pub fn set_entry(&mut self, schema: &Schema, idx: usize, row: &[u64]) -> Result<(), NodeError> {
        self.expect_full_leaf(schema)?;
        schema.validate_row(row)?;
        if idx >= self.size() {
            return Err(StreamError::OutOfRange {
                pos: idx,
                size: self.size(),
            }
            .into());
        }
        for (stream, data) in self.streams.iter_mut().enumerate() {
            data.set(idx, &row[schema.columns(stream)])?;
        }
        Ok(())
    }

    /// Aggregate of everything before local index `idx`.
    pub fn prefix(&self, schema: &Schema, idx: usize) -> Result<Accumulator, NodeError> {
        match self.header.kind {
            NodeKind::Leaf => {
                if idx > self.size() {
                    return Err(StreamError::OutOfRange {
                        pos: idx,
                        size: self.size(),
                    }
                    .into());
                }
                let mut values = vec![0u64; schema.accumulator_width()];
                values[0] = idx as u64;
                for (stream, data) in self.schema_streams() {
                    for index in 0..data.indexes() {
                        values[schema.dim(stream, index)?] = data.sum(index, 0, idx)?;
                    }
                }
                Ok(Accumulator::from_vec(values))
            }
            NodeKind::Branch => Ok(Accumulator::from_vec(
                self.accumulators()?.row_sums(0, idx)?,
            )),
        }
    }

    /// Aggregate of the whole node.
    pub fn accumulator(&self, schema: &Schema) -> Result<Accumulator, NodeError> {
        self.prefix(schema, self.size())
    }

    pub fn accumulators(&self) -> Result<&SumTreeStream, NodeError> {
        self.streams
            .get(ACCUMULATOR_SLOT)
            .and_then(AnyStream::as_sum_tree)
            .filter(|_| !self.is_leaf())
            .ok_or(NodeError::NotABranch(self.id()))
    }

    pub fn children(&self) -> Result<&ArrayStream, NodeError> {
        self.streams
            .get(CHILDREN_SLOT)
            .and_then(AnyStream::as_array)
            .filter(|_| !self.is_leaf())
            .ok_or(NodeError::NotABranch(self.id()))
    }

    fn branch_streams_mut(&mut self) -> Result<(&mut SumTreeStream, &mut ArrayStream), NodeError> {
        let id = self.id();
        if self.is_leaf() {
            return Err(NodeError::NotABranch(id));
        }
        match self.streams.as_mut_slice() {
            [AnyStream::SumTree(accs), AnyStream::Array(children)] => Ok((accs, children)),
            _ => Err(NodeError::BadBranchLayout),
        }
    }

    pub fn child(&self, idx: usize) -> Result<NodeId, NodeError> {
        Ok(self.children()?.get(idx, 0)?)
    }

    /// Local index of child `id`.
    pub fn child_index(&self, id: NodeId) -> Result<usize, NodeError> {
        self.children()?
            .position_of(0, id)
            .ok_or(NodeError::NoSuchChild { parent: self.id(), child: id })
    }

    pub fn child_accumulator(&self, idx: usize) -> Result<Accumulator, NodeError> {
        Ok(Accumulator::from_vec(self.accumulators()?.row(idx)?))
    }

    pub fn insert_child(
        &mut self,
        idx: usize,
        id: NodeId,
        acc: &Accumulator,
    ) -> Result<(), NodeError> {
        let (accs, children) = self.branch_streams_mut()?;
        accs.insert_range(idx, acc.as_slice())?;
        children.insert_range(idx, &[id])?;
        Ok(())
    }

    pub fn remove_child(&mut self, idx: usize) -> Result<(), NodeError> {
        let (accs, children) = self.branch_streams_mut()?;
        accs.remove_range(idx, idx + 1)?;
        children.remove_range(idx, idx + 1)?;
        Ok(())
    }

    pub fn set_child_accumulator(
        &mut self,
        idx: usize,
        acc: &Accumulator,
    ) -> Result<(), NodeError> {
        let (accs, _) = self.branch_streams_mut()?;
        accs.set(idx, acc.as_slice())?;
        Ok(())
    }

    fn check_compatible(&self, other: &Self) -> Result<(), NodeError> {
        if self.header.kind != other.header.kind
            || self.header.stream_mask != other.header.stream_mask
            || self.streams.len() != other.streams.len()
        {
            return Err(NodeError::LayoutMismatch {
                left: self.id(),
                right: other.id(),
            });
        }
        Ok(())
    }

    /// Move entries `[at, size)` of every stream to the front of `other`.
    pub fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), NodeError> {
        self.check_compatible(other)?;
        for (stream, target) in self.streams.iter_mut().zip(&mut other.streams) {
            stream.split_to(target, at)?;
        }
        Ok(())
    }

    /// Append every entry of this node to the end of `other`.
    pub fn merge_into(&self, other: &mut Self) -> Result<(), NodeError> {
        self.check_compatible(other)?;
        for (stream, target) in self.streams.iter().zip(&mut other.streams) {
            stream.merge_with(target)?;
        }
        Ok(())
    }
}

/// Human-readable report of a node block.
pub fn dump_block(block: &Block) -> Result<String, NodeError> {
    let node = Node::read(block)?;
    let alloc = PackedAllocator::open(&block.as_bytes()[NODE_HEADER_SIZE..]);
    let header = node.header();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "node {} {:?} level={} root={} mask={:#x} size={}",
        header.id,
        header.kind,
        header.level,
        header.is_root,
        header.stream_mask,
        node.size()
    );
    let _ = writeln!(
        out,
        "  block={} client_area={} used={} free={} crc32={:08x}",
        block.len(),
        alloc.client_area(),
        NODE_HEADER_SIZE + alloc.used(),
        alloc.free_space(),
        block.checksum()
    );
    for (slot, stream) in node.streams().iter().enumerate() {
        let range = alloc.slot_range(slot)?;
        let _ = writeln!(
            out,
            "  slot {slot}: offset={} len={} {:?} size={}",
            NODE_HEADER_SIZE + range.start,
            range.len(),
            stream.spec(),
            stream.size()
        );
        for pos in 0..stream.size().min(DUMP_ROWS) {
            let _ = writeln!(out, "    [{pos}] {:?}", stream.row(pos)?);
        }
        if stream.size() > DUMP_ROWS {
            let _ = writeln!(out, "    ... {} more", stream.size() - DUMP_ROWS);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    Alloc(AllocError),
    Stream(StreamError),
    Schema(SchemaError),
    InvalidKind(u8),
    BlockTooSmall { size: usize },
    NotALeaf(NodeId),
    NotABranch(NodeId),
    StreamCountMismatch { expected: usize, actual: usize },
    BadBranchLayout,
    NoSuchChild { parent: NodeId, child: NodeId },
    /// Split or merge between nodes of different shapes.
    LayoutMismatch { left: NodeId, right: NodeId },
}

impl NodeError {
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::Alloc(e) if e.is_out_of_memory())
    }
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alloc(e) => write!(f, "allocator error: {e}"),
            Self::Stream(e) => write!(f, "stream error: {e}"),
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::InvalidKind(v) => write!(f, "invalid node kind: 0x{v:02x}"),
            Self::BlockTooSmall { size } => write!(f, "block of {size} bytes cannot hold a node"),
            Self::NotALeaf(id) => write!(f, "node {id} is not a leaf"),
            Self::NotABranch(id) => write!(f, "node {id} is not a branch"),
            Self::StreamCountMismatch { expected, actual } => {
                write!(f, "expected {expected} streams, found {actual}")
            }
            Self::BadBranchLayout => write!(f, "branch node slots are malformed"),
            Self::NoSuchChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            Self::LayoutMismatch { left, right } => {
                write!(f, "nodes {left} and {right} have different layouts")
            }
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Alloc(e) => Some(e),
            Self::Stream(e) => Some(e),
            Self::Schema(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for NodeError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}

impl From<StreamError> for NodeError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<SchemaError> for NodeError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            StreamSpec::SumTree { columns: 1 },
            StreamSpec::Bitmap,
            StreamSpec::Array {
                columns: 1,
                indexed: false,
            },
        ])
        .expect("schema")
    }

    fn filled_leaf(schema: &Schema, count: u64) -> Node {
        let mut leaf = Node::new_leaf(schema, 7);
        for i in 0..count {
            leaf.insert_entry(schema, i as usize, &[i + 1, i % 2, i * 100])
                .expect("insert");
        }
        leaf
    }

    #[test]
    fn test_write_read_roundtrip() {
        let schema = schema();
        let mut leaf = filled_leaf(&schema, 10);
        leaf.set_root(true);
        let mut block = Block::new(1024);
        leaf.write(&mut block).expect("write");

        let restored = Node::read(&block).expect("read");
        assert_eq!(restored, leaf);
        assert!(restored.is_root());
        assert_eq!(restored.entry(&schema, 3).expect("entry"), vec![4, 1, 300]);
    }

    #[test]
    fn test_prefix_and_accumulator() {
        let schema = schema();
        let leaf = filled_leaf(&schema, 4);
        // keys 1..=4, bits 0,1,0,1
        assert_eq!(
            leaf.prefix(&schema, 3).expect("prefix").as_slice(),
            &[3, 6, 2, 1]
        );
        assert_eq!(
            leaf.accumulator(&schema).expect("acc").as_slice(),
            &[4, 10, 2, 2]
        );
        assert!(leaf.prefix(&schema, 5).is_err());
    }

    #[test]
    fn test_capacity_matches_real_writes() {
        let schema = schema();
        let block_size = 512;
        let capacity = Node::capacity_for(&schema, NodeKind::Leaf, schema.full_mask(), block_size);
        assert!(capacity > 0);

        let mut block = Block::new(block_size);
        filled_leaf(&schema, capacity as u64)
            .write(&mut block)
            .expect("at capacity");
        let err = filled_leaf(&schema, capacity as u64 + 1)
            .write(&mut block)
            .expect_err("past capacity");
        assert!(err.is_out_of_memory());

        assert_eq!(Node::capacity_for(&schema, NodeKind::Leaf, schema.full_mask(), 16), 0);
    }

    #[test]
    fn test_failed_write_leaves_block_untouched() {
        let schema = schema();
        let mut block = Block::new(256);
        let leaf = filled_leaf(&schema, 3);
        leaf.write(&mut block).expect("write");
        let before = block.as_bytes().to_vec();

        let too_big = filled_leaf(&schema, 200);
        assert!(too_big.write(&mut block).is_err());
        assert_eq!(block.as_bytes(), &before[..]);
        assert_eq!(Node::read(&block).expect("read"), leaf);
    }

    #[test]
    fn test_branch_children() {
        let schema = schema();
        let mut branch = Node::new_branch(&schema, 1, 1);
        let a = Accumulator::from_vec(vec![2, 3, 1, 1]);
        let b = Accumulator::from_vec(vec![5, 20, 4, 1]);
        branch.insert_child(0, 10, &a).expect("insert");
        branch.insert_child(1, 11, &b).expect("insert");
        assert_eq!(branch.size(), 2);
        assert_eq!(branch.child(1).expect("child"), 11);
        assert_eq!(branch.child_index(10).expect("index"), 0);
        assert!(branch.child_index(99).is_err());
        assert_eq!(
            branch.accumulator(&schema).expect("acc").as_slice(),
            &[7, 23, 5, 2]
        );

        branch
            .set_child_accumulator(0, &Accumulator::from_vec(vec![1, 1, 1, 0]))
            .expect("set");
        branch.remove_child(1).expect("remove");
        assert_eq!(branch.accumulator(&schema).expect("acc").as_slice(), &[1, 1, 1, 0]);
        assert!(branch.entry(&schema, 0).is_err());

        let mut block = Block::new(512);
        branch.write(&mut block).expect("write");
        assert_eq!(Node::read(&block).expect("read"), branch);
    }

    #[test]
    fn test_split_then_merge_restores_content() {
        let schema = schema();
        let original = filled_leaf(&schema, 40);
        let mut left = original.clone();
        let mut right = left.sibling(8);
        left.split_to(&mut right, 17).expect("split");
        assert_eq!(left.size(), 17);
        assert_eq!(right.size(), 23);
        assert_eq!(
            right.entry(&schema, 0).expect("entry"),
            original.entry(&schema, 17).expect("entry")
        );

        let mut total = left.accumulator(&schema).expect("acc");
        total.add(&right.accumulator(&schema).expect("acc")).expect("add");
        assert_eq!(total, original.accumulator(&schema).expect("acc"));

        right.merge_into(&mut left).expect("merge");
        assert_eq!(left, original);
    }

    #[test]
    fn test_dump_describes_layout() {
        let schema = schema();
        let mut block = Block::new(512);
        filled_leaf(&schema, 3).write(&mut block).expect("write");
        let dump = dump_block(&block).expect("dump");
        assert!(dump.contains("node 7 Leaf level=0"));
        assert!(dump.contains("crc32="));
        assert!(dump.contains("slot 2:"));
        assert!(dump.contains("[2] [200]"));
    }
}
