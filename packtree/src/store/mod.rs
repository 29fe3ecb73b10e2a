//! Block store collaborator.
//!
//! The tree never owns raw memory itself: it asks a [`BlockStore`] for
//! fixed-size blocks by handle. Persistence and copy-on-write sharing are the
//! store's business; the in-memory store here is what the engine, containers
//! and simulation run on.

pub mod allocator;
pub mod buffer_pool;
pub mod memory;

pub use allocator::{HandleAllocator, NULL_HANDLE};
pub use buffer_pool::BlockPool;
pub use memory::MemoryStore;

use crate::packed::Block;

/// Opaque node handle. `0` never names a node.
pub type NodeId = u64;

/// Provider of fixed-size node blocks.
pub trait BlockStore {
    /// Borrow the block behind a handle.
    fn resolve(&self, id: NodeId) -> Result<&Block, StoreError>;

    /// Borrow the block behind a handle for mutation.
    fn resolve_mut(&mut self, id: NodeId) -> Result<&mut Block, StoreError>;

    /// Create a zeroed block of `size` bytes and return its handle.
    fn allocate_block(&mut self, size: usize) -> Result<NodeId, StoreError>;

    /// Drop a block. The handle may be reused afterwards.
    fn release(&mut self, id: NodeId) -> Result<(), StoreError>;

    /// Number of blocks currently allocated.
    fn live_blocks(&self) -> usize;
}

/// Errors from a block store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The handle does not name a live block.
    UnknownHandle(NodeId),
    /// Requested block size is unusable.
    InvalidSize(usize),
    /// No more handles can be issued.
    Exhausted,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownHandle(id) => write!(f, "unknown block handle {id}"),
            Self::InvalidSize(size) => write!(f, "invalid block size {size}"),
            Self::Exhausted => write!(f, "block store exhausted"),
        }
    }
}

impl std::error::Error for StoreError {}
