//! In-memory block store.

#![allow(clippy::cast_possible_truncation)]

use crate::packed::Block;
use crate::store::allocator::HandleAllocator;
use crate::store::buffer_pool::{BlockPool, DEFAULT_POOL_CAPACITY};
use crate::store::{BlockStore, NodeId, StoreError};

/// Handles tracked before the first expansion.
const INITIAL_HANDLES: u64 = 64;

/// Keeps every block in a handle-indexed table.
#[derive(Debug)]
pub struct MemoryStore {
    blocks: Vec<Option<Block>>,
    handles: HandleAllocator,
    pool: BlockPool,
}

impl MemoryStore {
    /// Create a store whose pool recycles blocks of `block_size` bytes.
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        Self {
            blocks: Vec::new(),
            handles: HandleAllocator::new(INITIAL_HANDLES),
            pool: BlockPool::new(block_size, DEFAULT_POOL_CAPACITY),
        }
    }

    /// Buffers waiting in the reuse pool.
    #[must_use]
    pub fn pooled_buffers(&self) -> usize {
        self.pool.available()
    }

    fn next_handle(&mut self) -> Result<NodeId, StoreError> {
        if let Some(id) = self.handles.allocate() {
            return Ok(id);
        }
        let total = self.handles.total_handles();
        let grown = total.checked_mul(2).ok_or(StoreError::Exhausted)?;
        self.handles.expand(grown);
        self.handles.allocate().ok_or(StoreError::Exhausted)
    }
}

impl BlockStore for MemoryStore {
    fn resolve(&self, id: NodeId) -> Result<&Block, StoreError> {
        self.blocks
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or(StoreError::UnknownHandle(id))
    }

    fn resolve_mut(&mut self, id: NodeId) -> Result<&mut Block, StoreError> {
        self.blocks
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(StoreError::UnknownHandle(id))
    }

    fn allocate_block(&mut self, size: usize) -> Result<NodeId, StoreError> {
        if size == 0 {
            return Err(StoreError::InvalidSize(size));
        }
        let id = self.next_handle()?;
        let block = if size == self.pool.block_size() {
            Block::from_buffer(self.pool.lease_zeroed())
        } else {
            Block::new(size)
        };

        let index = id as usize;
        if self.blocks.len() <= index {
            self.blocks.resize_with(index + 1, || None);
        }
        self.blocks[index] = Some(block);
        Ok(id)
    }

    fn release(&mut self, id: NodeId) -> Result<(), StoreError> {
        let block = self
            .blocks
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or(StoreError::UnknownHandle(id))?;
        self.handles.free(id);
        self.pool.return_buffer(block.into_buffer());
        Ok(())
    }

    fn live_blocks(&self) -> usize {
        self.handles.live_count() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_resolve_release() {
        let mut store = MemoryStore::new(128);
        let id = store.allocate_block(128).expect("allocate");
        assert_ne!(id, 0);
        assert_eq!(store.live_blocks(), 1);

        store.resolve_mut(id).expect("resolve").write_u64(0, 42);
        assert_eq!(store.resolve(id).expect("resolve").read_u64(0), 42);

        store.release(id).expect("release");
        assert_eq!(store.live_blocks(), 0);
        assert_eq!(store.pooled_buffers(), 1);
        assert_eq!(store.resolve(id).err(), Some(StoreError::UnknownHandle(id)));
        assert_eq!(store.release(id), Err(StoreError::UnknownHandle(id)));
    }

    #[test]
    fn test_recycled_blocks_are_zeroed() {
        let mut store = MemoryStore::new(64);
        let id = store.allocate_block(64).expect("allocate");
        store.resolve_mut(id).expect("resolve").write_u64(8, u64::MAX);
        store.release(id).expect("release");

        let reused = store.allocate_block(64).expect("allocate");
        assert_eq!(reused, id);
        assert_eq!(store.resolve(reused).expect("resolve").read_u64(8), 0);
    }

    #[test]
    fn test_handle_table_grows() {
        let mut store = MemoryStore::new(32);
        let ids: Vec<NodeId> = (0..200)
            .map(|_| store.allocate_block(32).expect("allocate"))
            .collect();
        assert_eq!(store.live_blocks(), 200);
        for id in ids {
            assert_eq!(store.resolve(id).expect("resolve").len(), 32);
        }
    }

    #[test]
    fn test_null_handle_never_resolves() {
        let store = MemoryStore::new(32);
        assert_eq!(store.resolve(0).err(), Some(StoreError::UnknownHandle(0)));
    }
}
