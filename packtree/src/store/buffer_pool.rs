//! Pool of recycled block buffers.
//!
//! Released blocks hand their buffers back here so that split-heavy
//! workloads do not pay an allocation per new node.
//!
//! # Invariants
//!
//! - Pooled buffers all have the pool's block size
//! - The free list never grows past `capacity`

/// Default number of buffers kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct BlockPool {
    free_list: Vec<Box<[u8]>>,
    block_size: usize,
    capacity: usize,
}

impl BlockPool {
    /// Create an empty pool for buffers of `block_size` bytes.
    #[must_use]
    pub const fn new(block_size: usize, capacity: usize) -> Self {
        Self {
            free_list: Vec::new(),
            block_size,
            capacity,
        }
    }

    /// Lease a buffer, or `None` if the pool is empty.
    ///
    /// Contents are undefined (may contain stale data).
    pub fn lease(&mut self) -> Option<Box<[u8]>> {
        self.free_list.pop()
    }

    /// Lease a zeroed buffer, allocating a fresh one when the pool is empty.
    pub fn lease_zeroed(&mut self) -> Box<[u8]> {
        match self.lease() {
            Some(mut buffer) => {
                buffer.fill(0);
                buffer
            }
            None => vec![0u8; self.block_size].into_boxed_slice(),
        }
    }

    /// Return a buffer. Buffers of the wrong size or beyond capacity are dropped.
    pub fn return_buffer(&mut self, buffer: Box<[u8]>) {
        if buffer.len() == self.block_size && self.free_list.len() < self.capacity {
            self.free_list.push(buffer);
        }
    }

    /// Buffers ready for reuse.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free_list.len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_zeroed_allocates_when_empty() {
        let mut pool = BlockPool::new(64, 4);
        assert_eq!(pool.available(), 0);
        assert!(pool.lease().is_none());
        let buffer = pool.lease_zeroed();
        assert_eq!(buffer.len(), 64);
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_returned_buffers_are_zeroed_on_reuse() {
        let mut pool = BlockPool::new(32, 4);
        pool.return_buffer(vec![0xAA; 32].into_boxed_slice());
        assert_eq!(pool.available(), 1);

        let buffer = pool.lease_zeroed();
        assert!(buffer.iter().all(|&b| b == 0));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_capacity_and_size_limits() {
        let mut pool = BlockPool::new(16, 2);
        pool.return_buffer(vec![0; 8].into_boxed_slice());
        assert_eq!(pool.available(), 0, "wrong size is dropped");

        for _ in 0..3 {
            pool.return_buffer(vec![0; 16].into_boxed_slice());
        }
        assert_eq!(pool.available(), pool.capacity());
    }
}
