//! Node handle allocator backed by a bitmap of 64-bit words.
//!
//! A set bit marks a handle in use. Handle 0 is reserved so that it can mean
//! "no node" in paths and headers.

// Handles are u64 but word indices are usize. On 64-bit systems these are the same size.
#![allow(clippy::cast_possible_truncation)]

use crate::store::NodeId;

const WORD_BITS: u64 = 64;

/// The handle that never refers to a node.
pub const NULL_HANDLE: NodeId = 0;

#[derive(Debug)]
pub struct HandleAllocator {
    words: Vec<u64>,
    /// Handles tracked; bits at or past this are never handed out.
    total_handles: u64,
    free_count: u64,
    /// Word where the next search starts.
    cursor: usize,
}

const fn locate(handle: NodeId) -> (usize, u64) {
    ((handle / WORD_BITS) as usize, 1 << (handle % WORD_BITS))
}

impl HandleAllocator {
    /// Create an allocator tracking `total_handles` handles.
    ///
    /// Handle 0 is marked as used from the start.
    #[must_use]
    pub fn new(total_handles: u64) -> Self {
        let total_handles = total_handles.max(1);
        let mut words = vec![0u64; total_handles.div_ceil(WORD_BITS) as usize];
        words[0] |= 1;

        Self {
            words,
            total_handles,
            free_count: total_handles - 1,
            cursor: 0,
        }
    }

    /// Take the lowest free handle at or after the search cursor, wrapping
    /// around once.
    ///
    /// Returns `None` if every tracked handle is in use; see [`Self::expand`].
    pub fn allocate(&mut self) -> Option<NodeId> {
        if self.free_count == 0 {
            return None;
        }

        let count = self.words.len();
        for step in 0..count {
            let index = (self.cursor + step) % count;
            let word = self.words[index];
            if word == u64::MAX {
                continue;
            }
            let handle = index as u64 * WORD_BITS + u64::from(word.trailing_ones());
            if handle >= self.total_handles {
                continue;
            }
            self.words[index] |= 1 << (handle % WORD_BITS);
            self.free_count -= 1;
            self.cursor = index;
            return Some(handle);
        }

        None
    }

    /// Free a previously allocated handle. Returns false if it was not in use.
    pub fn free(&mut self, handle: NodeId) -> bool {
        if handle == NULL_HANDLE || !self.is_allocated(handle) {
            return false;
        }
        let (index, mask) = locate(handle);
        self.words[index] &= !mask;
        self.free_count += 1;
        self.cursor = self.cursor.min(index);
        true
    }

    #[must_use]
    pub fn is_allocated(&self, handle: NodeId) -> bool {
        if handle >= self.total_handles {
            return false;
        }
        let (index, mask) = locate(handle);
        self.words[index] & mask != 0
    }

    #[must_use]
    pub const fn free_count(&self) -> u64 {
        self.free_count
    }

    #[must_use]
    pub const fn total_handles(&self) -> u64 {
        self.total_handles
    }

    /// Handles currently handed out (not counting the reserved null handle).
    #[must_use]
    pub const fn live_count(&self) -> u64 {
        self.total_handles - self.free_count - 1
    }

    /// Track more handles. New handles are free.
    pub fn expand(&mut self, new_total_handles: u64) {
        if new_total_handles <= self.total_handles {
            return;
        }
        self.words
            .resize(new_total_handles.div_ceil(WORD_BITS) as usize, 0);
        self.free_count += new_total_handles - self.total_handles;
        self.total_handles = new_total_handles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle_reserved() {
        let mut alloc = HandleAllocator::new(16);
        assert!(alloc.is_allocated(NULL_HANDLE));
        assert_eq!(alloc.free_count(), 15);
        assert_eq!(alloc.allocate(), Some(1));
        assert!(!alloc.free(NULL_HANDLE));
    }

    #[test]
    fn test_freed_handles_are_reused() {
        let mut alloc = HandleAllocator::new(16);
        let handles: Vec<NodeId> = (0..3).map(|_| alloc.allocate().expect("allocate")).collect();
        assert_eq!(handles, vec![1, 2, 3]);
        assert_eq!(alloc.live_count(), 3);

        assert!(alloc.free(2));
        assert!(!alloc.free(2), "double free is rejected");
        assert!(!alloc.is_allocated(2));
        assert!(alloc.is_allocated(3));

        assert_eq!(alloc.allocate(), Some(2));
        assert_eq!(alloc.allocate(), Some(4));
    }

    #[test]
    fn test_exhaustion_and_expand() {
        let mut alloc = HandleAllocator::new(8);
        while alloc.allocate().is_some() {}
        assert_eq!(alloc.free_count(), 0);
        assert!(!alloc.is_allocated(8));

        alloc.expand(200);
        assert_eq!(alloc.total_handles(), 200);
        assert_eq!(alloc.free_count(), 192);
        let mut last = 0;
        for _ in 0..192 {
            last = alloc.allocate().expect("allocate");
        }
        assert_eq!(last, 199);
        assert!(alloc.allocate().is_none());
    }

    #[test]
    fn test_free_moves_search_back() {
        let mut alloc = HandleAllocator::new(300);
        for _ in 0..150 {
            alloc.allocate();
        }
        assert!(alloc.free(5));
        assert!(alloc.free(140));
        assert_eq!(alloc.allocate(), Some(5));
        assert_eq!(alloc.allocate(), Some(140));
        assert_eq!(alloc.allocate(), Some(151));
    }
}
