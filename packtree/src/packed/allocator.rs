//! Packed sub-block allocator.
//!
//! Carves a fixed number of independently resizable slots out of one byte
//! region. Layout of the region:
//!
//! ```text
//! [0..4)        slot_count (u32)
//! [4..8)        reserved
//! [8..)         slot_count + 1 offsets (u32), slot i spans offsets[i]..offsets[i+1]
//! data_start..  slot data, every slot aligned to `ALIGNMENT`
//! ```
//!
//! Every mutator checks capacity before it moves a single byte, so a failed
//! call leaves the region exactly as it was.

#![allow(clippy::cast_possible_truncation)]

use std::ops::Range;

use crate::packed::block::{read_u32, write_u32};

/// Alignment unit for every slot.
pub const ALIGNMENT: usize = 8;

/// Fixed bookkeeping before the offset table.
const HEADER_SIZE: usize = 8;

/// Round `size` up to the alignment unit.
#[must_use]
pub const fn align_up(size: usize) -> usize {
    (size + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// First data byte for a region with `slot_count` slots.
#[must_use]
pub const fn data_start(slot_count: usize) -> usize {
    align_up(HEADER_SIZE + 4 * (slot_count + 1))
}

/// Total region bytes needed to hold slots of the given sizes.
#[must_use]
pub fn required_size(slot_sizes: &[usize]) -> usize {
    data_start(slot_sizes.len()) + slot_sizes.iter().map(|&s| align_up(s)).sum::<usize>()
}

/// Allocator view over a byte region.
///
/// `B` is `&[u8]` for read-only inspection or `&mut [u8]` when slots are
/// resized.
pub struct PackedAllocator<B> {
    region: B,
}

impl<B: AsRef<[u8]>> PackedAllocator<B> {
    /// Wrap a region. No validation happens here; see [`Self::validate`].
    pub const fn open(region: B) -> Self {
        Self { region }
    }

    fn bytes(&self) -> &[u8] {
        self.region.as_ref()
    }

    /// Size of the whole region.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.bytes().len()
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        if self.bytes().len() < HEADER_SIZE {
            return 0;
        }
        read_u32(self.bytes(), 0) as usize
    }

    fn offset(&self, index: usize) -> usize {
        read_u32(self.bytes(), HEADER_SIZE + 4 * index) as usize
    }

    /// Bytes in use: bookkeeping plus every slot.
    #[must_use]
    pub fn used(&self) -> usize {
        self.offset(self.slot_count())
    }

    #[must_use]
    pub fn free_space(&self) -> usize {
        self.block_size().saturating_sub(self.used())
    }

    /// Bytes available to slots once bookkeeping is accounted for.
    #[must_use]
    pub fn client_area(&self) -> usize {
        self.block_size()
            .saturating_sub(data_start(self.slot_count()))
    }

    /// Byte range of a slot within the region.
    pub fn slot_range(&self, slot: usize) -> Result<Range<usize>, AllocError> {
        let slots = self.slot_count();
        if slot >= slots {
            return Err(AllocError::SlotOutOfRange { slot, slots });
        }
        let start = self.offset(slot);
        let end = self.offset(slot + 1);
        if start > end || end > self.block_size() {
            return Err(AllocError::Corrupted("slot offsets out of order"));
        }
        Ok(start..end)
    }

    /// Read a slot's bytes.
    pub fn slot(&self, slot: usize) -> Result<&[u8], AllocError> {
        let range = self.slot_range(slot)?;
        Ok(&self.bytes()[range])
    }

    pub fn slot_size(&self, slot: usize) -> Result<usize, AllocError> {
        self.slot_range(slot).map(|r| r.len())
    }

    /// Check the slot table for structural consistency.
    pub fn validate(&self) -> Result<(), AllocError> {
        let len = self.block_size();
        if len < HEADER_SIZE {
            return Err(AllocError::Corrupted("region smaller than header"));
        }
        let slots = self.slot_count();
        let start = data_start(slots);
        if start > len {
            return Err(AllocError::Corrupted("slot table exceeds region"));
        }
        if self.offset(0) != start {
            return Err(AllocError::Corrupted("first slot does not start at data area"));
        }
        let mut previous = start;
        for i in 1..=slots {
            let offset = self.offset(i);
            if offset < previous || offset > len || !offset.is_multiple_of(ALIGNMENT) {
                return Err(AllocError::Corrupted("slot offsets out of order"));
            }
            previous = offset;
        }
        Ok(())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> PackedAllocator<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.region.as_mut()
    }

    fn set_offset(&mut self, index: usize, value: usize) {
        write_u32(self.bytes_mut(), HEADER_SIZE + 4 * index, value as u32);
    }

    /// Reset bookkeeping for `slot_count` empty slots and zero the region.
    pub fn init(&mut self, slot_count: usize) -> Result<(), AllocError> {
        let start = data_start(slot_count);
        let available = self.block_size();
        if start > available {
            return Err(AllocError::OutOfMemory {
                requested: start,
                available,
            });
        }
        self.bytes_mut().fill(0);
        write_u32(self.bytes_mut(), 0, slot_count as u32);
        for i in 0..=slot_count {
            self.set_offset(i, start);
        }
        Ok(())
    }

    /// Mutable access to a slot's bytes.
    pub fn slot_mut(&mut self, slot: usize) -> Result<&mut [u8], AllocError> {
        let range = self.slot_range(slot)?;
        Ok(&mut self.bytes_mut()[range])
    }

    /// Reserve `size` bytes for an empty slot.
    pub fn allocate(&mut self, slot: usize, size: usize) -> Result<Range<usize>, AllocError> {
        let current = self.slot_size(slot)?;
        if current != 0 {
            return Err(AllocError::SlotInUse { slot, size: current });
        }
        self.resize_block(slot, size)
    }

    /// Reserve room for `length` elements of `element_size` bytes.
    pub fn allocate_array(
        &mut self,
        slot: usize,
        element_size: usize,
        length: usize,
    ) -> Result<Range<usize>, AllocError> {
        let size = element_size
            .checked_mul(length)
            .ok_or(AllocError::OutOfMemory {
                requested: usize::MAX,
                available: self.free_space(),
            })?;
        self.allocate(slot, size)
    }

    /// Grow or shrink one slot, shifting every following slot.
    ///
    /// Returns the slot's new range. On failure nothing has moved.
    pub fn resize_block(
        &mut self,
        slot: usize,
        new_size: usize,
    ) -> Result<Range<usize>, AllocError> {
        let range = self.slot_range(slot)?;
        let new_size = align_up(new_size);
        let old_size = range.len();
        let slots = self.slot_count();
        let used = self.used();

        if new_size > old_size {
            let grow = new_size - old_size;
            let available = self.block_size() - used;
            if grow > available {
                return Err(AllocError::OutOfMemory {
                    requested: grow,
                    available,
                });
            }
            self.bytes_mut().copy_within(range.end..used, range.end + grow);
            self.bytes_mut()[range.end..range.end + grow].fill(0);
            for i in slot + 1..=slots {
                let offset = self.offset(i);
                self.set_offset(i, offset + grow);
            }
        } else if new_size < old_size {
            let shrink = old_size - new_size;
            self.bytes_mut().copy_within(range.end..used, range.end - shrink);
            self.bytes_mut()[used - shrink..used].fill(0);
            for i in slot + 1..=slots {
                let offset = self.offset(i);
                self.set_offset(i, offset - shrink);
            }
        }

        Ok(range.start..range.start + new_size)
    }

    /// Release a slot's bytes; the slot stays addressable with size zero.
    pub fn free(&mut self, slot: usize) -> Result<(), AllocError> {
        self.resize_block(slot, 0).map(|_| ())
    }

    /// Resize every slot at once. Shrinks run before grows so the whole
    /// change succeeds whenever the final layout fits.
    pub fn resize_all(&mut self, sizes: &[usize]) -> Result<(), AllocError> {
        let slots = self.slot_count();
        if sizes.len() != slots {
            return Err(AllocError::SlotOutOfRange {
                slot: sizes.len(),
                slots,
            });
        }
        let needed = required_size(sizes);
        let available = self.block_size();
        if needed > available {
            return Err(AllocError::OutOfMemory {
                requested: needed,
                available,
            });
        }

        for (slot, &size) in sizes.iter().enumerate() {
            if align_up(size) < self.slot_size(slot)? {
                self.resize_block(slot, size)?;
            }
        }
        for (slot, &size) in sizes.iter().enumerate() {
            if align_up(size) > self.slot_size(slot)? {
                self.resize_block(slot, size)?;
            }
        }
        Ok(())
    }

    /// Replace the region's contents with `contents`, one entry per slot.
    ///
    /// The final layout is computed and checked up front. If it does not fit,
    /// the region is left untouched.
    pub fn commit(&mut self, contents: &[&[u8]]) -> Result<(), AllocError> {
        let sizes: Vec<usize> = contents.iter().map(|c| c.len()).collect();
        let needed = required_size(&sizes);
        let available = self.block_size();
        if needed > available {
            return Err(AllocError::OutOfMemory {
                requested: needed,
                available,
            });
        }

        if self.slot_count() != contents.len() || self.validate().is_err() {
            self.init(contents.len())?;
        }
        self.resize_all(&sizes)?;
        for (slot, content) in contents.iter().enumerate() {
            let target = self.slot_mut(slot)?;
            target[..content.len()].copy_from_slice(content);
            target[content.len()..].fill(0);
        }
        Ok(())
    }
}

/// Errors from the packed allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The region cannot hold the requested layout.
    OutOfMemory { requested: usize, available: usize },
    /// Slot index is not part of the slot table.
    SlotOutOfRange { slot: usize, slots: usize },
    /// `allocate` was called on a slot that already owns bytes.
    SlotInUse { slot: usize, size: usize },
    /// The slot table is not self-consistent.
    Corrupted(&'static str),
}

impl AllocError {
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                available,
            } => write!(
                f,
                "out of memory in block: requested {requested} bytes, {available} available"
            ),
            Self::SlotOutOfRange { slot, slots } => {
                write!(f, "slot {slot} out of range (slot count {slots})")
            }
            Self::SlotInUse { slot, size } => {
                write!(f, "slot {slot} already holds {size} bytes")
            }
            Self::Corrupted(reason) => write!(f, "corrupted slot table: {reason}"),
        }
    }
}

impl std::error::Error for AllocError {}
