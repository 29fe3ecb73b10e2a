//! Walkers: the four traversal families expressed as per-level steps.
//!
//! The descent driver in `tree` calls `branch_step` on every branch it
//! visits and `leaf_step` at the bottom. A step scans in the walker's
//! direction from a start index and either names the child (or entry) where
//! the target is reached or reports that everything remaining was passed,
//! in which case the driver climbs and resumes at the next sibling.
//!
//! Forward scans start at `start` inclusive. Backward scans end just before
//! `start`.

#![allow(clippy::cast_possible_truncation)]

use tracing::trace;

use crate::btree::cursor::{Cursor, CursorState};
use crate::btree::node::Node;
use crate::btree::schema::Schema;
use crate::btree::tree::TreeError;
use crate::packed::{FindResult, PackedStream, SearchType, StreamError, SumTreeStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub trait Walker {
    type Output;

    fn direction(&self) -> Direction;

    /// Scan a branch's child accumulators. `None` passes every remaining child.
    fn branch_step(
        &mut self,
        accs: &SumTreeStream,
        start: usize,
    ) -> Result<Option<usize>, TreeError>;

    /// Scan a leaf. `None` passes every remaining entry.
    fn leaf_step(
        &mut self,
        schema: &Schema,
        leaf: &Node,
        start: usize,
    ) -> Result<Option<usize>, TreeError>;

    /// Called instead of any step when the tree is empty.
    fn empty(&mut self) {}

    /// Produce the result once the driver has placed the cursor.
    fn finish(self, cursor: &Cursor) -> Self::Output;
}

/// Progress of a search along one accumulator dimension.
#[derive(Debug, Clone)]
struct DimScan {
    dim: usize,
    target: u64,
    search: SearchType,
    direction: Direction,
    /// Sum of `dim` over everything passed so far.
    passed: u64,
}

impl DimScan {
    const fn new(dim: usize, target: u64, search: SearchType, direction: Direction) -> Self {
        Self {
            dim,
            target,
            search,
            direction,
            passed: 0,
        }
    }

    const fn remaining(&self) -> u64 {
        self.target.saturating_sub(self.passed)
    }

    const fn record(&mut self, result: FindResult) -> Option<usize> {
        self.passed = self.passed.saturating_add(result.prefix);
        result.pos
    }

    fn branch(&mut self, accs: &SumTreeStream, start: usize) -> Result<Option<usize>, TreeError> {
        let remaining = self.remaining();
        let result = match self.direction {
            Direction::Forward => accs.find_fw(self.dim, start, remaining, self.search)?,
            Direction::Backward => accs.find_bw(self.dim, start, remaining, self.search)?,
        };
        trace!(dim = self.dim, start, remaining, ?result, "branch step");
        Ok(self.record(result))
    }

    fn leaf(
        &mut self,
        schema: &Schema,
        leaf: &Node,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        let remaining = self.remaining();
        let result = match schema.locate(self.dim) {
            None => count_find(start, leaf.size(), remaining, self.search, self.direction),
            Some((stream, index)) => {
                let data = leaf.stream(stream)?;
                match self.direction {
                    Direction::Forward => data.find_fw(index, start, remaining, self.search)?,
                    Direction::Backward => data.find_bw(index, start, remaining, self.search)?,
                }
            }
        };
        trace!(leaf = leaf.id(), dim = self.dim, start, remaining, ?result, "leaf step");
        Ok(self.record(result))
    }
}

/// Search over the size dimension, where every entry counts one.
fn count_find(
    start: usize,
    size: usize,
    target: u64,
    search: SearchType,
    direction: Direction,
) -> FindResult {
    let available = match direction {
        Direction::Forward => size.saturating_sub(start),
        Direction::Backward => start.min(size),
    };
    let available = available as u64;
    let needed = match search {
        SearchType::Ge => target.max(1),
        SearchType::Gt => target.saturating_add(1),
    };
    if needed > available {
        return FindResult {
            pos: None,
            prefix: available,
        };
    }
    let step = (needed - 1) as usize;
    let pos = match direction {
        Direction::Forward => start + step,
        Direction::Backward => start - 1 - step,
    };
    FindResult {
        pos: Some(pos),
        prefix: needed - 1,
    }
}

/// Positions on the first entry whose running sum of `dim` satisfies the
/// search against `target`.
#[derive(Debug, Clone)]
pub struct FindWalker {
    scan: DimScan,
}

impl FindWalker {
    #[must_use]
    pub const fn new(dim: usize, target: u64, search: SearchType, direction: Direction) -> Self {
        Self {
            scan: DimScan::new(dim, target, search, direction),
        }
    }
}

impl Walker for FindWalker {
    type Output = ();

    fn direction(&self) -> Direction {
        self.scan.direction
    }

    fn branch_step(
        &mut self,
        accs: &SumTreeStream,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        self.scan.branch(accs, start)
    }

    fn leaf_step(
        &mut self,
        schema: &Schema,
        leaf: &Node,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        self.scan.leaf(schema, leaf, start)
    }

    fn finish(self, _cursor: &Cursor) {}
}

/// Moves a fixed number of entries from a start position.
///
/// The output is the distance actually covered: the requested one when the
/// target exists, otherwise the distance to the end (forward) or to the
/// before-begin sentinel (backward).
#[derive(Debug, Clone)]
pub struct SkipWalker {
    scan: DimScan,
}

impl SkipWalker {
    #[must_use]
    pub const fn new(distance: u64, direction: Direction) -> Self {
        let search = match direction {
            Direction::Forward => SearchType::Gt,
            Direction::Backward => SearchType::Ge,
        };
        Self {
            scan: DimScan::new(0, distance, search, direction),
        }
    }
}

impl Walker for SkipWalker {
    type Output = u64;

    fn direction(&self) -> Direction {
        self.scan.direction
    }

    fn branch_step(
        &mut self,
        accs: &SumTreeStream,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        self.scan.branch(accs, start)
    }

    fn leaf_step(
        &mut self,
        schema: &Schema,
        leaf: &Node,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        self.scan.leaf(schema, leaf, start)
    }

    fn finish(self, cursor: &Cursor) -> u64 {
        match cursor.state() {
            CursorState::Valid => self.scan.target,
            CursorState::End => self.scan.passed,
            CursorState::BeforeBegin => self.scan.passed + 1,
        }
    }
}

/// Counts occurrences of a symbol before an absolute position.
#[derive(Debug, Clone)]
pub struct RankWalker {
    scan: DimScan,
    stream: usize,
    symbol: u64,
    symbol_dim: usize,
    rank: u64,
}

impl RankWalker {
    pub fn new(schema: &Schema, stream: usize, symbol: u64, pos: u64) -> Result<Self, TreeError> {
        let index = usize::try_from(symbol).map_err(|_| StreamError::ValueOutOfRange {
            value: symbol,
            max: u64::MAX,
        })?;
        Ok(Self {
            scan: DimScan::new(0, pos, SearchType::Gt, Direction::Forward),
            stream,
            symbol,
            symbol_dim: schema.dim(stream, index)?,
            rank: 0,
        })
    }
}

impl Walker for RankWalker {
    type Output = u64;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn branch_step(
        &mut self,
        accs: &SumTreeStream,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        let found = self.scan.branch(accs, start)?;
        let end = found.unwrap_or_else(|| accs.size());
        self.rank += accs.sum(self.symbol_dim, start, end)?;
        Ok(found)
    }

    fn leaf_step(
        &mut self,
        schema: &Schema,
        leaf: &Node,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        let found = self.scan.leaf(schema, leaf, start)?;
        let end = found.unwrap_or_else(|| leaf.size());
        let data = leaf.stream(self.stream)?;
        self.rank += data
            .rank(end, self.symbol)?
            .saturating_sub(data.rank(start, self.symbol)?);
        Ok(found)
    }

    fn finish(self, _cursor: &Cursor) -> u64 {
        self.rank
    }
}

/// Finds the `nth` occurrence of a symbol, counting from the start point in
/// the walk direction.
///
/// The output is the number of occurrences reached: `nth` when found, fewer
/// when the walk ran off the tree.
#[derive(Debug, Clone)]
pub struct SelectWalker {
    scan: DimScan,
    stream: usize,
    symbol: u64,
}

impl SelectWalker {
    pub fn new(
        schema: &Schema,
        stream: usize,
        symbol: u64,
        nth: u64,
        direction: Direction,
    ) -> Result<Self, TreeError> {
        if nth == 0 {
            return Err(StreamError::InvalidParameter("select rank is 1-based").into());
        }
        let index = usize::try_from(symbol).map_err(|_| StreamError::ValueOutOfRange {
            value: symbol,
            max: u64::MAX,
        })?;
        Ok(Self {
            scan: DimScan::new(schema.dim(stream, index)?, nth, SearchType::Ge, direction),
            stream,
            symbol,
        })
    }
}

impl Walker for SelectWalker {
    type Output = u64;

    fn direction(&self) -> Direction {
        self.scan.direction
    }

    fn branch_step(
        &mut self,
        accs: &SumTreeStream,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        self.scan.branch(accs, start)
    }

    fn leaf_step(
        &mut self,
        _schema: &Schema,
        leaf: &Node,
        start: usize,
    ) -> Result<Option<usize>, TreeError> {
        let data = leaf.stream(self.stream)?;
        let remaining = self.scan.remaining();
        let result = match self.scan.direction {
            Direction::Forward => data.select_fw(start, self.symbol, remaining)?,
            Direction::Backward => data.select_bw(start, self.symbol, remaining)?,
        };
        trace!(leaf = leaf.id(), start, remaining, ?result, "select step");
        Ok(self.scan.record(result))
    }

    fn finish(self, cursor: &Cursor) -> u64 {
        if cursor.is_valid() {
            self.scan.target
        } else {
            self.scan.passed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_find_forward() {
        let ge = count_find(2, 10, 3, SearchType::Ge, Direction::Forward);
        assert_eq!(ge, FindResult { pos: Some(4), prefix: 2 });
        let gt = count_find(2, 10, 3, SearchType::Gt, Direction::Forward);
        assert_eq!(gt, FindResult { pos: Some(5), prefix: 3 });
        let zero = count_find(0, 10, 0, SearchType::Ge, Direction::Forward);
        assert_eq!(zero.pos, Some(0));
        let off = count_find(7, 10, 3, SearchType::Gt, Direction::Forward);
        assert_eq!(off, FindResult { pos: None, prefix: 3 });
    }

    #[test]
    fn test_count_find_backward() {
        let ge = count_find(6, 10, 2, SearchType::Ge, Direction::Backward);
        assert_eq!(ge, FindResult { pos: Some(4), prefix: 1 });
        let off = count_find(2, 10, 3, SearchType::Ge, Direction::Backward);
        assert_eq!(off, FindResult { pos: None, prefix: 2 });
    }

    #[test]
    fn test_branch_scan_accumulates_passed_children() {
        // three children with sizes 4, 5, 6 and key sums 10, 20, 30
        let accs = SumTreeStream::from_values(2, vec![4, 10, 5, 20, 6, 30]).expect("accs");
        let mut scan = DimScan::new(0, 8, SearchType::Gt, Direction::Forward);
        assert_eq!(scan.branch(&accs, 0).expect("step"), Some(1));
        assert_eq!(scan.passed, 4);
        assert_eq!(scan.remaining(), 4);

        let mut scan = DimScan::new(1, 31, SearchType::Ge, Direction::Backward);
        assert_eq!(scan.branch(&accs, 3).expect("step"), Some(1));
        assert_eq!(scan.passed, 30);

        let mut scan = DimScan::new(0, 100, SearchType::Gt, Direction::Forward);
        assert_eq!(scan.branch(&accs, 1).expect("step"), None);
        assert_eq!(scan.passed, 11);
    }
}
