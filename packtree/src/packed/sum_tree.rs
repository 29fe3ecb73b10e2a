//! Quick-sum tree: rows of u64 values with a per-block sum index.
//!
//! Branch nodes keep their per-child accumulators in one of these, so
//! `sum` and `find` over the index are what every descent runs on.

#![allow(clippy::cast_possible_truncation)]

use crate::packed::array::Rows;
use crate::packed::stream::{
    FindResult, PackedStream, STREAM_HEADER_SIZE, SearchType, StreamError, StreamHeader,
    StreamKind, blocked_find_bw, blocked_find_fw, blocked_sum, check_out, check_range, get_words,
    put_words,
};

/// Rows per index block.
pub const SUM_BLOCK: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumTreeStream {
    rows: Rows,
    /// Per block, per column totals. Row-major like the data.
    blocks: Vec<u64>,
}

impl SumTreeStream {
    #[must_use]
    pub const fn new(columns: usize) -> Self {
        Self {
            rows: Rows::new(columns),
            blocks: Vec::new(),
        }
    }

    /// Build from row-major values.
    pub fn from_values(columns: usize, values: Vec<u64>) -> Result<Self, StreamError> {
        let mut stream = Self::new(columns);
        stream.rows.insert(0, &values)?;
        stream.reindex();
        Ok(stream)
    }

    #[must_use]
    pub const fn encoded_len_for(columns: usize, count: usize) -> usize {
        STREAM_HEADER_SIZE + 8 * columns * (count + count.div_ceil(SUM_BLOCK))
    }

    fn check_index(&self, index: usize) -> Result<(), StreamError> {
        if index >= self.rows.columns() {
            return Err(StreamError::NoSuchIndex {
                index,
                indexes: self.rows.columns(),
            });
        }
        Ok(())
    }

    fn block_total(&self, block: usize, column: usize) -> u64 {
        self.blocks[block * self.rows.columns() + column]
    }

    /// Column-wise sums over `[from, to)`.
    pub fn row_sums(&self, from: usize, to: usize) -> Result<Vec<u64>, StreamError> {
        (0..self.rows.columns())
            .map(|column| self.sum(column, from, to))
            .collect()
    }

    fn compute_blocks(&self) -> Vec<u64> {
        let columns = self.rows.columns();
        let size = self.rows.len();
        let mut blocks = vec![0u64; size.div_ceil(SUM_BLOCK) * columns];
        for pos in 0..size {
            let block = pos / SUM_BLOCK;
            for column in 0..columns {
                let slot = &mut blocks[block * columns + column];
                *slot = slot.wrapping_add(self.rows.cell(pos, column));
            }
        }
        blocks
    }
}

impl PackedStream for SumTreeStream {
    fn kind(&self) -> StreamKind {
        StreamKind::SumTree
    }

    fn size(&self) -> usize {
        self.rows.len()
    }

    fn width(&self) -> usize {
        self.rows.columns()
    }

    fn indexes(&self) -> usize {
        self.rows.columns()
    }

    fn sum(&self, index: usize, from: usize, to: usize) -> Result<u64, StreamError> {
        self.check_index(index)?;
        check_range(from, to, self.size())?;
        Ok(blocked_sum(
            from,
            to,
            SUM_BLOCK,
            |pos| self.rows.cell(pos, index),
            |block| self.block_total(block, index),
        ))
    }

    fn rank(&self, _pos: usize, _symbol: u64) -> Result<u64, StreamError> {
        Err(StreamError::Unsupported {
            kind: StreamKind::SumTree,
            operation: "rank",
        })
    }

    fn select_fw(&self, _start: usize, _symbol: u64, _nth: u64) -> Result<FindResult, StreamError> {
        Err(StreamError::Unsupported {
            kind: StreamKind::SumTree,
            operation: "select",
        })
    }

    fn select_bw(&self, _end: usize, _symbol: u64, _nth: u64) -> Result<FindResult, StreamError> {
        Err(StreamError::Unsupported {
            kind: StreamKind::SumTree,
            operation: "select",
        })
    }

    fn find_fw(
        &self,
        index: usize,
        start: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError> {
        self.check_index(index)?;
        check_range(start, self.size(), self.size())?;
        Ok(blocked_find_fw(
            start,
            self.size(),
            SUM_BLOCK,
            target,
            search,
            |pos| self.rows.cell(pos, index),
            |block| self.block_total(block, index),
        ))
    }

    fn find_bw(
        &self,
        index: usize,
        end: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError> {
        self.check_index(index)?;
        check_range(0, end, self.size())?;
        Ok(blocked_find_bw(
            end,
            SUM_BLOCK,
            target,
            search,
            |pos| self.rows.cell(pos, index),
            |block| self.block_total(block, index),
        ))
    }

    fn get(&self, pos: usize, column: usize) -> Result<u64, StreamError> {
        self.rows.get(pos, column)
    }

    fn set(&mut self, pos: usize, values: &[u64]) -> Result<(), StreamError> {
        self.rows.set(pos, values)?;
        self.reindex();
        Ok(())
    }

    fn insert_range(&mut self, at: usize, values: &[u64]) -> Result<(), StreamError> {
        self.rows.insert(at, values)?;
        self.reindex();
        Ok(())
    }

    fn remove_range(&mut self, from: usize, to: usize) -> Result<(), StreamError> {
        self.rows.remove(from, to)?;
        self.reindex();
        Ok(())
    }

    fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), StreamError> {
        self.rows.split_to(&mut other.rows, at)?;
        self.reindex();
        other.reindex();
        Ok(())
    }

    fn merge_with(&self, other: &mut Self) -> Result<(), StreamError> {
        self.rows.merge_with(&mut other.rows)?;
        other.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        self.blocks = self.compute_blocks();
    }

    fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.rows.columns(), self.size())
    }

    fn write_to(&self, out: &mut [u8]) -> Result<(), StreamError> {
        check_out(out, self.encoded_len())?;
        let header = StreamHeader {
            kind: StreamKind::SumTree,
            param: self.rows.columns() as u8,
            indexed: true,
            size: self.size() as u32,
        };
        out[..STREAM_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        let at = put_words(out, STREAM_HEADER_SIZE, self.rows.values());
        put_words(out, at, &self.blocks);
        Ok(())
    }

    fn read_from(bytes: &[u8]) -> Result<Self, StreamError> {
        let header = StreamHeader::expect(bytes, StreamKind::SumTree)?;
        let columns = usize::from(header.param);
        if columns == 0 {
            return Err(StreamError::InvalidParameter("columns must be at least 1"));
        }
        let size = header.size as usize;
        let values = get_words(bytes, STREAM_HEADER_SIZE, size * columns)?;
        let blocks = get_words(
            bytes,
            STREAM_HEADER_SIZE + 8 * size * columns,
            size.div_ceil(SUM_BLOCK) * columns,
        )?;
        let stream = Self {
            rows: Rows::from_values(columns, values),
            blocks,
        };
        if stream.blocks != stream.compute_blocks() {
            return Err(StreamError::CorruptIndex);
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: u64) -> SumTreeStream {
        let values: Vec<u64> = (0..count).flat_map(|i| [1, i]).collect();
        SumTreeStream::from_values(2, values).expect("build")
    }

    #[test]
    fn test_sums_cross_block_boundaries() {
        let stream = numbered(100);
        assert_eq!(stream.size(), 100);
        assert_eq!(stream.sum(0, 0, 100).expect("sum"), 100);
        assert_eq!(stream.sum(1, 0, 100).expect("sum"), 4950);
        assert_eq!(stream.sum(1, 5, 37).expect("sum"), (5..37).sum::<u64>());
        assert_eq!(
            stream.row_sums(10, 20).expect("sums"),
            vec![10, (10..20).sum::<u64>()]
        );
    }

    #[test]
    fn test_find_uses_running_sums() {
        let stream = numbered(100);

        let found = stream.find_fw(0, 0, 40, SearchType::Ge).expect("find");
        assert_eq!(found, FindResult { pos: Some(39), prefix: 39 });

        let found = stream.find_fw(0, 10, 40, SearchType::Gt).expect("find");
        assert_eq!(found, FindResult { pos: Some(50), prefix: 40 });

        let found = stream.find_bw(0, 100, 3, SearchType::Ge).expect("find");
        assert_eq!(found, FindResult { pos: Some(97), prefix: 2 });

        let missed = stream.find_fw(0, 90, 11, SearchType::Ge).expect("find");
        assert_eq!(missed, FindResult { pos: None, prefix: 10 });
    }

    #[test]
    fn test_mutations_keep_index_current() {
        let mut stream = numbered(40);
        stream.set(3, &[1, 1000]).expect("set");
        assert_eq!(stream.sum(1, 0, 40).expect("sum"), (0..40).sum::<u64>() - 3 + 1000);

        stream.remove_range(0, 17).expect("remove");
        assert_eq!(stream.size(), 23);
        assert_eq!(stream.sum(0, 0, 23).expect("sum"), 23);

        let bytes = stream.encode().expect("encode");
        assert_eq!(SumTreeStream::read_from(&bytes).expect("decode"), stream);
    }

    #[test]
    fn test_corrupt_index_detected() {
        let stream = numbered(20);
        let mut bytes = stream.encode().expect("encode");
        let last = bytes.len() - 8;
        bytes[last] ^= 0xFF;
        assert_eq!(
            SumTreeStream::read_from(&bytes),
            Err(StreamError::CorruptIndex)
        );
    }

    #[test]
    fn test_split_then_merge_restores_content() {
        let original = numbered(50);
        let mut left = original.clone();
        let mut right = SumTreeStream::new(2);
        left.split_to(&mut right, 21).expect("split");
        assert_eq!(left.sum(1, 0, 21).expect("sum"), (0..21).sum::<u64>());
        assert_eq!(right.sum(1, 0, 29).expect("sum"), (21..50).sum::<u64>());

        right.merge_with(&mut left).expect("merge");
        assert_eq!(left, original);
    }
}
