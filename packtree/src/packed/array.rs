//! Dense row-major array stream.

#![allow(clippy::cast_possible_truncation)]

use crate::packed::stream::{
    FindResult, PackedStream, STREAM_HEADER_SIZE, SearchType, StreamError, StreamHeader,
    StreamKind, blocked_find_bw, blocked_find_fw, check_out, check_pos, check_range, get_words,
    put_words,
};

/// Row-major storage shared by the array and quick-sum tree streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rows {
    columns: usize,
    values: Vec<u64>,
}

impl Rows {
    pub(crate) const fn new(columns: usize) -> Self {
        Self {
            columns,
            values: Vec::new(),
        }
    }

    pub(crate) const fn from_values(columns: usize, values: Vec<u64>) -> Self {
        Self { columns, values }
    }

    pub(crate) const fn columns(&self) -> usize {
        self.columns
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len() / self.columns
    }

    pub(crate) fn values(&self) -> &[u64] {
        &self.values
    }

    /// Unchecked cell access for hot loops; callers validate bounds.
    pub(crate) fn cell(&self, pos: usize, column: usize) -> u64 {
        self.values[pos * self.columns + column]
    }

    pub(crate) fn get(&self, pos: usize, column: usize) -> Result<u64, StreamError> {
        check_pos(pos, self.len())?;
        self.check_column(column)?;
        Ok(self.cell(pos, column))
    }

    pub(crate) const fn check_column(&self, column: usize) -> Result<(), StreamError> {
        if column >= self.columns {
            return Err(StreamError::NoSuchColumn {
                column,
                width: self.columns,
            });
        }
        Ok(())
    }

    const fn check_rows(&self, values: &[u64]) -> Result<(), StreamError> {
        if values.len() % self.columns != 0 {
            return Err(StreamError::WidthMismatch {
                expected: self.columns,
                actual: values.len() % self.columns,
            });
        }
        Ok(())
    }

    pub(crate) fn set(&mut self, pos: usize, row: &[u64]) -> Result<(), StreamError> {
        check_pos(pos, self.len())?;
        if row.len() != self.columns {
            return Err(StreamError::WidthMismatch {
                expected: self.columns,
                actual: row.len(),
            });
        }
        let start = pos * self.columns;
        self.values[start..start + self.columns].copy_from_slice(row);
        Ok(())
    }

    pub(crate) fn insert(&mut self, at: usize, rows: &[u64]) -> Result<(), StreamError> {
        check_range(at, at, self.len())?;
        self.check_rows(rows)?;
        let start = at * self.columns;
        self.values.splice(start..start, rows.iter().copied());
        Ok(())
    }

    pub(crate) fn remove(&mut self, from: usize, to: usize) -> Result<(), StreamError> {
        check_range(from, to, self.len())?;
        self.values.drain(from * self.columns..to * self.columns);
        Ok(())
    }

    pub(crate) fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), StreamError> {
        check_range(at, self.len(), self.len())?;
        if other.columns != self.columns {
            return Err(StreamError::WidthMismatch {
                expected: self.columns,
                actual: other.columns,
            });
        }
        let tail = self.values.split_off(at * self.columns);
        other.values.splice(0..0, tail);
        Ok(())
    }

    pub(crate) fn merge_with(&self, other: &mut Self) -> Result<(), StreamError> {
        if other.columns != self.columns {
            return Err(StreamError::WidthMismatch {
                expected: other.columns,
                actual: self.columns,
            });
        }
        other.values.extend_from_slice(&self.values);
        Ok(())
    }
}

/// Dense rows of `columns` u64 values.
///
/// When indexed, every column is a summable dimension searched linearly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayStream {
    rows: Rows,
    indexed: bool,
}

impl ArrayStream {
    #[must_use]
    pub const fn new(columns: usize, indexed: bool) -> Self {
        Self {
            rows: Rows::new(columns),
            indexed,
        }
    }

    /// Build a stream from row-major values.
    pub fn from_values(
        columns: usize,
        indexed: bool,
        values: Vec<u64>,
    ) -> Result<Self, StreamError> {
        let rows = Rows::new(columns);
        rows.check_rows(&values)?;
        Ok(Self {
            rows: Rows::from_values(columns, values),
            indexed,
        })
    }

    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[u64] {
        self.rows.values()
    }

    #[must_use]
    pub const fn encoded_len_for(columns: usize, count: usize) -> usize {
        STREAM_HEADER_SIZE + 8 * columns * count
    }

    const fn check_index(&self, index: usize) -> Result<(), StreamError> {
        let indexes = if self.indexed { self.rows.columns() } else { 0 };
        if index >= indexes {
            return Err(StreamError::NoSuchIndex { index, indexes });
        }
        Ok(())
    }

    /// Position of the first row whose `column` equals `value`.
    #[must_use]
    pub fn position_of(&self, column: usize, value: u64) -> Option<usize> {
        if column >= self.rows.columns() {
            return None;
        }
        (0..self.rows.len()).find(|&pos| self.rows.cell(pos, column) == value)
    }
}

impl PackedStream for ArrayStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Array
    }

    fn size(&self) -> usize {
        self.rows.len()
    }

    fn width(&self) -> usize {
        self.rows.columns()
    }

    fn indexes(&self) -> usize {
        if self.indexed { self.rows.columns() } else { 0 }
    }

    fn sum(&self, index: usize, from: usize, to: usize) -> Result<u64, StreamError> {
        self.check_index(index)?;
        check_range(from, to, self.size())?;
        Ok((from..to).fold(0u64, |acc, pos| acc.wrapping_add(self.rows.cell(pos, index))))
    }

    fn rank(&self, _pos: usize, _symbol: u64) -> Result<u64, StreamError> {
        Err(StreamError::Unsupported {
            kind: StreamKind::Array,
            operation: "rank",
        })
    }

    fn select_fw(&self, _start: usize, _symbol: u64, _nth: u64) -> Result<FindResult, StreamError> {
        Err(StreamError::Unsupported {
            kind: StreamKind::Array,
            operation: "select",
        })
    }

    fn select_bw(&self, _end: usize, _symbol: u64, _nth: u64) -> Result<FindResult, StreamError> {
        Err(StreamError::Unsupported {
            kind: StreamKind::Array,
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
        // No block index: a block larger than the stream keeps the scan linear.
        Ok(blocked_find_fw(
            start,
            self.size(),
            usize::MAX,
            target,
            search,
            |pos| self.rows.cell(pos, index),
            |_| 0,
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
            usize::MAX,
            target,
            search,
            |pos| self.rows.cell(pos, index),
            |_| 0,
        ))
    }

    fn get(&self, pos: usize, column: usize) -> Result<u64, StreamError> {
        self.rows.get(pos, column)
    }

    fn set(&mut self, pos: usize, values: &[u64]) -> Result<(), StreamError> {
        self.rows.set(pos, values)
    }

    fn insert_range(&mut self, at: usize, values: &[u64]) -> Result<(), StreamError> {
        self.rows.insert(at, values)
    }

    fn remove_range(&mut self, from: usize, to: usize) -> Result<(), StreamError> {
        self.rows.remove(from, to)
    }

    fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), StreamError> {
        self.rows.split_to(&mut other.rows, at)
    }

    fn merge_with(&self, other: &mut Self) -> Result<(), StreamError> {
        self.rows.merge_with(&mut other.rows)
    }

    fn reindex(&mut self) {}

    fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.rows.columns(), self.size())
    }

    fn write_to(&self, out: &mut [u8]) -> Result<(), StreamError> {
        check_out(out, self.encoded_len())?;
        let header = StreamHeader {
            kind: StreamKind::Array,
            param: self.rows.columns() as u8,
            indexed: self.indexed,
            size: self.size() as u32,
        };
        out[..STREAM_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        put_words(out, STREAM_HEADER_SIZE, self.rows.values());
        Ok(())
    }

    fn read_from(bytes: &[u8]) -> Result<Self, StreamError> {
        let header = StreamHeader::expect(bytes, StreamKind::Array)?;
        let columns = usize::from(header.param);
        if columns == 0 {
            return Err(StreamError::InvalidParameter("columns must be at least 1"));
        }
        let values = get_words(bytes, STREAM_HEADER_SIZE, header.size as usize * columns)?;
        Self::from_values(columns, header.indexed, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArrayStream {
        ArrayStream::from_values(2, true, vec![1, 10, 2, 20, 3, 30, 4, 40]).expect("build")
    }

    #[test]
    fn test_get_set_rows() {
        let mut stream = sample();
        assert_eq!(stream.size(), 4);
        assert_eq!(stream.get(2, 1).expect("get"), 30);
        assert_eq!(stream.row(1).expect("row"), vec![2, 20]);

        stream.set(1, &[7, 70]).expect("set");
        assert_eq!(stream.row(1).expect("row"), vec![7, 70]);

        assert_eq!(
            stream.set(0, &[1]),
            Err(StreamError::WidthMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            stream.get(4, 0),
            Err(StreamError::OutOfRange { pos: 4, size: 4 })
        );
    }

    #[test]
    fn test_sum_and_find() {
        let stream = sample();
        assert_eq!(stream.sum(0, 0, 4).expect("sum"), 10);
        assert_eq!(stream.sum(1, 1, 3).expect("sum"), 50);

        let found = stream.find_fw(0, 0, 6, SearchType::Ge).expect("find");
        assert_eq!(found, FindResult { pos: Some(2), prefix: 3 });

        let found = stream.find_fw(0, 0, 6, SearchType::Gt).expect("find");
        assert_eq!(found, FindResult { pos: Some(3), prefix: 6 });

        let found = stream.find_bw(1, 4, 50, SearchType::Ge).expect("find");
        assert_eq!(found, FindResult { pos: Some(2), prefix: 40 });

        let missed = stream.find_fw(0, 1, 100, SearchType::Ge).expect("find");
        assert_eq!(missed, FindResult { pos: None, prefix: 9 });
    }

    #[test]
    fn test_unindexed_has_no_dimensions() {
        let stream = ArrayStream::from_values(1, false, vec![5, 6]).expect("build");
        assert_eq!(stream.indexes(), 0);
        assert!(matches!(
            stream.sum(0, 0, 2),
            Err(StreamError::NoSuchIndex { .. })
        ));
        assert!(matches!(
            stream.rank(0, 0),
            Err(StreamError::Unsupported { .. })
        ));
        assert_eq!(stream.position_of(0, 6), Some(1));
    }

    #[test]
    fn test_split_and_merge() {
        let mut left = sample();
        let mut right = ArrayStream::new(2, true);
        left.split_to(&mut right, 1).expect("split");
        assert_eq!(left.size(), 1);
        assert_eq!(right.size(), 3);
        assert_eq!(right.row(0).expect("row"), vec![2, 20]);

        right.merge_with(&mut left).expect("merge");
        assert_eq!(left, sample());
    }

    #[test]
    fn test_encode_decode() {
        let stream = sample();
        let bytes = stream.encode().expect("encode");
        assert_eq!(bytes.len(), ArrayStream::encoded_len_for(2, 4));
        assert_eq!(ArrayStream::read_from(&bytes).expect("decode"), stream);
    }

    #[test]
    fn test_insert_remove_range() {
        let mut stream = sample();
        stream.insert_range(1, &[9, 90, 8, 80]).expect("insert");
        assert_eq!(stream.size(), 6);
        assert_eq!(stream.row(2).expect("row"), vec![8, 80]);

        stream.remove_range(1, 3).expect("remove");
        assert_eq!(stream, sample());

        assert!(stream.insert_range(0, &[1, 2, 3]).is_err());
        assert!(stream.remove_range(3, 5).is_err());
    }
}
