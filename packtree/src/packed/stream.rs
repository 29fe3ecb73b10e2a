//! The packed stream contract and the closed set of stream kinds.
//!
//! A stream is one column of a node: dense rows, a quick-sum tree, a bitmap
//! or a symbol sequence. Streams are decoded from their allocator slot,
//! edited in memory and re-encoded as a whole, which makes every mutation
//! rollback-safe: the block only changes once the new image is known to fit.
//!
//! Slot image layout (all little-endian):
//!
//! ```text
//! [0]     kind
//! [1]     param (columns or bits per symbol)
//! [2]     flags (bit 0: indexed)
//! [3]     reserved
//! [4..8)  size (entries, u32)
//! [8..)   kind-specific body, padded to 8 bytes
//! ```

#![allow(clippy::cast_possible_truncation)]

use crate::packed::array::ArrayStream;
use crate::packed::bitmap::BitmapStream;
use crate::packed::block::{read_u32, read_u64, write_u32, write_u64};
use crate::packed::sequence::SequenceStream;
use crate::packed::sum_tree::SumTreeStream;

/// Size of the per-slot stream header.
pub const STREAM_HEADER_SIZE: usize = 8;

const FLAG_INDEXED: u8 = 0x01;

/// Stream kind discriminant stored in the slot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamKind {
    Array = 1,
    SumTree = 2,
    Bitmap = 3,
    Sequence = 4,
}

impl TryFrom<u8> for StreamKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Array),
            2 => Ok(Self::SumTree),
            3 => Ok(Self::Bitmap),
            4 => Ok(Self::Sequence),
            _ => Err(value),
        }
    }
}

/// Comparison used by forward and backward searches.
///
/// `Ge` stops at the first entry whose inclusive running sum reaches the
/// target, `Gt` at the first one that exceeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Ge,
    Gt,
}

impl SearchType {
    #[must_use]
    pub const fn satisfied(self, running: u64, target: u64) -> bool {
        match self {
            Self::Ge => running >= target,
            Self::Gt => running > target,
        }
    }
}

/// Outcome of a `find` or `select` scan.
///
/// `pos` is `None` when the scan ran off the stream. `prefix` is the sum of
/// everything passed before stopping: entries strictly before `pos` in a
/// forward scan, strictly after it in a backward scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindResult {
    pub pos: Option<usize>,
    pub prefix: u64,
}

/// Header stored at the start of every stream slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub kind: StreamKind,
    pub param: u8,
    pub indexed: bool,
    pub size: u32,
}

impl StreamHeader {
    #[must_use]
    pub fn to_bytes(self) -> [u8; STREAM_HEADER_SIZE] {
        let mut buf = [0u8; STREAM_HEADER_SIZE];
        buf[0] = self.kind as u8;
        buf[1] = self.param;
        buf[2] = if self.indexed { FLAG_INDEXED } else { 0 };
        write_u32(&mut buf, 4, self.size);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StreamError> {
        if bytes.len() < STREAM_HEADER_SIZE {
            return Err(StreamError::Truncated {
                needed: STREAM_HEADER_SIZE,
                available: bytes.len(),
            });
        }
        let kind = StreamKind::try_from(bytes[0]).map_err(StreamError::InvalidKind)?;
        Ok(Self {
            kind,
            param: bytes[1],
            indexed: bytes[2] & FLAG_INDEXED != 0,
            size: read_u32(bytes, 4),
        })
    }

    /// Decode a header and check it describes the expected kind.
    pub fn expect(bytes: &[u8], kind: StreamKind) -> Result<Self, StreamError> {
        let header = Self::from_bytes(bytes)?;
        if header.kind != kind {
            return Err(StreamError::KindMismatch {
                expected: kind,
                actual: header.kind,
            });
        }
        Ok(header)
    }
}

/// Static description of a stream, used by schemas and capacity planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSpec {
    /// Dense rows of `columns` u64 values; summable per column if `indexed`.
    Array { columns: u8, indexed: bool },
    /// Rows of `columns` u64 values with a per-block sum index.
    SumTree { columns: u8 },
    /// One bit per entry.
    Bitmap,
    /// One `bits`-wide symbol per entry (`bits` is 1, 2 or 4).
    Sequence { bits: u8 },
}

impl StreamSpec {
    #[must_use]
    pub const fn kind(self) -> StreamKind {
        match self {
            Self::Array { .. } => StreamKind::Array,
            Self::SumTree { .. } => StreamKind::SumTree,
            Self::Bitmap => StreamKind::Bitmap,
            Self::Sequence { .. } => StreamKind::Sequence,
        }
    }

    /// Values per entry.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Array { columns, .. } | Self::SumTree { columns } => columns as usize,
            Self::Bitmap | Self::Sequence { .. } => 1,
        }
    }

    /// Accumulator dimensions this stream contributes.
    #[must_use]
    pub const fn indexes(self) -> usize {
        match self {
            Self::Array { columns, indexed } => {
                if indexed {
                    columns as usize
                } else {
                    0
                }
            }
            Self::SumTree { columns } => columns as usize,
            Self::Bitmap => 2,
            Self::Sequence { bits } => 1 << bits,
        }
    }

    /// Exact slot image size for a stream of this spec holding `count` entries.
    #[must_use]
    pub const fn encoded_len(self, count: usize) -> usize {
        match self {
            Self::Array { columns, .. } => ArrayStream::encoded_len_for(columns as usize, count),
            Self::SumTree { columns } => SumTreeStream::encoded_len_for(columns as usize, count),
            Self::Bitmap => BitmapStream::encoded_len_for(count),
            Self::Sequence { bits } => SequenceStream::encoded_len_for(bits as u32, count),
        }
    }

    /// An empty stream of this spec.
    #[must_use]
    pub fn empty(self) -> AnyStream {
        match self {
            Self::Array { columns, indexed } => {
                AnyStream::Array(ArrayStream::new(columns as usize, indexed))
            }
            Self::SumTree { columns } => AnyStream::SumTree(SumTreeStream::new(columns as usize)),
            Self::Bitmap => AnyStream::Bitmap(BitmapStream::new()),
            Self::Sequence { bits } => AnyStream::Sequence(SequenceStream::new(u32::from(bits))),
        }
    }

    pub const fn validate(self) -> Result<(), StreamError> {
        match self {
            Self::Array { columns, .. } | Self::SumTree { columns } if columns == 0 => {
                Err(StreamError::InvalidParameter("columns must be at least 1"))
            }
            Self::Sequence { bits } if !matches!(bits, 1 | 2 | 4) => {
                Err(StreamError::InvalidParameter("bits per symbol must be 1, 2 or 4"))
            }
            _ => Ok(()),
        }
    }
}

/// The operations every packed stream supports.
///
/// Positions are entry indexes. `index` selects a summable dimension: a
/// column for numeric streams, a symbol for bitmaps and sequences.
pub trait PackedStream: Sized {
    fn kind(&self) -> StreamKind;

    /// Number of entries.
    fn size(&self) -> usize;

    /// Values per entry.
    fn width(&self) -> usize;

    /// Number of summable dimensions.
    fn indexes(&self) -> usize;

    /// Sum of dimension `index` over `[from, to)`.
    fn sum(&self, index: usize, from: usize, to: usize) -> Result<u64, StreamError>;

    /// Occurrences of `symbol` in `[0, pos)`.
    fn rank(&self, pos: usize, symbol: u64) -> Result<u64, StreamError>;

    /// Position of the `nth` (1-based) occurrence of `symbol` at or after `start`.
    fn select_fw(&self, start: usize, symbol: u64, nth: u64) -> Result<FindResult, StreamError>;

    /// Position of the `nth` (1-based) occurrence of `symbol` before `end`,
    /// counting backwards.
    fn select_bw(&self, end: usize, symbol: u64, nth: u64) -> Result<FindResult, StreamError>;

    fn find_fw(
        &self,
        index: usize,
        start: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError>;

    /// Backward search; `end` is exclusive.
    fn find_bw(
        &self,
        index: usize,
        end: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError>;

    /// Value of `column` at `pos`.
    fn get(&self, pos: usize, column: usize) -> Result<u64, StreamError>;

    /// Overwrite the row at `pos`.
    fn set(&mut self, pos: usize, values: &[u64]) -> Result<(), StreamError>;

    /// Insert rows at `at`. `values` holds `width()` values per row.
    fn insert_range(&mut self, at: usize, values: &[u64]) -> Result<(), StreamError>;

    fn remove_range(&mut self, from: usize, to: usize) -> Result<(), StreamError>;

    /// Move entries `[at, size)` to the front of `other`.
    fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), StreamError>;

    /// Append all entries to the end of `other`.
    fn merge_with(&self, other: &mut Self) -> Result<(), StreamError>;

    /// Rebuild the search index after bulk edits.
    fn reindex(&mut self);

    /// Size of the slot image.
    fn encoded_len(&self) -> usize;

    fn write_to(&self, out: &mut [u8]) -> Result<(), StreamError>;

    fn read_from(bytes: &[u8]) -> Result<Self, StreamError>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// All values of the row at `pos`.
    fn row(&self, pos: usize) -> Result<Vec<u64>, StreamError> {
        (0..self.width()).map(|column| self.get(pos, column)).collect()
    }

    /// Sum of each dimension over the whole stream.
    fn totals(&self) -> Result<Vec<u64>, StreamError> {
        (0..self.indexes())
            .map(|index| self.sum(index, 0, self.size()))
            .collect()
    }

    /// Encode into a freshly allocated slot image.
    fn encode(&self) -> Result<Vec<u8>, StreamError> {
        let mut out = vec![0u8; self.encoded_len()];
        self.write_to(&mut out)?;
        Ok(out)
    }
}

/// A stream of any supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyStream {
    Array(ArrayStream),
    SumTree(SumTreeStream),
    Bitmap(BitmapStream),
    Sequence(SequenceStream),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            AnyStream::Array($s) => $body,
            AnyStream::SumTree($s) => $body,
            AnyStream::Bitmap($s) => $body,
            AnyStream::Sequence($s) => $body,
        }
    };
}

impl AnyStream {
    /// Peek at a slot image and decode it as whichever kind it holds.
    pub fn decode(bytes: &[u8]) -> Result<Self, StreamError> {
        Self::read_from(bytes)
    }

    #[must_use]
    pub const fn as_sum_tree(&self) -> Option<&SumTreeStream> {
        match self {
            Self::SumTree(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_sum_tree_mut(&mut self) -> Option<&mut SumTreeStream> {
        match self {
            Self::SumTree(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_array(&self) -> Option<&ArrayStream> {
        match self {
            Self::Array(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_array_mut(&mut self) -> Option<&mut ArrayStream> {
        match self {
            Self::Array(s) => Some(s),
            _ => None,
        }
    }

    /// The `StreamSpec` describing this stream.
    #[must_use]
    pub fn spec(&self) -> StreamSpec {
        match self {
            Self::Array(s) => StreamSpec::Array {
                columns: s.width() as u8,
                indexed: s.is_indexed(),
            },
            Self::SumTree(s) => StreamSpec::SumTree {
                columns: s.width() as u8,
            },
            Self::Bitmap(_) => StreamSpec::Bitmap,
            Self::Sequence(s) => StreamSpec::Sequence {
                bits: s.bits() as u8,
            },
        }
    }

    fn mismatch(&self, other: &Self) -> StreamError {
        StreamError::KindMismatch {
            expected: self.kind(),
            actual: other.kind(),
        }
    }
}

impl PackedStream for AnyStream {
    fn kind(&self) -> StreamKind {
        dispatch!(self, s => s.kind())
    }

    fn size(&self) -> usize {
        dispatch!(self, s => s.size())
    }

    fn width(&self) -> usize {
        dispatch!(self, s => s.width())
    }

    fn indexes(&self) -> usize {
        dispatch!(self, s => s.indexes())
    }

    fn sum(&self, index: usize, from: usize, to: usize) -> Result<u64, StreamError> {
        dispatch!(self, s => s.sum(index, from, to))
    }

    fn rank(&self, pos: usize, symbol: u64) -> Result<u64, StreamError> {
        dispatch!(self, s => s.rank(pos, symbol))
    }

    fn select_fw(&self, start: usize, symbol: u64, nth: u64) -> Result<FindResult, StreamError> {
        dispatch!(self, s => s.select_fw(start, symbol, nth))
    }

    fn select_bw(&self, end: usize, symbol: u64, nth: u64) -> Result<FindResult, StreamError> {
        dispatch!(self, s => s.select_bw(end, symbol, nth))
    }

    fn find_fw(
        &self,
        index: usize,
        start: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError> {
        dispatch!(self, s => s.find_fw(index, start, target, search))
    }

    fn find_bw(
        &self,
        index: usize,
        end: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError> {
        dispatch!(self, s => s.find_bw(index, end, target, search))
    }

    fn get(&self, pos: usize, column: usize) -> Result<u64, StreamError> {
        dispatch!(self, s => s.get(pos, column))
    }

    fn set(&mut self, pos: usize, values: &[u64]) -> Result<(), StreamError> {
        dispatch!(self, s => s.set(pos, values))
    }

    fn insert_range(&mut self, at: usize, values: &[u64]) -> Result<(), StreamError> {
        dispatch!(self, s => s.insert_range(at, values))
    }

    fn remove_range(&mut self, from: usize, to: usize) -> Result<(), StreamError> {
        dispatch!(self, s => s.remove_range(from, to))
    }

    fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), StreamError> {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.split_to(b, at),
            (Self::SumTree(a), Self::SumTree(b)) => a.split_to(b, at),
            (Self::Bitmap(a), Self::Bitmap(b)) => a.split_to(b, at),
            (Self::Sequence(a), Self::Sequence(b)) => a.split_to(b, at),
            (a, b) => Err(a.mismatch(b)),
        }
    }

    fn merge_with(&self, other: &mut Self) -> Result<(), StreamError> {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.merge_with(b),
            (Self::SumTree(a), Self::SumTree(b)) => a.merge_with(b),
            (Self::Bitmap(a), Self::Bitmap(b)) => a.merge_with(b),
            (Self::Sequence(a), Self::Sequence(b)) => a.merge_with(b),
            (a, b) => Err(a.mismatch(b)),
        }
    }

    fn reindex(&mut self) {
        dispatch!(self, s => s.reindex());
    }

    fn encoded_len(&self) -> usize {
        dispatch!(self, s => s.encoded_len())
    }

    fn write_to(&self, out: &mut [u8]) -> Result<(), StreamError> {
        dispatch!(self, s => s.write_to(out))
    }

    fn read_from(bytes: &[u8]) -> Result<Self, StreamError> {
        let header = StreamHeader::from_bytes(bytes)?;
        Ok(match header.kind {
            StreamKind::Array => Self::Array(ArrayStream::read_from(bytes)?),
            StreamKind::SumTree => Self::SumTree(SumTreeStream::read_from(bytes)?),
            StreamKind::Bitmap => Self::Bitmap(BitmapStream::read_from(bytes)?),
            StreamKind::Sequence => Self::Sequence(SequenceStream::read_from(bytes)?),
        })
    }
}

/// Forward scan over elements with an optional per-block sum index.
///
/// `elem(i)` is the contribution of entry `i`; `block_sum(b)` the total of
/// full block `b` (entries `b * block .. (b + 1) * block`).
pub(crate) fn blocked_find_fw(
    start: usize,
    size: usize,
    block: usize,
    target: u64,
    search: SearchType,
    elem: impl Fn(usize) -> u64,
    block_sum: impl Fn(usize) -> u64,
) -> FindResult {
    let mut running = 0u64;
    let mut i = start;

    while i < size && !i.is_multiple_of(block) {
        let next = running.wrapping_add(elem(i));
        if search.satisfied(next, target) {
            return FindResult {
                pos: Some(i),
                prefix: running,
            };
        }
        running = next;
        i += 1;
    }

    while size - i >= block {
        let next = running.wrapping_add(block_sum(i / block));
        if search.satisfied(next, target) {
            break;
        }
        running = next;
        i += block;
    }

    while i < size {
        let next = running.wrapping_add(elem(i));
        if search.satisfied(next, target) {
            return FindResult {
                pos: Some(i),
                prefix: running,
            };
        }
        running = next;
        i += 1;
    }

    FindResult {
        pos: None,
        prefix: running,
    }
}

/// Backward counterpart of [`blocked_find_fw`]; `end` is exclusive.
pub(crate) fn blocked_find_bw(
    end: usize,
    block: usize,
    target: u64,
    search: SearchType,
    elem: impl Fn(usize) -> u64,
    block_sum: impl Fn(usize) -> u64,
) -> FindResult {
    let mut running = 0u64;
    let mut i = end;

    while i > 0 && !i.is_multiple_of(block) {
        let next = running.wrapping_add(elem(i - 1));
        if search.satisfied(next, target) {
            return FindResult {
                pos: Some(i - 1),
                prefix: running,
            };
        }
        running = next;
        i -= 1;
    }

    while i >= block {
        let next = running.wrapping_add(block_sum(i / block - 1));
        if search.satisfied(next, target) {
            break;
        }
        running = next;
        i -= block;
    }

    while i > 0 {
        let next = running.wrapping_add(elem(i - 1));
        if search.satisfied(next, target) {
            return FindResult {
                pos: Some(i - 1),
                prefix: running,
            };
        }
        running = next;
        i -= 1;
    }

    FindResult {
        pos: None,
        prefix: running,
    }
}

/// Sum over `[from, to)` using full-block totals where possible.
pub(crate) fn blocked_sum(
    from: usize,
    to: usize,
    block: usize,
    elem: impl Fn(usize) -> u64,
    block_sum: impl Fn(usize) -> u64,
) -> u64 {
    let mut total = 0u64;
    let mut i = from;
    while i < to && !i.is_multiple_of(block) {
        total = total.wrapping_add(elem(i));
        i += 1;
    }
    while to - i >= block {
        total = total.wrapping_add(block_sum(i / block));
        i += block;
    }
    while i < to {
        total = total.wrapping_add(elem(i));
        i += 1;
    }
    total
}

/// Check `[from, to)` against a stream of `size` entries.
pub(crate) const fn check_range(from: usize, to: usize, size: usize) -> Result<(), StreamError> {
    if from > to || to > size {
        return Err(StreamError::RangeOutOfBounds { from, to, size });
    }
    Ok(())
}

/// Check a single entry position.
pub(crate) const fn check_pos(pos: usize, size: usize) -> Result<(), StreamError> {
    if pos >= size {
        return Err(StreamError::OutOfRange { pos, size });
    }
    Ok(())
}

pub(crate) const fn check_nth(nth: u64) -> Result<(), StreamError> {
    if nth == 0 {
        return Err(StreamError::InvalidParameter("select rank is 1-based"));
    }
    Ok(())
}

/// Append little-endian u64 words to a slot body.
pub(crate) fn put_words(out: &mut [u8], offset: usize, words: &[u64]) -> usize {
    let mut at = offset;
    for &word in words {
        write_u64(out, at, word);
        at += 8;
    }
    at
}

/// Read `count` little-endian u64 words from a slot body.
pub(crate) fn get_words(
    bytes: &[u8],
    offset: usize,
    count: usize,
) -> Result<Vec<u64>, StreamError> {
    let needed = offset + count * 8;
    if bytes.len() < needed {
        return Err(StreamError::Truncated {
            needed,
            available: bytes.len(),
        });
    }
    Ok((0..count).map(|i| read_u64(bytes, offset + i * 8)).collect())
}

/// Check an output buffer is large enough for an image.
pub(crate) const fn check_out(out: &[u8], needed: usize) -> Result<(), StreamError> {
    if out.len() < needed {
        return Err(StreamError::Truncated {
            needed,
            available: out.len(),
        });
    }
    Ok(())
}

/// Errors raised by stream operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Entry position outside the stream.
    OutOfRange { pos: usize, size: usize },
    /// Range outside the stream or reversed.
    RangeOutOfBounds { from: usize, to: usize, size: usize },
    /// Requested dimension does not exist.
    NoSuchIndex { index: usize, indexes: usize },
    /// Requested column does not exist.
    NoSuchColumn { column: usize, width: usize },
    /// Row data has the wrong number of values.
    WidthMismatch { expected: usize, actual: usize },
    /// A value does not fit the stream's encoding.
    ValueOutOfRange { value: u64, max: u64 },
    /// The stream kind does not provide this operation.
    Unsupported {
        kind: StreamKind,
        operation: &'static str,
    },
    /// Two streams of different kinds were combined.
    KindMismatch {
        expected: StreamKind,
        actual: StreamKind,
    },
    InvalidKind(u8),
    InvalidParameter(&'static str),
    /// Slot image shorter than its header claims.
    Truncated { needed: usize, available: usize },
    /// Stored index does not match the data it summarizes.
    CorruptIndex,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { pos, size } => {
                write!(f, "position {pos} out of range (size {size})")
            }
            Self::RangeOutOfBounds { from, to, size } => {
                write!(f, "range {from}..{to} out of bounds (size {size})")
            }
            Self::NoSuchIndex { index, indexes } => {
                write!(f, "index {index} does not exist ({indexes} indexes)")
            }
            Self::NoSuchColumn { column, width } => {
                write!(f, "column {column} does not exist (width {width})")
            }
            Self::WidthMismatch { expected, actual } => {
                write!(f, "expected {expected} values, got {actual}")
            }
            Self::ValueOutOfRange { value, max } => {
                write!(f, "value {value} exceeds maximum {max}")
            }
            Self::Unsupported { kind, operation } => {
                write!(f, "{kind:?} stream does not support {operation}")
            }
            Self::KindMismatch { expected, actual } => {
                write!(f, "expected {expected:?} stream, found {actual:?}")
            }
            Self::InvalidKind(v) => write!(f, "invalid stream kind: 0x{v:02x}"),
            Self::InvalidParameter(reason) => write!(f, "invalid parameter: {reason}"),
            Self::Truncated { needed, available } => {
                write!(f, "stream image truncated: need {needed} bytes, have {available}")
            }
            Self::CorruptIndex => write!(f, "stream index does not match its data"),
        }
    }
}

impl std::error::Error for StreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = StreamHeader {
            kind: StreamKind::Sequence,
            param: 2,
            indexed: true,
            size: 1234,
        };
        let restored = StreamHeader::from_bytes(&header.to_bytes()).expect("decode");
        assert_eq!(restored, header);
    }

    #[test]
    fn test_header_rejects_unknown_kind() {
        let mut bytes = [0u8; STREAM_HEADER_SIZE];
        bytes[0] = 0x7F;
        assert_eq!(
            StreamHeader::from_bytes(&bytes),
            Err(StreamError::InvalidKind(0x7F))
        );
    }

    #[test]
    fn test_spec_dimensions() {
        assert_eq!(StreamSpec::Array { columns: 3, indexed: false }.indexes(), 0);
        assert_eq!(StreamSpec::Array { columns: 3, indexed: true }.indexes(), 3);
        assert_eq!(StreamSpec::SumTree { columns: 2 }.indexes(), 2);
        assert_eq!(StreamSpec::Bitmap.indexes(), 2);
        assert_eq!(StreamSpec::Sequence { bits: 2 }.indexes(), 4);
        assert_eq!(StreamSpec::Sequence { bits: 4 }.width(), 1);
    }

    #[test]
    fn test_spec_validation() {
        assert!(StreamSpec::Sequence { bits: 3 }.validate().is_err());
        assert!(StreamSpec::SumTree { columns: 0 }.validate().is_err());
        assert!(StreamSpec::Bitmap.validate().is_ok());
    }

    #[test]
    fn test_spec_encoded_len_matches_instances() {
        let specs = [
            StreamSpec::Array { columns: 2, indexed: true },
            StreamSpec::SumTree { columns: 3 },
            StreamSpec::Bitmap,
            StreamSpec::Sequence { bits: 2 },
        ];
        for spec in specs {
            let mut stream = spec.empty();
            assert_eq!(stream.encoded_len(), spec.encoded_len(0));
            let row = vec![1u64; spec.width()];
            for count in 1..=70 {
                stream.insert_range(stream.size(), &row).expect("insert");
                assert_eq!(stream.encoded_len(), spec.encoded_len(count), "{spec:?} at {count}");
                assert_eq!(stream.encoded_len() % 8, 0);
            }
        }
    }

    #[test]
    fn test_blocked_scans_agree_with_linear() {
        let values: Vec<u64> = (0..50).map(|i| i % 7).collect();
        let block = 8;
        let block_sum = |b: usize| values[b * block..(b + 1) * block].iter().sum::<u64>();
        let elem = |i: usize| values[i];

        for start in [0, 3, 8, 17] {
            for target in [0, 1, 5, 20, 80, 1000] {
                let end = values.len();
                let result =
                    blocked_find_fw(start, end, block, target, SearchType::Ge, elem, block_sum);
                let mut running = 0;
                let mut expected = None;
                for (i, v) in values.iter().enumerate().skip(start) {
                    if running + v >= target {
                        expected = Some(i);
                        break;
                    }
                    running += v;
                }
                assert_eq!(result.pos, expected, "start {start} target {target}");
                assert_eq!(result.prefix, running);
            }
        }

        assert_eq!(
            blocked_sum(3, 45, block, elem, block_sum),
            values[3..45].iter().sum::<u64>()
        );

        let result = blocked_find_bw(40, block, 10, SearchType::Gt, elem, block_sum);
        let mut running = 0;
        let mut expected = None;
        for i in (0..40).rev() {
            if running + values[i] > 10 {
                expected = Some(i);
                break;
            }
            running += values[i];
        }
        assert_eq!(result.pos, expected);
        assert_eq!(result.prefix, running);
    }
}
