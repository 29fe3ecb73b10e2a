//! Symbol sequence stream: 1, 2 or 4 bits per symbol with per-block
//! symbol counts for rank and select.

#![allow(clippy::cast_possible_truncation)]

use crate::packed::stream::{
    FindResult, PackedStream, STREAM_HEADER_SIZE, SearchType, StreamError, StreamHeader,
    StreamKind, blocked_find_bw, blocked_find_fw, blocked_sum, check_nth, check_out, check_pos,
    check_range, get_words, put_words,
};
use crate::packed::symbols::SymbolBuffer;

/// Words per index block.
const BLOCK_WORDS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceStream {
    symbols: SymbolBuffer,
    /// Per block, per symbol counts.
    counts: Vec<u16>,
}

impl SequenceStream {
    /// Empty sequence of `bits`-wide symbols.
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self {
            symbols: SymbolBuffer::new(bits),
            counts: Vec::new(),
        }
    }

    pub fn from_symbols(bits: u32, symbols: &[u64]) -> Result<Self, StreamError> {
        let mut stream = Self::new(bits);
        stream.check_symbols(symbols)?;
        stream.symbols = SymbolBuffer::from_symbols(bits, symbols);
        stream.reindex();
        Ok(stream)
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.symbols.bits()
    }

    #[must_use]
    pub const fn alphabet(&self) -> usize {
        1 << self.symbols.bits()
    }

    const fn block_symbols(bits: u32) -> usize {
        BLOCK_WORDS * SymbolBuffer::per_word(bits)
    }

    const fn count_words(bits: u32, words: usize) -> usize {
        (words.div_ceil(BLOCK_WORDS) << bits).div_ceil(4)
    }

    #[must_use]
    pub const fn encoded_len_for(bits: u32, count: usize) -> usize {
        let words = SymbolBuffer::word_count(bits, count);
        STREAM_HEADER_SIZE + 8 * (words + Self::count_words(bits, words))
    }

    const fn check_symbol(&self, symbol: u64) -> Result<(), StreamError> {
        if symbol >= self.alphabet() as u64 {
            return Err(StreamError::NoSuchIndex {
                index: symbol as usize,
                indexes: self.alphabet(),
            });
        }
        Ok(())
    }

    fn check_symbols(&self, values: &[u64]) -> Result<(), StreamError> {
        let max = self.alphabet() as u64 - 1;
        if let Some(&value) = values.iter().find(|&&v| v > max) {
            return Err(StreamError::ValueOutOfRange { value, max });
        }
        Ok(())
    }

    fn block_count(&self, block: usize, symbol: u64) -> u64 {
        u64::from(self.counts[block * self.alphabet() + symbol as usize])
    }

    fn compute_counts(&self) -> Vec<u16> {
        let alphabet = self.alphabet();
        let block = Self::block_symbols(self.bits());
        let blocks = self.symbols.words().len().div_ceil(BLOCK_WORDS);
        let mut counts = vec![0u16; blocks * alphabet];
        for pos in 0..self.symbols.len() {
            let symbol = self.symbols.get(pos) as usize;
            counts[(pos / block) * alphabet + symbol] += 1;
        }
        counts
    }

    fn packed_counts(&self) -> Vec<u64> {
        let mut words = vec![0u64; self.counts.len().div_ceil(4)];
        for (i, &count) in self.counts.iter().enumerate() {
            words[i / 4] |= u64::from(count) << ((i % 4) * 16);
        }
        words
    }

    fn indicator(&self, pos: usize, symbol: u64) -> u64 {
        u64::from(self.symbols.get(pos) == symbol)
    }
}

impl PackedStream for SequenceStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Sequence
    }

    fn size(&self) -> usize {
        self.symbols.len()
    }

    fn width(&self) -> usize {
        1
    }

    fn indexes(&self) -> usize {
        self.alphabet()
    }

    fn sum(&self, index: usize, from: usize, to: usize) -> Result<u64, StreamError> {
        let symbol = index as u64;
        self.check_symbol(symbol)?;
        check_range(from, to, self.size())?;
        Ok(blocked_sum(
            from,
            to,
            Self::block_symbols(self.bits()),
            |pos| self.indicator(pos, symbol),
            |block| self.block_count(block, symbol),
        ))
    }

    fn rank(&self, pos: usize, symbol: u64) -> Result<u64, StreamError> {
        self.sum(symbol as usize, 0, pos)
    }

    fn select_fw(&self, start: usize, symbol: u64, nth: u64) -> Result<FindResult, StreamError> {
        check_nth(nth)?;
        self.find_fw(symbol as usize, start, nth, SearchType::Ge)
    }

    fn select_bw(&self, end: usize, symbol: u64, nth: u64) -> Result<FindResult, StreamError> {
        check_nth(nth)?;
        self.find_bw(symbol as usize, end, nth, SearchType::Ge)
    }

    fn find_fw(
        &self,
        index: usize,
        start: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError> {
        let symbol = index as u64;
        self.check_symbol(symbol)?;
        check_range(start, self.size(), self.size())?;
        Ok(blocked_find_fw(
            start,
            self.size(),
            Self::block_symbols(self.bits()),
            target,
            search,
            |pos| self.indicator(pos, symbol),
            |block| self.block_count(block, symbol),
        ))
    }

    fn find_bw(
        &self,
        index: usize,
        end: usize,
        target: u64,
        search: SearchType,
    ) -> Result<FindResult, StreamError> {
        let symbol = index as u64;
        self.check_symbol(symbol)?;
        check_range(0, end, self.size())?;
        Ok(blocked_find_bw(
            end,
            Self::block_symbols(self.bits()),
            target,
            search,
            |pos| self.indicator(pos, symbol),
            |block| self.block_count(block, symbol),
        ))
    }

    fn get(&self, pos: usize, column: usize) -> Result<u64, StreamError> {
        check_pos(pos, self.size())?;
        if column != 0 {
            return Err(StreamError::NoSuchColumn { column, width: 1 });
        }
        Ok(self.symbols.get(pos))
    }

    fn set(&mut self, pos: usize, values: &[u64]) -> Result<(), StreamError> {
        check_pos(pos, self.size())?;
        let [value] = values else {
            return Err(StreamError::WidthMismatch {
                expected: 1,
                actual: values.len(),
            });
        };
        self.check_symbols(values)?;
        self.symbols.set(pos, *value);
        self.reindex();
        Ok(())
    }

    fn insert_range(&mut self, at: usize, values: &[u64]) -> Result<(), StreamError> {
        check_range(at, at, self.size())?;
        self.check_symbols(values)?;
        self.symbols.insert(at, values);
        self.reindex();
        Ok(())
    }

    fn remove_range(&mut self, from: usize, to: usize) -> Result<(), StreamError> {
        check_range(from, to, self.size())?;
        self.symbols.remove(from, to);
        self.reindex();
        Ok(())
    }

    fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), StreamError> {
        check_range(at, self.size(), self.size())?;
        if other.bits() != self.bits() {
            return Err(StreamError::InvalidParameter("bits per symbol differ"));
        }
        let tail = self.symbols.split_off(at);
        other.symbols.prepend(&tail);
        self.reindex();
        other.reindex();
        Ok(())
    }

    fn merge_with(&self, other: &mut Self) -> Result<(), StreamError> {
        if other.bits() != self.bits() {
            return Err(StreamError::InvalidParameter("bits per symbol differ"));
        }
        other.symbols.append(&self.symbols);
        other.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        self.counts = self.compute_counts();
    }

    fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.bits(), self.size())
    }

    fn write_to(&self, out: &mut [u8]) -> Result<(), StreamError> {
        check_out(out, self.encoded_len())?;
        let header = StreamHeader {
            kind: StreamKind::Sequence,
            param: self.bits() as u8,
            indexed: true,
            size: self.size() as u32,
        };
        out[..STREAM_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        let at = put_words(out, STREAM_HEADER_SIZE, self.symbols.words());
        put_words(out, at, &self.packed_counts());
        Ok(())
    }

    fn read_from(bytes: &[u8]) -> Result<Self, StreamError> {
        let header = StreamHeader::expect(bytes, StreamKind::Sequence)?;
        let bits = u32::from(header.param);
        if !matches!(bits, 1 | 2 | 4) {
            return Err(StreamError::InvalidParameter("bits per symbol must be 1, 2 or 4"));
        }
        let size = header.size as usize;
        let word_count = SymbolBuffer::word_count(bits, size);
        let words = get_words(bytes, STREAM_HEADER_SIZE, word_count)?;
        let packed = get_words(
            bytes,
            STREAM_HEADER_SIZE + 8 * word_count,
            Self::count_words(bits, word_count),
        )?;
        let mut stream = Self {
            symbols: SymbolBuffer::from_words(bits, size, words)?,
            counts: Vec::new(),
        };
        stream.reindex();
        if stream.packed_counts() != packed {
            return Err(StreamError::CorruptIndex);
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(bits: u32, len: usize) -> Vec<u64> {
        let alphabet = 1u64 << bits;
        (0..len as u64).map(|i| (i * 7 + i / 5) % alphabet).collect()
    }

    #[test]
    fn test_rank_matches_linear_count() {
        for bits in [1, 2, 4] {
            let symbols = cycle(bits, 1500);
            let stream = SequenceStream::from_symbols(bits, &symbols).expect("build");
            for symbol in 0..(1u64 << bits) {
                for pos in [0, 17, 256, 511, 512, 1024, 1499, 1500] {
                    let expected = symbols[..pos].iter().filter(|&&s| s == symbol).count() as u64;
                    assert_eq!(stream.rank(pos, symbol).expect("rank"), expected);
                }
            }
        }
    }

    #[test]
    fn test_rank_select_duality() {
        let symbols = cycle(2, 900);
        let stream = SequenceStream::from_symbols(2, &symbols).expect("build");
        for symbol in 0..4 {
            let total = stream.rank(900, symbol).expect("rank");
            for r in 1..=total {
                let found = stream.select_fw(0, symbol, r).expect("select");
                let pos = found.pos.expect("occurrence exists");
                assert_eq!(stream.get(pos, 0).expect("get"), symbol);
                assert_eq!(stream.rank(pos, symbol).expect("rank"), r - 1);
            }
            let beyond = stream.select_fw(0, symbol, total + 1).expect("select");
            assert_eq!(beyond, FindResult { pos: None, prefix: total });
        }
    }

    #[test]
    fn test_run_of_symbols() {
        let stream = SequenceStream::from_symbols(1, &[0, 0, 1, 1, 1, 0]).expect("build");
        assert_eq!(stream.select_fw(0, 1, 3).expect("select").pos, Some(4));
        assert_eq!(stream.select_bw(6, 1, 1).expect("select").pos, Some(4));
        assert_eq!(stream.select_bw(4, 1, 2).expect("select").pos, Some(2));
    }

    #[test]
    fn test_value_checks() {
        let mut stream = SequenceStream::new(2);
        assert_eq!(
            stream.insert_range(0, &[1, 4]),
            Err(StreamError::ValueOutOfRange { value: 4, max: 3 })
        );
        assert!(matches!(
            stream.rank(0, 4),
            Err(StreamError::NoSuchIndex { .. })
        ));
    }

    #[test]
    fn test_encode_decode_and_corruption() {
        let stream = SequenceStream::from_symbols(4, &cycle(4, 333)).expect("build");
        let mut bytes = stream.encode().expect("encode");
        assert_eq!(bytes.len(), SequenceStream::encoded_len_for(4, 333));
        assert_eq!(SequenceStream::read_from(&bytes).expect("decode"), stream);

        let last = bytes.len() - 8;
        bytes[last] ^= 0x01;
        assert_eq!(
            SequenceStream::read_from(&bytes),
            Err(StreamError::CorruptIndex)
        );
    }

    #[test]
    fn test_split_merge() {
        let symbols = cycle(2, 400);
        let original = SequenceStream::from_symbols(2, &symbols).expect("build");
        let mut left = original.clone();
        let mut right = SequenceStream::new(2);
        left.split_to(&mut right, 150).expect("split");
        assert_eq!(left.size() + right.size(), 400);
        assert_eq!(
            left.rank(150, 3).expect("rank") + right.rank(250, 3).expect("rank"),
            original.rank(400, 3).expect("rank")
        );
        right.merge_with(&mut left).expect("merge");
        assert_eq!(left, original);
    }
}
