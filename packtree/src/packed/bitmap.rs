//! Bitmap stream with a per-block popcount index.

#![allow(clippy::cast_possible_truncation)]

use crate::packed::stream::{
    FindResult, PackedStream, STREAM_HEADER_SIZE, SearchType, StreamError, StreamHeader,
    StreamKind, blocked_find_bw, blocked_find_fw, blocked_sum, check_nth, check_out, check_pos,
    check_range, get_words, put_words,
};
use crate::packed::symbols::SymbolBuffer;

/// Words per index block.
const BLOCK_WORDS: usize = 8;

/// Bits per index block.
const BLOCK_BITS: usize = BLOCK_WORDS * 64;

/// One bit per entry; symbol 0 and symbol 1 are both rankable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapStream {
    bits: SymbolBuffer,
    /// Ones per block of `BLOCK_WORDS` words.
    ones: Vec<u64>,
}

impl Default for BitmapStream {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapStream {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: SymbolBuffer::new(1),
            ones: Vec::new(),
        }
    }

    pub fn from_bits(bits: &[u64]) -> Result<Self, StreamError> {
        check_symbols(bits)?;
        let mut stream = Self {
            bits: SymbolBuffer::from_symbols(1, bits),
            ones: Vec::new(),
        };
        stream.reindex();
        Ok(stream)
    }

    #[must_use]
    pub const fn encoded_len_for(count: usize) -> usize {
        let words = SymbolBuffer::word_count(1, count);
        STREAM_HEADER_SIZE + 8 * (words + words.div_ceil(BLOCK_WORDS))
    }

    /// Ones in `[0, size)`.
    #[must_use]
    pub fn count_ones(&self) -> u64 {
        self.ones.iter().sum()
    }

    fn bit(&self, pos: usize) -> u64 {
        self.bits.get(pos)
    }

    fn block_count(&self, block: usize, symbol: u64) -> u64 {
        if symbol == 1 {
            self.ones[block]
        } else {
            BLOCK_BITS as u64 - self.ones[block]
        }
    }

    const fn check_symbol(symbol: u64) -> Result<(), StreamError> {
        if symbol > 1 {
            return Err(StreamError::NoSuchIndex {
                index: symbol as usize,
                indexes: 2,
            });
        }
        Ok(())
    }

    fn compute_ones(&self) -> Vec<u64> {
        self.bits
            .words()
            .chunks(BLOCK_WORDS)
            .map(|chunk| chunk.iter().map(|w| u64::from(w.count_ones())).sum())
            .collect()
    }
}

fn check_symbols(values: &[u64]) -> Result<(), StreamError> {
    if let Some(&value) = values.iter().find(|&&v| v > 1) {
        return Err(StreamError::ValueOutOfRange { value, max: 1 });
    }
    Ok(())
}

impl PackedStream for BitmapStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Bitmap
    }

    fn size(&self) -> usize {
        self.bits.len()
    }

    fn width(&self) -> usize {
        1
    }

    fn indexes(&self) -> usize {
        2
    }

    fn sum(&self, index: usize, from: usize, to: usize) -> Result<u64, StreamError> {
        let symbol = index as u64;
        Self::check_symbol(symbol)?;
        check_range(from, to, self.size())?;
        Ok(blocked_sum(
            from,
            to,
            BLOCK_BITS,
            |pos| u64::from(self.bit(pos) == symbol),
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
        Self::check_symbol(symbol)?;
        check_range(start, self.size(), self.size())?;
        Ok(blocked_find_fw(
            start,
            self.size(),
            BLOCK_BITS,
            target,
            search,
            |pos| u64::from(self.bit(pos) == symbol),
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
        Self::check_symbol(symbol)?;
        check_range(0, end, self.size())?;
        Ok(blocked_find_bw(
            end,
            BLOCK_BITS,
            target,
            search,
            |pos| u64::from(self.bit(pos) == symbol),
            |block| self.block_count(block, symbol),
        ))
    }

    fn get(&self, pos: usize, column: usize) -> Result<u64, StreamError> {
        check_pos(pos, self.size())?;
        if column != 0 {
            return Err(StreamError::NoSuchColumn { column, width: 1 });
        }
        Ok(self.bit(pos))
    }

    fn set(&mut self, pos: usize, values: &[u64]) -> Result<(), StreamError> {
        check_pos(pos, self.size())?;
        let [value] = values else {
            return Err(StreamError::WidthMismatch {
                expected: 1,
                actual: values.len(),
            });
        };
        check_symbols(values)?;
        self.bits.set(pos, *value);
        self.reindex();
        Ok(())
    }

    fn insert_range(&mut self, at: usize, values: &[u64]) -> Result<(), StreamError> {
        check_range(at, at, self.size())?;
        check_symbols(values)?;
        self.bits.insert(at, values);
        self.reindex();
        Ok(())
    }

    fn remove_range(&mut self, from: usize, to: usize) -> Result<(), StreamError> {
        check_range(from, to, self.size())?;
        self.bits.remove(from, to);
        self.reindex();
        Ok(())
    }

    fn split_to(&mut self, other: &mut Self, at: usize) -> Result<(), StreamError> {
        check_range(at, self.size(), self.size())?;
        let tail = self.bits.split_off(at);
        other.bits.prepend(&tail);
        self.reindex();
        other.reindex();
        Ok(())
    }

    fn merge_with(&self, other: &mut Self) -> Result<(), StreamError> {
        other.bits.append(&self.bits);
        other.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        self.ones = self.compute_ones();
    }

    fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.size())
    }

    fn write_to(&self, out: &mut [u8]) -> Result<(), StreamError> {
        check_out(out, self.encoded_len())?;
        let header = StreamHeader {
            kind: StreamKind::Bitmap,
            param: 1,
            indexed: true,
            size: self.size() as u32,
        };
        out[..STREAM_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        let at = put_words(out, STREAM_HEADER_SIZE, self.bits.words());
        put_words(out, at, &self.ones);
        Ok(())
    }

    fn read_from(bytes: &[u8]) -> Result<Self, StreamError> {
        let header = StreamHeader::expect(bytes, StreamKind::Bitmap)?;
        let size = header.size as usize;
        let word_count = SymbolBuffer::word_count(1, size);
        let words = get_words(bytes, STREAM_HEADER_SIZE, word_count)?;
        let ones = get_words(
            bytes,
            STREAM_HEADER_SIZE + 8 * word_count,
            word_count.div_ceil(BLOCK_WORDS),
        )?;
        let stream = Self {
            bits: SymbolBuffer::from_words(1, size, words)?,
            ones,
        };
        if stream.ones != stream.compute_ones() {
            return Err(StreamError::CorruptIndex);
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u64> {
        (0..len).map(|i| u64::from(i % 3 == 0)).collect()
    }

    #[test]
    fn test_rank_both_symbols() {
        let bits = pattern(2000);
        let stream = BitmapStream::from_bits(&bits).expect("build");
        for pos in [0, 1, 63, 64, 511, 512, 513, 1999, 2000] {
            let ones = bits[..pos].iter().sum::<u64>();
            assert_eq!(stream.rank(pos, 1).expect("rank"), ones);
            assert_eq!(stream.rank(pos, 0).expect("rank"), pos as u64 - ones);
        }
        assert_eq!(stream.count_ones(), bits.iter().sum::<u64>());
    }

    #[test]
    fn test_select_forward_and_backward() {
        let stream = BitmapStream::from_bits(&[0, 0, 1, 1, 1, 0]).expect("build");
        let third_one = stream.select_fw(0, 1, 3).expect("select");
        assert_eq!(third_one, FindResult { pos: Some(4), prefix: 2 });

        let last_zero = stream.select_bw(6, 0, 1).expect("select");
        assert_eq!(last_zero, FindResult { pos: Some(5), prefix: 0 });

        let missing = stream.select_fw(3, 1, 5).expect("select");
        assert_eq!(missing, FindResult { pos: None, prefix: 2 });

        assert!(stream.select_fw(0, 1, 0).is_err());
    }

    #[test]
    fn test_select_across_blocks() {
        let bits = pattern(3000);
        let stream = BitmapStream::from_bits(&bits).expect("build");
        let found = stream.select_fw(0, 1, 500).expect("select");
        assert_eq!(found.pos, Some(499 * 3));
        let found = stream.select_bw(3000, 0, 1000).expect("select");
        let expected = (0..3000).rev().filter(|i| i % 3 != 0).nth(999);
        assert_eq!(found.pos, expected);
    }

    #[test]
    fn test_rejects_non_bits() {
        let mut stream = BitmapStream::new();
        assert_eq!(
            stream.insert_range(0, &[0, 2]),
            Err(StreamError::ValueOutOfRange { value: 2, max: 1 })
        );
        assert_eq!(stream.size(), 0);
    }

    #[test]
    fn test_split_merge_encode() {
        let bits = pattern(700);
        let original = BitmapStream::from_bits(&bits).expect("build");
        let mut left = original.clone();
        let mut right = BitmapStream::new();
        left.split_to(&mut right, 300).expect("split");
        assert_eq!(left.size(), 300);
        assert_eq!(right.get(0, 0).expect("get"), bits[300]);

        let decoded = BitmapStream::read_from(&right.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, right);

        right.merge_with(&mut left).expect("merge");
        assert_eq!(left, original);
    }
}
