//! Fixed-width symbols packed into u64 words.
//!
//! Symbol `i` lives in word `i / per_word`, at bit offset
//! `(i % per_word) * bits`. Bits past `len` are always zero.

#![allow(clippy::cast_possible_truncation)]

use crate::packed::stream::StreamError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SymbolBuffer {
    bits: u32,
    len: usize,
    words: Vec<u64>,
}

impl SymbolBuffer {
    pub(crate) const fn new(bits: u32) -> Self {
        Self {
            bits,
            len: 0,
            words: Vec::new(),
        }
    }

    pub(crate) const fn per_word(bits: u32) -> usize {
        (64 / bits) as usize
    }

    pub(crate) const fn word_count(bits: u32, len: usize) -> usize {
        len.div_ceil(Self::per_word(bits))
    }

    pub(crate) fn from_symbols(bits: u32, symbols: &[u64]) -> Self {
        let mut buffer = Self {
            bits,
            len: symbols.len(),
            words: vec![0; Self::word_count(bits, symbols.len())],
        };
        for (pos, &symbol) in symbols.iter().enumerate() {
            buffer.set(pos, symbol);
        }
        buffer
    }

    /// Rebuild from stored words, rejecting stray bits past `len`.
    pub(crate) fn from_words(bits: u32, len: usize, words: Vec<u64>) -> Result<Self, StreamError> {
        if words.len() != Self::word_count(bits, len) {
            return Err(StreamError::Truncated {
                needed: Self::word_count(bits, len) * 8,
                available: words.len() * 8,
            });
        }
        let buffer = Self { bits, len, words };
        let used_bits = (len % Self::per_word(bits)) * bits as usize;
        if used_bits != 0 {
            if let Some(&last) = buffer.words.last() {
                if last >> used_bits != 0 {
                    return Err(StreamError::CorruptIndex);
                }
            }
        }
        Ok(buffer)
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn bits(&self) -> u32 {
        self.bits
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    const fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    pub(crate) fn get(&self, pos: usize) -> u64 {
        let per_word = Self::per_word(self.bits);
        let shift = (pos % per_word) as u32 * self.bits;
        (self.words[pos / per_word] >> shift) & self.mask()
    }

    pub(crate) fn set(&mut self, pos: usize, symbol: u64) {
        let per_word = Self::per_word(self.bits);
        let shift = (pos % per_word) as u32 * self.bits;
        let mask = self.mask();
        let word = &mut self.words[pos / per_word];
        *word = (*word & !(mask << shift)) | ((symbol & mask) << shift);
    }

    pub(crate) fn to_symbols(&self) -> Vec<u64> {
        (0..self.len).map(|pos| self.get(pos)).collect()
    }

    pub(crate) fn insert(&mut self, at: usize, symbols: &[u64]) {
        let mut all = self.to_symbols();
        all.splice(at..at, symbols.iter().copied());
        *self = Self::from_symbols(self.bits, &all);
    }

    pub(crate) fn remove(&mut self, from: usize, to: usize) {
        let mut all = self.to_symbols();
        all.drain(from..to);
        *self = Self::from_symbols(self.bits, &all);
    }

    /// Split off `[at, len)` into a new buffer.
    pub(crate) fn split_off(&mut self, at: usize) -> Self {
        let mut all = self.to_symbols();
        let tail = all.split_off(at);
        *self = Self::from_symbols(self.bits, &all);
        Self::from_symbols(self.bits, &tail)
    }

    pub(crate) fn prepend(&mut self, head: &Self) {
        let mut all = head.to_symbols();
        all.extend(self.to_symbols());
        *self = Self::from_symbols(self.bits, &all);
    }

    pub(crate) fn append(&mut self, tail: &Self) {
        let mut all = self.to_symbols();
        all.extend(tail.to_symbols());
        *self = Self::from_symbols(self.bits, &all);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_across_words() {
        for bits in [1, 2, 4] {
            let max = (1u64 << bits) - 1;
            let symbols: Vec<u64> = (0..200).map(|i| i % (max + 1)).collect();
            let buffer = SymbolBuffer::from_symbols(bits, &symbols);
            assert_eq!(buffer.len(), 200);
            assert_eq!(buffer.words().len(), SymbolBuffer::word_count(bits, 200));
            assert_eq!(buffer.to_symbols(), symbols);
        }
    }

    #[test]
    fn test_edit_operations() {
        let mut buffer = SymbolBuffer::from_symbols(2, &[0, 1, 2, 3, 0, 1]);
        buffer.insert(2, &[3, 3]);
        assert_eq!(buffer.to_symbols(), vec![0, 1, 3, 3, 2, 3, 0, 1]);

        buffer.remove(1, 4);
        assert_eq!(buffer.to_symbols(), vec![0, 2, 3, 0, 1]);

        let tail = buffer.split_off(3);
        assert_eq!(buffer.to_symbols(), vec![0, 2, 3]);
        assert_eq!(tail.to_symbols(), vec![0, 1]);

        buffer.append(&tail);
        assert_eq!(buffer.to_symbols(), vec![0, 2, 3, 0, 1]);

        let mut other = SymbolBuffer::from_symbols(2, &[1]);
        other.prepend(&buffer);
        assert_eq!(other.to_symbols(), vec![0, 2, 3, 0, 1, 1]);
    }

    #[test]
    fn test_from_words_rejects_stray_bits() {
        let buffer = SymbolBuffer::from_symbols(1, &[1, 0, 1]);
        let mut words = buffer.words().to_vec();
        assert!(SymbolBuffer::from_words(1, 3, words.clone()).is_ok());
        words[0] |= 1 << 10;
        assert!(SymbolBuffer::from_words(1, 3, words).is_err());
    }
}
