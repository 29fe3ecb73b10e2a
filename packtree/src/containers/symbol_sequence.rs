//! Sequence of small symbols with rank and select.

use crate::btree::{Schema, Tree, TreeError};
use crate::config::TreeConfig;
use crate::packed::StreamSpec;
use crate::store::{BlockStore, MemoryStore};

const STREAM: usize = 0;

pub struct SymbolSequence<S: BlockStore = MemoryStore> {
    tree: Tree<S>,
}

impl SymbolSequence<MemoryStore> {
    /// An empty sequence of `bits`-wide symbols (1, 2 or 4).
    pub fn new(bits: u8, config: TreeConfig) -> Result<Self, TreeError> {
        Self::with_store(MemoryStore::new(config.block_size), bits, config)
    }
}

impl<S: BlockStore> SymbolSequence<S> {
    pub fn with_store(store: S, bits: u8, config: TreeConfig) -> Result<Self, TreeError> {
        let schema = Schema::new(vec![StreamSpec::Sequence { bits }])?;
        Ok(Self {
            tree: Tree::create(store, schema, config)?,
        })
    }

    #[must_use]
    pub const fn tree(&self) -> &Tree<S> {
        &self.tree
    }

    pub fn len(&self) -> Result<u64, TreeError> {
        self.tree.size()
    }

    pub fn is_empty(&self) -> Result<bool, TreeError> {
        self.tree.is_empty()
    }

    fn check_pos(&self, pos: u64) -> Result<(), TreeError> {
        let size = self.len()?;
        if pos >= size {
            return Err(TreeError::PositionOutOfRange { pos, size });
        }
        Ok(())
    }

    /// Symbol at `pos`.
    pub fn access(&self, pos: u64) -> Result<u64, TreeError> {
        self.check_pos(pos)?;
        let cursor = self.tree.seek(pos)?;
        Ok(self.tree.entry(&cursor)?[0])
    }

    /// Insert `symbol` so that it ends up at `pos`.
    pub fn insert(&mut self, pos: u64, symbol: u64) -> Result<(), TreeError> {
        let mut cursor = self.tree.seek(pos)?;
        self.tree.ctr_insert(&mut cursor, &[symbol])?;
        Ok(())
    }

    pub fn push(&mut self, symbol: u64) -> Result<(), TreeError> {
        let mut cursor = self.tree.end()?;
        self.tree.ctr_insert(&mut cursor, &[symbol])?;
        Ok(())
    }

    /// Remove and return the symbol at `pos`.
    pub fn remove(&mut self, pos: u64) -> Result<u64, TreeError> {
        self.check_pos(pos)?;
        let mut cursor = self.tree.seek(pos)?;
        let symbol = self.tree.entry(&cursor)?[0];
        self.tree.ctr_remove(&mut cursor)?;
        Ok(symbol)
    }

    /// Occurrences of `symbol` in `[0, pos)`.
    pub fn rank(&self, symbol: u64, pos: u64) -> Result<u64, TreeError> {
        self.tree.rank(STREAM, symbol, pos)
    }

    /// Position of the `nth` (1-based) occurrence of `symbol`.
    pub fn select(&self, symbol: u64, nth: u64) -> Result<Option<u64>, TreeError> {
        let cursor = self.tree.select(STREAM, symbol, nth)?;
        Ok(cursor.is_valid().then(|| cursor.position()))
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_access_insert_remove() {
        let mut seq = SymbolSequence::new(2, TreeConfig::default().with_block_size(256))
            .expect("sequence");
        for symbol in [3, 1, 2] {
            seq.push(symbol).expect("push");
        }
        seq.insert(1, 0).expect("insert");
        let all: Vec<u64> = (0..4).map(|pos| seq.access(pos).expect("access")).collect();
        assert_eq!(all, vec![3, 0, 1, 2]);
        assert_eq!(seq.remove(0).expect("remove"), 3);
        assert_eq!(seq.access(0).expect("access"), 0);
        assert!(seq.access(3).is_err());
        assert!(seq.push(4).is_err());
    }

    #[test]
    fn test_rank_select_against_vec() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seq = SymbolSequence::new(4, TreeConfig::default().with_block_size(1024))
            .expect("sequence");
        let mut model = Vec::new();
        for _ in 0..3000 {
            let symbol = rng.random_range(0..16u64);
            let pos = rng.random_range(0..=model.len());
            seq.insert(pos as u64, symbol).expect("insert");
            model.insert(pos, symbol);
        }
        seq.tree().check().expect("consistent");

        for symbol in [0, 7, 15] {
            let positions: Vec<u64> = model
                .iter()
                .enumerate()
                .filter(|&(_, &s)| s == symbol)
                .map(|(pos, _)| pos as u64)
                .collect();
            for pos in [0, 1, 999, 2999, 3000] {
                let expected = positions.iter().filter(|&&p| p < pos).count() as u64;
                assert_eq!(seq.rank(symbol, pos).expect("rank"), expected);
            }
            for (nth, &pos) in positions.iter().enumerate().step_by(37) {
                assert_eq!(seq.select(symbol, nth as u64 + 1).expect("select"), Some(pos));
            }
            let beyond = positions.len() as u64 + 1;
            assert_eq!(seq.select(symbol, beyond).expect("select"), None);
        }
    }
}
