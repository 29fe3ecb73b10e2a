//! Growable bit vector with rank and select over set bits.

use crate::btree::{Schema, Tree, TreeError};
use crate::config::TreeConfig;
use crate::packed::StreamSpec;
use crate::store::{BlockStore, MemoryStore};

const STREAM: usize = 0;

pub struct BitVector<S: BlockStore = MemoryStore> {
    tree: Tree<S>,
}

impl BitVector<MemoryStore> {
    pub fn new(config: TreeConfig) -> Result<Self, TreeError> {
        Self::with_store(MemoryStore::new(config.block_size), config)
    }
}

impl<S: BlockStore> BitVector<S> {
    pub fn with_store(store: S, config: TreeConfig) -> Result<Self, TreeError> {
        let schema = Schema::new(vec![StreamSpec::Bitmap])?;
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

    pub fn push(&mut self, bit: bool) -> Result<(), TreeError> {
        let mut cursor = self.tree.end()?;
        self.tree.ctr_insert(&mut cursor, &[u64::from(bit)])?;
        Ok(())
    }

    pub fn insert(&mut self, pos: u64, bit: bool) -> Result<(), TreeError> {
        let mut cursor = self.tree.seek(pos)?;
        self.tree.ctr_insert(&mut cursor, &[u64::from(bit)])?;
        Ok(())
    }

    pub fn get(&self, pos: u64) -> Result<bool, TreeError> {
        let size = self.len()?;
        if pos >= size {
            return Err(TreeError::PositionOutOfRange { pos, size });
        }
        let cursor = self.tree.seek(pos)?;
        Ok(self.tree.entry(&cursor)?[0] == 1)
    }

    /// Set bits in `[0, pos)`.
    pub fn rank1(&self, pos: u64) -> Result<u64, TreeError> {
        self.tree.rank(STREAM, 1, pos)
    }

    /// Position of the `nth` (1-based) set bit.
    pub fn select1(&self, nth: u64) -> Result<Option<u64>, TreeError> {
        let cursor = self.tree.select(STREAM, 1, nth)?;
        Ok(cursor.is_valid().then(|| cursor.position()))
    }

    pub fn count_ones(&self) -> Result<u64, TreeError> {
        Ok(self.tree.total()?.get(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_get_rank_select() {
        let mut bits = BitVector::new(TreeConfig::default().with_block_size(256)).expect("bits");
        for i in 0..5000u64 {
            bits.push(i % 5 == 0).expect("push");
        }
        assert_eq!(bits.len().expect("len"), 5000);
        assert!(bits.get(10).expect("get"));
        assert!(!bits.get(11).expect("get"));
        assert_eq!(bits.count_ones().expect("ones"), 1000);
        assert_eq!(bits.rank1(11).expect("rank"), 3);
        assert_eq!(bits.select1(3).expect("select"), Some(10));
        assert_eq!(bits.select1(1000).expect("select"), Some(4995));
        assert_eq!(bits.select1(1001).expect("select"), None);
        bits.tree().check().expect("consistent");
    }

    #[test]
    fn test_insert_shifts_positions() {
        let mut bits = BitVector::new(TreeConfig::default()).expect("bits");
        bits.push(true).expect("push");
        bits.push(true).expect("push");
        bits.insert(1, false).expect("insert");
        assert_eq!(bits.select1(2).expect("select"), Some(2));
        assert_eq!(bits.rank1(2).expect("rank"), 1);
    }
}
