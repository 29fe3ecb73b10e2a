//! Sorted map from `u64` keys to `u64` values.
//!
//! Keys are stored as deltas from the previous key in a quick-sum tree
//! column, so the running sum of that dimension at an entry is its key and
//! key lookup is a find walk. Values live in a plain array column.

use crate::btree::{Comparison, Cursor, Schema, Tree, TreeError};
use crate::config::TreeConfig;
use crate::packed::StreamSpec;
use crate::store::{BlockStore, MemoryStore};

/// Accumulator dimension carrying key sums.
const KEY_DIM: usize = 1;

const DELTA_COLUMN: usize = 0;
const VALUE_COLUMN: usize = 1;

pub struct OrderedMap<S: BlockStore = MemoryStore> {
    tree: Tree<S>,
}

impl OrderedMap<MemoryStore> {
    pub fn new(config: TreeConfig) -> Result<Self, TreeError> {
        Self::with_store(MemoryStore::new(config.block_size), config)
    }
}

impl<S: BlockStore> OrderedMap<S> {
    pub fn with_store(store: S, config: TreeConfig) -> Result<Self, TreeError> {
        let schema = Schema::new(vec![
            StreamSpec::SumTree { columns: 1 },
            StreamSpec::Array {
                columns: 1,
                indexed: false,
            },
        ])?;
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

    fn read(&self, cursor: &Cursor) -> Result<(u64, u64), TreeError> {
        let key = self.tree.key(cursor, KEY_DIM)?;
        let value = self.tree.entry(cursor)?[VALUE_COLUMN];
        Ok((key, value))
    }

    pub fn get(&self, key: u64) -> Result<Option<u64>, TreeError> {
        let cursor = self.tree.find(KEY_DIM, key, Comparison::Eq)?;
        if !cursor.is_valid() {
            return Ok(None);
        }
        Ok(Some(self.tree.entry(&cursor)?[VALUE_COLUMN]))
    }

    /// Insert or overwrite. Returns the previous value.
    pub fn insert(&mut self, key: u64, value: u64) -> Result<Option<u64>, TreeError> {
        let mut cursor = self.tree.find(KEY_DIM, key, Comparison::Ge)?;
        let previous_key = cursor.prefix().get(KEY_DIM);

        if cursor.is_valid() {
            let row = self.tree.entry(&cursor)?;
            let successor = previous_key + row[DELTA_COLUMN];
            if successor == key {
                self.tree.ctr_set(&cursor, &[row[DELTA_COLUMN], value])?;
                return Ok(Some(row[VALUE_COLUMN]));
            }
            // Rebase the successor onto the new key before inserting ahead of
            // it; put the old delta back if the insert fails.
            let position = cursor.position();
            self.tree
                .ctr_set(&cursor, &[successor - key, row[VALUE_COLUMN]])?;
            if let Err(e) = self
                .tree
                .ctr_insert(&mut cursor, &[key - previous_key, value])
            {
                let cursor = self.tree.seek(position)?;
                self.tree.ctr_set(&cursor, &row)?;
                return Err(e);
            }
            return Ok(None);
        }
        self.tree
            .ctr_insert(&mut cursor, &[key - previous_key, value])?;
        Ok(None)
    }

    /// Remove a key. Returns its value.
    pub fn remove(&mut self, key: u64) -> Result<Option<u64>, TreeError> {
        let mut cursor = self.tree.find(KEY_DIM, key, Comparison::Eq)?;
        if !cursor.is_valid() {
            return Ok(None);
        }
        let row = self.tree.entry(&cursor)?;
        self.tree.ctr_remove(&mut cursor)?;
        if cursor.is_valid() {
            let next = self.tree.entry(&cursor)?;
            self.tree.ctr_set(
                &cursor,
                &[next[DELTA_COLUMN] + row[DELTA_COLUMN], next[VALUE_COLUMN]],
            )?;
        }
        Ok(Some(row[VALUE_COLUMN]))
    }

    /// Entries with keys in `[from, to)`, in key order.
    pub fn range(&self, from: u64, to: u64) -> Result<Vec<(u64, u64)>, TreeError> {
        let mut out = Vec::new();
        let mut cursor = self.tree.find(KEY_DIM, from, Comparison::Ge)?;
        while cursor.is_valid() {
            let (key, value) = self.read(&cursor)?;
            if key >= to {
                break;
            }
            out.push((key, value));
            self.tree.next(&mut cursor)?;
        }
        Ok(out)
    }

    /// Number of keys below `key`.
    pub fn rank_of_key(&self, key: u64) -> Result<u64, TreeError> {
        Ok(self.tree.find(KEY_DIM, key, Comparison::Ge)?.position())
    }

    /// The `n`th entry in key order, 0-based.
    pub fn nth(&self, n: u64) -> Result<Option<(u64, u64)>, TreeError> {
        if n >= self.len()? {
            return Ok(None);
        }
        let cursor = self.tree.seek(n)?;
        self.read(&cursor).map(Some)
    }

    /// Greatest entry with a key at most `key`.
    pub fn floor(&self, key: u64) -> Result<Option<(u64, u64)>, TreeError> {
        let cursor = self.tree.find(KEY_DIM, key, Comparison::Le)?;
        if !cursor.is_valid() {
            return Ok(None);
        }
        self.read(&cursor).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::packed::Block;
    use crate::store::{NodeId, StoreError};

    fn small_map() -> OrderedMap {
        OrderedMap::new(TreeConfig::default().with_block_size(256)).expect("map")
    }

    #[test]
    fn test_upsert_and_get() {
        let mut map = small_map();
        assert_eq!(map.insert(20, 200).expect("insert"), None);
        assert_eq!(map.insert(10, 100).expect("insert"), None);
        assert_eq!(map.insert(30, 300).expect("insert"), None);
        assert_eq!(map.insert(20, 201).expect("insert"), Some(200));

        assert_eq!(map.get(10).expect("get"), Some(100));
        assert_eq!(map.get(20).expect("get"), Some(201));
        assert_eq!(map.get(25).expect("get"), None);
        assert_eq!(map.len().expect("len"), 3);
    }

    #[test]
    fn test_zero_key() {
        let mut map = small_map();
        map.insert(5, 50).expect("insert");
        map.insert(0, 1).expect("insert");
        assert_eq!(map.get(0).expect("get"), Some(1));
        assert_eq!(map.get(5).expect("get"), Some(50));
        assert_eq!(map.remove(0).expect("remove"), Some(1));
        assert_eq!(map.get(5).expect("get"), Some(50));
    }

    #[test]
    fn test_keys_across_full_range() {
        let mut map = small_map();
        assert_eq!(map.insert(u64::MAX, 1).expect("insert"), None);
        assert_eq!(map.insert(5, 2).expect("insert"), None);
        assert_eq!(map.insert(u64::MAX - 1, 3).expect("insert"), None);
        assert_eq!(map.insert(1 << 63, 4).expect("insert"), None);

        assert_eq!(map.get(u64::MAX).expect("get"), Some(1));
        assert_eq!(map.get(u64::MAX - 1).expect("get"), Some(3));
        assert_eq!(map.get(1 << 63).expect("get"), Some(4));
        assert_eq!(map.nth(3).expect("nth"), Some((u64::MAX, 1)));
        assert_eq!(map.rank_of_key(u64::MAX).expect("rank"), 3);
        map.tree().check().expect("consistent");

        assert_eq!(map.remove(5).expect("remove"), Some(2));
        assert_eq!(map.nth(0).expect("nth"), Some((1 << 63, 4)));
        assert_eq!(map.insert(u64::MAX, 9).expect("insert"), Some(1));
        map.tree().check().expect("consistent");
    }

    /// Memory store that can be told to refuse new blocks.
    #[derive(Debug)]
    struct RefusingStore {
        inner: MemoryStore,
        refuse: Rc<Cell<bool>>,
    }

    impl BlockStore for RefusingStore {
        fn resolve(&self, id: NodeId) -> Result<&Block, StoreError> {
            self.inner.resolve(id)
        }

        fn resolve_mut(&mut self, id: NodeId) -> Result<&mut Block, StoreError> {
            self.inner.resolve_mut(id)
        }

        fn allocate_block(&mut self, size: usize) -> Result<NodeId, StoreError> {
            if self.refuse.get() {
                return Err(StoreError::Exhausted);
            }
            self.inner.allocate_block(size)
        }

        fn release(&mut self, id: NodeId) -> Result<(), StoreError> {
            self.inner.release(id)
        }

        fn live_blocks(&self) -> usize {
            self.inner.live_blocks()
        }
    }

    #[test]
    fn test_failed_insert_restores_successor() {
        let refuse = Rc::new(Cell::new(false));
        let store = RefusingStore {
            inner: MemoryStore::new(256),
            refuse: Rc::clone(&refuse),
        };
        let config = TreeConfig::default().with_block_size(256);
        let mut map = OrderedMap::with_store(store, config).expect("map");
        let mut model = BTreeMap::new();
        for key in (0..100).map(|i| i * 10) {
            map.insert(key, key).expect("insert");
            model.insert(key, key);
        }

        // Fill the gap below 10 until the leaf needs a split it cannot get.
        refuse.set(true);
        let mut error = None;
        for key in 1..10 {
            match map.insert(key, key) {
                Ok(_) => {
                    model.insert(key, key);
                }
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }
        assert_eq!(
            error,
            Some(TreeError::Store(StoreError::Exhausted)),
            "the leaf never filled up"
        );

        assert_eq!(map.get(10).expect("get"), Some(10));
        let expected: Vec<_> = model.into_iter().collect();
        assert_eq!(map.range(0, u64::MAX).expect("range"), expected);
        map.tree().check().expect("consistent");
    }

    #[test]
    fn test_range_rank_and_nth() {
        let mut map = small_map();
        for key in (0..100).map(|i| i * 3) {
            map.insert(key, key + 1).expect("insert");
        }
        let range = map.range(10, 20).expect("range");
        assert_eq!(range, vec![(12, 13), (15, 16), (18, 19)]);
        assert_eq!(map.rank_of_key(10).expect("rank"), 4);
        assert_eq!(map.nth(4).expect("nth"), Some((12, 13)));
        assert_eq!(map.nth(100).expect("nth"), None);
        assert_eq!(map.floor(11).expect("floor"), Some((9, 10)));
        map.tree().check().expect("consistent");
    }

    #[test]
    fn test_matches_btreemap_under_random_edits() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut map = small_map();
        let mut model = BTreeMap::new();
        for _ in 0..1500 {
            let key = rng.random_range(0..400u64);
            if rng.random_bool(0.65) {
                let value = rng.random_range(0..1000u64);
                assert_eq!(map.insert(key, value).expect("insert"), model.insert(key, value));
            } else {
                assert_eq!(map.remove(key).expect("remove"), model.remove(&key));
            }
        }
        map.tree().check().expect("consistent");
        let all = map.range(0, u64::MAX).expect("range");
        let expected: Vec<_> = model.into_iter().collect();
        assert_eq!(all, expected);
    }
}
