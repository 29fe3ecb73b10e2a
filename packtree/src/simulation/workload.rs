//! Reproducible operation sequences for simulation runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::btree::{Schema, SchemaError};
use crate::packed::StreamSpec;

/// Stream holding per-entry weights.
pub const WEIGHT_STREAM: usize = 0;
/// Bitmap stream.
pub const BIT_STREAM: usize = 1;
/// Two-bit symbol stream.
pub const SYMBOL_STREAM: usize = 2;

/// Accumulator dimension of the weight sums.
pub const WEIGHT_DIM: usize = 1;

const SYMBOL_BITS: u8 = 2;

/// One weight column, one bit and one two-bit symbol per entry.
pub fn simulation_schema() -> Result<Schema, SchemaError> {
    Schema::new(vec![
        StreamSpec::SumTree { columns: 1 },
        StreamSpec::Bitmap,
        StreamSpec::Sequence { bits: SYMBOL_BITS },
    ])
}

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub insert_weight: u32,
    pub remove_weight: u32,
    pub set_weight: u32,
    pub query_weight: u32,
    /// Exclusive bound on generated entry weights.
    pub max_weight: u64,
    /// Probability that an insert or set carries an out-of-range row.
    pub invalid_rate: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            insert_weight: 5,
            remove_weight: 3,
            set_weight: 2,
            query_weight: 4,
            max_weight: 100,
            invalid_rate: 0.0,
        }
    }
}

/// A single simulated operation. Positions are absolute entry indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert { pos: u64, row: Vec<u64> },
    Remove { pos: u64 },
    Set { pos: u64, row: Vec<u64> },
    Rank { stream: usize, symbol: u64, pos: u64 },
    Select { stream: usize, symbol: u64, nth: u64 },
    /// First entry whose running weight reaches (or, if `strict`, exceeds)
    /// `target`.
    FindWeight { target: u64, strict: bool },
    Skip { from: u64, offset: i64 },
}

/// Generator of random operations.
///
/// Produces the same sequence for the same seed and configuration.
pub struct WorkloadGenerator {
    rng: StdRng,
    config: WorkloadConfig,
}

impl WorkloadGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Next operation against a tree of `len` entries.
    pub fn next_operation(&mut self, len: u64) -> Operation {
        let WorkloadConfig {
            insert_weight,
            remove_weight,
            set_weight,
            query_weight,
            ..
        } = self.config;
        let total = insert_weight + remove_weight + set_weight + query_weight;
        let mut pick = self.rng.random_range(0..total.max(1));

        if len == 0 || pick < insert_weight {
            let pos = self.rng.random_range(0..=len);
            return Operation::Insert {
                pos,
                row: self.row(),
            };
        }
        pick -= insert_weight;
        if pick < remove_weight {
            return Operation::Remove {
                pos: self.rng.random_range(0..len),
            };
        }
        pick -= remove_weight;
        if pick < set_weight {
            let pos = self.rng.random_range(0..len);
            return Operation::Set {
                pos,
                row: self.row(),
            };
        }
        self.query(len)
    }

    fn query(&mut self, len: u64) -> Operation {
        match self.rng.random_range(0..4) {
            0 => {
                let (stream, symbol) = self.symbol();
                Operation::Rank {
                    stream,
                    symbol,
                    pos: self.rng.random_range(0..=len),
                }
            }
            1 => {
                let (stream, symbol) = self.symbol();
                Operation::Select {
                    stream,
                    symbol,
                    nth: self.rng.random_range(1..=len + 1),
                }
            }
            2 => Operation::FindWeight {
                target: self.rng.random_range(0..=len * self.config.max_weight / 2 + 1),
                strict: self.rng.random_bool(0.5),
            },
            _ => {
                let reach = i64::try_from(len).unwrap_or(i64::MAX / 2) + 2;
                Operation::Skip {
                    from: self.rng.random_range(0..=len),
                    offset: self.rng.random_range(-reach..=reach),
                }
            }
        }
    }

    fn symbol(&mut self) -> (usize, u64) {
        if self.rng.random_bool(0.5) {
            (BIT_STREAM, self.rng.random_range(0..2))
        } else {
            (SYMBOL_STREAM, self.rng.random_range(0..1 << SYMBOL_BITS))
        }
    }

    fn row(&mut self) -> Vec<u64> {
        let mut row = vec![
            self.rng.random_range(0..self.config.max_weight.max(1)),
            self.rng.random_range(0..2),
            self.rng.random_range(0..1 << SYMBOL_BITS),
        ];
        if self.rng.random_bool(self.config.invalid_rate) {
            // Out of range for the bitmap or the symbol stream.
            let column = self.rng.random_range(BIT_STREAM..=SYMBOL_STREAM);
            row[column] = 1 << SYMBOL_BITS;
        }
        row
    }
}
