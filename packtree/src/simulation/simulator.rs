//! Main simulator harness.

#![allow(clippy::cast_possible_truncation)]

use tracing::{debug, info};

use super::invariants::{InvariantChecker, InvariantViolation, RowModel};
use super::workload::{
    Operation, WEIGHT_DIM, WEIGHT_STREAM, WorkloadConfig, WorkloadGenerator, simulation_schema,
};
use crate::btree::{Comparison, CursorState, Tree, TreeError, TreeStats};
use crate::config::TreeConfig;
use crate::store::MemoryStore;

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    pub tree: TreeConfig,
    pub workload: WorkloadConfig,
    /// Full content comparison every this many operations; 0 only at the end.
    pub content_check_interval: u64,
}

impl SimulatorConfig {
    /// Small blocks so that short runs still build deep trees.
    pub const DEFAULT_BLOCK_SIZE: usize = 512;

    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tree: TreeConfig::default().with_block_size(Self::DEFAULT_BLOCK_SIZE),
            workload: WorkloadConfig::default(),
            content_check_interval: 64,
        }
    }

    #[must_use]
    pub const fn with_tree_config(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    #[must_use]
    pub const fn with_workload_config(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Set the probability of generating out-of-range rows.
    #[must_use]
    pub const fn with_invalid_rate(mut self, rate: f64) -> Self {
        self.workload.invalid_rate = rate;
        self
    }

    #[must_use]
    pub const fn with_content_check_interval(mut self, interval: u64) -> Self {
        self.content_check_interval = interval;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    pub seed: u64,
    pub operations_run: u64,
    /// Operations the tree accepted.
    pub successful_operations: u64,
    /// Operations rejected as expected (invalid rows).
    pub rejected_operations: u64,
    pub invariant_violations: Vec<InvariantViolation>,
    /// Whether the run got through every operation.
    pub completed_successfully: bool,
    pub error: Option<String>,
    /// Shape of the tree at the end of the run.
    pub stats: Option<TreeStats>,
}

impl SimulationResult {
    /// Check if the simulation passed (no invariant violations).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.completed_successfully && self.invariant_violations.is_empty()
    }
}

pub struct Simulator {
    config: SimulatorConfig,
    generator: WorkloadGenerator,
    checker: InvariantChecker,
    model: RowModel,
    operations_run: u64,
    successful_operations: u64,
    rejected_operations: u64,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = WorkloadGenerator::with_config(config.seed, config.workload.clone());
        Self {
            config,
            generator,
            checker: InvariantChecker::new(),
            model: RowModel::new(),
            operations_run: 0,
            successful_operations: 0,
            rejected_operations: 0,
        }
    }

    /// Run `operations` operations on a fresh tree, checking invariants
    /// after each one.
    pub fn run(&mut self, operations: usize) -> SimulationResult {
        let tree = simulation_schema()
            .map_err(TreeError::from)
            .and_then(|schema| {
                Tree::create(
                    MemoryStore::new(self.config.tree.block_size),
                    schema,
                    self.config.tree,
                )
            });
        let mut tree = match tree {
            Ok(tree) => tree,
            Err(e) => {
                let error = format!("failed to create tree: {e}");
                return self.result(false, Some(error), None);
            }
        };

        for _ in 0..operations {
            let index = self.operations_run;
            let operation = self.generator.next_operation(self.model.len());
            self.operations_run += 1;

            match self.apply(&mut tree, &operation, index) {
                Ok(true) => self.successful_operations += 1,
                Ok(false) => {
                    debug!(index, ?operation, "operation rejected");
                    self.rejected_operations += 1;
                }
                Err(e) => self.checker.add_violation(
                    index,
                    "operation failed",
                    format!("{operation:?}: {e}"),
                ),
            }

            self.checker.check_tree(&tree, &self.model, index);
            let interval = self.config.content_check_interval;
            if interval > 0 && index.is_multiple_of(interval) {
                self.checker.check_contents(&tree, &self.model, index);
            }
        }
        self.checker
            .check_contents(&tree, &self.model, self.operations_run);

        let stats = tree.stats().ok();
        info!(
            seed = self.config.seed,
            operations = self.operations_run,
            entries = self.model.len(),
            height = stats.as_ref().map_or(0, |s| s.height),
            violations = self.checker.violations().len(),
            "simulation finished"
        );
        self.result(true, None, stats)
    }

    fn result(
        &self,
        completed: bool,
        error: Option<String>,
        stats: Option<TreeStats>,
    ) -> SimulationResult {
        SimulationResult {
            seed: self.config.seed,
            operations_run: self.operations_run,
            successful_operations: self.successful_operations,
            rejected_operations: self.rejected_operations,
            invariant_violations: self.checker.violations().to_vec(),
            completed_successfully: completed,
            error,
            stats,
        }
    }

    /// Apply one operation to the tree and the model. `Ok(false)` means the
    /// tree rejected an invalid row as it should.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn apply(
        &mut self,
        tree: &mut Tree<MemoryStore>,
        operation: &Operation,
        index: u64,
    ) -> Result<bool, TreeError> {
        let checker = &mut self.checker;
        let model = &mut self.model;

        match operation {
            Operation::Insert { pos, row } => {
                let valid = tree.schema().validate_row(row).is_ok();
                let mut cursor = tree.seek(*pos)?;
                let result = tree.ctr_insert(&mut cursor, row);
                if !valid {
                    if result.is_ok() {
                        checker.add_violation(index, "invalid row accepted", format!("{row:?}"));
                    }
                    return Ok(false);
                }
                result?;
                model.insert(*pos, row.clone());
                checker.expect_eq(index, "cursor after insert", *pos, cursor.position());
                checker.check_path(tree, &cursor, index);
            }
            Operation::Remove { pos } => {
                let mut cursor = tree.seek(*pos)?;
                let row = tree.entry(&cursor)?;
                tree.ctr_remove(&mut cursor)?;
                let expected = model.remove(*pos);
                checker.expect_eq(index, "removed row", expected, Some(row));
                checker.expect_eq(index, "cursor after remove", *pos, cursor.position());
                checker.check_path(tree, &cursor, index);
            }
            Operation::Set { pos, row } => {
                let valid = tree.schema().validate_row(row).is_ok();
                let cursor = tree.seek(*pos)?;
                let result = tree.ctr_set(&cursor, row);
                if !valid {
                    if result.is_ok() {
                        checker.add_violation(index, "invalid row accepted", format!("{row:?}"));
                    }
                    return Ok(false);
                }
                result?;
                model.set(*pos, row.clone());
            }
            Operation::Rank { stream, symbol, pos } => {
                let actual = tree.rank(*stream, *symbol, *pos)?;
                let expected = model.rank(*stream, *symbol, *pos);
                checker.expect_eq(index, "rank", expected, actual);
            }
            Operation::Select { stream, symbol, nth } => {
                let cursor = tree.select(*stream, *symbol, *nth)?;
                let actual = cursor.is_valid().then(|| cursor.position());
                let expected = model.select(*stream, *symbol, *nth);
                checker.expect_eq(index, "select", expected, actual);
            }
            Operation::FindWeight { target, strict } => {
                let comparison = if *strict { Comparison::Gt } else { Comparison::Ge };
                let cursor = tree.find(WEIGHT_DIM, *target, comparison)?;
                let actual = cursor.is_valid().then(|| cursor.position());
                let expected = model.find(WEIGHT_STREAM, *target, *strict);
                checker.expect_eq(index, "find by weight", expected, actual);
            }
            Operation::Skip { from, offset } => {
                let mut cursor = tree.seek(*from)?;
                let covered = tree.skip(&mut cursor, *offset)?;

                let len = model.len() as i64;
                let target = (*from as i64 + offset).clamp(-1, len);
                let (state, position) = if target == len {
                    (CursorState::End, len as u64)
                } else if target < 0 {
                    (CursorState::BeforeBegin, 0)
                } else {
                    (CursorState::Valid, target as u64)
                };
                let distance = target.abs_diff(*from as i64);
                checker.expect_eq(index, "skip distance", distance, covered);
                checker.expect_eq(index, "skip state", state, cursor.state());
                checker.expect_eq(index, "skip position", position, cursor.position());
                checker.check_path(tree, &cursor, index);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_basic() {
        let mut simulator = Simulator::new(SimulatorConfig::new(12345));
        let result = simulator.run(300);

        assert!(result.completed_successfully);
        assert_eq!(result.operations_run, 300);
        assert_eq!(result.successful_operations + result.rejected_operations, 300);
        assert!(result.passed(), "violations: {:?}", result.invariant_violations);
    }

    #[test]
    fn test_simulator_with_invalid_rows() {
        let config = SimulatorConfig::new(12345).with_invalid_rate(0.3);
        let mut simulator = Simulator::new(config);
        let result = simulator.run(300);

        assert!(result.passed(), "violations: {:?}", result.invariant_violations);
        assert!(result.rejected_operations > 0);
    }

    #[test]
    fn test_simulator_deterministic() {
        let first = Simulator::new(SimulatorConfig::new(777)).run(200);
        let second = Simulator::new(SimulatorConfig::new(777)).run(200);

        assert_eq!(first.successful_operations, second.successful_operations);
        assert_eq!(first.rejected_operations, second.rejected_operations);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_simulator_without_merges() {
        let tree = TreeConfig::default()
            .with_block_size(SimulatorConfig::DEFAULT_BLOCK_SIZE)
            .with_merge_threshold(0);
        let config = SimulatorConfig::new(2024).with_tree_config(tree);
        let result = Simulator::new(config).run(400);

        assert!(result.passed(), "violations: {:?}", result.invariant_violations);
    }

    #[test]
    fn test_rejects_tiny_blocks() {
        let tree = TreeConfig::default().with_block_size(128);
        let result = Simulator::new(SimulatorConfig::new(1).with_tree_config(tree)).run(10);

        assert!(!result.completed_successfully);
        assert!(result.error.is_some());
    }

    #[test]
    #[ignore] // Long running test
    fn test_simulator_stress() {
        let config = SimulatorConfig::new(99999).with_invalid_rate(0.05);
        let result = Simulator::new(config).run(20_000);

        assert!(result.passed(), "violations: {:?}", result.invariant_violations);
    }
}
