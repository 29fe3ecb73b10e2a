//! Invariant checking for simulation runs.
//!
//! The tree is compared with a [`RowModel`], a plain vector of rows that
//! answers every query by linear scan.

#![allow(clippy::cast_possible_truncation)]

use std::fmt::Debug;

use crate::btree::{Accumulator, Cursor, Schema, Tree, TreeError};
use crate::store::BlockStore;

/// Reference model: the rows in order.
#[derive(Debug, Default, Clone)]
pub struct RowModel {
    rows: Vec<Vec<u64>>,
}

impl RowModel {
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.rows.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<u64>] {
        &self.rows
    }

    pub fn insert(&mut self, pos: u64, row: Vec<u64>) {
        self.rows.insert(pos as usize, row);
    }

    pub fn remove(&mut self, pos: u64) -> Option<Vec<u64>> {
        let pos = pos as usize;
        (pos < self.rows.len()).then(|| self.rows.remove(pos))
    }

    pub fn set(&mut self, pos: u64, row: Vec<u64>) -> Option<Vec<u64>> {
        self.rows
            .get_mut(pos as usize)
            .map(|slot| std::mem::replace(slot, row))
    }

    /// Rows in `[0, pos)` whose `column` holds `symbol`.
    #[must_use]
    pub fn rank(&self, column: usize, symbol: u64, pos: u64) -> u64 {
        self.rows
            .iter()
            .take(pos as usize)
            .filter(|row| row[column] == symbol)
            .count() as u64
    }

    /// Position of the `nth` (1-based) row whose `column` holds `symbol`.
    #[must_use]
    pub fn select(&self, column: usize, symbol: u64, nth: u64) -> Option<u64> {
        let nth = usize::try_from(nth).ok()?.checked_sub(1)?;
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row[column] == symbol)
            .nth(nth)
            .map(|(pos, _)| pos as u64)
    }

    /// First row whose inclusive running sum of `column` reaches `target`,
    /// or exceeds it when `strict`.
    #[must_use]
    pub fn find(&self, column: usize, target: u64, strict: bool) -> Option<u64> {
        let mut running = 0u64;
        for (pos, row) in self.rows.iter().enumerate() {
            running += row[column];
            if (strict && running > target) || (!strict && running >= target) {
                return Some(pos as u64);
            }
        }
        None
    }

    /// Aggregate of every row under `schema`.
    pub fn total(&self, schema: &Schema) -> Result<Accumulator, TreeError> {
        let mut total = Accumulator::zero(schema.accumulator_width());
        for row in &self.rows {
            total.add(&schema.row_accumulator(row)?)?;
        }
        Ok(total)
    }
}

/// An invariant violation detected during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Operation index where it was detected.
    pub operation_index: u64,
    /// Additional context.
    pub context: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "operation {}: {} ({})",
            self.operation_index, self.description, self.context
        )
    }
}

/// Checker for tree invariants.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
    checks_run: u64,
}

impl InvariantChecker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
            checks_run: 0,
        }
    }

    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    #[must_use]
    pub const fn checks_run(&self) -> u64 {
        self.checks_run
    }

    pub fn add_violation(
        &mut self,
        operation_index: u64,
        description: impl Into<String>,
        context: impl Into<String>,
    ) {
        self.violations.push(InvariantViolation {
            description: description.into(),
            operation_index,
            context: context.into(),
        });
    }

    /// Record a violation unless `expected == actual`.
    pub fn expect_eq<T: PartialEq + Debug>(
        &mut self,
        operation_index: u64,
        what: &str,
        expected: T,
        actual: T,
    ) -> bool {
        self.checks_run += 1;
        if expected == actual {
            return true;
        }
        self.add_violation(
            operation_index,
            format!("{what} mismatch"),
            format!("expected {expected:?}, got {actual:?}"),
        );
        false
    }

    /// Structural check plus totals against the model.
    pub fn check_tree<S: BlockStore>(
        &mut self,
        tree: &Tree<S>,
        model: &RowModel,
        operation_index: u64,
    ) {
        self.checks_run += 1;
        if let Err(e) = tree.check() {
            self.add_violation(operation_index, "structure check failed", e.to_string());
        }
        match (model.total(tree.schema()), tree.total()) {
            (Ok(expected), Ok(actual)) => {
                self.expect_eq(operation_index, "total accumulator", expected, actual);
            }
            (Err(e), _) | (_, Err(e)) => {
                self.add_violation(operation_index, "could not compute totals", e.to_string());
            }
        }
    }

    /// The cursor's path spans the tree: one node per level, a leaf at the
    /// bottom and the current root on top.
    pub fn check_path<S: BlockStore>(
        &mut self,
        tree: &Tree<S>,
        cursor: &Cursor,
        operation_index: u64,
    ) {
        self.checks_run += 1;
        match path_problems(tree, cursor) {
            Ok(problems) => {
                for problem in problems {
                    self.add_violation(operation_index, "path invariant broken", problem);
                }
            }
            Err(e) => self.add_violation(operation_index, "could not inspect path", e.to_string()),
        }
    }

    /// Walk every entry and compare rows and cursor prefixes with the model.
    pub fn check_contents<S: BlockStore>(
        &mut self,
        tree: &Tree<S>,
        model: &RowModel,
        operation_index: u64,
    ) {
        self.checks_run += 1;
        if let Err(e) = self.compare_contents(tree, model, operation_index) {
            self.add_violation(operation_index, "could not read contents", e.to_string());
        }
    }

    fn compare_contents<S: BlockStore>(
        &mut self,
        tree: &Tree<S>,
        model: &RowModel,
        operation_index: u64,
    ) -> Result<(), TreeError> {
        let schema = tree.schema();
        let mut prefix = Accumulator::zero(schema.accumulator_width());
        let mut cursor = tree.begin()?;
        for (pos, row) in model.rows().iter().enumerate() {
            if !cursor.is_valid() {
                self.add_violation(
                    operation_index,
                    "tree shorter than model",
                    format!("ran out at {pos} of {}", model.len()),
                );
                return Ok(());
            }
            let actual = tree.entry(&cursor)?;
            let row_ok = self.expect_eq(operation_index, &format!("row {pos}"), row, &actual);
            if !row_ok
                || !self.expect_eq(
                    operation_index,
                    &format!("prefix at {pos}"),
                    &prefix,
                    cursor.prefix(),
                )
            {
                return Ok(());
            }
            prefix.add(&schema.row_accumulator(row)?)?;
            tree.next(&mut cursor)?;
        }
        self.expect_eq(operation_index, "end of contents", true, cursor.is_end());
        Ok(())
    }
}

fn path_problems<S: BlockStore>(tree: &Tree<S>, cursor: &Cursor) -> Result<Vec<String>, TreeError> {
    let path = cursor.path();
    let height = tree.height()?;
    if path.len() != height + 1 {
        return Ok(vec![format!("path has {} levels for height {height}", path.len())]);
    }
    let mut problems = Vec::new();
    if !tree.node(path.leaf()?)?.is_leaf() {
        problems.push("bottom of path is not a leaf".to_string());
    }
    let root = path.root()?;
    if root != tree.root() {
        problems.push(format!("path ends at {root}, tree root is {}", tree.root()));
    } else if !tree.node(root)?.is_root() {
        problems.push("root node lacks the root flag".to_string());
    }
    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RowModel {
        let mut model = RowModel::new();
        for (pos, row) in [[3, 1], [0, 0], [5, 1], [2, 1]].into_iter().enumerate() {
            model.insert(pos as u64, row.to_vec());
        }
        model
    }

    #[test]
    fn test_model_queries() {
        let model = model();
        assert_eq!(model.rank(1, 1, 3), 2);
        assert_eq!(model.select(1, 1, 3), Some(3));
        assert_eq!(model.select(1, 0, 2), None);
        assert_eq!(model.select(1, 1, 0), None);
        assert_eq!(model.find(0, 3, false), Some(0));
        assert_eq!(model.find(0, 3, true), Some(2));
        assert_eq!(model.find(0, 10, true), None);
    }

    #[test]
    fn test_model_edits() {
        let mut model = model();
        assert_eq!(model.set(1, vec![9, 9]), Some(vec![0, 0]));
        assert_eq!(model.remove(0), Some(vec![3, 1]));
        assert_eq!(model.remove(10), None);
        assert_eq!(model.rows()[0], vec![9, 9]);
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn test_expect_eq_records_mismatch() {
        let mut checker = InvariantChecker::new();
        assert!(checker.expect_eq(0, "size", 3, 3));
        assert!(!checker.has_violations());
        assert!(!checker.expect_eq(7, "size", 3, 4));
        let violation = &checker.violations()[0];
        assert_eq!(violation.operation_index, 7);
        assert_eq!(violation.description, "size mismatch");
        assert_eq!(checker.checks_run(), 2);
    }
}
