//! Deterministic simulation testing.
//!
//! A seeded workload of inserts, removals, updates and queries runs against
//! a tree and a plain row model side by side. After every operation the
//! checker validates the tree's structure and accumulators and compares
//! query results with the model.
//!
//! # Usage
//!
//! ```ignore
//! use packtree::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_invalid_rate(0.05);
//! let mut sim = Simulator::new(config);
//! let result = sim.run(1000);
//!
//! assert!(result.invariant_violations.is_empty());
//! ```
//!
//! Given the same seed and configuration, two runs perform the same
//! operations and produce the same result.

mod invariants;
mod simulator;
mod workload;

pub use invariants::{InvariantChecker, InvariantViolation, RowModel};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
pub use workload::{Operation, WorkloadConfig, WorkloadGenerator, simulation_schema};
