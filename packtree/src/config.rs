//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `PACKTREE_BLOCK_SIZE`: node block size in bytes (default: `4096`)
//! - `PACKTREE_MERGE_THRESHOLD`: percent of a node's client area below which
//!   a node is merged with a sibling after a removal; `0` disables merging
//!   (default: `50`)
//! - `PACKTREE_SEED`: simulation seed (default: `42`)
//! - `PACKTREE_OPS`: simulation operation count (default: `10000`)
//!
//! # Invariants
//!
//! - `block_size` is a multiple of 8 within `MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE`
//! - `merge_threshold_percent` is at most 100

/// Tree configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Size of every node block.
    pub block_size: usize,
    /// Merge trigger as a percentage of the client area; 0 disables merging.
    pub merge_threshold_percent: u8,
}

/// Error returned when loading or validating configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            merge_threshold_percent: Self::DEFAULT_MERGE_THRESHOLD,
        }
    }
}

impl TreeConfig {
    pub const DEFAULT_BLOCK_SIZE: usize = 4096;
    pub const DEFAULT_MERGE_THRESHOLD: u8 = 50;
    pub const MIN_BLOCK_SIZE: usize = 128;
    pub const MAX_BLOCK_SIZE: usize = 1 << 20;

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unparsable or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            block_size: load_or(&lookup, "PACKTREE_BLOCK_SIZE", Self::DEFAULT_BLOCK_SIZE)?,
            merge_threshold_percent: load_or(
                &lookup,
                "PACKTREE_MERGE_THRESHOLD",
                Self::DEFAULT_MERGE_THRESHOLD,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub const fn with_merge_threshold(mut self, percent: u8) -> Self {
        self.merge_threshold_percent = percent;
        self
    }

    /// Check the invariants listed in the module docs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(Self::MIN_BLOCK_SIZE..=Self::MAX_BLOCK_SIZE).contains(&self.block_size)
            || !self.block_size.is_multiple_of(8)
        {
            return Err(ConfigError::InvalidValue {
                name: "PACKTREE_BLOCK_SIZE".to_string(),
                message: format!(
                    "{} must be a multiple of 8 between {} and {}",
                    self.block_size,
                    Self::MIN_BLOCK_SIZE,
                    Self::MAX_BLOCK_SIZE
                ),
            });
        }
        if self.merge_threshold_percent > 100 {
            return Err(ConfigError::InvalidValue {
                name: "PACKTREE_MERGE_THRESHOLD".to_string(),
                message: format!("{} is not a percentage", self.merge_threshold_percent),
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn merges_enabled(&self) -> bool {
        self.merge_threshold_percent > 0
    }
}

/// Settings for the simulation binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub tree: TreeConfig,
    pub seed: u64,
    pub operations: usize,
}

impl RunConfig {
    pub const DEFAULT_SEED: u64 = 42;
    pub const DEFAULT_OPERATIONS: usize = 10_000;

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            tree: TreeConfig::from_lookup(&lookup)?,
            seed: load_or(&lookup, "PACKTREE_SEED", Self::DEFAULT_SEED)?,
            operations: load_or(&lookup, "PACKTREE_OPS", Self::DEFAULT_OPERATIONS)?,
        })
    }
}

/// Parse a variable, falling back to `default` when unset.
fn load_or<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a valid number"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TreeConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, TreeConfig::default());
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.merge_threshold_percent, 50);
        assert!(config.merges_enabled());
    }

    #[test]
    fn test_overrides() {
        let config = RunConfig::from_lookup(lookup(&[
            ("PACKTREE_BLOCK_SIZE", "512"),
            ("PACKTREE_MERGE_THRESHOLD", "0"),
            ("PACKTREE_SEED", "7"),
            ("PACKTREE_OPS", " 250 "),
        ]))
        .expect("config");
        assert_eq!(config.tree.block_size, 512);
        assert!(!config.tree.merges_enabled());
        assert_eq!(config.seed, 7);
        assert_eq!(config.operations, 250);
    }

    #[test]
    fn test_invalid_values() {
        let err = TreeConfig::from_lookup(lookup(&[("PACKTREE_BLOCK_SIZE", "abc")]))
            .expect_err("unparsable");
        assert_eq!(
            err.to_string(),
            "invalid value for PACKTREE_BLOCK_SIZE: 'abc' is not a valid number"
        );
        assert!(TreeConfig::from_lookup(lookup(&[("PACKTREE_BLOCK_SIZE", "1000")])).is_ok());
        assert!(TreeConfig::from_lookup(lookup(&[("PACKTREE_BLOCK_SIZE", "1001")])).is_err());
        assert!(TreeConfig::from_lookup(lookup(&[("PACKTREE_BLOCK_SIZE", "64")])).is_err());
        assert!(TreeConfig::from_lookup(lookup(&[("PACKTREE_MERGE_THRESHOLD", "101")])).is_err());
    }

    #[test]
    fn test_builders() {
        let config = TreeConfig::default()
            .with_block_size(256)
            .with_merge_threshold(25);
        assert_eq!(config.block_size, 256);
        assert_eq!(config.merge_threshold_percent, 25);
        assert!(config.validate().is_ok());
    }
}
