//! Per-subtree aggregates and the signed deltas that keep them current.

/// Aggregate statistics of a subtree, one value per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accumulator(Vec<u64>);

impl Accumulator {
    #[must_use]
    pub fn zero(width: usize) -> Self {
        Self(vec![0; width])
    }

    #[must_use]
    pub const fn from_vec(values: Vec<u64>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// Value of one dimension; zero past the end.
    #[must_use]
    pub fn get(&self, dim: usize) -> u64 {
        self.0.get(dim).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u64> {
        self.0
    }

    fn check_width(&self, width: usize) -> Result<(), AccumulatorError> {
        if self.0.len() != width {
            return Err(AccumulatorError::WidthMismatch {
                expected: self.0.len(),
                actual: width,
            });
        }
        Ok(())
    }

    /// Combine with `other` dimension by dimension. Leaves `self` unchanged
    /// on error.
    fn combine(
        &mut self,
        other: &[u64],
        op: impl Fn(u64, u64) -> Option<u64>,
    ) -> Result<(), AccumulatorError> {
        self.check_width(other.len())?;
        let combined = self
            .0
            .iter()
            .zip(other)
            .enumerate()
            .map(|(dim, (&a, &b))| op(a, b).ok_or(AccumulatorError::Overflow { dim }))
            .collect::<Result<Vec<_>, _>>()?;
        self.0 = combined;
        Ok(())
    }

    pub fn add(&mut self, other: &Self) -> Result<(), AccumulatorError> {
        self.combine(&other.0, u64::checked_add)
    }

    pub fn sub(&mut self, other: &Self) -> Result<(), AccumulatorError> {
        self.combine(&other.0, u64::checked_sub)
    }

    /// Apply a signed delta, failing if any dimension leaves the u64 range.
    pub fn apply(&mut self, delta: &AccumulatorDelta) -> Result<(), AccumulatorError> {
        self.check_width(delta.width())?;
        let applied = self
            .0
            .iter()
            .zip(&delta.0)
            .enumerate()
            .map(|(dim, (&value, &change))| {
                u64::try_from(i128::from(value) + change)
                    .map_err(|_| AccumulatorError::Overflow { dim })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.0 = applied;
        Ok(())
    }
}

/// Signed per-dimension change to an [`Accumulator`].
///
/// Each dimension is an `i128` so that any transition between two `u64`
/// values is representable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccumulatorDelta(Vec<i128>);

impl AccumulatorDelta {
    #[must_use]
    pub fn zero(width: usize) -> Self {
        Self(vec![0; width])
    }

    #[must_use]
    pub const fn from_vec(values: Vec<i128>) -> Self {
        Self(values)
    }

    /// The change that turns `from` into `to`.
    pub fn between(from: &Accumulator, to: &Accumulator) -> Result<Self, AccumulatorError> {
        from.check_width(to.width())?;
        Ok(Self(
            from.0
                .iter()
                .zip(&to.0)
                .map(|(&a, &b)| i128::from(b) - i128::from(a))
                .collect(),
        ))
    }

    /// Delta adding `acc`.
    pub fn adding(acc: &Accumulator) -> Result<Self, AccumulatorError> {
        Self::between(&Accumulator::zero(acc.width()), acc)
    }

    /// Delta removing `acc`.
    pub fn removing(acc: &Accumulator) -> Result<Self, AccumulatorError> {
        Self::between(acc, &Accumulator::zero(acc.width()))
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, dim: usize) -> i128 {
        self.0.get(dim).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[i128] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorError {
    /// A dimension over- or underflowed.
    Overflow { dim: usize },
    WidthMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for AccumulatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow { dim } => write!(f, "accumulator dimension {dim} overflowed"),
            Self::WidthMismatch { expected, actual } => {
                write!(f, "accumulator width {actual} does not match {expected}")
            }
        }
    }
}

impl std::error::Error for AccumulatorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub() {
        let mut acc = Accumulator::from_vec(vec![1, 10, 0]);
        acc.add(&Accumulator::from_vec(vec![2, 5, 1])).expect("add");
        assert_eq!(acc.as_slice(), &[3, 15, 1]);
        acc.sub(&Accumulator::from_vec(vec![3, 0, 1])).expect("sub");
        assert_eq!(acc.as_slice(), &[0, 15, 0]);
        assert_eq!(
            acc.sub(&Accumulator::from_vec(vec![1, 0, 0])),
            Err(AccumulatorError::Overflow { dim: 0 })
        );
        assert!(acc.add(&Accumulator::zero(2)).is_err());
    }

    #[test]
    fn test_delta_between_and_apply() {
        let from = Accumulator::from_vec(vec![4, 100, 7]);
        let to = Accumulator::from_vec(vec![5, 90, 7]);
        let delta = AccumulatorDelta::between(&from, &to).expect("delta");
        assert_eq!(delta.as_slice(), &[1, -10, 0]);

        let mut acc = from;
        acc.apply(&delta).expect("apply");
        assert_eq!(acc, to);

        let mut small = Accumulator::from_vec(vec![0, 5, 0]);
        assert_eq!(
            small.apply(&delta),
            Err(AccumulatorError::Overflow { dim: 1 })
        );
        assert_eq!(small.as_slice(), &[0, 5, 0], "failed apply changes nothing");
    }

    #[test]
    fn test_adding_and_removing_cancel() {
        let row = Accumulator::from_vec(vec![1, 3, 0, 1]);
        let mut acc = Accumulator::from_vec(vec![10, 20, 30, 40]);
        acc.apply(&AccumulatorDelta::adding(&row).expect("delta"))
            .expect("apply");
        acc.apply(&AccumulatorDelta::removing(&row).expect("delta"))
            .expect("apply");
        assert_eq!(acc.as_slice(), &[10, 20, 30, 40]);
        assert!(AccumulatorDelta::zero(3).is_zero());
    }

    #[test]
    fn test_full_range_deltas() {
        let low = Accumulator::from_vec(vec![0, u64::MAX]);
        let high = Accumulator::from_vec(vec![u64::MAX, 0]);
        let delta = AccumulatorDelta::between(&low, &high).expect("delta");
        assert_eq!(
            delta.as_slice(),
            &[i128::from(u64::MAX), -i128::from(u64::MAX)]
        );

        let mut acc = low;
        acc.apply(&delta).expect("apply");
        assert_eq!(acc, high);
        assert_eq!(
            acc.apply(&delta),
            Err(AccumulatorError::Overflow { dim: 0 })
        );
        assert_eq!(acc, high);
    }
}
