//! Tree schema: the ordered list of leaf streams and the accumulator
//! dimensions they contribute.
//!
//! Dimension 0 always counts entries. Each stream then contributes
//! `StreamSpec::indexes()` consecutive dimensions, in stream order.

use std::ops::Range;

use crate::btree::accumulator::Accumulator;
use crate::packed::{StreamError, StreamSpec};

/// Streams a leaf can hold; one bit each in the node's stream mask.
pub const MAX_STREAMS: usize = 32;

/// Widest accumulator a branch can store (one sum-tree column per dimension).
pub const MAX_ACCUMULATOR_WIDTH: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    streams: Vec<StreamSpec>,
    /// First accumulator dimension of each stream.
    dims: Vec<usize>,
    /// First row column of each stream.
    columns: Vec<usize>,
    accumulator_width: usize,
    entry_width: usize,
}

impl Schema {
    pub fn new(streams: Vec<StreamSpec>) -> Result<Self, SchemaError> {
        if streams.is_empty() {
            return Err(SchemaError::NoStreams);
        }
        if streams.len() > MAX_STREAMS {
            return Err(SchemaError::TooManyStreams {
                count: streams.len(),
            });
        }

        let mut dims = Vec::with_capacity(streams.len());
        let mut columns = Vec::with_capacity(streams.len());
        let mut dim = 1;
        let mut column = 0;
        for (stream, spec) in streams.iter().enumerate() {
            spec.validate()
                .map_err(|source| SchemaError::InvalidStream { stream, source })?;
            dims.push(dim);
            columns.push(column);
            dim += spec.indexes();
            column += spec.width();
        }
        if dim > MAX_ACCUMULATOR_WIDTH {
            return Err(SchemaError::AccumulatorTooWide { width: dim });
        }

        Ok(Self {
            streams,
            dims,
            columns,
            accumulator_width: dim,
            entry_width: column,
        })
    }

    #[must_use]
    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn stream(&self, stream: usize) -> Result<StreamSpec, SchemaError> {
        self.streams
            .get(stream)
            .copied()
            .ok_or(SchemaError::NoSuchStream {
                stream,
                streams: self.streams.len(),
            })
    }

    /// Number of accumulator dimensions, including the size dimension.
    #[must_use]
    pub const fn accumulator_width(&self) -> usize {
        self.accumulator_width
    }

    /// Values in one entry row across all streams.
    #[must_use]
    pub const fn entry_width(&self) -> usize {
        self.entry_width
    }

    /// Mask with one bit set per stream.
    #[must_use]
    pub fn full_mask(&self) -> u32 {
        if self.streams.len() == MAX_STREAMS {
            u32::MAX
        } else {
            (1u32 << self.streams.len()) - 1
        }
    }

    /// Accumulator dimension of `index` within `stream`.
    pub fn dim(&self, stream: usize, index: usize) -> Result<usize, SchemaError> {
        let spec = self.stream(stream)?;
        if index >= spec.indexes() {
            return Err(SchemaError::NoSuchDimension {
                stream,
                index,
                indexes: spec.indexes(),
            });
        }
        Ok(self.dims[stream] + index)
    }

    /// Stream and stream-local index behind a dimension; `None` for the size
    /// dimension or a dimension past the end.
    #[must_use]
    pub fn locate(&self, dim: usize) -> Option<(usize, usize)> {
        if dim == 0 || dim >= self.accumulator_width {
            return None;
        }
        let stream = self.dims.partition_point(|&start| start <= dim) - 1;
        Some((stream, dim - self.dims[stream]))
    }

    /// Row columns owned by `stream`.
    #[must_use]
    pub fn columns(&self, stream: usize) -> Range<usize> {
        let start = self.columns[stream];
        start..start + self.streams[stream].width()
    }

    /// Check a row has the right width and every value fits its stream.
    pub fn validate_row(&self, row: &[u64]) -> Result<(), SchemaError> {
        if row.len() != self.entry_width {
            return Err(SchemaError::RowWidthMismatch {
                expected: self.entry_width,
                actual: row.len(),
            });
        }
        for (stream, spec) in self.streams.iter().enumerate() {
            let max = match spec {
                StreamSpec::Bitmap => 1,
                StreamSpec::Sequence { bits } => (1u64 << bits) - 1,
                StreamSpec::Array { .. } | StreamSpec::SumTree { .. } => continue,
            };
            let value = row[self.columns[stream]];
            if value > max {
                return Err(SchemaError::ValueOutOfRange { stream, value, max });
            }
        }
        Ok(())
    }

    /// What a single entry contributes to every dimension.
    pub fn row_accumulator(&self, row: &[u64]) -> Result<Accumulator, SchemaError> {
        self.validate_row(row)?;
        let mut values = vec![0u64; self.accumulator_width];
        values[0] = 1;
        for (stream, spec) in self.streams.iter().enumerate() {
            let dim = self.dims[stream];
            let cells = &row[self.columns(stream)];
            match spec {
                StreamSpec::Array { indexed: false, .. } => {}
                StreamSpec::Array { indexed: true, .. } | StreamSpec::SumTree { .. } => {
                    values[dim..dim + cells.len()].copy_from_slice(cells);
                }
                StreamSpec::Bitmap | StreamSpec::Sequence { .. } => {
                    let symbol = usize::try_from(cells[0]).unwrap_or(usize::MAX);
                    values[dim + symbol] = 1;
                }
            }
        }
        Ok(Accumulator::from_vec(values))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    NoStreams,
    TooManyStreams { count: usize },
    AccumulatorTooWide { width: usize },
    InvalidStream { stream: usize, source: StreamError },
    NoSuchStream { stream: usize, streams: usize },
    NoSuchDimension { stream: usize, index: usize, indexes: usize },
    RowWidthMismatch { expected: usize, actual: usize },
    ValueOutOfRange { stream: usize, value: u64, max: u64 },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStreams => write!(f, "schema has no streams"),
            Self::TooManyStreams { count } => {
                write!(f, "schema has {count} streams, at most {MAX_STREAMS} allowed")
            }
            Self::AccumulatorTooWide { width } => write!(
                f,
                "accumulator width {width} exceeds {MAX_ACCUMULATOR_WIDTH}"
            ),
            Self::InvalidStream { stream, source } => {
                write!(f, "stream {stream} is invalid: {source}")
            }
            Self::NoSuchStream { stream, streams } => {
                write!(f, "stream {stream} does not exist ({streams} streams)")
            }
            Self::NoSuchDimension {
                stream,
                index,
                indexes,
            } => write!(
                f,
                "stream {stream} has no index {index} ({indexes} indexes)"
            ),
            Self::RowWidthMismatch { expected, actual } => {
                write!(f, "row has {actual} values, expected {expected}")
            }
            Self::ValueOutOfRange { stream, value, max } => {
                write!(f, "value {value} exceeds {max} in stream {stream}")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidStream { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed() -> Schema {
        Schema::new(vec![
            StreamSpec::SumTree { columns: 2 },
            StreamSpec::Array {
                columns: 1,
                indexed: false,
            },
            StreamSpec::Bitmap,
            StreamSpec::Sequence { bits: 2 },
        ])
        .expect("schema")
    }

    #[test]
    fn test_dimensions_and_columns() {
        let schema = mixed();
        assert_eq!(schema.accumulator_width(), 1 + 2 + 0 + 2 + 4);
        assert_eq!(schema.entry_width(), 2 + 1 + 1 + 1);
        assert_eq!(schema.dim(0, 1).expect("dim"), 2);
        assert_eq!(schema.dim(2, 1).expect("dim"), 4);
        assert_eq!(schema.dim(3, 3).expect("dim"), 8);
        assert!(schema.dim(1, 0).is_err());
        assert_eq!(schema.columns(3), 4..5);
        assert_eq!(schema.full_mask(), 0b1111);
    }

    #[test]
    fn test_locate_inverts_dim() {
        let schema = mixed();
        assert_eq!(schema.locate(0), None);
        for (stream, spec) in schema.streams().iter().enumerate() {
            for index in 0..spec.indexes() {
                let dim = schema.dim(stream, index).expect("dim");
                assert_eq!(schema.locate(dim), Some((stream, index)));
            }
        }
        assert_eq!(schema.locate(schema.accumulator_width()), None);
    }

    #[test]
    fn test_row_accumulator() {
        let schema = mixed();
        let acc = schema.row_accumulator(&[5, 7, 99, 1, 2]).expect("row");
        assert_eq!(acc.as_slice(), &[1, 5, 7, 0, 1, 0, 0, 1, 0]);

        assert_eq!(
            schema.row_accumulator(&[5, 7, 99, 2, 0]),
            Err(SchemaError::ValueOutOfRange {
                stream: 2,
                value: 2,
                max: 1
            })
        );
        assert!(matches!(
            schema.row_accumulator(&[1]),
            Err(SchemaError::RowWidthMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_schemas() {
        assert_eq!(Schema::new(vec![]), Err(SchemaError::NoStreams));
        assert!(matches!(
            Schema::new(vec![StreamSpec::Sequence { bits: 3 }]),
            Err(SchemaError::InvalidStream { stream: 0, .. })
        ));
        assert!(matches!(
            Schema::new(vec![StreamSpec::Bitmap; 33]),
            Err(SchemaError::TooManyStreams { count: 33 })
        ));
        assert!(matches!(
            Schema::new(vec![StreamSpec::SumTree { columns: 200 }; 2]),
            Err(SchemaError::AccumulatorTooWide { width: 401 })
        ));
    }
}
