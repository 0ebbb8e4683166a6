//! Per-attribute side tables recorded during collation
//!
//! A [`Layout`] mirrors the container structure of a merged attribute. Each
//! leaf remembers where every record's slab lives inside the merged value and
//! which offset was added to it, which is all decollation needs.

use crate::batch::OffsetTable;
use crate::error::{BatchError, Result};
use crate::storage::{Scalar, Value};
use indexmap::IndexMap;

/// Offset added to one record's index-like value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Increment {
    /// Same offset for every element
    Rows(i64),
    /// Leading-axis row 0 shifted by `src`, row 1 by `dst`
    Endpoints { src: i64, dst: i64 },
}

impl Increment {
    /// Copy of `value` shifted by this increment (`negate` reverses it)
    #[allow(clippy::cast_precision_loss)] // Float indices lose precision past 2^53 rows
    pub(crate) fn apply(self, path: &str, value: &Value, negate: bool) -> Result<Value> {
        let sign = if negate { -1 } else { 1 };
        match (self, value) {
            (Self::Rows(delta), Value::Tensor(t)) => {
                t.offset_by(path, sign * delta).map(Value::Tensor)
            }
            (Self::Endpoints { src, dst }, Value::Tensor(t)) if t.ndim() >= 2 => {
                t.offset_rows(path, &[sign * src, sign * dst]).map(Value::Tensor)
            }
            (_, Value::Sparse(s)) => {
                let values = s.values().ok_or_else(|| {
                    BatchError::unsupported(path, self, "sparse value without entry values")
                })?;
                let shifted = self.apply(path, &Value::Tensor(values.clone()), negate)?;
                Ok(Value::Sparse(s.with_values(shifted.as_tensor().cloned())))
            }
            (Self::Rows(delta), Value::Scalar(Scalar::Int(v))) => {
                Ok(Value::Scalar(Scalar::Int(v + sign * delta)))
            }
            (Self::Rows(delta), Value::Scalar(Scalar::Float(v))) => {
                Ok(Value::Scalar(Scalar::Float(v + (sign * delta) as f64)))
            }
            (
                Self::Endpoints { .. },
                Value::Tensor(_) | Value::Scalar(Scalar::Int(_) | Scalar::Float(_)),
            ) => Err(BatchError::unsupported(
                path,
                self,
                "endpoint offsets need a two-row index tensor",
            )),
            _ => Err(BatchError::unsupported(
                path,
                self,
                "only integer or float values can be offset",
            )),
        }
    }
}

/// How one leaf's records are laid out in the merged value
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slices {
    /// Concatenated along `axis`; `bounds` delimits each record
    Axis { axis: usize, bounds: OffsetTable },
    /// Record `i` is slab `i` of the leading axis
    Stack,
    /// Record `i` is element `i` of a sequence
    Collect,
    /// Every record holds the merged value itself
    Shared,
    /// Sparse entries delimited by `nnz`; rows and/or columns shifted when `Some`
    Sparse {
        rows: Option<OffsetTable>,
        cols: Option<OffsetTable>,
        nnz: OffsetTable,
    },
}

/// What a leaf looked like before merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Stored as-is (tensor, sparse, or collected value)
    Value,
    /// Scalar stacked into a tensor; restored to a [`Scalar`] on split
    Scalar,
}

/// Side table of one merged leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LeafLayout {
    pub(crate) slices: Slices,
    /// Per-record increments, when index-like
    pub(crate) increments: Option<Vec<Increment>>,
    pub(crate) origin: Origin,
}

/// Side tables of one merged attribute, mirroring its container structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Layout {
    Leaf(LeafLayout),
    Sequence(Vec<Layout>),
    Mapping(IndexMap<String, Layout>),
}

impl Layout {
    /// Concatenation bounds of a top-level axis leaf
    pub(crate) fn bounds(&self) -> Option<&OffsetTable> {
        match self {
            Self::Leaf(LeafLayout {
                slices: Slices::Axis { bounds, .. },
                ..
            }) => Some(bounds),
            Self::Leaf(LeafLayout {
                slices: Slices::Sparse { nnz, .. },
                ..
            }) => Some(nnz),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Tensor;
    use ndarray::array;

    #[test]
    fn test_increment_round_trip() {
        let edges = Value::from(Tensor::from(array![[0_i64, 1], [1, 0]]));
        let inc = Increment::Endpoints { src: 100, dst: 200 };

        let shifted = inc.apply("edge_index", &edges, false).unwrap();
        assert_eq!(
            shifted,
            Value::from(Tensor::from(array![[100_i64, 101], [201, 200]]))
        );
        assert_eq!(inc.apply("edge_index", &shifted, true).unwrap(), edges);
    }

    #[test]
    fn test_scalar_increment() {
        let root = Value::from(2_i64);
        assert_eq!(
            Increment::Rows(3).apply("root_index", &root, false).unwrap(),
            Value::from(5_i64)
        );
        assert!(Increment::Rows(3).apply("s", &Value::from("a"), false).is_err());

        let root = Value::from(1.0_f64);
        let shifted = Increment::Rows(4).apply("root_index", &root, false).unwrap();
        assert_eq!(shifted, Value::from(5.0_f64));
        assert_eq!(Increment::Rows(4).apply("root_index", &shifted, true).unwrap(), root);
    }

    #[test]
    fn test_endpoints_reject_flat_indices() {
        let flat = Value::from(Tensor::from(array![0_i64, 1]));
        let inc = Increment::Endpoints { src: 100, dst: 200 };
        assert!(matches!(
            inc.apply("node_index", &flat, false),
            Err(BatchError::UnsupportedPolicy { ref path, .. }) if path == "node_index"
        ));
        assert!(inc.apply("root_index", &Value::from(0_i64), false).is_err());
    }
}
