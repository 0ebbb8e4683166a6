//! Dense n-dimensional attribute arrays
//!
//! A [`Tensor`] is a dtype-tagged `ndarray::ArrayD`. Rank 0 is a scalar tensor,
//! rank 1 a vector (`x=[5]`), rank 2 a matrix (`edge_index=[2, 6]`), and so on.
//!
//! The crate-internal operations (`concat`, `stack`, `slice_axis`, offsets)
//! always return freshly allocated arrays, so a merged or split tensor never
//! aliases its inputs.

use crate::error::{BatchError, Result};
use ndarray::{ArrayD, ArrayViewD, Axis, Dimension, IxDyn, ShapeError, Slice};
use std::fmt;
use std::ops::Range;

/// Element type of a [`Tensor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `i64` (index-bearing attributes use this)
    Int64,
    /// `bool`
    Bool,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int64 => "int64",
            Self::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Dense array attribute value
///
/// # Example
///
/// ```
/// use graph_batch::{DType, Tensor};
///
/// let x = Tensor::from_shape_vec(&[2, 3], vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// assert_eq!(x.shape(), &[2, 3]);
/// assert_eq!(x.dtype(), DType::Float32);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    /// `f32` array
    Float32(ArrayD<f32>),
    /// `f64` array
    Float64(ArrayD<f64>),
    /// `i64` array
    Int64(ArrayD<i64>),
    /// `bool` array
    Bool(ArrayD<bool>),
}

/// Element types a [`Tensor`] can hold
pub trait Element: Clone + PartialEq + fmt::Debug {
    /// Matching dtype tag
    const DTYPE: DType;

    /// Wrap an array of this element type
    fn wrap(array: ArrayD<Self>) -> Tensor;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn wrap(array: ArrayD<Self>) -> Tensor {
                Tensor::$variant(array)
            }
        }
    };
}

impl_element!(f32, Float32);
impl_element!(f64, Float64);
impl_element!(i64, Int64);
impl_element!(bool, Bool);

/// Run `$body` with `$arr` bound to the inner array, whatever the dtype
macro_rules! with_array {
    ($tensor:expr, $arr:ident => $body:expr) => {
        match $tensor {
            Tensor::Float32($arr) => $body,
            Tensor::Float64($arr) => $body,
            Tensor::Int64($arr) => $body,
            Tensor::Bool($arr) => $body,
        }
    };
}

/// Like `with_array!`, re-wrapping the produced array in the same variant
macro_rules! map_array {
    ($tensor:expr, $arr:ident => $body:expr) => {
        match $tensor {
            Tensor::Float32($arr) => Tensor::Float32($body),
            Tensor::Float64($arr) => Tensor::Float64($body),
            Tensor::Int64($arr) => Tensor::Int64($body),
            Tensor::Bool($arr) => Tensor::Bool($body),
        }
    };
}

/// Collect the inner arrays of one variant (dtypes are checked beforehand)
macro_rules! gather {
    ($parts:expr, $variant:ident) => {
        $parts
            .iter()
            .filter_map(|t| match t {
                Tensor::$variant(a) => Some(a),
                _ => None,
            })
            .collect::<Vec<_>>()
    };
}

impl<T: Element, D: Dimension> From<ndarray::Array<T, D>> for Tensor {
    fn from(array: ndarray::Array<T, D>) -> Self {
        T::wrap(array.into_dyn())
    }
}

impl Tensor {
    /// Build a tensor from a shape and row-major data
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::ShapeMismatch`] if `data.len()` does not match the shape.
    pub fn from_shape_vec<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(T::wrap)
            .map_err(|e| BatchError::shape("<tensor>", e.to_string()))
    }

    /// Rank-0 tensor holding a single element
    #[must_use]
    pub fn scalar<T: Element>(value: T) -> Self {
        T::wrap(ndarray::arr0(value).into_dyn())
    }

    /// Element type
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
            Self::Int64(_) => DType::Int64,
            Self::Bool(_) => DType::Bool,
        }
    }

    /// Extent of every axis
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// Number of axes
    #[must_use]
    pub fn ndim(&self) -> usize {
        with_array!(self, a => a.ndim())
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    /// True if the tensor holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow as an `f32` array
    #[must_use]
    pub const fn as_float32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::Float32(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as an `f64` array
    #[must_use]
    pub const fn as_float64(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Float64(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as an `i64` array
    #[must_use]
    pub const fn as_int64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Self::Int64(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as a `bool` array
    #[must_use]
    pub const fn as_bool(&self) -> Option<&ArrayD<bool>> {
        match self {
            Self::Bool(a) => Some(a),
            _ => None,
        }
    }

    /// Largest element of an `i64` tensor (`None` for other dtypes or empty tensors)
    #[must_use]
    pub fn max_index(&self) -> Option<i64> {
        self.as_int64().and_then(|a| a.iter().copied().max())
    }

    /// Owned copy of the half-open range `range` along `axis`
    pub(crate) fn slice_axis(&self, axis: usize, range: Range<usize>) -> Self {
        let slice = Slice::from(range);
        map_array!(self, a => a.slice_axis(Axis(axis), slice).to_owned())
    }

    /// Owned copy of slab `index` along the leading axis (rank drops by one)
    pub(crate) fn index_leading(&self, index: usize) -> Self {
        map_array!(self, a => a.index_axis(Axis(0), index).to_owned())
    }

    /// Copy with `delta` added to every element
    #[allow(clippy::cast_precision_loss)] // Offsets beyond 2^24 rows lose precision in f32 indices
    pub(crate) fn offset_by(&self, path: &str, delta: i64) -> Result<Self> {
        match self {
            Self::Int64(a) => Ok(Self::Int64(a.mapv(|v| v + delta))),
            Self::Float32(a) => Ok(Self::Float32(a.mapv(|v| v + delta as f32))),
            Self::Float64(a) => Ok(Self::Float64(a.mapv(|v| v + delta as f64))),
            Self::Bool(_) => Err(BatchError::DtypeMismatch {
                path: path.to_owned(),
                expected: DType::Int64,
                found: DType::Bool,
            }),
        }
    }

    /// Copy with `deltas[r]` added to every element of leading-axis row `r`
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn offset_rows(&self, path: &str, deltas: &[i64]) -> Result<Self> {
        if self.ndim() < 2 || self.shape()[0] != deltas.len() {
            return Err(BatchError::shape(
                path,
                format!(
                    "per-row offsets need a leading axis of {}, got shape {:?}",
                    deltas.len(),
                    self.shape()
                ),
            ));
        }

        let mut out = self.clone();
        match &mut out {
            Self::Int64(a) => {
                for (mut row, &delta) in a.axis_iter_mut(Axis(0)).zip(deltas) {
                    row.mapv_inplace(|v| v + delta);
                }
            }
            Self::Float32(a) => {
                for (mut row, &delta) in a.axis_iter_mut(Axis(0)).zip(deltas) {
                    row.mapv_inplace(|v| v + delta as f32);
                }
            }
            Self::Float64(a) => {
                for (mut row, &delta) in a.axis_iter_mut(Axis(0)).zip(deltas) {
                    row.mapv_inplace(|v| v + delta as f64);
                }
            }
            Self::Bool(_) => {
                return Err(BatchError::DtypeMismatch {
                    path: path.to_owned(),
                    expected: DType::Int64,
                    found: DType::Bool,
                })
            }
        }
        Ok(out)
    }

    /// Concatenate `parts` along an existing `axis`
    ///
    /// All parts must share dtype and rank, and agree on every other axis.
    pub(crate) fn concat(path: &str, axis: usize, parts: &[&Self]) -> Result<Self> {
        let first = check_dtypes(path, parts)?;
        let rank = first.ndim();
        if axis >= rank {
            return Err(BatchError::shape(
                path,
                format!("axis {axis} out of range for rank {rank}"),
            ));
        }

        for (record, part) in parts.iter().enumerate() {
            if part.ndim() != rank {
                return Err(BatchError::shape(
                    path,
                    format!("record {record} has rank {}, expected {rank}", part.ndim()),
                ));
            }
            let mismatch = first
                .shape()
                .iter()
                .zip(part.shape())
                .enumerate()
                .find(|&(dim, (a, b))| dim != axis && a != b);
            if let Some((dim, (a, b))) = mismatch {
                return Err(BatchError::shape(
                    path,
                    format!("record {record} has {b} on axis {dim}, expected {a}"),
                ));
            }
        }

        let merged = match first {
            Self::Float32(_) => concat_typed(axis, &gather!(parts, Float32)).map(Self::Float32),
            Self::Float64(_) => concat_typed(axis, &gather!(parts, Float64)).map(Self::Float64),
            Self::Int64(_) => concat_typed(axis, &gather!(parts, Int64)).map(Self::Int64),
            Self::Bool(_) => concat_typed(axis, &gather!(parts, Bool)).map(Self::Bool),
        };
        merged.map_err(|e| BatchError::shape(path, e.to_string()))
    }

    /// Stack equally shaped `parts` along a new leading axis
    pub(crate) fn stack(path: &str, parts: &[&Self]) -> Result<Self> {
        let first = check_dtypes(path, parts)?;
        if let Some(record) = parts.iter().position(|p| p.shape() != first.shape()) {
            return Err(BatchError::shape(
                path,
                format!(
                    "cannot stack shape {:?} (record {record}) onto {:?}",
                    parts[record].shape(),
                    first.shape()
                ),
            ));
        }

        let merged = match first {
            Self::Float32(_) => stack_typed(&gather!(parts, Float32)).map(Self::Float32),
            Self::Float64(_) => stack_typed(&gather!(parts, Float64)).map(Self::Float64),
            Self::Int64(_) => stack_typed(&gather!(parts, Int64)).map(Self::Int64),
            Self::Bool(_) => stack_typed(&gather!(parts, Bool)).map(Self::Bool),
        };
        merged.map_err(|e| BatchError::shape(path, e.to_string()))
    }
}

fn check_dtypes<'a>(path: &str, parts: &[&'a Tensor]) -> Result<&'a Tensor> {
    let first = *parts
        .first()
        .ok_or_else(|| BatchError::shape(path, "nothing to merge"))?;
    if let Some(other) = parts.iter().find(|p| p.dtype() != first.dtype()) {
        return Err(BatchError::DtypeMismatch {
            path: path.to_owned(),
            expected: first.dtype(),
            found: other.dtype(),
        });
    }
    Ok(first)
}

// One output allocation per merged attribute: ndarray sizes the result up front.
fn concat_typed<T: Clone>(
    axis: usize,
    arrays: &[&ArrayD<T>],
) -> std::result::Result<ArrayD<T>, ShapeError> {
    let views: Vec<ArrayViewD<'_, T>> = arrays.iter().map(|a| a.view()).collect();
    ndarray::concatenate(Axis(axis), &views)
}

fn stack_typed<T: Clone>(arrays: &[&ArrayD<T>]) -> std::result::Result<ArrayD<T>, ShapeError> {
    let views: Vec<ArrayViewD<'_, T>> = arrays.iter().map(|a| a.view()).collect();
    ndarray::stack(Axis(0), &views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_concat_along_last_axis() {
        let a = Tensor::from(array![[0_i64, 1, 1, 2], [1, 0, 2, 1]]);
        let b = Tensor::from(array![[3_i64, 4], [4, 3]]);

        let merged = Tensor::concat("edge_index", 1, &[&a, &b]).unwrap();
        assert_eq!(merged.shape(), &[2, 6]);
        assert_eq!(
            merged,
            Tensor::from(array![[0_i64, 1, 1, 2, 3, 4], [1, 0, 2, 1, 4, 3]])
        );
    }

    #[test]
    fn test_concat_rejects_mismatched_inner_axis() {
        let a = Tensor::from(ArrayD::<f32>::zeros(IxDyn(&[3, 4])));
        let b = Tensor::from(ArrayD::<f32>::zeros(IxDyn(&[2, 5])));

        let err = Tensor::concat("x", 0, &[&a, &b]).unwrap_err();
        assert!(matches!(err, BatchError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_concat_rejects_mixed_dtypes() {
        let a = Tensor::from(array![1_i64, 2]);
        let b = Tensor::from(array![1.0_f32, 2.0]);

        let err = Tensor::concat("x", 0, &[&a, &b]).unwrap_err();
        assert_eq!(
            err,
            BatchError::DtypeMismatch {
                path: "x".to_string(),
                expected: DType::Int64,
                found: DType::Float32,
            }
        );
    }

    #[test]
    fn test_stack_adds_leading_axis() {
        let a = Tensor::from(array![1.0_f32, 2.0, 3.0, 4.0]);
        let b = Tensor::from(array![5.0_f32, 6.0, 7.0, 8.0]);

        let stacked = Tensor::stack("foo", &[&a, &b]).unwrap();
        assert_eq!(stacked.shape(), &[2, 4]);
        assert_eq!(stacked.index_leading(1), b);
    }

    #[test]
    fn test_stack_scalars_gives_vector() {
        let stacked =
            Tensor::stack("y", &[&Tensor::scalar(1_i64), &Tensor::scalar(2_i64)]).unwrap();
        assert_eq!(stacked, Tensor::from(array![1_i64, 2]));
        assert_eq!(stacked.index_leading(0), Tensor::scalar(1_i64));
    }

    #[test]
    fn test_offset_rows_applies_independent_offsets() {
        let edges = Tensor::from(array![[0_i64, 1], [1, 0]]);
        let shifted = edges.offset_rows("edge_index", &[100, 200]).unwrap();
        assert_eq!(shifted, Tensor::from(array![[100_i64, 101], [201, 200]]));

        let err = edges.offset_rows("edge_index", &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, BatchError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_offset_on_bool_is_rejected() {
        let mask = Tensor::from(array![true, false]);
        assert!(mask.offset_by("mask", 3).is_err());
    }

    #[test]
    fn test_slice_axis_copies() {
        let x = Tensor::from(array![1.0_f32, 2.0, 3.0, 1.0, 2.0]);
        let tail = x.slice_axis(0, 3..5);
        assert_eq!(tail, Tensor::from(array![1.0_f32, 2.0]));
    }

    #[test]
    fn test_from_shape_vec_checks_length() {
        assert!(Tensor::from_shape_vec(&[2, 2], vec![1_i64, 2, 3]).is_err());
        let t = Tensor::from_shape_vec(&[2, 2], vec![1_i64, 2, 3, 4]).unwrap();
        assert_eq!(t.max_index(), Some(4));
    }
}
