//! Sparse two-dimensional attributes (COO adjacency)
//!
//! # COO Format
//!
//! ```text
//! Graph: 0 → 1, 1 → 0, 1 → 2, 2 → 1
//!
//! COO:
//!   shape: [3, 3]
//!   row:   [0, 1, 1, 2]
//!   col:   [1, 0, 2, 1]
//!   values: None            // structural (unweighted) adjacency
//! ```
//!
//! Entries of one source record stay contiguous when records are merged, so a
//! merged sparse attribute splits back along its `nnz` boundaries.

use crate::error::{BatchError, Result};
use crate::storage::Tensor;
use ndarray::Axis;
use std::ops::Range;

/// Sparse 2-D index/value structure
///
/// # Example
///
/// ```
/// use graph_batch::{SparseTensor, Tensor};
/// use ndarray::array;
///
/// let edge_index = Tensor::from(array![[0_i64, 1, 1, 2], [1, 0, 2, 1]]);
/// let adj = SparseTensor::from_edge_index(&edge_index, None).unwrap();
/// assert_eq!(adj.shape(), [3, 3]);
/// assert_eq!(adj.nnz(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTensor {
    shape: [usize; 2],
    row: Vec<usize>,
    col: Vec<usize>,
    /// Leading axis has length `nnz`
    values: Option<Tensor>,
}

impl SparseTensor {
    /// Build from raw COO parts
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::ShapeMismatch`] if `row`, `col` and `values` disagree
    /// on `nnz`, or an index falls outside `shape`.
    pub fn new(
        shape: [usize; 2],
        row: Vec<usize>,
        col: Vec<usize>,
        values: Option<Tensor>,
    ) -> Result<Self> {
        if row.len() != col.len() {
            return Err(BatchError::shape(
                "<sparse>",
                format!("{} row indices vs {} column indices", row.len(), col.len()),
            ));
        }
        if let Some(values) = &values {
            if values.ndim() == 0 || values.shape()[0] != row.len() {
                return Err(BatchError::shape(
                    "<sparse>",
                    format!(
                        "values shape {:?} does not lead with nnz={}",
                        values.shape(),
                        row.len()
                    ),
                ));
            }
        }
        if row.iter().any(|&r| r >= shape[0]) || col.iter().any(|&c| c >= shape[1]) {
            return Err(BatchError::shape(
                "<sparse>",
                format!("index outside shape {shape:?}"),
            ));
        }

        Ok(Self {
            shape,
            row,
            col,
            values,
        })
    }

    /// Build a structural adjacency from an `int64` edge index of shape `[2, E]`
    ///
    /// Entries are sorted row-major. Without an explicit `shape` the matrix is
    /// square with side `max index + 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if `edge_index` is not a non-negative `[2, E]` `int64` tensor.
    pub fn from_edge_index(edge_index: &Tensor, shape: Option<[usize; 2]>) -> Result<Self> {
        let array = edge_index.as_int64().ok_or_else(|| BatchError::DtypeMismatch {
            path: "<sparse>".to_owned(),
            expected: crate::storage::DType::Int64,
            found: edge_index.dtype(),
        })?;
        if array.ndim() != 2 || array.shape()[0] != 2 {
            return Err(BatchError::shape(
                "<sparse>",
                format!("edge index must be [2, E], got {:?}", array.shape()),
            ));
        }

        let sources = array.index_axis(Axis(0), 0);
        let targets = array.index_axis(Axis(0), 1);
        let mut pairs = Vec::with_capacity(array.shape()[1]);
        for (&src, &dst) in sources.iter().zip(targets.iter()) {
            let src = usize::try_from(src)
                .map_err(|_| BatchError::shape("<sparse>", "negative source index"))?;
            let dst = usize::try_from(dst)
                .map_err(|_| BatchError::shape("<sparse>", "negative target index"))?;
            pairs.push((src, dst));
        }
        pairs.sort_unstable();

        let shape = shape.unwrap_or_else(|| {
            let side = pairs
                .iter()
                .map(|&(src, dst)| src.max(dst) + 1)
                .max()
                .unwrap_or(0);
            [side, side]
        });
        let (row, col) = pairs.into_iter().unzip();
        Self::new(shape, row, col, None)
    }

    /// `[rows, cols]`
    #[must_use]
    pub const fn shape(&self) -> [usize; 2] {
        self.shape
    }

    /// Number of stored entries
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.row.len()
    }

    /// Row indices
    #[must_use]
    pub fn row(&self) -> &[usize] {
        &self.row
    }

    /// Column indices
    #[must_use]
    pub fn col(&self) -> &[usize] {
        &self.col
    }

    /// Entry values, if any
    #[must_use]
    pub const fn values(&self) -> Option<&Tensor> {
        self.values.as_ref()
    }

    /// COO components `(row, col, values)`
    #[must_use]
    pub fn coo(&self) -> (&[usize], &[usize], Option<&Tensor>) {
        (&self.row, &self.col, self.values.as_ref())
    }

    /// Row/col pairs as an `int64` tensor of shape `[2, nnz]`
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // Indices are bounded by shape, far below i64::MAX
    pub fn to_edge_index(&self) -> Tensor {
        let mut data = Vec::with_capacity(2 * self.nnz());
        data.extend(self.row.iter().map(|&r| r as i64));
        data.extend(self.col.iter().map(|&c| c as i64));
        Tensor::from(
            ndarray::Array2::from_shape_vec((2, self.nnz()), data)
                .unwrap_or_else(|_| ndarray::Array2::zeros((2, 0))),
        )
    }

    /// Copy with `values` replaced
    pub(crate) fn with_values(&self, values: Option<Tensor>) -> Self {
        Self {
            values,
            ..self.clone()
        }
    }

    /// Concatenate `parts`, shifting rows and/or columns by the cumulative extent
    /// of the preceding parts. Shifting both gives a block-diagonal matrix.
    pub(crate) fn concat(
        path: &str,
        parts: &[&Self],
        shift_rows: bool,
        shift_cols: bool,
    ) -> Result<Self> {
        let first = *parts
            .first()
            .ok_or_else(|| BatchError::shape(path, "nothing to merge"))?;

        for (record, part) in parts.iter().enumerate() {
            if !shift_rows && part.shape[0] != first.shape[0] {
                return Err(BatchError::shape(
                    path,
                    format!(
                        "record {record} has {} rows, expected {}",
                        part.shape[0], first.shape[0]
                    ),
                ));
            }
            if !shift_cols && part.shape[1] != first.shape[1] {
                return Err(BatchError::shape(
                    path,
                    format!(
                        "record {record} has {} columns, expected {}",
                        part.shape[1], first.shape[1]
                    ),
                ));
            }
            if part.values.is_some() != first.values.is_some() {
                return Err(BatchError::structure(
                    path,
                    format!("record {record} disagrees on the presence of sparse values"),
                ));
            }
        }

        let nnz = parts.iter().map(|p| p.nnz()).sum();
        let mut row = Vec::with_capacity(nnz);
        let mut col = Vec::with_capacity(nnz);
        let (mut row_offset, mut col_offset) = (0, 0);

        for part in parts {
            row.extend(part.row.iter().map(|&r| r + row_offset));
            col.extend(part.col.iter().map(|&c| c + col_offset));
            if shift_rows {
                row_offset += part.shape[0];
            }
            if shift_cols {
                col_offset += part.shape[1];
            }
        }

        let values = if first.values.is_some() {
            let values: Vec<&Tensor> = parts.iter().filter_map(|p| p.values.as_ref()).collect();
            Some(Tensor::concat(path, 0, &values)?)
        } else {
            None
        };

        let shape = [
            if shift_rows { row_offset } else { first.shape[0] },
            if shift_cols { col_offset } else { first.shape[1] },
        ];

        Ok(Self {
            shape,
            row,
            col,
            values,
        })
    }

    /// Owned sub-matrix of entries `nnz`, re-based onto the given row/column windows
    ///
    /// `None` keeps the full extent of that axis (it was not shifted on merge).
    pub(crate) fn slice(
        &self,
        rows: Option<Range<usize>>,
        cols: Option<Range<usize>>,
        nnz: Range<usize>,
    ) -> Self {
        let (row_start, n_rows) = rows.map_or((0, self.shape[0]), |r| (r.start, r.len()));
        let (col_start, n_cols) = cols.map_or((0, self.shape[1]), |c| (c.start, c.len()));

        Self {
            shape: [n_rows, n_cols],
            row: self.row[nnz.clone()].iter().map(|&r| r - row_start).collect(),
            col: self.col[nnz.clone()].iter().map(|&c| c - col_start).collect(),
            values: self.values.as_ref().map(|v| v.slice_axis(0, nnz)),
        }
    }
}
