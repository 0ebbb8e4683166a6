//! Attribute values
//!
//! A closed, recursive value tree: scalars, dense tensors, sparse matrices,
//! sequences and insertion-ordered mappings. Values are never mutated once
//! stored; every batching operation produces new values.

use crate::storage::{SparseTensor, Tensor};
use indexmap::IndexMap;
use std::fmt::Write as _;

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// String (collected, never concatenated)
    Str(String),
}

impl Scalar {
    /// Rank-0 tensor with the same content (`None` for strings)
    #[must_use]
    pub fn to_tensor(&self) -> Option<Tensor> {
        match self {
            Self::Int(v) => Some(Tensor::scalar(*v)),
            Self::Float(v) => Some(Tensor::scalar(*v)),
            Self::Bool(v) => Some(Tensor::scalar(*v)),
            Self::Str(_) => None,
        }
    }

    /// Inverse of [`Scalar::to_tensor`] for rank-0 `int64`/`float64`/`bool` tensors
    #[must_use]
    pub fn from_tensor(tensor: &Tensor) -> Option<Self> {
        if tensor.ndim() != 0 {
            return None;
        }
        match tensor {
            Tensor::Int64(a) => a.iter().next().copied().map(Self::Int),
            Tensor::Float64(a) => a.iter().next().copied().map(Self::Float),
            Tensor::Bool(a) => a.iter().next().copied().map(Self::Bool),
            Tensor::Float32(_) => None,
        }
    }
}

/// Kind tag, used in mismatch diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// [`Value::Scalar`]
    Scalar,
    /// [`Value::Tensor`]
    Tensor,
    /// [`Value::Sparse`]
    Sparse,
    /// [`Value::Sequence`]
    Sequence,
    /// [`Value::Mapping`]
    Mapping,
}

/// Attribute value
///
/// # Example
///
/// ```
/// use graph_batch::{Tensor, Value};
/// use ndarray::array;
///
/// let x = Value::from(Tensor::from(array![[1.0_f32, 2.0], [3.0, 4.0]]));
/// assert_eq!(x.shape_summary(), "[2, 2]");
///
/// let nested = Value::mapping([("a", x.clone()), ("b", Value::from("tag"))]);
/// assert_eq!(nested.shape_summary(), "{a=[2, 2], b='tag'}");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Single scalar
    Scalar(Scalar),
    /// Dense array
    Tensor(Tensor),
    /// Sparse 2-D structure
    Sparse(SparseTensor),
    /// Ordered list of values
    Sequence(Vec<Value>),
    /// Insertion-ordered string-keyed map of values
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// Build a mapping from `(key, value)` pairs
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Kind tag
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar(_) => ValueKind::Scalar,
            Self::Tensor(_) => ValueKind::Tensor,
            Self::Sparse(_) => ValueKind::Sparse,
            Self::Sequence(_) => ValueKind::Sequence,
            Self::Mapping(_) => ValueKind::Mapping,
        }
    }

    /// True for sequences and mappings
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Sequence(_) | Self::Mapping(_))
    }

    /// Borrow as a dense tensor
    #[must_use]
    pub const fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as a sparse tensor
    #[must_use]
    pub const fn as_sparse(&self) -> Option<&SparseTensor> {
        match self {
            Self::Sparse(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a scalar
    #[must_use]
    pub const fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a string scalar
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a sequence
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a mapping
    #[must_use]
    pub const fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Compact shape description for formatting layers
    ///
    /// Tensors print their shape, sparse values add `nnz`, sequences their
    /// length, strings are quoted and numbers print as-is.
    #[must_use]
    pub fn shape_summary(&self) -> String {
        match self {
            Self::Scalar(Scalar::Str(s)) => format!("'{s}'"),
            Self::Scalar(Scalar::Int(v)) => v.to_string(),
            Self::Scalar(Scalar::Float(v)) => v.to_string(),
            Self::Scalar(Scalar::Bool(v)) => v.to_string(),
            Self::Tensor(t) => format!("{:?}", t.shape()),
            Self::Sparse(s) => {
                let [rows, cols] = s.shape();
                format!("[{rows}, {cols}, nnz={}]", s.nnz())
            }
            Self::Sequence(items) => format!("[{}]", items.len()),
            Self::Mapping(map) => {
                let mut out = String::from("{");
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{key}={}", value.shape_summary());
                }
                out.push('}');
                out
            }
        }
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Self::Tensor(tensor)
    }
}

impl From<SparseTensor> for Value {
    fn from(sparse: SparseTensor) -> Self {
        Self::Sparse(sparse)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Scalar(Scalar::Int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Scalar(Scalar::Float(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Scalar(Scalar::Bool(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Scalar(Scalar::Str(v.to_owned()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Scalar(Scalar::Str(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Sequence(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self::Mapping(map)
    }
}
