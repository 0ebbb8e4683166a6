//! graph-batch: collation and decollation of graph-structured records
//!
//! # Overview
//!
//! graph-batch merges many small graphs into one batched graph and splits a
//! batch back into the originals or any sub-collection. Attributes are
//! schema-less: dense tensors, sparse adjacency matrices, scalars, strings,
//! and arbitrarily nested sequences and mappings of those.
//!
//! # Quick Start
//!
//! ```
//! use graph_batch::{Batch, Policy, Record, Store, Tensor};
//! use ndarray::array;
//!
//! # fn main() -> graph_batch::Result<()> {
//! let a = Store::nodes()
//!     .with("x", Tensor::from(array![1.0_f32, 2.0, 3.0]))
//!     .with("edge_index", Tensor::from(array![[0_i64, 1, 1, 2], [1, 0, 2, 1]]))
//!     .with("s", "1");
//! let b = Store::nodes()
//!     .with("x", Tensor::from(array![1.0_f32, 2.0]))
//!     .with("edge_index", Tensor::from(array![[0_i64, 1], [1, 0]]))
//!     .with("s", "2");
//!
//! let batch = Batch::from_records(&[a.into(), b.clone().into()], &Policy::new())?;
//! let merged = batch.as_homogeneous().unwrap();
//!
//! // Node indices of the second graph are shifted by 3
//! assert_eq!(
//!     merged.store().get("edge_index").unwrap().as_tensor().unwrap(),
//!     &Tensor::from(array![[0_i64, 1, 1, 2, 3, 4], [1, 0, 2, 1, 4, 3]])
//! );
//! assert_eq!(merged.ptr(), &[0, 3, 5]);
//! assert_eq!(merged.membership(), &[0, 0, 0, 1, 1]);
//!
//! // ...and shifted back on the way out
//! assert_eq!(batch.get(1)?, Record::from(b));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Storage**: [`Value`] trees held in per-row-space [`Store`]s, grouped into
//!   homogeneous or heterogeneous [`Record`]s
//! - **Policy**: [`KeyPolicy`] decides per key how values merge and whether
//!   they index into a row space
//! - **Collation**: [`collate`] and [`HeteroBatch`] merge stores and record
//!   per-attribute slice and increment tables
//! - **Decollation**: [`CollatedStore::get`] and `index_select` invert the merge

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod error;
pub mod storage;

// Re-export core types
pub use batch::{
    collate, collate_edges, Batch, CollatedStore, ConcatAxis, HeteroBatch, IncrementSource,
    KeyOverride, KeyPolicy, LeafPolicy, OffsetTable, Policy, PolicyContext, PolicyWarning,
    Selector,
};
#[cfg(feature = "serde")]
pub use batch::{OverrideConfig, PolicyConfig};
pub use storage::{
    DType, EdgeType, Element, HeteroRecord, Record, RowSpace, Scalar, SparseTensor, Store,
    Tensor, Value, ValueKind,
};

// Error type
pub use error::{BatchError, Result};
