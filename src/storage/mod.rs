//! Attribute storage layer
//!
//! Provides the value model (dense tensors, sparse COO matrices, nested
//! containers), typed attribute stores, and graph records.

pub mod record;
pub mod sparse;
pub mod store;
pub mod tensor;
pub mod value;

pub use record::{EdgeType, HeteroRecord, Record};
pub use sparse::SparseTensor;
pub use store::{RowSpace, Store};
pub use tensor::{DType, Element, Tensor};
pub use value::{Scalar, Value, ValueKind};
