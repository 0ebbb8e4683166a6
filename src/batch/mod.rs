//! Collation and decollation of graph records
//!
//! - [`policy`]: per-key merge rules ([`KeyPolicy`], [`Policy`])
//! - [`offsets`]: pointer arrays and membership vectors ([`OffsetTable`])
//! - [`collate`], [`collate_edges`]: merging stores ([`CollatedStore`])
//! - [`selector`]: record selection for decollation ([`Selector`])
//! - [`hetero`]: per-type batching of heterogeneous records ([`HeteroBatch`])
//!
//! [`Batch`] ties them together for callers holding [`Record`]s.

pub mod collate;
pub mod hetero;
mod layout;
pub mod offsets;
pub mod policy;
pub mod selector;
mod separate;

pub use collate::{collate, collate_edges, CollatedStore, PolicyWarning};
pub use hetero::HeteroBatch;
pub use offsets::OffsetTable;
#[cfg(feature = "serde")]
pub use policy::{OverrideConfig, PolicyConfig};
pub use policy::{ConcatAxis, IncrementSource, KeyOverride, KeyPolicy, LeafPolicy, Policy, PolicyContext};
pub use selector::Selector;

use crate::error::{BatchError, Result};
use crate::storage::{HeteroRecord, Record, Store};
use tracing::debug;

/// Merged records, homogeneous or heterogeneous
///
/// # Example
///
/// ```
/// use graph_batch::{Batch, Policy, Record, Store, Tensor};
/// use ndarray::array;
///
/// let records: Vec<Record> = vec![
///     Store::nodes()
///         .with("x", Tensor::from(array![1.0_f32, 2.0, 3.0]))
///         .with("edge_index", Tensor::from(array![[0_i64, 1, 1, 2], [1, 0, 2, 1]]))
///         .into(),
///     Store::nodes()
///         .with("x", Tensor::from(array![1.0_f32, 2.0]))
///         .with("edge_index", Tensor::from(array![[0_i64, 1], [1, 0]]))
///         .into(),
/// ];
///
/// let batch = Batch::from_records(&records, &Policy::new()).unwrap();
/// assert_eq!(batch.num_records(), 2);
/// assert_eq!(batch.num_nodes(), 5);
///
/// let first_two = batch.index_select(..2_usize).unwrap();
/// assert_eq!(first_two, records);
/// ```
#[derive(Debug, Clone)]
pub enum Batch {
    /// One collated node store
    Homogeneous(CollatedStore),
    /// One collated store per node type, edge type and the graph store
    Heterogeneous(HeteroBatch),
}

impl Batch {
    /// Merge `records`
    ///
    /// An empty slice gives an empty homogeneous batch.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::StructuralMismatch`] when homogeneous and
    /// heterogeneous records are mixed, plus any collation error.
    pub fn from_records(records: &[Record], policy: &dyn KeyPolicy) -> Result<Self> {
        let stores: Option<Vec<&Store>> = records.iter().map(Record::as_homogeneous).collect();
        if let Some(stores) = stores {
            return Self::from_stores(&stores, policy);
        }

        let hetero: Option<Vec<&HeteroRecord>> =
            records.iter().map(Record::as_heterogeneous).collect();
        let Some(hetero) = hetero else {
            return Err(BatchError::structure(
                "record",
                "cannot batch homogeneous and heterogeneous records together",
            ));
        };

        let batch = HeteroBatch::from_records(&hetero, policy)?;
        debug!(
            records = batch.num_records(),
            nodes = batch.num_nodes(),
            "collated heterogeneous batch"
        );
        Ok(Self::Heterogeneous(batch))
    }

    /// Merge homogeneous node stores
    ///
    /// # Errors
    ///
    /// Any collation error.
    pub fn from_stores(stores: &[&Store], policy: &dyn KeyPolicy) -> Result<Self> {
        collate(stores, policy).map(Self::Homogeneous)
    }

    /// Number of merged records
    #[must_use]
    pub fn num_records(&self) -> usize {
        match self {
            Self::Homogeneous(c) => c.num_records(),
            Self::Heterogeneous(h) => h.num_records(),
        }
    }

    /// Total node count
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        match self {
            Self::Homogeneous(c) => c.num_rows(),
            Self::Heterogeneous(h) => h.num_nodes(),
        }
    }

    /// Per-record node pointer array (summed over node types when heterogeneous)
    #[must_use]
    pub fn ptr(&self) -> OffsetTable {
        match self {
            Self::Homogeneous(c) => c.offsets().clone(),
            Self::Heterogeneous(h) => h.global_ptr(),
        }
    }

    /// Reconstruct record `record`
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::SelectorOutOfRange`] if `record >= num_records()`.
    pub fn get(&self, record: usize) -> Result<Record> {
        match self {
            Self::Homogeneous(c) => c.get(record).map(Record::Homogeneous),
            Self::Heterogeneous(h) => h.get(record).map(Record::Heterogeneous),
        }
    }

    /// Reconstruct the selected records, in selection order
    ///
    /// Accepts an index, a list of indices, a boolean mask, or a range.
    ///
    /// # Errors
    ///
    /// Fails if the selector does not resolve against this batch.
    pub fn index_select(&self, selector: impl Into<Selector>) -> Result<Vec<Record>> {
        let selector = selector.into();
        match self {
            Self::Homogeneous(c) => Ok(c
                .index_select(&selector)?
                .into_iter()
                .map(Record::Homogeneous)
                .collect()),
            Self::Heterogeneous(h) => Ok(h
                .index_select(&selector)?
                .into_iter()
                .map(Record::Heterogeneous)
                .collect()),
        }
    }

    /// Reconstruct every record
    ///
    /// # Errors
    ///
    /// Fails only if a merged store no longer matches its layout.
    pub fn to_records(&self) -> Result<Vec<Record>> {
        self.index_select(..)
    }

    /// Homogeneous view
    #[must_use]
    pub const fn as_homogeneous(&self) -> Option<&CollatedStore> {
        match self {
            Self::Homogeneous(c) => Some(c),
            Self::Heterogeneous(_) => None,
        }
    }

    /// Heterogeneous view
    #[must_use]
    pub const fn as_heterogeneous(&self) -> Option<&HeteroBatch> {
        match self {
            Self::Heterogeneous(h) => Some(h),
            Self::Homogeneous(_) => None,
        }
    }

    /// Ambiguous policy fallbacks hit while merging
    #[must_use]
    pub fn warnings(&self) -> Vec<&PolicyWarning> {
        match self {
            Self::Homogeneous(c) => c.warnings().iter().collect(),
            Self::Heterogeneous(h) => h.warnings().collect(),
        }
    }
}
