//! Collation: merge same-typed stores into one
//!
//! # Algorithm
//!
//! ```text
//! row counts:   [3, 2]
//! ptr:          [0, 3, 5]
//! membership:   [0, 0, 0, 1, 1]
//!
//! x:            [1, 2, 3] ++ [1, 2]                 -> [1, 2, 3, 1, 2]
//! edge_index:   [[0,1,1,2],[1,0,2,1]] ++ ([[0,1],[1,0]] + 3)
//!                                                   -> [[0,1,1,2,3,4],[1,0,2,1,4,3]]
//! ```
//!
//! Keys are the union over all stores in first-seen order. Every key is zipped
//! across records and merged recursively: mappings by key, sequences by
//! position, leaves by their resolved [`LeafPolicy`].

use crate::batch::layout::{Increment, Layout, LeafLayout, Origin, Slices};
use crate::batch::policy::{ConcatAxis, IncrementSource, KeyPolicy, LeafPolicy, PolicyContext};
use crate::batch::OffsetTable;
use crate::error::{BatchError, Result};
use crate::storage::{RowSpace, Scalar, SparseTensor, Store, Tensor, Value};
use indexmap::{IndexMap, IndexSet};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Non-fatal notice: a leaf was stacked because nothing tied it to the row space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyWarning {
    /// Attribute path
    pub path: String,
    /// Shape of the representative value
    pub shape: Vec<usize>,
}

/// One merged store plus the side tables needed to split it again
///
/// The pointer array and membership vector are first-class outputs: bulk
/// consumers read them to pool or scatter per-record results.
#[derive(Debug, Clone)]
pub struct CollatedStore {
    pub(crate) store: Store,
    pub(crate) offsets: OffsetTable,
    pub(crate) membership: Vec<usize>,
    pub(crate) layouts: IndexMap<String, Layout>,
    pub(crate) warnings: Vec<PolicyWarning>,
}

impl CollatedStore {
    /// Merged store (`row_count == ptr[-1]`)
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Take the merged store, dropping the side tables
    #[must_use]
    pub fn into_store(self) -> Store {
        self.store
    }

    /// Pointer array over the row space
    #[must_use]
    pub fn ptr(&self) -> &[usize] {
        self.offsets.ptr()
    }

    /// Offset table over the row space
    #[must_use]
    pub const fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Owning record of every merged row
    #[must_use]
    pub fn membership(&self) -> &[usize] {
        &self.membership
    }

    /// Number of merged records
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.offsets.num_records()
    }

    /// Merged row count
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.offsets.total()
    }

    /// Ambiguous policy fallbacks hit while merging
    #[must_use]
    pub fn warnings(&self) -> &[PolicyWarning] {
        &self.warnings
    }

    /// Per-record boundaries of a top-level attribute along its concatenation axis
    /// (entry boundaries for sparse attributes)
    #[must_use]
    pub fn bounds(&self, key: &str) -> Option<&[usize]> {
        self.layouts
            .get(key)
            .and_then(Layout::bounds)
            .map(OffsetTable::ptr)
    }
}

/// Merge `stores` into one, in order
///
/// Index-like attributes are offset by the store's own cumulative row count.
///
/// # Errors
///
/// Fails on shape, dtype or structure mismatches, on partially present keys
/// without a fill value, and on policies that do not apply to a value.
///
/// # Example
///
/// ```
/// use graph_batch::{collate, Policy, Store, Tensor};
/// use ndarray::array;
///
/// let a = Store::nodes()
///     .with("x", Tensor::from(array![1.0_f32, 2.0, 3.0]))
///     .with("edge_index", Tensor::from(array![[0_i64, 1, 1, 2], [1, 0, 2, 1]]));
/// let b = Store::nodes()
///     .with("x", Tensor::from(array![1.0_f32, 2.0]))
///     .with("edge_index", Tensor::from(array![[0_i64, 1], [1, 0]]));
///
/// let merged = collate(&[&a, &b], &Policy::new()).unwrap();
/// assert_eq!(merged.ptr(), &[0, 3, 5]);
/// assert_eq!(merged.membership(), &[0, 0, 0, 1, 1]);
/// assert_eq!(
///     merged.store().get("edge_index").unwrap().as_tensor().unwrap(),
///     &Tensor::from(array![[0_i64, 1, 1, 2, 3, 4], [1, 0, 2, 1, 4, 3]])
/// );
/// ```
pub fn collate(stores: &[&Store], policy: &dyn KeyPolicy) -> Result<CollatedStore> {
    let space = stores.first().map_or(RowSpace::Nodes, |s| s.space());
    if space == RowSpace::Edges {
        return Err(BatchError::structure(
            "edge_index",
            "edge stores index into node tables; merge them with `collate_edges`",
        ));
    }
    collate_stores(stores, space, None, policy)
}

/// Merge edge stores whose indices point into the node stores collated as `src`
/// and `dst`
///
/// Row 0 of every two-row index tensor is shifted by the source type's
/// cumulative node count, row 1 by the destination type's.
///
/// # Errors
///
/// Fails if either table does not cover exactly `stores.len()` records, and for
/// every reason [`collate`] fails.
///
/// # Example
///
/// ```
/// use graph_batch::{collate_edges, OffsetTable, Policy, Store, Tensor};
/// use ndarray::array;
///
/// let a = Store::edges().with("edge_index", Tensor::from(array![[0_i64, 1], [1, 0]]));
/// let b = Store::edges().with("edge_index", Tensor::from(array![[0_i64], [1]]));
/// let papers = OffsetTable::from_counts([3, 2]);
/// let authors = OffsetTable::from_counts([4, 2]);
///
/// let merged = collate_edges(&[&a, &b], &papers, &authors, &Policy::new()).unwrap();
/// assert_eq!(
///     merged.store().get("edge_index").unwrap().as_tensor().unwrap(),
///     &Tensor::from(array![[0_i64, 1, 3], [1, 0, 5]])
/// );
/// ```
pub fn collate_edges(
    stores: &[&Store],
    src: &OffsetTable,
    dst: &OffsetTable,
    policy: &dyn KeyPolicy,
) -> Result<CollatedStore> {
    for table in [src, dst] {
        if table.num_records() != stores.len() {
            return Err(BatchError::structure(
                "edge_index",
                format!(
                    "node table covers {} records, batch holds {}",
                    table.num_records(),
                    stores.len()
                ),
            ));
        }
    }
    let endpoints: Vec<(usize, usize)> = (0..stores.len())
        .map(|i| (src.offset(i), dst.offset(i)))
        .collect();
    collate_stores(stores, RowSpace::Edges, Some(&endpoints), policy)
}

/// Merge `stores` over `space`; `endpoints[i]` carries the cumulative source and
/// destination node counts before record `i` (edge stores only)
pub(crate) fn collate_stores(
    stores: &[&Store],
    space: RowSpace,
    endpoints: Option<&[(usize, usize)]>,
    policy: &dyn KeyPolicy,
) -> Result<CollatedStore> {
    if let Some(record) = stores.iter().position(|s| s.space() != space) {
        return Err(BatchError::structure(
            &format!("record {record}"),
            format!("{:?} store in a {space:?} batch", stores[record].space()),
        ));
    }

    let counts: Vec<usize> = stores.iter().map(|s| s.row_count()).collect();
    let offsets = OffsetTable::from_counts(counts.iter().copied());
    let membership = offsets.membership();

    let increments = (0..stores.len())
        .map(|i| {
            let endpoints = endpoints
                .and_then(|e| e.get(i).copied())
                .map(|(src, dst)| (to_i64(src), to_i64(dst)));
            RecordOffsets {
                rows: to_i64(offsets.offset(i)),
                endpoints,
            }
        })
        .collect();

    let mut collator = Collator {
        policy,
        space,
        counts,
        increments,
        warnings: Vec::new(),
    };

    let keys: IndexSet<&str> = stores.iter().flat_map(|s| s.keys()).collect();
    let mut merged = Store::new(space).with_row_count(offsets.total());
    let mut layouts = IndexMap::with_capacity(keys.len());

    for key in keys {
        let present = stores.iter().filter(|s| s.contains_key(key)).count();
        let fill = policy.fill_value(key);
        if present < stores.len() && fill.is_none() {
            return Err(BatchError::PartialAttributePresence {
                path: key.to_owned(),
                present,
                total: stores.len(),
            });
        }

        let mut values = Vec::with_capacity(stores.len());
        let mut rep = None;
        for (i, store) in stores.iter().enumerate() {
            if store.contains_key(key) {
                rep.get_or_insert(i);
            }
            if let Some(value) = store.get(key).or(fill) {
                values.push(value);
            }
        }

        let (value, layout) = collator.merge(key, key, rep.unwrap_or(0), &values)?;
        merged.insert(key, value);
        layouts.insert(key.to_owned(), layout);
    }

    debug!(
        records = stores.len(),
        rows = offsets.total(),
        keys = layouts.len(),
        ?space,
        "collated stores"
    );

    Ok(CollatedStore {
        store: merged,
        offsets,
        membership,
        layouts,
        warnings: collator.warnings,
    })
}

#[allow(clippy::cast_possible_wrap)] // Row counts stay far below i64::MAX
const fn to_i64(n: usize) -> i64 {
    n as i64
}

#[derive(Debug, Clone, Copy)]
struct RecordOffsets {
    rows: i64,
    /// Cumulative source and destination node counts (edge stores only)
    endpoints: Option<(i64, i64)>,
}

struct Collator<'a> {
    policy: &'a dyn KeyPolicy,
    space: RowSpace,
    counts: Vec<usize>,
    increments: Vec<RecordOffsets>,
    warnings: Vec<PolicyWarning>,
}

impl Collator<'_> {
    /// Zip-and-merge one attribute (or sub-attribute) across records
    fn merge(
        &mut self,
        key: &str,
        path: &str,
        rep: usize,
        values: &[&Value],
    ) -> Result<(Value, Layout)> {
        match values[rep] {
            Value::Mapping(first) => {
                let mut maps = Vec::with_capacity(values.len());
                for (record, value) in values.iter().enumerate() {
                    let map = value.as_mapping().ok_or_else(|| {
                        kind_mismatch(path, record, values[rep], value)
                    })?;
                    if map.len() != first.len() || !first.keys().all(|k| map.contains_key(k)) {
                        return Err(BatchError::structure(
                            path,
                            format!(
                                "record {record} has keys {:?}, expected {:?}",
                                map.keys().collect::<Vec<_>>(),
                                first.keys().collect::<Vec<_>>()
                            ),
                        ));
                    }
                    maps.push(map);
                }

                let mut merged = IndexMap::with_capacity(first.len());
                let mut layouts = IndexMap::with_capacity(first.len());
                for sub in first.keys() {
                    let children: Vec<&Value> =
                        maps.iter().filter_map(|m| m.get(sub)).collect();
                    let (value, layout) =
                        self.merge(key, &format!("{path}.{sub}"), rep, &children)?;
                    merged.insert(sub.clone(), value);
                    layouts.insert(sub.clone(), layout);
                }
                Ok((Value::Mapping(merged), Layout::Mapping(layouts)))
            }
            Value::Sequence(first) => {
                let mut seqs = Vec::with_capacity(values.len());
                for (record, value) in values.iter().enumerate() {
                    let seq = value.as_sequence().ok_or_else(|| {
                        kind_mismatch(path, record, values[rep], value)
                    })?;
                    if seq.len() != first.len() {
                        return Err(BatchError::structure(
                            path,
                            format!(
                                "record {record} holds {} items, expected {}",
                                seq.len(),
                                first.len()
                            ),
                        ));
                    }
                    seqs.push(seq);
                }

                let mut merged = Vec::with_capacity(first.len());
                let mut layouts = Vec::with_capacity(first.len());
                for pos in 0..first.len() {
                    let children: Vec<&Value> = seqs.iter().map(|s| &s[pos]).collect();
                    let (value, layout) =
                        self.merge(key, &format!("{path}[{pos}]"), rep, &children)?;
                    merged.push(value);
                    layouts.push(layout);
                }
                Ok((Value::Sequence(merged), Layout::Sequence(layouts)))
            }
            leaf => {
                if let Some((record, value)) = values
                    .iter()
                    .enumerate()
                    .find(|(_, v)| v.kind() != leaf.kind())
                {
                    return Err(kind_mismatch(path, record, leaf, value));
                }
                self.merge_leaf(key, path, rep, values)
            }
        }
    }

    fn merge_leaf(
        &mut self,
        key: &str,
        path: &str,
        rep: usize,
        values: &[&Value],
    ) -> Result<(Value, Layout)> {
        let sample = values[rep];
        let ctx = PolicyContext {
            path,
            space: self.space,
            row_count: self.counts[rep],
            peers: values,
        };
        let policy = self.policy.resolve(key, sample, &ctx);

        if policy.ambiguous {
            let shape = sample.as_tensor().map(|t| t.shape().to_vec()).unwrap_or_default();
            warn!(path, ?shape, "no row-space match, stacking along a new leading axis");
            self.warnings.push(PolicyWarning {
                path: path.to_owned(),
                shape,
            });
        }

        let increments = self.increments_for(path, &policy)?;
        let shifted = match &increments {
            Some(incs) => values
                .iter()
                .zip(incs)
                .map(|(value, inc)| inc.apply(path, value, false).map(Cow::Owned))
                .collect::<Result<Vec<_>>>()?,
            None => values.iter().map(|v| Cow::Borrowed(*v)).collect(),
        };

        let (value, slices, origin) = match (policy.concat, sample) {
            (ConcatAxis::Shared, _) => {
                if let Some(record) = values.iter().position(|v| *v != sample) {
                    return Err(BatchError::SharedValueConflict {
                        path: path.to_owned(),
                        record,
                    });
                }
                let layout = LeafLayout {
                    slices: Slices::Shared,
                    increments: None,
                    origin: Origin::Value,
                };
                return Ok((sample.clone(), Layout::Leaf(layout)));
            }
            (ConcatAxis::Collect, _) => {
                let items = shifted.into_iter().map(Cow::into_owned).collect();
                (Value::Sequence(items), Slices::Collect, Origin::Value)
            }
            (concat, Value::Tensor(_)) => {
                let parts: Vec<&Tensor> = shifted.iter().filter_map(|v| v.as_tensor()).collect();
                let (tensor, slices) = merge_tensors(path, concat, &parts)?;
                (Value::Tensor(tensor), slices, Origin::Value)
            }
            (concat, Value::Sparse(_)) => {
                let parts: Vec<&SparseTensor> =
                    shifted.iter().filter_map(|v| v.as_sparse()).collect();
                let (sparse, slices) = merge_sparse(path, concat, &parts)?;
                (Value::Sparse(sparse), slices, Origin::Value)
            }
            (ConcatAxis::Stack, Value::Scalar(_)) => {
                let tensors = shifted
                    .iter()
                    .map(|v| {
                        v.as_scalar().and_then(Scalar::to_tensor).ok_or_else(|| {
                            BatchError::unsupported(path, ConcatAxis::Stack, "string scalars")
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let parts: Vec<&Tensor> = tensors.iter().collect();
                let stacked = Tensor::stack(path, &parts)?;
                (Value::Tensor(stacked), Slices::Stack, Origin::Scalar)
            }
            (concat, _) => {
                return Err(BatchError::unsupported(
                    path,
                    concat,
                    "scalars can only be stacked, collected or shared",
                ))
            }
        };

        let layout = LeafLayout {
            slices,
            increments,
            origin,
        };
        Ok((value, Layout::Leaf(layout)))
    }

    fn increments_for(&self, path: &str, policy: &LeafPolicy) -> Result<Option<Vec<Increment>>> {
        if policy.concat == ConcatAxis::Shared {
            return Ok(None);
        }
        match policy.increment {
            IncrementSource::None => Ok(None),
            IncrementSource::Rows => Ok(Some(
                self.increments
                    .iter()
                    .map(|o| Increment::Rows(o.rows))
                    .collect(),
            )),
            IncrementSource::Endpoints => self
                .increments
                .iter()
                .map(|o| {
                    o.endpoints
                        .map(|(src, dst)| Increment::Endpoints { src, dst })
                        .ok_or_else(|| {
                            BatchError::unsupported(
                                path,
                                IncrementSource::Endpoints,
                                "no endpoint node tables for this store",
                            )
                        })
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
        }
    }
}

fn merge_tensors(path: &str, concat: ConcatAxis, parts: &[&Tensor]) -> Result<(Tensor, Slices)> {
    let rank = parts.first().map_or(0, |t| t.ndim());
    let axis = match concat {
        ConcatAxis::Stack => return Ok((Tensor::stack(path, parts)?, Slices::Stack)),
        ConcatAxis::Axis(axis) => axis,
        ConcatAxis::Last if rank > 0 => rank - 1,
        other => {
            let reason = if rank == 0 {
                "rank-0 tensors have no axis to concatenate"
            } else {
                "dense tensors merge by axis or stack"
            };
            return Err(BatchError::unsupported(path, other, reason));
        }
    };

    let merged = Tensor::concat(path, axis, parts)?;
    let bounds = OffsetTable::from_counts(parts.iter().map(|t| t.shape()[axis]));
    Ok((merged, Slices::Axis { axis, bounds }))
}

fn merge_sparse(
    path: &str,
    concat: ConcatAxis,
    parts: &[&SparseTensor],
) -> Result<(SparseTensor, Slices)> {
    let (shift_rows, shift_cols) = match concat {
        ConcatAxis::Diagonal => (true, true),
        ConcatAxis::Axis(0) => (true, false),
        ConcatAxis::Axis(1) | ConcatAxis::Last => (false, true),
        other => {
            return Err(BatchError::unsupported(
                path,
                other,
                "sparse values merge block-diagonally or along axis 0 or 1",
            ))
        }
    };

    let merged = SparseTensor::concat(path, parts, shift_rows, shift_cols)?;
    let rows = shift_rows.then(|| OffsetTable::from_counts(parts.iter().map(|s| s.shape()[0])));
    let cols = shift_cols.then(|| OffsetTable::from_counts(parts.iter().map(|s| s.shape()[1])));
    let nnz = OffsetTable::from_counts(parts.iter().map(|s| s.nnz()));
    Ok((merged, Slices::Sparse { rows, cols, nnz }))
}

fn kind_mismatch(path: &str, record: usize, expected: &Value, found: &Value) -> BatchError {
    BatchError::structure(
        path,
        format!(
            "record {record} holds a {:?}, expected a {:?}",
            found.kind(),
            expected.kind()
        ),
    )
}
