//! Key policy: how each attribute is merged
//!
//! For every leaf value the collator asks a [`KeyPolicy`] two questions:
//!
//! - along which axis to merge (concatenate, stack, block-diagonal, collect,
//!   or keep one shared copy), and
//! - whether the values are indices into a row space that must be shifted by
//!   the cumulative row count of the preceding records.
//!
//! [`Policy`] is the default implementation. Its inference can be overridden
//! per key, and extra index-bearing keys can be registered.

use crate::storage::{RowSpace, Scalar, Value};
use indexmap::{IndexMap, IndexSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the per-record values of one leaf are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConcatAxis {
    /// Concatenate along an existing axis
    Axis(usize),
    /// Concatenate along the last axis
    Last,
    /// Stack along a new leading axis: `n` values of shape `s` become `[n, ..s]`
    Stack,
    /// Block-diagonal: offset both axes of a sparse matrix
    Diagonal,
    /// Keep the per-record values as a sequence
    Collect,
    /// Keep a single copy; every record must hold an equal value
    Shared,
}

/// Which cumulative count offsets an index-like value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IncrementSource {
    /// Not index-like
    #[default]
    None,
    /// The store's own cumulative row count
    Rows,
    /// Leading-axis row 0 by the source node type's count, row 1 by the destination's
    Endpoints,
}

/// Resolved policy for one leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafPolicy {
    /// Merge axis
    pub concat: ConcatAxis,
    /// Offset source
    pub increment: IncrementSource,
    /// Set when inference fell back to stacking without clear evidence
    pub ambiguous: bool,
}

impl LeafPolicy {
    /// Non-index policy merging along `concat`
    #[must_use]
    pub const fn new(concat: ConcatAxis) -> Self {
        Self {
            concat,
            increment: IncrementSource::None,
            ambiguous: false,
        }
    }

    /// Same policy with an offset source
    #[must_use]
    pub const fn with_increment(mut self, increment: IncrementSource) -> Self {
        self.increment = increment;
        self
    }

    const fn ambiguous(mut self) -> Self {
        self.ambiguous = true;
        self
    }

    /// True if values are shifted on merge
    #[must_use]
    pub const fn is_index_like(&self) -> bool {
        !matches!(self.increment, IncrementSource::None)
    }
}

/// What the collator knows about a leaf when asking for its policy
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Full attribute path (`x`, `x.paper`, `edge_index[1]`)
    pub path: &'a str,
    /// Row space of the stores being merged
    pub space: RowSpace,
    /// Row count of the representative record
    pub row_count: usize,
    /// The leaf value of every record, in record order
    pub peers: &'a [&'a Value],
}

/// Per-key merge rules
///
/// `key` is the top-level attribute key; nested leaves inherit it, so the rule
/// for `edge_index` also applies to every tensor inside an `edge_index` list.
pub trait KeyPolicy {
    /// Policy for the leaf `sample` (the representative record's value)
    fn resolve(&self, key: &str, sample: &Value, ctx: &PolicyContext<'_>) -> LeafPolicy;

    /// Value substituted for records missing `key` (`None` makes absence fatal)
    fn fill_value(&self, _key: &str) -> Option<&Value> {
        None
    }
}

/// Caller-supplied override for one key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyOverride {
    /// Forced merge axis
    pub concat: Option<ConcatAxis>,
    /// Forced offset source
    pub increment: Option<IncrementSource>,
    /// Fill value for records missing the key
    pub fill: Option<Value>,
}

/// Default key policy with per-key overrides
///
/// Inference, first match wins:
///
/// 1. strings are collected;
/// 2. index keys (`edge_index`, `face`, `*_index`, registered keys) concatenate
///    along the last axis and are shifted: by both endpoint types inside an edge
///    store (two-row tensors only), by the store's own rows inside a node store,
///    and not at all inside a per-graph store;
/// 3. sparse values merge block-diagonally;
/// 4. numeric scalars and rank-0 tensors are stacked;
/// 5. `edge_*` tensors of a node store concatenate along axis 0;
/// 6. tensors leading with the store's row count concatenate along axis 0;
/// 7. tensors whose leading extent varies across records concatenate along axis 0;
/// 8. anything else is stacked, and flagged ambiguous outside per-graph stores.
///
/// # Example
///
/// ```
/// use graph_batch::{ConcatAxis, IncrementSource, Policy};
///
/// let policy = Policy::new()
///     .with_concat("foo", ConcatAxis::Stack)
///     .with_index_key("perm")
///     .with_increment("ptr_like", IncrementSource::Rows);
/// assert!(policy.is_index_key("perm"));
/// assert!(policy.is_index_key("edge_index"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Policy {
    index_keys: IndexSet<String>,
    overrides: IndexMap<String, KeyOverride>,
}

impl Policy {
    /// Default policy without overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` as index-bearing
    #[must_use]
    pub fn with_index_key(mut self, key: impl Into<String>) -> Self {
        self.index_keys.insert(key.into());
        self
    }

    /// Force the merge axis of `key`
    #[must_use]
    pub fn with_concat(mut self, key: impl Into<String>, concat: ConcatAxis) -> Self {
        self.overrides.entry(key.into()).or_default().concat = Some(concat);
        self
    }

    /// Force the offset source of `key`
    #[must_use]
    pub fn with_increment(mut self, key: impl Into<String>, increment: IncrementSource) -> Self {
        self.overrides.entry(key.into()).or_default().increment = Some(increment);
        self
    }

    /// Tolerate records missing `key`, substituting `fill`
    #[must_use]
    pub fn with_fill(mut self, key: impl Into<String>, fill: impl Into<Value>) -> Self {
        self.overrides.entry(key.into()).or_default().fill = Some(fill.into());
        self
    }

    /// Override registered for `key`
    #[must_use]
    pub fn override_for(&self, key: &str) -> Option<&KeyOverride> {
        self.overrides.get(key)
    }

    /// True if `key` holds indices by name or registration
    #[must_use]
    pub fn is_index_key(&self, key: &str) -> bool {
        key == "edge_index"
            || key == "face"
            || key.ends_with("_index")
            || self.index_keys.contains(key)
    }

    fn infer(&self, key: &str, sample: &Value, ctx: &PolicyContext<'_>) -> LeafPolicy {
        let index = self.is_index_key(key);
        // Per-graph stores have one row per record; their indices are not shifted
        let index_source = match ctx.space {
            RowSpace::Nodes => IncrementSource::Rows,
            RowSpace::Edges => IncrementSource::Endpoints,
            RowSpace::Graph => IncrementSource::None,
        };

        let tensor = match sample {
            Value::Scalar(Scalar::Str(_)) | Value::Sequence(_) | Value::Mapping(_) => {
                return LeafPolicy::new(ConcatAxis::Collect)
            }
            Value::Scalar(_) if index => {
                return LeafPolicy::new(ConcatAxis::Stack).with_increment(index_source)
            }
            Value::Scalar(_) => return LeafPolicy::new(ConcatAxis::Stack),
            Value::Sparse(_) => return LeafPolicy::new(ConcatAxis::Diagonal),
            Value::Tensor(t) => t,
        };

        if tensor.ndim() == 0 {
            let policy = LeafPolicy::new(ConcatAxis::Stack);
            return if index {
                policy.with_increment(index_source)
            } else {
                policy
            };
        }
        if index {
            return LeafPolicy::new(ConcatAxis::Last).with_increment(index_source);
        }
        if ctx.space == RowSpace::Nodes && key.starts_with("edge_") {
            return LeafPolicy::new(ConcatAxis::Axis(0));
        }
        if tensor.shape()[0] == ctx.row_count || leading_extent_varies(tensor.shape(), ctx.peers) {
            return LeafPolicy::new(ConcatAxis::Axis(0));
        }
        if ctx.space == RowSpace::Graph {
            return LeafPolicy::new(ConcatAxis::Stack);
        }
        LeafPolicy::new(ConcatAxis::Stack).ambiguous()
    }
}

/// True if peers differ on axis 0 but agree on rank and every other axis
fn leading_extent_varies(shape: &[usize], peers: &[&Value]) -> bool {
    let mut varies = false;
    for peer in peers {
        let Some(other) = peer.as_tensor().map(crate::storage::Tensor::shape) else {
            return false;
        };
        if other.len() != shape.len() || other[1..] != shape[1..] {
            return false;
        }
        varies |= other[0] != shape[0];
    }
    varies
}

impl KeyPolicy for Policy {
    fn resolve(&self, key: &str, sample: &Value, ctx: &PolicyContext<'_>) -> LeafPolicy {
        let mut policy = self.infer(key, sample, ctx);
        if let Some(forced) = self.overrides.get(key) {
            if let Some(concat) = forced.concat {
                policy.concat = concat;
                policy.ambiguous = false;
            }
            if let Some(increment) = forced.increment {
                policy.increment = increment;
            }
        }
        policy
    }

    fn fill_value(&self, key: &str) -> Option<&Value> {
        self.overrides.get(key).and_then(|o| o.fill.as_ref())
    }
}

/// Deserializable policy configuration
///
/// ```
/// # #[cfg(feature = "serde")]
/// # {
/// use graph_batch::{ConcatAxis, Policy, PolicyConfig};
///
/// let config: PolicyConfig = serde_json::from_str(
///     r#"{ "index_keys": ["perm"], "overrides": { "foo": { "concat": "stack" } } }"#,
/// ).unwrap();
/// let policy = Policy::from(config);
/// assert!(policy.is_index_key("perm"));
/// assert_eq!(policy.override_for("foo").unwrap().concat, Some(ConcatAxis::Stack));
/// # }
/// ```
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Extra index-bearing keys
    pub index_keys: Vec<String>,
    /// Per-key overrides
    pub overrides: IndexMap<String, OverrideConfig>,
}

/// Serializable part of a [`KeyOverride`]
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    /// Forced merge axis
    pub concat: Option<ConcatAxis>,
    /// Forced offset source
    pub increment: Option<IncrementSource>,
}

#[cfg(feature = "serde")]
impl From<PolicyConfig> for Policy {
    fn from(config: PolicyConfig) -> Self {
        let mut policy = config
            .index_keys
            .into_iter()
            .fold(Self::new(), |policy, key| policy.with_index_key(key));
        for (key, forced) in config.overrides {
            let entry = policy.overrides.entry(key).or_default();
            entry.concat = forced.concat;
            entry.increment = forced.increment;
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SparseTensor, Tensor};
    use ndarray::{array, Array2};

    fn resolve(policy: &Policy, key: &str, space: RowSpace, rows: usize, peers: &[&Value]) -> LeafPolicy {
        let ctx = PolicyContext {
            path: key,
            space,
            row_count: rows,
            peers,
        };
        policy.resolve(key, peers[0], &ctx)
    }

    #[test]
    fn test_edge_index_is_index_like_on_last_axis() {
        let edges = Value::from(Tensor::from(array![[0_i64, 1], [1, 0]]));
        let policy = resolve(&Policy::new(), "edge_index", RowSpace::Nodes, 3, &[&edges]);
        assert_eq!(policy.concat, ConcatAxis::Last);
        assert_eq!(policy.increment, IncrementSource::Rows);

        let policy = resolve(&Policy::new(), "edge_index", RowSpace::Edges, 2, &[&edges]);
        assert_eq!(policy.increment, IncrementSource::Endpoints);
    }

    #[test]
    fn test_graph_level_indices_are_not_shifted() {
        let root = Value::from(0_i64);
        let policy = resolve(&Policy::new(), "root_index", RowSpace::Graph, 1, &[&root]);
        assert_eq!(policy.concat, ConcatAxis::Stack);
        assert!(!policy.is_index_like());

        let pairs = Value::from(Tensor::from(array![[0_i64, 1], [1, 0]]));
        let policy = resolve(&Policy::new(), "pair_index", RowSpace::Graph, 1, &[&pairs]);
        assert_eq!(policy.concat, ConcatAxis::Last);
        assert_eq!(policy.increment, IncrementSource::None);
    }

    #[test]
    fn test_index_key_by_suffix_and_registration() {
        let policy = Policy::new().with_index_key("perm");
        assert!(policy.is_index_key("face"));
        assert!(policy.is_index_key("edge_label_index"));
        assert!(policy.is_index_key("perm"));
        assert!(!policy.is_index_key("x"));
    }

    #[test]
    fn test_node_features_concat_on_rows() {
        let x = Value::from(Tensor::from(Array2::<f32>::zeros((3, 8))));
        let policy = resolve(&Policy::new(), "x", RowSpace::Nodes, 3, &[&x]);
        assert_eq!(policy, LeafPolicy::new(ConcatAxis::Axis(0)));
    }

    #[test]
    fn test_homogeneous_edge_attributes_concat_on_rows() {
        let attr = Value::from(Tensor::from(Array2::<f32>::zeros((4, 2))));
        let policy = resolve(&Policy::new(), "edge_attr", RowSpace::Nodes, 3, &[&attr]);
        assert_eq!(policy.concat, ConcatAxis::Axis(0));
        assert!(!policy.ambiguous);
    }

    #[test]
    fn test_varying_leading_extent_concats() {
        let a = Value::from(Tensor::from(Array2::<f32>::zeros((10, 32))));
        let b = Value::from(Tensor::from(Array2::<f32>::zeros((20, 32))));
        let policy = resolve(&Policy::new(), "x", RowSpace::Nodes, 30, &[&a, &b]);
        assert_eq!(policy.concat, ConcatAxis::Axis(0));
    }

    #[test]
    fn test_fixed_size_graph_vector_stacks_ambiguously() {
        let a = Value::from(Tensor::from(array![1.0_f32, 2.0, 3.0, 4.0]));
        let b = Value::from(Tensor::from(array![5.0_f32, 6.0, 7.0, 8.0]));
        let policy = resolve(&Policy::new(), "foo", RowSpace::Nodes, 3, &[&a, &b]);
        assert_eq!(policy.concat, ConcatAxis::Stack);
        assert!(policy.ambiguous);

        let forced = Policy::new().with_concat("foo", ConcatAxis::Stack);
        let policy = resolve(&forced, "foo", RowSpace::Nodes, 3, &[&a, &b]);
        assert_eq!(policy, LeafPolicy::new(ConcatAxis::Stack));
    }

    #[test]
    fn test_scalars_sparse_and_strings() {
        let y = Value::from(Tensor::scalar(1_i64));
        assert_eq!(
            resolve(&Policy::new(), "y", RowSpace::Nodes, 3, &[&y]).concat,
            ConcatAxis::Stack
        );

        let s = Value::from("1");
        assert_eq!(
            resolve(&Policy::new(), "s", RowSpace::Nodes, 3, &[&s]).concat,
            ConcatAxis::Collect
        );

        let adj = Value::from(SparseTensor::new([3, 3], vec![0], vec![1], None).unwrap());
        assert_eq!(
            resolve(&Policy::new(), "adj", RowSpace::Nodes, 3, &[&adj]).concat,
            ConcatAxis::Diagonal
        );

        let root = Value::from(0_i64);
        let policy = resolve(&Policy::new(), "root_index", RowSpace::Nodes, 3, &[&root]);
        assert_eq!(policy.concat, ConcatAxis::Stack);
        assert_eq!(policy.increment, IncrementSource::Rows);
    }

    #[test]
    fn test_overrides_and_fill() {
        let policy = Policy::new()
            .with_increment("x", IncrementSource::Rows)
            .with_fill("mask", Tensor::from(array![false]));
        let x = Value::from(Tensor::from(array![0_i64, 1]));
        assert!(resolve(&policy, "x", RowSpace::Nodes, 2, &[&x]).is_index_like());
        assert!(policy.fill_value("mask").is_some());
        assert!(policy.fill_value("x").is_none());
    }
}
