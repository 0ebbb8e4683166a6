//! Attribute stores
//!
//! A [`Store`] is one bucket of attributes sharing a row space: the nodes of one
//! node type, the edges of one edge type, or the per-graph attributes.

use crate::storage::Value;
use indexmap::IndexMap;

/// What one "row" of a store counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowSpace {
    /// Rows are nodes (homogeneous graphs keep their edges here too)
    Nodes,
    /// Rows are edges of one edge type
    Edges,
    /// One row per graph
    Graph,
}

/// Typed bucket of attributes plus its row count
///
/// # Example
///
/// ```
/// use graph_batch::{Store, Tensor};
/// use ndarray::array;
///
/// let store = Store::nodes()
///     .with("x", Tensor::from(array![1.0_f32, 2.0, 3.0]))
///     .with("edge_index", Tensor::from(array![[0_i64, 1], [1, 2]]));
///
/// assert_eq!(store.row_count(), 3);
/// assert_eq!(store.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    space: RowSpace,
    attrs: IndexMap<String, Value>,
    /// Explicit row count hint (`num_nodes`)
    rows: Option<usize>,
}

impl Store {
    /// Empty store over `space`
    #[must_use]
    pub fn new(space: RowSpace) -> Self {
        Self {
            space,
            attrs: IndexMap::new(),
            rows: None,
        }
    }

    /// Empty node store
    #[must_use]
    pub fn nodes() -> Self {
        Self::new(RowSpace::Nodes)
    }

    /// Empty edge store
    #[must_use]
    pub fn edges() -> Self {
        Self::new(RowSpace::Edges)
    }

    /// Empty per-graph store
    #[must_use]
    pub fn graph() -> Self {
        Self::new(RowSpace::Graph)
    }

    /// Builder: set an explicit row count
    #[must_use]
    pub fn with_row_count(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Builder: insert an attribute
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set an explicit row count
    pub fn set_row_count(&mut self, rows: usize) {
        self.rows = Some(rows);
    }

    /// Insert an attribute, returning the previous value under `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attrs.insert(key.into(), value.into())
    }

    /// Remove an attribute
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attrs.shift_remove(key)
    }

    /// Look up an attribute
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Mutable access to an attribute
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.attrs.get_mut(key)
    }

    /// True if `key` is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Attribute keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.attrs.keys().map(String::as_str)
    }

    /// `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes
    #[must_use]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True if the store holds no attributes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Row space
    #[must_use]
    pub const fn space(&self) -> RowSpace {
        self.space
    }

    /// Explicit row count hint, if one was set
    #[must_use]
    pub const fn explicit_row_count(&self) -> Option<usize> {
        self.rows
    }

    /// Number of rows along the primary axis
    ///
    /// Uses the explicit hint when set; otherwise infers it from the attributes.
    /// A per-graph store always has one row.
    #[must_use]
    pub fn row_count(&self) -> usize {
        if self.space == RowSpace::Graph {
            return 1;
        }
        self.rows.unwrap_or_else(|| match self.space {
            RowSpace::Edges => self.infer_edge_count(),
            _ => self.infer_node_count(),
        })
    }

    fn infer_node_count(&self) -> usize {
        // Node features first
        for key in ["x", "pos"] {
            if let Some(Value::Tensor(t)) = self.get(key) {
                if t.ndim() > 0 {
                    return t.shape()[0];
                }
            }
        }

        if let Some(sparse) = self.attrs.values().find_map(Value::as_sparse) {
            return sparse.shape()[0];
        }

        // Fall back to the largest referenced node index
        ["edge_index", "face"]
            .iter()
            .filter_map(|key| self.get(key).and_then(Value::as_tensor))
            .filter_map(|t| t.max_index())
            .max()
            .and_then(|max| usize::try_from(max + 1).ok())
            .unwrap_or(0)
    }

    fn infer_edge_count(&self) -> usize {
        if let Some(Value::Tensor(t)) = self.get("edge_index") {
            if let Some(&edges) = t.shape().last() {
                return edges;
            }
        }

        self.attrs
            .values()
            .filter_map(Value::as_tensor)
            .find(|t| t.ndim() > 0)
            .map_or(0, |t| t.shape()[0])
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.space == other.space
            && self.row_count() == other.row_count()
            && self.attrs == other.attrs
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Store {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
