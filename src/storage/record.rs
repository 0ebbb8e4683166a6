//! Graph records
//!
//! A homogeneous record is a single node store holding node, edge and graph
//! attributes together. A heterogeneous record keeps one store per node type,
//! one per `(src, relation, dst)` edge type, and one per-graph store.

use crate::storage::{RowSpace, Store};
use indexmap::IndexMap;
use std::fmt;

/// Relation between two node types
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeType {
    /// Source node type
    pub src: String,
    /// Relation name
    pub relation: String,
    /// Destination node type
    pub dst: String,
}

impl EdgeType {
    /// Relation name used when only `(src, dst)` is given
    pub const DEFAULT_RELATION: &'static str = "to";

    /// New edge type
    pub fn new(src: impl Into<String>, relation: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            relation: relation.into(),
            dst: dst.into(),
        }
    }
}

impl From<(&str, &str)> for EdgeType {
    fn from((src, dst): (&str, &str)) -> Self {
        Self::new(src, Self::DEFAULT_RELATION, dst)
    }
}

impl From<(&str, &str, &str)> for EdgeType {
    fn from((src, relation, dst): (&str, &str, &str)) -> Self {
        Self::new(src, relation, dst)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.src, self.relation, self.dst)
    }
}

/// Graph with typed node and edge populations
///
/// # Example
///
/// ```
/// use graph_batch::{HeteroRecord, Tensor};
/// use ndarray::{array, Array2};
///
/// let mut paper_author = HeteroRecord::new();
/// paper_author.node_mut("paper").insert("x", Tensor::from(Array2::<f32>::zeros((4, 8))));
/// paper_author.node_mut("author").set_row_count(2);
/// paper_author
///     .edge_mut(("paper", "author"))
///     .insert("edge_index", Tensor::from(array![[0_i64, 3], [1, 0]]));
///
/// assert_eq!(paper_author.num_nodes(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HeteroRecord {
    nodes: IndexMap<String, Store>,
    edges: IndexMap<EdgeType, Store>,
    graph: Store,
}

impl Default for HeteroRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl HeteroRecord {
    /// Record with no types
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            graph: Store::graph(),
        }
    }

    /// Node store of `node_type`, created empty if missing
    pub fn node_mut(&mut self, node_type: &str) -> &mut Store {
        self.nodes
            .entry(node_type.to_owned())
            .or_insert_with(Store::nodes)
    }

    /// Edge store of `edge_type`, created empty if missing
    pub fn edge_mut(&mut self, edge_type: impl Into<EdgeType>) -> &mut Store {
        self.edges.entry(edge_type.into()).or_insert_with(Store::edges)
    }

    /// Replace the node store of `node_type`
    pub fn insert_node(&mut self, node_type: impl Into<String>, store: Store) -> Option<Store> {
        self.nodes.insert(node_type.into(), store)
    }

    /// Replace the edge store of `edge_type`
    pub fn insert_edge(&mut self, edge_type: impl Into<EdgeType>, store: Store) -> Option<Store> {
        self.edges.insert(edge_type.into(), store)
    }

    /// Node store of `node_type`
    #[must_use]
    pub fn node(&self, node_type: &str) -> Option<&Store> {
        self.nodes.get(node_type)
    }

    /// Edge store of `edge_type`
    #[must_use]
    pub fn edge(&self, edge_type: &EdgeType) -> Option<&Store> {
        self.edges.get(edge_type)
    }

    /// Per-graph attributes
    #[must_use]
    pub const fn graph(&self) -> &Store {
        &self.graph
    }

    /// Mutable per-graph attributes
    pub fn graph_mut(&mut self) -> &mut Store {
        &mut self.graph
    }

    pub(crate) fn set_graph(&mut self, store: Store) {
        debug_assert_eq!(store.space(), RowSpace::Graph);
        self.graph = store;
    }

    /// Node type names in insertion order
    pub fn node_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.keys().map(String::as_str)
    }

    /// Edge types in insertion order
    pub fn edge_types(&self) -> impl Iterator<Item = &EdgeType> + '_ {
        self.edges.keys()
    }

    /// `(type, store)` pairs of all node types
    pub fn node_stores(&self) -> impl Iterator<Item = (&str, &Store)> + '_ {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `(type, store)` pairs of all edge types
    pub fn edge_stores(&self) -> impl Iterator<Item = (&EdgeType, &Store)> + '_ {
        self.edges.iter()
    }

    /// Total node count across node types
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.values().map(Store::row_count).sum()
    }

    /// Total edge count across edge types
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.values().map(Store::row_count).sum()
    }
}

/// One graph, before batching or after splitting a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Single node type, single edge type
    Homogeneous(Store),
    /// Typed node and edge populations
    Heterogeneous(HeteroRecord),
}

impl Record {
    /// Number of nodes (summed over node types)
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        match self {
            Self::Homogeneous(store) => store.row_count(),
            Self::Heterogeneous(record) => record.num_nodes(),
        }
    }

    /// Borrow the homogeneous store
    #[must_use]
    pub const fn as_homogeneous(&self) -> Option<&Store> {
        match self {
            Self::Homogeneous(store) => Some(store),
            Self::Heterogeneous(_) => None,
        }
    }

    /// Borrow the heterogeneous record
    #[must_use]
    pub const fn as_heterogeneous(&self) -> Option<&HeteroRecord> {
        match self {
            Self::Heterogeneous(record) => Some(record),
            Self::Homogeneous(_) => None,
        }
    }
}

impl From<Store> for Record {
    fn from(store: Store) -> Self {
        Self::Homogeneous(store)
    }
}

impl From<HeteroRecord> for Record {
    fn from(record: HeteroRecord) -> Self {
        Self::Heterogeneous(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Tensor;
    use ndarray::array;

    #[test]
    fn test_edge_type_from_pair_uses_default_relation() {
        let edge_type = EdgeType::from(("p", "a"));
        assert_eq!(edge_type, EdgeType::new("p", "to", "a"));
        assert_eq!(edge_type.to_string(), "(p, to, a)");
    }

    #[test]
    fn test_num_nodes_sums_types() {
        let mut record = HeteroRecord::new();
        record.node_mut("p").set_row_count(100);
        record.node_mut("a").set_row_count(200);
        record
            .edge_mut(("p", "a"))
            .insert("edge_index", Tensor::from(array![[0_i64, 1], [5, 6]]));

        assert_eq!(record.num_nodes(), 300);
        assert_eq!(record.num_edges(), 2);
        assert_eq!(record.node_types().collect::<Vec<_>>(), vec!["p", "a"]);
        assert_eq!(Record::from(record).num_nodes(), 300);
    }

    #[test]
    fn test_record_accessors() {
        let record = Record::from(Store::nodes().with_row_count(3));
        assert!(record.as_homogeneous().is_some());
        assert!(record.as_heterogeneous().is_none());
        assert_eq!(record.num_nodes(), 3);
    }
}
