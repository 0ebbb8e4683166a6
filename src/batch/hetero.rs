//! Heterogeneous batching: one collation per node type and per edge type
//!
//! ```text
//! record 0:  paper 100, author 200      record 1:  paper 50, author 100
//!
//! paper ptr:   [0, 100, 150]
//! author ptr:  [0, 200, 300]
//! global ptr:  [0, 300, 450]
//!
//! (paper, to, author) edge_index of record 1:
//!   row 0 (sources)      + 100
//!   row 1 (destinations) + 200
//! ```

use crate::batch::collate::{collate_edges, collate_stores};
use crate::batch::{CollatedStore, KeyPolicy, OffsetTable, PolicyWarning, Selector};
use crate::error::{BatchError, Result};
use crate::storage::{EdgeType, HeteroRecord, RowSpace, Store};
use indexmap::{IndexMap, IndexSet};
use tracing::debug_span;

/// Merged heterogeneous records
#[derive(Debug, Clone)]
pub struct HeteroBatch {
    nodes: IndexMap<String, CollatedStore>,
    edges: IndexMap<EdgeType, CollatedStore>,
    graph: CollatedStore,
    num_records: usize,
}

impl HeteroBatch {
    /// Merge `records`, which must all declare the same node and edge types
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::StructuralMismatch`] when type sets differ or an edge
    /// type names an unknown node type, plus any per-store collation error.
    pub fn from_records(records: &[&HeteroRecord], policy: &dyn KeyPolicy) -> Result<Self> {
        let node_types: IndexSet<&str> = records
            .first()
            .map(|r| r.node_types().collect())
            .unwrap_or_default();
        let edge_types: IndexSet<&EdgeType> = records
            .first()
            .map(|r| r.edge_types().collect())
            .unwrap_or_default();

        for (i, record) in records.iter().enumerate().skip(1) {
            let nodes: IndexSet<&str> = record.node_types().collect();
            if nodes != node_types {
                return Err(BatchError::structure(
                    "node types",
                    format!("record {i} has {nodes:?}, expected {node_types:?}"),
                ));
            }
            let edges: IndexSet<&EdgeType> = record.edge_types().collect();
            if edges != edge_types {
                return Err(BatchError::structure(
                    "edge types",
                    format!("record {i} has {} edge types, expected {}", edges.len(), edge_types.len()),
                ));
            }
        }
        for edge_type in &edge_types {
            for end in [&edge_type.src, &edge_type.dst] {
                if !node_types.contains(end.as_str()) {
                    return Err(BatchError::structure(
                        &edge_type.to_string(),
                        format!("unknown node type `{end}`"),
                    ));
                }
            }
        }

        let mut nodes = IndexMap::with_capacity(node_types.len());
        for &node_type in &node_types {
            let _span = debug_span!("collate", node_type).entered();
            let stores = gather(records, |r| r.node(node_type))?;
            let mut collated = collate_stores(&stores, RowSpace::Nodes, None, policy)?;
            qualify_warnings(&mut collated, node_type);
            nodes.insert(node_type.to_owned(), collated);
        }

        let mut edges = IndexMap::with_capacity(edge_types.len());
        for &edge_type in &edge_types {
            let _span = debug_span!("collate", %edge_type).entered();
            let src = &nodes[edge_type.src.as_str()];
            let dst = &nodes[edge_type.dst.as_str()];
            let stores = gather(records, |r| r.edge(edge_type))?;
            let mut collated = collate_edges(&stores, src.offsets(), dst.offsets(), policy)?;
            qualify_warnings(&mut collated, &edge_type.to_string());
            edges.insert(edge_type.clone(), collated);
        }

        let graphs: Vec<&Store> = records.iter().map(|r| r.graph()).collect();
        let graph = collate_stores(&graphs, RowSpace::Graph, None, policy)?;

        Ok(Self {
            nodes,
            edges,
            graph,
            num_records: records.len(),
        })
    }

    /// Collated store of `node_type`
    #[must_use]
    pub fn node(&self, node_type: &str) -> Option<&CollatedStore> {
        self.nodes.get(node_type)
    }

    /// Collated store of `edge_type`
    #[must_use]
    pub fn edge(&self, edge_type: &EdgeType) -> Option<&CollatedStore> {
        self.edges.get(edge_type)
    }

    /// Collated per-graph attributes
    #[must_use]
    pub const fn graph(&self) -> &CollatedStore {
        &self.graph
    }

    /// Node type names
    pub fn node_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.keys().map(String::as_str)
    }

    /// Edge types
    pub fn edge_types(&self) -> impl Iterator<Item = &EdgeType> + '_ {
        self.edges.keys()
    }

    /// Number of merged records
    #[must_use]
    pub const fn num_records(&self) -> usize {
        self.num_records
    }

    /// Total node count over all node types
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.values().map(CollatedStore::num_rows).sum()
    }

    /// Pointer array over all node types together (per-record node totals)
    #[must_use]
    pub fn global_ptr(&self) -> OffsetTable {
        OffsetTable::sum_of(
            self.num_records,
            self.nodes.values().map(CollatedStore::offsets),
        )
    }

    /// Every ambiguous fallback, paths qualified by their type
    pub fn warnings(&self) -> impl Iterator<Item = &PolicyWarning> + '_ {
        self.nodes
            .values()
            .chain(self.edges.values())
            .chain(std::iter::once(&self.graph))
            .flat_map(CollatedStore::warnings)
    }

    /// Reconstruct record `record`
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::SelectorOutOfRange`] if `record >= num_records()`.
    pub fn get(&self, record: usize) -> Result<HeteroRecord> {
        Selector::Index(record).resolve(self.num_records)?;

        let mut out = HeteroRecord::new();
        for (node_type, collated) in &self.nodes {
            out.insert_node(node_type.clone(), collated.get(record)?);
        }
        for (edge_type, collated) in &self.edges {
            out.insert_edge(edge_type.clone(), collated.get(record)?);
        }
        out.set_graph(self.graph.get(record)?);
        Ok(out)
    }

    /// Reconstruct the selected records, in selection order
    ///
    /// # Errors
    ///
    /// Fails if the selector does not resolve against this batch.
    pub fn index_select(&self, selector: &Selector) -> Result<Vec<HeteroRecord>> {
        selector
            .resolve(self.num_records)?
            .into_iter()
            .map(|record| self.get(record))
            .collect()
    }

    /// Reconstruct every record
    ///
    /// # Errors
    ///
    /// Fails only if a merged store no longer matches its layout.
    pub fn to_records(&self) -> Result<Vec<HeteroRecord>> {
        (0..self.num_records).map(|record| self.get(record)).collect()
    }
}

fn gather<'a, F>(records: &[&'a HeteroRecord], pick: F) -> Result<Vec<&'a Store>>
where
    F: Fn(&'a HeteroRecord) -> Option<&'a Store>,
{
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            pick(*record).ok_or_else(|| {
                BatchError::structure("types", format!("record {i} is missing a declared type"))
            })
        })
        .collect()
}

fn qualify_warnings(collated: &mut CollatedStore, type_name: &str) {
    for warning in &mut collated.warnings {
        warning.path = format!("{type_name}.{}", warning.path);
    }
}
