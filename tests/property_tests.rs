//! Property-based tests for graph-batch
//!
//! Verifies pointer-array and round-trip invariants for arbitrary batches

use graph_batch::{collate, HeteroBatch, HeteroRecord, Policy, Selector, Store, Tensor, Value};
use ndarray::Array2;
use proptest::prelude::*;

/// Strategy: one graph with `1..max_nodes` nodes, random edges and 3-wide features
fn prop_graph(max_nodes: usize, max_edges: usize) -> impl Strategy<Value = Store> {
    (1..max_nodes).prop_flat_map(move |nodes| {
        let edges = prop::collection::vec((0..nodes as i64, 0..nodes as i64), 0..max_edges);
        let feats = prop::collection::vec(-100.0_f32..100.0, nodes * 3);
        (Just(nodes), edges, feats, any::<i64>()).prop_map(|(nodes, edges, feats, label)| {
            let (src, dst): (Vec<i64>, Vec<i64>) = edges.into_iter().unzip();
            let count = src.len();
            let edge_index =
                Tensor::from_shape_vec(&[2, count], [src, dst].concat()).unwrap();
            let x = Tensor::from(Array2::from_shape_vec((nodes, 3), feats).unwrap());
            Store::nodes()
                .with("x", x)
                .with("edge_index", edge_index)
                .with("y", label)
                .with_row_count(nodes)
        })
    })
}

fn prop_graphs() -> impl Strategy<Value = Vec<Store>> {
    prop::collection::vec(prop_graph(12, 20), 0..8)
}

// Property: decollating a collated batch restores every record
proptest! {
    #[test]
    fn prop_round_trip(stores in prop_graphs()) {
        let refs: Vec<&Store> = stores.iter().collect();
        let merged = collate(&refs, &Policy::new()).unwrap();

        prop_assert_eq!(merged.to_stores().unwrap(), stores);
    }
}

// Property: ptr[-1] equals the summed row counts, and ptr is non-decreasing from 0
proptest! {
    #[test]
    fn prop_ptr_is_additive(stores in prop_graphs()) {
        let refs: Vec<&Store> = stores.iter().collect();
        let merged = collate(&refs, &Policy::new()).unwrap();
        let ptr = merged.ptr();

        prop_assert_eq!(ptr.len(), stores.len() + 1);
        prop_assert_eq!(ptr[0], 0);
        prop_assert!(ptr.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(merged.num_rows(), stores.iter().map(Store::row_count).sum::<usize>());
        prop_assert_eq!(merged.store().row_count(), merged.num_rows());
    }
}

// Property: membership is non-decreasing and agrees with ptr
proptest! {
    #[test]
    fn prop_membership_matches_ptr(stores in prop_graphs()) {
        let refs: Vec<&Store> = stores.iter().collect();
        let merged = collate(&refs, &Policy::new()).unwrap();
        let membership = merged.membership();

        prop_assert_eq!(membership.len(), merged.num_rows());
        prop_assert!(membership.windows(2).all(|w| w[0] <= w[1]));
        for (row, &record) in membership.iter().enumerate() {
            prop_assert!(merged.offsets().range(record).contains(&row));
        }
    }
}

// Property: every merged edge endpoint stays inside its own record's node range
proptest! {
    #[test]
    fn prop_merged_indices_stay_in_record(stores in prop_graphs()) {
        let refs: Vec<&Store> = stores.iter().collect();
        let merged = collate(&refs, &Policy::new()).unwrap();

        let edge_index = merged
            .store()
            .get("edge_index")
            .and_then(Value::as_tensor)
            .and_then(Tensor::as_int64);
        let Some(edge_index) = edge_index else {
            prop_assert!(stores.is_empty());
            return Ok(());
        };

        let bounds = merged.bounds("edge_index").unwrap();
        let membership = merged.membership();
        for (record, window) in bounds.windows(2).enumerate() {
            for col in window[0]..window[1] {
                for row in 0..2 {
                    let node = usize::try_from(edge_index[[row, col].as_slice()]).unwrap();
                    prop_assert!(node < merged.num_rows());
                    prop_assert_eq!(membership[node], record);
                }
            }
        }
    }
}

// Property: index_select returns exactly the selected records, in order
proptest! {
    #[test]
    fn prop_index_select_order(
        stores in prop::collection::vec(prop_graph(6, 6), 1..6),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let refs: Vec<&Store> = stores.iter().collect();
        let merged = collate(&refs, &Policy::new()).unwrap();
        let indices: Vec<usize> = picks.iter().map(|p| p.index(stores.len())).collect();

        let selected = merged.index_select(&Selector::from(indices.clone())).unwrap();
        let expected: Vec<Store> = indices.iter().map(|&i| stores[i].clone()).collect();
        prop_assert_eq!(selected, expected);
    }
}

// Property: heterogeneous global ptr is the per-record sum over node types
proptest! {
    #[test]
    fn prop_hetero_global_ptr(counts in prop::collection::vec((0_usize..50, 0_usize..50), 0..6)) {
        let records: Vec<HeteroRecord> = counts
            .iter()
            .map(|&(papers, authors)| {
                let mut record = HeteroRecord::new();
                record.node_mut("paper").set_row_count(papers);
                record.node_mut("author").set_row_count(authors);
                record
            })
            .collect();
        let refs: Vec<&HeteroRecord> = records.iter().collect();
        let batch = HeteroBatch::from_records(&refs, &Policy::new()).unwrap();

        let global = batch.global_ptr();
        for (i, &(papers, authors)) in counts.iter().enumerate() {
            prop_assert_eq!(global.count(i), papers + authors);
        }
        prop_assert_eq!(batch.num_nodes(), global.total());
        prop_assert_eq!(batch.to_records().unwrap(), records);
    }
}
