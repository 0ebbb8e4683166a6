//! Integration tests for graph-batch
//!
//! End-to-end batching scenarios: plain graphs, forced stacking, nested
//! attributes, heterogeneous graphs, and the failure modes callers rely on.

use graph_batch::{
    collate, Batch, BatchError, ConcatAxis, EdgeType, HeteroRecord, IncrementSource, Policy,
    Record, Selector, SparseTensor, Store, Tensor, Value,
};
use ndarray::{array, Array1, Array2, Ix2};

#[allow(clippy::cast_precision_loss)]
fn features(rows: usize, cols: usize, seed: usize) -> Tensor {
    Tensor::from(Array2::from_shape_fn((rows, cols), |(r, c)| {
        (seed * 1000 + r * cols + c) as f32
    }))
}

#[allow(clippy::cast_possible_wrap)]
fn ring(nodes: usize, seed: usize) -> Tensor {
    let src: Vec<i64> = (0..nodes).map(|i| i as i64).collect();
    let dst: Vec<i64> = (0..nodes).map(|i| ((i + 1 + seed) % nodes) as i64).collect();
    Tensor::from_shape_vec(&[2, nodes], [src, dst].concat()).unwrap()
}

fn plain_graph(x: Array1<f32>, edges: Array2<i64>, s: &str) -> Store {
    let n = x.len();
    let edge_index = Tensor::from(edges);
    let adj = SparseTensor::from_edge_index(&edge_index, Some([n, n])).unwrap();
    Store::nodes()
        .with("x", Tensor::from(x))
        .with("edge_index", edge_index)
        .with("adj", adj)
        .with("s", s)
        .with_row_count(n)
}

#[test]
fn test_plain_batch() {
    let a = plain_graph(array![1.0, 2.0, 3.0], array![[0, 1, 1, 2], [1, 0, 2, 1]], "1");
    let b = plain_graph(array![1.0, 2.0], array![[0, 1], [1, 0]], "2");
    let records = vec![Record::from(a.clone()), Record::from(b.clone())];

    let batch = Batch::from_records(&records, &Policy::new()).unwrap();
    assert_eq!(batch.num_records(), 2);
    assert_eq!(batch.num_nodes(), 5);

    let merged = batch.as_homogeneous().unwrap();
    let store = merged.store();
    assert_eq!(store.row_count(), 5);
    assert_eq!(merged.ptr(), &[0, 3, 5]);
    assert_eq!(merged.membership(), &[0, 0, 0, 1, 1]);
    assert_eq!(
        store.get("x"),
        Some(&Value::from(Tensor::from(array![1.0_f32, 2.0, 3.0, 1.0, 2.0])))
    );
    assert_eq!(
        store.get("edge_index"),
        Some(&Value::from(Tensor::from(array![
            [0_i64, 1, 1, 2, 3, 4],
            [1, 0, 2, 1, 4, 3]
        ])))
    );
    assert_eq!(store.get("adj").map(Value::shape_summary).as_deref(), Some("[5, 5, nnz=6]"));
    assert_eq!(
        store.get("s"),
        Some(&Value::from(vec![Value::from("1"), Value::from("2")]))
    );
    assert!(batch.warnings().is_empty());

    assert_eq!(batch.to_records().unwrap(), records);
    assert_eq!(batch.get(0).unwrap(), Record::from(a.clone()));
    assert_eq!(
        batch.index_select(vec![1_usize, 0]).unwrap(),
        vec![Record::from(b), Record::from(a)]
    );
    assert_eq!(batch.index_select(..2_usize).unwrap(), records);
    assert_eq!(batch.index_select(vec![false, true]).unwrap(), vec![records[1].clone()]);
}

#[test]
fn test_three_plus_two_nodes_with_edge_attributes() {
    let a = Store::nodes()
        .with("x", features(3, 4, 0))
        .with("edge_index", Tensor::from(array![[0_i64, 1, 2], [1, 2, 0]]))
        .with("edge_attr", features(3, 2, 1));
    let b = Store::nodes()
        .with("x", features(2, 4, 2))
        .with("edge_index", Tensor::from(array![[0_i64, 1], [1, 0]]))
        .with("edge_attr", features(2, 2, 3));

    let merged = collate(&[&a, &b], &Policy::new()).unwrap();
    assert_eq!(merged.ptr(), &[0, 3, 5]);
    assert_eq!(
        merged.store().get("edge_attr").and_then(Value::as_tensor).map(Tensor::shape),
        Some(&[5, 2][..])
    );
    assert_eq!(merged.bounds("edge_attr"), Some(&[0, 3, 5][..]));
    assert_eq!(merged.bounds("edge_index"), Some(&[0, 3, 5][..]));
    assert_eq!(
        merged.store().get("edge_index").and_then(Value::as_tensor).and_then(Tensor::max_index),
        Some(4)
    );
    assert_eq!(merged.to_stores().unwrap(), vec![a, b]);
}

#[test]
fn test_new_dimension_batch() {
    let a = Store::nodes()
        .with("x", features(3, 2, 0))
        .with("foo", Tensor::from(array![1.0_f32, 2.0, 3.0, 4.0]))
        .with("y", 1_i64);
    let b = Store::nodes()
        .with("x", features(3, 2, 1))
        .with("foo", Tensor::from(array![5.0_f32, 6.0, 7.0, 8.0]))
        .with("y", 2_i64);
    let policy = Policy::new().with_concat("foo", ConcatAxis::Stack);

    let batch = Batch::from_stores(&[&a, &b], &policy).unwrap();
    let merged = batch.as_homogeneous().unwrap();
    assert_eq!(
        merged.store().get("foo").and_then(Value::as_tensor).map(Tensor::shape),
        Some(&[2, 4][..])
    );
    assert_eq!(
        merged.store().get("y"),
        Some(&Value::from(Tensor::from(array![1_i64, 2])))
    );
    assert!(batch.warnings().is_empty());

    assert_eq!(batch.to_records().unwrap(), vec![Record::from(a), Record::from(b)]);
}

#[test]
fn test_unforced_fixed_size_vector_warns_and_stacks() {
    let a = Store::nodes()
        .with("x", features(3, 2, 0))
        .with("foo", Tensor::from(array![1.0_f32, 2.0, 3.0, 4.0]));
    let b = Store::nodes()
        .with("x", features(2, 2, 1))
        .with("foo", Tensor::from(array![5.0_f32, 6.0, 7.0, 8.0]));

    let batch = Batch::from_stores(&[&a, &b], &Policy::new()).unwrap();
    let warnings = batch.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, "foo");
    assert_eq!(warnings[0].shape, vec![4]);
}

#[test]
fn test_recursive_batch() {
    let record = |n1: usize, n2: usize, seed: usize| {
        let x = Value::mapping([
            ("1", Value::from(features(n1, 32, seed))),
            ("2", Value::from(features(n2, 48, seed + 1))),
        ]);
        let edge_index = Value::from(vec![Value::from(ring(n1, seed)), Value::from(ring(n2, seed))]);
        Store::nodes()
            .with("x", x)
            .with("edge_index", edge_index)
            .with_row_count(n1 + n2)
    };
    let a = record(10, 20, 0);
    let b = record(20, 40, 7);

    let merged = collate(&[&a, &b], &Policy::new()).unwrap();
    assert_eq!(merged.ptr(), &[0, 30, 90]);

    let x = merged.store().get("x").and_then(Value::as_mapping).unwrap();
    assert_eq!(x["1"].as_tensor().map(Tensor::shape), Some(&[30, 32][..]));
    assert_eq!(x["2"].as_tensor().map(Tensor::shape), Some(&[60, 48][..]));

    let edges = merged.store().get("edge_index").and_then(Value::as_sequence).unwrap();
    assert_eq!(edges.len(), 2);
    let first = edges[0]
        .as_tensor()
        .and_then(Tensor::as_int64)
        .cloned()
        .unwrap()
        .into_dimensionality::<Ix2>()
        .unwrap();
    assert_eq!(first.dim(), (2, 30));
    // Second record's indices start after the first record's 30 nodes
    assert_eq!(first[[0, 10]], 30);
    assert_eq!(first[[0, 29]], 49);

    assert_eq!(merged.to_stores().unwrap(), vec![a, b]);
}

fn hetero_record(papers: usize, authors: usize, seed: usize) -> HeteroRecord {
    let mut record = HeteroRecord::new();
    record.node_mut("p").insert("x", features(papers, 8, seed));
    record.node_mut("a").insert("x", features(authors, 16, seed + 1));

    let edges = record.edge_mut(("p", "a"));
    edges.insert("edge_index", Tensor::from(array![[0_i64, 1, 2], [2, 1, 0]]));
    edges.insert("edge_attr", features(3, 4, seed + 2));

    record.graph_mut().insert("y", 1_i64);
    record
}

#[test]
fn test_hetero_batch() {
    let r0 = hetero_record(100, 200, 0);
    let r1 = hetero_record(50, 100, 10);
    let records = vec![Record::from(r0.clone()), Record::from(r1.clone())];

    let batch = Batch::from_records(&records, &Policy::new()).unwrap();
    assert_eq!(batch.num_nodes(), 450);
    assert_eq!(batch.ptr().ptr(), &[0, 300, 450]);

    let hetero = batch.as_heterogeneous().unwrap();
    assert_eq!(hetero.node("p").unwrap().ptr(), &[0, 100, 150]);
    assert_eq!(hetero.node("a").unwrap().ptr(), &[0, 200, 300]);
    assert_eq!(hetero.node_types().collect::<Vec<_>>(), vec!["p", "a"]);

    let edges = hetero.edge(&EdgeType::from(("p", "a"))).unwrap();
    assert_eq!(
        edges.store().get("edge_index"),
        Some(&Value::from(Tensor::from(array![
            [0_i64, 1, 2, 100, 101, 102],
            [2, 1, 0, 202, 201, 200]
        ])))
    );
    assert_eq!(
        edges.store().get("edge_attr").and_then(Value::as_tensor).map(Tensor::shape),
        Some(&[6, 4][..])
    );
    assert_eq!(
        hetero.graph().store().get("y"),
        Some(&Value::from(Tensor::from(array![1_i64, 1])))
    );

    assert_eq!(batch.to_records().unwrap(), records);
    assert_eq!(batch.index_select(1_usize).unwrap(), vec![Record::from(r1)]);
}

#[test]
fn test_empty_and_singleton() {
    let empty = Batch::from_records(&[], &Policy::new()).unwrap();
    assert_eq!(empty.num_records(), 0);
    assert_eq!(empty.num_nodes(), 0);
    assert!(empty.to_records().unwrap().is_empty());
    assert!(matches!(
        empty.get(0),
        Err(BatchError::SelectorOutOfRange { len: 0, .. })
    ));

    let only = plain_graph(array![1.0, 2.0], array![[0, 1], [1, 0]], "only");
    let batch = Batch::from_stores(&[&only], &Policy::new()).unwrap();
    let merged = batch.as_homogeneous().unwrap();
    assert_eq!(merged.store().get("x"), only.get("x"));
    assert_eq!(merged.store().get("edge_index"), only.get("edge_index"));
    assert_eq!(batch.get(0).unwrap(), Record::from(only));
}

#[test]
fn test_partial_presence() {
    let a = Store::nodes().with("x", features(2, 2, 0)).with("y", 1_i64);
    let b = Store::nodes().with("x", features(2, 2, 1));

    let err = collate(&[&a, &b], &Policy::new()).unwrap_err();
    assert_eq!(
        err,
        BatchError::PartialAttributePresence {
            path: "y".to_string(),
            present: 1,
            total: 2,
        }
    );

    let merged = collate(&[&a, &b], &Policy::new().with_fill("y", -1_i64)).unwrap();
    assert_eq!(
        merged.store().get("y"),
        Some(&Value::from(Tensor::from(array![1_i64, -1])))
    );
    assert_eq!(merged.get(0).unwrap(), a);
    assert_eq!(merged.get(1).unwrap(), b.clone().with("y", -1_i64));
}

#[test]
fn test_shape_and_dtype_mismatch() {
    let a = Store::nodes().with("x", features(2, 32, 0));
    let b = Store::nodes().with("x", features(3, 16, 1));
    let err = collate(&[&a, &b], &Policy::new()).unwrap_err();
    assert!(matches!(err, BatchError::ShapeMismatch { ref path, .. } if path == "x"));

    let c = Store::nodes().with("x", Tensor::from(Array2::<f64>::zeros((3, 32))));
    let err = collate(&[&a, &c], &Policy::new()).unwrap_err();
    assert!(matches!(err, BatchError::DtypeMismatch { .. }));
}

#[test]
fn test_nested_error_paths() {
    let a = Store::nodes().with(
        "x",
        Value::mapping([("paper", Value::from(features(2, 8, 0)))]),
    );
    let b = Store::nodes().with(
        "x",
        Value::mapping([("paper", Value::from(features(2, 4, 0)))]),
    );

    let err = collate(&[&a, &b], &Policy::new()).unwrap_err();
    assert!(matches!(err, BatchError::ShapeMismatch { ref path, .. } if path == "x.paper"));
}

#[test]
fn test_hetero_structure_mismatch() {
    let r0 = hetero_record(4, 4, 0);
    let mut r1 = hetero_record(4, 4, 1);
    r1.edge_mut(("a", "writes", "p"))
        .insert("edge_index", Tensor::from(array![[0_i64], [0]]));

    let records = vec![Record::from(r0), Record::from(r1)];
    let err = Batch::from_records(&records, &Policy::new()).unwrap_err();
    assert!(matches!(err, BatchError::StructuralMismatch { .. }));
}

#[test]
fn test_shared_conflict() {
    let policy = Policy::new().with_concat("dataset", ConcatAxis::Shared);
    let a = Store::nodes().with("x", features(1, 1, 0)).with("dataset", "cora");
    let b = Store::nodes().with("x", features(1, 1, 1)).with("dataset", "pubmed");

    let err = collate(&[&a, &b], &policy).unwrap_err();
    assert!(matches!(err, BatchError::SharedValueConflict { record: 1, .. }));
}

#[test]
fn test_custom_index_key() {
    let a = Store::nodes()
        .with("x", features(3, 1, 0))
        .with("perm", Tensor::from(array![2_i64, 0, 1]));
    let b = Store::nodes()
        .with("x", features(2, 1, 1))
        .with("perm", Tensor::from(array![1_i64, 0]));

    let policy = Policy::new().with_increment("perm", IncrementSource::Rows);
    let merged = collate(&[&a, &b], &policy).unwrap();
    assert_eq!(
        merged.store().get("perm"),
        Some(&Value::from(Tensor::from(array![2_i64, 0, 1, 4, 3])))
    );
    assert_eq!(merged.to_stores().unwrap(), vec![a, b]);
}

#[test]
fn test_selectors() {
    let stores: Vec<Store> = (1..=4)
        .map(|n| Store::nodes().with("x", features(n, 2, n)))
        .collect();
    let refs: Vec<&Store> = stores.iter().collect();
    let merged = collate(&refs, &Policy::new()).unwrap();

    let reversed = Selector::Slice {
        start: None,
        stop: None,
        step: -1,
    };
    let picked = merged.index_select(&reversed).unwrap();
    assert_eq!(picked, stores.iter().rev().cloned().collect::<Vec<_>>());

    let tail = merged.index_select(&Selector::slice(Some(-2), None)).unwrap();
    assert_eq!(tail, stores[2..].to_vec());

    assert!(matches!(
        merged.index_select(&Selector::from(vec![0_usize, 4])),
        Err(BatchError::SelectorOutOfRange { len: 4, .. })
    ));
    assert!(merged.index_select(&Selector::from(vec![true, false])).is_err());
}

#[cfg(feature = "serde")]
#[test]
fn test_policy_from_json_config() {
    use graph_batch::PolicyConfig;

    let config: PolicyConfig = serde_json::from_str(
        r#"{
            "index_keys": ["perm"],
            "overrides": { "foo": { "concat": "stack" } }
        }"#,
    )
    .unwrap();
    let policy = Policy::from(config);

    let a = Store::nodes()
        .with("x", features(2, 1, 0))
        .with("perm", Tensor::from(array![1_i64, 0]))
        .with("foo", Tensor::from(array![1.0_f32, 2.0]));
    let b = a.clone();

    let merged = collate(&[&a, &b], &policy).unwrap();
    assert_eq!(
        merged.store().get("perm"),
        Some(&Value::from(Tensor::from(array![1_i64, 0, 3, 2])))
    );
    assert_eq!(
        merged.store().get("foo").and_then(Value::as_tensor).map(Tensor::shape),
        Some(&[2, 2][..])
    );
    assert!(merged.warnings().is_empty());
}
