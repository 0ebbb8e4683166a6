//! Batching walkthrough: collate small graphs, inspect the batch, split it again
//!
//! Run with: cargo run --example batching_demo --features serde

use anyhow::{ensure, Context, Result};
use graph_batch::{
    Batch, ConcatAxis, HeteroRecord, Policy, Record, Selector, SparseTensor, Store, Tensor,
};
use ndarray::{array, Array2};

fn small_graph(x: ndarray::Array1<f32>, edges: Array2<i64>, label: &str) -> Result<Store> {
    let n = x.len();
    let edge_index = Tensor::from(edges);
    let adj = SparseTensor::from_edge_index(&edge_index, Some([n, n]))
        .context("building adjacency")?;
    Ok(Store::nodes()
        .with("x", Tensor::from(x))
        .with("edge_index", edge_index)
        .with("adj", adj)
        .with("label", label)
        .with("foo", Tensor::from(array![1.0_f32, 2.0, 3.0, 4.0])))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("🦀 graph-batch Example\n");

    // 1. Homogeneous batch
    println!("📊 Collating two graphs (3 + 2 nodes)...");
    let records: Vec<Record> = vec![
        small_graph(array![1.0, 2.0, 3.0], array![[0, 1, 1, 2], [1, 0, 2, 1]], "1")?.into(),
        small_graph(array![1.0, 2.0], array![[0, 1], [1, 0]], "2")?.into(),
    ];
    let policy = Policy::new().with_concat("foo", ConcatAxis::Stack);
    let batch = Batch::from_records(&records, &policy)?;
    let merged = batch
        .as_homogeneous()
        .context("expected a homogeneous batch")?;

    for (key, value) in merged.store().iter() {
        println!("  {key}: {}", value.shape_summary());
    }
    println!("  ptr:   {:?}", merged.ptr());
    println!("  batch: {:?}\n", merged.membership());

    // 2. Split it again
    println!("🔍 Decollating...");
    let second = batch.get(1)?;
    ensure!(second == records[1], "record 1 did not round-trip");
    println!("  ✅ record 1 restored ({} nodes)", second.num_nodes());

    let reversed = batch.index_select(Selector::Slice {
        start: None,
        stop: None,
        step: -1,
    })?;
    println!("  ✅ reversed selection: {} records\n", reversed.len());

    // 3. Heterogeneous batch
    println!("🧬 Heterogeneous batch (paper/author)...");
    let hetero: Vec<Record> = [(100, 200), (50, 100)]
        .into_iter()
        .map(|(papers, authors)| {
            let mut record = HeteroRecord::new();
            record
                .node_mut("paper")
                .insert("x", Tensor::from(Array2::<f32>::zeros((papers, 8))));
            record
                .node_mut("author")
                .insert("x", Tensor::from(Array2::<f32>::zeros((authors, 8))));
            record
                .edge_mut(("paper", "author"))
                .insert("edge_index", Tensor::from(array![[0_i64, 1], [1, 0]]));
            Record::from(record)
        })
        .collect();
    let batch = Batch::from_records(&hetero, &Policy::new())?;
    println!("  total nodes: {}", batch.num_nodes());
    println!("  global ptr:  {:?}", batch.ptr().ptr());
    ensure!(batch.to_records()? == hetero, "heterogeneous round trip failed");
    println!("  ✅ round trip ok");

    #[cfg(feature = "serde")]
    {
        // 4. Policy from configuration
        let config: graph_batch::PolicyConfig =
            serde_json::from_str(r#"{ "overrides": { "foo": { "concat": "stack" } } }"#)?;
        let batch = Batch::from_records(&records, &Policy::from(config))?;
        println!("\n⚙️  Configured policy: {} warnings", batch.warnings().len());
    }

    Ok(())
}
