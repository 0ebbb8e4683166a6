//! Decollation: recover individual stores from a [`CollatedStore`]
//!
//! Every attribute is split by its own recorded bounds, then the increment
//! applied during collation is subtracted again. Splitting never touches the
//! merged store, so any number of records can be extracted in any order.

use crate::batch::layout::{Layout, LeafLayout, Origin, Slices};
use crate::batch::{CollatedStore, Selector};
use crate::error::{BatchError, Result};
use crate::storage::{Scalar, Store, Value};
use indexmap::IndexMap;
use tracing::debug;

impl CollatedStore {
    /// Reconstruct record `record`
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::SelectorOutOfRange`] if `record >= num_records()`.
    pub fn get(&self, record: usize) -> Result<Store> {
        Selector::Index(record).resolve(self.num_records())?;

        let mut store =
            Store::new(self.store.space()).with_row_count(self.offsets.count(record));
        for (key, layout) in &self.layouts {
            let merged = self
                .store
                .get(key)
                .ok_or_else(|| BatchError::structure(key, "missing from the merged store"))?;
            store.insert(key.as_str(), split(key, merged, layout, record)?);
        }
        Ok(store)
    }

    /// Reconstruct the selected records, in selection order
    ///
    /// # Errors
    ///
    /// Fails if the selector does not resolve against this batch.
    pub fn index_select(&self, selector: &Selector) -> Result<Vec<Store>> {
        let records = selector.resolve(self.num_records())?;
        let stores = records
            .iter()
            .map(|&record| self.get(record))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            selected = stores.len(),
            of = self.num_records(),
            keys = self.layouts.len(),
            "decollated stores"
        );
        Ok(stores)
    }

    /// Reconstruct every record
    ///
    /// # Errors
    ///
    /// Fails only if the merged store no longer matches its layout.
    pub fn to_stores(&self) -> Result<Vec<Store>> {
        (0..self.num_records()).map(|record| self.get(record)).collect()
    }
}

fn split(path: &str, merged: &Value, layout: &Layout, record: usize) -> Result<Value> {
    match (layout, merged) {
        (Layout::Leaf(leaf), _) => split_leaf(path, merged, leaf, record),
        (Layout::Mapping(layouts), Value::Mapping(map)) => {
            let mut out = IndexMap::with_capacity(layouts.len());
            for (sub, layout) in layouts {
                let child_path = format!("{path}.{sub}");
                let child = map
                    .get(sub)
                    .ok_or_else(|| BatchError::structure(&child_path, "missing from the merged mapping"))?;
                out.insert(sub.clone(), split(&child_path, child, layout, record)?);
            }
            Ok(Value::Mapping(out))
        }
        (Layout::Sequence(layouts), Value::Sequence(items)) if items.len() == layouts.len() => {
            layouts
                .iter()
                .zip(items)
                .enumerate()
                .map(|(pos, (layout, item))| split(&format!("{path}[{pos}]"), item, layout, record))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence)
        }
        _ => Err(BatchError::structure(
            path,
            format!("merged {:?} does not match its layout", merged.kind()),
        )),
    }
}

fn split_leaf(path: &str, merged: &Value, leaf: &LeafLayout, record: usize) -> Result<Value> {
    let part = match (&leaf.slices, merged) {
        (Slices::Shared, _) => return Ok(merged.clone()),
        (Slices::Collect, Value::Sequence(items)) => items.get(record).cloned(),
        (Slices::Axis { axis, bounds }, Value::Tensor(t)) => {
            Some(Value::Tensor(t.slice_axis(*axis, bounds.range(record))))
        }
        (Slices::Stack, Value::Tensor(t)) if record < t.shape().first().copied().unwrap_or(0) => {
            let slab = t.index_leading(record);
            match leaf.origin {
                Origin::Scalar => Scalar::from_tensor(&slab).map(Value::Scalar),
                Origin::Value => Some(Value::Tensor(slab)),
            }
        }
        (Slices::Sparse { rows, cols, nnz }, Value::Sparse(s)) => Some(Value::Sparse(s.slice(
            rows.as_ref().map(|t| t.range(record)),
            cols.as_ref().map(|t| t.range(record)),
            nnz.range(record),
        ))),
        _ => None,
    };

    let part = part.ok_or_else(|| {
        BatchError::structure(
            path,
            format!("merged {:?} does not match its layout", merged.kind()),
        )
    })?;

    match leaf.increments.as_ref().and_then(|incs| incs.get(record)) {
        Some(inc) => inc.apply(path, &part, true),
        None => Ok(part),
    }
}

#[cfg(test)]
mod tests {
    use crate::batch::{collate, ConcatAxis, Policy, Selector};
    use crate::error::BatchError;
    use crate::storage::{SparseTensor, Store, Tensor, Value};
    use ndarray::array;

    fn graph(x: ndarray::Array1<f32>, edges: ndarray::Array2<i64>, s: &str) -> Store {
        let adj = SparseTensor::from_edge_index(&Tensor::from(edges.clone()), Some([x.len(), x.len()]))
            .unwrap();
        Store::nodes()
            .with("x", Tensor::from(x))
            .with("edge_index", Tensor::from(edges))
            .with("adj", adj)
            .with("s", s)
            .with("y", 1_i64)
    }

    #[test]
    fn test_round_trip() {
        let a = graph(array![1.0, 2.0, 3.0], array![[0, 1, 1, 2], [1, 0, 2, 1]], "1");
        let b = graph(array![1.0, 2.0], array![[0, 1], [1, 0]], "2");

        let merged = collate(&[&a, &b], &Policy::new()).unwrap();
        let adj = merged.store().get("adj").and_then(Value::as_sparse).unwrap();
        assert_eq!(adj.shape(), [5, 5]);
        assert_eq!(adj.nnz(), 6);

        assert_eq!(merged.to_stores().unwrap(), vec![a.clone(), b.clone()]);
        assert_eq!(merged.get(1).unwrap(), b);
    }

    #[test]
    fn test_index_select_with_duplicates() {
        let a = graph(array![1.0, 2.0, 3.0], array![[0, 1], [1, 2]], "a");
        let b = graph(array![4.0], array![[0], [0]], "b");
        let c = graph(array![5.0, 6.0], array![[1], [0]], "c");
        let merged = collate(&[&a, &b, &c], &Policy::new()).unwrap();

        let picked = merged.index_select(&Selector::from(vec![2_usize, 0, 2])).unwrap();
        assert_eq!(picked, vec![c.clone(), a, c]);

        let masked = merged
            .index_select(&Selector::from(vec![false, true, false]))
            .unwrap();
        assert_eq!(masked, vec![b]);
    }

    #[test]
    fn test_out_of_range() {
        let a = graph(array![1.0], array![[0], [0]], "a");
        let merged = collate(&[&a], &Policy::new()).unwrap();
        assert!(matches!(
            merged.get(1),
            Err(BatchError::SelectorOutOfRange { len: 1, .. })
        ));
    }

    #[test]
    fn test_stacked_tensor_round_trip() {
        let a = Store::nodes()
            .with("x", Tensor::from(array![1.0_f32, 2.0, 3.0]))
            .with("foo", Tensor::from(array![1.0_f32, 2.0, 3.0, 4.0]));
        let b = Store::nodes()
            .with("x", Tensor::from(array![4.0_f32, 5.0, 6.0]))
            .with("foo", Tensor::from(array![5.0_f32, 6.0, 7.0, 8.0]));
        let policy = Policy::new().with_concat("foo", ConcatAxis::Stack);

        let merged = collate(&[&a, &b], &policy).unwrap();
        assert_eq!(
            merged.store().get("foo"),
            Some(&Value::from(Tensor::from(array![
                [1.0_f32, 2.0, 3.0, 4.0],
                [5.0, 6.0, 7.0, 8.0]
            ])))
        );
        assert_eq!(merged.to_stores().unwrap(), vec![a, b]);
    }
}
