//! Host-side view of the learned mixing matrices.
//!
//! A [`Connectivity`] holds one component-by-component matrix, typically the
//! temporal mean of a sample's mixing sequence. Entry `[i, j]` is the weight
//! with which component `j` feeds component `i` in the remix `T @ H`.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{shape_error, GlassResult};

/// Directed, weighted edge `src -> dst`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src: usize,
    pub dst: usize,
    pub weight: f32,
}

/// Dense connectivity between components
#[derive(Debug, Clone, PartialEq)]
pub struct Connectivity {
    matrix: Array2<f32>,
}

impl Connectivity {
    /// Wrap a square matrix
    pub fn new(matrix: Array2<f32>) -> GlassResult<Self> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(shape_error("connectivity matrix", &[rows, rows], &[rows, cols]));
        }
        Ok(Self { matrix })
    }

    /// Split a batch `[batch, C, C]` into one matrix per sample
    pub fn from_tensor<B: Backend>(tensor: Tensor<B, 3>) -> GlassResult<Vec<Self>> {
        let [batch, rows, cols] = tensor.dims();
        if rows != cols {
            return Err(shape_error("connectivity batch", &[batch, rows, rows], &[batch, rows, cols]));
        }

        let values: Vec<f32> = tensor.into_data().iter::<f32>().collect();
        values
            .chunks(rows * cols)
            .map(|chunk| {
                let matrix = Array2::from_shape_vec((rows, cols), chunk.to_vec())
                    .map_err(|_| shape_error("connectivity batch", &[rows, cols], &[chunk.len()]))?;
                Ok(Self { matrix })
            })
            .collect()
    }

    /// Rebuild from nested rows, as produced by [`Connectivity::rows`]
    pub fn from_rows(rows: Vec<Vec<f32>>) -> GlassResult<Self> {
        let n = rows.len();
        if let Some(bad) = rows.iter().find(|row| row.len() != n) {
            return Err(shape_error("connectivity rows", &[n, n], &[n, bad.len()]));
        }
        let matrix = Array2::from_shape_vec((n, n), rows.into_iter().flatten().collect())
            .map_err(|_| shape_error("connectivity rows", &[n, n], &[n]))?;
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }

    pub fn n_components(&self) -> usize {
        self.matrix.nrows()
    }

    /// Nested row representation, convenient for JSON output
    pub fn rows(&self) -> Vec<Vec<f32>> {
        self.matrix.outer_iter().map(|row| row.to_vec()).collect()
    }

    /// Hoyer sparsity of the whole matrix, in [0, 1]
    pub fn hoyer_sparsity(&self) -> f32 {
        let n = self.matrix.len() as f32;
        if n <= 1.0 {
            return 0.0;
        }
        let l1 = self.matrix.mapv(f32::abs).sum();
        let sum_sq = self.matrix.mapv(|x| x * x).sum();
        if sum_sq == 0.0 {
            return 0.0;
        }
        ((l1 / sum_sq.sqrt() - 1.0) / (n.sqrt() - 1.0)).clamp(0.0, 1.0)
    }

    /// The `k` largest-magnitude entries, strongest first
    pub fn strongest_edges(&self, k: usize) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .matrix
            .indexed_iter()
            .map(|((dst, src), &weight)| Edge { src, dst, weight })
            .collect();
        edges.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        edges.truncate(k);
        edges
    }

    /// Number of entries with magnitude strictly above `threshold`
    pub fn edge_count(&self, threshold: f32) -> usize {
        self.matrix.iter().filter(|w| w.abs() > threshold).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use ndarray::array;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_strongest_edges_by_magnitude() {
        let c = Connectivity::new(array![[0.1, -0.9], [0.5, 0.0]]).unwrap();
        let edges = c.strongest_edges(2);

        assert_eq!(edges[0], Edge { src: 1, dst: 0, weight: -0.9 });
        assert_eq!(edges[1], Edge { src: 0, dst: 1, weight: 0.5 });
        assert_eq!(c.edge_count(0.2), 2);
    }

    #[test]
    fn test_from_tensor_splits_batch() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 1>::from_floats(
            [1.0f32, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0, 2.0],
            &device,
        )
        .reshape([2, 2, 2]);

        let matrices = Connectivity::from_tensor(tensor).unwrap();
        assert_eq!(matrices.len(), 2);
        assert_eq!(matrices[0].rows(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!((matrices[1].hoyer_sparsity() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_matrix_sparsity() {
        let c = Connectivity::new(Array2::zeros((3, 3))).unwrap();
        assert_eq!(c.hoyer_sparsity(), 0.0);
        assert_eq!(c.edge_count(0.0), 0);
    }

    #[test]
    fn test_rejects_non_square() {
        assert!(Connectivity::new(Array2::zeros((2, 3))).is_err());
        assert!(Connectivity::from_rows(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
    }
}
