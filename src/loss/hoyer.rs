//! Inverted Hoyer sparsity measure.
//!
//! Reference: Hoyer, "Non-negative Matrix Factorization with Sparseness
//! Constraints", JMLR 2004.
//!
//! For a matrix with `n` entries:
//!
//! ```text
//! s = 1 - (sqrt(n) - |x|_1 / |x|_2) / (sqrt(n) - 1)
//! ```
//!
//! `s = 0` for a single nonzero entry and `s = 1` when all entries have equal
//! magnitude. The measure is invariant to scaling the matrix by `k > 0`. An
//! all-zero matrix has no defined ratio and is assigned `s = 0`; results are
//! clamped to `[0, 1]`.

use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Floor for the squared L2 norm, applied under the sqrt so gradients stay finite
const SUM_SQ_FLOOR: f64 = 1e-24;

/// Per-matrix sparsity of `[n_matrices, rows, cols]`, returned as `[n_matrices]`
pub fn hoyer_sparsity<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 1> {
    let [n_matrices, rows, cols] = x.dims();
    let sqrt_n = ((rows * cols) as f64).sqrt();

    let l1 = x.clone().abs().sum_dim(2).sum_dim(1).reshape([n_matrices]);
    let l2 = x
        .powf_scalar(2.0)
        .sum_dim(2)
        .sum_dim(1)
        .reshape([n_matrices])
        .clamp_min(SUM_SQ_FLOOR)
        .sqrt();

    // 1 - (sqrt_n - r) / (sqrt_n - 1) == (r - 1) / (sqrt_n - 1)
    (l1 / l2)
        .sub_scalar(1.0)
        .div_scalar(sqrt_n - 1.0)
        .clamp(0.0, 1.0)
}

/// Thresholded sparsity penalty averaged over a batch of matrices.
///
/// Sparsity above `threshold` is penalized linearly; below it the leaky slope
/// keeps a small gradient instead of a hard zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoyerPenalty {
    pub threshold: f64,
    pub negative_slope: f64,
}

impl HoyerPenalty {
    pub fn new(threshold: f64, negative_slope: f64) -> Self {
        Self {
            threshold,
            negative_slope,
        }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 1> {
        let excess = hoyer_sparsity(x).sub_scalar(self.threshold);
        activation::leaky_relu(excess, self.negative_slope).mean()
    }
}
