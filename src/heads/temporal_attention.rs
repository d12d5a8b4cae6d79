//! Global temporal attention pooling.
//!
//! Every timestep is scored by content: the per-timestep features are
//! modulated by their temporal mean, embedded, normalized and passed through a
//! small MLP that produces one score per timestep. A softmax over time turns
//! the scores into pooling weights.

use burn::module::Module;
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

const EMBED_RATIO: f64 = 0.05;
const ATTEND_RATIO: f64 = 0.5;

/// Softmax pooling over the time axis of `[batch, time, features]`
#[derive(Module, Debug)]
pub struct TemporalAttentionPool<B: Backend> {
    pub embed: Linear<B>,
    pub norm: LayerNorm<B>,
    pub attend: Vec<Linear<B>>,
    #[module(skip)]
    features: usize,
}

impl<B: Backend> TemporalAttentionPool<B> {
    pub fn new(features: usize, device: &B::Device) -> Self {
        // Two features at least, otherwise the normalization collapses to zero
        let embed_dim = ((EMBED_RATIO * features as f64).round() as usize).max(2);
        let attend_dim = ((ATTEND_RATIO * features as f64).round() as usize).max(1);

        Self {
            embed: LinearConfig::new(features, embed_dim).init(device),
            norm: LayerNormConfig::new(embed_dim).init(device),
            attend: vec![
                LinearConfig::new(embed_dim, attend_dim).init(device),
                LinearConfig::new(attend_dim, 1).init(device),
            ],
            features,
        }
    }

    pub fn features(&self) -> usize {
        self.features
    }

    /// Softmax weights over time, `[batch, time]`
    pub fn weights(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, seq_len, features] = x.dims();

        let readout = x.clone().mean_dim(1);
        let modulated = (x * readout).reshape([batch * seq_len, features]);

        let embedded = activation::relu(self.norm.forward(self.embed.forward(modulated)));
        let hidden = activation::relu(self.attend[0].forward(embedded));
        let scores = self.attend[1].forward(hidden).reshape([batch, seq_len]);

        activation::softmax(scores, 1)
    }

    /// Pool `[batch, time, features]` into `[batch, features]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, _, features] = x.dims();
        let weights = self.weights(x.clone()).unsqueeze_dim::<3>(2);

        (x * weights).sum_dim(1).reshape([batch, features])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_weights_form_distribution() {
        let device = Default::default();
        let pool = TemporalAttentionPool::<TestBackend>::new(16, &device);
        let x =
            Tensor::<TestBackend, 3>::random([3, 7, 16], Distribution::Uniform(-1.0, 1.0), &device);

        let weights = pool.weights(x.clone());
        assert_eq!(weights.dims(), [3, 7]);

        let sums = weights.sum_dim(1).into_data().to_vec::<f32>().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }

        assert_eq!(pool.forward(x).dims(), [3, 16]);
    }

    #[test]
    fn test_constant_sequence_pools_to_itself() {
        let device = Default::default();
        let pool = TemporalAttentionPool::<TestBackend>::new(9, &device);
        let frame =
            Tensor::<TestBackend, 2>::random([2, 9], Distribution::Uniform(-1.0, 1.0), &device);
        let x = frame.clone().unsqueeze_dim::<3>(1).repeat_dim(1, 4);

        let pooled = pool.forward(x);
        let diff = (pooled - frame).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }

    #[test]
    fn test_embedding_norm_standardizes_rows() {
        let device = Default::default();
        let pool = TemporalAttentionPool::<TestBackend>::new(40, &device);
        assert_eq!(pool.norm.gamma.dims(), [2]);

        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 4.0], [-3.0, 5.0]], &device);
        let y = pool.norm.forward(x);
        let row_means = y.mean_dim(1).into_data().to_vec::<f32>().unwrap();
        assert!(row_means.iter().all(|m| m.abs() < 1e-5));
    }
}
