//! Position-wise feed-forward classifier over flattened mixing matrices.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

/// Dropout that zeroes whole positions instead of single features.
///
/// The mask has size 1 on the last axis, so on `[batch, time, features]` a
/// dropped timestep loses its entire feature vector. Kept positions are scaled
/// by `1 / (1 - prob)`. Only active on autodiff backends.
pub fn drop_positions<B: Backend, const D: usize>(x: Tensor<B, D>, prob: f64) -> Tensor<B, D> {
    if !B::ad_enabled() || prob <= 0.0 {
        return x;
    }
    if prob >= 1.0 {
        return x.zeros_like();
    }

    let mut mask_shape = x.dims();
    mask_shape[D - 1] = 1;
    let keep = 1.0 - prob;
    let mask = Tensor::<B, D>::random(mask_shape, Distribution::Bernoulli(keep), &x.device());

    x * mask.div_scalar(keep)
}

/// `F -> F/2 -> F/4 -> n_classes` with ReLU, position dropout after the first layer.
///
/// Applied independently to every position of the leading axes, so it works
/// on `[batch, features]` and on `[batch, time, features]` alike.
#[derive(Module, Debug)]
pub struct PositionwiseClassifier<B: Backend> {
    pub layers: Vec<Linear<B>>,
    #[module(skip)]
    dropout: f64,
    #[module(skip)]
    in_features: usize,
    #[module(skip)]
    n_classes: usize,
}

impl<B: Backend> PositionwiseClassifier<B> {
    pub fn new(in_features: usize, n_classes: usize, dropout: f64, device: &B::Device) -> Self {
        let half = (in_features / 2).max(1);
        let quarter = (in_features / 4).max(1);

        let layers = vec![
            LinearConfig::new(in_features, half).init(device),
            LinearConfig::new(half, quarter).init(device),
            LinearConfig::new(quarter, n_classes).init(device),
        ];

        Self {
            layers,
            dropout,
            in_features,
            n_classes,
        }
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let x = activation::relu(self.layers[0].forward(x));
        let x = drop_positions(x, self.dropout);
        let x = activation::relu(self.layers[1].forward(x));
        self.layers[2].forward(x)
    }
}
