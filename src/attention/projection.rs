//! Query/key projection networks.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::config::ProjectionKind;

/// A single linear layer or a Linear-ReLU-Linear-ReLU-Linear stack
#[derive(Module, Debug)]
pub struct Projection<B: Backend> {
    pub layers: Vec<Linear<B>>,
}

impl<B: Backend> Projection<B> {
    pub fn new(kind: ProjectionKind, input_dim: usize, hidden_dim: usize, device: &B::Device) -> Self {
        let layers = match kind {
            ProjectionKind::Linear => vec![LinearConfig::new(input_dim, hidden_dim).init(device)],
            ProjectionKind::Mlp => vec![
                LinearConfig::new(input_dim, hidden_dim).init(device),
                LinearConfig::new(hidden_dim, hidden_dim).init(device),
                LinearConfig::new(hidden_dim, hidden_dim).init(device),
            ],
        };
        Self { layers }
    }

    pub fn kind(&self) -> ProjectionKind {
        if self.layers.len() == 1 {
            ProjectionKind::Linear
        } else {
            ProjectionKind::Mlp
        }
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let last = self.layers.len() - 1;
        let mut out = x;
        for (i, layer) in self.layers.iter().enumerate() {
            out = layer.forward(out);
            if i != last {
                out = activation::relu(out);
            }
        }
        out
    }
}
