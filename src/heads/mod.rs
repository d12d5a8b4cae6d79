//! # Classifier Heads
//!
//! The head consumes the mixing-matrix sequence flattened to
//! `[batch, time, C * C]` and produces `[batch, n_classes]` logits. Two
//! aggregation strategies are available:
//!
//! | [`Aggregation`] | Behaviour |
//! |-----------------|-----------|
//! | `MeanLogits` | classify every timestep, average logits over time |
//! | `TemporalAttention` | softmax-pool timesteps, classify once |

pub mod classifier;
pub mod temporal_attention;

pub use classifier::PositionwiseClassifier;
pub use temporal_attention::TemporalAttentionPool;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::config::{Aggregation, GlassConfig};

/// Classifier over the mixing-matrix sequence
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub clf: PositionwiseClassifier<B>,
    pub gta: Option<TemporalAttentionPool<B>>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn new(config: &GlassConfig, device: &B::Device) -> Self {
        let features = config.mixing_features();
        let gta = match config.classifier.aggregation {
            Aggregation::MeanLogits => None,
            Aggregation::TemporalAttention => Some(TemporalAttentionPool::new(features, device)),
        };

        Self {
            clf: PositionwiseClassifier::new(
                features,
                config.output_size,
                config.classifier.dropout,
                device,
            ),
            gta,
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        if self.gta.is_some() {
            Aggregation::TemporalAttention
        } else {
            Aggregation::MeanLogits
        }
    }

    /// Logits for a mixing sequence `[batch, time, C, C]`
    pub fn forward(&self, mixing: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, seq_len, rows, cols] = mixing.dims();
        let features = mixing.reshape([batch, seq_len, rows * cols]);

        match self.gta {
            Some(ref gta) => self.clf.forward(gta.forward(features)),
            None => {
                let logits = self.clf.forward(features);
                let n_classes = self.clf.n_classes();
                logits.mean_dim(1).reshape([batch, n_classes])
            }
        }
    }
}
