//! # DBN-Glass - Recurrent Mixing-Matrix Classifiers (Rust)
//!
//! Sequence classifiers for multivariate brain time series built on the Burn
//! framework. A recurrent cell evolves one hidden vector per component and,
//! at every timestep, mixes them through a learned component-by-component
//! transfer matrix. The sequence of matrices is both the classifier's input
//! and an interpretable dynamic-connectivity estimate.
//!
//! ## Features
//!
//! - **Transfer attention**: Frobenius-normalized `Q @ K^T` with optional tanh and gate
//! - **GRU recurrence**: per-component hidden states, shared weights
//! - **Classifier heads**: mean of per-timestep logits, or global temporal attention
//! - **Composite loss**: cross-entropy + Hoyer sparsity + next-input reconstruction
//! - **Checkpoints**: named JSON state dicts with prune and best-effort load
//! - **Training**: Adam loop with early stopping and reduce-on-plateau
//!
//! ## Quick Start
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::{Distribution, Tensor};
//! use dbn_glass::prelude::*;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! // 5 components, 2 classes
//! let config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 5, 2);
//! let model = GlassModel::<Backend>::new(&config, &device).unwrap();
//!
//! let input = Tensor::<Backend, 3>::random([3, 8, 5], Distribution::Default, &device);
//! let output = model.forward(input).unwrap();
//!
//! assert_eq!(output.logits.dims(), [3, 2]);
//! assert_eq!(output.mixing.dims(), [3, 8, 5, 5]);
//! ```
//!
//! ## Variants
//!
//! | [`ModelVariant`](config::ModelVariant) | Projection | Alignment | Loss |
//! |---------------------------------------|------------|-----------|------|
//! | `Fixed` | 3-layer MLP | predict-next | combined scalar |
//! | `RecurrentMean` | Linear | post-mix | separate terms |

pub mod activation;
pub mod attention;
pub mod cells;
pub mod checkpoint;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod heads;
pub mod logging;
pub mod loss;
pub mod model;
pub mod rnn;
pub mod train;

pub mod prelude {
    pub use crate::activation::TanhPlacement;
    pub use crate::checkpoint::{LoadReport, StateDict};
    pub use crate::config::{
        Aggregation, GlassConfig, HyperparameterSampler, LossContract, ModelVariant,
        ProjectionKind, RandomSampler, StateAlignment,
    };
    pub use crate::connectivity::Connectivity;
    pub use crate::error::{GlassError, GlassResult};
    pub use crate::loss::{CompositeLoss, LossValue};
    pub use crate::model::{GlassModel, GlassOutput, ModelOutput};
    pub use crate::train::{Batch, BatchSource, InMemorySource, Trainer, TrainerConfig};
}
