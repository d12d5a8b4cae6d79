//! Full model: mixing recurrence, next-input predictor and classifier head.

use burn::module::Module;
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use tracing::info;

use crate::checkpoint::StateDict;
use crate::config::{Aggregation, GlassConfig, StateAlignment};
use crate::error::{GlassError, GlassResult};
use crate::heads::ClassifierHead;
use crate::rnn::MixingRnn;

/// Next-input predictions paired with their targets, `[batch, time - 1, C]` each
#[derive(Debug, Clone)]
pub struct Reconstruction<B: Backend> {
    pub predicted: Tensor<B, 3>,
    pub target: Tensor<B, 3>,
}

impl<B: Backend> Reconstruction<B> {
    /// Mean squared prediction error
    pub fn mse(&self) -> Tensor<B, 1> {
        MseLoss::new().forward(self.predicted.clone(), self.target.clone(), Reduction::Mean)
    }
}

/// Outputs of the classification forward pass
#[derive(Debug, Clone)]
pub struct GlassOutput<B: Backend> {
    /// `[batch, n_classes]`
    pub logits: Tensor<B, 2>,
    /// Temporal mean of the mixing matrices, `[batch, C, C]`
    pub mean_mixing: Tensor<B, 3>,
    /// `[batch, time, C, C]`
    pub mixing: Tensor<B, 4>,
    /// `None` for single-timestep inputs, which have no next input to predict
    pub reconstruction: Option<Reconstruction<B>>,
}

impl<B: Backend> GlassOutput<B> {
    /// Reconstruction error, if the sequence was long enough to have one
    pub fn reconstruction_loss(&self) -> Option<Tensor<B, 1>> {
        self.reconstruction.as_ref().map(Reconstruction::mse)
    }
}

/// Outputs of the self-supervised pretraining forward pass
#[derive(Debug, Clone)]
pub struct PretrainOutput<B: Backend> {
    pub mixing: Tensor<B, 4>,
    pub reconstruction: Option<Reconstruction<B>>,
}

/// Either forward contract, selected by the `pretraining` flag
#[derive(Debug, Clone)]
pub enum ModelOutput<B: Backend> {
    Pretraining(PretrainOutput<B>),
    Full(GlassOutput<B>),
}

/// Recurrent mixing-matrix classifier.
///
/// Hidden-state alignment for the next-input predictor:
/// - [`StateAlignment::PredictNext`]: the state after step t predicts `x[t + 1]`,
///   so states `0..T-1` are paired with inputs `1..T`.
/// - [`StateAlignment::PostMix`]: the mix happens before the state is stored,
///   so states `1..T` are paired with inputs `1..T` directly.
#[derive(Module, Debug)]
pub struct GlassModel<B: Backend> {
    pub rnn: MixingRnn<B>,
    pub predictor: Linear<B>,
    pub head: ClassifierHead<B>,
    #[module(skip)]
    predict_next: bool,
    #[module(skip)]
    n_components: usize,
    #[module(skip)]
    n_classes: usize,
}

impl<B: Backend> GlassModel<B> {
    /// Build a freshly initialized model
    pub fn new(config: &GlassConfig, device: &B::Device) -> GlassResult<Self> {
        config.validate()?;

        let model = Self {
            rnn: MixingRnn::new(config, device),
            predictor: LinearConfig::new(config.rnn.hidden_size, 1).init(device),
            head: ClassifierHead::new(config, device),
            predict_next: config.rnn.alignment == StateAlignment::PredictNext,
            n_components: config.input_size,
            n_classes: config.output_size,
        };

        info!(
            variant = ?config.variant,
            components = config.input_size,
            classes = config.output_size,
            hidden = config.rnn.hidden_size,
            projection = ?config.attention.projection,
            aggregation = ?config.classifier.aggregation,
            params = model.num_params(),
            "Model constructed"
        );

        Ok(model)
    }

    /// Build the model and, if configured, best-effort load a pruned checkpoint
    pub fn from_config(config: &GlassConfig, device: &B::Device) -> GlassResult<Self> {
        let model = Self::new(config, device)?;
        if !config.load_pretrained {
            return Ok(model);
        }

        let path = config.pretrained_path.as_deref().ok_or_else(|| {
            GlassError::UnsupportedConfiguration {
                field: "pretrained_path".to_string(),
                reason: "load_pretrained is set but no checkpoint path was given".to_string(),
            }
        })?;

        let dict = StateDict::load(path)?.prune(&config.checkpoint_exclude);
        let (model, report) = model.load_state_dict(&dict, false)?;
        info!(
            path,
            loaded = report.loaded.len(),
            missing = report.missing.len(),
            unexpected = report.unexpected.len(),
            "Pretrained weights loaded"
        );

        Ok(model)
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn alignment(&self) -> StateAlignment {
        if self.predict_next {
            StateAlignment::PredictNext
        } else {
            StateAlignment::PostMix
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        self.head.aggregation()
    }

    /// Classification forward pass over `[batch, time, components]`
    pub fn forward(&self, input: Tensor<B, 3>) -> GlassResult<GlassOutput<B>> {
        let sequence = self.rnn.forward(input.clone())?;
        let reconstruction = self.reconstruct(sequence.hidden_states, input);

        let [batch, _, rows, cols] = sequence.mixing.dims();
        let mean_mixing = sequence
            .mixing
            .clone()
            .mean_dim(1)
            .reshape([batch, rows, cols]);
        let logits = self.head.forward(sequence.mixing.clone());

        Ok(GlassOutput {
            logits,
            mean_mixing,
            mixing: sequence.mixing,
            reconstruction,
        })
    }

    /// Pretraining forward pass: mixing matrices and next-input predictions only
    pub fn forward_pretraining(&self, input: Tensor<B, 3>) -> GlassResult<PretrainOutput<B>> {
        let sequence = self.rnn.forward(input.clone())?;
        let reconstruction = self.reconstruct(sequence.hidden_states, input);

        Ok(PretrainOutput {
            mixing: sequence.mixing,
            reconstruction,
        })
    }

    /// Dispatch on the `pretraining` flag
    pub fn forward_mode(&self, input: Tensor<B, 3>, pretraining: bool) -> GlassResult<ModelOutput<B>> {
        if pretraining {
            self.forward_pretraining(input).map(ModelOutput::Pretraining)
        } else {
            self.forward(input).map(ModelOutput::Full)
        }
    }

    fn reconstruct(
        &self,
        hidden_states: Tensor<B, 4>,
        input: Tensor<B, 3>,
    ) -> Option<Reconstruction<B>> {
        let [batch, seq_len, components, _] = hidden_states.dims();
        if seq_len < 2 {
            return None;
        }

        let first_state = if self.predict_next { 0 } else { 1 };
        let states = hidden_states.narrow(1, first_state, seq_len - 1);
        let predicted = self
            .predictor
            .forward(states)
            .reshape([batch, seq_len - 1, components]);
        let target = input.narrow(1, 1, seq_len - 1);

        Some(Reconstruction { predicted, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelVariant;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_modes() {
        let device = Default::default();
        let config = GlassConfig::default_hps(ModelVariant::Fixed, 4, 3);
        let model = GlassModel::<TestBackend>::new(&config, &device).unwrap();
        let input =
            Tensor::<TestBackend, 3>::random([2, 5, 4], Distribution::Uniform(-1.0, 1.0), &device);

        match model.forward_mode(input.clone(), true).unwrap() {
            ModelOutput::Pretraining(out) => {
                assert_eq!(out.mixing.dims(), [2, 5, 4, 4]);
                let rec = out.reconstruction.unwrap();
                assert_eq!(rec.predicted.dims(), [2, 4, 4]);
                assert_eq!(rec.target.dims(), [2, 4, 4]);
            }
            ModelOutput::Full(_) => panic!("expected pretraining output"),
        }

        match model.forward_mode(input, false).unwrap() {
            ModelOutput::Full(out) => {
                assert_eq!(out.logits.dims(), [2, 3]);
                assert_eq!(out.mean_mixing.dims(), [2, 4, 4]);
            }
            ModelOutput::Pretraining(_) => panic!("expected full output"),
        }
    }

    #[test]
    fn test_alignment_targets_start_at_second_input() {
        let device = Default::default();
        let config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 3, 2);
        let model = GlassModel::<TestBackend>::new(&config, &device).unwrap();

        let input =
            Tensor::<TestBackend, 3>::random([1, 4, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let out = model.forward(input.clone()).unwrap();
        let rec = out.reconstruction.unwrap();

        let expected = input.narrow(1, 1, 3);
        let diff = (rec.target - expected).abs().max().into_scalar();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let device = Default::default();
        let mut config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 3, 2);
        config.rnn.num_layers = 3;
        assert!(GlassModel::<TestBackend>::new(&config, &device).is_err());
    }
}
