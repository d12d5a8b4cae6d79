//! Model, attention and loss configuration.
//!
//! The top-level [`GlassConfig`] is read once when the model and the loss are
//! built and is never mutated afterwards. Each architectural switch is a
//! separate field; [`ModelVariant`] only selects the defaults handed out by
//! [`GlassConfig::default_hps`] and [`GlassConfig::random_hps`].

use burn::config::Config;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::activation::TanhPlacement;
use crate::error::{config_error, GlassResult, IoResultExt};

/// Model family members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// MLP query/key projections, predict-next alignment, single combined loss
    Fixed,
    /// Linear query/key projections, post-mix alignment, separately reported loss terms
    RecurrentMean,
}

/// How queries and keys are projected from the hidden states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    /// One linear layer
    Linear,
    /// Linear-ReLU-Linear-ReLU-Linear
    Mlp,
}

/// Pairing of stored hidden states with reconstruction targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateAlignment {
    /// States from t=0..T-2 predict the inputs at t=1..T-1
    PredictNext,
    /// States from t=1..T-1 are paired with the inputs at t=1..T-1
    PostMix,
}

/// How per-timestep mixing matrices are turned into one prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Classify every timestep, then average the logits over time
    MeanLogits,
    /// Pool the timesteps with learned softmax weights, then classify once
    TemporalAttention,
}

/// Shape of the value returned by the composite loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossContract {
    /// `ce + lambda * sparsity + reconstruction` as one scalar
    Combined,
    /// `(ce, lambda * sparsity)` with reconstruction reported on its own
    Separate,
}

fn default_alignment() -> StateAlignment {
    StateAlignment::PostMix
}

fn default_projection() -> ProjectionKind {
    ProjectionKind::Linear
}

fn default_true() -> bool {
    true
}

fn default_norm_epsilon() -> f64 {
    1e-6
}

fn default_aggregation() -> Aggregation {
    Aggregation::MeanLogits
}

fn default_dropout() -> f64 {
    0.3
}

fn default_contract() -> LossContract {
    LossContract::Separate
}

fn default_negative_slope() -> f64 {
    0.01
}

/// Recurrent block settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RnnConfig {
    /// Whether one embedding map is shared by all components
    pub single_embed: bool,
    /// Number of stacked recurrent layers; only 1 is supported
    pub num_layers: usize,
    pub input_embedding_size: usize,
    #[serde(alias = "hidden_embedding_size")]
    pub hidden_size: usize,
    #[serde(default = "default_alignment")]
    pub alignment: StateAlignment,
}

/// Transfer-matrix attention settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionConfig {
    pub hidden_dim: usize,
    #[serde(default = "default_projection")]
    pub projection: ProjectionKind,
    /// Backpropagate through the normalization denominator
    #[serde(default = "default_true")]
    pub track_grads: bool,
    #[serde(default)]
    pub use_tan: TanhPlacement,
    #[serde(default = "default_true")]
    pub use_gate: bool,
    /// Floor applied to the transfer-matrix norm before division
    #[serde(default = "default_norm_epsilon")]
    pub norm_epsilon: f64,
    /// Fail instead of flooring when the norm drops below `norm_epsilon`
    #[serde(default)]
    pub strict_norm: bool,
}

/// Classifier head settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_aggregation")]
    pub aggregation: Aggregation,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
}

/// Composite loss settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossConfig {
    /// Sparsity level below which the regularizer only leaks
    pub threshold: f64,
    #[serde(alias = "lambdaa", alias = "labmda")]
    pub lambda: f64,
    /// Regularize the temporal mean matrix instead of every timestep
    pub minimize_global: bool,
    #[serde(default = "default_contract")]
    pub contract: LossContract,
    #[serde(default = "default_negative_slope")]
    pub negative_slope: f64,
}

/// Full model configuration
#[derive(Config, Debug)]
pub struct GlassConfig {
    /// Number of input components (ROIs / ICs)
    pub input_size: usize,
    /// Number of classes
    pub output_size: usize,
    pub rnn: RnnConfig,
    pub attention: AttentionConfig,
    pub classifier: ClassifierConfig,
    pub loss: LossConfig,
    #[config(default = "ModelVariant::RecurrentMean")]
    pub variant: ModelVariant,
    #[config(default = 1e-4)]
    pub lr: f64,
    /// Best-effort load of `pretrained_path` at construction
    #[config(default = false)]
    pub load_pretrained: bool,
    pub pretrained_path: Option<String>,
    /// Checkpoint keys containing any of these substrings are never loaded
    #[config(default = "Vec::new()")]
    pub checkpoint_exclude: Vec<String>,
}

/// Source of suggested hyperparameter values (the search driver)
pub trait HyperparameterSampler {
    /// Integer in `low..=high`
    fn suggest_int(&mut self, name: &str, low: usize, high: usize) -> usize;

    /// Float in `low..high`
    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> f64;
}

/// Seeded uniform sampler that records every suggestion it makes
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
    history: Vec<(String, f64)>,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            history: Vec::new(),
        }
    }

    /// Suggestions made so far, in order
    pub fn history(&self) -> &[(String, f64)] {
        &self.history
    }
}

impl HyperparameterSampler for RandomSampler {
    fn suggest_int(&mut self, name: &str, low: usize, high: usize) -> usize {
        let value = self.rng.gen_range(low..=high);
        self.history.push((name.to_string(), value as f64));
        value
    }

    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> f64 {
        let value = self.rng.gen_range(low..high);
        self.history.push((name.to_string(), value));
        value
    }
}

impl GlassConfig {
    /// Default hyperparameters of a variant
    pub fn default_hps(variant: ModelVariant, input_size: usize, output_size: usize) -> Self {
        let rnn = RnnConfig {
            single_embed: true,
            num_layers: 1,
            input_embedding_size: 16,
            hidden_size: 16,
            alignment: Self::variant_alignment(variant),
        };
        let attention = AttentionConfig {
            hidden_dim: 16,
            projection: Self::variant_projection(variant),
            track_grads: true,
            use_tan: TanhPlacement::None,
            use_gate: true,
            norm_epsilon: default_norm_epsilon(),
            strict_norm: false,
        };
        let classifier = ClassifierConfig {
            aggregation: Aggregation::MeanLogits,
            dropout: default_dropout(),
        };
        let loss = LossConfig {
            threshold: 0.01,
            lambda: 1.0,
            minimize_global: false,
            contract: Self::variant_contract(variant),
            negative_slope: default_negative_slope(),
        };

        Self::new(input_size, output_size, rnn, attention, classifier, loss)
            .with_variant(variant)
            .with_checkpoint_exclude(Self::variant_exclusions(variant))
    }

    /// Hyperparameters drawn from the search space of a variant
    pub fn random_hps(
        variant: ModelVariant,
        input_size: usize,
        output_size: usize,
        sampler: &mut impl HyperparameterSampler,
    ) -> Self {
        let mut config = Self::default_hps(variant, input_size, output_size);

        config.rnn.input_embedding_size = sampler.suggest_int("rnn.input_embedding_size", 4, 64);
        config.rnn.hidden_size = sampler.suggest_int("rnn.hidden_embedding_size", 4, 128);
        config.attention.hidden_dim = sampler.suggest_int("attention.hidden_dim", 4, 64);
        config.loss.threshold = 10f64.powf(sampler.suggest_float("loss.threshold", -2.0, -0.2));
        config.loss.lambda = 10f64.powf(sampler.suggest_float("loss.lambda", -1.0, 1.0));
        config.lr = 10f64.powf(sampler.suggest_float("lr", -5.0, -3.0));

        config
    }

    fn variant_alignment(variant: ModelVariant) -> StateAlignment {
        match variant {
            ModelVariant::Fixed => StateAlignment::PredictNext,
            ModelVariant::RecurrentMean => StateAlignment::PostMix,
        }
    }

    fn variant_projection(variant: ModelVariant) -> ProjectionKind {
        match variant {
            ModelVariant::Fixed => ProjectionKind::Mlp,
            ModelVariant::RecurrentMean => ProjectionKind::Linear,
        }
    }

    fn variant_contract(variant: ModelVariant) -> LossContract {
        match variant {
            ModelVariant::Fixed => LossContract::Combined,
            ModelVariant::RecurrentMean => LossContract::Separate,
        }
    }

    fn variant_exclusions(variant: ModelVariant) -> Vec<String> {
        match variant {
            ModelVariant::Fixed => vec!["gta".to_string(), "clf".to_string()],
            ModelVariant::RecurrentMean => Vec::new(),
        }
    }

    /// Check every field the model and loss depend on
    pub fn validate(&self) -> GlassResult<()> {
        if self.input_size < 2 {
            return Err(config_error(
                "input_size",
                format!(
                    "need at least 2 components for the sparsity measure, got {}",
                    self.input_size
                ),
            ));
        }
        if self.output_size == 0 {
            return Err(config_error("output_size", "must be > 0"));
        }
        if self.rnn.num_layers != 1 {
            return Err(config_error(
                "rnn.num_layers",
                format!(
                    "only a single recurrent layer is supported, got {}",
                    self.rnn.num_layers
                ),
            ));
        }
        if self.rnn.input_embedding_size == 0 {
            return Err(config_error("rnn.input_embedding_size", "must be > 0"));
        }
        if self.rnn.hidden_size == 0 {
            return Err(config_error("rnn.hidden_size", "must be > 0"));
        }
        if self.attention.hidden_dim == 0 {
            return Err(config_error("attention.hidden_dim", "must be > 0"));
        }
        if self.attention.norm_epsilon.is_nan() || self.attention.norm_epsilon <= 0.0 {
            return Err(config_error("attention.norm_epsilon", "must be > 0"));
        }
        if !(0.0..1.0).contains(&self.classifier.dropout) {
            return Err(config_error("classifier.dropout", "must be in [0, 1)"));
        }
        if !self.loss.lambda.is_finite() || self.loss.lambda < 0.0 {
            return Err(config_error("loss.lambda", "must be finite and >= 0"));
        }
        if !self.loss.threshold.is_finite() {
            return Err(config_error("loss.threshold", "must be finite"));
        }
        if self.load_pretrained && self.pretrained_path.is_none() {
            return Err(config_error(
                "pretrained_path",
                "load_pretrained is set but no checkpoint path was given",
            ));
        }
        Ok(())
    }

    /// Read a JSON config from disk
    pub fn from_file(path: &str) -> GlassResult<Self> {
        let json = std::fs::read_to_string(path).with_path(path)?;
        Self::from_json(&json)
    }

    /// Parse a JSON config, accepting `pretrained` for `load_pretrained`
    pub fn from_json(json: &str) -> GlassResult<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(fields) = value.as_object_mut() {
            if !fields.contains_key("load_pretrained") {
                if let Some(flag) = fields.remove("pretrained") {
                    fields.insert("load_pretrained".to_string(), flag);
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Width of one flattened mixing matrix
    pub fn mixing_features(&self) -> usize {
        self.input_size * self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GlassError;

    #[test]
    fn test_default_hps_are_valid() {
        for variant in [ModelVariant::Fixed, ModelVariant::RecurrentMean] {
            let config = GlassConfig::default_hps(variant, 53, 2);
            assert!(config.validate().is_ok());
            assert_eq!(config.rnn.hidden_size, 16);
            assert_eq!(config.loss.threshold, 0.01);
            assert!(!config.loss.minimize_global);
        }
    }

    #[test]
    fn test_variant_presets() {
        let fixed = GlassConfig::default_hps(ModelVariant::Fixed, 8, 2);
        assert_eq!(fixed.attention.projection, ProjectionKind::Mlp);
        assert_eq!(fixed.rnn.alignment, StateAlignment::PredictNext);
        assert_eq!(fixed.loss.contract, LossContract::Combined);
        assert_eq!(fixed.checkpoint_exclude, vec!["gta", "clf"]);

        let rec = GlassConfig::default_hps(ModelVariant::RecurrentMean, 8, 2);
        assert_eq!(rec.attention.projection, ProjectionKind::Linear);
        assert_eq!(rec.rnn.alignment, StateAlignment::PostMix);
        assert_eq!(rec.loss.contract, LossContract::Separate);
        assert!(rec.checkpoint_exclude.is_empty());
    }

    #[test]
    fn test_num_layers_rejected() {
        let mut config = GlassConfig::default_hps(ModelVariant::Fixed, 8, 2);
        config.rnn.num_layers = 2;
        match config.validate() {
            Err(GlassError::UnsupportedConfiguration { field, .. }) => {
                assert_eq!(field, "rnn.num_layers")
            }
            other => panic!("expected UnsupportedConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_single_component_rejected() {
        let config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 1, 2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pretrained_requires_path() {
        let config =
            GlassConfig::default_hps(ModelVariant::Fixed, 8, 2).with_load_pretrained(true);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_random_hps_ranges() {
        let mut sampler = RandomSampler::new(7);
        for _ in 0..20 {
            let config =
                GlassConfig::random_hps(ModelVariant::RecurrentMean, 10, 3, &mut sampler);
            assert!((4..=64).contains(&config.rnn.input_embedding_size));
            assert!((4..=128).contains(&config.rnn.hidden_size));
            assert!((4..=64).contains(&config.attention.hidden_dim));
            assert!(config.loss.threshold >= 0.01 && config.loss.threshold < 10f64.powf(-0.2));
            assert!(config.loss.lambda >= 0.1 && config.loss.lambda < 10.0);
            assert!(config.lr >= 1e-5 && config.lr < 1e-3);
            assert!(config.validate().is_ok());
        }
        assert_eq!(sampler.history().len(), 20 * 6);
    }

    #[test]
    fn test_legacy_field_aliases() {
        let loss: LossConfig =
            serde_json::from_str(r#"{"threshold": 0.1, "labmda": 2.0, "minimize_global": true}"#)
                .unwrap();
        assert_eq!(loss.lambda, 2.0);
        assert_eq!(loss.contract, LossContract::Separate);

        let loss: LossConfig =
            serde_json::from_str(r#"{"threshold": 0.1, "lambdaa": 3.0, "minimize_global": false}"#)
                .unwrap();
        assert_eq!(loss.lambda, 3.0);

        let rnn: RnnConfig = serde_json::from_str(
            r#"{"single_embed": true, "num_layers": 1, "input_embedding_size": 8, "hidden_embedding_size": 12}"#,
        )
        .unwrap();
        assert_eq!(rnn.hidden_size, 12);
        assert_eq!(rnn.alignment, StateAlignment::PostMix);

        let attention: AttentionConfig = serde_json::from_str(
            r#"{"hidden_dim": 8, "track_grads": false, "use_tan": "after", "use_gate": false}"#,
        )
        .unwrap();
        assert_eq!(attention.use_tan, TanhPlacement::After);
        assert!(!attention.track_grads);
        assert_eq!(attention.norm_epsilon, 1e-6);
    }
}
