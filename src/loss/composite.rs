//! Composite loss: cross-entropy + lambda * sparsity [+ reconstruction].

use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};

use super::hoyer::HoyerPenalty;
use crate::config::{LossConfig, LossContract};
use crate::error::{shape_error, GlassResult};
use crate::model::GlassOutput;

/// Value returned by [`CompositeLoss::forward`], shaped by the configured contract
#[derive(Debug, Clone)]
pub enum LossValue<B: Backend> {
    /// `ce + lambda * sparsity + reconstruction`
    Combined(Tensor<B, 1>),
    /// `ce` and `lambda * sparsity`; reconstruction stays with the model output
    Separate {
        classification: Tensor<B, 1>,
        sparsity: Tensor<B, 1>,
    },
}

impl<B: Backend> LossValue<B> {
    /// Sum of the returned terms
    pub fn total(&self) -> Tensor<B, 1> {
        match self {
            LossValue::Combined(total) => total.clone(),
            LossValue::Separate {
                classification,
                sparsity,
            } => classification.clone() + sparsity.clone(),
        }
    }

    /// Host values of the returned terms, for logging
    pub fn named_terms(&self) -> Vec<(&'static str, f64)> {
        match self {
            LossValue::Combined(total) => vec![("loss", scalar(total))],
            LossValue::Separate {
                classification,
                sparsity,
            } => vec![
                ("ce_loss", scalar(classification)),
                ("sparsity_loss", scalar(sparsity)),
            ],
        }
    }
}

fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

/// Classification loss regularized by the sparsity of the mixing matrices
#[derive(Debug, Clone)]
pub struct CompositeLoss {
    penalty: HoyerPenalty,
    lambda: f64,
    minimize_global: bool,
    contract: LossContract,
}

impl CompositeLoss {
    pub fn new(config: &LossConfig) -> Self {
        Self {
            penalty: HoyerPenalty::new(config.threshold, config.negative_slope),
            lambda: config.lambda,
            minimize_global: config.minimize_global,
            contract: config.contract,
        }
    }

    pub fn contract(&self) -> LossContract {
        self.contract
    }

    /// Unscaled sparsity penalty of a model output.
    ///
    /// With `minimize_global` the temporal-mean matrix of each sample is
    /// penalized; otherwise every `[batch * time]` matrix is penalized and the
    /// results averaged.
    pub fn sparsity<B: Backend>(&self, output: &GlassOutput<B>) -> Tensor<B, 1> {
        if self.minimize_global {
            self.penalty.forward(output.mean_mixing.clone())
        } else {
            let [batch, seq_len, rows, cols] = output.mixing.dims();
            let flat = output.mixing.clone().reshape([batch * seq_len, rows, cols]);
            self.penalty.forward(flat)
        }
    }

    /// Evaluate the loss against integer class targets `[batch]`
    pub fn forward<B: Backend>(
        &self,
        output: &GlassOutput<B>,
        targets: Tensor<B, 1, Int>,
    ) -> GlassResult<LossValue<B>> {
        let [batch, _] = output.logits.dims();
        let [n_targets] = targets.dims();
        if n_targets != batch {
            return Err(shape_error("loss targets", &[batch], &[n_targets]));
        }

        let device = output.logits.device();
        let classification = CrossEntropyLossConfig::new()
            .init(&device)
            .forward(output.logits.clone(), targets);
        let sparsity = self.sparsity(output).mul_scalar(self.lambda);

        Ok(match self.contract {
            LossContract::Combined => {
                let mut total = classification + sparsity;
                if let Some(reconstruction) = output.reconstruction_loss() {
                    total = total + reconstruction;
                }
                LossValue::Combined(total)
            }
            LossContract::Separate => LossValue::Separate {
                classification,
                sparsity,
            },
        })
    }
}
