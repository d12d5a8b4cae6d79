//! Transfer-operator self-attention.
//!
//! Queries and keys are projected from the per-component hidden states and
//! their product forms a component-by-component transfer matrix. The matrix is
//! normalized by its own Frobenius norm, optionally squashed and gated, and
//! then used to remix the hidden states:
//!
//! ```text
//! T_raw = Q(H) @ K(H)^T                     [batch, C, C]
//! T     = T_raw / sqrt(max(||T_raw||_F^2, eps^2))
//! T     = T * sigmoid(|T| + bias)           (if gated)
//! H'    = T @ H                             [batch, C, hidden]
//! ```

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gate::Gate;
use super::projection::Projection;
use crate::activation::TanhPlacement;
use crate::config::{AttentionConfig, ProjectionKind};
use crate::error::{shape_error, GlassResult};

/// Result of one attention step
#[derive(Debug, Clone)]
pub struct TransferOutput<B: Backend> {
    /// Remixed hidden states, `[batch, C, hidden]`
    pub next_states: Tensor<B, 3>,
    /// Normalized (and possibly gated) transfer matrix, `[batch, C, C]`
    pub transfer: Tensor<B, 3>,
    /// Frobenius norm of the raw matrix before the floor, `[batch]`
    pub norms: Tensor<B, 1>,
}

/// Self-attention producing the per-timestep mixing matrix
#[derive(Module, Debug)]
pub struct TransferAttention<B: Backend> {
    pub query: Projection<B>,
    pub key: Projection<B>,
    pub gate: Option<Gate<B>>,
    #[module(skip)]
    input_dim: usize,
    #[module(skip)]
    n_components: usize,
    #[module(skip)]
    track_grads: bool,
    #[module(skip)]
    use_tan: TanhPlacement,
    #[module(skip)]
    norm_epsilon: f64,
}

impl<B: Backend> TransferAttention<B> {
    /// Create the attention block for `n_components` states of width `input_dim`
    pub fn new(
        input_dim: usize,
        n_components: usize,
        config: &AttentionConfig,
        device: &B::Device,
    ) -> Self {
        let query = Projection::new(config.projection, input_dim, config.hidden_dim, device);
        let key = Projection::new(config.projection, input_dim, config.hidden_dim, device);
        let gate = config.use_gate.then(|| Gate::new(n_components, device));

        Self {
            query,
            key,
            gate,
            input_dim,
            n_components,
            track_grads: config.track_grads,
            use_tan: config.use_tan,
            norm_epsilon: config.norm_epsilon,
        }
    }

    pub fn projection(&self) -> ProjectionKind {
        self.query.kind()
    }

    pub fn tanh_placement(&self) -> TanhPlacement {
        self.use_tan
    }

    pub fn is_gated(&self) -> bool {
        self.gate.is_some()
    }

    pub fn tracks_norm_grads(&self) -> bool {
        self.track_grads
    }

    pub fn norm_epsilon(&self) -> f64 {
        self.norm_epsilon
    }

    /// Raw similarity matrix `Q @ K^T`
    pub fn similarities(&self, states: Tensor<B, 3>) -> Tensor<B, 3> {
        let queries = self.query.forward(states.clone());
        let keys = self.key.forward(states);
        queries.matmul(keys.transpose())
    }

    /// Normalize a raw similarity matrix by its own norm.
    ///
    /// Returns the normalized matrix (tanh applied per placement, no gate) and
    /// the unfloored norms. With `track_grads` off the norm is detached, so it
    /// acts as a constant rescaling during backpropagation.
    pub fn normalize(&self, raw: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 1>) {
        let placement = self.tanh_placement();
        let raw = placement.before_norm(raw);
        let [batch, _, _] = raw.dims();

        let sum_sq = raw.clone().powf_scalar(2.0).sum_dim(2).sum_dim(1);
        let reported = sum_sq.clone().detach().sqrt().reshape([batch]);

        // Floor under the sqrt, so a zero matrix has a finite gradient too
        let floor = self.norm_epsilon * self.norm_epsilon;
        let mut norms = sum_sq.clamp_min(floor).sqrt();
        if !self.track_grads {
            norms = norms.detach();
        }

        let normalized = raw / norms;
        (placement.after_norm(normalized), reported)
    }

    /// Run attention over per-component states `[batch, C, input_dim]`
    pub fn forward(&self, states: Tensor<B, 3>) -> GlassResult<TransferOutput<B>> {
        let [_, components, width] = states.dims();
        if components != self.n_components || width != self.input_dim {
            return Err(shape_error(
                "attention states",
                &[self.n_components, self.input_dim],
                &[components, width],
            ));
        }

        let raw = self.similarities(states.clone());
        let (mut transfer, norms) = self.normalize(raw);

        if let Some(ref gate) = self.gate {
            let a = gate.forward(transfer.clone())?;
            transfer = transfer * a;
        }

        let next_states = transfer.clone().matmul(states);

        Ok(TransferOutput {
            next_states,
            transfer,
            norms,
        })
    }
}
