//! Per-timestep recurrent cell: GRU update followed by transfer-matrix mixing.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gru_cell::GRUCell;
use crate::attention::{TransferAttention, TransferOutput};
use crate::config::AttentionConfig;
use crate::error::{shape_error, GlassResult};

/// One step of the mixing recurrence.
///
/// Every component carries its own hidden vector. The GRU updates all of them
/// independently (batch and component axes are flattened into one batch
/// dimension for the recurrent primitive), after which the attention block
/// couples the components through the transfer matrix.
#[derive(Module, Debug)]
pub struct GlassCell<B: Backend> {
    pub gru: GRUCell<B>,
    pub attention: TransferAttention<B>,
    #[module(skip)]
    n_components: usize,
}

impl<B: Backend> GlassCell<B> {
    pub fn new(
        n_components: usize,
        embedding_dim: usize,
        hidden_dim: usize,
        attention: &AttentionConfig,
        device: &B::Device,
    ) -> Self {
        Self {
            gru: GRUCell::new(embedding_dim, hidden_dim, device),
            attention: TransferAttention::new(hidden_dim, n_components, attention, device),
            n_components,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn hidden_size(&self) -> usize {
        self.gru.hidden_size()
    }

    /// Advance the state by one timestep
    ///
    /// # Arguments
    /// * `embedded` - Component embeddings at time t, `[batch, C, embedding_dim]`
    /// * `state` - Hidden state from t-1, `[batch, C, hidden]`
    ///
    /// # Returns
    /// The mixed next state and the transfer matrix of this timestep
    pub fn forward(
        &self,
        embedded: Tensor<B, 3>,
        state: Tensor<B, 3>,
    ) -> GlassResult<TransferOutput<B>> {
        let [batch, components, embedding_dim] = embedded.dims();
        let hidden = self.gru.hidden_size();
        if components != self.n_components || embedding_dim != self.gru.input_size() {
            return Err(shape_error(
                "cell embedding",
                &[self.n_components, self.gru.input_size()],
                &[components, embedding_dim],
            ));
        }
        if state.dims() != [batch, components, hidden] {
            return Err(shape_error(
                "cell state",
                &[batch, components, hidden],
                &state.dims(),
            ));
        }

        let flat_input = embedded.reshape([batch * components, embedding_dim]);
        let flat_state = state.reshape([batch * components, hidden]);
        let updated = self
            .gru
            .forward(flat_input, flat_state)
            .reshape([batch, components, hidden]);

        self.attention.forward(updated)
    }
}
