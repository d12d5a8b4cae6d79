//! Mixing RNN: drives [`GlassCell`] across the time axis.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use tracing::error;

use crate::cells::{ComponentEmbedding, GlassCell};
use crate::config::GlassConfig;
use crate::error::{shape_error, GlassError, GlassResult};

/// Per-timestep outputs of one forward pass, stacked along time
#[derive(Debug, Clone)]
pub struct SequenceOutput<B: Backend> {
    /// Post-mix hidden states, `[batch, time, C, hidden]`
    pub hidden_states: Tensor<B, 4>,
    /// Transfer matrices, `[batch, time, C, C]`
    pub mixing: Tensor<B, 4>,
}

/// Sequence driver for the mixing recurrence.
///
/// The hidden state starts at zero for every call and is never carried over
/// between calls, so a forward pass owns all of its buffers.
#[derive(Module, Debug)]
pub struct MixingRnn<B: Backend> {
    pub embeddings: ComponentEmbedding<B>,
    pub cell: GlassCell<B>,
    #[module(skip)]
    n_components: usize,
    #[module(skip)]
    strict_norm: bool,
}

impl<B: Backend> MixingRnn<B> {
    /// Create the driver from a validated configuration
    pub fn new(config: &GlassConfig, device: &B::Device) -> Self {
        let embeddings = ComponentEmbedding::new(
            config.input_size,
            config.rnn.input_embedding_size,
            config.rnn.single_embed,
            device,
        );
        let cell = GlassCell::new(
            config.input_size,
            config.rnn.input_embedding_size,
            config.rnn.hidden_size,
            &config.attention,
            device,
        );

        Self {
            embeddings,
            cell,
            n_components: config.input_size,
            strict_norm: config.attention.strict_norm,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn hidden_size(&self) -> usize {
        self.cell.hidden_size()
    }

    /// Run the recurrence over `[batch, time, components]`
    ///
    /// Fails with [`GlassError::NumericalInstability`] at the first timestep
    /// whose mixed hidden state holds a NaN or infinity.
    pub fn forward(&self, input: Tensor<B, 3>) -> GlassResult<SequenceOutput<B>> {
        let [batch, seq_len, components] = input.dims();
        if seq_len == 0 || batch == 0 {
            return Err(shape_error(
                "sequence input",
                &[batch.max(1), seq_len.max(1), self.n_components],
                &[batch, seq_len, components],
            ));
        }

        let embedded = self.embeddings.forward(input)?;
        let device = embedded.device();

        let mut state = Tensor::<B, 3>::zeros([batch, components, self.hidden_size()], &device);
        let mut hidden_states: Vec<Tensor<B, 3>> = Vec::with_capacity(seq_len);
        let mut mixing: Vec<Tensor<B, 3>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            // embedded[:, t] -> [batch, C, embedding_dim]
            let step_input = embedded.clone().narrow(1, t, 1).squeeze::<3>(1);
            let step = self.cell.forward(step_input, state)?;

            if self.strict_norm {
                self.check_norms(&step.norms, t)?;
            }
            ensure_finite(&step.next_states, t)?;

            state = step.next_states;
            hidden_states.push(state.clone());
            mixing.push(step.transfer);
        }

        Ok(SequenceOutput {
            hidden_states: Tensor::stack(hidden_states, 1),
            mixing: Tensor::stack(mixing, 1),
        })
    }

    fn check_norms(&self, norms: &Tensor<B, 1>, timestep: usize) -> GlassResult<()> {
        let floor = self.cell.attention.norm_epsilon() as f32;
        let smallest: f32 = norms.clone().min().into_scalar().elem();
        if smallest < floor || !smallest.is_finite() {
            error!(timestep, norm = smallest, floor, "Degenerate transfer matrix");
            return Err(GlassError::DegenerateNormalization {
                timestep,
                norm: smallest,
            });
        }
        Ok(())
    }
}

/// Fail if any value of `state` is NaN or infinite
pub(crate) fn ensure_finite<B: Backend, const D: usize>(
    state: &Tensor<B, D>,
    timestep: usize,
) -> GlassResult<()> {
    let data = state.clone().into_data().convert::<f32>();
    let non_finite = data.iter::<f32>().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        error!(timestep, non_finite, "Hidden state has non-finite values");
        return Err(GlassError::NumericalInstability { timestep });
    }
    Ok(())
}
