use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Single-layer GRU cell
///
/// Implements the standard GRU equations:
/// - r = sigmoid(W_ir @ x + b_ir + W_hr @ h + b_hr)
/// - z = sigmoid(W_iz @ x + b_iz + W_hz @ h + b_hz)
/// - n = tanh(W_in @ x + b_in + r * (W_hn @ h + b_hn))
/// - h' = (1 - z) * n + z * h
#[derive(Module, Debug)]
pub struct GRUCell<B: Backend> {
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    hidden_size: usize,
    pub input_map: Linear<B>,     // Maps input to 3 * hidden_size
    pub recurrent_map: Linear<B>, // Maps hidden state to 3 * hidden_size
}

impl<B: Backend> GRUCell<B> {
    /// Create a new GRU cell
    ///
    /// # Arguments
    /// * `input_size` - Size of the input features
    /// * `hidden_size` - Size of the hidden state
    /// * `device` - Device to create the module on
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let input_map = LinearConfig::new(input_size, 3 * hidden_size)
            .with_bias(true)
            .init(device);

        let recurrent_map = LinearConfig::new(hidden_size, 3 * hidden_size)
            .with_bias(true)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_map,
            recurrent_map,
        }
    }

    /// Get the input size
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Get the hidden size
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Perform a forward pass through the GRU cell
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, input_size]`
    /// * `hidden_state` - Previous state of shape `[batch_size, hidden_size]`
    ///
    /// # Returns
    /// The new hidden state, `[batch_size, hidden_size]`
    pub fn forward(&self, input: Tensor<B, 2>, hidden_state: Tensor<B, 2>) -> Tensor<B, 2> {
        let input_contrib = self.input_map.forward(input).chunk(3, 1);
        let recurrent_contrib = self.recurrent_map.forward(hidden_state.clone()).chunk(3, 1);

        let reset_gate =
            activation::sigmoid(input_contrib[0].clone() + recurrent_contrib[0].clone());
        let update_gate =
            activation::sigmoid(input_contrib[1].clone() + recurrent_contrib[1].clone());
        let candidate =
            (input_contrib[2].clone() + reset_gate * recurrent_contrib[2].clone()).tanh();

        // h' = (1 - z) * n + z * h
        candidate.clone() + update_gate * (hidden_state - candidate)
    }
}
