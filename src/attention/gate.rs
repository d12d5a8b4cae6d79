//! Elementwise learned gate over a square matrix.

use burn::module::{Module, Param};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

use crate::error::{shape_error, GlassResult};

/// Learned bias + sigmoid gate: `A = sigmoid(|X| + B)`
///
/// The bias matrix is shared across the batch and initialized from a standard
/// normal distribution.
#[derive(Module, Debug)]
pub struct Gate<B: Backend> {
    /// Trainable bias, `[n, n]`
    pub bias: Param<Tensor<B, 2>>,
    #[module(skip)]
    size: usize,
}

impl<B: Backend> Gate<B> {
    /// Create a gate for `size x size` matrices
    pub fn new(size: usize, device: &B::Device) -> Self {
        let bias = Tensor::random([size, size], Distribution::Normal(0.0, 1.0), device);
        Self {
            bias: Param::from_tensor(bias),
            size,
        }
    }

    /// Side length of the gated matrices
    pub fn size(&self) -> usize {
        self.size
    }

    /// Gate values for `x` of shape `[batch, n, n]`, each in (0, 1)
    pub fn forward(&self, x: Tensor<B, 3>) -> GlassResult<Tensor<B, 3>> {
        let [_, rows, cols] = x.dims();
        if rows != self.size || cols != self.size {
            return Err(shape_error(
                "gate input",
                &[self.size, self.size],
                &[rows, cols],
            ));
        }

        let bias = self.bias.val().unsqueeze::<3>();
        Ok(activation::sigmoid(x.abs() + bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_gate_shape() {
        let device = Default::default();
        let gate = Gate::<TestBackend>::new(4, &device);
        let x = Tensor::<TestBackend, 3>::ones([2, 4, 4], &device);

        let a = gate.forward(x).unwrap();
        assert_eq!(a.dims(), [2, 4, 4]);
        assert_eq!(gate.size(), 4);
    }

    #[test]
    fn test_gate_rejects_mismatched_matrix() {
        let device = Default::default();
        let gate = Gate::<TestBackend>::new(4, &device);
        let x = Tensor::<TestBackend, 3>::ones([2, 3, 3], &device);

        assert!(gate.forward(x).is_err());
    }

    #[test]
    fn test_gate_matches_formula() {
        let device = Default::default();
        let gate = Gate::<TestBackend>::new(2, &device);
        let x = Tensor::<TestBackend, 1>::from_floats([-1.0f32, 0.5, 2.0, 0.0], &device)
            .reshape([1, 2, 2]);

        let a = gate.forward(x.clone()).unwrap();
        let bias = gate.bias.val().into_data().to_vec::<f32>().unwrap();
        let xs = x.into_data().to_vec::<f32>().unwrap();
        let got = a.into_data().to_vec::<f32>().unwrap();

        for i in 0..4 {
            let expected = 1.0 / (1.0 + (-(xs[i].abs() + bias[i])).exp());
            assert!((got[i] - expected).abs() < 1e-5);
        }
    }
}
