//! Host-side batches and the data-source seam.

use std::collections::BTreeMap;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use ndarray::{Array3, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{shape_error, GlassResult};

/// One batch: inputs `[batch, time, components]` and class indices `[batch]`
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Array3<f32>,
    pub targets: Vec<i64>,
}

impl Batch {
    pub fn new(inputs: Array3<f32>, targets: Vec<i64>) -> GlassResult<Self> {
        let (batch, seq_len, components) = inputs.dim();
        if targets.len() != batch {
            return Err(shape_error(
                "batch targets",
                &[batch],
                &[targets.len()],
            ));
        }
        if seq_len == 0 || components == 0 {
            return Err(shape_error(
                "batch inputs",
                &[batch, seq_len.max(1), components.max(1)],
                &[batch, seq_len, components],
            ));
        }
        Ok(Self { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Shuffle the time axis of every sample independently
    pub fn permute_time<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let seq_len = self.inputs.len_of(Axis(1));
        for mut sample in self.inputs.outer_iter_mut() {
            let mut order: Vec<usize> = (0..seq_len).collect();
            order.shuffle(rng);
            let permuted = sample.select(Axis(0), &order);
            sample.assign(&permuted);
        }
    }

    /// Move the batch onto `device`
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 3>, Tensor<B, 1, Int>) {
        let (batch, seq_len, components) = self.inputs.dim();
        let values: Vec<f32> = self.inputs.iter().copied().collect();
        let inputs = Tensor::from_data(
            TensorData::new(values, [batch, seq_len, components]),
            device,
        );
        let targets = Tensor::from_data(TensorData::new(self.targets.clone(), [batch]), device);
        (inputs, targets)
    }
}

/// Supplier of batches for named splits ("train", "valid", "test", ...)
pub trait BatchSource {
    /// All split names this source can serve
    fn splits(&self) -> Vec<String>;

    /// Batches of one split for a single pass
    fn batches(&mut self, split: &str) -> GlassResult<Vec<Batch>>;
}

/// Fixed batches held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    splits: BTreeMap<String, Vec<Batch>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_split(mut self, name: impl Into<String>, batches: Vec<Batch>) -> Self {
        self.splits.insert(name.into(), batches);
        self
    }
}

impl BatchSource for InMemorySource {
    fn splits(&self) -> Vec<String> {
        self.splits.keys().cloned().collect()
    }

    fn batches(&mut self, split: &str) -> GlassResult<Vec<Batch>> {
        Ok(self.splits.get(split).cloned().unwrap_or_default())
    }
}
