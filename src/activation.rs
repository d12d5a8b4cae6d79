//! Bounded nonlinearity applied around the transfer-matrix normalization.

use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Where `tanh` is applied to the transfer matrix, if at all.
///
/// - `Before`: on the raw `Q @ K^T` similarities, prior to normalization
/// - `After`: on the normalized matrix, prior to gating
///
/// # Example
///
/// ```rust
/// use burn::backend::NdArray;
/// use burn::tensor::Tensor;
/// use dbn_glass::activation::TanhPlacement;
///
/// type Backend = NdArray<f32>;
/// let device = Default::default();
///
/// let x = Tensor::<Backend, 1>::from_floats([0.0, 1.0, -1.0], &device);
/// let y = TanhPlacement::Before.before_norm(x);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TanhPlacement {
    #[default]
    None,
    Before,
    After,
}

impl TanhPlacement {
    /// Applies `tanh` if placed before the normalization
    pub fn before_norm<B: Backend, const D: usize>(self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            TanhPlacement::Before => x.tanh(),
            _ => x,
        }
    }

    /// Applies `tanh` if placed after the normalization
    pub fn after_norm<B: Backend, const D: usize>(self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            TanhPlacement::After => x.tanh(),
            _ => x,
        }
    }
}

// Burn's `Module` derive requires every field to be a module; treat the
// placement as a constant, like burn does for primitive fields.
impl<B: Backend> burn::module::Module<B> for TanhPlacement {
    type Record = burn::module::ConstantRecord;

    fn visit<V: burn::module::ModuleVisitor<B>>(&self, _visitor: &mut V) {}

    fn map<M: burn::module::ModuleMapper<B>>(self, _mapper: &mut M) -> Self {
        self
    }

    fn load_record(self, _record: Self::Record) -> Self {
        self
    }

    fn into_record(self) -> Self::Record {
        burn::module::ConstantRecord::new()
    }

    fn to_device(self, _: &B::Device) -> Self {
        self
    }

    fn fork(self, _: &B::Device) -> Self {
        self
    }

    fn collect_devices(&self, devices: burn::module::Devices<B>) -> burn::module::Devices<B> {
        devices
    }
}

impl<B: burn::tensor::backend::AutodiffBackend> burn::module::AutodiffModule<B> for TanhPlacement {
    type InnerModule = TanhPlacement;

    fn valid(&self) -> Self::InnerModule {
        *self
    }
}

impl burn::module::ModuleDisplayDefault for TanhPlacement {
    fn content(&self, content: burn::module::Content) -> Option<burn::module::Content> {
        content.add_formatted(&format!("{:?}", self)).optional()
    }
}

impl burn::module::ModuleDisplay for TanhPlacement {}
