//! Scalar-to-vector embeddings of the input components.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{shape_error, GlassResult};

/// Embeds every component reading into `embedding_dim` features.
///
/// Either one linear map `1 -> embedding_dim` is shared by all components
/// (`shared`), or each component owns its own map (`per_component`). The
/// choice is fixed at construction.
#[derive(Module, Debug)]
pub struct ComponentEmbedding<B: Backend> {
    pub shared: Option<Linear<B>>,
    pub per_component: Vec<Linear<B>>,
    #[module(skip)]
    n_components: usize,
    #[module(skip)]
    embedding_dim: usize,
}

impl<B: Backend> ComponentEmbedding<B> {
    pub fn new(
        n_components: usize,
        embedding_dim: usize,
        single_embed: bool,
        device: &B::Device,
    ) -> Self {
        let (shared, per_component) = if single_embed {
            (Some(LinearConfig::new(1, embedding_dim).init(device)), Vec::new())
        } else {
            let maps = (0..n_components)
                .map(|_| LinearConfig::new(1, embedding_dim).init(device))
                .collect();
            (None, maps)
        };

        Self {
            shared,
            per_component,
            n_components,
            embedding_dim,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared.is_some()
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Embed `[batch, time, components]` into `[batch, time, components, embedding_dim]`
    pub fn forward(&self, x: Tensor<B, 3>) -> GlassResult<Tensor<B, 4>> {
        let [_, _, components] = x.dims();
        if components != self.n_components {
            return Err(shape_error(
                "embedding input components",
                &[self.n_components],
                &[components],
            ));
        }

        if let Some(ref shared) = self.shared {
            return Ok(shared.forward(x.unsqueeze_dim::<4>(3)));
        }

        let embedded = self
            .per_component
            .iter()
            .enumerate()
            .map(|(i, map)| map.forward(x.clone().narrow(2, i, 1)))
            .collect();
        Ok(Tensor::stack(embedded, 2))
    }
}
