//! # Recurrent Cells
//!
//! Single-timestep building blocks of the mixing recurrence. They are driven
//! over a whole sequence by [`MixingRnn`](crate::rnn::MixingRnn).
//!
//! | Cell | Description |
//! |------|-------------|
//! | [`ComponentEmbedding`] | Shared or per-component `1 -> E` linear maps |
//! | [`GRUCell`] | Standard single-layer GRU update |
//! | [`GlassCell`] | GRU update per component, then transfer-matrix mixing |
//!
//! ## One Step
//!
//! ```text
//! h~_t = GRU(embed(x_t), h_{t-1})          per component
//! T_t  = attention(h~_t)                   [batch, C, C]
//! h_t  = T_t @ h~_t
//! ```
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `embedded` | `[batch, components, embedding_dim]` |
//! | `state` | `[batch, components, hidden_size]` |
//! | `transfer` | `[batch, components, components]` |

pub mod embedding;
pub mod glass_cell;
pub mod gru_cell;

pub use embedding::ComponentEmbedding;
pub use glass_cell::GlassCell;
pub use gru_cell::GRUCell;
