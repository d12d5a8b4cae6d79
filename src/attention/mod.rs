//! # Transfer-Matrix Attention
//!
//! The attention block turns per-component hidden states into a
//! component-by-component transfer ("mixing") matrix and uses it to remix the
//! states. The same matrix is the model's interpretable connectivity output.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`Gate`] | `sigmoid(|T| + bias)` elementwise gate |
//! | [`Projection`] | Query/key network: one Linear, or a 3-layer MLP |
//! | [`TransferAttention`] | Similarity, normalization, gating and remix |
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | states | `[batch, components, hidden]` |
//! | transfer | `[batch, components, components]` |
//! | next states | `[batch, components, hidden]` |

pub mod gate;
pub mod projection;
pub mod transfer;

pub use gate::Gate;
pub use projection::Projection;
pub use transfer::{TransferAttention, TransferOutput};
