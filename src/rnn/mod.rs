//! # Sequence Processing
//!
//! [`MixingRnn`] embeds the input, starts from a zero hidden state and applies
//! [`GlassCell`](crate::cells::GlassCell) once per timestep, strictly in
//! order. It returns the stacked post-mix hidden states and transfer matrices.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | input | `[batch, time, components]` (batch-first only) |
//! | hidden states | `[batch, time, components, hidden_size]` |
//! | mixing matrices | `[batch, time, components, components]` |
//!
//! ## Failure
//!
//! A NaN or infinity in the hidden state aborts the pass with
//! [`GlassError::NumericalInstability`](crate::error::GlassError) carrying the
//! timestep; corrupted state is never propagated further.

pub mod mixing;

pub use mixing::{MixingRnn, SequenceOutput};
