//! # Losses
//!
//! | Term | Aggregation |
//! |------|-------------|
//! | cross-entropy | mean over batch |
//! | sparsity ([`HoyerPenalty`]) | per timestep or on the temporal mean, then mean |
//! | reconstruction | MSE over `[batch, time - 1, C]` |
//!
//! The [`LossContract`](crate::config::LossContract) decides whether the
//! reconstruction term is folded into one scalar ([`LossValue::Combined`]) or
//! the classification and scaled sparsity terms are returned separately
//! ([`LossValue::Separate`]) with reconstruction read from the model output.

pub mod composite;
pub mod hoyer;

pub use composite::{CompositeLoss, LossValue};
pub use hoyer::{hoyer_sparsity, HoyerPenalty};
