//! # Training
//!
//! | Piece | Role |
//! |-------|------|
//! | [`BatchSource`] | Supplies host batches per split |
//! | [`MetricsSink`] | Receives `{split}_{metric}` values |
//! | [`EarlyStopping`] | Patience on the validation loss |
//! | [`PlateauScheduler`] | Reduce-on-plateau learning rate |
//! | [`Trainer`] | Adam loop with best-state restore |
//!
//! ```text
//! for epoch:
//!     train  -> backward + Adam step per batch
//!     valid  -> model.valid(), no gradients
//!     scheduler.step(valid_loss); early_stopping.step(valid_loss)
//! restore best; test on remaining splits
//! ```

pub mod data;
pub mod early_stopping;
pub mod metrics;
pub mod scheduler;
pub mod trainer;

pub use data::{Batch, BatchSource, InMemorySource};
pub use early_stopping::{EarlyStopping, StopDecision};
pub use metrics::{MetricsSink, RecordingSink, TracingSink};
pub use scheduler::PlateauScheduler;
pub use trainer::{FitReport, RunReport, Trainer, TrainerConfig, TRAIN_SPLIT, VALID_SPLIT};
