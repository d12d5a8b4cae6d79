//! Structured logging with tracing.
//!
//! Library code only emits events; installing a subscriber is up to the
//! binary. The two initializers below cover the usual cases.

use tracing::{error, info, span, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize JSON logging.
///
/// Reads the filter from RUST_LOG (defaults to "info").
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dbn_glass=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Structured logging initialized");
}

/// Initialize human-readable console logging (for demos and debugging).
pub fn init_console_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dbn_glass=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

/// Per-epoch summary of one data split.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// Mean of the optimized objective over batches
    pub average_loss: f64,
    /// Fraction of correctly classified samples
    pub accuracy: f64,
    /// Mean of every named loss term, in first-seen order
    pub terms: Vec<(String, f64)>,
}

impl EpochMetrics {
    /// Flat `{split}_{name}` pairs for a metrics sink
    pub fn named(&self, split: &str) -> Vec<(String, f64)> {
        let mut named = vec![
            (format!("{split}_accuracy"), self.accuracy),
            (format!("{split}_average_loss"), self.average_loss),
        ];
        named.extend(
            self.terms
                .iter()
                .map(|(name, value)| (format!("{split}_{name}"), *value)),
        );
        named
    }
}

/// Log an epoch summary.
///
/// Emits an error for a non-finite loss and a warning for chance-level
/// accuracy after the first few epochs.
pub fn log_epoch(split: &str, epoch: usize, n_classes: usize, metrics: &EpochMetrics) {
    let span = span!(Level::INFO, "epoch", split = split, epoch = epoch);
    let _enter = span.enter();

    if !metrics.average_loss.is_finite() {
        error!(
            loss = metrics.average_loss,
            "Loss diverged: NaN or infinite average"
        );
        return;
    }

    info!(
        loss = metrics.average_loss,
        accuracy = metrics.accuracy,
        terms = ?metrics.terms,
        "Epoch completed"
    );

    let chance = 1.0 / n_classes.max(1) as f64;
    if epoch >= 5 && metrics.accuracy <= chance {
        warn!(
            accuracy = metrics.accuracy,
            chance,
            "Accuracy at or below chance level"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_metrics_are_prefixed() {
        let metrics = EpochMetrics {
            average_loss: 0.5,
            accuracy: 0.75,
            terms: vec![("ce_loss".to_string(), 0.4)],
        };

        let named = metrics.named("val");
        assert_eq!(named[0], ("val_accuracy".to_string(), 0.75));
        assert_eq!(named[1], ("val_average_loss".to_string(), 0.5));
        assert_eq!(named[2], ("val_ce_loss".to_string(), 0.4));
    }

    #[test]
    fn test_log_epoch_without_subscriber() {
        let metrics = EpochMetrics {
            average_loss: f64::NAN,
            accuracy: 0.0,
            terms: Vec::new(),
        };
        log_epoch("train", 0, 2, &metrics);
    }
}
