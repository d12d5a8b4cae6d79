//! Metric sinks: where epoch summaries and run-level values are sent.

use tracing::info;

/// Destination for flat `(name, value)` metrics
pub trait MetricsSink {
    /// Metrics of one epoch (or of a test pass when `epoch` is `None`)
    fn log_metrics(&mut self, epoch: Option<usize>, metrics: &[(String, f64)]);

    /// Run-level values such as the parameter count or training time
    fn log_summary(&mut self, key: &str, value: f64);
}

/// Forwards everything to tracing
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn log_metrics(&mut self, epoch: Option<usize>, metrics: &[(String, f64)]) {
        for (name, value) in metrics {
            info!(epoch = ?epoch, metric = %name, value = *value, "metric");
        }
    }

    fn log_summary(&mut self, key: &str, value: f64) {
        info!(key, value, "summary");
    }
}

/// Keeps every logged value, in order
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub metrics: Vec<(Option<usize>, String, f64)>,
    pub summary: Vec<(String, f64)>,
}

impl RecordingSink {
    /// Values logged under `name`, oldest first
    pub fn series(&self, name: &str) -> Vec<f64> {
        self.metrics
            .iter()
            .filter(|(_, n, _)| n == name)
            .map(|(_, _, v)| *v)
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn log_metrics(&mut self, epoch: Option<usize>, metrics: &[(String, f64)]) {
        self.metrics
            .extend(metrics.iter().map(|(name, value)| (epoch, name.clone(), *value)));
    }

    fn log_summary(&mut self, key: &str, value: f64) {
        self.summary.push((key.to_string(), value));
    }
}
