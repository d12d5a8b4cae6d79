//! Reduce-on-plateau learning-rate schedule.

use tracing::info;

/// Multiplies the learning rate by `factor` after `patience` epochs without a
/// relative improvement of at least `threshold` in the monitored loss.
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    lr: f64,
    factor: f64,
    patience: usize,
    threshold: f64,
    min_lr: f64,
    best: f64,
    bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn new(lr: f64, factor: f64, patience: usize) -> Self {
        Self {
            lr,
            factor,
            patience,
            threshold: 1e-4,
            min_lr: 0.0,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    pub fn with_min_lr(mut self, min_lr: f64) -> Self {
        self.min_lr = min_lr;
        self
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Feed the latest monitored loss, returning the learning rate to use next
    pub fn step(&mut self, loss: f64) -> f64 {
        if loss < self.best * (1.0 - self.threshold) {
            self.best = loss;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs > self.patience {
            let reduced = (self.lr * self.factor).max(self.min_lr);
            if reduced < self.lr {
                info!(from = self.lr, to = reduced, "Reducing learning rate");
                self.lr = reduced;
            }
            self.bad_epochs = 0;
        }

        self.lr
    }
}
