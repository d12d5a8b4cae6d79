//! Patience-based early stopping on a monitored score.

/// Outcome of one [`EarlyStopping::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopDecision {
    /// The score strictly improved on the best seen so far; save a checkpoint
    pub improved: bool,
    /// Patience is exhausted; stop training
    pub stop: bool,
}

/// Stops training once the score has not improved for `patience` epochs.
///
/// The first score always counts as an improvement. Ties do not.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    minimize: bool,
    counter: usize,
    best_score: Option<f64>,
    stopped: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, minimize: bool) -> Self {
        Self {
            patience,
            minimize,
            counter: 0,
            best_score: None,
            stopped: false,
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn should_stop(&self) -> bool {
        self.stopped
    }

    /// Record the score of a finished epoch
    pub fn step(&mut self, score: f64) -> StopDecision {
        let improved = match self.best_score {
            None => true,
            Some(best) => {
                let change = if self.minimize { best - score } else { score - best };
                change > 0.0
            }
        };

        if improved {
            self.best_score = Some(score);
            self.counter = 0;
        } else {
            self.counter += 1;
            if self.counter >= self.patience {
                self.stopped = true;
            }
        }

        StopDecision {
            improved,
            stop: self.stopped,
        }
    }
}
