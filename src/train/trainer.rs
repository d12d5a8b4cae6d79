//! Epoch loop: optimize on "train", select on "valid", report on the rest.

use std::path::PathBuf;
use std::time::Instant;

use burn::config::Config;
use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use super::data::{Batch, BatchSource};
use super::early_stopping::EarlyStopping;
use super::metrics::MetricsSink;
use super::scheduler::PlateauScheduler;
use crate::checkpoint::StateDict;
use crate::config::{GlassConfig, LossContract};
use crate::error::{config_error, GlassResult, IoResultExt};
use crate::logging::{log_epoch, EpochMetrics};
use crate::loss::{CompositeLoss, LossValue};
use crate::model::{GlassModel, GlassOutput};

pub const TRAIN_SPLIT: &str = "train";
pub const VALID_SPLIT: &str = "valid";

/// Configuration for [`Trainer`]
#[derive(Config, Debug)]
pub struct TrainerConfig {
    #[config(default = 200)]
    pub max_epochs: usize,
    /// Epochs without validation improvement before stopping
    #[config(default = 30)]
    pub patience: usize,
    /// Shuffle time points of every training sample each epoch
    #[config(default = false)]
    pub permute_time: bool,
    #[config(default = 0.1)]
    pub scheduler_factor: f64,
    #[config(default = 10)]
    pub scheduler_patience: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Where `best_model.json` is written; kept in memory only when unset
    pub checkpoint_dir: Option<String>,
    #[config(default = false)]
    pub preserve_checkpoints: bool,
}

/// Result of [`Trainer::fit`]
#[derive(Debug)]
pub struct FitReport<B: Backend> {
    /// Model with the best validation parameters restored
    pub model: GlassModel<B>,
    /// Per-epoch `(train, valid)` summaries
    pub history: Vec<(EpochMetrics, EpochMetrics)>,
    pub best_valid_loss: Option<f64>,
    pub stopped_early: bool,
    pub training_time: f64,
}

/// Result of [`Trainer::run`]
#[derive(Debug)]
pub struct RunReport<B: Backend> {
    pub model: GlassModel<B>,
    pub test_metrics: Vec<(String, f64)>,
    pub training_time: f64,
}

#[derive(Default)]
struct EpochAccumulator {
    loss_sum: f64,
    n_batches: usize,
    correct: usize,
    seen: usize,
    terms: Vec<(String, f64)>,
}

impl EpochAccumulator {
    fn add_terms(&mut self, terms: &[(&str, f64)]) {
        for (name, value) in terms {
            match self.terms.iter_mut().find(|(n, _)| n.as_str() == *name) {
                Some((_, sum)) => *sum += value,
                None => self.terms.push((name.to_string(), *value)),
            }
        }
    }

    fn add_batch<B: Backend>(&mut self, objective: &Tensor<B, 1>, logits: &Tensor<B, 2>, targets: &[i64]) {
        self.loss_sum += objective.clone().into_scalar().elem::<f64>();
        self.n_batches += 1;

        let [batch, _] = logits.dims();
        let predictions = logits.clone().argmax(1).reshape([batch]).into_data();
        self.correct += predictions
            .iter::<i64>()
            .zip(targets)
            .filter(|(p, t)| p == *t)
            .count();
        self.seen += batch;
    }

    fn finish(self) -> EpochMetrics {
        let n = self.n_batches.max(1) as f64;
        EpochMetrics {
            average_loss: self.loss_sum / n,
            accuracy: self.correct as f64 / self.seen.max(1) as f64,
            terms: self
                .terms
                .into_iter()
                .map(|(name, sum)| (name, sum / n))
                .collect(),
        }
    }
}

/// Drives optimization and evaluation of a [`GlassModel`]
pub struct Trainer<B: AutodiffBackend> {
    config: TrainerConfig,
    loss: CompositeLoss,
    lr: f64,
    device: B::Device,
    rng: StdRng,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainerConfig, model_config: &GlassConfig, device: B::Device) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            loss: CompositeLoss::new(&model_config.loss),
            lr: model_config.lr,
            config,
            device,
            rng,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn checkpoint_path(&self) -> Option<PathBuf> {
        self.config
            .checkpoint_dir
            .as_ref()
            .map(|dir| PathBuf::from(dir).join("best_model.json"))
    }

    /// Scalar actually minimized for a classification batch
    fn objective<E: Backend>(&self, value: &LossValue<E>, output: &GlassOutput<E>) -> Tensor<E, 1> {
        match (self.loss.contract(), output.reconstruction_loss()) {
            (LossContract::Separate, Some(reconstruction)) => value.total() + reconstruction,
            _ => value.total(),
        }
    }

    fn batch_terms<E: Backend>(&self, value: &LossValue<E>, output: &GlassOutput<E>) -> Vec<(&'static str, f64)> {
        let mut terms = value.named_terms();
        if self.loss.contract() == LossContract::Separate {
            if let Some(reconstruction) = output.reconstruction_loss() {
                terms.push(("reconstruction_loss", reconstruction.into_scalar().elem::<f64>()));
            }
        }
        terms
    }

    fn load_split(&mut self, data: &mut impl BatchSource, split: &str) -> GlassResult<Vec<Batch>> {
        let batches = data.batches(split)?;
        if batches.is_empty() {
            return Err(config_error(
                "data",
                format!("split `{split}` has no batches"),
            ));
        }
        Ok(batches)
    }

    fn train_epoch<O: Optimizer<GlassModel<B>, B>>(
        &mut self,
        mut model: GlassModel<B>,
        optim: &mut O,
        mut batches: Vec<Batch>,
        lr: f64,
    ) -> GlassResult<(GlassModel<B>, EpochMetrics)> {
        let mut acc = EpochAccumulator::default();

        for batch in batches.iter_mut() {
            if self.config.permute_time {
                batch.permute_time(&mut self.rng);
            }
            let (inputs, targets) = batch.to_tensors::<B>(&self.device);

            let output = model.forward(inputs)?;
            let value = self.loss.forward(&output, targets)?;
            let objective = self.objective(&value, &output);

            acc.add_terms(&self.batch_terms(&value, &output));
            acc.add_batch(&objective, &output.logits, &batch.targets);

            let grads = objective.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }

        Ok((model, acc.finish()))
    }

    /// Evaluate without gradients on any backend
    fn eval_epoch<E: Backend>(
        &self,
        model: &GlassModel<E>,
        batches: &[Batch],
        device: &E::Device,
    ) -> GlassResult<EpochMetrics> {
        let mut acc = EpochAccumulator::default();

        for batch in batches {
            let (inputs, targets) = batch.to_tensors::<E>(device);
            let output = model.forward(inputs)?;
            let value = self.loss.forward(&output, targets)?;
            let objective = self.objective(&value, &output);

            acc.add_terms(&self.batch_terms(&value, &output));
            acc.add_batch(&objective, &output.logits, &batch.targets);
        }

        Ok(acc.finish())
    }

    /// Train with early stopping on the validation loss.
    ///
    /// The best validation state is kept (and written to the checkpoint
    /// directory, if configured) and restored before returning.
    pub fn fit(
        &mut self,
        mut model: GlassModel<B>,
        data: &mut impl BatchSource,
        sink: &mut impl MetricsSink,
    ) -> GlassResult<FitReport<B>> {
        let start = Instant::now();
        let n_classes = model.n_classes();
        let params = model.num_params();
        sink.log_summary("params", params as f64);
        info!(params, max_epochs = self.config.max_epochs, "Training model");

        let mut optim = AdamConfig::new().init::<B, GlassModel<B>>();
        let mut scheduler = PlateauScheduler::new(
            self.lr,
            self.config.scheduler_factor,
            self.config.scheduler_patience,
        );
        let mut early_stopping = EarlyStopping::new(self.config.patience, true);
        let checkpoint_path = self.checkpoint_path();

        let mut best: Option<StateDict> = None;
        let mut history = Vec::new();

        for epoch in 0..self.config.max_epochs {
            let train_batches = self.load_split(data, TRAIN_SPLIT)?;
            let (trained, train_metrics) =
                self.train_epoch(model, &mut optim, train_batches, scheduler.lr())?;
            model = trained;

            let valid_batches = self.load_split(data, VALID_SPLIT)?;
            let valid_metrics = self.eval_epoch(&model.valid(), &valid_batches, &self.device)?;

            log_epoch(TRAIN_SPLIT, epoch, n_classes, &train_metrics);
            log_epoch(VALID_SPLIT, epoch, n_classes, &valid_metrics);
            let mut named = train_metrics.named(TRAIN_SPLIT);
            named.extend(valid_metrics.named(VALID_SPLIT));
            sink.log_metrics(Some(epoch), &named);

            scheduler.step(valid_metrics.average_loss);

            let decision = early_stopping.step(valid_metrics.average_loss);
            if decision.improved {
                let dict = model.state_dict();
                if let Some(ref path) = checkpoint_path {
                    dict.save(path)?;
                }
                best = Some(dict);
            }

            history.push((train_metrics, valid_metrics));
            if decision.stop {
                info!(epoch, "EarlyStopping triggered");
                break;
            }
        }

        if let Some(ref dict) = best {
            info!("Loading best model");
            let (restored, _) = model.load_state_dict(dict, true)?;
            model = restored;
        }

        let training_time = start.elapsed().as_secs_f64();
        sink.log_summary("training_time", training_time);

        Ok(FitReport {
            model,
            history,
            best_valid_loss: early_stopping.best_score(),
            stopped_early: early_stopping.should_stop(),
            training_time,
        })
    }

    /// Evaluate every split other than train and valid
    pub fn test(
        &self,
        model: &GlassModel<B>,
        data: &mut impl BatchSource,
        sink: &mut impl MetricsSink,
    ) -> GlassResult<Vec<(String, f64)>> {
        let model = model.valid();
        let mut results = Vec::new();

        for split in data.splits() {
            if split == TRAIN_SPLIT || split == VALID_SPLIT {
                continue;
            }
            let batches = data.batches(&split)?;
            if batches.is_empty() {
                warn!(split = %split, "Skipping empty split");
                continue;
            }
            let metrics = self.eval_epoch(&model, &batches, &self.device)?;
            log_epoch(&split, 0, model.n_classes(), &metrics);
            results.extend(metrics.named(&split));
        }

        sink.log_metrics(None, &results);
        Ok(results)
    }

    /// Fit, restore the best state, test, and clean up the checkpoint file
    pub fn run(
        &mut self,
        model: GlassModel<B>,
        data: &mut impl BatchSource,
        sink: &mut impl MetricsSink,
    ) -> GlassResult<RunReport<B>> {
        let fit = self.fit(model, data, sink)?;
        info!("Testing trained model");
        let mut test_metrics = vec![("training_time".to_string(), fit.training_time)];
        test_metrics.extend(self.test(&fit.model, data, sink)?);

        if !self.config.preserve_checkpoints {
            if let Some(path) = self.checkpoint_path() {
                if path.exists() {
                    std::fs::remove_file(&path).with_path(&path)?;
                }
            }
        }

        Ok(RunReport {
            model: fit.model,
            test_metrics,
            training_time: fit.training_time,
        })
    }

    /// Self-supervised epochs on the reconstruction objective only
    pub fn pretrain(
        &mut self,
        mut model: GlassModel<B>,
        data: &mut impl BatchSource,
        sink: &mut impl MetricsSink,
        epochs: usize,
    ) -> GlassResult<GlassModel<B>> {
        let mut optim = AdamConfig::new().init::<B, GlassModel<B>>();

        for epoch in 0..epochs {
            let batches = self.load_split(data, TRAIN_SPLIT)?;
            let mut total = 0.0;
            let mut used = 0usize;

            for batch in batches {
                let (inputs, _) = batch.to_tensors::<B>(&self.device);
                let output = model.forward_pretraining(inputs)?;
                let Some(reconstruction) = output.reconstruction else {
                    warn!(epoch, "Skipping single-timestep batch during pretraining");
                    continue;
                };

                let loss = reconstruction.mse();
                total += loss.clone().into_scalar().elem::<f64>();
                used += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(self.lr, model, grads);
            }

            let average = total / used.max(1) as f64;
            info!(epoch, loss = average, batches = used, "Pretraining epoch completed");
            sink.log_metrics(
                Some(epoch),
                &[("pretrain_reconstruction_loss".to_string(), average)],
            );
        }

        Ok(model)
    }
}
