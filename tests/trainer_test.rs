#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use dbn_glass::config::{GlassConfig, ModelVariant};
    use dbn_glass::model::GlassModel;
    use dbn_glass::train::{Batch, InMemorySource, RecordingSink, Trainer, TrainerConfig};
    use ndarray::Array3;
    use tempfile::tempdir;

    type Backend = Autodiff<NdArray<f32>>;

    /// Class 0: slow drift, class 1: alternating sign
    fn synthetic_batch(batch: usize, seq_len: usize, components: usize) -> Batch {
        let targets: Vec<i64> = (0..batch).map(|b| (b % 2) as i64).collect();
        let inputs = Array3::from_shape_fn((batch, seq_len, components), |(b, t, c)| {
            let phase = (c as f32 + 1.0) * 0.1;
            if b % 2 == 0 {
                phase + 0.05 * t as f32
            } else if t % 2 == 0 {
                phase
            } else {
                -phase
            }
        });
        Batch::new(inputs, targets).unwrap()
    }

    fn source() -> InMemorySource {
        InMemorySource::new()
            .with_split("train", vec![synthetic_batch(4, 6, 3), synthetic_batch(4, 6, 3)])
            .with_split("valid", vec![synthetic_batch(4, 6, 3)])
            .with_split("test", vec![synthetic_batch(2, 6, 3)])
    }

    #[test]
    fn test_fit_logs_every_epoch() {
        let device = Default::default();
        let config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 3, 2).with_lr(1e-3);
        let model = GlassModel::<Backend>::new(&config, &device).unwrap();

        let trainer_config = TrainerConfig::new().with_max_epochs(3).with_patience(5);
        let mut trainer = Trainer::<Backend>::new(trainer_config, &config, device);
        let mut data = source();
        let mut sink = RecordingSink::default();

        let report = trainer.fit(model, &mut data, &mut sink).unwrap();

        assert_eq!(report.history.len(), 3);
        assert!(!report.stopped_early);
        assert!(report.best_valid_loss.unwrap().is_finite());
        assert_eq!(sink.series("train_accuracy").len(), 3);
        assert_eq!(sink.series("valid_average_loss").len(), 3);
        assert_eq!(sink.series("train_ce_loss").len(), 3);
        assert_eq!(sink.series("train_reconstruction_loss").len(), 3);
        assert!(sink.summary.iter().any(|(key, _)| key == "params"));

        for accuracy in sink.series("valid_accuracy") {
            assert!((0.0..=1.0).contains(&accuracy));
        }
    }

    #[test]
    fn test_early_stopping_with_zero_patience() {
        let device = Default::default();
        // A zero learning rate freezes the model, so the validation loss
        // repeats exactly and the second epoch is the first non-improving one
        let config = GlassConfig::default_hps(ModelVariant::Fixed, 3, 2).with_lr(0.0);
        let model = GlassModel::<Backend>::new(&config, &device).unwrap();

        let trainer_config = TrainerConfig::new().with_max_epochs(50).with_patience(0);
        let mut trainer = Trainer::<Backend>::new(trainer_config, &config, device);
        let report = trainer
            .fit(model, &mut source(), &mut RecordingSink::default())
            .unwrap();

        assert!(report.stopped_early);
        assert_eq!(report.history.len(), 2);
    }

    #[test]
    fn test_run_tests_remaining_splits_and_cleans_up() {
        let device = Default::default();
        let dir = tempdir().unwrap();
        let config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 3, 2);
        let model = GlassModel::<Backend>::new(&config, &device).unwrap();

        let trainer_config = TrainerConfig::new()
            .with_max_epochs(2)
            .with_permute_time(true)
            .with_checkpoint_dir(Some(dir.path().display().to_string()));
        let mut trainer = Trainer::<Backend>::new(trainer_config, &config, device);
        let mut sink = RecordingSink::default();

        let report = trainer.run(model, &mut source(), &mut sink).unwrap();

        assert!(report.test_metrics.iter().any(|(name, _)| name == "test_accuracy"));
        assert!(report.test_metrics.iter().any(|(name, _)| name == "training_time"));
        assert!(!dir.path().join("best_model.json").exists());
        assert_eq!(report.model.n_classes(), 2);
    }

    #[test]
    fn test_pretraining_logs_reconstruction() {
        let device = Default::default();
        let config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 3, 2);
        let model = GlassModel::<Backend>::new(&config, &device).unwrap();

        let mut trainer = Trainer::<Backend>::new(TrainerConfig::new(), &config, device);
        let mut sink = RecordingSink::default();
        trainer.pretrain(model, &mut source(), &mut sink, 2).unwrap();

        let losses = sink.series("pretrain_reconstruction_loss");
        assert_eq!(losses.len(), 2);
        assert!(losses.iter().all(|l| l.is_finite() && *l >= 0.0));
    }
}
