#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, Tensor};
    use dbn_glass::config::{Aggregation, GlassConfig, ModelVariant, StateAlignment};
    use dbn_glass::connectivity::Connectivity;
    use dbn_glass::error::GlassError;
    use dbn_glass::model::GlassModel;

    type Backend = NdArray<f32>;

    fn create_model(variant: ModelVariant, components: usize, classes: usize) -> GlassModel<Backend> {
        let device = Default::default();
        let config = GlassConfig::default_hps(variant, components, classes);
        GlassModel::new(&config, &device).unwrap()
    }

    fn random_input(batch: usize, seq_len: usize, components: usize) -> Tensor<Backend, 3> {
        let device = Default::default();
        Tensor::random(
            [batch, seq_len, components],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        )
    }

    #[test]
    fn test_output_shapes() {
        for variant in [ModelVariant::Fixed, ModelVariant::RecurrentMean] {
            for (batch, seq_len, components) in [(1, 1, 2), (1, 7, 3), (4, 5, 6), (3, 2, 4)] {
                let model = create_model(variant, components, 3);
                let out = model.forward(random_input(batch, seq_len, components)).unwrap();

                assert_eq!(out.logits.dims(), [batch, 3]);
                assert_eq!(out.mean_mixing.dims(), [batch, components, components]);
                assert_eq!(out.mixing.dims(), [batch, seq_len, components, components]);

                match out.reconstruction {
                    Some(rec) => {
                        assert!(seq_len >= 2);
                        assert_eq!(rec.predicted.dims(), [batch, seq_len - 1, components]);
                        assert_eq!(rec.target.dims(), [batch, seq_len - 1, components]);
                    }
                    None => assert_eq!(seq_len, 1),
                }
            }
        }
    }

    #[test]
    fn test_variant_settings() {
        let fixed = create_model(ModelVariant::Fixed, 4, 2);
        assert_eq!(fixed.alignment(), StateAlignment::PredictNext);
        assert_eq!(fixed.rnn.cell.attention.query.layers.len(), 3);

        let recurrent = create_model(ModelVariant::RecurrentMean, 4, 2);
        assert_eq!(recurrent.alignment(), StateAlignment::PostMix);
        assert_eq!(recurrent.rnn.cell.attention.query.layers.len(), 1);
    }

    #[test]
    fn test_temporal_attention_head() {
        let device = Default::default();
        let mut config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 5, 4);
        config.classifier.aggregation = Aggregation::TemporalAttention;
        let model = GlassModel::<Backend>::new(&config, &device).unwrap();
        assert_eq!(model.aggregation(), Aggregation::TemporalAttention);

        let out = model.forward(random_input(2, 6, 5)).unwrap();
        assert_eq!(out.logits.dims(), [2, 4]);
    }

    #[test]
    fn test_per_component_embeddings() {
        let device = Default::default();
        let mut config = GlassConfig::default_hps(ModelVariant::RecurrentMean, 3, 2);
        config.rnn.single_embed = false;
        let model = GlassModel::<Backend>::new(&config, &device).unwrap();
        assert_eq!(model.rnn.embeddings.per_component.len(), 3);

        let out = model.forward(random_input(2, 4, 3)).unwrap();
        assert_eq!(out.mixing.dims(), [2, 4, 3, 3]);
    }

    #[test]
    fn test_forward_is_deterministic() {
        let model = create_model(ModelVariant::RecurrentMean, 4, 2);
        let input = random_input(2, 6, 4);

        let first = model.forward(input.clone()).unwrap();
        let second = model.forward(input).unwrap();

        let logit_diff = (first.logits - second.logits).abs().max().into_scalar();
        let mixing_diff = (first.mixing - second.mixing).abs().max().into_scalar();
        assert_eq!(logit_diff, 0.0);
        assert_eq!(mixing_diff, 0.0);
    }

    #[test]
    fn test_gated_mixing_is_finite_and_bounded() {
        let model = create_model(ModelVariant::RecurrentMean, 4, 2);
        let out = model.forward(random_input(3, 5, 4)).unwrap();

        let values: Vec<f32> = out.mixing.into_data().to_vec().unwrap();
        // Normalized entries are at most 1 in magnitude and the gate is < 1
        assert!(values.iter().all(|v| v.is_finite() && v.abs() <= 1.0 + 1e-5));
    }

    #[test]
    fn test_nan_input_reports_timestep() {
        let device = Default::default();
        let model = create_model(ModelVariant::RecurrentMean, 3, 2);

        let mut values = vec![0.5f32; 2 * 5 * 3];
        // sample 0, time 2, component 1
        values[2 * 3 + 1] = f32::NAN;
        let input = Tensor::<Backend, 1>::from_floats(values.as_slice(), &device).reshape([2, 5, 3]);

        let err = model.forward(input).unwrap_err();
        assert_eq!(err, GlassError::NumericalInstability { timestep: 2 });
        assert_eq!(err.timestep(), Some(2));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_infinite_input_fails_at_first_step() {
        let device = Default::default();
        let model = create_model(ModelVariant::Fixed, 2, 2);

        let mut values = vec![0.1f32; 4 * 2];
        values[0] = f32::INFINITY;
        let input = Tensor::<Backend, 1>::from_floats(values.as_slice(), &device).reshape([1, 4, 2]);

        let err = model.forward(input).unwrap_err();
        assert_eq!(err.timestep(), Some(0));
    }

    #[test]
    fn test_wrong_component_count_is_rejected() {
        let model = create_model(ModelVariant::RecurrentMean, 4, 2);
        let err = model.forward(random_input(2, 3, 5)).unwrap_err();
        assert!(matches!(err, GlassError::Shape { .. }));
    }

    #[test]
    fn test_mean_mixing_connectivity() {
        let model = create_model(ModelVariant::RecurrentMean, 4, 2);
        let out = model.forward(random_input(2, 6, 4)).unwrap();

        let matrices = Connectivity::from_tensor(out.mean_mixing).unwrap();
        assert_eq!(matrices.len(), 2);
        for matrix in matrices {
            assert_eq!(matrix.n_components(), 4);
            let s = matrix.hoyer_sparsity();
            assert!((0.0..=1.0 + 1e-5).contains(&s));
            assert_eq!(matrix.strongest_edges(3).len(), 3);
        }
    }
}
