#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, Tensor};
    use dbn_glass::activation::TanhPlacement;
    use dbn_glass::attention::{Gate, TransferAttention};
    use dbn_glass::config::{AttentionConfig, ProjectionKind};

    type Backend = NdArray<f32>;

    fn attention_config(use_tan: TanhPlacement, track_grads: bool) -> AttentionConfig {
        AttentionConfig {
            hidden_dim: 8,
            projection: ProjectionKind::Linear,
            track_grads,
            use_tan,
            use_gate: true,
            norm_epsilon: 1e-6,
            strict_norm: false,
        }
    }

    fn max_abs_diff(a: Tensor<Backend, 3>, b: Tensor<Backend, 3>) -> f32 {
        (a - b).abs().max().into_scalar()
    }

    #[test]
    fn test_normalization_is_scale_invariant() {
        let device = Default::default();
        let attention = TransferAttention::<Backend>::new(
            4,
            5,
            &attention_config(TanhPlacement::None, true),
            &device,
        );
        let raw = Tensor::<Backend, 3>::random([3, 5, 5], Distribution::Uniform(-2.0, 2.0), &device);

        let (base, _) = attention.normalize(raw.clone());
        for k in [0.01f32, 3.0, 250.0] {
            let (scaled, _) = attention.normalize(raw.clone().mul_scalar(k));
            assert!(max_abs_diff(base.clone(), scaled) < 1e-4, "scale {}", k);
        }
    }

    #[test]
    fn test_detached_norm_gives_same_forward() {
        let device = Default::default();
        let tracked = TransferAttention::<Backend>::new(
            4,
            3,
            &attention_config(TanhPlacement::None, true),
            &device,
        );
        let raw = Tensor::<Backend, 3>::random([2, 3, 3], Distribution::Uniform(-1.0, 1.0), &device);

        let detached = TransferAttention::<Backend>::new(
            4,
            3,
            &attention_config(TanhPlacement::None, false),
            &device,
        );
        assert!(!detached.tracks_norm_grads());

        let (a, norms_a) = tracked.normalize(raw.clone());
        let (b, norms_b) = detached.normalize(raw);
        assert!(max_abs_diff(a, b) < 1e-6);
        let norm_diff = (norms_a - norms_b).abs().max().into_scalar();
        assert!(norm_diff < 1e-6);
    }

    #[test]
    fn test_tanh_after_bounds_entries() {
        let device = Default::default();
        let attention = TransferAttention::<Backend>::new(
            4,
            3,
            &attention_config(TanhPlacement::After, true),
            &device,
        );
        assert_eq!(attention.tanh_placement(), TanhPlacement::After);

        let raw = Tensor::<Backend, 3>::random([2, 3, 3], Distribution::Uniform(-5.0, 5.0), &device);
        let (normalized, _) = attention.normalize(raw);
        let values: Vec<f32> = normalized.into_data().to_vec().unwrap();
        // Entries of a unit-norm matrix are at most 1, tanh(1) < 0.77
        assert!(values.iter().all(|v| v.abs() < 0.77));
    }

    #[test]
    fn test_gate_values_in_open_interval() {
        let device = Default::default();
        let gate = Gate::<Backend>::new(6, &device);

        for scale in [0.0f64, 1.0, 5.0] {
            let x = Tensor::<Backend, 3>::random(
                [4, 6, 6],
                Distribution::Uniform(-scale - 1e-3, scale + 1e-3),
                &device,
            );
            let values: Vec<f32> = gate.forward(x).unwrap().into_data().to_vec().unwrap();
            assert!(values.iter().all(|v| *v > 0.0 && *v < 1.0));
        }
    }

    #[test]
    fn test_ungated_attention_has_no_gate_parameters() {
        let device = Default::default();
        let mut config = attention_config(TanhPlacement::Before, true);
        config.use_gate = false;
        let attention = TransferAttention::<Backend>::new(4, 3, &config, &device);

        assert!(!attention.is_gated());
        let states = Tensor::<Backend, 3>::random([2, 3, 4], Distribution::Default, &device);
        let out = attention.forward(states).unwrap();
        assert_eq!(out.transfer.dims(), [2, 3, 3]);
    }
}
