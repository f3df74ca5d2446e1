//! Property-based tests for explainers and table merging using proptest.

use ndarray::{Array1, Array2, Axis};
use proptest::prelude::*;
use std::sync::Arc;

use xai_compare_core::config::{PermutationSettings, ShapSettings};
use xai_compare_core::explainers::{PermutationExplainer, ShapExplainer};
use xai_compare_core::{AttributionTable, Explainer, FeatureMatrix, FnModel, Mode};

fn matrix(rows: usize, cols: usize, cells: Vec<f64>) -> FeatureMatrix {
    let names: Vec<String> = (0..cols).map(|j| format!("f{}", j)).collect();
    let values = Array2::from_shape_vec((rows, cols), cells).unwrap();
    FeatureMatrix::new(names, values).unwrap()
}

fn weighted_sum(weights: Vec<f64>) -> FnModel {
    FnModel::new("LinearRegression", move |x: &Array2<f64>| {
        x.dot(&Array1::from(weights.clone()))
    })
}

/// Rows x cols matrix of values, with its shape.
fn table_strategy() -> impl Strategy<Value = (usize, usize, Vec<f64>)> {
    (3usize..12, 1usize..5).prop_flat_map(|(rows, cols)| {
        (
            Just(rows),
            Just(cols),
            prop::collection::vec(-10.0f64..10.0, rows * cols),
        )
    })
}

// --- Permutation importance properties ---

proptest! {
    #[test]
    fn permutation_importance_sums_to_one(
        (rows, cols, cells) in table_strategy(),
        seed in any::<u64>(),
    ) {
        let x = Arc::new(matrix(rows, cols, cells));
        let weights: Vec<f64> = (0..cols).map(|j| 1.0 + j as f64).collect();
        let settings = PermutationSettings { num_permutations: 3, random_state: Some(seed) };
        let explainer = PermutationExplainer::new(
            Arc::new(weighted_sum(weights)),
            Arc::clone(&x),
            Mode::Regression,
            &settings,
        );

        // A total of zero (every shuffle a no-op) is reported as a failure.
        if let Ok(table) = explainer.explain_global(&x) {
            let sum: f64 = table.values().iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
            prop_assert_eq!(table.features(), x.names());
        }
    }

    #[test]
    fn permutation_importance_repeats_with_seed(
        (rows, cols, cells) in table_strategy(),
        seed in any::<u64>(),
    ) {
        let x = Arc::new(matrix(rows, cols, cells));
        let settings = PermutationSettings { num_permutations: 2, random_state: Some(seed) };
        let run = || {
            PermutationExplainer::new(
                Arc::new(weighted_sum(vec![1.0; cols])),
                Arc::clone(&x),
                Mode::Regression,
                &settings,
            )
            .explain_global(&x)
            .ok()
        };
        prop_assert_eq!(run(), run());
    }
}

// --- SHAP properties ---

proptest! {
    #[test]
    fn shap_global_is_mean_of_local(
        (rows, cols, cells) in table_strategy(),
        weights in prop::collection::vec(-3.0f64..3.0, 4),
    ) {
        let x = matrix(rows, cols, cells);
        let model = weighted_sum(weights[..cols].to_vec());
        let shap = ShapExplainer::new(Arc::new(model), Mode::Regression, &ShapSettings::default());

        let local = shap.explain_local(&x).unwrap();
        let global = shap.explain_global(&x).unwrap();
        let mean = local.values().mean_axis(Axis(0)).unwrap();

        prop_assert_eq!(global.features(), x.names());
        for (g, m) in global.values().column(0).iter().zip(mean.iter()) {
            prop_assert!((g - m).abs() < 1e-9);
        }
    }

    #[test]
    fn linear_shap_rows_sum_to_centered_prediction(
        (rows, cols, cells) in table_strategy(),
        weights in prop::collection::vec(-3.0f64..3.0, 4),
    ) {
        let x = matrix(rows, cols, cells);
        let w = Array1::from(weights[..cols].to_vec());
        let shap = ShapExplainer::new(
            Arc::new(weighted_sum(w.to_vec())),
            Mode::Regression,
            &ShapSettings::default(),
        );
        let local = shap.explain_local(&x).unwrap();
        let predictions = x.values().dot(&w);
        let mean_prediction = predictions.mean().unwrap();
        for (row, p) in local.values().rows().into_iter().zip(predictions.iter()) {
            prop_assert!((row.sum() - (p - mean_prediction)).abs() < 1e-6);
        }
    }
}

// --- Merge properties ---

proptest! {
    #[test]
    fn merge_aligns_any_feature_order(
        values in prop::collection::vec(-5.0f64..5.0, 1..8),
        rotation in 0usize..8,
    ) {
        let names: Vec<String> = (0..values.len()).map(|j| format!("f{}", j)).collect();
        let shift = rotation % values.len();
        let mut rotated_names = names.clone();
        rotated_names.rotate_left(shift);
        let mut rotated_values = values.clone();
        rotated_values.rotate_left(shift);

        let straight = AttributionTable::single("v", names.clone(), Array1::from(values)).unwrap();
        let rotated =
            AttributionTable::single("v", rotated_names, Array1::from(rotated_values)).unwrap();
        let merged = AttributionTable::merge_aligned(
            &names,
            &[("a".to_string(), straight), ("b".to_string(), rotated)],
        );

        prop_assert_eq!(merged.features(), names.as_slice());
        for feature in &names {
            prop_assert_eq!(merged.get(feature, "a"), merged.get(feature, "b"));
        }
    }
}
