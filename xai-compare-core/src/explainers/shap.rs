//! SHAP adapter: picks a Shapley strategy for the model and shapes its output.

use crate::config::ShapSettings;
use crate::data::{AttributionTable, FeatureMatrix, LocalAttributions};
use crate::error::{Result, XaiError};
use crate::explainers::engine::{
    ExactShapEngine, LinearShapEngine, SamplingShapEngine, ShapEngine,
};
use crate::explainers::{Explainer, ExplainerKind};
use crate::model::{Mode, Model, ModelCategory, model_outputs};
use crate::summarize;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Column name of the global SHAP table.
pub const SHAP_COLUMN: &str = "SHAP Value";

/// Attribution strategy, fixed per model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapStrategy {
    Tree,
    Linear,
    Kernel,
}

impl ShapStrategy {
    pub fn for_category(category: ModelCategory) -> Self {
        match category {
            ModelCategory::TreeEnsemble => ShapStrategy::Tree,
            ModelCategory::Linear => ShapStrategy::Linear,
            ModelCategory::Other => ShapStrategy::Kernel,
        }
    }

    /// Built-in engine for this strategy.
    pub fn default_engine(&self, settings: &ShapSettings) -> Arc<dyn ShapEngine> {
        match self {
            ShapStrategy::Tree => Arc::new(ExactShapEngine::new(settings.max_exact_features)),
            ShapStrategy::Linear => Arc::new(LinearShapEngine),
            ShapStrategy::Kernel => {
                Arc::new(SamplingShapEngine::new(settings.kernel_samples, settings.seed))
            }
        }
    }

    /// Linear attributions use the raw data as background; the others use
    /// a k-means summary to keep evaluation counts down.
    pub fn summarizes_background(&self) -> bool {
        !matches!(self, ShapStrategy::Linear)
    }
}

/// What to report for a model with exactly two class outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryClassPolicy {
    /// Attributions of the first (negative) class only.
    #[default]
    NegativeClass,
    /// Mean absolute attribution over both classes, as for multiclass.
    MeanAbsolute,
}

pub struct ShapExplainer {
    model: Arc<dyn Model>,
    mode: Mode,
    strategy: ShapStrategy,
    engine: Arc<dyn ShapEngine>,
    background_clusters: usize,
    binary_class_policy: BinaryClassPolicy,
    seed: u64,
    training: Option<Arc<FeatureMatrix>>,
}

impl ShapExplainer {
    /// The strategy is resolved here, once, from the model's category.
    pub fn new(model: Arc<dyn Model>, mode: Mode, settings: &ShapSettings) -> Self {
        let strategy = ShapStrategy::for_category(model.category());
        Self {
            engine: strategy.default_engine(settings),
            model,
            mode,
            strategy,
            background_clusters: settings.background_clusters,
            binary_class_policy: settings.binary_class_policy,
            seed: settings.seed,
            training: None,
        }
    }

    /// Only explain data whose features match `x_train`.
    pub fn with_training_data(mut self, x_train: Arc<FeatureMatrix>) -> Self {
        self.training = Some(x_train);
        self
    }

    /// Replace the built-in engine for the resolved strategy.
    pub fn with_engine(mut self, engine: Arc<dyn ShapEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn strategy(&self) -> ShapStrategy {
        self.strategy
    }

    fn background(&self, data: &FeatureMatrix) -> Array2<f64> {
        if self.strategy.summarizes_background() {
            summarize::kmeans(data.values(), self.background_clusters, self.seed)
        } else {
            data.values().clone()
        }
    }
}

impl Explainer for ShapExplainer {
    fn kind(&self) -> ExplainerKind {
        ExplainerKind::Shap
    }

    fn explain_global(&self, data: &FeatureMatrix) -> Result<AttributionTable> {
        self.explain_local(data)?.mean_by_feature(SHAP_COLUMN)
    }

    fn explain_local(&self, data: &FeatureMatrix) -> Result<LocalAttributions> {
        if let Some(x_train) = &self.training {
            x_train.ensure_schema(data)?;
        }
        let background = self.background(data);
        debug!(
            strategy = ?self.strategy,
            engine = self.engine.name(),
            model = self.model.type_name(),
            background_rows = background.nrows(),
            rows = data.n_rows(),
            "computing SHAP values"
        );

        let outputs = |x: &Array2<f64>| -> Result<Array2<f64>> {
            let batch = data.with_values(x.clone())?;
            model_outputs(self.model.as_ref(), self.mode, &batch)
        };
        let tables = self
            .engine
            .shap_values(&outputs, &background, data.values())?;
        let values = collapse_outputs(tables, self.binary_class_policy)?;
        LocalAttributions::new(data.names().to_vec(), values)
    }
}

/// Reduce per-output attribution tables to one rows x features table.
///
/// One table is used as is. Two tables (binary classification) follow the
/// policy. More tables are averaged as absolute values across classes.
fn collapse_outputs(
    mut tables: Vec<Array2<f64>>,
    policy: BinaryClassPolicy,
) -> Result<Array2<f64>> {
    match tables.len() {
        0 => Err(XaiError::explanation(
            ExplainerKind::Shap.as_str(),
            "engine returned no attribution tables",
        )),
        1 => Ok(tables.remove(0)),
        2 if policy == BinaryClassPolicy::NegativeClass => Ok(tables.remove(0)),
        n => {
            let mut total = Array2::<f64>::zeros(tables[0].dim());
            for table in &tables {
                if table.dim() != total.dim() {
                    return Err(XaiError::explanation(
                        ExplainerKind::Shap.as_str(),
                        "per-class attribution tables differ in shape",
                    ));
                }
                total += &table.mapv(f64::abs);
            }
            Ok(total / n as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FnModel;
    use ndarray::{Axis, array};

    fn data() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec!["x0", "x1", "x2"],
            &[
                vec![1.0, 2.0, 0.5],
                vec![-1.0, 0.0, 1.5],
                vec![2.0, -2.0, 0.0],
                vec![0.5, 1.0, -1.0],
                vec![3.0, 0.5, 2.0],
                vec![-2.0, 1.5, 0.5],
                vec![0.0, -1.0, 1.0],
            ],
        )
        .unwrap()
    }

    fn linear_fn(x: &Array2<f64>) -> ndarray::Array1<f64> {
        x.column(0).mapv(|v| 3.0 * v) - x.column(1).mapv(|v| 2.0 * v) + x.column(2).mapv(|v| 0.5 * v)
    }

    #[test]
    fn test_strategy_resolved_from_category() {
        let settings = ShapSettings::default();
        let tree: Arc<dyn Model> = Arc::new(FnModel::new("RandomForestRegressor", linear_fn));
        let linear: Arc<dyn Model> = Arc::new(FnModel::new("LinearRegression", linear_fn));
        let ambiguous: Arc<dyn Model> = Arc::new(FnModel::new("LinearForestRegressor", linear_fn));
        let svc: Arc<dyn Model> = Arc::new(FnModel::new("SVR", linear_fn));

        assert_eq!(
            ShapExplainer::new(tree, Mode::Regression, &settings).strategy(),
            ShapStrategy::Tree
        );
        assert_eq!(
            ShapExplainer::new(linear, Mode::Regression, &settings).strategy(),
            ShapStrategy::Linear
        );
        assert_eq!(
            ShapExplainer::new(ambiguous, Mode::Regression, &settings).strategy(),
            ShapStrategy::Kernel
        );
        assert_eq!(
            ShapExplainer::new(svc, Mode::Regression, &settings).strategy(),
            ShapStrategy::Kernel
        );
    }

    #[test]
    fn test_global_is_mean_of_local() {
        let data = data();
        for name in ["LinearRegression", "GradientTreeBoosting", "KNeighborsRegressor"] {
            let model: Arc<dyn Model> = Arc::new(FnModel::new(name, linear_fn));
            let shap = ShapExplainer::new(model, Mode::Regression, &ShapSettings::default());
            let local = shap.explain_local(&data).unwrap();
            let global = shap.explain_global(&data).unwrap();

            assert_eq!(global.features(), data.names());
            assert_eq!(global.columns(), &[SHAP_COLUMN.to_string()]);
            let mean = local.values().mean_axis(Axis(0)).unwrap();
            for (g, m) in global.column(SHAP_COLUMN).unwrap().iter().zip(mean.iter()) {
                assert!((g - m).abs() < 1e-9, "{}: {} vs {}", name, g, m);
            }
        }
    }

    #[test]
    fn test_linear_attributions_are_centered_contributions() {
        let data = data();
        let model: Arc<dyn Model> = Arc::new(FnModel::new("LinearRegression", linear_fn));
        let shap = ShapExplainer::new(model, Mode::Regression, &ShapSettings::default());
        let local = shap.explain_local(&data).unwrap();
        let mean = data.values().mean_axis(Axis(0)).unwrap();
        let coef = [3.0, -2.0, 0.5];
        for i in 0..data.n_rows() {
            for j in 0..3 {
                let expected = coef[j] * (data.values()[[i, j]] - mean[j]);
                assert!((local.values()[[i, j]] - expected).abs() < 1e-9);
            }
        }
    }

    fn classifier(classes: usize) -> Arc<dyn Model> {
        Arc::new(
            FnModel::new("Classifier", |x: &Array2<f64>| x.column(0).mapv(|v| f64::from(v > 0.0)))
                .with_category(ModelCategory::Linear)
                .with_proba(move |x: &Array2<f64>| {
                    Array2::from_shape_fn((x.nrows(), classes), |(i, c)| {
                        // Class c depends on feature c only, with sign alternating.
                        let sign = if c % 2 == 0 { 1.0 } else { -1.0 };
                        sign * x[[i, c % x.ncols()]] * 0.1
                    })
                }),
        )
    }

    #[test]
    fn test_binary_uses_negative_class() {
        let data = data();
        let shap = ShapExplainer::new(classifier(2), Mode::Classification, &ShapSettings::default());
        let local = shap.explain_local(&data).unwrap();
        let mean = data.values().mean_axis(Axis(0)).unwrap();
        // Class 0 depends only on x0 with coefficient 0.1.
        for i in 0..data.n_rows() {
            let expected = 0.1 * (data.values()[[i, 0]] - mean[0]);
            assert!((local.values()[[i, 0]] - expected).abs() < 1e-9);
            assert!(local.values()[[i, 1]].abs() < 1e-12);
        }
    }

    #[test]
    fn test_binary_mean_absolute_policy() {
        let data = data();
        let settings = ShapSettings {
            binary_class_policy: BinaryClassPolicy::MeanAbsolute,
            ..ShapSettings::default()
        };
        let shap = ShapExplainer::new(classifier(2), Mode::Classification, &settings);
        let local = shap.explain_local(&data).unwrap();
        let mean = data.values().mean_axis(Axis(0)).unwrap();
        for i in 0..data.n_rows() {
            let x0 = 0.1 * (data.values()[[i, 0]] - mean[0]).abs() / 2.0;
            let x1 = 0.1 * (data.values()[[i, 1]] - mean[1]).abs() / 2.0;
            assert!((local.values()[[i, 0]] - x0).abs() < 1e-9);
            assert!((local.values()[[i, 1]] - x1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_multiclass_averages_absolute_values() {
        let data = data();
        let shap = ShapExplainer::new(classifier(3), Mode::Classification, &ShapSettings::default());
        let local = shap.explain_local(&data).unwrap();
        assert!(local.values().iter().all(|v| *v >= 0.0));
        let mean = data.values().mean_axis(Axis(0)).unwrap();
        // Three classes on features 0, 1, 2; each feature is used by one class.
        for i in 0..data.n_rows() {
            for j in 0..3 {
                let expected = 0.1 * (data.values()[[i, j]] - mean[j]).abs() / 3.0;
                assert!((local.values()[[i, j]] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_reordered_features_rejected_with_training_data() {
        let data = data();
        let reordered = FeatureMatrix::from_columns(vec![
            ("x1", data.column("x1").unwrap().to_vec()),
            ("x0", data.column("x0").unwrap().to_vec()),
            ("x2", data.column("x2").unwrap().to_vec()),
        ])
        .unwrap();
        let model: Arc<dyn Model> = Arc::new(FnModel::new("LinearRegression", linear_fn));
        let shap = ShapExplainer::new(model, Mode::Regression, &ShapSettings::default())
            .with_training_data(Arc::new(data.clone()));

        assert!(shap.explain_global(&data).is_ok());
        let err = shap.explain_global(&reordered).unwrap_err();
        assert!(matches!(err, XaiError::InvalidInput(_)));
    }

    #[test]
    fn test_collapse_rejects_empty() {
        assert!(collapse_outputs(Vec::new(), BinaryClassPolicy::NegativeClass).is_err());
        let single = collapse_outputs(vec![array![[1.0, -2.0]]], BinaryClassPolicy::MeanAbsolute);
        assert_eq!(single.unwrap(), array![[1.0, -2.0]]);
    }

    #[test]
    fn test_custom_engine_is_used() {
        struct Zero;
        impl ShapEngine for Zero {
            fn name(&self) -> &'static str {
                "zero"
            }
            fn shap_values(
                &self,
                _outputs: &crate::explainers::engine::OutputFn<'_>,
                _background: &Array2<f64>,
                data: &Array2<f64>,
            ) -> Result<Vec<Array2<f64>>> {
                Ok(vec![Array2::zeros(data.dim())])
            }
        }

        let model: Arc<dyn Model> = Arc::new(FnModel::new("SVR", linear_fn));
        let shap = ShapExplainer::new(model, Mode::Regression, &ShapSettings::default())
            .with_engine(Arc::new(Zero));
        let global = shap.explain_global(&data()).unwrap();
        assert!(global.values().iter().all(|v| *v == 0.0));
    }
}
