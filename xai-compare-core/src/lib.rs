//! # xai-compare-core: explainer factory and comparison orchestration
//!
//! Runs several model-explanation methods against one trained model and
//! lines their feature attributions up side by side.
//!
//! ## Pieces
//!
//! 1. **Model contract**: [`Model`] is all an explainer needs from a predictor.
//! 2. **Explainers**: SHAP, LIME, EBM, Mimic and permutation importance behind
//!    the [`Explainer`] trait.
//! 3. **Factory**: [`ExplainerFactory`] builds explainers by name around a
//!    model and its train/test splits.
//! 4. **Orchestration**: [`run_and_collect`] and friends run a selection of
//!    explainers best-effort and merge what succeeds.
//!
//! ```no_run
//! use std::sync::Arc;
//! use xai_compare_core::{ExplainerFactory, FeatureMatrix, LinearModel, Mode, run_and_collect};
//!
//! # fn main() -> xai_compare_core::Result<()> {
//! let x = FeatureMatrix::from_rows(vec!["a", "b"], &[vec![1.0, 2.0], vec![2.0, 0.5], vec![3.0, 1.0]])?;
//! let y = ndarray::array![1.0, 2.0, 3.0];
//! let model = LinearModel::fit(&x, &y, 1e-3)?;
//! let factory = ExplainerFactory::new(Arc::new(model), x.clone(), x, y.clone(), y, Mode::Regression)?;
//! let table = run_and_collect(&factory, factory.x_test(), ["shap", "permutation"]);
//! println!("{table}");
//! # Ok(())
//! # }
//! ```

// Foundation
pub mod config;
pub mod error;

// Data and models
pub mod data;
pub mod dataset;
pub mod linalg;
pub mod linear_model;
pub mod metrics;
pub mod model;
pub mod summarize;

// Explainers
pub mod explainers;
pub mod factory;
pub mod orchestrate;

// Re-exports
pub use config::{ConfigOverrides, ExplainerSettings, XaiConfig};
pub use data::{AttributionTable, FeatureMatrix, LocalAttributions};
pub use dataset::{Dataset, Split};
pub use error::{Result, XaiError};
pub use explainers::{Explainer, ExplainerKind};
pub use factory::ExplainerFactory;
pub use linear_model::LinearModel;
pub use model::{FnModel, Mode, Model, ModelCategory};
pub use orchestrate::{
    ComparisonReport, ExplainerOutcome, ExplainerSelection, OutcomeStatus, run_and_collect,
    run_and_collect_concurrent, run_and_report, run_and_report_concurrent,
};
