//! Mimic: a global linear surrogate trained to reproduce the model.

use crate::config::MimicSettings;
use crate::data::{AttributionTable, FeatureMatrix, LocalAttributions};
use crate::error::{Result, XaiError};
use crate::explainers::{Explainer, ExplainerKind};
use crate::linalg::r_squared;
use crate::linear_model::LinearModel;
use crate::model::{Mode, Model, explained_output};
use ndarray::Axis;
use std::sync::Arc;
use tracing::debug;

pub const MIMIC_COLUMN: &str = "Mimic Importance";

pub struct MimicExplainer {
    model: Arc<dyn Model>,
    x_train: Arc<FeatureMatrix>,
    mode: Mode,
    alpha: f64,
}

impl MimicExplainer {
    pub fn new(
        model: Arc<dyn Model>,
        x_train: Arc<FeatureMatrix>,
        mode: Mode,
        settings: &MimicSettings,
    ) -> Self {
        Self {
            model,
            x_train,
            mode,
            alpha: settings.alpha,
        }
    }

    /// Fit the surrogate to the model's own outputs on the training rows.
    fn surrogate(&self) -> Result<LinearModel> {
        let target = explained_output(self.model.as_ref(), self.mode, &self.x_train)?;
        let surrogate = LinearModel::fit(&self.x_train, &target, self.alpha)
            .map_err(|e| XaiError::explanation(self.kind().as_str(), e.to_string()))?;
        let fidelity = r_squared(&target, &surrogate.predict(&self.x_train)?);
        debug!(
            model = self.model.type_name(),
            r_squared = fidelity,
            "surrogate fitted"
        );
        Ok(surrogate)
    }
}

impl Explainer for MimicExplainer {
    fn kind(&self) -> ExplainerKind {
        ExplainerKind::Mimic
    }

    fn explain_global(&self, data: &FeatureMatrix) -> Result<AttributionTable> {
        self.explain_local(data)?.mean_abs_by_feature(MIMIC_COLUMN)
    }

    fn explain_local(&self, data: &FeatureMatrix) -> Result<LocalAttributions> {
        self.x_train.ensure_schema(data)?;
        let surrogate = self.surrogate()?;
        let mean = data
            .values()
            .mean_axis(Axis(0))
            .ok_or_else(|| XaiError::explanation(self.kind().as_str(), "no rows to explain"))?;
        let centered = data.values() - &mean.insert_axis(Axis(0));
        let values = centered * &surrogate.coefficients().view().insert_axis(Axis(0));
        LocalAttributions::new(data.names().to_vec(), values)
    }
}
