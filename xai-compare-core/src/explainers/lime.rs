//! LIME: a weighted linear surrogate fit around each explained row.

use crate::config::LimeSettings;
use crate::data::{AttributionTable, FeatureMatrix, LocalAttributions};
use crate::error::{Result, XaiError};
use crate::explainers::{Explainer, ExplainerKind};
use crate::linalg;
use crate::model::{Mode, Model, explained_output};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;
use tracing::debug;

pub const LIME_COLUMN: &str = "LIME Value";

pub struct LimeExplainer {
    model: Arc<dyn Model>,
    x_train: Arc<FeatureMatrix>,
    mode: Mode,
    num_samples: usize,
    kernel_width: Option<f64>,
    alpha: f64,
    random_state: Option<u64>,
}

impl LimeExplainer {
    pub fn new(
        model: Arc<dyn Model>,
        x_train: Arc<FeatureMatrix>,
        mode: Mode,
        settings: &LimeSettings,
    ) -> Self {
        Self {
            model,
            x_train,
            mode,
            num_samples: settings.num_samples,
            kernel_width: settings.kernel_width,
            alpha: settings.alpha,
            random_state: settings.random_state,
        }
    }

    fn kernel_width(&self, n_features: usize) -> f64 {
        self.kernel_width
            .unwrap_or_else(|| 0.75 * (n_features as f64).sqrt())
    }

    /// Per-feature perturbation scale; constant columns get unit scale.
    fn scale(&self) -> Array1<f64> {
        self.x_train
            .values()
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 })
    }

    /// Surrogate coefficients for one row, in units of one training std.
    fn explain_row(
        &self,
        data: &FeatureMatrix,
        row: ArrayView1<'_, f64>,
        scale: &Array1<f64>,
        width: f64,
        rng: &mut StdRng,
    ) -> Result<Array1<f64>> {
        let m = row.len();
        // The first sample is the row itself.
        let mut offsets = Array2::<f64>::zeros((self.num_samples, m));
        for mut sample in offsets.rows_mut().into_iter().skip(1) {
            sample.mapv_inplace(|_| StandardNormal.sample(rng));
        }
        let samples = &offsets * &scale.view().insert_axis(Axis(0)) + &row.insert_axis(Axis(0));
        let outputs = explained_output(self.model.as_ref(), self.mode, &data.with_values(samples)?)?;

        let weights: Array1<f64> = offsets
            .rows()
            .into_iter()
            .map(|z| {
                let d2 = z.dot(&z);
                (-d2 / (width * width)).exp().sqrt()
            })
            .collect();
        let fit = linalg::ridge(&offsets, &outputs, Some(&weights), self.alpha)
            .map_err(|e| XaiError::explanation(self.kind().as_str(), e.to_string()))?;
        Ok(fit.coefficients)
    }
}

impl Explainer for LimeExplainer {
    fn kind(&self) -> ExplainerKind {
        ExplainerKind::Lime
    }

    fn explain_global(&self, data: &FeatureMatrix) -> Result<AttributionTable> {
        self.explain_local(data)?.mean_by_feature(LIME_COLUMN)
    }

    fn explain_local(&self, data: &FeatureMatrix) -> Result<LocalAttributions> {
        self.x_train.ensure_schema(data)?;
        if self.num_samples < 2 {
            return Err(XaiError::explanation(
                self.kind().as_str(),
                "num_samples must be at least 2",
            ));
        }

        let scale = self.scale();
        let width = self.kernel_width(data.n_features());
        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!(
            rows = data.n_rows(),
            samples = self.num_samples,
            kernel_width = width,
            "fitting local surrogates"
        );

        let mut values = Array2::zeros((data.n_rows(), data.n_features()));
        for (i, row) in data.values().rows().into_iter().enumerate() {
            let coefficients = self.explain_row(data, row, &scale, width, &mut rng)?;
            values.row_mut(i).assign(&coefficients);
        }
        LocalAttributions::new(data.names().to_vec(), values)
    }
}
