//! Explainable boosting machine: an additive model of binned per-feature
//! shape functions, fit by cyclic gradient boosting.
//!
//! The EBM explains itself. It is trained on the training split and its
//! term contributions are the attributions; the black-box model is not
//! consulted.

use crate::config::EbmSettings;
use crate::data::{AttributionTable, FeatureMatrix, LocalAttributions};
use crate::error::{Result, XaiError};
use crate::explainers::{Explainer, ExplainerKind};
use crate::metrics::mean_squared_error;
use ndarray::{Array1, Array2, ArrayView1};
use std::sync::Arc;
use tracing::debug;

pub const EBM_COLUMN: &str = "EBM Importance";

/// Piecewise-constant function of one feature.
#[derive(Debug, Clone)]
struct ShapeFunction {
    /// Sorted, deduplicated cut points.
    edges: Vec<f64>,
    /// One score per bin; `edges.len() + 1` entries.
    scores: Vec<f64>,
}

impl ShapeFunction {
    fn from_quantiles(column: ArrayView1<'_, f64>, max_bins: usize) -> Self {
        let mut sorted: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        let mut edges: Vec<f64> = Vec::new();
        if !sorted.is_empty() {
            for k in 1..max_bins {
                let idx = (k * sorted.len()) / max_bins;
                let edge = sorted[idx.min(sorted.len() - 1)];
                if edge > sorted[0] && edges.last().is_none_or(|&last| edge > last) {
                    edges.push(edge);
                }
            }
        }
        let scores = vec![0.0; edges.len() + 1];
        Self { edges, scores }
    }

    fn bin(&self, value: f64) -> usize {
        self.edges.partition_point(|&edge| edge <= value)
    }

    fn n_bins(&self) -> usize {
        self.scores.len()
    }
}

/// Fitted additive model.
#[derive(Debug, Clone)]
struct GlassBox {
    intercept: f64,
    terms: Vec<ShapeFunction>,
}

impl GlassBox {
    fn fit(x: &Array2<f64>, y: &Array1<f64>, settings: &EbmSettings) -> Result<Self> {
        let (n, m) = x.dim();
        let intercept = y
            .mean()
            .ok_or_else(|| XaiError::invalid_input("cannot train on zero rows"))?;
        let mut terms: Vec<ShapeFunction> = (0..m)
            .map(|j| ShapeFunction::from_quantiles(x.column(j), settings.max_bins.max(1)))
            .collect();
        let bins: Vec<Vec<usize>> = terms
            .iter()
            .enumerate()
            .map(|(j, term)| x.column(j).iter().map(|&v| term.bin(v)).collect())
            .collect();

        let mut residual = y - intercept;
        for _ in 0..settings.rounds {
            for (term, rows) in terms.iter_mut().zip(&bins) {
                let mut sums = vec![0.0; term.n_bins()];
                let mut counts = vec![0usize; term.n_bins()];
                for (i, &b) in rows.iter().enumerate() {
                    sums[b] += residual[i];
                    counts[b] += 1;
                }
                let steps: Vec<f64> = sums
                    .iter()
                    .zip(&counts)
                    .map(|(s, &c)| {
                        if c == 0 {
                            0.0
                        } else {
                            settings.learning_rate * s / c as f64
                        }
                    })
                    .collect();
                for (score, step) in term.scores.iter_mut().zip(&steps) {
                    *score += step;
                }
                for (i, &b) in rows.iter().enumerate() {
                    residual[i] -= steps[b];
                }
            }
        }

        // Center each term on the training data so contributions read as
        // offsets from the average prediction.
        let mut model = Self { intercept, terms };
        for (term, rows) in model.terms.iter_mut().zip(&bins) {
            let mean = rows.iter().map(|&b| term.scores[b]).sum::<f64>() / n as f64;
            for score in &mut term.scores {
                *score -= mean;
            }
            model.intercept += mean;
        }
        Ok(model)
    }

    fn contributions(&self, x: &Array2<f64>) -> Array2<f64> {
        Array2::from_shape_fn(x.dim(), |(i, j)| {
            let term = &self.terms[j];
            term.scores[term.bin(x[[i, j]])]
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        self.contributions(x).sum_axis(ndarray::Axis(1)) + self.intercept
    }
}

pub struct EbmExplainer {
    x_train: Arc<FeatureMatrix>,
    y_train: Arc<Array1<f64>>,
    settings: EbmSettings,
}

impl EbmExplainer {
    pub fn new(
        x_train: Arc<FeatureMatrix>,
        y_train: Arc<Array1<f64>>,
        settings: &EbmSettings,
    ) -> Self {
        Self {
            x_train,
            y_train,
            settings: settings.clone(),
        }
    }

    fn train(&self) -> Result<GlassBox> {
        if self.x_train.n_rows() != self.y_train.len() {
            return Err(XaiError::invalid_input(format!(
                "{} training rows but {} targets",
                self.x_train.n_rows(),
                self.y_train.len()
            )));
        }
        let model = GlassBox::fit(self.x_train.values(), &self.y_train, &self.settings)?;
        debug!(
            rounds = self.settings.rounds,
            train_mse = mean_squared_error(&self.y_train, &model.predict(self.x_train.values())),
            "glass-box model trained"
        );
        Ok(model)
    }
}

impl Explainer for EbmExplainer {
    fn kind(&self) -> ExplainerKind {
        ExplainerKind::Ebm
    }

    fn explain_global(&self, data: &FeatureMatrix) -> Result<AttributionTable> {
        self.explain_local(data)?.mean_abs_by_feature(EBM_COLUMN)
    }

    fn explain_local(&self, data: &FeatureMatrix) -> Result<LocalAttributions> {
        self.x_train.ensure_schema(data)?;
        let model = self.train()?;
        LocalAttributions::new(data.names().to_vec(), model.contributions(data.values()))
    }
}
