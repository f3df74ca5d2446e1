//! Shapley-value engines behind the SHAP adapter.
//!
//! An engine sees the model only as a batch function from raw rows to output
//! columns, plus a background set standing in for "feature absent". It
//! returns one rows x features table per output column. Attributions are not
//! checked for additivity against the prediction delta.

use crate::error::{Result, XaiError};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Batch evaluation of every model output: rows x outputs.
pub type OutputFn<'a> = dyn Fn(&Array2<f64>) -> Result<Array2<f64>> + Sync + 'a;

pub trait ShapEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn shap_values(
        &self,
        outputs: &OutputFn<'_>,
        background: &Array2<f64>,
        data: &Array2<f64>,
    ) -> Result<Vec<Array2<f64>>>;
}

/// Attributions for models that are linear in their inputs.
///
/// Each feature is moved from the background mean to the row's value on its
/// own; the change in output is that feature's attribution. Exact when the
/// model is linear.
#[derive(Debug, Clone, Default)]
pub struct LinearShapEngine;

impl ShapEngine for LinearShapEngine {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn shap_values(
        &self,
        outputs: &OutputFn<'_>,
        background: &Array2<f64>,
        data: &Array2<f64>,
    ) -> Result<Vec<Array2<f64>>> {
        let (n, m) = data.dim();
        let mean = background
            .mean_axis(Axis(0))
            .ok_or_else(|| XaiError::invalid_input("background set is empty"))?;
        let base = evaluate(outputs, &mean.clone().insert_axis(Axis(0)), None)?;
        let k = base.ncols();

        let mut batch = Array2::zeros((n * m, m));
        for i in 0..n {
            for j in 0..m {
                let r = i * m + j;
                batch.row_mut(r).assign(&mean);
                batch[[r, j]] = data[[i, j]];
            }
        }
        let out = evaluate(outputs, &batch, Some(k))?;

        let mut tables = vec![Array2::zeros((n, m)); k];
        for (o, table) in tables.iter_mut().enumerate() {
            for i in 0..n {
                for j in 0..m {
                    table[[i, j]] = out[[i * m + j, o]] - base[[0, o]];
                }
            }
        }
        Ok(tables)
    }
}

/// Exact interventional Shapley values by enumerating every coalition.
///
/// The value of a coalition is the mean output over the background rows with
/// the coalition's features taken from the explained row. Cost grows as
/// `2^features`, so wide inputs are refused.
#[derive(Debug, Clone)]
pub struct ExactShapEngine {
    max_features: usize,
}

impl ExactShapEngine {
    /// Hard limit on enumerated features, whatever the configured limit.
    pub const FEATURE_CEILING: usize = 16;

    /// `max_features` is clamped to [`Self::FEATURE_CEILING`].
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features: max_features.min(Self::FEATURE_CEILING),
        }
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }
}

impl ShapEngine for ExactShapEngine {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn shap_values(
        &self,
        outputs: &OutputFn<'_>,
        background: &Array2<f64>,
        data: &Array2<f64>,
    ) -> Result<Vec<Array2<f64>>> {
        let (n, m) = data.dim();
        if m > self.max_features {
            return Err(XaiError::numerical(format!(
                "exact enumeration over {} features exceeds the limit of {}",
                m, self.max_features
            )));
        }
        let nb = background.nrows();
        if nb == 0 {
            return Err(XaiError::invalid_input("background set is empty"));
        }

        let n_masks = u32::try_from(m)
            .ok()
            .and_then(|bits| 1usize.checked_shl(bits))
            .ok_or_else(|| XaiError::numerical(format!("2^{} coalitions overflow", m)))?;
        let batch_rows = n_masks.checked_mul(nb).ok_or_else(|| {
            XaiError::numerical(format!("{} coalitions x {} background rows overflow", n_masks, nb))
        })?;
        let weights = coalition_weights(m);
        let mut tables: Vec<Array2<f64>> = Vec::new();

        for i in 0..n {
            let mut batch = Array2::zeros((batch_rows, m));
            for mask in 0..n_masks {
                for b in 0..nb {
                    let mut row = batch.row_mut(mask * nb + b);
                    row.assign(&background.row(b));
                    for j in (0..m).filter(|&j| mask & (1usize << j) != 0) {
                        row[j] = data[[i, j]];
                    }
                }
            }
            let expected_outputs = tables.first().map(|_| tables.len());
            let out = evaluate(outputs, &batch, expected_outputs)?;
            if tables.is_empty() {
                tables = vec![Array2::zeros((n, m)); out.ncols()];
            }

            // Coalition values: mean over the background rows.
            let mut values = Array2::<f64>::zeros((n_masks, tables.len()));
            for mask in 0..n_masks {
                for b in 0..nb {
                    let mut value = values.row_mut(mask);
                    value += &out.row(mask * nb + b);
                }
            }
            values /= nb as f64;

            for (o, table) in tables.iter_mut().enumerate() {
                for j in 0..m {
                    let bit = 1usize << j;
                    let phi: f64 = (0..n_masks)
                        .filter(|mask| mask & bit == 0)
                        .map(|mask| {
                            let size = (mask as u64).count_ones() as usize;
                            weights[size] * (values[[mask | bit, o]] - values[[mask, o]])
                        })
                        .sum();
                    table[[i, j]] = phi;
                }
            }
        }

        if tables.is_empty() {
            // No rows to explain; still report the output count.
            let k = evaluate(outputs, &background.slice(ndarray::s![0..1, ..]).to_owned(), None)?
                .ncols();
            tables = vec![Array2::zeros((0, m)); k];
        }
        Ok(tables)
    }
}

/// `|S|! (m - |S| - 1)! / m!` indexed by coalition size.
fn coalition_weights(m: usize) -> Vec<f64> {
    let factorial = |x: usize| (1..=x).map(|v| v as f64).product::<f64>();
    let total = factorial(m);
    (0..m)
        .map(|s| factorial(s) * factorial(m - s - 1) / total)
        .collect()
}

/// Model-agnostic Monte Carlo estimate over random feature orderings.
///
/// Each sample draws an ordering and a background row, then switches the
/// features to the explained row's values one by one in that order; every
/// output change is credited to the feature just switched.
#[derive(Debug, Clone)]
pub struct SamplingShapEngine {
    samples: usize,
    seed: u64,
}

impl SamplingShapEngine {
    pub fn new(samples: usize, seed: u64) -> Self {
        Self { samples, seed }
    }
}

impl ShapEngine for SamplingShapEngine {
    fn name(&self) -> &'static str {
        "sampling"
    }

    fn shap_values(
        &self,
        outputs: &OutputFn<'_>,
        background: &Array2<f64>,
        data: &Array2<f64>,
    ) -> Result<Vec<Array2<f64>>> {
        if self.samples == 0 {
            return Err(XaiError::invalid_input("sampling engine needs at least one sample"));
        }
        let (n, m) = data.dim();
        let nb = background.nrows();
        if nb == 0 {
            return Err(XaiError::invalid_input("background set is empty"));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..m).collect();
        let steps = m + 1;
        let mut tables: Vec<Array2<f64>> = Vec::new();

        for i in 0..n {
            let mut batch = Array2::zeros((self.samples * steps, m));
            let mut orders = Vec::with_capacity(self.samples);
            for s in 0..self.samples {
                order.shuffle(&mut rng);
                let mut z: Array1<f64> = background.row(rng.gen_range(0..nb)).to_owned();
                batch.row_mut(s * steps).assign(&z);
                for (step, &j) in order.iter().enumerate() {
                    z[j] = data[[i, j]];
                    batch.row_mut(s * steps + step + 1).assign(&z);
                }
                orders.push(order.clone());
            }

            let expected_outputs = tables.first().map(|_| tables.len());
            let out = evaluate(outputs, &batch, expected_outputs)?;
            if tables.is_empty() {
                tables = vec![Array2::zeros((n, m)); out.ncols()];
            }

            for (o, table) in tables.iter_mut().enumerate() {
                for (s, sample_order) in orders.iter().enumerate() {
                    let start = s * steps;
                    for (step, &j) in sample_order.iter().enumerate() {
                        table[[i, j]] += out[[start + step + 1, o]] - out[[start + step, o]];
                    }
                }
                let mut row = table.row_mut(i);
                row /= self.samples as f64;
            }
        }

        if tables.is_empty() {
            let k = evaluate(outputs, &background.slice(ndarray::s![0..1, ..]).to_owned(), None)?
                .ncols();
            tables = vec![Array2::zeros((0, m)); k];
        }
        Ok(tables)
    }
}

fn evaluate(
    outputs: &OutputFn<'_>,
    batch: &Array2<f64>,
    expected_outputs: Option<usize>,
) -> Result<Array2<f64>> {
    let out = outputs(batch)?;
    if out.nrows() != batch.nrows() {
        return Err(XaiError::model(format!(
            "model returned {} rows for {} inputs",
            out.nrows(),
            batch.nrows()
        )));
    }
    if let Some(k) = expected_outputs {
        if out.ncols() != k {
            return Err(XaiError::model(format!(
                "model returned {} outputs, expected {}",
                out.ncols(),
                k
            )));
        }
    }
    if out.ncols() == 0 {
        return Err(XaiError::model("model returned no outputs"));
    }
    Ok(out)
}
