//! JSON datasets and train/test splitting.

use crate::data::FeatureMatrix;
use crate::error::{Result, XaiError};
use crate::model::Mode;
use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A labelled table as stored on disk:
///
/// ```json
/// { "features": ["age", "income"], "rows": [[31, 2.5], [45, 4.0]],
///   "target": [0, 1], "mode": "classification" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub target: Vec<f64>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

/// Both halves of a split, with targets.
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

impl Dataset {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let dataset: Dataset = serde_json::from_str(&raw)?;
        dataset.validate()?;
        Ok(dataset)
    }

    fn validate(&self) -> Result<()> {
        if self.rows.len() != self.target.len() {
            return Err(XaiError::invalid_input(format!(
                "{} rows but {} target values",
                self.rows.len(),
                self.target.len()
            )));
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Shuffle with `seed` and hold out `test_fraction` of the rows.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<Split> {
        self.validate()?;
        let n = self.rows.len();
        if n < 2 {
            return Err(XaiError::invalid_input(format!(
                "need at least 2 rows to split, got {}",
                n
            )));
        }
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(XaiError::invalid_input(format!(
                "test fraction {} is outside [0, 1)",
                test_fraction
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        let (test, train) = order.split_at(n_test);

        let pick_rows = |idx: &[usize]| -> Vec<Vec<f64>> {
            idx.iter().map(|&i| self.rows[i].clone()).collect()
        };
        let pick_target =
            |idx: &[usize]| -> Array1<f64> { idx.iter().map(|&i| self.target[i]).collect() };

        Ok(Split {
            x_train: FeatureMatrix::from_rows(self.features.clone(), &pick_rows(train))?,
            x_test: FeatureMatrix::from_rows(self.features.clone(), &pick_rows(test))?,
            y_train: pick_target(train),
            y_test: pick_target(test),
        })
    }
}
