//! Scoring functions for prediction comparisons.

use crate::model::Mode;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metric used to compare two prediction vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    Accuracy,
    MeanSquaredError,
}

impl Scorer {
    /// Accuracy for classification, mean squared error for regression.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Classification => Scorer::Accuracy,
            Mode::Regression => Scorer::MeanSquaredError,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scorer::Accuracy => "accuracy",
            Scorer::MeanSquaredError => "mean_squared_error",
        }
    }

    pub fn score(&self, expected: &Array1<f64>, actual: &Array1<f64>) -> f64 {
        match self {
            Scorer::Accuracy => accuracy(expected, actual),
            Scorer::MeanSquaredError => mean_squared_error(expected, actual),
        }
    }
}

/// Fraction of positions where the labels agree exactly.
pub fn accuracy(expected: &Array1<f64>, actual: &Array1<f64>) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let hits = expected
        .iter()
        .zip(actual)
        .filter(|(e, a)| e == a)
        .count();
    hits as f64 / expected.len() as f64
}

pub fn mean_squared_error(expected: &Array1<f64>, actual: &Array1<f64>) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let sum: f64 = expected
        .iter()
        .zip(actual)
        .map(|(e, a)| (e - a).powi(2))
        .sum();
    sum / expected.len() as f64
}
