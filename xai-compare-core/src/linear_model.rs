//! Ridge linear regression usable as a `Model`.
//!
//! Serves as the surrogate for the mimic explainer and as the reference
//! model the CLI fits before comparing explainers.

use crate::data::FeatureMatrix;
use crate::error::{Result, XaiError};
use crate::linalg;
use crate::model::{Model, ModelCategory};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    feature_names: Vec<String>,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn fit(x: &FeatureMatrix, y: &Array1<f64>, alpha: f64) -> Result<Self> {
        let fit = linalg::ridge(x.values(), y, None, alpha)?;
        Ok(Self {
            feature_names: x.names().to_vec(),
            coefficients: fit.coefficients,
            intercept: fit.intercept,
        })
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl Model for LinearModel {
    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        if x.names() != self.feature_names.as_slice() {
            return Err(XaiError::model(format!(
                "LinearModel was fit on features {:?}, got {:?}",
                self.feature_names,
                x.names()
            )));
        }
        Ok(x.values().dot(&self.coefficients) + self.intercept)
    }

    fn type_name(&self) -> &str {
        "LinearRegression"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Linear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_and_predict() {
        let x = FeatureMatrix::from_rows(
            vec!["a", "b"],
            &[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 1.0],
                vec![2.0, 1.0],
            ],
        )
        .unwrap();
        let y = array![1.0, 4.0, 0.0, 3.0, 6.0];
        let model = LinearModel::fit(&x, &y, 0.0).unwrap();

        assert!((model.coefficients()[0] - 3.0).abs() < 1e-9);
        assert!((model.coefficients()[1] + 1.0).abs() < 1e-9);
        let predicted = model.predict(&x).unwrap();
        for (p, t) in predicted.iter().zip(&y) {
            assert!((p - t).abs() < 1e-9);
        }
        assert_eq!(model.category(), ModelCategory::Linear);
    }

    #[test]
    fn test_predict_checks_schema() {
        let x = FeatureMatrix::from_rows(vec!["a"], &[vec![0.0], vec![1.0]]).unwrap();
        let model = LinearModel::fit(&x, &array![0.0, 1.0], 0.0).unwrap();
        let other = FeatureMatrix::from_rows(vec!["b"], &[vec![0.0]]).unwrap();
        assert!(matches!(model.predict(&other), Err(XaiError::Model(_))));
    }
}
