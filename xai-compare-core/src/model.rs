//! The model contract explainers work against.

use crate::data::FeatureMatrix;
use crate::error::{Result, XaiError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Learning task of the model being explained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Classification,
    #[default]
    Regression,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Classification => write!(f, "classification"),
            Mode::Regression => write!(f, "regression"),
        }
    }
}

impl FromStr for Mode {
    type Err = XaiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(Mode::Classification),
            "regression" => Ok(Mode::Regression),
            other => Err(XaiError::invalid_input(format!("unknown mode '{}'", other))),
        }
    }
}

/// Model family, used to pick an attribution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    TreeEnsemble,
    Linear,
    Other,
}

impl ModelCategory {
    /// Infer the family from a type name such as `RandomForestRegressor`.
    ///
    /// Case-insensitive substring match: "tree"/"forest" means a tree
    /// ensemble, "linear" means linear. A name hitting both families (e.g.
    /// `LinearForestRegressor`) is ambiguous and falls back to `Other`.
    pub fn infer(type_name: &str) -> Self {
        let name = type_name.to_ascii_lowercase();
        let tree = name.contains("tree") || name.contains("forest");
        let linear = name.contains("linear");
        match (tree, linear) {
            (true, false) => ModelCategory::TreeEnsemble,
            (false, true) => ModelCategory::Linear,
            (true, true) => {
                tracing::warn!(
                    model = type_name,
                    "model type name matches both tree and linear families, treating as generic"
                );
                ModelCategory::Other
            }
            (false, false) => ModelCategory::Other,
        }
    }
}

/// An externally trained predictor.
///
/// Implementations must be safe to share across threads; explainers only
/// ever read from them.
pub trait Model: Send + Sync {
    /// One prediction per row.
    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>>;

    /// Class probabilities (rows x classes), for classifiers that have them.
    fn predict_proba(&self, _x: &FeatureMatrix) -> Option<Result<Array2<f64>>> {
        None
    }

    /// Reported type name, e.g. `RandomForestClassifier`.
    fn type_name(&self) -> &str;

    fn category(&self) -> ModelCategory {
        ModelCategory::infer(self.type_name())
    }
}

/// All model outputs as columns (rows x outputs).
///
/// Classifiers with probabilities yield one column per class; everything
/// else yields the single prediction column.
pub fn model_outputs(model: &dyn Model, mode: Mode, x: &FeatureMatrix) -> Result<Array2<f64>> {
    if mode == Mode::Classification {
        if let Some(proba) = model.predict_proba(x) {
            let proba = proba?;
            check_rows(x, proba.nrows())?;
            return Ok(proba);
        }
    }
    let predictions = model.predict(x)?;
    check_rows(x, predictions.len())?;
    Ok(predictions.insert_axis(Axis(1)))
}

/// The scalar output surrogate explainers fit: the last class probability
/// for classifiers that have probabilities, otherwise the prediction.
pub fn explained_output(model: &dyn Model, mode: Mode, x: &FeatureMatrix) -> Result<Array1<f64>> {
    let outputs = model_outputs(model, mode, x)?;
    let last = outputs.ncols().checked_sub(1).ok_or_else(|| {
        XaiError::model(format!("{} produced no outputs", model.type_name()))
    })?;
    Ok(outputs.column(last).to_owned())
}

fn check_rows(x: &FeatureMatrix, produced: usize) -> Result<()> {
    if produced != x.n_rows() {
        return Err(XaiError::model(format!(
            "model returned {} rows for {} inputs",
            produced,
            x.n_rows()
        )));
    }
    Ok(())
}

type PredictFn = dyn Fn(&Array2<f64>) -> Array1<f64> + Send + Sync;
type ProbaFn = dyn Fn(&Array2<f64>) -> Array2<f64> + Send + Sync;

/// A model backed by plain closures over the raw feature values.
pub struct FnModel {
    type_name: String,
    category: Option<ModelCategory>,
    predict: Box<PredictFn>,
    proba: Option<Box<ProbaFn>>,
}

impl FnModel {
    pub fn new(
        type_name: impl Into<String>,
        predict: impl Fn(&Array2<f64>) -> Array1<f64> + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            category: None,
            predict: Box::new(predict),
            proba: None,
        }
    }

    /// Declare the family instead of inferring it from the type name.
    pub fn with_category(mut self, category: ModelCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_proba(
        mut self,
        proba: impl Fn(&Array2<f64>) -> Array2<f64> + Send + Sync + 'static,
    ) -> Self {
        self.proba = Some(Box::new(proba));
        self
    }
}

impl Model for FnModel {
    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        Ok((self.predict)(x.values()))
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> Option<Result<Array2<f64>>> {
        self.proba.as_ref().map(|p| Ok(p(x.values())))
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn category(&self) -> ModelCategory {
        self.category
            .unwrap_or_else(|| ModelCategory::infer(&self.type_name))
    }
}

impl fmt::Debug for FnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel")
            .field("type_name", &self.type_name)
            .field("category", &self.category())
            .field("has_proba", &self.proba.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_infer_category() {
        assert_eq!(
            ModelCategory::infer("RandomForestRegressor"),
            ModelCategory::TreeEnsemble
        );
        assert_eq!(
            ModelCategory::infer("DecisionTreeClassifier"),
            ModelCategory::TreeEnsemble
        );
        assert_eq!(ModelCategory::infer("LinearRegression"), ModelCategory::Linear);
        assert_eq!(ModelCategory::infer("SVC"), ModelCategory::Other);
    }

    #[test]
    fn test_infer_ambiguous_name_is_generic() {
        assert_eq!(
            ModelCategory::infer("LinearForestRegressor"),
            ModelCategory::Other
        );
    }

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("Classification".parse::<Mode>().unwrap(), Mode::Classification);
        assert_eq!(Mode::Regression.to_string(), "regression");
        assert!("clustering".parse::<Mode>().is_err());
    }

    #[test]
    fn test_fn_model_declared_category_wins() {
        let model = FnModel::new("RandomForest", |x: &Array2<f64>| x.column(0).to_owned())
            .with_category(ModelCategory::Linear);
        assert_eq!(model.category(), ModelCategory::Linear);
    }

    #[test]
    fn test_model_outputs_by_mode() {
        let model = FnModel::new("Clf", |x: &Array2<f64>| x.column(0).mapv(|v| f64::from(v > 0.0)))
            .with_proba(|x: &Array2<f64>| {
                let p = x.column(0).mapv(|v| if v > 0.0 { 0.9 } else { 0.1 });
                ndarray::stack![Axis(1), p.mapv(|v| 1.0 - v), p]
            });
        let x = FeatureMatrix::from_rows(vec!["a"], &[vec![1.0], vec![-1.0]]).unwrap();

        let clf = model_outputs(&model, Mode::Classification, &x).unwrap();
        assert_eq!(clf.dim(), (2, 2));
        let reg = model_outputs(&model, Mode::Regression, &x).unwrap();
        assert_eq!(reg, array![[1.0], [0.0]]);

        let explained = explained_output(&model, Mode::Classification, &x).unwrap();
        assert_eq!(explained, array![0.9, 0.1]);
    }

    #[test]
    fn test_model_outputs_rejects_wrong_row_count() {
        let model = FnModel::new("Broken", |_x: &Array2<f64>| array![1.0]);
        let x = FeatureMatrix::from_rows(vec!["a"], &[vec![1.0], vec![2.0]]).unwrap();
        assert!(matches!(
            model_outputs(&model, Mode::Regression, &x),
            Err(XaiError::Model(_))
        ));
    }
}
