//! Builds explainers by name around one model and its data splits.

use crate::config::ExplainerSettings;
use crate::data::FeatureMatrix;
use crate::error::{Result, XaiError};
use crate::explainers::{
    EbmExplainer, Explainer, ExplainerKind, LimeExplainer, MimicExplainer, PermutationExplainer,
    ShapEngine, ShapExplainer, ShapStrategy,
};
use crate::model::{Mode, Model};
use ndarray::Array1;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Holds a trained model with its train/test splits and hands out
/// explainers for it.
///
/// The factory only reads its inputs; every explainer it builds shares them
/// through `Arc`s, so one factory can serve many explainers at once.
pub struct ExplainerFactory {
    model: Arc<dyn Model>,
    x_train: Arc<FeatureMatrix>,
    x_test: Arc<FeatureMatrix>,
    y_train: Arc<Array1<f64>>,
    y_test: Arc<Array1<f64>>,
    mode: Mode,
    settings: ExplainerSettings,
    shap_engines: HashMap<ShapStrategy, Arc<dyn ShapEngine>>,
}

impl ExplainerFactory {
    pub fn new(
        model: Arc<dyn Model>,
        x_train: FeatureMatrix,
        x_test: FeatureMatrix,
        y_train: Array1<f64>,
        y_test: Array1<f64>,
        mode: Mode,
    ) -> Result<Self> {
        if !x_train.same_schema(&x_test) {
            return Err(XaiError::invalid_input(format!(
                "train features {:?} differ from test features {:?}",
                x_train.names(),
                x_test.names()
            )));
        }
        if y_train.len() != x_train.n_rows() {
            return Err(XaiError::invalid_input(format!(
                "{} training rows but {} training targets",
                x_train.n_rows(),
                y_train.len()
            )));
        }
        if y_test.len() != x_test.n_rows() {
            return Err(XaiError::invalid_input(format!(
                "{} test rows but {} test targets",
                x_test.n_rows(),
                y_test.len()
            )));
        }
        Ok(Self {
            model,
            x_train: Arc::new(x_train),
            x_test: Arc::new(x_test),
            y_train: Arc::new(y_train),
            y_test: Arc::new(y_test),
            mode,
            settings: ExplainerSettings::default(),
            shap_engines: HashMap::new(),
        })
    }

    pub fn with_settings(mut self, settings: ExplainerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use `engine` for every SHAP explainer whose model resolves to
    /// `strategy`.
    pub fn with_shap_engine(mut self, strategy: ShapStrategy, engine: Arc<dyn ShapEngine>) -> Self {
        self.shap_engines.insert(strategy, engine);
        self
    }

    /// Build the explainer registered under `name` (case-insensitive).
    pub fn create(&self, name: &str) -> Result<Box<dyn Explainer>> {
        let kind: ExplainerKind = name.parse()?;
        Ok(self.create_kind(kind))
    }

    pub fn create_kind(&self, kind: ExplainerKind) -> Box<dyn Explainer> {
        let model = Arc::clone(&self.model);
        let x_train = Arc::clone(&self.x_train);
        match kind {
            ExplainerKind::Shap => {
                let explainer = ShapExplainer::new(model, self.mode, &self.settings.shap)
                    .with_training_data(x_train);
                match self.shap_engines.get(&explainer.strategy()) {
                    Some(engine) => Box::new(explainer.with_engine(Arc::clone(engine))),
                    None => Box::new(explainer),
                }
            }
            ExplainerKind::Lime => Box::new(LimeExplainer::new(
                model,
                x_train,
                self.mode,
                &self.settings.lime,
            )),
            ExplainerKind::Ebm => Box::new(EbmExplainer::new(
                x_train,
                Arc::clone(&self.y_train),
                &self.settings.ebm,
            )),
            ExplainerKind::Mimic => Box::new(MimicExplainer::new(
                model,
                x_train,
                self.mode,
                &self.settings.mimic,
            )),
            ExplainerKind::Permutation => Box::new(PermutationExplainer::new(
                model,
                x_train,
                self.mode,
                &self.settings.permutation,
            )),
        }
    }

    /// Explainers run when the caller doesn't name any.
    pub fn default_explainers(&self) -> &[ExplainerKind] {
        &self.settings.default_explainers
    }

    pub fn settings(&self) -> &ExplainerSettings {
        &self.settings
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn x_train(&self) -> &FeatureMatrix {
        &self.x_train
    }

    pub fn x_test(&self) -> &FeatureMatrix {
        &self.x_test
    }

    pub fn y_train(&self) -> &Array1<f64> {
        &self.y_train
    }

    pub fn y_test(&self) -> &Array1<f64> {
        &self.y_test
    }
}

impl fmt::Debug for ExplainerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplainerFactory")
            .field("model", &self.model.type_name())
            .field("mode", &self.mode)
            .field("train_rows", &self.x_train.n_rows())
            .field("test_rows", &self.x_test.n_rows())
            .field("features", &self.x_train.names())
            .finish()
    }
}
