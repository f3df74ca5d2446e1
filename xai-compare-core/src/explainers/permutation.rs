//! Permutation importance: how much a model's predictions move when one
//! feature column is shuffled.

use crate::config::PermutationSettings;
use crate::data::{AttributionTable, FeatureMatrix, LocalAttributions};
use crate::error::{Result, XaiError};
use crate::explainers::{Explainer, ExplainerKind};
use crate::metrics::Scorer;
use crate::model::{Mode, Model};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::debug;

pub const PERMUTATION_COLUMN: &str = "importance";

pub struct PermutationExplainer {
    model: Arc<dyn Model>,
    x_train: Arc<FeatureMatrix>,
    mode: Mode,
    num_permutations: usize,
    random_state: Option<u64>,
}

impl PermutationExplainer {
    pub fn new(
        model: Arc<dyn Model>,
        x_train: Arc<FeatureMatrix>,
        mode: Mode,
        settings: &PermutationSettings,
    ) -> Self {
        Self {
            model,
            x_train,
            mode,
            num_permutations: settings.num_permutations,
            random_state: settings.random_state,
        }
    }

    fn rng(&self) -> StdRng {
        match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn predict(&self, data: &FeatureMatrix) -> Result<Array1<f64>> {
        let predictions = self.model.predict(data)?;
        if predictions.len() != data.n_rows() {
            return Err(XaiError::model(format!(
                "model returned {} predictions for {} rows",
                predictions.len(),
                data.n_rows()
            )));
        }
        Ok(predictions)
    }

    /// Mean score of the reference predictions against predictions with
    /// column `j` shuffled, over every permutation round.
    fn column_score(
        &self,
        data: &FeatureMatrix,
        reference: &Array1<f64>,
        j: usize,
        scorer: Scorer,
        rng: &mut StdRng,
    ) -> Result<f64> {
        let mut total = 0.0;
        for _ in 0..self.num_permutations {
            let mut column = data.values().column(j).to_vec();
            column.shuffle(rng);
            let mut permuted: Array2<f64> = data.values().clone();
            permuted.column_mut(j).assign(&Array1::from(column));
            let predictions = self.predict(&data.with_values(permuted)?)?;
            total += scorer.score(reference, &predictions);
        }
        Ok(total / self.num_permutations as f64)
    }
}

impl Explainer for PermutationExplainer {
    fn kind(&self) -> ExplainerKind {
        ExplainerKind::Permutation
    }

    /// Per-feature scores normalized to sum to one.
    ///
    /// The score is taken between the model's predictions on `data` and its
    /// predictions with one column shuffled; the feature order of `data` is
    /// kept.
    fn explain_global(&self, data: &FeatureMatrix) -> Result<AttributionTable> {
        let kind = self.kind();
        self.x_train.ensure_schema(data)?;
        if self.num_permutations == 0 {
            return Err(XaiError::explanation(
                kind.as_str(),
                "num_permutations must be at least 1",
            ));
        }
        if data.n_rows() == 0 {
            return Err(XaiError::explanation(kind.as_str(), "no rows to permute"));
        }

        let scorer = Scorer::for_mode(self.mode);
        let mut rng = self.rng();
        let reference = self.predict(data)?;
        let mut scores = Array1::zeros(data.n_features());
        for j in 0..data.n_features() {
            scores[j] = self.column_score(data, &reference, j, scorer, &mut rng)?;
        }

        let total = scores.sum();
        if total == 0.0 || !total.is_finite() {
            return Err(XaiError::explanation(
                kind.as_str(),
                format!("{} scores sum to {}, cannot normalize", scorer.name(), total),
            ));
        }
        debug!(
            scorer = scorer.name(),
            permutations = self.num_permutations,
            total,
            "permutation scores computed"
        );
        AttributionTable::single(PERMUTATION_COLUMN, data.names().to_vec(), scores / total)
    }

    fn explain_local(&self, _data: &FeatureMatrix) -> Result<LocalAttributions> {
        Err(XaiError::unsupported(
            self.kind().as_str(),
            "local explanation",
        ))
    }
}
