//! Explainer capability and its adapters.
//!
//! Every adapter turns a model plus a feature matrix into feature
//! attributions. Global explanations give one value per feature for the
//! whole matrix; local explanations give one value per feature per row.

pub mod ebm;
pub mod engine;
pub mod lime;
pub mod mimic;
pub mod permutation;
pub mod shap;

pub use ebm::EbmExplainer;
pub use engine::{ExactShapEngine, LinearShapEngine, SamplingShapEngine, ShapEngine};
pub use lime::LimeExplainer;
pub use mimic::MimicExplainer;
pub use permutation::PermutationExplainer;
pub use shap::{BinaryClassPolicy, ShapExplainer, ShapStrategy};

use crate::data::{AttributionTable, FeatureMatrix, LocalAttributions};
use crate::error::{Result, XaiError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Something that can attribute a model's behaviour to its input features.
///
/// Explainers built with training data only accept a `data` matrix with the
/// training feature names in the training order. A reordered or renamed
/// matrix is rejected with `XaiError::InvalidInput`, never realigned.
pub trait Explainer: Send + Sync {
    fn kind(&self) -> ExplainerKind;

    /// One attribution per feature, aggregated over all rows of `data`.
    fn explain_global(&self, data: &FeatureMatrix) -> Result<AttributionTable>;

    /// One attribution per feature per row of `data`.
    ///
    /// Dataset-level methods return `XaiError::UnsupportedOperation`.
    fn explain_local(&self, data: &FeatureMatrix) -> Result<LocalAttributions>;
}

/// The explanation methods the factory knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainerKind {
    Shap,
    Lime,
    Ebm,
    Mimic,
    Permutation,
}

impl ExplainerKind {
    pub const ALL: [ExplainerKind; 5] = [
        ExplainerKind::Shap,
        ExplainerKind::Lime,
        ExplainerKind::Ebm,
        ExplainerKind::Mimic,
        ExplainerKind::Permutation,
    ];

    /// The lowercase key used to request this explainer.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainerKind::Shap => "shap",
            ExplainerKind::Lime => "lime",
            ExplainerKind::Ebm => "ebm",
            ExplainerKind::Mimic => "mimic",
            ExplainerKind::Permutation => "permutation",
        }
    }

    pub fn supports_local(&self) -> bool {
        !matches!(self, ExplainerKind::Permutation)
    }
}

impl fmt::Display for ExplainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplainerKind {
    type Err = XaiError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        ExplainerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key)
            .ok_or_else(|| XaiError::UnrecognizedExplainer(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!("shap".parse::<ExplainerKind>().unwrap(), ExplainerKind::Shap);
        assert_eq!(
            " Permutation ".parse::<ExplainerKind>().unwrap(),
            ExplainerKind::Permutation
        );
        let err = "bogus".parse::<ExplainerKind>().unwrap_err();
        assert!(matches!(err, XaiError::UnrecognizedExplainer(name) if name == "bogus"));
    }

    #[test]
    fn test_kind_roundtrip_names() {
        for kind in ExplainerKind::ALL {
            assert_eq!(kind.to_string().parse::<ExplainerKind>().unwrap(), kind);
        }
        assert!(!ExplainerKind::Permutation.supports_local());
        assert!(ExplainerKind::Shap.supports_local());
    }
}
