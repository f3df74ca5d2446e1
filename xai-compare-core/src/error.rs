//! Error types for the xai-compare-core crate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XaiError>;

/// Top-level error type for explanation operations.
#[derive(Debug, Error)]
pub enum XaiError {
    #[error("No explainer available for type: {0}")]
    UnrecognizedExplainer(String),

    #[error("{operation} is not supported by the {explainer} explainer")]
    UnsupportedOperation {
        explainer: String,
        operation: String,
    },

    #[error("{explainer} explanation failed: {reason}")]
    ExplanationFailure { explainer: String, reason: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl XaiError {
    pub fn unsupported(explainer: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            explainer: explainer.into(),
            operation: operation.into(),
        }
    }

    pub fn explanation(explainer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExplanationFailure {
            explainer: explainer.into(),
            reason: reason.into(),
        }
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }

    /// Whether this error means the explainer cannot do the operation at all,
    /// as opposed to failing on this particular input.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }
}

impl From<Box<figment::Error>> for XaiError {
    fn from(err: Box<figment::Error>) -> Self {
        XaiError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XaiError::UnrecognizedExplainer("bogus".to_string());
        assert_eq!(err.to_string(), "No explainer available for type: bogus");

        let err = XaiError::unsupported("permutation", "explain_local");
        assert_eq!(
            err.to_string(),
            "explain_local is not supported by the permutation explainer"
        );
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_error_from_shape() {
        let shape_err = ndarray::Array2::<f64>::from_shape_vec((2, 2), vec![1.0]).unwrap_err();
        let err: XaiError = shape_err.into();
        assert!(matches!(err, XaiError::Shape(_)));
        assert!(!err.is_unsupported());
    }
}
