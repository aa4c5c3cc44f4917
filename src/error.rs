//! Error types for fallguard-fl

use thiserror::Error;

use crate::params::ShapeSignature;

/// All possible errors in a federated round.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FedError {
    /// Submitted parameter shapes disagree with the fixed global signature
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Signature fixed by the first accepted submission
        expected: ShapeSignature,
        /// Signature of the rejected parameters
        actual: ShapeSignature,
    },

    /// Malformed update payload (missing field, out-of-range metric, ...)
    #[error("Invalid update: {0}")]
    Validation(String),

    /// Fetch or submit could not complete
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local training failed (numerical divergence, worker panic)
    #[error("Local training failed: {0}")]
    Training(String),

    /// Configuration could not be loaded or is out of range
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FedError {
    /// Stable error name used in wire payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            FedError::ShapeMismatch { .. } => "ShapeMismatchError",
            FedError::Validation(_) => "ValidationError",
            FedError::Transport(_) => "TransportError",
            FedError::Training(_) => "TrainingError",
            FedError::Config(_) => "ConfigError",
        }
    }
}

impl From<ndarray::ShapeError> for FedError {
    fn from(e: ndarray::ShapeError) -> Self {
        FedError::Validation(e.to_string())
    }
}

impl From<reqwest::Error> for FedError {
    fn from(e: reqwest::Error) -> Self {
        FedError::Transport(e.to_string())
    }
}

impl From<config::ConfigError> for FedError {
    fn from(e: config::ConfigError) -> Self {
        FedError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let err = FedError::ShapeMismatch {
            expected: ShapeSignature::new(vec![vec![3]]),
            actual: ShapeSignature::new(vec![vec![4]]),
        };
        assert_eq!(err.kind(), "ShapeMismatchError");
        assert_eq!(FedError::Validation("x".into()).kind(), "ValidationError");
        assert_eq!(FedError::Transport("x".into()).kind(), "TransportError");
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = FedError::ShapeMismatch {
            expected: ShapeSignature::new(vec![vec![3, 10], vec![10]]),
            actual: ShapeSignature::new(vec![vec![3]]),
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected [[3, 10], [10]], got [[3]]"
        );
    }
}
