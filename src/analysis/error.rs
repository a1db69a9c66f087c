//! Analytics error types
//!
//! Every per-item computation (one correlation triple, one causal pair, one
//! metric's trend or risk) returns `AnalyticsResult<T>`. Batch drivers log and
//! drop `Err` values so a single bad item never aborts the batch.

use thiserror::Error;

/// Errors raised while analysing one metric or metric pair
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Too few samples for the requested operation
    #[error("Insufficient data: need {needed} samples, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Zero variance, division by zero or a non-finite intermediate
    #[error("Numeric degenerate input: {0}")]
    NumericDegenerate(String),

    /// Unexpected failure while processing a single item
    #[error("Computation failed for {item}: {reason}")]
    ComputationFailure { item: String, reason: String },
}

impl AnalyticsError {
    pub fn insufficient(needed: usize, available: usize) -> Self {
        AnalyticsError::InsufficientData { needed, available }
    }

    pub fn failure(item: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalyticsError::ComputationFailure {
            item: item.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error just means "not enough evidence yet"
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, AnalyticsError::InsufficientData { .. })
    }
}

/// Result type alias for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyticsError::insufficient(5, 4);
        assert_eq!(err.to_string(), "Insufficient data: need 5 samples, have 4");
        assert!(err.is_insufficient_data());

        let err = AnalyticsError::failure("sugar_g→sleep_score", "non-finite slope");
        assert_eq!(
            err.to_string(),
            "Computation failed for sugar_g→sleep_score: non-finite slope"
        );
        assert!(!err.is_insufficient_data());
    }
}
