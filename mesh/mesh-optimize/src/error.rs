//! Error types for mesh optimization.

use thiserror::Error;

/// Result type for optimizer configuration.
pub type OptimizeResult<T> = Result<T, OptimizeError>;

/// Errors raised while configuring the optimizer.
///
/// Running the operators never fails; rejected moves are only counted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    /// Operator string contains a character with no operator.
    #[error("unknown optimization operator '{0}'")]
    UnknownOperator(char),

    /// Badness exponent must be positive and finite.
    #[error("invalid error power {0}, must be positive")]
    InvalidErrorPower(f64),
}
