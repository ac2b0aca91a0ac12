//! Error types for boundary validation.

use thiserror::Error;

/// Result type for boundary validation.
pub type BoundaryResult<T> = Result<T, BoundaryError>;

/// Errors raised by the boundary validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// The boundary of a subdomain cannot enclose a valid volume.
    ///
    /// This is fatal for the whole meshing run.
    #[error("inconsistent boundary in subdomain {domain}: {details}")]
    InconsistentBoundary {
        /// Offending subdomain.
        domain: u32,
        /// Human readable list of the failed checks.
        details: String,
    },
}

impl BoundaryError {
    /// Subdomain that failed validation.
    #[must_use]
    pub const fn domain(&self) -> u32 {
        match self {
            Self::InconsistentBoundary { domain, .. } => *domain,
        }
    }
}
