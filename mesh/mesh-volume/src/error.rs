//! Error types for volume meshing.

use mesh_boundary::BoundaryError;
use mesh_optimize::OptimizeError;
use mesh_types::MeshError;
use thiserror::Error;

use crate::status::RunStatus;

/// Result type for volume meshing.
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors that stop a volume meshing run.
///
/// Every variant aborts the run: an unmeshed subdomain leaves the whole
/// volume mesh unusable. Cancellation is not an error, see
/// [`MeshingStatus::Aborted`](crate::MeshingStatus::Aborted).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VolumeError {
    /// A subdomain boundary failed validation before meshing started.
    #[error(transparent)]
    InconsistentBoundary(#[from] BoundaryError),

    /// A subdomain still had open faces after the last allowed attempt.
    #[error("gave up on subdomain {domain} after {attempts} attempts ({open_faces} open faces)")]
    GivenUp {
        /// Subdomain being meshed.
        domain: u32,
        /// Attempts made.
        attempts: u32,
        /// Faces left on the front.
        open_faces: usize,
    },

    /// The prism and pyramid stages left quads on the front.
    #[error("{count} open quads remain in subdomain {domain} after the transition stages")]
    OpenQuads {
        /// Subdomain being meshed.
        domain: u32,
        /// Open quads.
        count: usize,
    },

    /// An element referred to data missing from the store.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// The optimizer configuration was rejected.
    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    /// Meshing parameters are out of range.
    #[error("invalid meshing parameters: {details}")]
    InvalidParams {
        /// What is wrong.
        details: String,
    },
}

impl VolumeError {
    /// True for errors reported as [`RunStatus::Fatal`].
    ///
    /// [`VolumeError::GivenUp`] also aborts the run but has its own status.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::GivenUp { .. })
    }

    /// Run status reported for this error.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        match self {
            Self::GivenUp { .. } => RunStatus::GivenUp,
            _ => RunStatus::Fatal,
        }
    }

    /// Subdomain the error belongs to, if any.
    #[must_use]
    pub const fn domain(&self) -> Option<u32> {
        match self {
            Self::InconsistentBoundary(err) => Some(err.domain()),
            Self::GivenUp { domain, .. } | Self::OpenQuads { domain, .. } => Some(*domain),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = VolumeError::GivenUp {
            domain: 2,
            attempts: 10,
            open_faces: 7,
        };
        assert_eq!(
            err.to_string(),
            "gave up on subdomain 2 after 10 attempts (7 open faces)"
        );
        assert_eq!(err.status(), RunStatus::GivenUp);
        assert!(!err.is_fatal());
        assert_eq!(err.domain(), Some(2));
    }

    #[test]
    fn boundary_errors_convert() {
        let err: VolumeError = BoundaryError::InconsistentBoundary {
            domain: 3,
            details: "2 duplicate faces".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert_eq!(err.status(), RunStatus::Fatal);
        assert_eq!(err.domain(), Some(3));
        assert!(err.to_string().contains("duplicate"));
    }
}
