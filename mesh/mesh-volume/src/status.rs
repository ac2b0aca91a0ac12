//! Run and pass states.

use crate::error::VolumeResult;
use crate::mesher::MeshingOutcome;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// State of the retry controller for one subdomain.
///
/// `Advancing` runs a tetrahedral pass. A pass that leaves open faces
/// moves to `Stalled`; every stall after the first goes through
/// `Escalating` before the next pass. `Converged`, `GivenUp` and
/// `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PassState {
    /// Running the tetrahedral table.
    Advancing,
    /// The last pass left open faces.
    Stalled,
    /// Raising the search level and tolerance before the next pass.
    Escalating,
    /// The front is empty.
    Converged,
    /// The attempt ceiling was exceeded.
    GivenUp,
    /// The cancel flag was observed.
    Aborted,
}

impl PassState {
    /// True for states the controller does not leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::GivenUp | Self::Aborted)
    }
}

impl std::fmt::Display for PassState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Advancing => "advancing",
            Self::Stalled => "stalled",
            Self::Escalating => "escalating",
            Self::Converged => "converged",
            Self::GivenUp => "given up",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// How a run that returned `Ok` ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MeshingStatus {
    /// Every subdomain was filled and the optimizer ran.
    #[default]
    Completed,
    /// The cancel flag stopped the run; later subdomains are untouched.
    Aborted,
}

/// Summary of a run result.
///
/// # Example
///
/// ```
/// use mesh_volume::{RunStatus, VolumeError, VolumeResult, MeshingOutcome};
///
/// let result: VolumeResult<MeshingOutcome> = Err(VolumeError::GivenUp {
///     domain: 1,
///     attempts: 1,
///     open_faces: 12,
/// });
/// assert_eq!(RunStatus::of(&result), RunStatus::GivenUp);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunStatus {
    /// All subdomains meshed.
    Ok,
    /// A subdomain exceeded its attempt ceiling.
    GivenUp,
    /// Stopped by the cancel flag.
    Aborted,
    /// Any other error.
    Fatal,
}

impl RunStatus {
    /// Status of a finished run.
    #[must_use]
    pub const fn of(result: &VolumeResult<MeshingOutcome>) -> Self {
        match result {
            Ok(outcome) => match outcome.status {
                MeshingStatus::Completed => Self::Ok,
                MeshingStatus::Aborted => Self::Aborted,
            },
            Err(err) => err.status(),
        }
    }
}
