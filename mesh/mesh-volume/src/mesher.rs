//! The volume meshing pipeline.

use mesh_boundary::{validate_all, ValidationOptions};
use mesh_optimize::{
    optimize_volume, remove_illegal_elements, OptimizeReport, QualityReport, RepairReport,
};
use mesh_types::{CancelFlag, VolumeMesh};
use tracing::{info, warn};

use crate::controller::{SubdomainController, SubdomainReport};
use crate::error::VolumeResult;
use crate::params::MeshingParams;
use crate::rules::RuleSet;
use crate::status::{MeshingStatus, PassState};

/// Everything a finished or cancelled run reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshingOutcome {
    /// Whether every subdomain was filled.
    pub status: MeshingStatus,
    /// One report per subdomain that was started, in order.
    pub subdomains: Vec<SubdomainReport>,
    /// Vertices locked because they belong to a pyramid or prism.
    pub locked_vertices: usize,
    /// Optimizer counts; empty for an aborted run.
    pub optimize: OptimizeReport,
    /// Illegal-element repair counts; empty for an aborted run.
    pub repair: RepairReport,
    /// Quality of the final mesh.
    pub quality: QualityReport,
}

impl MeshingOutcome {
    /// True if all subdomains were filled.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == MeshingStatus::Completed
    }

    /// Elements created over all subdomains, before optimization.
    #[must_use]
    pub fn elements_created(&self) -> usize {
        self.subdomains.iter().map(|r| r.elements_created).sum()
    }
}

impl std::fmt::Display for MeshingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Volume meshing: {:?}", self.status)?;
        for report in &self.subdomains {
            writeln!(f, "  {report}")?;
        }
        writeln!(f, "  {}", self.optimize)?;
        writeln!(f, "  {}", self.repair)?;
        write!(f, "{}", self.quality)
    }
}

type ProgressFn<'a> = Box<dyn FnMut(&SubdomainReport) + 'a>;

/// Fills every subdomain of a boundary mesh with volume elements.
///
/// Subdomains are meshed one after another in index order. After the last
/// one the optimizer and the illegal-element repair run over the whole
/// mesh.
///
/// # Example
///
/// ```
/// use mesh_types::unit_cube_boundary;
/// use mesh_volume::{MeshingParams, RuleSet, VolumeMesher};
///
/// let mut mesh = unit_cube_boundary();
/// let rules = RuleSet::standard();
///
/// let outcome = VolumeMesher::new(&rules, MeshingParams::default().with_delaunay(false))
///     .run(&mut mesh)
///     .unwrap();
///
/// assert!(outcome.is_completed());
/// assert!(outcome.quality.tet_count >= 5);
/// assert!((mesh.total_volume(1) - 1.0).abs() < 1e-9);
/// ```
pub struct VolumeMesher<'a> {
    rules: &'a RuleSet,
    params: MeshingParams,
    cancel: Option<CancelFlag>,
    progress: Option<ProgressFn<'a>>,
}

impl std::fmt::Debug for VolumeMesher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeMesher")
            .field("params", &self.params)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> VolumeMesher<'a> {
    /// Create a mesher with the given tables and parameters.
    #[must_use]
    pub fn new(rules: &'a RuleSet, params: MeshingParams) -> Self {
        Self {
            rules,
            params,
            cancel: None,
            progress: None,
        }
    }

    /// Stop at the next pass boundary once `flag` is set.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Call `callback` after each subdomain, including an aborted one.
    #[must_use]
    pub fn on_subdomain_meshed(mut self, callback: impl FnMut(&SubdomainReport) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Parameters of this mesher.
    #[must_use]
    pub const fn params(&self) -> &MeshingParams {
        &self.params
    }

    /// Mesh every subdomain of `mesh`.
    ///
    /// A cancelled run returns `Ok` with [`MeshingStatus::Aborted`]; the
    /// subdomains not yet started are left untouched and the optimizer
    /// does not run.
    ///
    /// # Errors
    ///
    /// - [`VolumeError::InvalidParams`](crate::VolumeError::InvalidParams) or
    ///   [`VolumeError::Optimize`](crate::VolumeError::Optimize) for bad
    ///   parameters, before anything is touched
    /// - [`VolumeError::InconsistentBoundary`](crate::VolumeError::InconsistentBoundary)
    ///   if a subdomain boundary fails validation, before any element is
    ///   created
    /// - [`VolumeError::OpenQuads`](crate::VolumeError::OpenQuads) and
    ///   [`VolumeError::GivenUp`](crate::VolumeError::GivenUp) from the
    ///   subdomain controller
    pub fn run(&mut self, mesh: &mut VolumeMesh) -> VolumeResult<MeshingOutcome> {
        self.params.validate()?;
        let optimize_params = self.params.optimize_params()?;
        let domains = mesh.domain_count();
        info!(
            domains,
            points = mesh.point_count(),
            faces = mesh.surface_elements.len(),
            "Starting volume meshing"
        );

        let options =
            ValidationOptions::default().with_overlap_check(self.params.check_overlapping_boundary);
        validate_all(mesh, &options)?;

        let mut controller = SubdomainController::new(self.rules, &self.params);
        if let Some(flag) = &self.cancel {
            controller = controller.with_cancel_flag(flag);
        }

        let mut outcome = MeshingOutcome::default();
        for k in 1..=domains {
            if self.cancelled() {
                outcome.status = MeshingStatus::Aborted;
                break;
            }
            let report = controller.mesh_subdomain(mesh, k)?;
            let aborted = report.state == PassState::Aborted;
            if let Some(progress) = self.progress.as_mut() {
                progress(&report);
            }
            outcome.subdomains.push(report);
            if aborted {
                outcome.status = MeshingStatus::Aborted;
                break;
            }
        }

        if outcome.status == MeshingStatus::Aborted {
            outcome.quality = QualityReport::compute(mesh);
            info!(
                meshed = outcome.subdomains.len(),
                domains, "Volume meshing aborted"
            );
            return Ok(outcome);
        }

        outcome.locked_vertices = mesh.lock_non_tetrahedral_vertices();
        outcome.optimize = optimize_volume(mesh, &optimize_params, self.cancel.as_ref());
        if outcome.optimize.cancelled {
            outcome.status = MeshingStatus::Aborted;
        } else {
            outcome.repair = remove_illegal_elements(mesh, self.params.repair_cap);
        }
        outcome.quality = QualityReport::compute(mesh);

        if outcome.quality.illegal_count > 0 {
            warn!(
                illegal = outcome.quality.illegal_count,
                "Volume mesh has illegal elements"
            );
        }
        info!(
            status = ?outcome.status,
            elements = outcome.quality.element_count,
            tets = outcome.quality.tet_count,
            min_quality = outcome.quality.min_quality,
            "Volume meshing finished"
        );
        Ok(outcome)
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}
