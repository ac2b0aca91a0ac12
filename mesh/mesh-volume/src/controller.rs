//! Per-subdomain retry controller.
//!
//! Runs the quad stages, the optional Delaunay fill and then tetrahedral
//! passes with a growing give-up tolerance until the front of the
//! subdomain is empty or the attempt ceiling is hit. The front is rebuilt
//! from the store before every pass.
//!
//! When a pass stalls, the tetrahedra of the subdomain that touch a corner
//! of a face still open are deleted before the next attempt. Elements of the
//! quad stages are never deleted.

use hashbrown::HashSet;
use mesh_types::{CancelFlag, OpenFront, VolumeMesh};
use tracing::{debug, info, warn};

use crate::delaunay::{delaunay_fill, DelaunayStats};
use crate::error::{VolumeError, VolumeResult};
use crate::local::{LocalMesher, PassConfig, PassInput, PassStats};
use crate::params::MeshingParams;
use crate::rules::{RuleSet, RuleStage};
use crate::status::PassState;

/// Search levels of the two quad sweeps; the second one widens the radius.
const QUAD_SWEEP_LEVELS: [u32; 2] = [0, 1];

/// What happened to one subdomain.
#[derive(Debug, Clone, PartialEq)]
pub struct SubdomainReport {
    /// Subdomain index.
    pub domain: u32,
    /// Final state: converged or aborted.
    pub state: PassState,
    /// Tetrahedral attempts made.
    pub attempts: u32,
    /// Attempts that started with a raised search level.
    pub escalations: u32,
    /// Give-up tolerance of every attempt, in order.
    pub tolerances: Vec<u32>,
    /// Elements added by the prism and pyramid stages.
    pub transition_elements: usize,
    /// Result of the Delaunay fill, if it ran.
    pub delaunay: Option<DelaunayStats>,
    /// Tetrahedra deleted around stalled faces.
    pub elements_removed: usize,
    /// Tetrahedral passes stopped because the front outgrew its limit.
    pub front_overflows: u32,
    /// Volume elements added for this subdomain.
    pub elements_created: usize,
    /// Points added for this subdomain.
    pub points_created: usize,
}

impl SubdomainReport {
    fn new(domain: u32) -> Self {
        Self {
            domain,
            state: PassState::Advancing,
            attempts: 0,
            escalations: 0,
            tolerances: Vec::new(),
            transition_elements: 0,
            delaunay: None,
            elements_removed: 0,
            front_overflows: 0,
            elements_created: 0,
            points_created: 0,
        }
    }

    /// True if the subdomain front was closed.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.state == PassState::Converged
    }

    fn enter(&mut self, state: PassState) {
        if self.state != state {
            debug!(
                domain = self.domain,
                attempt = self.attempts,
                from = %self.state,
                to = %state,
                "Controller state change"
            );
            self.state = state;
        }
    }

    fn finish(mut self, mesh: &VolumeMesh, first_element: usize, first_point: usize) -> Self {
        self.elements_created = mesh
            .volume_elements
            .iter()
            .skip(first_element)
            .filter(|el| !el.deleted && el.domain == self.domain)
            .count();
        self.points_created = mesh.point_count() - first_point;
        info!(
            domain = self.domain,
            state = %self.state,
            attempts = self.attempts,
            elements = self.elements_created,
            points = self.points_created,
            removed = self.elements_removed,
            "Subdomain finished"
        );
        self
    }
}

impl std::fmt::Display for SubdomainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Subdomain {}: {} after {} attempts ({} escalations), {} elements, {} points",
            self.domain,
            self.state,
            self.attempts,
            self.escalations,
            self.elements_created,
            self.points_created
        )
    }
}

/// Drives the passes of one subdomain.
///
/// # Example
///
/// ```
/// use mesh_types::{unit_cube_boundary, OpenFront};
/// use mesh_volume::{MeshingParams, PassState, RuleSet, SubdomainController};
///
/// let mut mesh = unit_cube_boundary();
/// let rules = RuleSet::standard();
/// let params = MeshingParams::default().with_delaunay(false);
///
/// let report = SubdomainController::new(&rules, &params)
///     .mesh_subdomain(&mut mesh, 1)
///     .unwrap();
/// assert_eq!(report.state, PassState::Converged);
/// assert_eq!(report.attempts, 1);
/// assert!(OpenFront::compute(&mesh, 1).is_empty());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SubdomainController<'a> {
    rules: &'a RuleSet,
    params: &'a MeshingParams,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> SubdomainController<'a> {
    /// Create a controller.
    #[must_use]
    pub const fn new(rules: &'a RuleSet, params: &'a MeshingParams) -> Self {
        Self {
            rules,
            params,
            cancel: None,
        }
    }

    /// Poll `flag` before every pass.
    #[must_use]
    pub const fn with_cancel_flag(mut self, flag: &'a CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Fill subdomain `k`.
    ///
    /// A cancel request ends the run with [`PassState::Aborted`] and no
    /// error. Elements committed before that stay in the mesh.
    ///
    /// # Errors
    ///
    /// - [`VolumeError::OpenQuads`] if the quad stages leave quads open
    /// - [`VolumeError::GivenUp`] if the front is still open after
    ///   `max_outer_steps` attempts
    /// - [`VolumeError::Mesh`] if an element cannot be stored
    pub fn mesh_subdomain(&self, mesh: &mut VolumeMesh, k: u32) -> VolumeResult<SubdomainReport> {
        let first_element = mesh.volume_elements.len();
        let first_point = mesh.point_count();
        let mut report = SubdomainReport::new(k);
        info!(domain = k, faces = OpenFront::compute(mesh, k).len(), "Meshing subdomain");

        self.run_quad_stages(mesh, k, &mut report)?;
        if report.state == PassState::Aborted {
            return Ok(report.finish(mesh, first_element, first_point));
        }
        let first_tet = mesh.volume_elements.len();

        if self.params.delaunay_enabled {
            if self.cancelled() {
                report.enter(PassState::Aborted);
                return Ok(report.finish(mesh, first_element, first_point));
            }
            let front = OpenFront::compute(mesh, k);
            if !front.is_empty() {
                let from = mesh.volume_elements.len();
                let bounds = mesh.domain_bounds(k);
                let stats = delaunay_fill(mesh, front.faces(), &bounds)?;
                mesh.tag_new_elements(from, k);
                report.delaunay = Some(stats);
            }
        }

        let mut level = self.params.initial_search_level;
        let mut stalled = false;
        loop {
            if self.cancelled() {
                report.enter(PassState::Aborted);
                break;
            }
            let front = OpenFront::compute(mesh, k);
            if front.is_empty() {
                report.enter(PassState::Converged);
                break;
            }
            if report.attempts > 0 {
                report.enter(PassState::Stalled);
            }
            if report.attempts >= self.params.max_outer_steps {
                report.enter(PassState::GivenUp);
                warn!(
                    domain = k,
                    attempts = report.attempts,
                    open_faces = front.len(),
                    "Giving up on subdomain"
                );
                return Err(VolumeError::GivenUp {
                    domain: k,
                    attempts: report.attempts,
                    open_faces: front.len(),
                });
            }

            if stalled && self.params.remove_problem_regions {
                let removed = remove_problem_region(mesh, k, first_tet, &front);
                report.elements_removed += removed;
                debug!(
                    domain = k,
                    attempt = report.attempts,
                    open_faces = front.len(),
                    removed,
                    "Removed elements around stalled faces"
                );
            }

            report.attempts += 1;
            if report.attempts > 1 {
                report.enter(PassState::Escalating);
                level += 1;
                report.escalations += 1;
            }
            let tolerance = self.params.give_up_tolerance_for(report.attempts);
            report.tolerances.push(tolerance);
            report.enter(PassState::Advancing);

            let stats = self.run_pass(
                mesh,
                k,
                RuleStage::Tetrahedral,
                PassConfig {
                    give_up_tolerance: tolerance,
                    search_level: level,
                    max_steps: self.params.max_rule_steps,
                    target_size: self.params.max_h_for(k),
                    max_open_faces: self.params.front_limit(front.len()),
                },
            )?;
            if stats.front_overflow {
                report.front_overflows += 1;
                warn!(
                    domain = k,
                    attempt = report.attempts,
                    open_faces = stats.faces_open,
                    started_from = front.len(),
                    "Front outgrew its limit, pass stopped"
                );
            }
            // A pass cut short by the step budget has not stalled
            stalled = stats.front_overflow || stats.steps < self.params.max_rule_steps;
            debug!(
                domain = k,
                attempt = report.attempts,
                tolerance,
                level,
                elements = stats.elements_added,
                open = stats.faces_open,
                "Tetrahedral pass"
            );
        }

        Ok(report.finish(mesh, first_element, first_point))
    }

    /// Prism and pyramid stages, twice, while quads are open.
    fn run_quad_stages(
        &self,
        mesh: &mut VolumeMesh,
        k: u32,
        report: &mut SubdomainReport,
    ) -> VolumeResult<()> {
        if !OpenFront::compute(mesh, k).has_quads() {
            return Ok(());
        }
        let from = mesh.volume_elements.len();
        'sweeps: for level in QUAD_SWEEP_LEVELS {
            for stage in RuleStage::QUAD_STAGES {
                if self.cancelled() {
                    report.enter(PassState::Aborted);
                    return Ok(());
                }
                if !OpenFront::compute(mesh, k).has_quads() {
                    break 'sweeps;
                }
                let stats = self.run_pass(
                    mesh,
                    k,
                    stage,
                    PassConfig {
                        give_up_tolerance: self.params.quad_give_up_tolerance,
                        search_level: level,
                        max_steps: self.params.max_rule_steps,
                        target_size: self.params.max_h_for(k),
                        max_open_faces: usize::MAX,
                    },
                )?;
                debug!(
                    domain = k,
                    stage = stage.name(),
                    level,
                    elements = stats.elements_added,
                    "Transition stage"
                );
            }
        }
        report.transition_elements = mesh.volume_elements.len() - from;

        let count = OpenFront::compute(mesh, k).quad_count();
        if count > 0 {
            warn!(domain = k, count, "Open quads left after transition stages");
            return Err(VolumeError::OpenQuads { domain: k, count });
        }
        Ok(())
    }

    /// One local mesher pass; new elements are tagged `k`.
    fn run_pass(
        &self,
        mesh: &mut VolumeMesh,
        k: u32,
        stage: RuleStage,
        config: PassConfig,
    ) -> VolumeResult<PassStats> {
        let from = mesh.volume_elements.len();
        let input = PassInput::for_domain(mesh, k);
        let stats = LocalMesher::new(self.rules.table(stage)).run(mesh, &input, &config)?;
        mesh.tag_new_elements(from, k);
        Ok(stats)
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelFlag::is_cancelled)
    }
}

/// Delete the tetrahedra of `k` from index `from` on that use a corner of
/// an open face, reopening the cavity around the faces a pass gave up on.
fn remove_problem_region(mesh: &mut VolumeMesh, k: u32, from: usize, front: &OpenFront) -> usize {
    let corners: HashSet<u32> = front
        .faces()
        .iter()
        .flat_map(|face| face.vertices().iter().copied())
        .collect();
    mesh.remove_tets_touching(from, k, &corners)
}
