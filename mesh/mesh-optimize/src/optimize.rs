//! The optimization driver.

use mesh_types::{CancelFlag, VolumeMesh};
use tracing::{debug, info};

use crate::ops::{
    combine_improve, smooth_improve, split_improve, swap2_improve, swap_improve, Goal,
};
use crate::params::{Operator, OptimizeParams};

/// Counts of applied moves per operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Completed rounds.
    pub rounds: u32,
    /// Edge collapses.
    pub combined: usize,
    /// Edge splits.
    pub split: usize,
    /// 3-to-2 swaps.
    pub swapped: usize,
    /// 2-to-3 swaps.
    pub swapped2: usize,
    /// Vertex relocations.
    pub smoothed: usize,
    /// Elements dropped by compaction.
    pub removed_elements: usize,
    /// Stopped early by a cancel request.
    pub cancelled: bool,
}

impl OptimizeReport {
    /// Total number of applied moves.
    #[must_use]
    pub const fn total_moves(&self) -> usize {
        self.combined + self.split + self.swapped + self.swapped2 + self.smoothed
    }

    fn record(&mut self, op: Operator, applied: usize) {
        match op {
            Operator::Combine => self.combined += applied,
            Operator::Split => self.split += applied,
            Operator::Swap => self.swapped += applied,
            Operator::Swap2 => self.swapped2 += applied,
            Operator::Smooth => self.smoothed += applied,
        }
    }
}

impl std::fmt::Display for OptimizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Optimize: {} rounds, {} collapses, {} splits, {} swaps, {} swap2s, {} smoothed",
            self.rounds, self.combined, self.split, self.swapped, self.swapped2, self.smoothed
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Run one operator over the whole mesh.
///
/// Returns the number of applied moves.
pub fn apply_operator(mesh: &mut VolumeMesh, op: Operator, goal: Goal, error_power: f64) -> usize {
    match op {
        Operator::Combine => combine_improve(mesh, goal, error_power),
        Operator::Split => split_improve(mesh, goal, error_power),
        Operator::Swap => swap_improve(mesh, goal, error_power),
        Operator::Swap2 => swap2_improve(mesh, goal, error_power),
        Operator::Smooth => smooth_improve(mesh, goal, error_power),
    }
}

/// Improve element quality by running `params.steps` rounds of the
/// operator sequence.
///
/// Only tetrahedra are modified, and moves stay within one domain. Surface
/// element edges and faces are kept, as are boundary and locked vertices.
/// Deleted elements are compacted away after every round.
///
/// The cancel flag is polled before every operator; on cancellation the
/// mesh is left compacted and valid.
///
/// # Example
///
/// ```
/// use mesh_optimize::{optimize_volume, OptimizeParams};
/// use mesh_types::{unit_cube_boundary, VolumeElement};
///
/// let mut mesh = unit_cube_boundary();
/// for t in [[0, 1, 2, 6], [0, 2, 3, 6], [0, 3, 7, 6], [0, 7, 4, 6], [0, 4, 5, 6], [0, 5, 1, 6]] {
///     mesh.add_volume_element(VolumeElement::tetrahedron(t).with_domain(1)).unwrap();
/// }
/// let report = optimize_volume(&mut mesh, &OptimizeParams::default(), None);
/// // Every vertex lies on the boundary, so nothing can change
/// assert_eq!(report.total_moves(), 0);
/// assert_eq!(report.rounds, 3);
/// ```
pub fn optimize_volume(
    mesh: &mut VolumeMesh,
    params: &OptimizeParams,
    cancel: Option<&CancelFlag>,
) -> OptimizeReport {
    let mut report = OptimizeReport::default();
    info!(
        steps = params.steps,
        operators = params.operators.len(),
        elements = mesh.volume_element_count(),
        "Optimizing volume mesh"
    );

    'rounds: for round in 0..params.steps {
        for &op in &params.operators {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                report.cancelled = true;
                break 'rounds;
            }
            let applied = apply_operator(mesh, op, Goal::Quality, params.error_power);
            report.record(op, applied);
        }
        report.removed_elements += mesh.compact_volume_elements();
        report.rounds += 1;
        debug!(round, moves = report.total_moves(), "Optimization round finished");
    }
    report.removed_elements += mesh.compact_volume_elements();

    info!(
        rounds = report.rounds,
        moves = report.total_moves(),
        elements = mesh.volume_element_count(),
        cancelled = report.cancelled,
        "Optimization complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{unit_cube_boundary, OpenFront, Point3, VolumeElement};

    fn star_cube(centre: Point3<f64>) -> VolumeMesh {
        let mut mesh = unit_cube_boundary();
        let c = mesh.add_point(centre);
        for se in mesh.surface_elements.clone() {
            let v = se.face.vertices();
            mesh.add_volume_element(VolumeElement::tetrahedron([v[0], v[2], v[1], c]).with_domain(1))
                .unwrap();
        }
        mesh
    }

    #[test]
    fn optimization_keeps_mesh_valid() {
        let mut mesh = star_cube(Point3::new(0.7, 0.4, 0.6));
        let report = optimize_volume(&mut mesh, &OptimizeParams::default(), None);
        assert!(report.total_moves() > 0);
        assert!(OpenFront::compute(&mesh, 1).is_empty());
        assert_relative_eq!(mesh.total_volume(1), 1.0, epsilon = 1e-12);
        for el in &mesh.volume_elements {
            assert!(!el.deleted);
            assert!(mesh.element_volume(el) > 0.0);
        }
    }

    #[test]
    fn cancelled_before_start() {
        let mut mesh = star_cube(Point3::new(0.7, 0.4, 0.6));
        let flag = CancelFlag::new();
        flag.cancel();
        let report = optimize_volume(&mut mesh, &OptimizeParams::default(), Some(&flag));
        assert!(report.cancelled);
        assert_eq!(report.rounds, 0);
        assert_eq!(report.total_moves(), 0);
        assert!(report.to_string().ends_with("(cancelled)"));
    }

    #[test]
    fn empty_operator_string_does_nothing() {
        let mut mesh = star_cube(Point3::new(0.7, 0.4, 0.6));
        let params = OptimizeParams::from_operator_string("").unwrap();
        let report = optimize_volume(&mut mesh, &params, None);
        assert_eq!(report.total_moves(), 0);
        assert_eq!(report.rounds, params.steps);
    }
}
