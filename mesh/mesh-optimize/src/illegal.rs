//! Detection and removal of illegal volume elements.
//!
//! An element is illegal if it is inverted or flat, repeats a vertex, or
//! has a face that is overused: shared by more than two volume elements, or
//! by two elements of the same domain where a surface element lies.

use hashbrown::{HashMap, HashSet};
use mesh_types::geometry::MIN_QUALITY;
use mesh_types::{FaceKey, VolumeMesh};
use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::ops::{split_improve, swap2_improve, swap_improve, Goal};

/// Badness exponent used while repairing.
const REPAIR_ERROR_POWER: f64 = 2.0;

fn overused_faces(mesh: &VolumeMesh) -> HashSet<FaceKey> {
    let mut users: HashMap<FaceKey, SmallVec<[u32; 2]>> = HashMap::new();
    for el in mesh.volume_elements.iter().filter(|el| !el.deleted) {
        for face in el.outward_faces() {
            users.entry(face.key()).or_default().push(el.domain);
        }
    }
    let boundary: HashSet<FaceKey> = mesh
        .surface_elements
        .iter()
        .filter(|se| !se.deleted)
        .map(|se| se.face.key())
        .collect();

    users
        .into_iter()
        .filter(|(key, domains)| {
            domains.len() > 2
                || (boundary.contains(key)
                    && domains.len() == 2
                    && domains[0] == domains[1])
        })
        .map(|(key, _)| key)
        .collect()
}

/// Illegal flag for every volume element, `false` for deleted ones.
///
/// Read-only, evaluated in parallel.
#[must_use]
pub fn illegal_flags(mesh: &VolumeMesh) -> Vec<bool> {
    let overused = overused_faces(mesh);
    mesh.volume_elements
        .par_iter()
        .map(|el| {
            !el.deleted
                && (el.has_repeated_vertices()
                    || mesh.element_quality(el) <= MIN_QUALITY
                    || el
                        .outward_faces()
                        .iter()
                        .any(|face| overused.contains(&face.key())))
        })
        .collect()
}

/// Set the `illegal` flag of every volume element.
///
/// Returns the number of illegal elements.
///
/// # Example
///
/// ```
/// use mesh_optimize::mark_illegal_elements;
/// use mesh_types::{unit_cube_boundary, VolumeElement};
///
/// let mut mesh = unit_cube_boundary();
/// // Inverted tetrahedron
/// mesh.add_volume_element(VolumeElement::tetrahedron([0, 2, 1, 6]).with_domain(1))
///     .unwrap();
/// assert_eq!(mark_illegal_elements(&mut mesh), 1);
/// assert!(mesh.volume_elements[0].illegal);
/// ```
pub fn mark_illegal_elements(mesh: &mut VolumeMesh) -> usize {
    let flags = illegal_flags(mesh);
    let mut count = 0;
    for (el, illegal) in mesh.volume_elements.iter_mut().zip(flags) {
        el.illegal = illegal;
        count += usize::from(illegal);
    }
    count
}

/// Outcome of [`remove_illegal_elements`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Illegal elements before the first iteration.
    pub initial: usize,
    /// Illegal elements left when the loop stopped.
    pub residual: usize,
    /// Iterations run.
    pub iterations: u32,
}

impl RepairReport {
    /// True if no illegal element is left.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.residual == 0
    }
}

impl std::fmt::Display for RepairReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repair: {} → {} illegal elements ({} iterations)",
            self.initial, self.residual, self.iterations
        )
    }
}

/// Repair illegal elements with legal-only split and swap moves.
///
/// Each iteration runs split, swap and swap2, re-marking after each. The
/// loop stops once nothing is illegal or after `cap` iterations without a
/// drop in the illegal count; every drop restores the full budget. Elements
/// removed by swaps are compacted away before returning.
///
/// A nonzero [`RepairReport::residual`] is logged as a warning and is not
/// an error.
pub fn remove_illegal_elements(mesh: &mut VolumeMesh, cap: u32) -> RepairReport {
    let initial = mark_illegal_elements(mesh);
    let mut report = RepairReport {
        initial,
        residual: initial,
        iterations: 0,
    };
    if initial == 0 {
        return report;
    }
    info!(illegal = initial, cap, "Repairing illegal elements");

    let mut count = initial;
    let mut budget = cap;
    while count > 0 && budget > 0 {
        budget -= 1;
        report.iterations += 1;
        let before = count;

        for step in [split_improve, swap_improve, swap2_improve] {
            step(mesh, Goal::Legal, REPAIR_ERROR_POWER);
            count = mark_illegal_elements(mesh);
        }
        debug!(iteration = report.iterations, before, after = count, "Repair iteration");
        if count < before {
            budget = cap;
        }
    }

    mesh.compact_volume_elements();
    report.residual = mark_illegal_elements(mesh);
    if report.residual > 0 {
        warn!(
            residual = report.residual,
            iterations = report.iterations,
            "Illegal elements remain after repair"
        );
    }
    report
}
