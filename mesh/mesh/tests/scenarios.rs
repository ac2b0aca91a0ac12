//! End-to-end meshing scenarios.
//!
//! Each test drives a full [`VolumeMesher`] run over a small boundary and
//! checks the outcome, the error or the state the mesh is left in.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::uninlined_format_args)]

use approx::assert_relative_eq;
use hashbrown::HashSet;
use mesh::prelude::*;
use mesh::types::{ElementKind, OUTSIDE};
use mesh::volume::PassState;
use std::time::{Duration, Instant};

fn assert_no_duplicates(mesh: &VolumeMesh) {
    let mut seen = HashSet::new();
    for el in mesh.volume_elements.iter().filter(|el| !el.deleted) {
        assert!(seen.insert(el.sorted_vertices()), "duplicate element {:?}", el);
    }
}

fn inside_out_cube() -> VolumeMesh {
    let mut mesh = unit_cube_boundary();
    for se in &mut mesh.surface_elements {
        se.face = se.face.reversed();
    }
    mesh
}

/// The unit cube with a closed double-sided sliver poking through its top.
fn pierced_cube() -> VolumeMesh {
    let mut mesh = unit_cube_boundary();
    let a = mesh.add_point(Point3::new(0.5, 0.2, 0.5));
    let b = mesh.add_point(Point3::new(0.5, 0.8, 0.5));
    let c = mesh.add_point(Point3::new(0.5, 0.5, 1.5));
    mesh.surface_elements
        .push(SurfaceElement::new(Face::triangle(a, b, c), 1, OUTSIDE));
    mesh.surface_elements
        .push(SurfaceElement::new(Face::triangle(a, c, b), 1, OUTSIDE));
    mesh
}

// =============================================================================
// Convergence
// =============================================================================

#[test]
fn cube_converges_in_one_pass() {
    let mut mesh = unit_cube_boundary();
    let rules = RuleSet::standard();
    let params = MeshingParams::default().with_delaunay(false);

    let result = VolumeMesher::new(&rules, params).run(&mut mesh);
    assert_eq!(RunStatus::of(&result), RunStatus::Ok);
    let outcome = result.unwrap();

    let report = &outcome.subdomains[0];
    assert_eq!(report.state, PassState::Converged);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.escalations, 0);
    assert!(report.delaunay.is_none());

    let tets = mesh
        .elements_in_domain(1)
        .filter(|el| el.kind == ElementKind::Tetrahedron)
        .count();
    assert!(tets >= 5, "only {} tetrahedra", tets);
    assert_relative_eq!(mesh.total_volume(1), 1.0, epsilon = 1e-9);
    assert!(OpenFront::compute(&mesh, 1).is_empty());
    assert_eq!(outcome.quality.illegal_count, 0);
    assert_no_duplicates(&mesh);
}

#[test]
fn cube_with_delaunay_still_converges() {
    let mut mesh = unit_cube_boundary();
    let rules = RuleSet::standard();
    let outcome = VolumeMesher::new(&rules, MeshingParams::default())
        .run(&mut mesh)
        .unwrap();

    assert!(outcome.is_completed());
    assert!(outcome.subdomains[0].delaunay.is_some());
    assert_relative_eq!(mesh.total_volume(1), 1.0, epsilon = 1e-9);
    assert!(OpenFront::compute(&mesh, 1).is_empty());
    assert_no_duplicates(&mesh);
}

#[test]
fn row_elements_keep_their_subdomain() {
    let mut mesh = box_row_boundary(4);
    let rules = RuleSet::standard();
    let outcome = VolumeMesher::new(&rules, MeshingParams::default().with_delaunay(false))
        .run(&mut mesh)
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.subdomains.len(), 4);
    for k in 1..=4 {
        assert!(OpenFront::compute(&mesh, k).is_empty(), "subdomain {} open", k);
        assert_relative_eq!(mesh.total_volume(k), 1.0, epsilon = 1e-9);
    }
    assert!(mesh
        .volume_elements
        .iter()
        .filter(|el| !el.deleted)
        .all(|el| (1..=4).contains(&el.domain)));
    assert_no_duplicates(&mesh);
}

/// Runs the whole pipeline and checks the subdomain is closed with `volume`.
fn assert_fills(mut mesh: VolumeMesh, delaunay: bool, volume: f64) -> MeshingOutcome {
    let rules = RuleSet::standard();
    let params = MeshingParams::default().with_delaunay(delaunay);
    let outcome = VolumeMesher::new(&rules, params)
        .run(&mut mesh)
        .unwrap_or_else(|err| panic!("delaunay {}: {}", delaunay, err));

    assert!(outcome.is_completed());
    assert!(OpenFront::compute(&mesh, 1).is_empty(), "delaunay {}", delaunay);
    assert_relative_eq!(mesh.total_volume(1), volume, epsilon = 1e-9);
    assert_eq!(outcome.quality.illegal_count, 0);
    assert_no_duplicates(&mesh);
    outcome
}

#[test]
fn subdivided_boxes_fill() {
    for n in [3, 4] {
        for delaunay in [false, true] {
            assert_fills(subdivided_box_boundary(n, 1.0), delaunay, 1.0);
        }
    }
}

#[test]
fn default_params_fill_grid_boxes() {
    let rules = RuleSet::standard();
    for n in [3, 4] {
        let mut mesh = subdivided_box_boundary(n, 1.0);
        let start = Instant::now();
        let outcome = VolumeMesher::new(&rules, MeshingParams::default())
            .run(&mut mesh)
            .unwrap_or_else(|err| panic!("n = {}: {}", n, err));
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_secs(30), "n = {} took {:?}", n, elapsed);
        assert!(outcome.is_completed());
        let report = &outcome.subdomains[0];
        let delaunay = report.delaunay.as_ref().expect("delaunay runs by default");
        assert!(delaunay.elements_added > 0);
        assert!(OpenFront::compute(&mesh, 1).is_empty(), "n = {}", n);
        assert_relative_eq!(mesh.total_volume(1), 1.0, epsilon = 1e-9);
        assert_eq!(outcome.quality.illegal_count, 0);
        assert_no_duplicates(&mesh);
    }
}

#[test]
fn l_shape_fills() {
    for delaunay in [false, true] {
        assert_fills(l_shape_boundary(), delaunay, 3.0);
    }
}

#[test]
fn stalled_first_attempt_converges_later() {
    let outcome = assert_fills(subdivided_box_boundary(3, 1.0), false, 1.0);
    let report = &outcome.subdomains[0];

    assert!(report.attempts > 1);
    assert!(report.escalations > 0);
    assert!(report.elements_removed > 0);
    assert_eq!(report.tolerances[0], 25);
    assert!(report.tolerances.windows(2).all(|w| w[0] < w[1]));
}

// =============================================================================
// Fatal Errors
// =============================================================================

/// The unit cube with an inverted copy of one of its faces.
fn doubled_face_cube() -> VolumeMesh {
    let mut mesh = unit_cube_boundary();
    let copy = mesh.surface_elements[0].face.reversed();
    mesh.surface_elements.push(SurfaceElement::new(copy, 1, OUTSIDE));
    mesh
}

#[test]
fn overlapping_boundary_fails_before_meshing() {
    let rules = RuleSet::standard();
    for mut mesh in [doubled_face_cube(), pierced_cube()] {
        let result = VolumeMesher::new(&rules, MeshingParams::default()).run(&mut mesh);

        assert_eq!(RunStatus::of(&result), RunStatus::Fatal);
        let err = result.unwrap_err();
        assert!(matches!(err, VolumeError::InconsistentBoundary(_)));
        assert_eq!(err.domain(), Some(1));
        assert!(err.is_fatal());
        assert!(mesh.volume_elements.is_empty());
    }
}

#[test]
fn inside_out_boundary_gives_up() {
    let mut mesh = inside_out_cube();
    let rules = RuleSet::standard();
    let params = MeshingParams::default()
        .with_delaunay(false)
        .with_max_outer_steps(1);

    let result = VolumeMesher::new(&rules, params).run(&mut mesh);
    assert_eq!(RunStatus::of(&result), RunStatus::GivenUp);
    match result.unwrap_err() {
        VolumeError::GivenUp {
            domain,
            attempts,
            open_faces,
        } => {
            assert_eq!(domain, 1);
            assert_eq!(attempts, 1);
            assert_eq!(open_faces, 12);
        }
        other => panic!("unexpected error {}", other),
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn cancel_after_first_subdomain_leaves_the_rest_untouched() {
    let mut mesh = box_row_boundary(3);
    let rules = RuleSet::standard();
    let flag = CancelFlag::new();
    let trigger = flag.clone();

    let result = VolumeMesher::new(&rules, MeshingParams::default().with_delaunay(false))
        .with_cancel_flag(flag)
        .on_subdomain_meshed(move |report| {
            if report.domain == 1 {
                trigger.cancel();
            }
        })
        .run(&mut mesh);

    assert_eq!(RunStatus::of(&result), RunStatus::Aborted);
    let outcome = result.unwrap();
    assert_eq!(outcome.status, MeshingStatus::Aborted);
    assert_eq!(outcome.subdomains.len(), 1);
    assert!(outcome.subdomains[0].converged());

    assert!(OpenFront::compute(&mesh, 1).is_empty());
    assert!(mesh.elements_in_domain(1).count() > 0);
    for k in 2..=3 {
        assert_eq!(mesh.elements_in_domain(k).count(), 0);
        assert_eq!(OpenFront::compute(&mesh, k).len(), 12);
    }
    // The optimizer never ran
    assert_eq!(outcome.optimize.rounds, 0);
}

// =============================================================================
// Boundary Validation
// =============================================================================

#[test]
fn validation_is_idempotent() {
    let mesh = box_row_boundary(3);
    let options = ValidationOptions::default();
    let first = validate_all(&mesh, &options).unwrap();
    let second = validate_all(&mesh, &options).unwrap();
    assert_eq!(first, second);

    let broken = pierced_cube();
    let a = validate_all(&broken, &options).unwrap_err();
    let b = validate_all(&broken, &options).unwrap_err();
    assert_eq!(a, b);
}

#[test]
fn overlap_check_can_be_disabled() {
    let mesh = pierced_cube();
    let err = validate_all(&mesh, &ValidationOptions::default().with_overlap_check(false))
        .unwrap_err();
    // The sliver pair is still a duplicate face
    assert!(err.to_string().contains("duplicate faces"));
    assert!(!err.to_string().contains("overlapping"));
}
