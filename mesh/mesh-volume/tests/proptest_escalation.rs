//! Property-based tests for the retry controller.
//!
//! Run with: cargo test -p mesh-volume -- proptest

use hashbrown::HashSet;
use mesh_types::{box_row_boundary, unit_cube_boundary, OpenFront, VolumeMesh};
use mesh_volume::{MeshingParams, PassState, RuleSet, SubdomainController, VolumeError};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_params() -> impl Strategy<Value = MeshingParams> {
    (1u32..40, 1u32..12).prop_map(|(tolerance, outer)| {
        MeshingParams::default()
            .with_give_up_tolerance(tolerance)
            .with_max_outer_steps(outer)
            .with_delaunay(false)
    })
}

fn inside_out_cube() -> VolumeMesh {
    let mut mesh = unit_cube_boundary();
    for se in &mut mesh.surface_elements {
        se.face = se.face.reversed();
    }
    mesh
}

fn assert_no_duplicates(mesh: &VolumeMesh) {
    let mut seen = HashSet::new();
    for el in mesh.volume_elements.iter().filter(|el| !el.deleted) {
        assert!(seen.insert(el.sorted_vertices()), "duplicate element {el:?}");
    }
}

// =============================================================================
// Tolerance Schedule
// =============================================================================

proptest! {
    #[test]
    fn proptest_tolerance_never_decreases(params in arb_params(), attempt in 1u32..50) {
        prop_assert!(params.give_up_tolerance_for(attempt + 1) >= params.give_up_tolerance_for(attempt));
        prop_assert!(params.give_up_tolerance_for(attempt) > params.give_up_tolerance);
    }
}

// =============================================================================
// Controller
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn proptest_short_passes_still_converge(steps in 1usize..9) {
        let mut mesh = unit_cube_boundary();
        let rules = RuleSet::standard();
        let params = MeshingParams::default()
            .with_delaunay(false)
            .with_max_rule_steps(steps);
        let report = SubdomainController::new(&rules, &params)
            .mesh_subdomain(&mut mesh, 1)
            .unwrap();

        prop_assert_eq!(report.state, PassState::Converged);
        prop_assert_eq!(report.attempts as usize, 6usize.div_ceil(steps));
        prop_assert_eq!(report.escalations + 1, report.attempts);
        prop_assert!(report.tolerances.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(report.attempts <= params.max_outer_steps);
        prop_assert!(OpenFront::compute(&mesh, 1).is_empty());
        assert_no_duplicates(&mesh);
    }

    #[test]
    fn proptest_attempts_stop_at_the_ceiling(params in arb_params()) {
        let mut mesh = inside_out_cube();
        let rules = RuleSet::standard();
        let err = SubdomainController::new(&rules, &params)
            .mesh_subdomain(&mut mesh, 1)
            .unwrap_err();

        match err {
            VolumeError::GivenUp { domain, attempts, open_faces } => {
                prop_assert_eq!(domain, 1);
                prop_assert_eq!(attempts, params.max_outer_steps);
                prop_assert_eq!(open_faces, 12);
            }
            other => prop_assert!(false, "unexpected error {other}"),
        }
        prop_assert_eq!(mesh.volume_element_count(), 0);
    }

    #[test]
    fn proptest_rows_are_tagged_per_subdomain(n in 1usize..5) {
        let mut mesh = box_row_boundary(n);
        let rules = RuleSet::standard();
        let params = MeshingParams::default().with_delaunay(false);
        let controller = SubdomainController::new(&rules, &params);

        for k in 1..=mesh.domain_count() {
            let before = mesh.volume_elements.len();
            let report = controller.mesh_subdomain(&mut mesh, k).unwrap();
            prop_assert!(report.converged());
            prop_assert!(mesh.volume_elements[before..].iter().all(|el| el.domain == k));
        }
        for k in 1..=mesh.domain_count() {
            prop_assert!(OpenFront::compute(&mesh, k).is_empty());
            prop_assert!((mesh.total_volume(k) - 1.0).abs() < 1e-9);
        }
        assert_no_duplicates(&mesh);
    }
}
