//! Subdomain boundary validation.
//!
//! Before a subdomain is filled, its bounding surface has to enclose a
//! volume: no face may appear twice, no two faces may overlap, and the open
//! front must be a closed, consistently oriented manifold.

use hashbrown::HashSet;
use mesh_types::intersect::triangles_conflict;
use mesh_types::{geometry, Aabb, Face, OpenFront, VolumeMesh};
use tracing::{debug, warn};

use crate::adjacency::EdgeAdjacency;
use crate::error::{BoundaryError, BoundaryResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Options for boundary validation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValidationOptions {
    /// Test every pair of boundary faces for geometric overlap.
    ///
    /// Quadratic in the number of faces of the subdomain.
    pub check_overlaps: bool,
    /// Require each front edge to be used once in each direction.
    pub check_orientation: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_overlaps: true,
            check_orientation: true,
        }
    }
}

impl ValidationOptions {
    /// Only the combinatorial checks, no pairwise geometry.
    #[must_use]
    pub const fn topology_only() -> Self {
        Self {
            check_overlaps: false,
            check_orientation: true,
        }
    }

    /// Enable or disable the overlap test.
    #[must_use]
    pub const fn with_overlap_check(mut self, enabled: bool) -> Self {
        self.check_overlaps = enabled;
        self
    }
}

/// Result of validating the boundary of one subdomain.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundaryReport {
    /// Subdomain checked.
    pub domain: u32,
    /// Boundary faces of the subdomain.
    pub face_count: usize,
    /// Faces on the recomputed open front.
    pub front_face_count: usize,
    /// Distinct edges on the open front.
    pub edge_count: usize,

    /// Faces whose corner set was already seen.
    pub duplicate_face_count: usize,
    /// Pairs of boundary triangles that overlap or cross.
    pub overlapping_pair_count: usize,
    /// Front edges used by a single face.
    pub open_edge_count: usize,
    /// Front edges used by more than two faces.
    pub non_manifold_edge_count: usize,
    /// Two-face front edges traversed twice in the same direction.
    pub orientation_error_count: usize,
    /// Faces whose two sides carry the same subdomain tag.
    pub tag_error_count: usize,

    /// Volume enclosed by the open front, negative if it is inside-out.
    pub enclosed_volume: f64,
}

impl BoundaryReport {
    /// True if the subdomain can be meshed.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.issue_count() == 0
    }

    /// Total number of defects found.
    #[must_use]
    pub const fn issue_count(&self) -> usize {
        self.duplicate_face_count
            + self.overlapping_pair_count
            + self.open_edge_count
            + self.non_manifold_edge_count
            + self.orientation_error_count
            + self.tag_error_count
    }

    /// True if the front encloses negative volume.
    #[must_use]
    pub fn is_inside_out(&self) -> bool {
        self.enclosed_volume < 0.0
    }

    fn details(&self) -> String {
        let mut parts = Vec::new();
        let checks = [
            (self.duplicate_face_count, "duplicate faces"),
            (self.overlapping_pair_count, "overlapping face pairs"),
            (self.open_edge_count, "open edges"),
            (self.non_manifold_edge_count, "non-manifold edges"),
            (self.orientation_error_count, "inconsistently oriented edges"),
            (self.tag_error_count, "faces with equal domain tags"),
        ];
        for (count, label) in checks {
            if count > 0 {
                parts.push(format!("{count} {label}"));
            }
        }
        parts.join(", ")
    }
}

impl std::fmt::Display for BoundaryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Boundary Report (subdomain {}):", self.domain)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Front faces: {}", self.front_face_count)?;
        writeln!(f, "  Edges: {}", self.edge_count)?;
        writeln!(f, "  Enclosed volume: {:.6}", self.enclosed_volume)?;
        writeln!(
            f,
            "  Status: {}",
            if self.is_consistent() {
                "Consistent"
            } else {
                "Inconsistent"
            }
        )?;
        if !self.is_consistent() {
            writeln!(f, "  Issues: {}", self.details())?;
        }
        Ok(())
    }
}

/// Check the boundary of subdomain `k` and collect every defect.
///
/// Never fails; see [`validate_subdomain`] for the fatal variant.
#[must_use]
pub fn inspect_subdomain(mesh: &VolumeMesh, k: u32, options: &ValidationOptions) -> BoundaryReport {
    let boundary: Vec<Face> = mesh.boundary_of(k).map(|se| se.face.clone()).collect();
    let tag_error_count = mesh
        .boundary_of(k)
        .filter(|se| se.domain_in == se.domain_out)
        .count();

    let front = OpenFront::compute(mesh, k);
    let adjacency = EdgeAdjacency::build(front.faces());

    let overlapping_pair_count = if options.check_overlaps {
        count_overlapping_pairs(mesh, &boundary)
    } else {
        0
    };

    let report = BoundaryReport {
        domain: k,
        face_count: boundary.len(),
        front_face_count: front.len(),
        edge_count: adjacency.edge_count(),
        duplicate_face_count: count_duplicate_faces(&boundary),
        overlapping_pair_count,
        open_edge_count: adjacency.boundary_edge_count(),
        non_manifold_edge_count: adjacency.non_manifold_edge_count(),
        orientation_error_count: if options.check_orientation {
            adjacency.orientation_error_count()
        } else {
            0
        },
        tag_error_count,
        enclosed_volume: enclosed_volume(mesh, front.faces()),
    };

    debug!(
        domain = k,
        faces = report.face_count,
        front = report.front_face_count,
        issues = report.issue_count(),
        "Checked subdomain boundary"
    );
    report
}

/// Validate the boundary of subdomain `k`.
///
/// # Errors
///
/// Returns [`BoundaryError::InconsistentBoundary`] if any check fails.
///
/// # Example
///
/// ```
/// use mesh_boundary::{validate_subdomain, ValidationOptions};
/// use mesh_types::unit_cube_boundary;
///
/// let mesh = unit_cube_boundary();
/// let report = validate_subdomain(&mesh, 1, &ValidationOptions::default()).unwrap();
/// assert!(report.is_consistent());
/// assert!((report.enclosed_volume - 1.0).abs() < 1e-12);
/// ```
pub fn validate_subdomain(
    mesh: &VolumeMesh,
    k: u32,
    options: &ValidationOptions,
) -> BoundaryResult<BoundaryReport> {
    let report = inspect_subdomain(mesh, k, options);
    if report.is_consistent() {
        if report.is_inside_out() {
            warn!(
                domain = k,
                volume = report.enclosed_volume,
                "Subdomain boundary appears to be inside-out"
            );
        }
        Ok(report)
    } else {
        warn!(domain = k, issues = %report.details(), "Inconsistent subdomain boundary");
        Err(BoundaryError::InconsistentBoundary {
            domain: k,
            details: report.details(),
        })
    }
}

/// Validate every subdomain `1..=mesh.domain_count()`.
///
/// Stops at the first inconsistent subdomain.
///
/// # Errors
///
/// Returns [`BoundaryError::InconsistentBoundary`] for the first failing subdomain.
pub fn validate_all(mesh: &VolumeMesh, options: &ValidationOptions) -> BoundaryResult<Vec<BoundaryReport>> {
    (1..=mesh.domain_count())
        .map(|k| validate_subdomain(mesh, k, options))
        .collect()
}

/// Count faces whose corner set repeats an earlier face, in either orientation.
fn count_duplicate_faces(faces: &[Face]) -> usize {
    let mut seen = HashSet::with_capacity(faces.len());
    faces.iter().filter(|face| !seen.insert(face.key())).count()
}

/// Count pairs of boundary triangles that overlap or cross.
fn count_overlapping_pairs(mesh: &VolumeMesh, faces: &[Face]) -> usize {
    let triangles: Vec<([u32; 3], [mesh_types::Point3<f64>; 3], Aabb, usize)> = faces
        .iter()
        .enumerate()
        .flat_map(|(owner, face)| {
            face.triangles().into_iter().map(move |tri| (tri, owner))
        })
        .map(|(tri, owner)| {
            let pos = mesh.triangle_positions(&tri);
            let aabb = Aabb::from_points(pos.iter());
            (tri, pos, aabb, owner)
        })
        .collect();

    let mut pairs = 0;
    for (i, (ta, pa, ba, oa)) in triangles.iter().enumerate() {
        for (tb, pb, bb, ob) in &triangles[i + 1..] {
            if oa == ob || faces[*oa].key() == faces[*ob].key() || !ba.intersects(bb) {
                continue;
            }
            if triangles_conflict(ta, pa, tb, pb) {
                pairs += 1;
            }
        }
    }
    pairs
}

/// Volume enclosed by inward-facing front faces.
fn enclosed_volume(mesh: &VolumeMesh, faces: &[Face]) -> f64 {
    let aabb = Aabb::from_points(
        faces
            .iter()
            .flat_map(|f| f.vertices().iter().map(|&v| mesh.position(v))),
    );
    if aabb.is_empty() {
        return 0.0;
    }
    let center = aabb.center();
    let volume: f64 = faces
        .iter()
        .flat_map(Face::triangles)
        .map(|tri| {
            let [a, b, c] = mesh.triangle_positions(&tri);
            geometry::signed_volume(&center, &a, &b, &c)
        })
        .sum();
    // Front normals point inward, so a correctly oriented front sums negative
    -volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{box_row_boundary, unit_cube_boundary, Point3, SurfaceElement, OUTSIDE};

    #[test]
    fn cube_is_consistent() {
        let mesh = unit_cube_boundary();
        let report = inspect_subdomain(&mesh, 1, &ValidationOptions::default());
        assert!(report.is_consistent(), "{report}");
        assert_eq!(report.face_count, 12);
        assert_eq!(report.edge_count, 18);
        assert!(!report.is_inside_out());
    }

    #[test]
    fn coincident_inverted_face_is_rejected() {
        let mut mesh = unit_cube_boundary();
        mesh.surface_elements
            .push(SurfaceElement::new(Face::triangle(0, 1, 2), 1, OUTSIDE));
        let report = inspect_subdomain(&mesh, 1, &ValidationOptions::default());
        assert_eq!(report.duplicate_face_count, 1);
        assert!(report.open_edge_count > 0);

        let err = validate_subdomain(&mesh, 1, &ValidationOptions::default()).unwrap_err();
        assert_eq!(err.domain(), 1);
        assert!(err.to_string().contains("duplicate faces"));
    }

    #[test]
    fn missing_face_leaves_open_edges() {
        let mut mesh = unit_cube_boundary();
        mesh.surface_elements.pop();
        let report = inspect_subdomain(&mesh, 1, &ValidationOptions::default());
        assert_eq!(report.open_edge_count, 3);
        assert!(validate_subdomain(&mesh, 1, &ValidationOptions::topology_only()).is_err());
    }

    #[test]
    fn flipped_face_breaks_orientation() {
        let mut mesh = unit_cube_boundary();
        let se = &mut mesh.surface_elements[0];
        se.face = se.face.reversed();
        let report = inspect_subdomain(&mesh, 1, &ValidationOptions::default());
        assert_eq!(report.orientation_error_count, 3);
    }

    #[test]
    fn equal_tags_are_rejected() {
        let mut mesh = unit_cube_boundary();
        mesh.surface_elements[3].domain_out = 1;
        let report = inspect_subdomain(&mesh, 1, &ValidationOptions::default());
        assert_eq!(report.tag_error_count, 1);
    }

    #[test]
    fn pierced_boundary_overlaps() {
        let mut mesh = unit_cube_boundary();
        // A closed sliver pair sticking through the top of the cube
        let a = mesh.add_point(Point3::new(0.5, 0.2, 0.5));
        let b = mesh.add_point(Point3::new(0.5, 0.8, 0.5));
        let c = mesh.add_point(Point3::new(0.5, 0.5, 1.5));
        mesh.surface_elements
            .push(SurfaceElement::new(Face::triangle(a, b, c), 1, OUTSIDE));
        mesh.surface_elements
            .push(SurfaceElement::new(Face::triangle(a, c, b), 1, OUTSIDE));

        let with = inspect_subdomain(&mesh, 1, &ValidationOptions::default());
        assert!(with.overlapping_pair_count > 0);
        let without = inspect_subdomain(&mesh, 1, &ValidationOptions::topology_only());
        assert_eq!(without.overlapping_pair_count, 0);
        assert_eq!(without.duplicate_face_count, 1);
    }

    #[test]
    fn all_row_domains_validate() {
        let mesh = box_row_boundary(3);
        let reports = validate_all(&mesh, &ValidationOptions::default()).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(BoundaryReport::is_consistent));
        for r in &reports {
            assert!((r.enclosed_volume - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn validation_is_repeatable() {
        let mesh = box_row_boundary(2);
        let first = inspect_subdomain(&mesh, 2, &ValidationOptions::default());
        let second = inspect_subdomain(&mesh, 2, &ValidationOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn report_display() {
        let mut mesh = unit_cube_boundary();
        mesh.surface_elements.pop();
        let text = inspect_subdomain(&mesh, 1, &ValidationOptions::default()).to_string();
        assert!(text.contains("Inconsistent"));
        assert!(text.contains("3 open edges"));
    }

    #[test]
    fn inside_out_cube_passes_with_negative_volume() {
        let mut mesh = unit_cube_boundary();
        for se in &mut mesh.surface_elements {
            se.face = se.face.reversed();
        }
        let report = validate_subdomain(&mesh, 1, &ValidationOptions::default()).unwrap();
        assert!(report.is_inside_out());
        assert!((report.enclosed_volume + 1.0).abs() < 1e-12);
    }
}
