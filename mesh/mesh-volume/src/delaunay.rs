//! Delaunay fallback.
//!
//! Tetrahedralizes the points of a subdomain box with Bowyer-Watson
//! insertion and keeps the tetrahedra that lie in the unmeshed region
//! without crossing the front. Points are triangulated at slightly
//! perturbed positions so that coplanar and cospherical groups, which grid
//! boundaries are full of, never produce flat tetrahedra. The kept
//! tetrahedra are judged at the true positions.
//!
//! The result need not conform to the front: the caller recomputes the
//! front afterwards and lets the tetrahedral rules close what is left.

use hashbrown::HashMap;
use mesh_types::geometry::{self, insphere, orient3d};
use mesh_types::intersect::{ray_triangle_intersect, triangles_conflict};
use mesh_types::{Aabb, Face, MeshResult, Point3, Vector3, VolumeElement, VolumeMesh};
use tracing::debug;

use crate::local::BOX_MARGIN;

/// Tetrahedra at or below this quality are not committed.
pub const SLIVER_QUALITY: f64 = 0.05;

/// Size of the enclosing tetrahedron relative to the box diagonal.
const SUPER_SCALE: f64 = 10.0;

/// Points closer than this fraction of the box diagonal are merged.
const DUPLICATE_EPS: f64 = 1e-12;

/// Perturbation of the triangulated points, relative to the box diagonal.
const JITTER: f64 = 1e-6;

/// Parameter slack of the ray casts used for the inside test.
const RAY_EPS: f64 = 1e-12;

/// Direction of the inside-test ray, chosen off every axis and diagonal.
const RAY_DIRECTION: [f64; 3] = [0.318_309_886_183_791, 0.577_215_664_901_533, 0.752_827_421_191_601];

/// Counts from [`delaunay_fill`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelaunayStats {
    /// Points inserted into the triangulation.
    pub points: usize,
    /// Tetrahedra without a corner of the enclosing tetrahedron.
    pub tetrahedra: usize,
    /// Tetrahedra committed to the mesh.
    pub elements_added: usize,
    /// Rejected as slivers or inverted.
    pub rejected_quality: usize,
    /// Rejected because they lie outside the unmeshed region.
    pub rejected_outside: usize,
    /// Rejected because a face crosses the front.
    pub rejected_conflict: usize,
}

impl std::fmt::Display for DelaunayStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Delaunay: {} points, {} tets, {} kept ({} slivers, {} outside, {} crossing)",
            self.points,
            self.tetrahedra,
            self.elements_added,
            self.rejected_quality,
            self.rejected_outside,
            self.rejected_conflict
        )
    }
}

/// Fill the region enclosed by `front` with Delaunay tetrahedra.
///
/// Every point of `mesh` inside `bounds` (plus a small margin) that some
/// element uses takes part.
/// Committed tetrahedra are left unassigned; the caller tags them.
///
/// # Errors
///
/// Returns a [`MeshError`](mesh_types::MeshError) if a tetrahedron cannot
/// be stored.
///
/// # Example
///
/// ```
/// use mesh_types::{unit_cube_boundary, OpenFront};
/// use mesh_volume::delaunay_fill;
///
/// let mut mesh = unit_cube_boundary();
/// let front = OpenFront::compute(&mesh, 1);
/// let bounds = mesh.domain_bounds(1);
/// let stats = delaunay_fill(&mut mesh, front.faces(), &bounds).unwrap();
/// assert_eq!(stats.points, 8);
/// assert!(mesh.total_volume(0) <= 1.0 + 1e-9);
/// ```
pub fn delaunay_fill(
    mesh: &mut VolumeMesh,
    front: &[Face],
    bounds: &Aabb,
) -> MeshResult<DelaunayStats> {
    let mut stats = DelaunayStats::default();
    if front.is_empty() || bounds.is_empty() {
        return Ok(stats);
    }

    let margin = BOX_MARGIN * bounds.diagonal();
    let used = mesh.referenced_points();
    let ids: Vec<u32> = mesh
        .points_in(&bounds.expanded(margin))
        .into_iter()
        .filter(|&v| used[v as usize])
        .collect();
    let mut triangulation = Triangulation::enclosing(bounds);
    let merge_distance = DUPLICATE_EPS * bounds.diagonal().max(1.0);
    let jitter = JITTER * bounds.diagonal();
    let mut global: Vec<u32> = Vec::with_capacity(ids.len());
    for &id in &ids {
        let p = *mesh.position(id);
        if global
            .iter()
            .any(|&g| (mesh.position(g) - p).norm() <= merge_distance)
        {
            continue;
        }
        if triangulation.insert(p + perturbation(global.len(), jitter)) {
            global.push(id);
        }
    }
    stats.points = global.len();

    let triangles: Vec<([u32; 3], [Point3<f64>; 3])> = front
        .iter()
        .flat_map(Face::triangles)
        .map(|tri| (tri, mesh.triangle_positions(&tri)))
        .collect();

    let mut kept = Vec::new();
    for tet in &triangulation.tets {
        if tet.iter().any(|&i| i < SUPER) {
            continue;
        }
        stats.tetrahedra += 1;
        let corners = tet.map(|i| global[i - SUPER]);
        let [a, b, c, d] = corners.map(|v| *mesh.position(v));

        if geometry::tet_quality(&a, &b, &c, &d) <= SLIVER_QUALITY {
            stats.rejected_quality += 1;
        } else if !encloses(&triangles, &geometry::centroid(&[a, b, c, d])) {
            stats.rejected_outside += 1;
        } else if crosses_front(&triangles, &corners, &[a, b, c, d]) {
            stats.rejected_conflict += 1;
        } else {
            kept.push(corners);
        }
    }

    for corners in kept {
        mesh.add_volume_element(VolumeElement::tetrahedron(corners))?;
        stats.elements_added += 1;
    }

    debug!(
        points = stats.points,
        tetrahedra = stats.tetrahedra,
        kept = stats.elements_added,
        slivers = stats.rejected_quality,
        outside = stats.rejected_outside,
        crossing = stats.rejected_conflict,
        "Delaunay fill finished"
    );
    Ok(stats)
}

/// Index of the first real point; the enclosing tetrahedron comes first.
const SUPER: usize = 4;

/// Unconstrained Delaunay tetrahedralization by incremental insertion.
struct Triangulation {
    points: Vec<Point3<f64>>,
    /// Positively oriented tetrahedra.
    tets: Vec<[usize; 4]>,
}

impl Triangulation {
    /// A single tetrahedron enclosing `bounds` with room to spare.
    fn enclosing(bounds: &Aabb) -> Self {
        let center = bounds.center();
        let s = SUPER_SCALE * (bounds.diagonal() + 1.0);
        let points: Vec<Point3<f64>> = [
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(1.0, -1.0, -1.0),
            Vector3::new(-1.0, 1.0, -1.0),
            Vector3::new(-1.0, -1.0, 1.0),
        ]
        .iter()
        .map(|dir| center + dir * s)
        .collect();
        let tet = if orient3d(&points[0], &points[1], &points[2], &points[3]) > 0.0 {
            [0, 1, 2, 3]
        } else {
            [0, 2, 1, 3]
        };
        Self {
            points,
            tets: vec![tet],
        }
    }

    /// Insert `p`, returning false if no circumsphere contains it.
    fn insert(&mut self, p: Point3<f64>) -> bool {
        let (cavity, rest): (Vec<[usize; 4]>, Vec<[usize; 4]>) =
            self.tets.iter().copied().partition(|t| {
                let [a, b, c, d] = t.map(|i| self.points[i]);
                insphere(&a, &b, &c, &d, &p) > 0.0
            });
        if cavity.is_empty() {
            return false;
        }

        // Faces seen once bound the cavity; shared ones are interior.
        let mut boundary: HashMap<[usize; 3], Option<[usize; 3]>> = HashMap::new();
        for tet in &cavity {
            for face in outward(tet) {
                let mut key = face;
                key.sort_unstable();
                boundary
                    .entry(key)
                    .and_modify(|seen| *seen = None)
                    .or_insert(Some(face));
            }
        }

        let index = self.points.len();
        self.points.push(p);
        self.tets = rest;
        for [x, y, z] in boundary.into_values().flatten() {
            self.tets.push([x, z, y, index]);
        }
        true
    }
}

/// Deterministic offset of the `i`-th inserted point, each coordinate in
/// `[-scale / 2, scale / 2)`.
#[allow(clippy::cast_precision_loss)]
fn perturbation(i: usize, scale: f64) -> Vector3<f64> {
    let t = i as f64 + 1.0;
    let spread = |alpha: f64| (t * alpha).fract() - 0.5;
    Vector3::new(
        spread(0.819_172_513_396_164),
        spread(0.671_043_606_703_789),
        spread(0.549_700_477_901_627),
    ) * scale
}

fn outward(t: &[usize; 4]) -> [[usize; 3]; 4] {
    let [a, b, c, d] = *t;
    [[a, c, b], [a, b, d], [b, c, d], [a, d, c]]
}

/// Odd number of front crossings along a fixed ray.
fn encloses(triangles: &[([u32; 3], [Point3<f64>; 3])], p: &Point3<f64>) -> bool {
    let dir = Vector3::from(RAY_DIRECTION);
    let hits = triangles
        .iter()
        .filter(|(_, [v0, v1, v2])| ray_triangle_intersect(p, &dir, v0, v1, v2, RAY_EPS).is_some())
        .count();
    hits % 2 == 1
}

fn crosses_front(
    triangles: &[([u32; 3], [Point3<f64>; 3])],
    corners: &[u32; 4],
    positions: &[Point3<f64>; 4],
) -> bool {
    let tet_box = Aabb::from_points(positions.iter());
    let faces = outward(&[0, 1, 2, 3]);
    triangles
        .iter()
        .filter(|(_, pos)| tet_box.intersects(&Aabb::from_points(pos.iter())))
        .any(|(tri, pos)| {
            faces.iter().any(|f| {
                let ids = f.map(|i| corners[i]);
                let face_pos = f.map(|i| positions[i]);
                triangles_conflict(&ids, &face_pos, tri, pos)
            })
        })
}
