//! Intersection tests between front triangles and candidate faces.
//!
//! The advancing front and the boundary validator both need to know whether
//! two triangles overlap in a way that is not explained by a shared corner or
//! shared edge. [`triangles_conflict`] answers that using vertex indices to
//! recognize legitimate contact.

// Barycentric determinants pair up coordinates from different points
#![allow(clippy::suspicious_operation_groupings)]

use nalgebra::{Point3, Vector3};

/// Relative slack for sign tests, scaled by the local edge length.
const REL_EPS: f64 = 1e-9;

/// Relative distance under which two triangles are treated as coplanar.
const COPLANAR_EPS: f64 = 1e-7;

/// Fraction of an edge used to sample the neighbourhood of a shared corner.
const SAMPLE_STEP: f64 = 1e-2;

/// Ray-triangle intersection using the Möller-Trumbore algorithm.
///
/// Returns the ray parameter `t > epsilon` of the hit, or `None`.
#[must_use]
pub fn ray_triangle_intersect(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    epsilon: f64,
) -> Option<f64> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    if a.abs() < epsilon {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t > epsilon).then_some(t)
}

/// True if segment `p`-`q` crosses the plane of the triangle strictly and
/// the crossing point lies in the closed triangle.
///
/// Segments with an endpoint on the plane never pierce, which is what lets
/// faces that share a corner touch.
#[must_use]
pub fn segment_pierces_triangle(
    p: &Point3<f64>,
    q: &Point3<f64>,
    tri: &[Point3<f64>; 3],
    scale: f64,
) -> bool {
    let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
    let len = n.norm();
    if len <= f64::EPSILON * scale * scale {
        return false;
    }
    let n = n / len;
    let tol = REL_EPS * scale;
    let dp = (p - tri[0]).dot(&n);
    let dq = (q - tri[0]).dot(&n);
    let crosses = (dp > tol && dq < -tol) || (dp < -tol && dq > tol);
    if !crosses {
        return false;
    }
    let x = p + (q - p) * (dp / (dp - dq));
    let area_tol = -REL_EPS * scale * scale;
    (0..3).all(|i| {
        let a = tri[i];
        let b = tri[(i + 1) % 3];
        (b - a).cross(&(x - a)).dot(&n) >= area_tol
    })
}

/// True if two triangles overlap or cross beyond shared corners and edges.
///
/// `ia` and `ib` are the vertex indices of the two triangles and `pa`, `pb`
/// their positions. Identical vertex sets never conflict; callers decide
/// what a coincident face means.
///
/// # Example
///
/// ```
/// use mesh_types::{intersect::triangles_conflict, Point3};
///
/// let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
/// let b = [Point3::new(0.2, 0.2, -1.0), Point3::new(0.2, 0.2, 1.0), Point3::new(2.0, 2.0, 0.0)];
/// assert!(triangles_conflict(&[0, 1, 2], &a, &[3, 4, 5], &b));
///
/// // Sharing an edge and folding away is fine
/// let c = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, -1.0, 0.5)];
/// assert!(!triangles_conflict(&[0, 1, 2], &a, &[0, 1, 6], &c));
/// ```
#[must_use]
pub fn triangles_conflict(
    ia: &[u32; 3],
    pa: &[Point3<f64>; 3],
    ib: &[u32; 3],
    pb: &[Point3<f64>; 3],
) -> bool {
    let shared = ia.iter().filter(|v| ib.contains(v)).count();
    if shared == 3 {
        return false;
    }

    let scale = max_edge(pa).max(max_edge(pb));
    if scale <= 0.0 {
        return false;
    }

    let na = (pa[1] - pa[0]).cross(&(pa[2] - pa[0]));
    let na_len = na.norm();
    if na_len <= f64::EPSILON * scale * scale {
        return false;
    }
    let na = na / na_len;
    let plane_tol = COPLANAR_EPS * scale;
    let coplanar = pb.iter().all(|p| (p - pa[0]).dot(&na).abs() <= plane_tol);

    if coplanar {
        return coplanar_conflict(ia, pa, ib, pb, &na, scale);
    }

    for (i, j) in [(0, 1), (1, 2), (2, 0)] {
        if !(ib.contains(&ia[i]) && ib.contains(&ia[j]))
            && segment_pierces_triangle(&pa[i], &pa[j], pb, scale)
        {
            return true;
        }
        if !(ia.contains(&ib[i]) && ia.contains(&ib[j]))
            && segment_pierces_triangle(&pb[i], &pb[j], pa, scale)
        {
            return true;
        }
    }
    false
}

fn max_edge(p: &[Point3<f64>; 3]) -> f64 {
    (p[1] - p[0])
        .norm()
        .max((p[2] - p[1]).norm())
        .max((p[0] - p[2]).norm())
}

type P2 = [f64; 2];

fn project(p: &Point3<f64>, drop_axis: usize) -> P2 {
    match drop_axis {
        0 => [p.y, p.z],
        1 => [p.z, p.x],
        _ => [p.x, p.y],
    }
}

fn orient2(a: P2, b: P2, c: P2) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Strict containment of `p` in triangle `t` (either winding).
fn strictly_inside(p: P2, t: &[P2; 3], tol: f64) -> bool {
    let sign = orient2(t[0], t[1], t[2]).signum();
    (0..3).all(|i| sign * orient2(t[i], t[(i + 1) % 3], p) > tol)
}

fn segments_cross(p1: P2, p2: P2, q1: P2, q2: P2, tol: f64) -> bool {
    let o1 = orient2(p1, p2, q1);
    let o2 = orient2(p1, p2, q2);
    let o3 = orient2(q1, q2, p1);
    let o4 = orient2(q1, q2, p2);
    ((o1 > tol && o2 < -tol) || (o1 < -tol && o2 > tol))
        && ((o3 > tol && o4 < -tol) || (o3 < -tol && o4 > tol))
}

fn coplanar_conflict(
    ia: &[u32; 3],
    pa: &[Point3<f64>; 3],
    ib: &[u32; 3],
    pb: &[Point3<f64>; 3],
    normal: &Vector3<f64>,
    scale: f64,
) -> bool {
    let drop_axis = normal.iamax();
    let a: [P2; 3] = [0, 1, 2].map(|i| project(&pa[i], drop_axis));
    let b: [P2; 3] = [0, 1, 2].map(|i| project(&pb[i], drop_axis));
    let tol = REL_EPS * scale * scale;

    let shared: Vec<(usize, usize)> = (0..3)
        .filter_map(|i| ib.iter().position(|&v| v == ia[i]).map(|j| (i, j)))
        .collect();

    if let [(i0, j0), (i1, j1)] = shared.as_slice() {
        // Shared edge: overlap iff the free corners lie on the same side
        let free_a = 3 - i0 - i1;
        let free_b = 3 - j0 - j1;
        let sa = orient2(a[*i0], a[*i1], a[free_a]);
        let sb = orient2(a[*i0], a[*i1], b[free_b]);
        return (sa > tol && sb > tol) || (sa < -tol && sb < -tol);
    }

    for i in 0..3 {
        for j in 0..3 {
            let (a0, a1) = (ia[i], ia[(i + 1) % 3]);
            let (b0, b1) = (ib[j], ib[(j + 1) % 3]);
            if a0 == b0 || a0 == b1 || a1 == b0 || a1 == b1 {
                continue;
            }
            if segments_cross(a[i], a[(i + 1) % 3], b[j], b[(j + 1) % 3], tol) {
                return true;
            }
        }
    }

    for i in 0..3 {
        if !ib.contains(&ia[i]) && strictly_inside(a[i], &b, tol) {
            return true;
        }
        if !ia.contains(&ib[i]) && strictly_inside(b[i], &a, tol) {
            return true;
        }
    }

    if let [(i, j)] = shared.as_slice() {
        let samples = |t: &[P2; 3], at: usize| -> [P2; 3] {
            let s = t[at];
            let u = t[(at + 1) % 3];
            let w = t[(at + 2) % 3];
            let toward = |q: P2, f: f64| [s[0] + f * (q[0] - s[0]), s[1] + f * (q[1] - s[1])];
            let mid = [(u[0] + w[0]) * 0.5, (u[1] + w[1]) * 0.5];
            [toward(u, SAMPLE_STEP), toward(w, SAMPLE_STEP), toward(mid, SAMPLE_STEP)]
        };
        let sample_tol = tol * SAMPLE_STEP * SAMPLE_STEP;
        if samples(&a, *i)
            .iter()
            .any(|&p| strictly_inside(p, &b, sample_tol))
            || samples(&b, *j)
                .iter()
                .any(|&p| strictly_inside(p, &a, sample_tol))
        {
            return true;
        }
    }

    false
}
