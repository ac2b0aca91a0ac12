//! Tetrahedron measures and exact orientation predicates.
//!
//! Quality is the normalized volume-to-edge ratio
//! `q = 6√2·V / l_rms³`, which is `1` for the regular tetrahedron and
//! drops to `0` for flat ones. Inverted tetrahedra get a negative value.

use nalgebra::{Point3, Vector3};
use robust::Coord3D;

/// Badness assigned to inverted or flat elements.
pub const BAD_ELEMENT: f64 = 1e10;

/// Quality below which an element counts as flat.
pub const MIN_QUALITY: f64 = 1e-9;

#[inline]
fn coord(p: &Point3<f64>) -> Coord3D<f64> {
    Coord3D {
        x: p.x,
        y: p.y,
        z: p.z,
    }
}

/// Signed volume, positive when `d` lies on the normal side of `(a, b, c)`.
#[inline]
#[must_use]
pub fn signed_volume(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).dot(&(d - a)) / 6.0
}

/// Exact orientation sign with the same convention as [`signed_volume`].
#[inline]
#[must_use]
pub fn orient3d(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    // robust reports "below the counter-clockwise plane" as positive
    -robust::orient3d(coord(a), coord(b), coord(c), coord(d))
}

/// Exact in-sphere test, positive when `e` is strictly inside the
/// circumsphere of `(a, b, c, d)` regardless of their orientation.
#[must_use]
pub fn insphere(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    e: &Point3<f64>,
) -> f64 {
    let orientation = robust::orient3d(coord(a), coord(b), coord(c), coord(d));
    let raw = robust::insphere(coord(a), coord(b), coord(c), coord(d), coord(e));
    if orientation > 0.0 {
        raw
    } else if orientation < 0.0 {
        -raw
    } else {
        0.0
    }
}

/// Root mean square of the six edge lengths.
#[must_use]
pub fn rms_edge_length(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let sum = (b - a).norm_squared()
        + (c - a).norm_squared()
        + (d - a).norm_squared()
        + (c - b).norm_squared()
        + (d - b).norm_squared()
        + (d - c).norm_squared();
    (sum / 6.0).sqrt()
}

/// Shape quality in `(-inf, 1]`.
///
/// # Example
///
/// ```
/// use mesh_types::{geometry::tet_quality, Point3};
///
/// let s = 1.0 / 2.0_f64.sqrt();
/// let q = tet_quality(
///     &Point3::new(1.0, 0.0, -s),
///     &Point3::new(-1.0, 0.0, -s),
///     &Point3::new(0.0, 1.0, s),
///     &Point3::new(0.0, -1.0, s),
/// );
/// assert!((q.abs() - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn tet_quality(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let l = rms_edge_length(a, b, c, d);
    if l <= 0.0 {
        return 0.0;
    }
    6.0 * std::f64::consts::SQRT_2 * signed_volume(a, b, c, d) / (l * l * l)
}

/// Optimizer cost of an element with quality `quality`.
///
/// `(1/q)^power` for valid elements, [`BAD_ELEMENT`] for inverted or flat ones.
#[must_use]
pub fn badness(quality: f64, power: f64) -> f64 {
    if quality <= MIN_QUALITY {
        BAD_ELEMENT
    } else {
        quality.recip().powf(power)
    }
}

/// True if `p` lies strictly inside the tetrahedron, with `tol` a relative
/// slack on each barycentric coordinate.
#[must_use]
pub fn point_in_tet(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    tol: f64,
) -> bool {
    let total = signed_volume(a, b, c, d);
    if total.abs() <= f64::EPSILON {
        return false;
    }
    let bary = [
        signed_volume(p, b, c, d) / total,
        signed_volume(a, p, c, d) / total,
        signed_volume(a, b, p, d) / total,
        signed_volume(a, b, c, p) / total,
    ];
    bary.iter().all(|&w| w > tol)
}

/// Newell normal of a polygon, magnitude twice the area.
#[must_use]
pub fn polygon_normal(corners: &[Point3<f64>]) -> Vector3<f64> {
    let n = corners.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = corners[i];
        let b = corners[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Arithmetic mean of the corners.
#[must_use]
pub fn centroid(corners: &[Point3<f64>]) -> Point3<f64> {
    let sum = corners
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    #[allow(clippy::cast_precision_loss)]
    Point3::from(sum / corners.len().max(1) as f64)
}

/// Mean length of the polygon's boundary edges.
#[must_use]
pub fn mean_edge_length(corners: &[Point3<f64>]) -> f64 {
    let n = corners.len();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = (0..n)
        .map(|i| (corners[(i + 1) % n] - corners[i]).norm())
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total / n as f64;
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn corner_tet() -> [Point3<f64>; 4] {
        [
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn volume_sign_follows_orientation() {
        let [a, b, c, d] = corner_tet();
        assert_relative_eq!(signed_volume(&a, &b, &c, &d), 1.0 / 6.0);
        assert_relative_eq!(signed_volume(&a, &c, &b, &d), -1.0 / 6.0);
        assert!(orient3d(&a, &b, &c, &d) > 0.0);
        assert!(orient3d(&a, &c, &b, &d) < 0.0);
        assert_relative_eq!(orient3d(&a, &b, &c, &Point3::new(0.3, 0.3, 0.0)), 0.0);
    }

    #[test]
    fn quality_range() {
        let [a, b, c, d] = corner_tet();
        let q = tet_quality(&a, &b, &c, &d);
        assert!(q > 0.5 && q < 1.0);
        assert!(tet_quality(&a, &c, &b, &d) < 0.0);

        let flat = Point3::new(0.2, 0.2, 0.0);
        assert_relative_eq!(tet_quality(&a, &b, &c, &flat), 0.0);
    }

    #[test]
    fn badness_penalizes_inversion() {
        assert_relative_eq!(badness(1.0, 2.0), 1.0);
        assert_relative_eq!(badness(0.5, 2.0), 4.0);
        assert_relative_eq!(badness(-0.5, 2.0), BAD_ELEMENT);
    }

    #[test]
    fn insphere_ignores_orientation() {
        let [a, b, c, d] = corner_tet();
        let inside = Point3::new(0.25, 0.25, 0.25);
        let outside = Point3::new(2.0, 2.0, 2.0);
        assert!(insphere(&a, &b, &c, &d, &inside) > 0.0);
        assert!(insphere(&a, &c, &b, &d, &inside) > 0.0);
        assert!(insphere(&a, &b, &c, &d, &outside) < 0.0);
        // (1,1,1) is on the circumsphere of the corner tet
        let on = Point3::new(1.0, 1.0, 1.0);
        assert_relative_eq!(insphere(&a, &b, &c, &d, &on), 0.0);
    }

    #[test]
    fn point_in_tet_is_strict() {
        let [a, b, c, d] = corner_tet();
        assert!(point_in_tet(&Point3::new(0.1, 0.1, 0.1), &a, &b, &c, &d, 1e-9));
        assert!(!point_in_tet(&Point3::new(0.5, 0.5, 0.0), &a, &b, &c, &d, 1e-9));
        assert!(!point_in_tet(&b, &a, &b, &c, &d, 1e-9));
    }

    #[test]
    fn polygon_measures() {
        let square = [
            Point3::origin(),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        assert_relative_eq!(polygon_normal(&square), Vector3::new(0.0, 0.0, 8.0));
        assert_relative_eq!(centroid(&square), Point3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(mean_edge_length(&square), 2.0);
    }
}
