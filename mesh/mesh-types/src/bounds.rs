//! Axis-aligned bounding box.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box.
///
/// Subdomain boxes restrict which global points take part in a local
/// meshing pass.
///
/// # Example
///
/// ```
/// use mesh_types::{Aabb, Point3};
///
/// let aabb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 2.0));
/// assert!(aabb.contains(&Point3::new(0.5, 1.0, 1.0)));
/// assert!((aabb.diagonal() - 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a box from two corners, sorting each axis.
    #[must_use]
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self {
            min: Point3::new(min.x.min(max.x), min.y.min(max.y), min.z.min(max.z)),
            max: Point3::new(min.x.max(max.x), min.y.max(max.y), min.z.max(max.z)),
        }
    }

    /// Create an empty box, the identity for [`expand_to_include`](Self::expand_to_include).
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Point3::new is not const in nalgebra
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Create the smallest box containing every point of the iterator.
    #[must_use]
    pub fn from_points<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.expand_to_include(point);
        }
        aabb
    }

    /// True if the box contains no point at all.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Extent along each axis.
    #[inline]
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Center point.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Length of the main diagonal, `0.0` for an empty box.
    #[inline]
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.size().norm()
    }

    /// Grow the box so that it contains `point`.
    #[inline]
    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// A copy grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Inclusive point containment.
    #[inline]
    #[must_use]
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// True if the two boxes share at least one point.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_box_grows() {
        let mut aabb = Aabb::empty();
        assert!(aabb.is_empty());
        assert_relative_eq!(aabb.diagonal(), 0.0);

        aabb.expand_to_include(&Point3::new(1.0, 1.0, 1.0));
        aabb.expand_to_include(&Point3::new(-1.0, 0.0, 3.0));
        assert!(!aabb.is_empty());
        assert_eq!(aabb.min, Point3::new(-1.0, 0.0, 1.0));
        assert_eq!(aabb.max, Point3::new(1.0, 1.0, 3.0));
    }

    #[test]
    fn new_sorts_corners() {
        let aabb = Aabb::new(Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 1.0, 0.0));
        assert_eq!(aabb.min, Point3::origin());
        assert_eq!(aabb.max, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(aabb.center(), Point3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn expanded_contains_nearby_points() {
        let aabb = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let p = Point3::new(1.05, 0.5, 0.5);
        assert!(!aabb.contains(&p));
        assert!(aabb.expanded(0.1).contains(&p));
    }

    #[test]
    fn intersection() {
        let a = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3::new(1.0, 0.5, 0.5), Point3::new(2.0, 2.0, 2.0));
        let c = Aabb::new(Point3::new(1.5, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
