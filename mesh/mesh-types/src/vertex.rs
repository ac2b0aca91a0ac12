//! Mesh points.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point of the volume mesh.
///
/// The index of a vertex is its position in [`VolumeMesh::points`](crate::VolumeMesh::points)
/// and never changes once the vertex has been added.
///
/// # Example
///
/// ```
/// use mesh_types::{Point3, Vertex};
///
/// let v = Vertex::new(Point3::new(1.0, 2.0, 3.0));
/// assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
/// assert!(!v.locked);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Position in 3D space.
    pub position: Point3<f64>,

    /// Locked vertices are never moved or removed by the optimizer.
    pub locked: bool,
}

impl Vertex {
    /// Create an unlocked vertex at `position`.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            locked: false,
        }
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}
