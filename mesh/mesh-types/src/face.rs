//! Oriented triangle and quad faces.

use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Vertex index storage for a face.
pub type FaceVertices = SmallVec<[u32; 4]>;

/// An oriented triangle or quad.
///
/// The normal follows the right-hand rule over the vertex order. Faces that
/// differ only by a cyclic rotation describe the same oriented face.
///
/// # Example
///
/// ```
/// use mesh_types::Face;
///
/// let f = Face::triangle(0, 1, 2);
/// assert!(f.same_orientation(&Face::triangle(1, 2, 0)));
/// assert!(!f.same_orientation(&f.reversed()));
/// assert_eq!(f.key(), f.reversed().key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Face {
    vertices: FaceVertices,
}

impl Face {
    /// Triangle `(a, b, c)`.
    #[must_use]
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self {
            vertices: SmallVec::from_slice(&[a, b, c]),
        }
    }

    /// Quad `(a, b, c, d)`.
    #[must_use]
    pub fn quad(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self {
            vertices: SmallVec::from_slice(&[a, b, c, d]),
        }
    }

    /// Vertex indices in order.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[u32] {
        &self.vertices
    }

    /// Number of corners (3 or 4).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Always false, faces have at least three corners.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// True for a four-cornered face.
    #[inline]
    #[must_use]
    pub fn is_quad(&self) -> bool {
        self.vertices.len() == 4
    }

    /// The same face with opposite orientation.
    ///
    /// The first vertex is kept so that `f.reversed().reversed() == f`.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut vertices = FaceVertices::new();
        vertices.push(self.vertices[0]);
        vertices.extend(self.vertices[1..].iter().rev().copied());
        Self { vertices }
    }

    /// Orientation independent identity of the face.
    #[must_use]
    pub fn key(&self) -> FaceKey {
        FaceKey::new(&self.vertices)
    }

    /// True if `other` is a cyclic rotation of `self`.
    #[must_use]
    pub fn same_orientation(&self, other: &Self) -> bool {
        let n = self.vertices.len();
        if n != other.vertices.len() {
            return false;
        }
        let Some(shift) = other.vertices.iter().position(|&v| v == self.vertices[0]) else {
            return false;
        };
        (0..n).all(|i| self.vertices[i] == other.vertices[(i + shift) % n])
    }

    /// True if the face uses vertex `v`.
    #[inline]
    #[must_use]
    pub fn contains(&self, v: u32) -> bool {
        self.vertices.contains(&v)
    }

    /// Directed edges in face order.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Fan triangulation, one triangle for a triangle and two for a quad.
    ///
    /// Orientation is preserved.
    #[must_use]
    pub fn triangles(&self) -> SmallVec<[[u32; 3]; 2]> {
        let v = &self.vertices;
        let mut out = SmallVec::new();
        out.push([v[0], v[1], v[2]]);
        if v.len() == 4 {
            out.push([v[0], v[2], v[3]]);
        }
        out
    }

    /// The vertex that follows `v` in face order.
    #[must_use]
    pub fn next_after(&self, v: u32) -> Option<u32> {
        let n = self.vertices.len();
        let i = self.vertices.iter().position(|&x| x == v)?;
        Some(self.vertices[(i + 1) % n])
    }
}

/// Sorted vertex set of a face, padded with `u32::MAX`.
///
/// Two faces with the same key cover the same corners regardless of
/// orientation and starting vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FaceKey([u32; 4]);

impl FaceKey {
    /// Build a key from 3 or 4 indices.
    #[must_use]
    pub fn new(vertices: &[u32]) -> Self {
        let mut key = [u32::MAX; 4];
        for (slot, &v) in key.iter_mut().zip(vertices) {
            *slot = v;
        }
        key.sort_unstable();
        Self(key)
    }

    /// Sorted vertex indices without padding.
    #[must_use]
    pub fn vertices(&self) -> &[u32] {
        let n = self.0.iter().take_while(|&&v| v != u32::MAX).count();
        &self.0[..n]
    }
}

/// Canonical undirected edge `(min, max)`.
#[inline]
#[must_use]
pub const fn normalize_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
