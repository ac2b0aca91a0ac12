//! Surface and volume elements.

use smallvec::SmallVec;

use crate::face::Face;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Domain tag of the exterior.
pub const OUTSIDE: u32 = 0;

/// Domain tag of a volume element that has not been assigned yet.
pub const UNASSIGNED: u32 = 0;

/// A boundary face separating two subdomains.
///
/// The face normal points from `domain_in` toward `domain_out`. For a closed
/// single-domain boundary `domain_in` is the domain and `domain_out` is
/// [`OUTSIDE`], so faces are wound counter-clockwise seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfaceElement {
    /// Oriented corners.
    pub face: Face,
    /// Subdomain behind the face.
    pub domain_in: u32,
    /// Subdomain in front of the face.
    pub domain_out: u32,
    /// Deleted elements are ignored by every pass.
    pub deleted: bool,
}

impl SurfaceElement {
    /// Create a surface element.
    #[must_use]
    pub const fn new(face: Face, domain_in: u32, domain_out: u32) -> Self {
        Self {
            face,
            domain_in,
            domain_out,
            deleted: false,
        }
    }

    /// True if the element bounds subdomain `k` from either side.
    #[inline]
    #[must_use]
    pub const fn touches(&self, k: u32) -> bool {
        !self.deleted && (self.domain_in == k || self.domain_out == k)
    }

    /// The face as seen from inside subdomain `k`, normal pointing into `k`.
    ///
    /// Returns `None` if the element does not bound `k` or bounds it on both
    /// sides.
    #[must_use]
    pub fn face_into(&self, k: u32) -> Option<Face> {
        if self.deleted || self.domain_in == self.domain_out {
            return None;
        }
        if self.domain_out == k {
            Some(self.face.clone())
        } else if self.domain_in == k {
            Some(self.face.reversed())
        } else {
            None
        }
    }
}

/// Shape of a volume element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementKind {
    /// Four vertices, positively oriented.
    Tetrahedron,
    /// Quad base `[0, 1, 2, 3]` whose normal points at apex `4`.
    Pyramid,
    /// Bottom `[0, 1, 2]` whose normal points at the top `[3, 4, 5]`.
    Prism,
}

impl ElementKind {
    /// Number of vertices of this kind.
    #[must_use]
    pub const fn vertex_count(self) -> usize {
        match self {
            Self::Tetrahedron => 4,
            Self::Pyramid => 5,
            Self::Prism => 6,
        }
    }

    /// Tetrahedral decomposition in local vertex indices.
    ///
    /// Every sub-tet is positively oriented when the element is valid.
    #[must_use]
    pub const fn sub_tets(self) -> &'static [[usize; 4]] {
        match self {
            Self::Tetrahedron => &[[0, 1, 2, 3]],
            Self::Pyramid => &[[0, 1, 2, 4], [0, 2, 3, 4]],
            Self::Prism => &[[0, 1, 2, 3], [1, 2, 3, 4], [2, 3, 4, 5]],
        }
    }
}

/// Vertex index storage for a volume element.
pub type ElementVertices = SmallVec<[u32; 6]>;

/// A tetrahedron, pyramid or prism tagged with its subdomain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolumeElement {
    /// Element shape.
    pub kind: ElementKind,
    /// Vertex indices in the order documented on [`ElementKind`].
    pub vertices: ElementVertices,
    /// Owning subdomain, [`UNASSIGNED`] until tagged.
    pub domain: u32,
    /// Set by the illegal-element marker.
    pub illegal: bool,
    /// Deleted elements are dropped on the next compaction.
    pub deleted: bool,
}

impl VolumeElement {
    /// Tetrahedron `(a, b, c, d)`, untagged.
    #[must_use]
    pub fn tetrahedron(vertices: [u32; 4]) -> Self {
        Self::from_parts(ElementKind::Tetrahedron, &vertices)
    }

    /// Pyramid over quad `(a, b, c, d)` with apex `e`, untagged.
    #[must_use]
    pub fn pyramid(vertices: [u32; 5]) -> Self {
        Self::from_parts(ElementKind::Pyramid, &vertices)
    }

    /// Prism with bottom `(a, b, c)` and top `(d, e, f)`, untagged.
    #[must_use]
    pub fn prism(vertices: [u32; 6]) -> Self {
        Self::from_parts(ElementKind::Prism, &vertices)
    }

    fn from_parts(kind: ElementKind, vertices: &[u32]) -> Self {
        Self {
            kind,
            vertices: SmallVec::from_slice(vertices),
            domain: UNASSIGNED,
            illegal: false,
            deleted: false,
        }
    }

    /// Same element tagged with `domain`.
    #[must_use]
    pub fn with_domain(mut self, domain: u32) -> Self {
        self.domain = domain;
        self
    }

    /// True for a tetrahedron.
    #[inline]
    #[must_use]
    pub fn is_tet(&self) -> bool {
        self.kind == ElementKind::Tetrahedron
    }

    /// Faces with normals pointing out of the element.
    #[must_use]
    pub fn outward_faces(&self) -> SmallVec<[Face; 5]> {
        let v = &self.vertices;
        let mut faces = SmallVec::new();
        match self.kind {
            ElementKind::Tetrahedron => {
                faces.push(Face::triangle(v[0], v[2], v[1]));
                faces.push(Face::triangle(v[0], v[1], v[3]));
                faces.push(Face::triangle(v[1], v[2], v[3]));
                faces.push(Face::triangle(v[0], v[3], v[2]));
            }
            ElementKind::Pyramid => {
                faces.push(Face::quad(v[0], v[3], v[2], v[1]));
                faces.push(Face::triangle(v[0], v[1], v[4]));
                faces.push(Face::triangle(v[1], v[2], v[4]));
                faces.push(Face::triangle(v[2], v[3], v[4]));
                faces.push(Face::triangle(v[3], v[0], v[4]));
            }
            ElementKind::Prism => {
                faces.push(Face::triangle(v[0], v[2], v[1]));
                faces.push(Face::triangle(v[3], v[4], v[5]));
                faces.push(Face::quad(v[0], v[1], v[4], v[3]));
                faces.push(Face::quad(v[1], v[2], v[5], v[4]));
                faces.push(Face::quad(v[2], v[0], v[3], v[5]));
            }
        }
        faces
    }

    /// True if some vertex index appears twice.
    #[must_use]
    pub fn has_repeated_vertices(&self) -> bool {
        let v = &self.vertices;
        (0..v.len()).any(|i| v[i + 1..].contains(&v[i]))
    }

    /// Sorted vertex set, used to detect duplicate elements.
    #[must_use]
    pub fn sorted_vertices(&self) -> ElementVertices {
        let mut sorted = self.vertices.clone();
        sorted.sort_unstable();
        sorted
    }
}
