//! The mesh store shared by every meshing stage.

use hashbrown::HashSet;
use nalgebra::Point3;

use crate::bounds::Aabb;
use crate::element::{SurfaceElement, VolumeElement};
use crate::error::{MeshError, MeshResult};
use crate::face::Face;
use crate::geometry;
use crate::vertex::Vertex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Points, boundary faces and volume elements of a subdomain-tagged mesh.
///
/// The store is filled by appending. Point indices are stable for the life
/// of the store. Volume elements are only removed by the optimizer and the
/// illegal-element repair through [`compact_volume_elements`](Self::compact_volume_elements).
///
/// # Example
///
/// ```
/// use mesh_types::{unit_cube_boundary, VolumeElement};
///
/// let mut mesh = unit_cube_boundary();
/// assert_eq!(mesh.domain_count(), 1);
///
/// let idx = mesh.add_volume_element(VolumeElement::tetrahedron([0, 1, 3, 4])).unwrap();
/// mesh.tag_new_elements(idx, 1);
/// assert_eq!(mesh.elements_in_domain(1).count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolumeMesh {
    /// Mesh points, indexed by `u32`.
    pub points: Vec<Vertex>,
    /// Boundary and interface faces.
    pub surface_elements: Vec<SurfaceElement>,
    /// Tetrahedra, pyramids and prisms.
    pub volume_elements: Vec<VolumeElement>,
}

impl VolumeMesh {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points.
    #[inline]
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Position of point `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range. Every stored element has been
    /// checked against the point count when it was added.
    #[inline]
    #[must_use]
    pub fn position(&self, index: u32) -> &Point3<f64> {
        &self.points[index as usize].position
    }

    /// Append a point and return its index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_point(&mut self, position: Point3<f64>) -> u32 {
        self.points.push(Vertex::new(position));
        (self.points.len() - 1) as u32
    }

    fn check_indices(&self, vertices: &[u32]) -> MeshResult<()> {
        let vertex_count = self.points.len();
        match vertices.iter().find(|&&v| v as usize >= vertex_count) {
            Some(&index) => Err(MeshError::InvalidIndex {
                index,
                vertex_count,
            }),
            None => Ok(()),
        }
    }

    /// Append a boundary face.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidIndex`] if the face refers to a missing point.
    pub fn add_surface_element(&mut self, element: SurfaceElement) -> MeshResult<usize> {
        self.check_indices(element.face.vertices())?;
        self.surface_elements.push(element);
        Ok(self.surface_elements.len() - 1)
    }

    /// Append a volume element.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::WrongVertexCount`] if the vertex list does not fit
    /// the kind, or [`MeshError::InvalidIndex`] for a missing point.
    pub fn add_volume_element(&mut self, element: VolumeElement) -> MeshResult<usize> {
        let expected = element.kind.vertex_count();
        if element.vertices.len() != expected {
            return Err(MeshError::WrongVertexCount {
                kind: element.kind,
                expected,
                actual: element.vertices.len(),
            });
        }
        self.check_indices(&element.vertices)?;
        self.volume_elements.push(element);
        Ok(self.volume_elements.len() - 1)
    }

    /// Largest subdomain tag used by any surface element.
    #[must_use]
    pub fn domain_count(&self) -> u32 {
        self.surface_elements
            .iter()
            .filter(|se| !se.deleted)
            .map(|se| se.domain_in.max(se.domain_out))
            .max()
            .unwrap_or(0)
    }

    /// Non-deleted surface elements bounding subdomain `k`.
    pub fn boundary_of(&self, k: u32) -> impl Iterator<Item = &SurfaceElement> + '_ {
        self.surface_elements.iter().filter(move |se| se.touches(k))
    }

    /// Bounding box of the boundary of subdomain `k`.
    #[must_use]
    pub fn domain_bounds(&self, k: u32) -> Aabb {
        let mut aabb = Aabb::empty();
        for se in self.boundary_of(k) {
            for &v in se.face.vertices() {
                aabb.expand_to_include(self.position(v));
            }
        }
        aabb
    }

    /// Indices of all points inside `aabb`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn points_in(&self, aabb: &Aabb) -> Vec<u32> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, v)| aabb.contains(&v.position))
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Tag every element from index `from` on that is still unassigned.
    ///
    /// Returns the number of elements tagged.
    pub fn tag_new_elements(&mut self, from: usize, k: u32) -> usize {
        let mut tagged = 0;
        for el in self.volume_elements.iter_mut().skip(from) {
            if el.domain == crate::UNASSIGNED && !el.deleted {
                el.domain = k;
                tagged += 1;
            }
        }
        tagged
    }

    /// Live volume elements of subdomain `k`.
    pub fn elements_in_domain(&self, k: u32) -> impl Iterator<Item = &VolumeElement> + '_ {
        self.volume_elements
            .iter()
            .filter(move |el| !el.deleted && el.domain == k)
    }

    /// Number of live volume elements.
    #[must_use]
    pub fn volume_element_count(&self) -> usize {
        self.volume_elements.iter().filter(|el| !el.deleted).count()
    }

    /// Points used by any non-deleted surface element.
    #[must_use]
    pub fn boundary_vertices(&self) -> HashSet<u32> {
        self.surface_elements
            .iter()
            .filter(|se| !se.deleted)
            .flat_map(|se| se.face.vertices().iter().copied())
            .collect()
    }

    /// Per point, true if a live surface or volume element uses it.
    #[must_use]
    pub fn referenced_points(&self) -> Vec<bool> {
        let mut used = vec![false; self.points.len()];
        let surface = self
            .surface_elements
            .iter()
            .filter(|se| !se.deleted)
            .flat_map(|se| se.face.vertices().iter());
        let volume = self
            .volume_elements
            .iter()
            .filter(|el| !el.deleted)
            .flat_map(|el| el.vertices.iter());
        for &v in surface.chain(volume) {
            used[v as usize] = true;
        }
        used
    }

    /// Lock every vertex of a pyramid or prism.
    ///
    /// Returns the number of vertices that were newly locked.
    pub fn lock_non_tetrahedral_vertices(&mut self) -> usize {
        let mut locked = 0;
        for el in self.volume_elements.iter().filter(|el| !el.deleted && !el.is_tet()) {
            for &v in &el.vertices {
                let vertex = &mut self.points[v as usize];
                if !vertex.locked {
                    vertex.locked = true;
                    locked += 1;
                }
            }
        }
        locked
    }

    /// Drop the tetrahedra of subdomain `k` stored at index `from` or later
    /// that use any of `vertices`.
    ///
    /// Elements before `from` keep their indices. Returns the number of
    /// elements removed.
    pub fn remove_tets_touching(&mut self, from: usize, k: u32, vertices: &HashSet<u32>) -> usize {
        if from >= self.volume_elements.len() {
            return 0;
        }
        let tail = self.volume_elements.split_off(from);
        let before = tail.len();
        self.volume_elements.extend(tail.into_iter().filter(|el| {
            el.domain != k || !el.is_tet() || !el.vertices.iter().any(|v| vertices.contains(v))
        }));
        before - (self.volume_elements.len() - from)
    }

    /// Drop deleted volume elements, keeping the order of the others.
    ///
    /// Returns the number of elements removed.
    pub fn compact_volume_elements(&mut self) -> usize {
        let before = self.volume_elements.len();
        self.volume_elements.retain(|el| !el.deleted);
        before - self.volume_elements.len()
    }

    /// Corner positions of a face.
    #[must_use]
    pub fn face_positions(&self, face: &Face) -> smallvec::SmallVec<[Point3<f64>; 4]> {
        face.vertices().iter().map(|&v| *self.position(v)).collect()
    }

    /// Corner positions of a triangle.
    #[must_use]
    pub fn triangle_positions(&self, tri: &[u32; 3]) -> [Point3<f64>; 3] {
        tri.map(|v| *self.position(v))
    }

    /// Signed volume of a volume element, summed over its sub-tetrahedra.
    #[must_use]
    pub fn element_volume(&self, el: &VolumeElement) -> f64 {
        el.kind
            .sub_tets()
            .iter()
            .map(|t| {
                let [a, b, c, d] = t.map(|i| self.position(el.vertices[i]));
                geometry::signed_volume(a, b, c, d)
            })
            .sum()
    }

    /// Worst sub-tetrahedron quality of a volume element.
    #[must_use]
    pub fn element_quality(&self, el: &VolumeElement) -> f64 {
        if el.has_repeated_vertices() {
            return 0.0;
        }
        el.kind
            .sub_tets()
            .iter()
            .map(|t| {
                let [a, b, c, d] = t.map(|i| self.position(el.vertices[i]));
                geometry::tet_quality(a, b, c, d)
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Total signed volume of subdomain `k`'s elements.
    #[must_use]
    pub fn total_volume(&self, k: u32) -> f64 {
        self.elements_in_domain(k)
            .map(|el| self.element_volume(el))
            .sum()
    }
}
