//! Open-front computation.
//!
//! The open front of a subdomain is every face on its boundary or on its
//! volume elements that is not matched by an oppositely oriented face. It is
//! always rebuilt from the whole store instead of being patched, because a
//! single element commit may close faces far away from where it was placed.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::face::{Face, FaceKey};
use crate::store::VolumeMesh;

/// Unmeshed faces of one subdomain, normals pointing into the unmeshed part.
///
/// # Example
///
/// ```
/// use mesh_types::{unit_cube_boundary, OpenFront};
///
/// let mesh = unit_cube_boundary();
/// let front = OpenFront::compute(&mesh, 1);
/// assert_eq!(front.len(), 12);
/// assert!(!front.has_quads());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenFront {
    domain: u32,
    faces: Vec<Face>,
}

impl OpenFront {
    /// Rebuild the open front of subdomain `k` from scratch.
    ///
    /// Faces keep the order in which they were collected: surface elements
    /// first, then volume element faces in element order.
    #[must_use]
    pub fn compute(mesh: &VolumeMesh, k: u32) -> Self {
        let mut candidates: Vec<Face> = mesh
            .surface_elements
            .iter()
            .filter_map(|se| se.face_into(k))
            .collect();
        for el in mesh.elements_in_domain(k) {
            candidates.extend(el.outward_faces());
        }

        let mut open: Vec<bool> = vec![true; candidates.len()];
        let mut by_key: HashMap<FaceKey, SmallVec<[usize; 2]>> = HashMap::new();
        for (i, face) in candidates.iter().enumerate() {
            let slot = by_key.entry(face.key()).or_default();
            // Cancel against the first still-open partner of opposite orientation
            let partner = slot
                .iter()
                .position(|&j| open[j] && !candidates[j].same_orientation(face));
            match partner {
                Some(pos) => {
                    open[slot[pos]] = false;
                    open[i] = false;
                    slot.swap_remove(pos);
                }
                None => slot.push(i),
            }
        }

        let faces = candidates
            .into_iter()
            .zip(open)
            .filter_map(|(face, keep)| keep.then_some(face))
            .collect();
        Self { domain: k, faces }
    }

    /// Subdomain this front belongs to.
    #[inline]
    #[must_use]
    pub const fn domain(&self) -> u32 {
        self.domain
    }

    /// Open faces.
    #[inline]
    #[must_use]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Consume the front, keeping its faces.
    #[must_use]
    pub fn into_faces(self) -> Vec<Face> {
        self.faces
    }

    /// Number of open faces.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// True once the subdomain is completely meshed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Number of open quads.
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_quad()).count()
    }

    /// True if any open face is a quad.
    #[must_use]
    pub fn has_quads(&self) -> bool {
        self.faces.iter().any(Face::is_quad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{box_row_boundary, unit_cube_boundary, SurfaceElement, VolumeElement, OUTSIDE};

    /// Six tets around the 0-6 diagonal, matching the cube's face diagonals.
    const CUBE_TETS: [[u32; 4]; 6] = [
        [0, 1, 2, 6],
        [0, 2, 3, 6],
        [0, 3, 7, 6],
        [0, 7, 4, 6],
        [0, 4, 5, 6],
        [0, 5, 1, 6],
    ];

    #[test]
    fn cube_faces_point_inward() {
        let mesh = unit_cube_boundary();
        let front = OpenFront::compute(&mesh, 1);
        // Bottom face (0, 2, 1) is reversed so its normal points up
        assert!(front.faces()[0].same_orientation(&Face::triangle(0, 1, 2)));
        assert_eq!(front.domain(), 1);
    }

    #[test]
    fn full_decomposition_closes_front() {
        let mut mesh = unit_cube_boundary();
        for t in CUBE_TETS {
            mesh.add_volume_element(VolumeElement::tetrahedron(t).with_domain(1))
                .unwrap();
        }
        assert!(OpenFront::compute(&mesh, 1).is_empty());
    }

    #[test]
    fn partial_decomposition_exposes_inner_faces() {
        let mut mesh = unit_cube_boundary();
        mesh.add_volume_element(VolumeElement::tetrahedron(CUBE_TETS[0]).with_domain(1))
            .unwrap();
        let front = OpenFront::compute(&mesh, 1);
        // Two cube triangles closed, two inner faces opened
        assert_eq!(front.len(), 12);
        for inner in [Face::triangle(0, 1, 6), Face::triangle(0, 6, 2)] {
            assert!(front.faces().iter().any(|f| f.same_orientation(&inner)));
        }
    }

    #[test]
    fn untagged_elements_are_ignored() {
        let mut mesh = unit_cube_boundary();
        mesh.add_volume_element(VolumeElement::tetrahedron(CUBE_TETS[0]))
            .unwrap();
        assert_eq!(OpenFront::compute(&mesh, 1).len(), 12);
    }

    #[test]
    fn interfaces_seen_from_both_sides() {
        let mesh = box_row_boundary(2);
        let left = OpenFront::compute(&mesh, 1);
        let right = OpenFront::compute(&mesh, 2);
        assert_eq!(left.len(), 12);
        assert_eq!(right.len(), 12);
        let shared = left
            .faces()
            .iter()
            .filter(|f| right.faces().iter().any(|g| g.key() == f.key()))
            .count();
        assert_eq!(shared, 2);
        assert!(OpenFront::compute(&mesh, 3).is_empty());
    }

    #[test]
    fn coincident_inverted_faces_cancel() {
        let mut mesh = unit_cube_boundary();
        mesh.surface_elements
            .push(SurfaceElement::new(Face::triangle(0, 1, 2), 1, OUTSIDE));
        // (0, 2, 1) and (0, 1, 2) cancel, leaving 11 faces
        assert_eq!(OpenFront::compute(&mesh, 1).len(), 11);
    }

    #[test]
    fn quads_are_counted() {
        let mut mesh = unit_cube_boundary();
        mesh.surface_elements
            .push(SurfaceElement::new(Face::quad(0, 1, 5, 4), 2, OUTSIDE));
        let front = OpenFront::compute(&mesh, 2);
        assert!(front.has_quads());
        assert_eq!(front.quad_count(), 1);
    }
}
