//! Edge adjacency of a set of oriented faces.
//!
//! Provides lookups for edge-to-face relationships and counts directed edge
//! uses so that orientation defects can be told apart from holes.

use hashbrown::HashMap;
use mesh_types::{normalize_edge, Face};

/// Adjacency information for a closed surface candidate.
///
/// Faces may be triangles or quads; every polygon edge is recorded.
#[derive(Debug, Clone)]
pub struct EdgeAdjacency {
    /// Maps edge (v0, v1) with v0 < v1 to the faces using it.
    edge_to_faces: HashMap<(u32, u32), Vec<usize>>,
    /// Number of faces using each directed edge.
    directed: HashMap<(u32, u32), usize>,
}

impl EdgeAdjacency {
    /// Build adjacency from oriented faces.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_boundary::EdgeAdjacency;
    /// use mesh_types::Face;
    ///
    /// let faces = vec![Face::triangle(0, 1, 2), Face::triangle(1, 3, 2)];
    /// let adj = EdgeAdjacency::build(&faces);
    ///
    /// assert_eq!(adj.edge_count(), 5);
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// assert_eq!(adj.orientation_error_count(), 0);
    /// ```
    #[must_use]
    pub fn build(faces: &[Face]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            for (a, b) in face.edges() {
                edge_to_faces
                    .entry(normalize_edge(a, b))
                    .or_default()
                    .push(face_idx);
                *directed.entry((a, b)).or_default() += 1;
            }
        }

        Self {
            edge_to_faces,
            directed,
        }
    }

    /// Faces adjacent to an edge, in either direction.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Number of distinct undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Edges used by exactly one face (holes).
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Edges used by more than two faces.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Two-face edges whose faces traverse them in the same direction.
    #[must_use]
    pub fn orientation_error_count(&self) -> usize {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 2)
            .filter(|(&(a, b), _)| {
                self.directed.get(&(a, b)).copied().unwrap_or(0) != 1
                    || self.directed.get(&(b, a)).copied().unwrap_or(0) != 1
            })
            .count()
    }

    /// True if every edge has exactly two faces, one in each direction.
    #[must_use]
    pub fn is_closed_manifold(&self) -> bool {
        self.boundary_edge_count() == 0
            && self.non_manifold_edge_count() == 0
            && self.orientation_error_count() == 0
    }
}
