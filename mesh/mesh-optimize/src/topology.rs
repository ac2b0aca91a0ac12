//! Tetrahedral adjacency rebuilt before each operator sweep.

use hashbrown::{HashMap, HashSet};
use mesh_types::{normalize_edge, FaceKey, VolumeElement, VolumeMesh};
use smallvec::SmallVec;

/// Undirected edge with the smaller index first.
pub(crate) type Edge = (u32, u32);

/// Local edges of a tetrahedron.
pub(crate) const TET_EDGES: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];

/// Vertex indices of a live tetrahedron.
#[inline]
pub(crate) fn tet_vertices(el: &VolumeElement) -> [u32; 4] {
    [el.vertices[0], el.vertices[1], el.vertices[2], el.vertices[3]]
}

/// Edge, face and vertex incidences of the live tetrahedra, together with
/// the entities the operators must leave alone.
///
/// Surface element edges and faces are fixed, so are boundary vertices,
/// locked vertices and everything belonging to a pyramid or prism.
#[derive(Debug, Default)]
pub(crate) struct TetTopology {
    edge_tets: HashMap<Edge, SmallVec<[usize; 8]>>,
    face_tets: HashMap<FaceKey, SmallVec<[usize; 2]>>,
    vertex_tets: HashMap<u32, Vec<usize>>,
    fixed_edges: HashSet<Edge>,
    fixed_faces: HashSet<FaceKey>,
    fixed_vertices: HashSet<u32>,
}

impl TetTopology {
    pub(crate) fn build(mesh: &VolumeMesh) -> Self {
        let mut topo = Self {
            fixed_vertices: mesh.boundary_vertices(),
            ..Self::default()
        };

        for se in mesh.surface_elements.iter().filter(|se| !se.deleted) {
            topo.fixed_faces.insert(se.face.key());
            topo.fixed_edges
                .extend(se.face.edges().map(|(a, b)| normalize_edge(a, b)));
        }
        for (v, vertex) in mesh.points.iter().enumerate() {
            if vertex.locked {
                #[allow(clippy::cast_possible_truncation)]
                topo.fixed_vertices.insert(v as u32);
            }
        }

        for (idx, el) in mesh.volume_elements.iter().enumerate() {
            if el.deleted {
                continue;
            }
            if !el.is_tet() {
                topo.fixed_vertices.extend(el.vertices.iter().copied());
                for face in el.outward_faces() {
                    topo.fixed_faces.insert(face.key());
                    topo.fixed_edges
                        .extend(face.edges().map(|(a, b)| normalize_edge(a, b)));
                }
                continue;
            }
            let t = tet_vertices(el);
            for &(i, j) in &TET_EDGES {
                topo.edge_tets
                    .entry(normalize_edge(t[i], t[j]))
                    .or_default()
                    .push(idx);
            }
            for face in el.outward_faces() {
                topo.face_tets.entry(face.key()).or_default().push(idx);
            }
            for v in t {
                topo.vertex_tets.entry(v).or_default().push(idx);
            }
        }
        topo
    }

    /// Tetrahedra containing edge `(a, b)`.
    pub(crate) fn tets_on_edge(&self, a: u32, b: u32) -> &[usize] {
        self.edge_tets
            .get(&normalize_edge(a, b))
            .map_or(&[][..], |tets| tets.as_slice())
    }

    /// Tetrahedra having the face with key `key`.
    pub(crate) fn tets_on_face(&self, key: &FaceKey) -> &[usize] {
        self.face_tets.get(key).map_or(&[][..], |tets| tets.as_slice())
    }

    /// Tetrahedra containing vertex `v`.
    pub(crate) fn tets_at(&self, v: u32) -> &[usize] {
        self.vertex_tets.get(&v).map_or(&[][..], Vec::as_slice)
    }

    /// Vertices with at least one incident tetrahedron, ascending.
    pub(crate) fn tet_vertices_sorted(&self) -> Vec<u32> {
        let mut vertices: Vec<u32> = self.vertex_tets.keys().copied().collect();
        vertices.sort_unstable();
        vertices
    }

    /// True if `(a, b)` is an edge of any live element or surface element.
    pub(crate) fn has_edge(&self, a: u32, b: u32) -> bool {
        let edge = normalize_edge(a, b);
        self.edge_tets.contains_key(&edge) || self.fixed_edges.contains(&edge)
    }

    pub(crate) fn is_fixed_edge(&self, a: u32, b: u32) -> bool {
        self.fixed_edges.contains(&normalize_edge(a, b))
    }

    pub(crate) fn is_fixed_face(&self, key: &FaceKey) -> bool {
        self.fixed_faces.contains(key)
    }

    pub(crate) fn is_fixed_vertex(&self, v: u32) -> bool {
        self.fixed_vertices.contains(&v)
    }
}
