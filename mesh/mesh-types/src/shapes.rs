//! Ready-made boundaries for tests, benchmarks and examples.

use crate::element::{SurfaceElement, OUTSIDE};
use crate::face::Face;
use crate::store::VolumeMesh;
use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;

/// Triangles of a hexahedron in local corner numbering, counter-clockwise
/// seen from outside, grouped per side.
///
/// Corners 0-3 are the bottom ring and 4-7 the top ring above them.
const SIDES: [[[usize; 3]; 2]; 6] = [
    [[0, 2, 1], [0, 3, 2]], // bottom, -Z
    [[4, 5, 6], [4, 6, 7]], // top, +Z
    [[0, 1, 5], [0, 5, 4]], // front, -Y
    [[3, 7, 6], [3, 6, 2]], // back, +Y
    [[0, 4, 7], [0, 7, 3]], // left, -X
    [[1, 2, 6], [1, 6, 5]], // right, +X
];

const LEFT: usize = 4;
const RIGHT: usize = 5;

/// Neighbour cell offset across each side of [`SIDES`].
const SIDE_OFFSETS: [[i64; 3]; 6] = [
    [0, 0, -1],
    [0, 0, 1],
    [0, -1, 0],
    [0, 1, 0],
    [-1, 0, 0],
    [1, 0, 0],
];

fn push_side(mesh: &mut VolumeMesh, corners: &[u32; 8], side: usize, domain_in: u32, domain_out: u32) {
    for tri in SIDES[side] {
        let [a, b, c] = tri.map(|i| corners[i]);
        mesh.surface_elements
            .push(SurfaceElement::new(Face::triangle(a, b, c), domain_in, domain_out));
    }
}

/// Boundary of the unit cube `[0, 1]³` as subdomain 1.
///
/// Points are numbered like the corners of [`SIDES`]: `0..4` at `z = 0`
/// counter-clockwise from the origin, `4..8` above them.
///
/// # Example
///
/// ```
/// use mesh_types::unit_cube_boundary;
///
/// let mesh = unit_cube_boundary();
/// assert_eq!(mesh.point_count(), 8);
/// assert_eq!(mesh.surface_elements.len(), 12);
/// ```
#[must_use]
pub fn unit_cube_boundary() -> VolumeMesh {
    let mut mesh = VolumeMesh::new();
    for (x, y, z) in [
        (0.0, 0.0, 0.0),
        (1.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (1.0, 0.0, 1.0),
        (1.0, 1.0, 1.0),
        (0.0, 1.0, 1.0),
    ] {
        mesh.add_point(Point3::new(x, y, z));
    }
    let corners = [0, 1, 2, 3, 4, 5, 6, 7];
    for side in 0..SIDES.len() {
        push_side(&mut mesh, &corners, side, 1, OUTSIDE);
    }
    mesh
}

/// `n` unit cubes in a row along X, cube `i` being subdomain `i + 1`.
///
/// Neighbouring cubes share their interface triangles, tagged
/// `(i + 1, i + 2)` with normals along +X.
///
/// # Example
///
/// ```
/// use mesh_types::box_row_boundary;
///
/// let mesh = box_row_boundary(3);
/// assert_eq!(mesh.domain_count(), 3);
/// assert_eq!(mesh.point_count(), 16);
/// // 4 sides per cube, 2 end caps, 2 interfaces, 2 triangles each
/// assert_eq!(mesh.surface_elements.len(), 2 * (4 * 3 + 2 + 2));
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn box_row_boundary(n: usize) -> VolumeMesh {
    let mut mesh = VolumeMesh::new();
    // Slice i holds the four corners at x = i, numbered 2*z + y
    for i in 0..=n {
        let x = i as f64;
        mesh.add_point(Point3::new(x, 0.0, 0.0));
        mesh.add_point(Point3::new(x, 1.0, 0.0));
        mesh.add_point(Point3::new(x, 0.0, 1.0));
        mesh.add_point(Point3::new(x, 1.0, 1.0));
    }
    let at = |i: usize, y: u32, z: u32| (4 * i) as u32 + 2 * z + y;

    for i in 0..n {
        let corners = [
            at(i, 0, 0),
            at(i + 1, 0, 0),
            at(i + 1, 1, 0),
            at(i, 1, 0),
            at(i, 0, 1),
            at(i + 1, 0, 1),
            at(i + 1, 1, 1),
            at(i, 1, 1),
        ];
        let domain = i as u32 + 1;
        for side in 0..SIDES.len() {
            match side {
                LEFT if i > 0 => continue,
                RIGHT if i + 1 < n => {
                    push_side(&mut mesh, &corners, side, domain, domain + 1);
                }
                _ => push_side(&mut mesh, &corners, side, domain, OUTSIDE),
            }
        }
    }
    mesh
}

/// Boundary of a union of grid cells as subdomain 1.
///
/// Cell `[i, j, l]` spans `[i, i + 1]·step × [j, j + 1]·step × [l, l + 1]·step`.
/// Sides shared by two cells are skipped, every other side becomes two
/// triangles. Points are created in the order the sides first use them.
#[allow(clippy::cast_possible_wrap)]
fn cell_union_boundary(cells: &[[usize; 3]], step: f64) -> VolumeMesh {
    let mut mesh = VolumeMesh::new();
    let mut ids: HashMap<[usize; 3], u32> = HashMap::new();
    let occupied: HashSet<[i64; 3]> = cells.iter().map(|c| c.map(|x| x as i64)).collect();

    for &[i, j, l] in cells {
        let corners = [
            [i, j, l],
            [i + 1, j, l],
            [i + 1, j + 1, l],
            [i, j + 1, l],
            [i, j, l + 1],
            [i + 1, j, l + 1],
            [i + 1, j + 1, l + 1],
            [i, j + 1, l + 1],
        ];
        for (side, offset) in SIDE_OFFSETS.iter().enumerate() {
            let neighbour = [
                i as i64 + offset[0],
                j as i64 + offset[1],
                l as i64 + offset[2],
            ];
            if occupied.contains(&neighbour) {
                continue;
            }
            for tri in SIDES[side] {
                let [a, b, c] = tri.map(|k| grid_point(&mut mesh, &mut ids, corners[k], step));
                mesh.surface_elements
                    .push(SurfaceElement::new(Face::triangle(a, b, c), 1, OUTSIDE));
            }
        }
    }
    mesh
}

#[allow(clippy::cast_precision_loss)]
fn grid_point(
    mesh: &mut VolumeMesh,
    ids: &mut HashMap<[usize; 3], u32>,
    g: [usize; 3],
    step: f64,
) -> u32 {
    *ids.entry(g).or_insert_with(|| {
        mesh.add_point(Point3::new(
            g[0] as f64 * step,
            g[1] as f64 * step,
            g[2] as f64 * step,
        ))
    })
}

/// Boundary of the box `[0, size]³` with every side split into `n × n`
/// squares of two triangles, as subdomain 1.
///
/// # Example
///
/// ```
/// use mesh_types::subdivided_box_boundary;
///
/// let mesh = subdivided_box_boundary(3, 1.0);
/// assert_eq!(mesh.surface_elements.len(), 6 * 3 * 3 * 2);
/// // Interior grid points are never created
/// assert_eq!(mesh.point_count(), 4 * 4 * 4 - 2 * 2 * 2);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn subdivided_box_boundary(n: usize, size: f64) -> VolumeMesh {
    let n = n.max(1);
    let mut cells = Vec::with_capacity(n * n * n);
    for i in 0..n {
        for j in 0..n {
            for l in 0..n {
                cells.push([i, j, l]);
            }
        }
    }
    cell_union_boundary(&cells, size / n as f64)
}

/// Boundary of an L-shaped prism made of three unit cubes, as subdomain 1.
///
/// The cubes sit at `[0, 1]³`, `[1, 2] × [0, 1]²` and `[0, 1] × [1, 2] × [0, 1]`,
/// so the edge along `x = y = 1` is re-entrant.
///
/// # Example
///
/// ```
/// use mesh_types::l_shape_boundary;
///
/// let mesh = l_shape_boundary();
/// assert_eq!(mesh.point_count(), 16);
/// assert_eq!(mesh.surface_elements.len(), 28);
/// ```
#[must_use]
pub fn l_shape_boundary() -> VolumeMesh {
    cell_union_boundary(&[[0, 0, 0], [1, 0, 0], [0, 1, 0]], 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_interfaces_are_shared() {
        let mesh = box_row_boundary(2);
        let interfaces: Vec<_> = mesh
            .surface_elements
            .iter()
            .filter(|se| se.domain_out != OUTSIDE)
            .collect();
        assert_eq!(interfaces.len(), 2);
        assert!(interfaces.iter().all(|se| se.domain_in == 1 && se.domain_out == 2));
        assert_eq!(mesh.boundary_of(1).count(), 12);
        assert_eq!(mesh.boundary_of(2).count(), 12);
    }

    #[test]
    fn single_row_matches_cube() {
        let row = box_row_boundary(1);
        let cube = unit_cube_boundary();
        assert_eq!(row.surface_elements.len(), cube.surface_elements.len());
        assert_eq!(row.domain_bounds(1), cube.domain_bounds(1));
    }

    /// Every directed edge is matched by its reverse exactly once.
    fn assert_closed(mesh: &VolumeMesh) {
        let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
        for se in &mesh.surface_elements {
            for edge in se.face.edges() {
                *edges.entry(edge).or_default() += 1;
            }
        }
        for (&(a, b), &count) in &edges {
            assert_eq!(count, 1, "edge {a}-{b} repeated");
            assert_eq!(edges.get(&(b, a)), Some(&1), "edge {a}-{b} unmatched");
        }
    }

    #[test]
    fn subdivided_box_is_closed() {
        for n in 1..=4 {
            let mesh = subdivided_box_boundary(n, 2.0);
            assert_closed(&mesh);
            assert_eq!(mesh.surface_elements.len(), 12 * n * n);
            let bounds = mesh.domain_bounds(1);
            assert_eq!(bounds.min, Point3::origin());
            assert_eq!(bounds.max, Point3::new(2.0, 2.0, 2.0));
        }
    }

    #[test]
    fn single_cell_box_matches_cube() {
        let cube = unit_cube_boundary();
        let boxed = subdivided_box_boundary(1, 1.0);
        assert_eq!(boxed.point_count(), cube.point_count());
        assert_eq!(boxed.surface_elements.len(), cube.surface_elements.len());
        assert_eq!(boxed.domain_bounds(1), cube.domain_bounds(1));
    }

    #[test]
    fn l_shape_is_closed() {
        let mesh = l_shape_boundary();
        assert_closed(&mesh);
        let bounds = mesh.domain_bounds(1);
        assert_eq!(bounds.max, Point3::new(2.0, 2.0, 1.0));
        // Nothing is created in the missing quadrant
        assert!(mesh
            .points
            .iter()
            .all(|v| v.position.x < 1.5 || v.position.y < 1.5));
    }
}
