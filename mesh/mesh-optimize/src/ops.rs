//! Local improvement operators.
//!
//! Each operator rebuilds the tetrahedral topology once and then walks the
//! elements in index order, greedily applying every move that passes the
//! acceptance test of its [`Goal`]. All vertices of the elements a move
//! replaces are marked as touched, and later moves in the same sweep must
//! avoid touched vertices. This keeps the cached topology valid until the
//! sweep ends.
//!
//! Moves never cross subdomains, never change surface element edges or
//! faces, and never move or remove fixed vertices.

// Element and point counts fit in u32 indices
#![allow(clippy::cast_possible_truncation)]

use hashbrown::{HashMap, HashSet};
use mesh_types::geometry::{badness, orient3d, tet_quality, MIN_QUALITY};
use mesh_types::{Face, FaceKey, Point3, VolumeElement, VolumeMesh};
use smallvec::SmallVec;
use tracing::debug;

use crate::topology::{tet_vertices, TetTopology, TET_EDGES};

/// Relative badness drop a move must achieve.
const MIN_IMPROVEMENT: f64 = 1e-9;

/// Quality below which the edges of an element are tried for splitting.
const SPLIT_QUALITY: f64 = 0.3;

/// What a move must achieve to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Goal {
    /// Lower total badness with every new element valid.
    Quality,
    /// Fewer illegal elements, or as many with lower badness.
    ///
    /// Only neighbourhoods containing an element marked illegal are tried.
    Legal,
}

#[derive(Debug, Clone, Copy)]
struct Relocation {
    vertex: u32,
    position: Point3<f64>,
}

/// A candidate change: `old` elements are replaced by `new` tetrahedra.
///
/// New tetrahedra reuse the slots of the old elements in order. Leftover
/// old slots are deleted and extra new tetrahedra appended.
#[derive(Debug)]
struct Move {
    old: SmallVec<[usize; 16]>,
    new: SmallVec<[[u32; 4]; 16]>,
    point: Option<Relocation>,
}

fn quality_of(mesh: &VolumeMesh, t: &[u32; 4], point: Option<&Relocation>) -> f64 {
    if (0..4).any(|i| t[i + 1..].contains(&t[i])) {
        return 0.0;
    }
    let at = |v: u32| match point {
        Some(r) if r.vertex == v => r.position,
        _ => *mesh.position(v),
    };
    tet_quality(&at(t[0]), &at(t[1]), &at(t[2]), &at(t[3]))
}

struct Sweep {
    topo: TetTopology,
    touched: HashSet<u32>,
    goal: Goal,
    power: f64,
}

impl Sweep {
    fn new(mesh: &VolumeMesh, goal: Goal, power: f64) -> Self {
        Self {
            topo: TetTopology::build(mesh),
            touched: HashSet::new(),
            goal,
            power,
        }
    }

    /// Whether the walk should look at element `idx` at all.
    fn visits(&self, mesh: &VolumeMesh, idx: usize) -> bool {
        let el = &mesh.volume_elements[idx];
        !el.deleted && el.is_tet() && (self.goal == Goal::Quality || el.illegal)
    }

    /// Common domain of an untouched, live, non-empty element set.
    fn eligible(&self, mesh: &VolumeMesh, set: &[usize]) -> Option<u32> {
        let domain = mesh.volume_elements[*set.first()?].domain;
        let ok = set.iter().all(|&i| {
            let el = &mesh.volume_elements[i];
            !el.deleted
                && el.domain == domain
                && el.vertices.iter().all(|v| !self.touched.contains(v))
        });
        let wanted = self.goal == Goal::Quality
            || set.iter().any(|&i| mesh.volume_elements[i].illegal);
        (ok && wanted).then_some(domain)
    }

    /// No face may end up in more than two tetrahedra, or in more than one
    /// tetrahedron of the same domain when it lies on a surface element.
    fn keeps_manifold(&self, mesh: &VolumeMesh, mv: &Move, domain: u32) -> bool {
        let mut uses: HashMap<FaceKey, usize> = HashMap::new();
        for t in &mv.new {
            for face in VolumeElement::tetrahedron(*t).outward_faces() {
                *uses.entry(face.key()).or_default() += 1;
            }
        }
        uses.iter().all(|(key, &n)| {
            let fixed = self.topo.is_fixed_face(key);
            let existing = self
                .topo
                .tets_on_face(key)
                .iter()
                .filter(|&&i| !mv.old.contains(&i))
                .map(|&i| &mesh.volume_elements[i])
                .filter(|el| !el.deleted && (!fixed || el.domain == domain))
                .count();
            n + existing <= if fixed { 1 } else { 2 }
        })
    }

    fn accepts(&self, mesh: &VolumeMesh, mv: &Move) -> bool {
        let old_illegal = mv
            .old
            .iter()
            .filter(|&&i| mesh.volume_elements[i].illegal)
            .count();
        let old_bad: f64 = mv
            .old
            .iter()
            .map(|&i| badness(mesh.element_quality(&mesh.volume_elements[i]), self.power))
            .sum();

        let new_quality: SmallVec<[f64; 16]> = mv
            .new
            .iter()
            .map(|t| quality_of(mesh, t, mv.point.as_ref()))
            .collect();
        let new_illegal = new_quality.iter().filter(|&&q| q <= MIN_QUALITY).count();
        let new_bad: f64 = new_quality.iter().map(|&q| badness(q, self.power)).sum();

        let better = new_bad < old_bad * (1.0 - MIN_IMPROVEMENT);
        match self.goal {
            Goal::Quality => new_illegal == 0 && better,
            Goal::Legal => {
                old_illegal > 0
                    && (new_illegal < old_illegal || (new_illegal == old_illegal && better))
            }
        }
    }

    fn check(&self, mesh: &VolumeMesh, mv: Move, domain: u32) -> Option<Move> {
        (self.keeps_manifold(mesh, &mv, domain) && self.accepts(mesh, &mv)).then_some(mv)
    }

    fn apply(&mut self, mesh: &mut VolumeMesh, mv: Move) {
        for &i in &mv.old {
            self.touched
                .extend(mesh.volume_elements[i].vertices.iter().copied());
        }
        if let Some(r) = mv.point {
            if r.vertex as usize == mesh.points.len() {
                mesh.add_point(r.position);
            } else {
                mesh.points[r.vertex as usize].position = r.position;
            }
        }

        let domain = mesh.volume_elements[mv.old[0]].domain;
        let mut slots = mv.old.iter();
        for t in mv.new {
            let el = VolumeElement::tetrahedron(t).with_domain(domain);
            match slots.next() {
                Some(&i) => mesh.volume_elements[i] = el,
                None => mesh.volume_elements.push(el),
            }
        }
        for &i in slots {
            mesh.volume_elements[i].deleted = true;
        }
    }

    /// Collapse `remove` onto `keep`.
    fn plan_collapse(&self, mesh: &VolumeMesh, keep: u32, remove: u32) -> Option<Move> {
        if self.topo.is_fixed_vertex(remove) || self.topo.is_fixed_edge(keep, remove) {
            return None;
        }
        let star = self.topo.tets_at(remove);
        let domain = self.eligible(mesh, star)?;

        let mut old = SmallVec::new();
        let mut collapsed: SmallVec<[usize; 8]> = SmallVec::new();
        let mut new = SmallVec::new();
        for &i in star {
            let t = tet_vertices(&mesh.volume_elements[i]);
            if t.contains(&keep) {
                collapsed.push(i);
            } else {
                old.push(i);
                new.push(t.map(|v| if v == remove { keep } else { v }));
            }
        }
        if collapsed.is_empty() {
            return None;
        }
        old.extend(collapsed);
        self.check(mesh, Move { old, new, point: None }, domain)
    }

    /// Split edge `(a, b)` at its midpoint.
    fn plan_split(&self, mesh: &VolumeMesh, a: u32, b: u32) -> Option<Move> {
        if self.topo.is_fixed_edge(a, b) {
            return None;
        }
        let shell = self.topo.tets_on_edge(a, b);
        let domain = self.eligible(mesh, shell)?;
        if self.goal == Goal::Quality
            && shell
                .iter()
                .all(|&i| mesh.element_quality(&mesh.volume_elements[i]) >= SPLIT_QUALITY)
        {
            return None;
        }

        let mid = mesh.points.len() as u32;
        let mut new = SmallVec::new();
        for &i in shell {
            let t = tet_vertices(&mesh.volume_elements[i]);
            new.push(t.map(|v| if v == b { mid } else { v }));
            new.push(t.map(|v| if v == a { mid } else { v }));
        }
        let point = Relocation {
            vertex: mid,
            position: midpoint(mesh.position(a), mesh.position(b)),
        };
        let mv = Move {
            old: shell.iter().copied().collect(),
            new,
            point: Some(point),
        };
        self.check(mesh, mv, domain)
    }

    /// Replace the three tetrahedra around edge `(a, b)` by two.
    fn plan_swap(&self, mesh: &VolumeMesh, a: u32, b: u32) -> Option<Move> {
        if self.topo.is_fixed_edge(a, b) {
            return None;
        }
        let shell = self.topo.tets_on_edge(a, b);
        if shell.len() != 3 {
            return None;
        }
        let domain = self.eligible(mesh, shell)?;

        let mut ring: SmallVec<[u32; 4]> = SmallVec::new();
        for &i in shell {
            for v in tet_vertices(&mesh.volume_elements[i]) {
                if v != a && v != b && !ring.contains(&v) {
                    ring.push(v);
                }
            }
        }
        let [c, d, e] = ring.as_slice() else {
            return None;
        };
        let (c, d, e) = (*c, *d, *e);

        let (pc, pd, pe) = (mesh.position(c), mesh.position(d), mesh.position(e));
        let side_a = orient3d(pc, pd, pe, mesh.position(a));
        let side_b = orient3d(pc, pd, pe, mesh.position(b));
        if side_a == 0.0 || side_b == 0.0 || side_a.signum() == side_b.signum() {
            return None;
        }
        let new = if side_a > 0.0 {
            SmallVec::from_slice(&[[c, d, e, a], [c, e, d, b]])
        } else {
            SmallVec::from_slice(&[[c, e, d, a], [c, d, e, b]])
        };
        let mv = Move {
            old: shell.iter().copied().collect(),
            new,
            point: None,
        };
        self.check(mesh, mv, domain)
    }

    /// Replace the two tetrahedra on `face` by three around their apexes.
    ///
    /// `face` is an outward face of element `idx`.
    fn plan_swap2(&self, mesh: &VolumeMesh, idx: usize, face: &Face) -> Option<Move> {
        let key = face.key();
        if self.topo.is_fixed_face(&key) {
            return None;
        }
        let pair = self.topo.tets_on_face(&key);
        if pair.len() != 2 {
            return None;
        }
        let domain = self.eligible(mesh, pair)?;
        let other = if pair[0] == idx { pair[1] } else { pair[0] };

        let apex = |i: usize| {
            tet_vertices(&mesh.volume_elements[i])
                .into_iter()
                .find(|&v| !face.contains(v))
        };
        let (d, e) = (apex(idx)?, apex(other)?);
        if d == e || self.topo.has_edge(d, e) {
            return None;
        }

        // d lies behind the outward face, e in front of it
        let [x, y, z] = [face.vertices()[0], face.vertices()[1], face.vertices()[2]];
        let mv = Move {
            old: SmallVec::from_slice(&[idx, other]),
            new: SmallVec::from_slice(&[[x, y, d, e], [y, z, d, e], [z, x, d, e]]),
            point: None,
        };
        self.check(mesh, mv, domain)
    }

    /// Move vertex `v` towards the centroid of its neighbours.
    fn plan_smooth(&self, mesh: &VolumeMesh, v: u32) -> Option<Move> {
        if self.topo.is_fixed_vertex(v) {
            return None;
        }
        let star = self.topo.tets_at(v);
        let domain = self.eligible(mesh, star)?;

        let mut neighbours: SmallVec<[u32; 32]> = SmallVec::new();
        for &i in star {
            for w in tet_vertices(&mesh.volume_elements[i]) {
                if w != v && !neighbours.contains(&w) {
                    neighbours.push(w);
                }
            }
        }
        if neighbours.is_empty() {
            return None;
        }
        let corners: Vec<Point3<f64>> = neighbours.iter().map(|&w| *mesh.position(w)).collect();
        let target = mesh_types::geometry::centroid(&corners);
        let current = mesh.position(v);

        [target, midpoint(current, &target)]
            .into_iter()
            .find_map(|position| {
                let mv = Move {
                    old: star.iter().copied().collect(),
                    new: star
                        .iter()
                        .map(|&i| tet_vertices(&mesh.volume_elements[i]))
                        .collect(),
                    point: Some(Relocation {
                        vertex: v,
                        position,
                    }),
                };
                self.check(mesh, mv, domain)
            })
    }
}

#[inline]
fn midpoint(a: &Point3<f64>, b: &Point3<f64>) -> Point3<f64> {
    Point3::from((a.coords + b.coords) * 0.5)
}

fn edge_sweep(
    mesh: &mut VolumeMesh,
    goal: Goal,
    power: f64,
    name: &'static str,
    plan: impl Fn(&Sweep, &VolumeMesh, u32, u32) -> Option<Move>,
) -> usize {
    let mut sweep = Sweep::new(mesh, goal, power);
    let mut applied = 0;
    let count = mesh.volume_elements.len();
    'elements: for idx in 0..count {
        if !sweep.visits(mesh, idx) {
            continue;
        }
        let t = tet_vertices(&mesh.volume_elements[idx]);
        for &(i, j) in &TET_EDGES {
            if let Some(mv) = plan(&sweep, mesh, t[i], t[j]) {
                sweep.apply(mesh, mv);
                applied += 1;
                continue 'elements;
            }
        }
    }
    debug!(operator = name, ?goal, applied, "operator sweep finished");
    applied
}

/// Collapse interior edges whose removal lowers the local badness.
///
/// The removed vertex must be free; the kept one may be on the boundary.
/// Returns the number of collapses.
pub fn combine_improve(mesh: &mut VolumeMesh, goal: Goal, error_power: f64) -> usize {
    edge_sweep(mesh, goal, error_power, "combine", |sweep, mesh, a, b| {
        sweep
            .plan_collapse(mesh, a, b)
            .or_else(|| sweep.plan_collapse(mesh, b, a))
    })
}

/// Split interior edges of poor elements at their midpoint.
///
/// Returns the number of splits.
pub fn split_improve(mesh: &mut VolumeMesh, goal: Goal, error_power: f64) -> usize {
    edge_sweep(mesh, goal, error_power, "split", |sweep, mesh, a, b| {
        sweep.plan_split(mesh, a, b)
    })
}

/// Remove interior edges with exactly three incident tetrahedra (3 to 2).
///
/// Returns the number of swaps.
pub fn swap_improve(mesh: &mut VolumeMesh, goal: Goal, error_power: f64) -> usize {
    edge_sweep(mesh, goal, error_power, "swap", |sweep, mesh, a, b| {
        sweep.plan_swap(mesh, a, b)
    })
}

/// Flip interior faces shared by two tetrahedra (2 to 3).
///
/// Returns the number of flips.
pub fn swap2_improve(mesh: &mut VolumeMesh, goal: Goal, error_power: f64) -> usize {
    let mut sweep = Sweep::new(mesh, goal, error_power);
    let mut applied = 0;
    let count = mesh.volume_elements.len();
    'elements: for idx in 0..count {
        if !sweep.visits(mesh, idx) {
            continue;
        }
        for face in mesh.volume_elements[idx].outward_faces() {
            if let Some(mv) = sweep.plan_swap2(mesh, idx, &face) {
                sweep.apply(mesh, mv);
                applied += 1;
                continue 'elements;
            }
        }
    }
    debug!(operator = "swap2", ?goal, applied, "operator sweep finished");
    applied
}

/// Relocate free vertices towards the centroid of their neighbours.
///
/// Returns the number of vertices moved.
pub fn smooth_improve(mesh: &mut VolumeMesh, goal: Goal, error_power: f64) -> usize {
    let mut sweep = Sweep::new(mesh, goal, error_power);
    let mut applied = 0;
    for v in sweep.topo.tet_vertices_sorted() {
        if let Some(mv) = sweep.plan_smooth(mesh, v) {
            sweep.apply(mesh, mv);
            applied += 1;
        }
    }
    debug!(operator = "smooth", ?goal, applied, "operator sweep finished");
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{unit_cube_boundary, OpenFront};

    /// Cube split into twelve tets around an inner vertex at `centre`.
    fn star_cube(centre: Point3<f64>) -> (VolumeMesh, u32) {
        let mut mesh = unit_cube_boundary();
        let c = mesh.add_point(centre);
        for se in mesh.surface_elements.clone() {
            let v = se.face.vertices();
            mesh.add_volume_element(VolumeElement::tetrahedron([v[0], v[2], v[1], c]).with_domain(1))
                .unwrap();
        }
        (mesh, c)
    }

    fn min_quality(mesh: &VolumeMesh) -> f64 {
        mesh.volume_elements
            .iter()
            .filter(|el| !el.deleted)
            .map(|el| mesh.element_quality(el))
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn smoothing_recentres_inner_vertex() {
        let (mut mesh, c) = star_cube(Point3::new(0.8, 0.7, 0.75));
        let before = min_quality(&mesh);
        let moved = smooth_improve(&mut mesh, Goal::Quality, 2.0);
        assert_eq!(moved, 1);
        assert!(min_quality(&mesh) > before);
        assert_relative_eq!(mesh.position(c).x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(mesh.total_volume(1), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn smoothing_leaves_boundary_alone() {
        let (mut mesh, _) = star_cube(Point3::new(0.5, 0.5, 0.5));
        let before: Vec<_> = mesh.points.iter().map(|p| p.position).collect();
        smooth_improve(&mut mesh, Goal::Quality, 2.0);
        for (p, q) in mesh.points.iter().zip(&before) {
            assert_eq!(p.position, *q);
        }
    }

    #[test]
    fn locked_vertex_is_not_moved() {
        let (mut mesh, c) = star_cube(Point3::new(0.8, 0.7, 0.75));
        mesh.points[c as usize].locked = true;
        assert_eq!(smooth_improve(&mut mesh, Goal::Quality, 2.0), 0);
    }

    #[test]
    fn combine_never_removes_boundary_vertices() {
        let (mut mesh, _) = star_cube(Point3::new(0.5, 0.5, 0.5));
        let corners: Vec<_> = mesh.points[..8].iter().map(|p| p.position).collect();
        // The inner vertex collapses onto a corner, leaving a six-tet fan
        assert_eq!(combine_improve(&mut mesh, Goal::Quality, 2.0), 1);
        mesh.compact_volume_elements();
        assert_eq!(mesh.volume_element_count(), 6);
        for (p, q) in mesh.points.iter().zip(&corners) {
            assert_eq!(p.position, *q);
        }
        assert!(OpenFront::compute(&mesh, 1).is_empty());
        assert_relative_eq!(mesh.total_volume(1), 1.0, epsilon = 1e-12);
        assert!(min_quality(&mesh) > 0.0);
    }

    #[test]
    fn three_to_two_swap() {
        // Three tets around the vertical edge (a, b) with a triangular ring
        let mut mesh = VolumeMesh::new();
        let a = mesh.add_point(Point3::new(0.0, 0.0, 1.0));
        let b = mesh.add_point(Point3::new(0.0, 0.0, -1.0));
        let c = mesh.add_point(Point3::new(1.0, 0.0, 0.0));
        let d = mesh.add_point(Point3::new(-0.5, 0.866, 0.0));
        let e = mesh.add_point(Point3::new(-0.5, -0.866, 0.0));
        for (x, y) in [(c, d), (d, e), (e, c)] {
            mesh.add_volume_element(VolumeElement::tetrahedron([x, y, b, a]).with_domain(1))
                .unwrap();
        }
        for el in &mesh.volume_elements {
            assert!(mesh.element_volume(el) > 0.0);
        }
        let volume = mesh.total_volume(1);

        let swapped = swap_improve(&mut mesh, Goal::Quality, 2.0);
        assert_eq!(swapped, 1);
        assert_eq!(mesh.volume_element_count(), 2);
        mesh.compact_volume_elements();
        assert_relative_eq!(mesh.total_volume(1), volume, epsilon = 1e-12);
        assert!(min_quality(&mesh) > 0.0);
    }

    #[test]
    fn two_to_three_swap_undoes_flat_pair() {
        // Two tets sharing a wide triangle with apexes close to it
        let mut mesh = VolumeMesh::new();
        let c = mesh.add_point(Point3::new(1.0, 0.0, 0.0));
        let d = mesh.add_point(Point3::new(-0.5, 0.866, 0.0));
        let e = mesh.add_point(Point3::new(-0.5, -0.866, 0.0));
        let a = mesh.add_point(Point3::new(0.0, 0.0, 0.3));
        let b = mesh.add_point(Point3::new(0.0, 0.0, -0.3));
        mesh.add_volume_element(VolumeElement::tetrahedron([c, d, e, a]).with_domain(1))
            .unwrap();
        mesh.add_volume_element(VolumeElement::tetrahedron([c, e, d, b]).with_domain(1))
            .unwrap();
        let before = min_quality(&mesh);
        let volume = mesh.total_volume(1);

        let flipped = swap2_improve(&mut mesh, Goal::Quality, 2.0);
        assert_eq!(flipped, 1);
        assert_eq!(mesh.volume_element_count(), 3);
        assert!(min_quality(&mesh) > before);
        assert_relative_eq!(mesh.total_volume(1), volume, epsilon = 1e-12);
    }

    #[test]
    fn legal_mode_ignores_valid_meshes() {
        // Legal mode only looks at elements marked illegal
        let (mut mesh, _) = star_cube(Point3::new(0.5, 0.5, 0.5));
        assert_eq!(split_improve(&mut mesh, Goal::Legal, 2.0), 0);
        assert_eq!(swap_improve(&mut mesh, Goal::Legal, 2.0), 0);
    }

    #[test]
    fn operators_respect_domains() {
        let (mut mesh, c) = star_cube(Point3::new(0.8, 0.7, 0.75));
        // One tet of the star belongs to another domain, pinning the vertex
        mesh.volume_elements[0].domain = 2;
        assert_eq!(smooth_improve(&mut mesh, Goal::Quality, 2.0), 0);
        assert_relative_eq!(mesh.position(c).x, 0.8);
    }
}
