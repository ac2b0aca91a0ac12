//! Rule-based advancing-front mesher.
//!
//! One pass repeatedly takes the front face that has failed least often,
//! asks the rules of a table for candidate elements on it and commits the
//! first one that fits. The working front is patched as elements are
//! committed; the store-wide [`OpenFront`] is recomputed by the caller
//! between passes.

use hashbrown::{HashMap, HashSet};
use mesh_types::geometry::{self, MIN_QUALITY};
use mesh_types::intersect::triangles_conflict;
use mesh_types::{Aabb, Face, FaceKey, MeshResult, OpenFront, Point3, VolumeElement, VolumeMesh};
use smallvec::SmallVec;
use tracing::debug;

use crate::grid::{box_around, HashGrid};
use crate::rules::{BaseShape, Rule, RuleAction, RuleTable};

/// Placeholder index of the point a candidate would insert.
const NEW_POINT: u32 = u32::MAX;

/// Relative slack of the point-in-element test. Negative, so points on the
/// element boundary count as inside.
const INSIDE_TOL: f64 = -1e-9;

/// Growth of the point query box around a candidate, relative to the face
/// size, so points the inside test accepts on its slack are still found.
const QUERY_SLACK: f64 = 1e-6;

/// New points closer than this fraction of the face size to an existing
/// point are rejected.
const MIN_POINT_SPACING: f64 = 0.3;

/// Smallest face size used for the spacing test, as a fraction of the mean
/// face size the pass started with.
const SPACING_FLOOR: f64 = 0.5;

/// Margin added around the domain box for new points, as a fraction of
/// its diagonal.
pub(crate) const BOX_MARGIN: f64 = 0.01;

/// Base search radius in units of the face size.
const BASE_RADIUS: f64 = 1.5;

/// What a pass works on.
#[derive(Debug, Clone, Default)]
pub struct PassInput {
    /// Open faces, normals pointing into the unmeshed region.
    pub faces: Vec<Face>,
    /// Boundary faces of the subdomain. Those not on the front are already
    /// closed, and no new element may cross them.
    pub walls: Vec<Face>,
    /// Bounding box of the subdomain boundary. New points must lie in it.
    pub bounds: Aabb,
    /// Points that may become element corners.
    pub points: Vec<u32>,
}

impl PassInput {
    /// Current front of subdomain `k` with every used point inside its box.
    ///
    /// Points no element refers to any more, left behind when elements were
    /// removed, are not offered.
    #[must_use]
    pub fn for_domain(mesh: &VolumeMesh, k: u32) -> Self {
        let bounds = mesh.domain_bounds(k);
        let used = mesh.referenced_points();
        let points = mesh
            .points_in(&bounds.expanded(BOX_MARGIN * bounds.diagonal()))
            .into_iter()
            .filter(|&v| used[v as usize])
            .collect();
        Self {
            faces: OpenFront::compute(mesh, k).into_faces(),
            walls: mesh.boundary_of(k).filter_map(|se| se.face_into(k)).collect(),
            bounds,
            points,
        }
    }
}

/// Limits of a single pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassConfig {
    /// Failure class above which a face is abandoned.
    pub give_up_tolerance: u32,
    /// Search radius level; the radius is `h·(1.5 + level)`.
    pub search_level: u32,
    /// Face selections before the pass stops.
    pub max_steps: usize,
    /// Largest element size wanted.
    pub target_size: f64,
    /// The pass stops once more faces than this are open.
    pub max_open_faces: usize,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            give_up_tolerance: 15,
            search_level: 0,
            max_steps: 100_000,
            target_size: f64::INFINITY,
            max_open_faces: usize::MAX,
        }
    }
}

/// Counts collected during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Face selections made.
    pub steps: usize,
    /// Elements committed.
    pub elements_added: usize,
    /// Points inserted.
    pub points_added: usize,
    /// Faces that exceeded the give-up tolerance.
    pub faces_abandoned: usize,
    /// Faces still open on the working front.
    pub faces_open: usize,
    /// The pass stopped because the front outgrew `max_open_faces`.
    pub front_overflow: bool,
    /// Commits per rule, in table order.
    pub rule_hits: Vec<usize>,
}

impl std::fmt::Display for PassStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pass: {} steps, {} elements, {} points, {} abandoned, {} open",
            self.steps,
            self.elements_added,
            self.points_added,
            self.faces_abandoned,
            self.faces_open
        )
    }
}

#[derive(Debug, Clone)]
struct FrontFace {
    face: Face,
    area: f64,
    class: u32,
    open: bool,
    active: bool,
}

/// How a face of a candidate relates to the working front.
enum Match {
    /// Closes the open face with this index.
    Closes(usize),
    /// Not on the front yet.
    Fresh,
    /// Repeats an open face or reuses a face that is already closed.
    Blocked,
}

/// The front as seen by one pass, patched on every commit.
///
/// Closed faces stay registered so that later elements cannot cross them.
struct WorkingFront {
    faces: Vec<FrontFace>,
    open: usize,
    /// Mean face size when the pass started.
    reference_size: f64,
    by_key: HashMap<FaceKey, SmallVec<[usize; 2]>>,
    /// Faces using each vertex, in push order.
    by_vertex: HashMap<u32, SmallVec<[usize; 6]>>,
    /// Faces bucketed by their bounding box.
    grid: HashGrid<usize>,
    /// Faces of stored elements that are not on the front.
    interior: HashSet<FaceKey>,
}

impl WorkingFront {
    fn new(mesh: &VolumeMesh, faces: &[Face], walls: &[Face], cell_size: f64) -> Self {
        let open: HashSet<FaceKey> = faces.iter().map(Face::key).collect();
        let interior = mesh
            .volume_elements
            .iter()
            .filter(|el| !el.deleted)
            .flat_map(|el| el.outward_faces())
            .map(|face| face.key())
            .filter(|key| !open.contains(key))
            .collect();
        let mut front = Self {
            faces: Vec::with_capacity(faces.len() + walls.len()),
            open: 0,
            reference_size: cell_size,
            by_key: HashMap::with_capacity(faces.len()),
            by_vertex: HashMap::with_capacity(faces.len()),
            grid: HashGrid::new(cell_size),
            interior,
        };
        for face in faces {
            front.push(mesh, face.clone());
        }
        for wall in walls.iter().filter(|w| !open.contains(&w.key())) {
            let index = front.faces.len();
            front.push(mesh, wall.clone());
            front.close(index);
            front.faces[index].active = false;
        }
        front
    }

    fn close(&mut self, index: usize) {
        let entry = &mut self.faces[index];
        if entry.open {
            entry.open = false;
            self.open -= 1;
        }
    }

    fn push(&mut self, mesh: &VolumeMesh, face: Face) {
        let index = self.faces.len();
        let corners = mesh.face_positions(&face);
        let area = geometry::polygon_normal(&corners).norm() * 0.5;
        self.by_key.entry(face.key()).or_default().push(index);
        for &v in face.vertices() {
            self.by_vertex.entry(v).or_default().push(index);
        }
        self.grid.insert_box(&Aabb::from_points(corners.iter()), index);
        self.faces.push(FrontFace {
            face,
            area,
            class: 1,
            open: true,
            active: true,
        });
        self.open += 1;
    }

    /// Open and closed faces whose box may meet `aabb`, in index order.
    fn near(&self, aabb: &Aabb) -> Vec<usize> {
        self.grid.query(aabb)
    }

    /// Faces using any of `vertices`, in index order.
    fn touching(&self, vertices: &[u32]) -> Vec<usize> {
        let mut out: Vec<usize> = vertices
            .iter()
            .filter_map(|v| self.by_vertex.get(v))
            .flatten()
            .copied()
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Lowest class, then smallest area, then oldest.
    fn select(&self, base: BaseShape) -> Option<usize> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.open && f.active && f.face.is_quad() == (base == BaseShape::Quad))
            .min_by(|(i, a), (j, b)| {
                a.class
                    .cmp(&b.class)
                    .then(a.area.total_cmp(&b.area))
                    .then(i.cmp(j))
            })
            .map(|(i, _)| i)
    }

    fn classify(&self, face: &Face, base: usize) -> Match {
        if face.contains(NEW_POINT) {
            return Match::Fresh;
        }
        let key = face.key();
        if self.interior.contains(&key) {
            return Match::Blocked;
        }
        let Some(slots) = self.by_key.get(&key) else {
            return Match::Fresh;
        };
        let mut closes = None;
        for &j in slots {
            let entry = &self.faces[j];
            if !entry.open {
                if j != base {
                    return Match::Blocked;
                }
            } else if entry.face.same_orientation(face) {
                return Match::Blocked;
            } else {
                closes = Some(j);
            }
        }
        closes.map_or(Match::Fresh, Match::Closes)
    }
}

/// A candidate element, possibly referring to [`NEW_POINT`].
struct Candidate {
    element: VolumeElement,
    new_point: Option<Point3<f64>>,
    quality: f64,
}

/// Geometry of the face being worked on.
struct Site {
    index: usize,
    vertices: SmallVec<[u32; 4]>,
    centroid: Point3<f64>,
    normal: nalgebra::Vector3<f64>,
    size: f64,
}

/// Advancing-front mesher driven by one rule table.
///
/// # Example
///
/// ```
/// use mesh_types::{unit_cube_boundary, OpenFront};
/// use mesh_volume::{LocalMesher, PassConfig, PassInput, RuleSet};
///
/// let mut mesh = unit_cube_boundary();
/// let rules = RuleSet::standard();
/// let input = PassInput::for_domain(&mesh, 1);
///
/// let stats = LocalMesher::new(&rules.tetrahedral)
///     .run(&mut mesh, &input, &PassConfig::default())
///     .unwrap();
/// mesh.tag_new_elements(0, 1);
///
/// assert_eq!(stats.faces_open, 0);
/// assert!(OpenFront::compute(&mesh, 1).is_empty());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LocalMesher<'a> {
    table: &'a RuleTable,
}

impl<'a> LocalMesher<'a> {
    /// Create a mesher for `table`.
    #[must_use]
    pub const fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }

    /// Run one pass over `input`.
    ///
    /// New elements are added with the unassigned domain; the caller tags
    /// them with [`VolumeMesh::tag_new_elements`].
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`](mesh_types::MeshError) if an element cannot
    /// be stored, which indicates a corrupted input.
    pub fn run(
        &self,
        mesh: &mut VolumeMesh,
        input: &PassInput,
        config: &PassConfig,
    ) -> MeshResult<PassStats> {
        let base = self.table.base();
        let cell_size = mean_face_size(mesh, &input.faces);
        let mut front = WorkingFront::new(mesh, &input.faces, &input.walls, cell_size);
        let mut points = HashGrid::new(cell_size);
        for &v in input
            .points
            .iter()
            .chain(input.faces.iter().flat_map(|face| face.vertices()))
        {
            points.insert_point(mesh.position(v), v);
        }
        let bounds = input.bounds;
        let mut stats = PassStats {
            rule_hits: vec![0; self.table.rules.len()],
            ..PassStats::default()
        };

        while stats.steps < config.max_steps {
            if front.open > config.max_open_faces {
                stats.front_overflow = true;
                break;
            }
            let Some(index) = front.select(base) else {
                break;
            };
            stats.steps += 1;

            let site = site_of(mesh, &front, index);
            let chosen = self.table.rules.iter().enumerate().find_map(|(r, rule)| {
                self.best_candidate(mesh, &front, &site, rule, &points, &bounds, config)
                    .map(|candidate| (r, candidate))
            });

            match chosen {
                Some((r, candidate)) => {
                    commit(mesh, &mut front, &mut points, index, candidate, &mut stats)?;
                    stats.rule_hits[r] += 1;
                }
                None => {
                    let entry = &mut front.faces[index];
                    entry.class += 1;
                    if entry.class > config.give_up_tolerance {
                        entry.active = false;
                        stats.faces_abandoned += 1;
                    }
                }
            }
        }

        stats.faces_open = front.open;
        debug!(
            stage = self.table.stage.name(),
            steps = stats.steps,
            elements = stats.elements_added,
            points = stats.points_added,
            abandoned = stats.faces_abandoned,
            open = stats.faces_open,
            overflow = stats.front_overflow,
            "Local mesher pass finished"
        );
        Ok(stats)
    }

    /// Best fitting candidate of `rule`, if any.
    #[allow(clippy::too_many_arguments)]
    fn best_candidate(
        &self,
        mesh: &VolumeMesh,
        front: &WorkingFront,
        site: &Site,
        rule: &Rule,
        points: &HashGrid<u32>,
        bounds: &Aabb,
        config: &PassConfig,
    ) -> Option<Candidate> {
        let class = front.faces[site.index].class;
        if !rule.applies_at(class) || (rule.base == BaseShape::Quad) != (site.vertices.len() == 4) {
            return None;
        }
        let threshold = rule.threshold(class);
        let mut candidates: Vec<Candidate> = propose(mesh, front, site, rule, points, config)
            .into_iter()
            .filter_map(|(element, new_point)| {
                let quality = candidate_quality(mesh, &element, new_point.as_ref());
                (quality > MIN_QUALITY && quality >= threshold).then_some(Candidate {
                    element,
                    new_point,
                    quality,
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        candidates
            .into_iter()
            .find(|c| fits(mesh, front, site, c, points, bounds))
    }
}

fn site_of(mesh: &VolumeMesh, front: &WorkingFront, index: usize) -> Site {
    let face = &front.faces[index].face;
    let corners = mesh.face_positions(face);
    let normal = geometry::polygon_normal(&corners);
    Site {
        index,
        vertices: face.vertices().iter().copied().collect(),
        centroid: geometry::centroid(&corners),
        normal: normal.try_normalize(f64::EPSILON).unwrap_or(normal),
        size: geometry::mean_edge_length(&corners),
    }
}

/// Mean edge length over `faces`, used as the grid cell size.
#[allow(clippy::cast_precision_loss)]
fn mean_face_size(mesh: &VolumeMesh, faces: &[Face]) -> f64 {
    let total: f64 = faces
        .iter()
        .map(|face| geometry::mean_edge_length(&mesh.face_positions(face)))
        .sum();
    total / faces.len() as f64
}

/// Elements a rule suggests on the site, not yet filtered.
fn propose(
    mesh: &VolumeMesh,
    front: &WorkingFront,
    site: &Site,
    rule: &Rule,
    points: &HashGrid<u32>,
    config: &PassConfig,
) -> Vec<(VolumeElement, Option<Point3<f64>>)> {
    let v = &site.vertices;
    let radius = site.size * (BASE_RADIUS + f64::from(config.search_level));
    let height_scale = site.size.min(config.target_size);
    let apex_element = |apex: u32| -> VolumeElement {
        if v.len() == 4 {
            VolumeElement::pyramid([v[0], v[1], v[2], v[3], apex])
        } else {
            VolumeElement::tetrahedron([v[0], v[1], v[2], apex])
        }
    };
    let within_radius = || -> Vec<u32> {
        points
            .query(&box_around(&site.centroid, radius))
            .into_iter()
            .filter(|&p| !v.contains(&p) && (mesh.position(p) - site.centroid).norm() <= radius)
            .collect()
    };

    match rule.action {
        RuleAction::CloseAdjacent => adjacent_apexes(front, site)
            .into_iter()
            .filter(|&apex| (mesh.position(apex) - site.centroid).norm() <= radius)
            .map(|apex| (apex_element(apex), None))
            .collect(),
        RuleAction::PyramidToTriangle => adjacent_apexes(front, site)
            .into_iter()
            .map(|apex| (apex_element(apex), None))
            .collect(),
        RuleAction::ConnectExisting | RuleAction::PyramidToPoint => within_radius()
            .into_iter()
            .map(|apex| (apex_element(apex), None))
            .collect(),
        RuleAction::InsertPoint { height } | RuleAction::PyramidInsert { height } => {
            let apex = site.centroid + site.normal * (height * height_scale);
            vec![(apex_element(NEW_POINT), Some(apex))]
        }
        RuleAction::ClosePrism => prisms(front, site)
            .into_iter()
            .map(|el| (el, None))
            .collect(),
    }
}

/// Far corners of open triangles sharing an edge with the site.
fn adjacent_apexes(front: &WorkingFront, site: &Site) -> Vec<u32> {
    let mut apexes: Vec<u32> = Vec::new();
    for j in front.touching(&site.vertices) {
        let entry = &front.faces[j];
        if !entry.open || j == site.index || entry.face.is_quad() {
            continue;
        }
        let shared = entry
            .face
            .vertices()
            .iter()
            .filter(|p| site.vertices.contains(p))
            .count();
        if shared != 2 {
            continue;
        }
        for &p in entry.face.vertices() {
            if !site.vertices.contains(&p) && !apexes.contains(&p) {
                apexes.push(p);
            }
        }
    }
    apexes
}

/// Open triangle containing the directed edge `a -> b`, returning its
/// third corner.
fn triangle_on_edge(front: &WorkingFront, a: u32, b: u32) -> Vec<u32> {
    front
        .by_vertex
        .get(&a)
        .into_iter()
        .flatten()
        .map(|&j| &front.faces[j])
        .filter(|f| f.open && !f.face.is_quad() && f.face.next_after(a) == Some(b))
        .filter_map(|f| f.face.vertices().iter().copied().find(|&p| p != a && p != b))
        .collect()
}

/// Prisms over the site quad whose two triangular ends are on the front.
///
/// With the quad `(q0, q1, q2, q3)` the ends are the open triangles on
/// `q0 -> q3` and `q2 -> q1`; both rotations of the quad are tried.
fn prisms(front: &WorkingFront, site: &Site) -> Vec<VolumeElement> {
    let mut out = Vec::new();
    for shift in 0..2 {
        let q: [u32; 4] = std::array::from_fn(|i| site.vertices[(i + shift) % 4]);
        for bottom in triangle_on_edge(front, q[0], q[3]) {
            for top in triangle_on_edge(front, q[2], q[1]) {
                out.push(VolumeElement::prism([q[0], q[3], bottom, q[1], q[2], top]));
            }
        }
    }
    out
}

fn resolve(mesh: &VolumeMesh, v: u32, new_point: Option<&Point3<f64>>) -> Point3<f64> {
    match new_point {
        Some(p) if v == NEW_POINT => *p,
        _ => *mesh.position(v),
    }
}

fn candidate_quality(mesh: &VolumeMesh, el: &VolumeElement, new_point: Option<&Point3<f64>>) -> f64 {
    if el.has_repeated_vertices() {
        return 0.0;
    }
    el.kind
        .sub_tets()
        .iter()
        .map(|t| {
            let [a, b, c, d] = t.map(|i| resolve(mesh, el.vertices[i], new_point));
            geometry::tet_quality(&a, &b, &c, &d)
        })
        .fold(f64::INFINITY, f64::min)
}

/// The fit test: the candidate must fill part of the unmeshed region
/// without crossing the front or swallowing a point.
fn fits(
    mesh: &VolumeMesh,
    front: &WorkingFront,
    site: &Site,
    candidate: &Candidate,
    points: &HashGrid<u32>,
    bounds: &Aabb,
) -> bool {
    let new_point = candidate.new_point.as_ref();
    let pos = |v: u32| resolve(mesh, v, new_point);

    if let Some(p) = new_point {
        if !bounds.contains(p) {
            return false;
        }
        let spacing = MIN_POINT_SPACING * site.size.max(SPACING_FLOOR * front.reference_size);
        if points
            .query(&box_around(p, spacing))
            .into_iter()
            .any(|q| (mesh.position(q) - p).norm() < spacing)
        {
            return false;
        }
    }

    let mut closing: SmallVec<[usize; 6]> = SmallVec::new();
    let mut fresh: SmallVec<[Face; 5]> = SmallVec::new();
    for face in candidate.element.outward_faces() {
        match front.classify(&face, site.index) {
            Match::Closes(j) => closing.push(j),
            Match::Fresh => fresh.push(face),
            Match::Blocked => return false,
        }
    }
    if !closing.contains(&site.index) {
        return false;
    }

    for face in &fresh {
        for tri in face.triangles() {
            let tri_pos = tri.map(pos);
            let tri_box = Aabb::from_points(tri_pos.iter());
            for j in front.near(&tri_box) {
                if closing.contains(&j) {
                    continue;
                }
                let entry = &front.faces[j];
                if covers(&entry.face, &tri) || covers(face, &FaceKey::new(entry.face.vertices())) {
                    return false;
                }
                for other in entry.face.triangles() {
                    let other_pos = mesh.triangle_positions(&other);
                    if tri_box.intersects(&Aabb::from_points(other_pos.iter()))
                        && triangles_conflict(&tri, &tri_pos, &other, &other_pos)
                    {
                        return false;
                    }
                }
            }
        }
    }

    let corners = &candidate.element.vertices;
    for t in candidate.element.kind.sub_tets() {
        let [a, b, c, d] = t.map(|i| pos(corners[i]));
        let tet_box = Aabb::from_points([a, b, c, d].iter()).expanded(QUERY_SLACK * site.size);
        if points
            .query(&tet_box)
            .into_iter()
            .filter(|q| !corners.contains(q))
            .any(|q| geometry::point_in_tet(mesh.position(q), &a, &b, &c, &d, INSIDE_TOL))
        {
            return false;
        }
    }
    true
}

/// True if every corner of `part` is a corner of `whole`, with `whole`
/// having more corners. Such a face would lie inside the larger one.
fn covers(whole: &Face, part: &impl Corners) -> bool {
    let corners = part.corners();
    whole.len() > corners.len() && corners.iter().all(|&v| whole.contains(v))
}

trait Corners {
    fn corners(&self) -> SmallVec<[u32; 4]>;
}

impl Corners for [u32; 3] {
    fn corners(&self) -> SmallVec<[u32; 4]> {
        SmallVec::from_slice(self)
    }
}

impl Corners for FaceKey {
    fn corners(&self) -> SmallVec<[u32; 4]> {
        SmallVec::from_slice(self.vertices())
    }
}

fn commit(
    mesh: &mut VolumeMesh,
    front: &mut WorkingFront,
    points: &mut HashGrid<u32>,
    index: usize,
    candidate: Candidate,
    stats: &mut PassStats,
) -> MeshResult<()> {
    let mut element = candidate.element;
    if let Some(p) = candidate.new_point {
        let v = mesh.add_point(p);
        for corner in &mut element.vertices {
            if *corner == NEW_POINT {
                *corner = v;
            }
        }
        points.insert_point(&p, v);
        stats.points_added += 1;
    }

    let faces = element.outward_faces();
    mesh.add_volume_element(element)?;
    stats.elements_added += 1;

    front.close(index);
    for face in faces {
        match front.classify(&face, index) {
            Match::Closes(j) => front.close(j),
            Match::Fresh => front.push(mesh, face),
            Match::Blocked => {}
        }
    }
    Ok(())
}
