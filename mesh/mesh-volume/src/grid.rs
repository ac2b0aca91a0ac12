//! Uniform hash grid used by the local mesher for range queries.

use hashbrown::HashMap;
use mesh_types::{Aabb, Point3};
use nalgebra::Vector3;
use smallvec::SmallVec;

type Cell = (i64, i64, i64);

/// Items bucketed by the grid cells their box overlaps.
///
/// Queries return every item whose registered box shares a cell with the
/// query box, sorted and without repeats. Callers do the exact test.
#[derive(Debug, Clone)]
pub(crate) struct HashGrid<T> {
    cell_size: f64,
    cells: HashMap<Cell, SmallVec<[T; 8]>>,
}

impl<T: Copy + Ord> HashGrid<T> {
    /// A grid of cubes with edge `cell_size`.
    ///
    /// A non-positive or non-finite size falls back to 1.
    pub(crate) fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_of(&self, p: &Point3<f64>) -> Cell {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }

    /// Register `item` at a single point.
    pub(crate) fn insert_point(&mut self, p: &Point3<f64>, item: T) {
        let cell = self.cell_of(p);
        self.cells.entry(cell).or_default().push(item);
    }

    /// Register `item` in every cell `aabb` overlaps.
    pub(crate) fn insert_box(&mut self, aabb: &Aabb, item: T) {
        let (lo, hi) = (self.cell_of(&aabb.min), self.cell_of(&aabb.max));
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    self.cells.entry((x, y, z)).or_default().push(item);
                }
            }
        }
    }

    /// Items registered in any cell `aabb` overlaps.
    pub(crate) fn query(&self, aabb: &Aabb) -> Vec<T> {
        let (lo, hi) = (self.cell_of(&aabb.min), self.cell_of(&aabb.max));
        let span = |a: i64, b: i64| {
            u128::try_from(b.saturating_sub(a).saturating_add(1)).unwrap_or(0)
        };
        let visits = span(lo.0, hi.0)
            .saturating_mul(span(lo.1, hi.1))
            .saturating_mul(span(lo.2, hi.2));

        let mut out = Vec::new();
        if visits > u128::try_from(self.cells.len()).unwrap_or(u128::MAX) {
            // Box larger than the occupied grid: scan the buckets instead
            let inside = |c: &Cell| {
                (lo.0..=hi.0).contains(&c.0)
                    && (lo.1..=hi.1).contains(&c.1)
                    && (lo.2..=hi.2).contains(&c.2)
            };
            for (cell, items) in &self.cells {
                if inside(cell) {
                    out.extend_from_slice(items);
                }
            }
        } else {
            for x in lo.0..=hi.0 {
                for y in lo.1..=hi.1 {
                    for z in lo.2..=hi.2 {
                        if let Some(items) = self.cells.get(&(x, y, z)) {
                            out.extend_from_slice(items);
                        }
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Cube of half-edge `radius` centred on `center`.
pub(crate) fn box_around(center: &Point3<f64>, radius: f64) -> Aabb {
    let r = Vector3::repeat(radius);
    Aabb {
        min: center - r,
        max: center + r,
    }
}
