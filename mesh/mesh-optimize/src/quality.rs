//! Element quality statistics.

// Element counts don't overflow f64 mantissa in practice
#![allow(clippy::cast_precision_loss)]

use mesh_types::VolumeMesh;
use rayon::prelude::*;

use crate::illegal::illegal_flags;

/// Number of histogram bins over quality `[0, 1]`.
pub const HISTOGRAM_BINS: usize = 10;

/// Quality distribution of the live volume elements of a mesh.
///
/// The quality of a pyramid or prism is that of its worst sub-tetrahedron.
///
/// # Example
///
/// ```
/// use mesh_optimize::QualityReport;
/// use mesh_types::{unit_cube_boundary, VolumeElement};
///
/// let mut mesh = unit_cube_boundary();
/// for t in [[0, 1, 2, 6], [0, 2, 3, 6], [0, 3, 7, 6], [0, 7, 4, 6], [0, 4, 5, 6], [0, 5, 1, 6]] {
///     mesh.add_volume_element(VolumeElement::tetrahedron(t).with_domain(1)).unwrap();
/// }
/// let report = QualityReport::compute(&mesh);
/// assert_eq!(report.element_count, 6);
/// assert_eq!(report.illegal_count, 0);
/// assert!(report.min_quality > 0.6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    /// Live volume elements.
    pub element_count: usize,
    /// Live tetrahedra.
    pub tet_count: usize,
    /// Worst element quality, `0` for an empty mesh.
    pub min_quality: f64,
    /// Mean element quality, `0` for an empty mesh.
    pub mean_quality: f64,
    /// Element counts per quality bin of width `0.1`; inverted elements
    /// fall in the first bin.
    pub histogram: [usize; HISTOGRAM_BINS],
    /// Elements that are inverted, flat, degenerate or on an overused face.
    pub illegal_count: usize,
}

impl Default for QualityReport {
    fn default() -> Self {
        Self {
            element_count: 0,
            tet_count: 0,
            min_quality: 0.0,
            mean_quality: 0.0,
            histogram: [0; HISTOGRAM_BINS],
            illegal_count: 0,
        }
    }
}

impl QualityReport {
    /// Compute statistics for every live volume element.
    #[must_use]
    pub fn compute(mesh: &VolumeMesh) -> Self {
        let qualities: Vec<f64> = mesh
            .volume_elements
            .par_iter()
            .filter(|el| !el.deleted)
            .map(|el| mesh.element_quality(el))
            .collect();
        if qualities.is_empty() {
            return Self::default();
        }

        let mut histogram = [0; HISTOGRAM_BINS];
        for &q in &qualities {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let bin = (q.clamp(0.0, 1.0) * HISTOGRAM_BINS as f64) as usize;
            histogram[bin.min(HISTOGRAM_BINS - 1)] += 1;
        }

        Self {
            element_count: qualities.len(),
            tet_count: mesh
                .volume_elements
                .iter()
                .filter(|el| !el.deleted && el.is_tet())
                .count(),
            min_quality: qualities.iter().copied().fold(f64::INFINITY, f64::min),
            mean_quality: qualities.iter().sum::<f64>() / qualities.len() as f64,
            histogram,
            illegal_count: illegal_flags(mesh).into_iter().filter(|&b| b).count(),
        }
    }

    /// True if every element is valid.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.illegal_count == 0
    }
}

impl std::fmt::Display for QualityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Quality Report:")?;
        writeln!(f, "  Elements: {} ({} tets)", self.element_count, self.tet_count)?;
        writeln!(f, "  Min quality: {:.3}", self.min_quality)?;
        writeln!(f, "  Mean quality: {:.3}", self.mean_quality)?;
        writeln!(f, "  Illegal: {}", self.illegal_count)?;
        writeln!(f, "  Histogram:")?;
        for (i, count) in self.histogram.iter().enumerate() {
            let lo = i as f64 / HISTOGRAM_BINS as f64;
            let hi = (i + 1) as f64 / HISTOGRAM_BINS as f64;
            writeln!(f, "    {lo:.1}-{hi:.1}: {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{Point3, VolumeElement};

    fn regular_tet() -> VolumeMesh {
        let s = 1.0 / 2.0_f64.sqrt();
        let mut mesh = VolumeMesh::new();
        mesh.add_point(Point3::new(1.0, 0.0, -s));
        mesh.add_point(Point3::new(-1.0, 0.0, -s));
        mesh.add_point(Point3::new(0.0, 1.0, s));
        mesh.add_point(Point3::new(0.0, -1.0, s));
        mesh
    }

    #[test]
    fn empty_mesh() {
        let report = QualityReport::compute(&VolumeMesh::new());
        assert_eq!(report, QualityReport::default());
        assert!(report.is_valid());
    }

    #[test]
    fn regular_tet_lands_in_top_bin() {
        let mut mesh = regular_tet();
        let mut el = VolumeElement::tetrahedron([0, 1, 2, 3]).with_domain(1);
        if mesh.element_volume(&el) < 0.0 {
            el = VolumeElement::tetrahedron([1, 0, 2, 3]).with_domain(1);
        }
        mesh.add_volume_element(el).unwrap();

        let report = QualityReport::compute(&mesh);
        assert_eq!(report.histogram[HISTOGRAM_BINS - 1], 1);
        assert_relative_eq!(report.min_quality, 1.0, epsilon = 1e-12);
        assert_relative_eq!(report.mean_quality, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn inverted_tet_counts_as_illegal() {
        let mut mesh = regular_tet();
        let mut el = VolumeElement::tetrahedron([0, 1, 2, 3]).with_domain(1);
        if mesh.element_volume(&el) > 0.0 {
            el = VolumeElement::tetrahedron([1, 0, 2, 3]).with_domain(1);
        }
        mesh.add_volume_element(el).unwrap();

        let report = QualityReport::compute(&mesh);
        assert_eq!(report.histogram[0], 1);
        assert_eq!(report.illegal_count, 1);
        assert!(report.min_quality < 0.0);
        assert!(!report.is_valid());
    }

    #[test]
    fn display_lists_bins() {
        let text = QualityReport::default().to_string();
        assert!(text.starts_with("Quality Report:"));
        assert!(text.contains("0.9-1.0: 0"));
    }
}
