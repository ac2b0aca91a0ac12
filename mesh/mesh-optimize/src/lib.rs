//! Quality optimization and illegal-element repair for tetrahedral meshes.
//!
//! After the volume mesher has filled every subdomain, this crate improves
//! the result in place:
//!
//! - [`optimize_volume`] - rounds of local operators lowering the summed
//!   element badness `(1/q)^p`
//! - [`remove_illegal_elements`] - legal-only moves around inverted, flat,
//!   degenerate or non-manifold elements
//! - [`QualityReport`] - quality statistics and histogram
//!
//! The operators are combine (`c`), split (`d`), swap (`s`, `u`), swap2 (`t`)
//! and smooth (`m`, `M`); [`OptimizeParams::from_operator_string`] turns an
//! operator string into a sequence.
//!
//! No operator moves or removes a boundary or locked vertex, changes an
//! edge or face of a surface element, or mixes elements of different
//! subdomains. Pyramids and prisms are left untouched.
//!
//! # Example
//!
//! ```
//! use mesh_optimize::{optimize_volume, remove_illegal_elements, OptimizeParams, QualityReport};
//! use mesh_types::{unit_cube_boundary, Point3, VolumeElement};
//!
//! let mut mesh = unit_cube_boundary();
//! let centre = mesh.add_point(Point3::new(0.7, 0.4, 0.6));
//! for se in mesh.surface_elements.clone() {
//!     let v = se.face.vertices();
//!     mesh.add_volume_element(VolumeElement::tetrahedron([v[0], v[2], v[1], centre]).with_domain(1))
//!         .unwrap();
//! }
//!
//! let before = QualityReport::compute(&mesh);
//! optimize_volume(&mut mesh, &OptimizeParams::default(), None);
//! let repair = remove_illegal_elements(&mut mesh, 10);
//! let after = QualityReport::compute(&mesh);
//!
//! assert!(repair.is_clean());
//! assert!(after.min_quality >= before.min_quality);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod illegal;
mod ops;
mod optimize;
mod params;
mod quality;
mod topology;

pub use error::{OptimizeError, OptimizeResult};
pub use illegal::{illegal_flags, mark_illegal_elements, remove_illegal_elements, RepairReport};
pub use ops::{
    combine_improve, smooth_improve, split_improve, swap2_improve, swap_improve, Goal,
};
pub use optimize::{apply_operator, optimize_volume, OptimizeReport};
pub use params::{Operator, OptimizeParams, DEFAULT_OPERATORS, DEFAULT_REPAIR_CAP};
pub use quality::{QualityReport, HISTOGRAM_BINS};
