//! Volume mesh generation from closed, subdomain-tagged boundaries.
//!
//! This umbrella crate re-exports the mesh-* crates, providing a unified API
//! for turning a boundary mesh into tetrahedra (with pyramid and prism
//! transitions at quads).
//!
//! # Quick Start
//!
//! ```
//! use mesh::prelude::*;
//!
//! let mut mesh = unit_cube_boundary();
//! let rules = RuleSet::standard();
//!
//! let outcome = VolumeMesher::new(&rules, MeshingParams::default())
//!     .run(&mut mesh)
//!     .unwrap();
//!
//! assert!(outcome.is_completed());
//! assert!(OpenFront::compute(&mesh, 1).is_empty());
//! println!("{}", outcome.quality);
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Mesh store, elements, faces, open front, geometric predicates
//! - [`boundary`] - Subdomain boundary consistency checks
//! - [`volume`] - Rule-based and Delaunay meshing, retry controller, pipeline
//! - [`optimize`] - Quality optimization and illegal-element repair
//!
//! # Feature Flags
//!
//! - `serde` - Serialization of mesh types, parameters and rule tables

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![doc(html_root_url = "https://docs.rs/mesh/0.7.0")]

// =============================================================================
// Re-exports
// =============================================================================

/// Mesh store, elements, faces, open front and geometric predicates.
pub use mesh_types as types;

/// Subdomain boundary consistency checks.
pub use mesh_boundary as boundary;

/// Rule-based and Delaunay volume meshing.
pub use mesh_volume as volume;

/// Quality optimization and illegal-element repair.
pub use mesh_optimize as optimize;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for volume meshing.
///
/// # Usage
///
/// ```
/// use mesh::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use mesh_types::{
        box_row_boundary, l_shape_boundary, subdivided_box_boundary, unit_cube_boundary, Aabb,
        CancelFlag, Face, OpenFront, Point3, SurfaceElement, VolumeElement, VolumeMesh,
    };

    // Boundary checks
    pub use mesh_boundary::{validate_all, BoundaryError, ValidationOptions};

    // Volume meshing (main use case)
    pub use mesh_volume::{
        MeshingOutcome, MeshingParams, MeshingStatus, RuleSet, RunStatus, VolumeError,
        VolumeMesher,
    };

    // Quality
    pub use mesh_optimize::QualityReport;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let mesh = unit_cube_boundary();
        assert_eq!(mesh.domain_count(), 1);
        assert_eq!(OpenFront::compute(&mesh, 1).len(), 12);
        assert!(MeshingParams::default().validate().is_ok());
    }

    #[test]
    fn test_module_reexports() {
        let _ = types::VolumeMesh::new();
        let _ = boundary::ValidationOptions::default();
        let _ = volume::RuleSet::standard();
        let _ = optimize::OptimizeParams::default();
    }
}
