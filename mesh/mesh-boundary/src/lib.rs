//! Boundary consistency checks for subdomain-tagged surface meshes.
//!
//! A subdomain can only be filled with volume elements if its bounding
//! surface is closed, manifold, consistently oriented and free of
//! overlaps. This crate checks those conditions per subdomain:
//!
//! - [`validate_subdomain`] - fatal check used by the volume mesher
//! - [`inspect_subdomain`] - the same checks as a [`BoundaryReport`]
//! - [`EdgeAdjacency`] - edge-to-face lookups over oriented faces
//!
//! Validation only reads the mesh, so running it twice on an unchanged
//! boundary gives the same answer.
//!
//! # Example
//!
//! ```
//! use mesh_boundary::{validate_all, ValidationOptions};
//! use mesh_types::box_row_boundary;
//!
//! let mesh = box_row_boundary(3);
//! let reports = validate_all(&mesh, &ValidationOptions::default()).unwrap();
//! assert_eq!(reports.len(), 3);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod adjacency;
mod error;
mod validate;

pub use adjacency::EdgeAdjacency;
pub use error::{BoundaryError, BoundaryResult};
pub use validate::{
    inspect_subdomain, validate_all, validate_subdomain, BoundaryReport, ValidationOptions,
};
