//! Mesh store and element types for volume meshing.
//!
//! This crate holds the state shared by every stage of the volume mesher:
//!
//! - [`VolumeMesh`] - points, subdomain-tagged boundary faces and volume elements
//! - [`SurfaceElement`] / [`VolumeElement`] - the two element families
//! - [`Face`] / [`FaceKey`] - oriented faces and their orientation-free identity
//! - [`OpenFront`] - the unmeshed faces of a subdomain, rebuilt on demand
//! - [`Aabb`] - axis-aligned bounding box
//! - [`CancelFlag`] - cooperative stop request shared with the caller
//!
//! Geometric measures live in [`geometry`] and triangle intersection tests in
//! [`intersect`].
//!
//! # Orientation
//!
//! A surface element's normal (right-hand rule) points from `domain_in` to
//! `domain_out`. Open-front faces are turned so that their normal points into
//! the part of the subdomain that still has to be filled. Volume element
//! faces returned by [`VolumeElement::outward_faces`] point out of the element,
//! so a front face is closed by an element face with the same corners and
//! opposite orientation.
//!
//! # Example
//!
//! ```
//! use mesh_types::{unit_cube_boundary, OpenFront, VolumeElement};
//!
//! let mut mesh = unit_cube_boundary();
//! for t in [[0, 1, 2, 6], [0, 2, 3, 6], [0, 3, 7, 6], [0, 7, 4, 6], [0, 4, 5, 6], [0, 5, 1, 6]] {
//!     mesh.add_volume_element(VolumeElement::tetrahedron(t).with_domain(1)).unwrap();
//! }
//! assert!(OpenFront::compute(&mesh, 1).is_empty());
//! assert!((mesh.total_volume(1) - 1.0).abs() < 1e-12);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod bounds;
mod cancel;
mod element;
mod error;
mod face;
mod front;
pub mod geometry;
pub mod intersect;
mod shapes;
mod store;
mod vertex;

pub use bounds::Aabb;
pub use cancel::CancelFlag;
pub use element::{
    ElementKind, ElementVertices, SurfaceElement, VolumeElement, OUTSIDE, UNASSIGNED,
};
pub use error::{MeshError, MeshResult};
pub use face::{normalize_edge, Face, FaceKey, FaceVertices};
pub use front::OpenFront;
pub use shapes::{
    box_row_boundary, l_shape_boundary, subdivided_box_boundary, unit_cube_boundary,
};
pub use store::VolumeMesh;
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
