//! Volume meshing of closed, subdomain-tagged boundary meshes.
//!
//! [`VolumeMesher`] fills every subdomain of a [`VolumeMesh`](mesh_types::VolumeMesh)
//! with tetrahedra, using pyramids and prisms where the boundary has quads:
//!
//! 1. every subdomain boundary is validated (`mesh-boundary`)
//! 2. prism and pyramid rule tables close the open quads
//! 3. an optional [`delaunay_fill`] fills what it safely can
//! 4. the [`SubdomainController`] runs tetrahedral rule passes with a
//!    growing give-up tolerance until the front is empty
//! 5. the optimizer and illegal-element repair run over the whole mesh
//!    (`mesh-optimize`)
//!
//! Rule tables are plain data in a [`RuleSet`]; [`LocalMesher`] runs one of
//! them over a front. Subdomains are meshed in order and a [`CancelFlag`](mesh_types::CancelFlag)
//! is polled between passes.
//!
//! # Example
//!
//! ```
//! use mesh_types::{box_row_boundary, OpenFront};
//! use mesh_volume::{MeshingParams, RuleSet, RunStatus, VolumeMesher};
//!
//! let mut mesh = box_row_boundary(2);
//! let rules = RuleSet::standard();
//! let params = MeshingParams::default().with_delaunay(false);
//!
//! let result = VolumeMesher::new(&rules, params).run(&mut mesh);
//! assert_eq!(RunStatus::of(&result), RunStatus::Ok);
//!
//! let outcome = result.unwrap();
//! assert_eq!(outcome.subdomains.len(), 2);
//! assert!(OpenFront::compute(&mesh, 1).is_empty());
//! assert!(OpenFront::compute(&mesh, 2).is_empty());
//! ```
//!
//! # Errors
//!
//! An inconsistent boundary, quads the transition stages cannot close and
//! a subdomain that is still open after `max_outer_steps` attempts end the
//! run with a [`VolumeError`]. Residual illegal elements after repair are
//! only reported.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod controller;
mod delaunay;
mod error;
mod grid;
mod local;
mod mesher;
mod params;
mod rules;
mod status;

pub use controller::{SubdomainController, SubdomainReport};
pub use delaunay::{delaunay_fill, DelaunayStats, SLIVER_QUALITY};
pub use error::{VolumeError, VolumeResult};
pub use local::{LocalMesher, PassConfig, PassInput, PassStats};
pub use mesher::{MeshingOutcome, VolumeMesher};
pub use params::{MeshingParams, TOLERANCE_STEP};
pub use rules::{BaseShape, Rule, RuleAction, RuleSet, RuleStage, RuleTable, REGULAR_TET_HEIGHT};
pub use status::{MeshingStatus, PassState, RunStatus};
