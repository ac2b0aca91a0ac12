//! Error types for mesh store operations.

use thiserror::Error;

use crate::element::ElementKind;

/// Result type for mesh store operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors raised when an element refers to data the store does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    /// An element refers to a point that does not exist.
    #[error("invalid vertex index {index} (mesh has {vertex_count} points)")]
    InvalidIndex {
        /// The invalid index.
        index: u32,
        /// Number of points in the store.
        vertex_count: usize,
    },

    /// The vertex list does not match the element kind.
    #[error("{kind:?} needs {expected} vertices, got {actual}")]
    WrongVertexCount {
        /// Element kind being added.
        kind: ElementKind,
        /// Vertices required by the kind.
        expected: usize,
        /// Vertices supplied.
        actual: usize,
    },
}
