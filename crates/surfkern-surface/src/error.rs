//! Error types for surface construction and persistence.

use surfkern_geom::GeomError;
use thiserror::Error;

use crate::SurfaceKind;

/// Errors that can occur when building or persisting surfaces.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The defining data does not describe a valid surface.
    #[error("invalid surface construction: {0}")]
    InvalidConstruction(String),

    /// The surface has no serializable description.
    #[error("surface of kind {0:?} cannot be persisted")]
    NotPersistable(SurfaceKind),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A curve operation failed.
    #[error(transparent)]
    Geom(#[from] GeomError),
}

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, SurfaceError>;
