//! Error types for curve construction and persistence.

use thiserror::Error;

/// Errors that can occur while building or restoring curves.
#[derive(Error, Debug)]
pub enum GeomError {
    /// Input geometry is degenerate (zero-length axis, coincident points, ...).
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// Knot vector does not match the control points and degree.
    #[error("invalid knot vector: len={len} but expected {expected} (n={n_points}, p={degree})")]
    InvalidKnots {
        /// Actual knot vector length.
        len: usize,
        /// Expected knot vector length.
        expected: usize,
        /// Number of control points.
        n_points: usize,
        /// Polynomial degree.
        degree: usize,
    },

    /// B-spline knot vectors must repeat their end knots `degree + 1` times.
    #[error("knot vector is not clamped for degree {degree}")]
    NotClamped {
        /// Polynomial degree.
        degree: usize,
    },

    /// Interpolation system could not be solved.
    #[error("interpolation failed: {0}")]
    Interpolation(String),

    /// The curve type has no persistent representation.
    #[error("curve type cannot be persisted: {0}")]
    NotPersistable(String),
}

/// Result type for curve operations.
pub type Result<T> = std::result::Result<T, GeomError>;
