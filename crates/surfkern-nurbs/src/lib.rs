#![warn(missing_docs)]

//! B-spline curves for the surfkern kernel.
//!
//! Provides non-rational B-spline curves in 3D and in a surface's parameter
//! plane. Both implement the curve traits from `surfkern-geom`, so they
//! mix freely with the analytic curve types.
//!
//! # Key types
//!
//! - [`BSplineCurve`] : non-rational B-spline curve in 3D
//! - [`BSplineCurve2d`] : non-rational B-spline curve in 2D
//!
//! # Algorithms
//!
//! - **De Boor's recurrences** for basis functions and their derivatives
//! - **Boehm's algorithm** for knot insertion, used for exact trimming
//! - **Global interpolation** for fitting sampled points

mod curve;
mod curve2d;
mod knots;
mod record;

pub use curve::BSplineCurve;
pub use curve2d::BSplineCurve2d;
pub use record::{
    boxed_curve2d, boxed_curve3d, curve2d_from_record, curve2d_to_record, curve3d_from_record,
    curve3d_to_record,
};
