#![warn(missing_docs)]

//! Parametric surfaces for the surfkern kernel.
//!
//! Every surface implements the [`Surface`] trait: evaluation with first and
//! second derivatives, point inversion, isoparametric curves, projection of
//! 3D curves into parameter space and back, and intersection with a plane
//! returning [`DualSurfaceCurve`]s.
//!
//! # Key types
//!
//! - [`CylindricalSurfaceNp`] : cylinder reparameterized so the annulus
//!   `r/2 ≤ |(u, v)| ≤ r` covers the patch between the base and the top of
//!   its axis
//! - [`HelicalSurface`] : a planar profile swept along a helix
//! - [`SurfaceOfLinearExtrusion`] : a 3D curve swept along a direction
//! - [`Plane`](surfkern_geom::Plane) : the plane as a surface
//! - [`SectionCurve2d`] : cylinder parameter curves in polar form
//!
//! # Strategy chains
//!
//! Projection, lifting and plane intersection try the exact constructions a
//! surface knows about first, in order, and fall back to the generic numeric
//! routines in [`sampling`] and [`plane_intersection`].

mod cylinder;
mod dual;
mod error;
mod extrusion;
mod helical;
mod implicit;
pub mod newton;
mod on_surface;
mod persist;
mod plane;
pub mod plane_intersection;
pub mod sampling;
mod section_curve;
mod surface;

pub use cylinder::{Axis, Cylinder, CylindricalSurfaceNp};
pub use dual::DualSurfaceCurve;
pub use error::{Result, SurfaceError};
pub use extrusion::SurfaceOfLinearExtrusion;
pub use helical::HelicalSurface;
pub use implicit::Quadric;
pub use on_surface::CurveOnSurface;
pub use persist::{from_json, to_json, SurfaceRecord};
pub use section_curve::SectionCurve2d;
pub use surface::{ParamBounds, Surface, SurfaceDerivatives, SurfaceKind, UNBOUNDED_EXTENT};
