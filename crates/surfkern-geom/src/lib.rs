#![warn(missing_docs)]

//! Analytic curve types for the surfkern kernel.
//!
//! Provides trait-based abstractions for parametric curves in 3D and in a
//! surface's 2D parameter plane, with concrete implementations for lines,
//! circles and ellipses (B-splines live in `surfkern-nurbs`), the [`Plane`]
//! frame, and the planar intersection and closest-point routines.
//!
//! Every curve is parameterized over `t ∈ [0, 1]` from its start point to its
//! end point. Analytic curves extrapolate naturally outside that range.

use std::any::Any;
use surfkern_math::{Point2, Point3, Tolerance, Transform, Transform2d, Vec2, Vec3};

mod ellipse;
mod error;
pub mod intersect;
mod line;
pub mod numeric;
mod plane;
mod record;

pub use ellipse::{Circle2d, Ellipse2d, Ellipse3d};
pub use error::{GeomError, Result};
pub use intersect::{intersect, CurveIntersection2d};
pub use line::{Line2d, Line3d};
pub use plane::Plane;
pub use record::{Curve2dRecord, Curve3dRecord};

// =============================================================================
// Curve kinds
// =============================================================================

/// The kind of a curve (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line segment.
    Line,
    /// Circle or circular arc.
    Circle,
    /// Ellipse or elliptical arc.
    Ellipse,
    /// Parabolic or hyperbolic arc.
    Conic,
    /// B-spline curve.
    BSpline,
    /// Image of a parameter-space curve on a surface.
    OnSurface,
}

// =============================================================================
// 3D curves
// =============================================================================

/// A parametric curve in 3D space, parameterized over `[0, 1]`.
pub trait Curve3d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t`.
    fn point_at(&self, t: f64) -> Point3;

    /// First derivative with respect to `t`.
    fn direction_at(&self, t: f64) -> Vec3;

    /// Point, first and second derivative at `t`.
    fn point_deriv2_at(&self, t: f64) -> (Point3, Vec3, Vec3);

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve3d>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;

    /// The same curve traversed in the opposite direction.
    fn reversed(&self) -> Box<dyn Curve3d>;

    /// The piece between `t0` and `t1`, reparameterized to `[0, 1]`.
    ///
    /// `t0 > t1` yields the reversed piece. Returns `None` when the piece
    /// cannot be represented exactly by this curve type (for example outside
    /// the knot range of an open B-spline).
    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve3d>>;

    /// A transformed copy.
    fn transformed(&self, t: &Transform) -> Box<dyn Curve3d>;

    /// Orthogonal projection into the 2D coordinate system of `plane`.
    fn project_to_plane(&self, plane: &Plane) -> Box<dyn Curve2d>;

    /// The plane containing the curve, if the curve is planar with a unique plane.
    fn plane(&self) -> Option<Plane> {
        None
    }

    /// Parameters in `[0, 1]` where the curve crosses `plane`.
    fn plane_intersection(&self, plane: &Plane) -> Vec<f64> {
        numeric::plane_crossings(self, plane)
    }

    /// Parameter of the curve point closest to `p`, clamped to `[0, 1]`.
    fn closest_parameter(&self, p: &Point3) -> f64 {
        numeric::closest_parameter_3d(self, p)
    }

    /// Parameters at which sampling the curve is safe (covers every feature).
    fn safe_sample_positions(&self) -> Vec<f64> {
        numeric::uniform_positions(16)
    }

    /// Start point (`t = 0`).
    fn start_point(&self) -> Point3 {
        self.point_at(0.0)
    }

    /// End point (`t = 1`).
    fn end_point(&self) -> Point3 {
        self.point_at(1.0)
    }

    /// Whether start and end coincide within the current tolerance.
    fn is_closed(&self) -> bool {
        Tolerance::current().points_equal(&self.start_point(), &self.end_point())
    }

    /// Serializable description of the defining state, if this type persists.
    fn to_record(&self) -> Option<Curve3dRecord> {
        None
    }
}

impl Clone for Box<dyn Curve3d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// =============================================================================
// 2D curves
// =============================================================================

/// A 2D parametric curve (profiles and curves in surface parameter space),
/// parameterized over `[0, 1]`.
pub trait Curve2d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t`.
    fn point_at(&self, t: f64) -> Point2;

    /// First derivative with respect to `t`.
    fn direction_at(&self, t: f64) -> Vec2;

    /// Point, first and second derivative at `t`, when they are available
    /// in closed form.
    fn try_point_deriv2_at(&self, t: f64) -> Option<(Point2, Vec2, Vec2)>;

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve2d>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;

    /// The same curve traversed in the opposite direction.
    fn reversed(&self) -> Box<dyn Curve2d>;

    /// The piece between `t0` and `t1`, reparameterized to `[0, 1]`.
    /// See [`Curve3d::trim`].
    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve2d>>;

    /// A transformed copy.
    fn transformed(&self, t: &Transform2d) -> Box<dyn Curve2d>;

    /// Embed into 3D as `origin + x·x_axis + y·y_axis`.
    ///
    /// The axes are used as given, so the lift is exact for any affine frame.
    fn lift(&self, origin: &Point3, x_axis: &Vec3, y_axis: &Vec3) -> Box<dyn Curve3d>;

    /// Parameters in `[0, 1]` of the feet of perpendiculars from `p`.
    fn perpendicular_foot(&self, p: &Point2) -> Vec<f64> {
        numeric::perpendicular_feet_2d(self, p)
    }

    /// Parameter of the curve point closest to `p`, clamped to `[0, 1]`.
    fn closest_parameter(&self, p: &Point2) -> f64 {
        numeric::closest_parameter_2d(self, p)
    }

    /// Parameters at which sampling the curve is safe (covers every feature).
    fn safe_sample_positions(&self) -> Vec<f64> {
        numeric::uniform_positions(16)
    }

    /// Start point (`t = 0`).
    fn start_point(&self) -> Point2 {
        self.point_at(0.0)
    }

    /// End point (`t = 1`).
    fn end_point(&self) -> Point2 {
        self.point_at(1.0)
    }

    /// Whether start and end coincide within the current tolerance.
    fn is_closed(&self) -> bool {
        Tolerance::current().points2_equal(&self.start_point(), &self.end_point())
    }

    /// Serializable description of the defining state, if this type persists.
    fn to_record(&self) -> Option<Curve2dRecord> {
        None
    }
}

impl Clone for Box<dyn Curve2d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Sample `curve` at `n + 1` evenly spaced parameters.
pub fn sample_2d(curve: &dyn Curve2d, n: usize) -> Vec<Point2> {
    (0..=n)
        .map(|i| curve.point_at(i as f64 / n.max(1) as f64))
        .collect()
}

/// Axis-aligned bounding box of a 2D curve from its safe sample positions.
///
/// Returns `(min, max)`. Exact for lines; conservative enough for probing
/// purposes on curved segments.
pub fn bounds_2d(curve: &dyn Curve2d) -> (Point2, Point2) {
    let mut positions = curve.safe_sample_positions();
    let refine: Vec<f64> = (0..=64).map(|i| i as f64 / 64.0).collect();
    positions.extend(refine);
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for t in positions {
        let p = curve.point_at(t);
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}
