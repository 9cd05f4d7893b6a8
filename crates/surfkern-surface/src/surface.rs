//! The surface contract shared by every concrete surface.

use std::any::Any;

use surfkern_geom::{Curve2d, Curve3d, Plane};
use surfkern_math::{Dir3, Point2, Point3, Tolerance, Transform, Transform2d, Vec2, Vec3};

use crate::{newton, plane_intersection, sampling, CurveOnSurface, DualSurfaceCurve, SurfaceRecord};

/// Extent substituted for an infinite parameter bound when a finite grid is
/// required.
pub const UNBOUNDED_EXTENT: f64 = 1.0e4;

/// Relative parameter offset used to step off a pole when the normal is
/// undefined.
const POLE_STEP: f64 = 1.0e-7;

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylinder with the restricted annulus parameterization.
    Cylinder,
    /// Profile swept along a helix.
    Helical,
    /// Curve swept along a fixed direction.
    Extrusion,
}

/// A rectangle in parameter space. Sides may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    /// Lower u bound.
    pub umin: f64,
    /// Upper u bound.
    pub umax: f64,
    /// Lower v bound.
    pub vmin: f64,
    /// Upper v bound.
    pub vmax: f64,
}

impl ParamBounds {
    /// Bounds from two intervals. Each interval may be given in either order.
    pub fn new(u0: f64, u1: f64, v0: f64, v1: f64) -> Self {
        Self {
            umin: u0.min(u1),
            umax: u0.max(u1),
            vmin: v0.min(v1),
            vmax: v0.max(v1),
        }
    }

    /// The whole parameter plane.
    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Whether `uv` lies inside, with slack `tol` on every side.
    pub fn contains(&self, uv: &Point2, tol: f64) -> bool {
        uv.x >= self.umin - tol && uv.x <= self.umax + tol && uv.y >= self.vmin - tol && uv.y <= self.vmax + tol
    }

    /// Overlap of two rectangles. May be empty.
    pub fn intersect(&self, other: &ParamBounds) -> Self {
        Self {
            umin: self.umin.max(other.umin),
            umax: self.umax.min(other.umax),
            vmin: self.vmin.max(other.vmin),
            vmax: self.vmax.min(other.vmax),
        }
    }

    /// Whether the rectangle contains no point.
    pub fn is_empty(&self) -> bool {
        !(self.umin <= self.umax && self.vmin <= self.vmax)
    }

    /// Whether every side is finite.
    pub fn is_bounded(&self) -> bool {
        [self.umin, self.umax, self.vmin, self.vmax]
            .iter()
            .all(|x| x.is_finite())
    }

    /// Replace infinite sides by `±extent`.
    pub fn clamped(&self, extent: f64) -> Self {
        let c = |x: f64| x.clamp(-extent, extent);
        Self {
            umin: c(self.umin),
            umax: c(self.umax),
            vmin: c(self.vmin),
            vmax: c(self.vmax),
        }
    }

    /// Closest point of the rectangle to `uv`.
    pub fn clamp_point(&self, uv: Point2) -> Point2 {
        Point2::new(uv.x.max(self.umin).min(self.umax), uv.y.max(self.vmin).min(self.vmax))
    }

    /// Center of a bounded rectangle.
    pub fn center(&self) -> Point2 {
        Point2::new(0.5 * (self.umin + self.umax), 0.5 * (self.vmin + self.vmax))
    }
}

/// Point and partial derivatives up to second order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDerivatives {
    /// Surface point.
    pub point: Point3,
    /// ∂P/∂u.
    pub du: Vec3,
    /// ∂P/∂v.
    pub dv: Vec3,
    /// ∂²P/∂u².
    pub duu: Vec3,
    /// ∂²P/∂v².
    pub dvv: Vec3,
    /// ∂²P/∂u∂v.
    pub duv: Vec3,
}

impl SurfaceDerivatives {
    /// All derivatives zero, as reported at a pole.
    pub fn degenerate(point: Point3) -> Self {
        Self {
            point,
            du: Vec3::zeros(),
            dv: Vec3::zeros(),
            duu: Vec3::zeros(),
            dvv: Vec3::zeros(),
            duv: Vec3::zeros(),
        }
    }
}

/// A parametric surface in 3D space over a `(u, v)` domain.
///
/// Implementors provide evaluation, isoparametric curves, and mutation. The
/// provided methods give generic, numerically robust fallbacks for point
/// inversion, curve projection, lifting, and plane intersection; concrete
/// surfaces override them with exact paths where the geometry allows and
/// delegate to the fallbacks as the last link.
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at parameter `(u, v)`. Defined for every `(u, v)`.
    fn point_at(&self, uv: Point2) -> Point3;

    /// Partial derivative with respect to u.
    fn u_direction(&self, uv: Point2) -> Vec3;

    /// Partial derivative with respect to v.
    fn v_direction(&self, uv: Point2) -> Vec3;

    /// Point with first and second partial derivatives. Derivatives are zero
    /// where they are undefined.
    fn derivatives2(&self, uv: Point2) -> SurfaceDerivatives;

    /// The parameter rectangle on which the surface is defined. Sides may be
    /// infinite.
    fn natural_bounds(&self) -> ParamBounds;

    /// The isoparametric curve `u = const` from `vmin` to `vmax`.
    fn fixed_u(&self, u: f64, vmin: f64, vmax: f64) -> Box<dyn Curve3d>;

    /// The isoparametric curve `v = const` from `umin` to `umax`.
    fn fixed_v(&self, v: f64, umin: f64, umax: f64) -> Box<dyn Curve3d>;

    /// Transform the surface in place. Invalidates every cache.
    fn modify(&mut self, t: &Transform);

    /// Flip the normal. Returns the map from old to new parameters so that
    /// existing parameter-space curves can be remapped.
    fn reverse_orientation(&mut self) -> Transform2d;

    /// The kind of this surface.
    fn kind(&self) -> SurfaceKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Unit normal `normalize(du) × normalize(dv)`, or `None` where a partial
    /// derivative vanishes or the two are parallel.
    fn normal_checked(&self, uv: Point2) -> Option<Dir3> {
        let du = self.u_direction(uv);
        let dv = self.v_direction(uv);
        let (lu, lv) = (du.norm(), dv.norm());
        if lu == 0.0 || lv == 0.0 {
            return None;
        }
        Dir3::try_new((du / lu).cross(&(dv / lv)), Tolerance::current().angular)
    }

    /// Unit normal at `(u, v)`.
    ///
    /// At a pole the normal of a nearby parameter is used; if none exists the
    /// zero vector is returned.
    fn normal(&self, uv: Point2) -> Vec3 {
        if let Some(n) = self.normal_checked(uv) {
            return n.into_inner();
        }
        let step = POLE_STEP * (1.0 + uv.coords.amax());
        [Vec2::new(step, 0.0), Vec2::new(0.0, step), Vec2::new(-step, 0.0), Vec2::new(0.0, -step)]
            .iter()
            .find_map(|d| self.normal_checked(uv + d))
            .map_or_else(Vec3::zeros, Dir3::into_inner)
    }

    /// Parameter of the surface point closest to `p`.
    ///
    /// Never fails: when the point is far from the surface or the iteration
    /// does not converge, the best estimate is returned.
    fn position_of(&self, p: &Point3) -> Point2 {
        newton::position_in(self, p, &self.natural_bounds())
    }

    /// Parameter of the surface point closest to `p`, searched from `seed`.
    ///
    /// Used by continuous sampling, where the previous sample is a good seed
    /// and keeps the result on the same sheet of a periodic surface.
    fn position_of_near(&self, p: &Point3, seed: Point2) -> Point2 {
        newton::refine(self, p, seed)
    }

    /// Whether the surface is periodic in u.
    fn is_u_periodic(&self) -> bool {
        false
    }

    /// Whether the surface is periodic in v.
    fn is_v_periodic(&self) -> bool {
        false
    }

    /// Period in u, or 0.
    fn u_period(&self) -> f64 {
        0.0
    }

    /// Period in v, or 0.
    fn v_period(&self) -> f64 {
        0.0
    }

    /// Grid lines in u and v inside `bounds` that a sampler must not skip.
    ///
    /// Every returned list includes the finite ends of `bounds`.
    fn safe_parameter_steps(&self, bounds: &ParamBounds) -> (Vec<f64>, Vec<f64>) {
        let b = bounds.clamped(UNBOUNDED_EXTENT);
        (sampling::linspace(b.umin, b.umax, 4), sampling::linspace(b.vmin, b.vmax, 4))
    }

    /// Projection of a 3D curve lying on the surface into parameter space.
    ///
    /// `make_3d_curve` applied to the result reproduces `curve` within
    /// `precision`. Returns `None` only when no parameter curve could be
    /// built.
    fn projected_curve(&self, curve: &dyn Curve3d, precision: f64) -> Option<Box<dyn Curve2d>> {
        sampling::reuse_curve_on_surface(self, curve).or_else(|| sampling::project_curve(self, curve, precision))
    }

    /// The 3D image of a parameter-space curve.
    fn make_3d_curve(&self, curve: &dyn Curve2d) -> Box<dyn Curve3d> {
        Box::new(CurveOnSurface::new(self.clone_box(), curve.clone_box()))
    }

    /// Intersection curves with `plane` inside the parameter `window`.
    ///
    /// Each result carries the 3D curve and its parameter curves on this
    /// surface and on the plane.
    fn plane_intersection(&self, plane: &Plane, window: &ParamBounds, precision: f64) -> Vec<DualSurfaceCurve> {
        plane_intersection::march(self, plane, window, precision)
    }

    /// A transformed copy.
    fn modified(&self, t: &Transform) -> Box<dyn Surface> {
        let mut copy = self.clone_box();
        copy.modify(t);
        copy
    }

    /// Serializable description of the defining state, if this type persists.
    fn to_record(&self) -> Option<SurfaceRecord> {
        None
    }
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_intersect_and_clamp() {
        let a = ParamBounds::new(0.0, 2.0, -1.0, 1.0);
        let b = ParamBounds::new(1.0, 5.0, f64::NEG_INFINITY, f64::INFINITY);
        let c = a.intersect(&b);
        assert_eq!(c, ParamBounds::new(1.0, 2.0, -1.0, 1.0));
        assert!(c.is_bounded());
        assert!(!b.is_bounded());
        assert!(b.clamped(10.0).is_bounded());
        assert!(a.intersect(&ParamBounds::new(3.0, 4.0, 0.0, 1.0)).is_empty());
        assert_eq!(a.clamp_point(Point2::new(3.0, -3.0)), Point2::new(2.0, -1.0));
        assert!(a.contains(&Point2::new(2.0 + 1e-9, 0.0), 1e-6));
    }

    #[test]
    fn test_normal_checked_reads_the_angular_tolerance() {
        use crate::SurfaceOfLinearExtrusion;
        use surfkern_geom::Line3d;

        // Rulings 1e-8 rad off the basis line
        let sliver = {
            let _guard = Tolerance::new(1e-12, 1e-12).scoped();
            let basis = Line3d::from_points(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
            SurfaceOfLinearExtrusion::new(Box::new(basis), Vec3::new(1.0, 1e-8, 0.0), 0.0, 1.0).unwrap()
        };
        let uv = Point2::new(0.5, 0.5);
        assert!(sliver.normal_checked(uv).is_none());
        let _guard = Tolerance::new(1e-12, 1e-12).scoped();
        assert!(sliver.normal_checked(uv).is_some());
    }
}
