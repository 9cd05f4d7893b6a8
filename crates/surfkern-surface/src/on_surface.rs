//! A 3D curve defined as the image of a parameter curve on a surface.

use std::any::Any;

use surfkern_geom::numeric::{second_derivative_2d, uniform_positions};
use surfkern_geom::{Curve2d, Curve3d, CurveKind, Line2d, Plane};
use surfkern_math::{KernelSettings, Point2, Point3, Transform, Vec2, Vec3};

use crate::sampling::{fit_uv_curve, merge_steps};
use crate::Surface;

/// `C(t) = S(c(t))` for a surface `S` and a parameter curve `c`.
///
/// Exact by construction; used wherever the image has no closed form.
#[derive(Debug, Clone)]
pub struct CurveOnSurface {
    surface: Box<dyn Surface>,
    curve2d: Box<dyn Curve2d>,
}

impl CurveOnSurface {
    /// Wrap a surface and a curve in its parameter space.
    pub fn new(surface: Box<dyn Surface>, curve2d: Box<dyn Curve2d>) -> Self {
        Self { surface, curve2d }
    }

    /// The underlying surface.
    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// The parameter-space curve.
    pub fn curve2d(&self) -> &dyn Curve2d {
        self.curve2d.as_ref()
    }

    fn uv_deriv2(&self, t: f64) -> (Point2, Vec2, Vec2) {
        self.curve2d.try_point_deriv2_at(t).unwrap_or_else(|| {
            (
                self.curve2d.point_at(t),
                self.curve2d.direction_at(t),
                second_derivative_2d(self.curve2d.as_ref(), t),
            )
        })
    }

    fn with_curve(&self, curve2d: Box<dyn Curve2d>) -> Self {
        Self {
            surface: self.surface.clone(),
            curve2d,
        }
    }
}

impl Curve3d for CurveOnSurface {
    fn point_at(&self, t: f64) -> Point3 {
        self.surface.point_at(self.curve2d.point_at(t))
    }

    fn direction_at(&self, t: f64) -> Vec3 {
        let uv = self.curve2d.point_at(t);
        let d = self.curve2d.direction_at(t);
        self.surface.u_direction(uv) * d.x + self.surface.v_direction(uv) * d.y
    }

    fn point_deriv2_at(&self, t: f64) -> (Point3, Vec3, Vec3) {
        let (uv, d1, d2) = self.uv_deriv2(t);
        let s = self.surface.derivatives2(uv);
        let first = s.du * d1.x + s.dv * d1.y;
        let second = s.duu * (d1.x * d1.x)
            + s.duv * (2.0 * d1.x * d1.y)
            + s.dvv * (d1.y * d1.y)
            + s.du * d2.x
            + s.dv * d2.y;
        (s.point, first, second)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::OnSurface
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve3d> {
        Box::new(self.with_curve(self.curve2d.reversed()))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve3d>> {
        let piece = self.curve2d.trim(t0, t1)?;
        Some(Box::new(self.with_curve(piece)))
    }

    fn transformed(&self, t: &Transform) -> Box<dyn Curve3d> {
        Box::new(Self {
            surface: self.surface.modified(t),
            curve2d: self.curve2d.clone(),
        })
    }

    fn project_to_plane(&self, plane: &Plane) -> Box<dyn Curve2d> {
        let n = KernelSettings::current().projection_samples - 1;
        let params = merge_steps(
            self.curve2d.safe_sample_positions().into_iter().chain(uniform_positions(n)),
            0.0,
            1.0,
        );
        fit_uv_curve(&params, |t| plane.project(&self.point_at(t))).unwrap_or_else(|| {
            Box::new(Line2d::from_points(
                plane.project(&self.start_point()),
                plane.project(&self.end_point()),
            ))
        })
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        self.curve2d.safe_sample_positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use surfkern_geom::Circle2d;

    fn tilted_plane() -> Plane {
        Plane::new(Point3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 0.0, 1.0), Vec3::new(0.0, 1.0, 0.0))
    }

    #[test]
    fn test_chain_rule_matches_finite_differences() {
        let c = CurveOnSurface::new(
            Box::new(tilted_plane()),
            Box::new(Circle2d::arc(Point2::new(0.5, 0.0), 2.0, 0.3, 2.0)),
        );
        let t = 0.4;
        let h = 1e-5;
        let (_, d1, d2) = c.point_deriv2_at(t);
        let fd1 = (c.point_at(t + h) - c.point_at(t - h)) / (2.0 * h);
        let fd2 = (c.point_at(t + h) - 2.0 * c.point_at(t).coords + c.point_at(t - h).coords).coords / (h * h);
        assert_relative_eq!(d1, fd1, epsilon = 1e-6);
        assert_relative_eq!(d2, fd2, epsilon = 1e-3);
        assert_relative_eq!(c.direction_at(t), d1, epsilon = 1e-12);
    }

    #[test]
    fn test_trim_reverse_and_transform() {
        let line = Line2d::from_points(Point2::new(0.0, 0.0), Point2::new(2.0, 1.0));
        let c = CurveOnSurface::new(Box::new(tilted_plane()), Box::new(line));
        let r = c.reversed();
        assert_relative_eq!(r.start_point(), c.end_point(), epsilon = 1e-12);
        let piece = c.trim(0.25, 0.75).unwrap();
        assert_relative_eq!(piece.point_at(0.5), c.point_at(0.5), epsilon = 1e-12);
        let moved = c.transformed(&Transform::translation(0.0, 0.0, 1.0));
        assert_relative_eq!(moved.point_at(0.3), c.point_at(0.3) + Vec3::z(), epsilon = 1e-12);
        assert_eq!(c.curve_type(), CurveKind::OnSurface);
        assert!(c.to_record().is_none());
    }

    #[test]
    fn test_project_to_plane_interpolates_samples() {
        let c = CurveOnSurface::new(Box::new(tilted_plane()), Box::new(Circle2d::new(Point2::origin(), 1.0)));
        let flat = c.project_to_plane(&Plane::xy());
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let p = c.point_at(t);
            assert_relative_eq!(flat.point_at(t), Point2::new(p.x, p.y), epsilon = 1e-9);
        }
    }
}
