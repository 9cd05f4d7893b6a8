//! Parameter curves in polar form around the parameter origin.

use std::any::Any;

use surfkern_geom::numeric::uniform_positions;
use surfkern_geom::{Curve2d, Curve3d, CurveKind, Line2d, Line3d};
use surfkern_math::{KernelSettings, Point2, Point3, Tolerance, Transform2d, Vec2, Vec3};

use crate::sampling::{fit_space_curve, fit_uv_curve};

/// A parameter curve whose polar angle advances linearly,
/// `θ(t) = θ0 + t·sweep`, with reciprocal radius
///
/// `1/ρ(t) = p + q·cos θ(t) + s·sin θ(t) + m·t`
///
/// With `m = 0` this is a conic with a focus at the origin, the image of a
/// cylinder plane section. With `sweep = 0` and `q = s = 0` it is a radial
/// segment, the image of a generator. In both cases the parameter runs in
/// step with the 3D curve: the section ellipse is linear in θ and the
/// generator is linear in the axial fraction `r/ρ − 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionCurve2d {
    theta0: f64,
    sweep: f64,
    p: f64,
    q: f64,
    s: f64,
    m: f64,
}

impl SectionCurve2d {
    /// Focal conic `1/ρ = p + q·cos θ + s·sin θ` from `theta0` through `sweep`.
    ///
    /// `1/ρ` must stay positive over the swept angles.
    pub fn conic(p: f64, q: f64, s: f64, theta0: f64, sweep: f64) -> Self {
        Self {
            theta0,
            sweep,
            p,
            q,
            s,
            m: 0.0,
        }
    }

    /// Radial segment at angle `theta` from radius `rho0` to `rho1`, with
    /// `1/ρ` linear in the parameter. Both radii must be positive.
    pub fn radial(theta: f64, rho0: f64, rho1: f64) -> Self {
        Self {
            theta0: theta,
            sweep: 0.0,
            p: 1.0 / rho0,
            q: 0.0,
            s: 0.0,
            m: 1.0 / rho1 - 1.0 / rho0,
        }
    }

    /// Polar angle at `t = 0`.
    pub fn start_angle(&self) -> f64 {
        self.theta0
    }

    /// Signed change of the polar angle over the curve.
    pub fn sweep(&self) -> f64 {
        self.sweep
    }

    /// The conic coefficients `(p, q, s)`.
    pub fn coefficients(&self) -> (f64, f64, f64) {
        (self.p, self.q, self.s)
    }

    /// Change of `1/ρ` over the curve; zero for conics.
    pub fn slope(&self) -> f64 {
        self.m
    }

    /// Whether this is a radial segment.
    pub fn is_radial(&self) -> bool {
        self.sweep == 0.0 && self.q == 0.0 && self.s == 0.0
    }

    /// `1/ρ` at `t`.
    pub fn reciprocal_radius(&self, t: f64) -> f64 {
        self.reciprocal(t).0
    }

    fn angle(&self, t: f64) -> f64 {
        self.theta0 + t * self.sweep
    }

    fn reciprocal(&self, t: f64) -> (f64, f64, f64) {
        let (sin, cos) = self.angle(t).sin_cos();
        let w = self.p + self.q * cos + self.s * sin + self.m * t;
        let dw = self.sweep * (self.s * cos - self.q * sin) + self.m;
        let ddw = -self.sweep * self.sweep * (self.q * cos + self.s * sin);
        (w, dw, ddw)
    }

    fn eval(&self, t: f64) -> (Point2, Vec2, Vec2) {
        let (sin, cos) = self.angle(t).sin_cos();
        let radial = Vec2::new(cos, sin);
        let across = Vec2::new(-sin, cos);
        let (w, dw, ddw) = self.reciprocal(t);
        // ρ = g = 1/w
        let g = 1.0 / w;
        let dg = -dw * g * g;
        let ddg = 2.0 * dw * dw * g * g * g - ddw * g * g;
        let k = self.sweep;
        (
            Point2::from(g * radial),
            dg * radial + (g * k) * across,
            (ddg - g * k * k) * radial + (2.0 * dg * k) * across,
        )
    }

    /// The piece between `t0` and `t1`, reparameterized to `[0, 1]`.
    fn piece(&self, t0: f64, t1: f64) -> Self {
        Self {
            theta0: self.angle(t0),
            sweep: (t1 - t0) * self.sweep,
            p: self.p + self.m * t0,
            q: self.q,
            s: self.s,
            m: self.m * (t1 - t0),
        }
    }

    /// Exact image under a rotation or reflection about the origin.
    fn orthogonal_image(&self, t: &Transform2d) -> Option<Self> {
        let tol = Tolerance::current().angular;
        let m = &t.matrix;
        if m[(0, 2)] != 0.0 || m[(1, 2)] != 0.0 {
            return None;
        }
        let (a, b, c, d) = (m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]);
        let orthonormal = (a * a + c * c - 1.0).abs() <= tol
            && (b * b + d * d - 1.0).abs() <= tol
            && (a * b + c * d).abs() <= tol;
        if !orthonormal {
            return None;
        }
        // Reflections reverse the polar angle before rotating by `alpha`
        let flip = if t.determinant() < 0.0 { -1.0 } else { 1.0 };
        let alpha = c.atan2(a);
        let (sa, ca) = alpha.sin_cos();
        let s = flip * self.s;
        Some(Self {
            theta0: flip * self.theta0 + alpha,
            sweep: flip * self.sweep,
            p: self.p,
            q: self.q * ca - s * sa,
            s: self.q * sa + s * ca,
            m: self.m,
        })
    }

    fn samples() -> Vec<f64> {
        uniform_positions(KernelSettings::current().projection_samples.max(33) - 1)
    }
}

impl Curve2d for SectionCurve2d {
    fn point_at(&self, t: f64) -> Point2 {
        self.eval(t).0
    }

    fn direction_at(&self, t: f64) -> Vec2 {
        self.eval(t).1
    }

    fn try_point_deriv2_at(&self, t: f64) -> Option<(Point2, Vec2, Vec2)> {
        Some(self.eval(t))
    }

    fn curve_type(&self) -> CurveKind {
        if self.is_radial() {
            return CurveKind::Line;
        }
        let tol = Tolerance::current();
        let e = self.q.hypot(self.s);
        if e <= tol.linear * self.p * self.p {
            CurveKind::Circle
        } else if self.p.abs() <= tol.angular * e {
            CurveKind::Line
        } else if self.p > e {
            CurveKind::Ellipse
        } else {
            CurveKind::Conic
        }
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve2d> {
        Box::new(self.piece(1.0, 0.0))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve2d>> {
        Some(Box::new(self.piece(t0, t1)))
    }

    fn transformed(&self, t: &Transform2d) -> Box<dyn Curve2d> {
        if let Some(image) = self.orthogonal_image(t) {
            return Box::new(image);
        }
        fit_uv_curve(&Self::samples(), |s| t.apply_point(&self.point_at(s))).unwrap_or_else(|| {
            Box::new(Line2d::from_points(
                t.apply_point(&self.start_point()),
                t.apply_point(&self.end_point()),
            ))
        })
    }

    fn lift(&self, origin: &Point3, x_axis: &Vec3, y_axis: &Vec3) -> Box<dyn Curve3d> {
        let embed = |uv: Point2| origin + uv.x * x_axis + uv.y * y_axis;
        fit_space_curve(&Self::samples(), |s| embed(self.point_at(s)))
            .unwrap_or_else(|| Box::new(Line3d::from_points(embed(self.start_point()), embed(self.end_point()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_conic_is_a_focal_ellipse() {
        // ρ = 1/(1 + 0.5 cos θ): semi-major 4/3, focus at the origin
        let c = SectionCurve2d::conic(1.0, 0.5, 0.0, 0.0, 2.0 * PI);
        assert_eq!(c.curve_type(), CurveKind::Ellipse);
        assert_relative_eq!(c.point_at(0.0), Point2::new(2.0 / 3.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(c.point_at(0.5), Point2::new(-2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(c.point_at(0.25), Point2::new(0.0, 1.0), epsilon = 1e-12);
        assert!(c.is_closed());
    }

    #[test]
    fn test_radial_segment_is_linear_in_reciprocal_radius() {
        let c = SectionCurve2d::radial(FRAC_PI_2, 1.0, 0.5);
        assert_eq!(c.curve_type(), CurveKind::Line);
        assert_relative_eq!(c.start_point(), Point2::new(0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(c.end_point(), Point2::new(0.0, 0.5), epsilon = 1e-12);
        // 1/ρ = 1.5 halfway
        assert_relative_eq!(c.point_at(0.5), Point2::new(0.0, 2.0 / 3.0), epsilon = 1e-12);
        assert_relative_eq!(c.reciprocal_radius(0.5), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let curves = [
            SectionCurve2d::conic(1.2, 0.3, -0.4, 0.4, 2.5),
            SectionCurve2d::radial(1.0, 0.9, 0.6),
        ];
        let h = 1e-5;
        for c in curves {
            let t = 0.3;
            let (_, d1, d2) = c.try_point_deriv2_at(t).unwrap();
            let fd1 = (c.point_at(t + h) - c.point_at(t - h)) / (2.0 * h);
            let fd2 = (c.direction_at(t + h) - c.direction_at(t - h)) / (2.0 * h);
            assert_relative_eq!(d1, fd1, epsilon = 1e-7);
            assert_relative_eq!(d2, fd2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_trim_and_reverse_are_exact() {
        let c = SectionCurve2d::conic(1.2, 0.3, -0.4, 0.4, 2.5);
        let piece = c.trim(0.2, 0.7).unwrap();
        for s in [0.0, 0.4, 1.0] {
            assert_relative_eq!(piece.point_at(s), c.point_at(0.2 + 0.5 * s), epsilon = 1e-12);
        }
        let g = SectionCurve2d::radial(0.3, 1.0, 0.5);
        let back = g.reversed();
        for s in [0.0, 0.25, 1.0] {
            assert_relative_eq!(back.point_at(s), g.point_at(1.0 - s), epsilon = 1e-12);
        }
        assert!(back.as_any().downcast_ref::<SectionCurve2d>().is_some());
    }

    #[test]
    fn test_transformed_keeps_polar_form_under_rotation_and_reflection() {
        let c = SectionCurve2d::conic(1.2, 0.3, -0.4, 0.4, 2.5);
        for map in [Transform2d::rotation(0.7), Transform2d::new(1.0, 0.0, 0.0, -1.0, 0.0, 0.0)] {
            let image = c.transformed(&map);
            assert!(image.as_any().downcast_ref::<SectionCurve2d>().is_some());
            for s in [0.0, 0.3, 0.8, 1.0] {
                assert_relative_eq!(image.point_at(s), map.apply_point(&c.point_at(s)), epsilon = 1e-12);
            }
        }
        let shifted = c.transformed(&Transform2d::translation(1.0, 0.0));
        assert_eq!(shifted.curve_type(), CurveKind::BSpline);
        assert_relative_eq!(shifted.point_at(0.5), c.point_at(0.5) + Vec2::new(1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_open_conics_are_classified() {
        assert_eq!(SectionCurve2d::conic(0.5, 1.0, 0.0, 2.0, 1.0).curve_type(), CurveKind::Conic);
        assert_eq!(SectionCurve2d::conic(0.0, 1.0, 0.0, -1.0, 2.0).curve_type(), CurveKind::Line);
        assert_eq!(SectionCurve2d::conic(2.0, 0.0, 0.0, 0.0, 1.0).curve_type(), CurveKind::Circle);
    }
}
