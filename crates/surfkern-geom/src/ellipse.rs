//! Circles and ellipses, full or as arcs.
//!
//! Ellipses are stored by a pair of conjugate semi-diameters rather than
//! principal axes, so every affine image of an ellipse is again an ellipse
//! with the same angle parameterization:
//!
//! `P(t) = center + cos φ · major + sin φ · minor`, `φ = start_angle + t · sweep`

use std::any::Any;
use std::f64::consts::{PI, TAU};

use surfkern_math::{angle, any_perpendicular, Point2, Point3, Tolerance, Transform, Transform2d, Vec2, Vec3};

use crate::{numeric, Curve2d, Curve2dRecord, Curve3d, Curve3dRecord, CurveKind, Plane};

/// Curve parameter of `phi` on the arc `(start, sweep)`, if it lies on it.
///
/// `tol` is an angular tolerance. Full turns accept every angle.
pub(crate) fn arc_parameter(start: f64, sweep: f64, phi: f64, tol: f64) -> Option<f64> {
    if sweep == 0.0 {
        return None;
    }
    let d = angle::normalize(phi - start);
    let slack = tol / sweep.abs();
    [d, d - TAU, d + TAU]
        .into_iter()
        .map(|dd| dd / sweep)
        .find(|t| (-slack..=1.0 + slack).contains(t))
        .map(|t| t.clamp(0.0, 1.0))
}

/// Number of segments that keeps each sample step under π/8 of arc.
fn arc_positions(sweep: f64) -> Vec<f64> {
    let n = ((sweep.abs() / (PI / 8.0)).ceil() as usize).max(4);
    numeric::uniform_positions(n)
}

// =============================================================================
// Circle2d
// =============================================================================

/// A 2D circle or circular arc.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle2d {
    /// Center of the circle.
    pub center: Point2,
    /// Radius.
    pub radius: f64,
    /// Angle at `t = 0`.
    pub start_angle: f64,
    /// Signed angular extent; negative runs clockwise.
    pub sweep: f64,
}

impl Circle2d {
    /// Full counter-clockwise circle starting at angle 0.
    pub fn new(center: Point2, radius: f64) -> Self {
        Self::arc(center, radius, 0.0, TAU)
    }

    /// Arc from `start_angle` sweeping `sweep` radians.
    pub fn arc(center: Point2, radius: f64, start_angle: f64, sweep: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            sweep,
        }
    }

    /// Angle at curve parameter `t`.
    pub fn angle_at(&self, t: f64) -> f64 {
        self.start_angle + t * self.sweep
    }

    /// Curve parameter of the point at `phi`, if it lies on the arc.
    pub fn parameter_of_angle(&self, phi: f64) -> Option<f64> {
        arc_parameter(self.start_angle, self.sweep, phi, Tolerance::current().angular)
    }

    /// Whether the arc covers a full turn.
    pub fn is_full(&self) -> bool {
        self.sweep.abs() >= TAU - Tolerance::current().angular
    }

    /// The same arc as a general ellipse.
    pub fn to_ellipse(&self) -> Ellipse2d {
        Ellipse2d::arc(
            self.center,
            Vec2::new(self.radius, 0.0),
            Vec2::new(0.0, self.radius),
            self.start_angle,
            self.sweep,
        )
    }
}

impl Curve2d for Circle2d {
    fn point_at(&self, t: f64) -> Point2 {
        let (s, c) = self.angle_at(t).sin_cos();
        self.center + self.radius * Vec2::new(c, s)
    }

    fn direction_at(&self, t: f64) -> Vec2 {
        let (s, c) = self.angle_at(t).sin_cos();
        self.sweep * self.radius * Vec2::new(-s, c)
    }

    fn try_point_deriv2_at(&self, t: f64) -> Option<(Point2, Vec2, Vec2)> {
        let (s, c) = self.angle_at(t).sin_cos();
        let radial = self.radius * Vec2::new(c, s);
        Some((
            self.center + radial,
            self.sweep * self.radius * Vec2::new(-s, c),
            -self.sweep * self.sweep * radial,
        ))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Circle
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve2d> {
        Box::new(Circle2d::arc(
            self.center,
            self.radius,
            self.start_angle + self.sweep,
            -self.sweep,
        ))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve2d>> {
        Some(Box::new(Circle2d::arc(
            self.center,
            self.radius,
            self.angle_at(t0),
            (t1 - t0) * self.sweep,
        )))
    }

    fn transformed(&self, t: &Transform2d) -> Box<dyn Curve2d> {
        let ex = t.apply_vec(&Vec2::x());
        let ey = t.apply_vec(&Vec2::y());
        let det = t.determinant();
        let similar = (ex.norm() - ey.norm()).abs() <= 1e-12 * ex.norm().max(1.0)
            && ex.dot(&ey).abs() <= 1e-12 * ex.norm_squared().max(1.0);
        if similar && det > 0.0 {
            let rotation = ex.y.atan2(ex.x);
            return Box::new(Circle2d::arc(
                t.apply_point(&self.center),
                self.radius * ex.norm(),
                self.start_angle + rotation,
                self.sweep,
            ));
        }
        self.to_ellipse().transformed(t)
    }

    fn lift(&self, origin: &Point3, x_axis: &Vec3, y_axis: &Vec3) -> Box<dyn Curve3d> {
        self.to_ellipse().lift(origin, x_axis, y_axis)
    }

    fn perpendicular_foot(&self, p: &Point2) -> Vec<f64> {
        let d = p - self.center;
        if d.norm() < Tolerance::current().linear {
            return Vec::new();
        }
        let phi = d.y.atan2(d.x);
        [phi, phi + PI]
            .into_iter()
            .filter_map(|a| self.parameter_of_angle(a))
            .collect()
    }

    fn closest_parameter(&self, p: &Point2) -> f64 {
        let d = p - self.center;
        if let Some(t) = self.parameter_of_angle(d.y.atan2(d.x)) {
            return t;
        }
        if (p - self.start_point()).norm() <= (p - self.end_point()).norm() {
            0.0
        } else {
            1.0
        }
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        arc_positions(self.sweep)
    }

    fn to_record(&self) -> Option<Curve2dRecord> {
        Some(Curve2dRecord::Circle {
            center: self.center,
            radius: self.radius,
            start_angle: self.start_angle,
            sweep: self.sweep,
        })
    }
}

// =============================================================================
// Ellipse2d
// =============================================================================

/// A 2D ellipse or elliptical arc given by conjugate semi-diameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse2d {
    /// Center.
    pub center: Point2,
    /// Semi-diameter at angle 0.
    pub major: Vec2,
    /// Semi-diameter at angle π/2.
    pub minor: Vec2,
    /// Angle at `t = 0`.
    pub start_angle: f64,
    /// Signed angular extent.
    pub sweep: f64,
}

impl Ellipse2d {
    /// Full ellipse.
    pub fn new(center: Point2, major: Vec2, minor: Vec2) -> Self {
        Self::arc(center, major, minor, 0.0, TAU)
    }

    /// Elliptical arc.
    pub fn arc(center: Point2, major: Vec2, minor: Vec2, start_angle: f64, sweep: f64) -> Self {
        Self {
            center,
            major,
            minor,
            start_angle,
            sweep,
        }
    }

    /// Angle at curve parameter `t`.
    pub fn angle_at(&self, t: f64) -> f64 {
        self.start_angle + t * self.sweep
    }

    /// Curve parameter of the point at `phi`, if it lies on the arc.
    pub fn parameter_of_angle(&self, phi: f64) -> Option<f64> {
        arc_parameter(self.start_angle, self.sweep, phi, Tolerance::current().angular)
    }

    /// Eccentric angle of `p` in the conjugate frame, or `None` for a
    /// degenerate ellipse.
    pub fn angle_of(&self, p: &Point2) -> Option<f64> {
        let (a, b) = self.local_coordinates(p)?;
        Some(b.atan2(a))
    }

    /// Coordinates `(a, b)` with `p = center + a·major + b·minor`.
    pub fn local_coordinates(&self, p: &Point2) -> Option<(f64, f64)> {
        let det = self.major.perp(&self.minor);
        if det.abs() < 1e-300 {
            return None;
        }
        let d = p - self.center;
        Some((d.perp(&self.minor) / det, self.major.perp(&d) / det))
    }

    /// Principal semi-axis lengths `(a, b)` with `a >= b`.
    pub fn semi_axes(&self) -> (f64, f64) {
        // Singular values of [major minor]
        let m = nalgebra::Matrix2::from_columns(&[self.major, self.minor]);
        let sv = m.singular_values();
        (sv[0].max(sv[1]), sv[0].min(sv[1]))
    }

    /// Whether the ellipse is a circle within tolerance.
    pub fn is_circle(&self) -> bool {
        let tol = Tolerance::current().linear;
        (self.major.norm() - self.minor.norm()).abs() < tol
            && self.major.dot(&self.minor).abs() < tol * self.major.norm().max(1.0)
    }

    fn foot_function(&self, p: &Point2, phi: f64) -> f64 {
        let (s, c) = phi.sin_cos();
        let q = self.center + c * self.major + s * self.minor;
        let dq = -s * self.major + c * self.minor;
        (q - p).dot(&dq)
    }
}

impl Curve2d for Ellipse2d {
    fn point_at(&self, t: f64) -> Point2 {
        let (s, c) = self.angle_at(t).sin_cos();
        self.center + c * self.major + s * self.minor
    }

    fn direction_at(&self, t: f64) -> Vec2 {
        let (s, c) = self.angle_at(t).sin_cos();
        self.sweep * (-s * self.major + c * self.minor)
    }

    fn try_point_deriv2_at(&self, t: f64) -> Option<(Point2, Vec2, Vec2)> {
        let (s, c) = self.angle_at(t).sin_cos();
        let radial = c * self.major + s * self.minor;
        Some((
            self.center + radial,
            self.sweep * (-s * self.major + c * self.minor),
            -self.sweep * self.sweep * radial,
        ))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Ellipse
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve2d> {
        Box::new(Ellipse2d::arc(
            self.center,
            self.major,
            self.minor,
            self.start_angle + self.sweep,
            -self.sweep,
        ))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve2d>> {
        Some(Box::new(Ellipse2d::arc(
            self.center,
            self.major,
            self.minor,
            self.angle_at(t0),
            (t1 - t0) * self.sweep,
        )))
    }

    fn transformed(&self, t: &Transform2d) -> Box<dyn Curve2d> {
        Box::new(Ellipse2d::arc(
            t.apply_point(&self.center),
            t.apply_vec(&self.major),
            t.apply_vec(&self.minor),
            self.start_angle,
            self.sweep,
        ))
    }

    fn lift(&self, origin: &Point3, x_axis: &Vec3, y_axis: &Vec3) -> Box<dyn Curve3d> {
        Box::new(Ellipse3d::arc(
            origin + self.center.x * x_axis + self.center.y * y_axis,
            self.major.x * x_axis + self.major.y * y_axis,
            self.minor.x * x_axis + self.minor.y * y_axis,
            self.start_angle,
            self.sweep,
        ))
    }

    fn perpendicular_foot(&self, p: &Point2) -> Vec<f64> {
        // (P(φ) - p) · P'(φ) = 0 has at most four roots per turn
        let n = 64;
        let tol = Tolerance::current().angular * 1e-3;
        let mut roots: Vec<f64> = Vec::new();
        let step = self.sweep / n as f64;
        for i in 0..n {
            let a0 = self.start_angle + i as f64 * step;
            let a1 = a0 + step;
            let (lo, hi) = if a0 <= a1 { (a0, a1) } else { (a1, a0) };
            if let Some(phi) = surfkern_math::roots::bisect(lo, hi, tol, 100, |a| self.foot_function(p, a)) {
                let t = (phi - self.start_angle) / self.sweep;
                if roots.last().map_or(true, |&last| (t - last).abs() > 1e-9) {
                    roots.push(t.clamp(0.0, 1.0));
                }
            }
        }
        roots
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        arc_positions(self.sweep)
    }

    fn to_record(&self) -> Option<Curve2dRecord> {
        Some(Curve2dRecord::Ellipse {
            center: self.center,
            major: self.major,
            minor: self.minor,
            start_angle: self.start_angle,
            sweep: self.sweep,
        })
    }
}

// =============================================================================
// Ellipse3d
// =============================================================================

/// A planar ellipse or circle in 3D, given by conjugate semi-diameters.
///
/// Every plane section of a cylinder and every affine image of a circle is
/// exactly representable.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse3d {
    /// Center.
    pub center: Point3,
    /// Semi-diameter at angle 0.
    pub major: Vec3,
    /// Semi-diameter at angle π/2.
    pub minor: Vec3,
    /// Angle at `t = 0`.
    pub start_angle: f64,
    /// Signed angular extent.
    pub sweep: f64,
}

impl Ellipse3d {
    /// Full ellipse.
    pub fn new(center: Point3, major: Vec3, minor: Vec3) -> Self {
        Self::arc(center, major, minor, 0.0, TAU)
    }

    /// Elliptical arc.
    pub fn arc(center: Point3, major: Vec3, minor: Vec3, start_angle: f64, sweep: f64) -> Self {
        Self {
            center,
            major,
            minor,
            start_angle,
            sweep,
        }
    }

    /// Full circle of `radius` around `normal`.
    pub fn circle(center: Point3, radius: f64, normal: Vec3) -> Self {
        let x = any_perpendicular(&normal);
        let y = normal.normalize().cross(&x);
        Self::new(center, radius * x, radius * y)
    }

    /// Angle at curve parameter `t`.
    pub fn angle_at(&self, t: f64) -> f64 {
        self.start_angle + t * self.sweep
    }

    /// Curve parameter of the point at `phi`, if it lies on the arc.
    pub fn parameter_of_angle(&self, phi: f64) -> Option<f64> {
        arc_parameter(self.start_angle, self.sweep, phi, Tolerance::current().angular)
    }

    /// Whether the ellipse is a circle within tolerance.
    pub fn is_circle(&self) -> bool {
        let tol = Tolerance::current().linear;
        (self.major.norm() - self.minor.norm()).abs() < tol
            && self.major.dot(&self.minor).abs() < tol * self.major.norm().max(1.0)
    }
}

impl Curve3d for Ellipse3d {
    fn point_at(&self, t: f64) -> Point3 {
        let (s, c) = self.angle_at(t).sin_cos();
        self.center + c * self.major + s * self.minor
    }

    fn direction_at(&self, t: f64) -> Vec3 {
        let (s, c) = self.angle_at(t).sin_cos();
        self.sweep * (-s * self.major + c * self.minor)
    }

    fn point_deriv2_at(&self, t: f64) -> (Point3, Vec3, Vec3) {
        let (s, c) = self.angle_at(t).sin_cos();
        let radial = c * self.major + s * self.minor;
        (
            self.center + radial,
            self.sweep * (-s * self.major + c * self.minor),
            -self.sweep * self.sweep * radial,
        )
    }

    fn curve_type(&self) -> CurveKind {
        if self.is_circle() {
            CurveKind::Circle
        } else {
            CurveKind::Ellipse
        }
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve3d> {
        Box::new(Ellipse3d::arc(
            self.center,
            self.major,
            self.minor,
            self.start_angle + self.sweep,
            -self.sweep,
        ))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve3d>> {
        Some(Box::new(Ellipse3d::arc(
            self.center,
            self.major,
            self.minor,
            self.angle_at(t0),
            (t1 - t0) * self.sweep,
        )))
    }

    fn transformed(&self, t: &Transform) -> Box<dyn Curve3d> {
        Box::new(Ellipse3d::arc(
            t.apply_point(&self.center),
            t.apply_vec(&self.major),
            t.apply_vec(&self.minor),
            self.start_angle,
            self.sweep,
        ))
    }

    fn project_to_plane(&self, plane: &Plane) -> Box<dyn Curve2d> {
        Box::new(Ellipse2d::arc(
            plane.project(&self.center),
            plane.project_vec(&self.major),
            plane.project_vec(&self.minor),
            self.start_angle,
            self.sweep,
        ))
    }

    fn plane(&self) -> Option<Plane> {
        if self.major.cross(&self.minor).norm() < 1e-300 {
            return None;
        }
        Some(Plane::new(self.center, self.major, self.minor))
    }

    fn plane_intersection(&self, plane: &Plane) -> Vec<f64> {
        // n·(P(φ) - o) = a + b cos φ + c sin φ
        let n = plane.normal();
        let a = plane.signed_distance(&self.center);
        let b = self.major.dot(&n);
        let c = self.minor.dot(&n);
        let r = b.hypot(c);
        if r < 1e-300 || a.abs() > r * (1.0 + 1e-12) {
            return Vec::new();
        }
        let omega = c.atan2(b);
        let delta = (-a / r).clamp(-1.0, 1.0).acos();
        let mut hits: Vec<f64> = [omega + delta, omega - delta]
            .into_iter()
            .filter_map(|phi| self.parameter_of_angle(phi))
            .collect();
        hits.sort_by(|x, y| x.total_cmp(y));
        hits.dedup_by(|x, y| (*x - *y).abs() < 1e-12);
        hits
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        arc_positions(self.sweep)
    }

    fn to_record(&self) -> Option<Curve3dRecord> {
        Some(Curve3dRecord::Ellipse {
            center: self.center,
            major: self.major,
            minor: self.minor,
            start_angle: self.start_angle,
            sweep: self.sweep,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_circle2d_evaluate() {
        let c = Circle2d::new(Point2::new(1.0, 0.0), 2.0);
        assert_relative_eq!(c.point_at(0.25), Point2::new(1.0, 2.0), epsilon = 1e-12);
        assert_relative_eq!(c.start_point(), c.end_point(), epsilon = 1e-12);
        assert!(c.is_closed());
    }

    #[test]
    fn test_circle2d_feet_on_arc() {
        let arc = Circle2d::arc(Point2::origin(), 1.0, 0.0, PI);
        // Both feet of (0, 3) lie at φ = π/2 and φ = 3π/2; only the first is on the arc
        let feet = arc.perpendicular_foot(&Point2::new(0.0, 3.0));
        assert_eq!(feet.len(), 1);
        assert_relative_eq!(feet[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(arc.closest_parameter(&Point2::new(1.0, -0.1)), 0.0);
    }

    #[test]
    fn test_circle2d_reversed_trim() {
        let arc = Circle2d::arc(Point2::origin(), 1.0, 0.0, FRAC_PI_2);
        let rev = arc.reversed();
        assert_relative_eq!(rev.start_point(), Point2::new(0.0, 1.0), epsilon = 1e-12);
        let piece = arc.trim(1.0, 0.5).unwrap();
        assert_relative_eq!(piece.start_point(), arc.end_point(), epsilon = 1e-12);
        assert_relative_eq!(piece.end_point(), arc.point_at(0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_circle2d_transformed_stays_circle() {
        let c = Circle2d::new(Point2::origin(), 1.0);
        let t = Transform2d::rotation(FRAC_PI_2).then(&Transform2d::scale(2.0, 2.0));
        let moved = c.transformed(&t);
        assert_eq!(moved.curve_type(), CurveKind::Circle);
        assert_relative_eq!(moved.point_at(0.0), Point2::new(0.0, 2.0), epsilon = 1e-12);

        let squashed = c.transformed(&Transform2d::scale(1.0, 3.0));
        assert_eq!(squashed.curve_type(), CurveKind::Ellipse);
        assert_relative_eq!(squashed.point_at(0.25), Point2::new(0.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_ellipse2d_local_coordinates() {
        let e = Ellipse2d::new(Point2::new(1.0, 1.0), Vec2::new(2.0, 0.0), Vec2::new(1.0, 1.0));
        let p = e.point_at(0.3);
        let phi = e.angle_of(&p).unwrap();
        assert_relative_eq!(e.parameter_of_angle(phi).unwrap(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_ellipse2d_feet() {
        let e = Ellipse2d::new(Point2::origin(), Vec2::new(3.0, 0.0), Vec2::new(0.0, 1.0));
        let feet = e.perpendicular_foot(&Point2::new(5.0, 0.0));
        assert!(feet.iter().any(|&t| t.abs() < 1e-9 || (t - 1.0).abs() < 1e-9));
        assert!(feet.iter().any(|&t| (t - 0.5).abs() < 1e-9));
        let (a, b) = e.semi_axes();
        assert_relative_eq!(a, 3.0, epsilon = 1e-12);
        assert_relative_eq!(b, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ellipse3d_plane_intersection() {
        let c = Ellipse3d::circle(Point3::origin(), 2.0, Vec3::z());
        let plane = Plane::from_normal(Point3::new(1.0, 0.0, 0.0), Vec3::x());
        let hits = c.plane_intersection(&plane);
        assert_eq!(hits.len(), 2);
        for t in hits {
            assert_relative_eq!(c.point_at(t).x, 1.0, epsilon = 1e-12);
        }
        let far = Plane::from_normal(Point3::new(3.0, 0.0, 0.0), Vec3::x());
        assert!(c.plane_intersection(&far).is_empty());
    }

    #[test]
    fn test_ellipse3d_project_lift() {
        let e = Ellipse3d::arc(
            Point3::new(0.0, 0.0, 4.0),
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
            0.2,
            2.0,
        );
        assert_eq!(e.curve_type(), CurveKind::Ellipse);
        let plane = e.plane().unwrap();
        let flat = e.project_to_plane(&plane);
        let back = flat.lift(&plane.origin, plane.x_dir.as_ref(), plane.y_dir.as_ref());
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_relative_eq!(back.point_at(t), e.point_at(t), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ellipse3d_derivatives() {
        let e = Ellipse3d::arc(Point3::origin(), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 1.0), 0.5, -1.5);
        let h = 1e-6;
        let (_, d1, d2) = e.point_deriv2_at(0.4);
        let fd1 = (e.point_at(0.4 + h) - e.point_at(0.4 - h)) / (2.0 * h);
        let fd2 = (e.direction_at(0.4 + h) - e.direction_at(0.4 - h)) / (2.0 * h);
        assert_relative_eq!(d1, fd1, epsilon = 1e-6);
        assert_relative_eq!(d2, fd2, epsilon = 1e-5);
    }

    #[test]
    fn test_arc_parameter_wraps() {
        assert_relative_eq!(arc_parameter(3.0 * FRAC_PI_2, PI, 0.0, 1e-9).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(arc_parameter(0.0, -FRAC_PI_2, -FRAC_PI_2, 1e-9).unwrap(), 1.0, epsilon = 1e-12);
        assert!(arc_parameter(0.0, FRAC_PI_2, PI, 1e-9).is_none());
    }
}
