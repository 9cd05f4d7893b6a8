//! Cylinder with a restricted (annulus) parameter domain.
//!
//! The parameter plane is mapped by central projection: the polar angle
//! θ = atan2(v, u) selects the generator and the parameter radius ρ = |(u, v)|
//! selects the axial fraction `(r − ρ)/ρ`. The annulus `r/2 ≤ ρ ≤ r` covers
//! the cylinder piece between `location` (ρ = r) and `location + z_axis`
//! (ρ = r/2).
//!
//! Under this map every plane section of the cylinder is a conic with a
//! focus at the parameter origin. Its parameter curve is kept in polar form
//! ([`SectionCurve2d`]) so that it runs in step with the 3D section, which is
//! linear in the polar angle; a generator's parameter curve is likewise
//! linear in `1/ρ`, as the generator is in the axial fraction.

use std::any::Any;
use std::f64::consts::{FRAC_1_SQRT_2, PI, TAU};
use std::sync::OnceLock;

use nalgebra::{Matrix3, Rotation3, Unit};
use serde::{Deserialize, Serialize};
use surfkern_geom::numeric::uniform_positions;
use surfkern_geom::{Circle2d, Curve2d, Curve3d, Ellipse3d, Line2d, Line3d, Plane};
use surfkern_math::{angle, any_perpendicular, roots, Dir3, KernelSettings, Point2, Point3, Tolerance, Transform, Transform2d, Vec3};

use crate::error::{Result, SurfaceError};
use crate::implicit::Quadric;
use crate::plane_intersection::clip_line;
use crate::sampling::{merge_steps, project_curve, reuse_curve_on_surface};
use crate::{
    CurveOnSurface, DualSurfaceCurve, ParamBounds, SectionCurve2d, Surface, SurfaceDerivatives, SurfaceKind, SurfaceRecord,
};

/// An axis line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    /// A point on the axis.
    pub location: Point3,
    /// Unit direction.
    pub direction: Dir3,
}

/// Axis and radius access for cylinder-like surfaces.
pub trait Cylinder {
    /// The axis.
    fn axis(&self) -> Axis;

    /// Move and reorient the axis. The radius and axial extent are kept.
    fn set_axis(&mut self, axis: Axis);

    /// The radius.
    fn radius(&self) -> f64;

    /// Change the radius. The axial extent is kept.
    fn set_radius(&mut self, radius: f64);
}

/// Axial fraction of a plane section as a function of the polar angle:
/// `f(θ) = a + b·cos θ + c·sin θ`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    a: f64,
    b: f64,
    c: f64,
}

impl Section {
    fn fraction(&self, theta: f64) -> f64 {
        let (s, c) = theta.sin_cos();
        self.a + self.b * c + self.c * s
    }
}

type Projection = fn(&CylindricalSurfaceNp, &dyn Curve3d, f64) -> Option<Box<dyn Curve2d>>;
type Lift = fn(&CylindricalSurfaceNp, &dyn Curve2d) -> Option<Box<dyn Curve3d>>;

/// A cylinder piece over the annulus parameterization.
///
/// `x_axis` and `y_axis` are orthogonal with equal length (the radius);
/// `z_axis` is orthogonal to both and its length is the axial extent.
///
/// `P(u, v) = location + cos θ·x_axis + sin θ·y_axis + ((r − ρ)/ρ)·z_axis`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CylindricalSurfaceNp {
    location: Point3,
    x_axis: Vec3,
    y_axis: Vec3,
    z_axis: Vec3,
    #[serde(skip)]
    implicit: OnceLock<Quadric>,
}

impl CylindricalSurfaceNp {
    /// Create a cylinder from its frame.
    ///
    /// Fails unless `x_axis` and `y_axis` are non-zero, orthogonal, and of
    /// equal length, and `z_axis` is non-zero and orthogonal to both.
    pub fn new(location: Point3, x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> Result<Self> {
        let cylinder = Self {
            location,
            x_axis,
            y_axis,
            z_axis,
            implicit: OnceLock::new(),
        };
        cylinder.validate()?;
        Ok(cylinder)
    }

    /// Create a cylinder from its axis (the length of `axis` is the axial
    /// extent) and radius. The radial frame is chosen arbitrarily.
    pub fn from_axis(location: Point3, axis: Vec3, radius: f64) -> Result<Self> {
        if axis.norm() == 0.0 {
            return Err(SurfaceError::InvalidConstruction("zero cylinder axis".into()));
        }
        let x = any_perpendicular(&axis);
        let y = axis.normalize().cross(&x);
        Self::new(location, x * radius, y * radius, axis)
    }

    /// Check the frame invariants.
    pub fn validate(&self) -> Result<()> {
        let tol = Tolerance::current();
        let (rx, ry, h) = (self.x_axis.norm(), self.y_axis.norm(), self.z_axis.norm());
        let invalid = |msg: String| Err(SurfaceError::InvalidConstruction(msg));
        if !(rx > 0.0 && ry > 0.0 && h > 0.0) || !(rx.is_finite() && ry.is_finite() && h.is_finite()) {
            return invalid(format!("degenerate cylinder axes |x|={rx}, |y|={ry}, |z|={h}"));
        }
        if (rx - ry).abs() > tol.linear * rx.max(1.0) {
            return invalid(format!("radial axes differ in length: {rx} vs {ry}"));
        }
        let cos = |a: &Vec3, b: &Vec3| a.dot(b).abs() / (a.norm() * b.norm());
        if cos(&self.x_axis, &self.y_axis) > tol.angular
            || cos(&self.x_axis, &self.z_axis) > tol.angular
            || cos(&self.y_axis, &self.z_axis) > tol.angular
        {
            return invalid("cylinder axes are not orthogonal".into());
        }
        Ok(())
    }

    /// Base point of the axis (axial fraction 0).
    pub fn location(&self) -> Point3 {
        self.location
    }

    /// Radial axis at θ = 0.
    pub fn x_axis(&self) -> Vec3 {
        self.x_axis
    }

    /// Radial axis at θ = π/2.
    pub fn y_axis(&self) -> Vec3 {
        self.y_axis
    }

    /// Axial extent vector.
    pub fn z_axis(&self) -> Vec3 {
        self.z_axis
    }

    /// Implicit form of the infinite cylinder, built on first use.
    pub fn implicit(&self) -> &Quadric {
        self.implicit
            .get_or_init(|| Quadric::cylinder(&self.location, &self.x_axis, &self.y_axis))
    }

    fn invalidate(&mut self) {
        self.implicit = OnceLock::new();
    }

    fn r(&self) -> f64 {
        self.x_axis.norm()
    }

    /// Whether `uv` lies in the annulus `r/2 ≤ ρ ≤ r`.
    pub fn is_inside(&self, uv: Point2) -> bool {
        let tol = Tolerance::current().linear;
        let rho = uv.coords.norm();
        let r = self.r();
        rho >= 0.5 * r - tol && rho <= r + tol
    }

    /// Whether the parameter rectangle touches the annulus. Tessellators
    /// drop cells for which this is false.
    pub fn patch_is_live(&self, rect: &ParamBounds) -> bool {
        let tol = Tolerance::current().linear;
        let r = self.r();
        let nearest = rect.clamp_point(Point2::origin()).coords.norm();
        let farthest = [rect.umin.abs().max(rect.umax.abs()), rect.vmin.abs().max(rect.vmax.abs())];
        let farthest = farthest[0].hypot(farthest[1]);
        nearest <= r + tol && farthest >= 0.5 * r - tol
    }

    /// Polar angle and axial fraction of `p` in the cylinder frame.
    fn polar_fraction(&self, p: &Point3) -> (f64, f64) {
        let d = p - self.location;
        let r2 = self.x_axis.norm_squared();
        let c = d.dot(&self.x_axis) / r2;
        let s = d.dot(&self.y_axis) / r2;
        let f = d.dot(&self.z_axis) / self.z_axis.norm_squared();
        (s.atan2(c), f)
    }

    /// Parameter point at polar angle `theta` and axial fraction `f`.
    ///
    /// Fractions at or below −1 have no preimage; they are clamped to a far
    /// point on the same ray.
    fn uv_at(&self, theta: f64, f: f64) -> Point2 {
        let rho = self.r() / (1.0 + f).max(f64::EPSILON);
        let (s, c) = theta.sin_cos();
        Point2::new(rho * c, rho * s)
    }

    fn section_uv(&self, sec: Section, theta: f64) -> Point2 {
        self.uv_at(theta, sec.fraction(theta))
    }

    fn section_curve3d(&self, sec: Section, theta0: f64, sweep: f64) -> Ellipse3d {
        Ellipse3d::arc(
            self.location + sec.a * self.z_axis,
            self.x_axis + sec.b * self.z_axis,
            self.y_axis + sec.c * self.z_axis,
            theta0,
            sweep,
        )
    }

    /// Parameter curve of a plane section between polar angles `theta0` and
    /// `theta0 + sweep`, running in step with [`Self::section_curve3d`]: a
    /// circle about the origin for sections across the axis, otherwise a
    /// [`SectionCurve2d`] conic. The section must stay above the projection
    /// centre (`1 + f > 0`) over the swept angles.
    fn section_curve2d(&self, sec: Section, theta0: f64, sweep: f64) -> Box<dyn Curve2d> {
        let r = self.r();
        let one_a = 1.0 + sec.a;
        if one_a > 0.0 && sec.b.hypot(sec.c) * r <= Tolerance::current().linear * one_a * one_a {
            return Box::new(Circle2d::arc(Point2::origin(), r / one_a, theta0, sweep));
        }
        Box::new(SectionCurve2d::conic(one_a / r, sec.b / r, sec.c / r, theta0, sweep))
    }

    /// Radial parameter segment of the generator at `theta` between axial
    /// fractions `f0` and `f1`, in step with the generator line.
    fn generator_curve2d(&self, theta: f64, f0: f64, f1: f64) -> SectionCurve2d {
        let r = self.r();
        SectionCurve2d::radial(theta, r / (1.0 + f0), r / (1.0 + f1))
    }

    /// Exact image of an isoparametric line: a generator for radial lines,
    /// otherwise a plane section through the projection centre. The curve
    /// runs between the images of the line's end points; in between it
    /// follows the polar angle or the axial fraction, not the line parameter.
    fn isoline(&self, line: &Line2d) -> Option<Box<dyn Curve3d>> {
        let (p0, p1) = (line.start_point(), line.end_point());
        let r = self.r();
        if line.direction.norm() == 0.0 {
            return None;
        }
        let dist = line.signed_distance(&Point2::origin());
        if dist.abs() <= Tolerance::current().linear * r.max(1.0) {
            // A radial segment through the pole has no single generator
            if p0.coords.dot(&p1.coords) <= 0.0 {
                return None;
            }
            return Some(Box::new(Line3d::from_points(self.point_at(p0), self.point_at(p1))));
        }
        let foot = line.point_at(line.parameter_of(&Point2::origin()));
        let d = foot.coords.norm();
        let omega = foot.y.atan2(foot.x);
        let k = r / d;
        let sec = Section {
            a: -1.0,
            b: k * omega.cos(),
            c: k * omega.sin(),
        };
        let theta0 = p0.y.atan2(p0.x);
        let sweep = angle::near(p1.y.atan2(p1.x), theta0) - theta0;
        Some(Box::new(self.section_curve3d(sec, theta0, sweep)))
    }

    // -------------------------------------------------------------------------
    // Projection strategies
    // -------------------------------------------------------------------------

    const PROJECTIONS: &'static [Projection] = &[Self::project_axis_line, Self::project_plane_section];

    fn on_surface(&self, p: &Point3, precision: f64) -> bool {
        self.implicit().value(p).abs() <= precision
    }

    /// A generator segment maps to a radial segment.
    fn project_axis_line(&self, curve: &dyn Curve3d, precision: f64) -> Option<Box<dyn Curve2d>> {
        let line = curve.as_any().downcast_ref::<Line3d>()?;
        let tol = Tolerance::current();
        if line.direction.cross(&self.z_axis).norm() > tol.angular * line.direction.norm() * self.z_axis.norm() {
            return None;
        }
        let (p0, p1) = (line.start_point(), line.end_point());
        if !(self.on_surface(&p0, precision) && self.on_surface(&p1, precision)) {
            return None;
        }
        let (theta, f0) = self.polar_fraction(&p0);
        let (_, f1) = self.polar_fraction(&p1);
        if 1.0 + f0 <= 0.0 || 1.0 + f1 <= 0.0 {
            log::debug!("generator reaches the projection centre; falling back to sampling");
            return None;
        }
        Some(Box::new(self.generator_curve2d(theta, f0, f1)))
    }

    /// Circles and ellipses cut by a plane map to focal conics.
    fn project_plane_section(&self, curve: &dyn Curve3d, precision: f64) -> Option<Box<dyn Curve2d>> {
        let ellipse = curve.as_any().downcast_ref::<Ellipse3d>()?;
        let tol = Tolerance::current();
        let samples = [0.0, 1.0 / 3.0, 2.0 / 3.0].map(|t| self.polar_fraction(&curve.point_at(t)));
        let m = Matrix3::from_fn(|i, j| match j {
            0 => 1.0,
            1 => samples[i].0.cos(),
            _ => samples[i].0.sin(),
        });
        let rhs = Vec3::new(samples[0].1, samples[1].1, samples[2].1);
        if m.determinant().abs() <= tol.angular {
            return None;
        }
        let fit = m.lu().solve(&rhs)?;
        let sec = Section {
            a: fit[0],
            b: fit[1],
            c: fit[2],
        };

        // The polar angle advances linearly with the ellipse angle
        let r2 = self.x_axis.norm_squared();
        let radial = |v: &Vec3| (v.dot(&self.x_axis) / r2, v.dot(&self.y_axis) / r2);
        let (mx, my) = radial(&ellipse.major);
        let (nx, ny) = radial(&ellipse.minor);
        let orient = mx * ny - my * nx;
        if orient.abs() < 0.5 {
            return None;
        }
        let theta0 = samples[0].0;
        let sweep = orient.signum() * ellipse.sweep;

        let h = self.z_axis.norm();
        let r = self.r();
        for t in uniform_positions(4) {
            let q = curve.point_at(t);
            let (theta, f) = self.polar_fraction(&q);
            if !self.on_surface(&q, precision) {
                return None;
            }
            if 1.0 + f <= 0.0 {
                log::debug!("plane section reaches the projection centre; falling back to sampling");
                return None;
            }
            let predicted = theta0 + t * sweep;
            if (sec.fraction(theta) - f).abs() * h > precision
                || (angle::near(theta, predicted) - predicted).abs() * r > precision
            {
                return None;
            }
        }
        if 1.0 + sec.a - sec.b.hypot(sec.c) <= 0.0
            && uniform_positions(64)
                .into_iter()
                .any(|t| 1.0 + sec.fraction(theta0 + t * sweep) <= 0.0)
        {
            log::debug!("plane section reaches the projection centre; falling back to sampling");
            return None;
        }
        Some(self.section_curve2d(sec, theta0, sweep))
    }

    // -------------------------------------------------------------------------
    // Lifting strategies
    // -------------------------------------------------------------------------

    const LIFTS: &'static [Lift] = &[Self::lift_section_curve, Self::lift_origin_circle];

    /// Polar section curves lift to the plane section or generator they
    /// describe, parameter for parameter.
    fn lift_section_curve(&self, curve: &dyn Curve2d) -> Option<Box<dyn Curve3d>> {
        let section = curve.as_any().downcast_ref::<SectionCurve2d>()?;
        if uniform_positions(64).into_iter().any(|t| section.reciprocal_radius(t) <= 0.0) {
            return None;
        }
        if section.is_radial() {
            // The axial fraction r/ρ − 1 is linear in the parameter
            let (a, b) = (section.start_point(), section.end_point());
            return Some(Box::new(Line3d::from_points(self.point_at(a), self.point_at(b))));
        }
        if section.slope() != 0.0 {
            return None;
        }
        let r = self.r();
        let (p, q, s) = section.coefficients();
        let sec = Section {
            a: r * p - 1.0,
            b: r * q,
            c: r * s,
        };
        Some(Box::new(self.section_curve3d(sec, section.start_angle(), section.sweep())))
    }

    /// Circles about the origin become circles around the axis.
    fn lift_origin_circle(&self, curve: &dyn Curve2d) -> Option<Box<dyn Curve3d>> {
        let circle = curve.as_any().downcast_ref::<Circle2d>()?;
        let tol = Tolerance::current().linear;
        if circle.center.coords.norm() > tol || circle.radius <= 0.0 {
            return None;
        }
        let sec = Section {
            a: self.r() / circle.radius - 1.0,
            b: 0.0,
            c: 0.0,
        };
        Some(Box::new(self.section_curve3d(sec, circle.start_angle, circle.sweep)))
    }

    // -------------------------------------------------------------------------
    // Plane intersection
    // -------------------------------------------------------------------------

    fn dual(&self, plane: &Plane, curve3d: Box<dyn Curve3d>, curve2d: Box<dyn Curve2d>) -> DualSurfaceCurve {
        let on_plane = curve3d.project_to_plane(plane);
        DualSurfaceCurve::new(curve3d, self.clone_box(), curve2d, plane.clone_box(), on_plane)
    }

    /// Plane parallel to the axis: generators through the roots of the
    /// implicit form along a line across the plane.
    fn parallel_plane_lines(&self, plane: &Plane, window: &ParamBounds) -> Vec<DualSurfaceCurve> {
        let n = plane.normal();
        let across = n.cross(&self.z_axis).normalize();
        let o = self.location - plane.signed_distance(&self.location) * n;
        let [qa, qb, qc] = self.implicit().on_line(&o, &across);
        let r = self.r();

        roots::solve_quadratic(qa, qb, qc)
            .into_iter()
            .filter_map(|s| {
                let (theta, _) = self.polar_fraction(&(o + s * across));
                let (sin, cos) = theta.sin_cos();
                let outer = Point2::new(r * cos, r * sin);
                let inward = -0.5 * outer.coords;
                let (s0, s1) = clip_line(outer, inward, window, 0.0, 1.0)?;
                let (a, b) = (outer + s0 * inward, outer + s1 * inward);
                let line = Line3d::from_points(self.point_at(a), self.point_at(b));
                let fraction = |uv: Point2| r / uv.coords.norm() - 1.0;
                let flat = self.generator_curve2d(theta, fraction(a), fraction(b));
                Some(self.dual(plane, Box::new(line), Box::new(flat)))
            })
            .collect()
    }

    /// Oblique plane: one elliptical section, split into the arcs that stay
    /// inside the annulus and the window.
    fn oblique_plane_section(&self, plane: &Plane, window: &ParamBounds) -> Vec<DualSurfaceCurve> {
        let n = plane.normal();
        let nz = n.dot(&self.z_axis);
        let sec = Section {
            a: -n.dot(&(self.location - plane.origin)) / nz,
            b: -n.dot(&self.x_axis) / nz,
            c: -n.dot(&self.y_axis) / nz,
        };
        let settings = KernelSettings::current();
        let f_tol = settings.tolerance.linear / self.z_axis.norm();
        let uv_tol = settings.tolerance.linear;
        let valid = |theta: f64| {
            let f = sec.fraction(theta);
            f >= -f_tol && f <= 1.0 + f_tol && window.contains(&self.uv_at(theta, f), uv_tol)
        };

        let count = (4 * settings.intersection_grid).max(64);
        let step = TAU / count as f64;
        let flags: Vec<bool> = (0..count).map(|k| valid(k as f64 * step)).collect();
        let Some(k0) = flags.iter().position(|v| !v) else {
            let c3 = self.section_curve3d(sec, 0.0, TAU);
            let c2 = self.section_curve2d(sec, 0.0, TAU);
            return vec![self.dual(plane, Box::new(c3), c2)];
        };

        let boundary = |lo: f64, hi: f64| {
            roots::bisect(lo, hi, 1e-13, 200, |t| if valid(t) { 1.0 } else { -1.0 }).unwrap_or(0.5 * (lo + hi))
        };
        let mut runs = Vec::new();
        let mut start = None;
        for k in 1..=count {
            let (prev, cur) = ((k0 + k - 1) % count, (k0 + k) % count);
            let (t_prev, t_cur) = ((k0 + k - 1) as f64 * step, (k0 + k) as f64 * step);
            match (flags[prev], flags[cur]) {
                (false, true) => start = Some(boundary(t_prev, t_cur)),
                (true, false) => {
                    if let Some(s) = start.take() {
                        runs.push((s, boundary(t_prev, t_cur)));
                    }
                }
                _ => {}
            }
        }

        runs.into_iter()
            .filter(|(s, e)| (e - s) * self.r() > settings.tolerance.linear)
            .map(|(s, e)| {
                let c3 = self.section_curve3d(sec, s, e - s);
                let c2 = self.section_curve2d(sec, s, e - s);
                self.dual(plane, Box::new(c3), c2)
            })
            .collect()
    }
}

impl Cylinder for CylindricalSurfaceNp {
    fn axis(&self) -> Axis {
        Axis {
            location: self.location,
            direction: Dir3::new_normalize(self.z_axis),
        }
    }

    fn set_axis(&mut self, axis: Axis) {
        let from = self.z_axis.normalize();
        let to = axis.direction.into_inner();
        let rotation = Rotation3::rotation_between(&from, &to)
            .unwrap_or_else(|| Rotation3::from_axis_angle(&Unit::new_normalize(self.x_axis), PI));
        self.x_axis = rotation * self.x_axis;
        self.y_axis = rotation * self.y_axis;
        self.z_axis = to * self.z_axis.norm();
        self.location = axis.location;
        self.invalidate();
    }

    fn radius(&self) -> f64 {
        self.r()
    }

    fn set_radius(&mut self, radius: f64) {
        self.x_axis = self.x_axis.normalize() * radius;
        self.y_axis = self.y_axis.normalize() * radius;
        self.invalidate();
    }
}

impl Surface for CylindricalSurfaceNp {
    fn point_at(&self, uv: Point2) -> Point3 {
        let rho = uv.coords.norm();
        if rho == 0.0 {
            // The pole has no image; report the base of the axis
            return self.location;
        }
        let r = self.r();
        self.location + (uv.x / rho) * self.x_axis + (uv.y / rho) * self.y_axis + ((r - rho) / rho) * self.z_axis
    }

    fn u_direction(&self, uv: Point2) -> Vec3 {
        self.derivatives2(uv).du
    }

    fn v_direction(&self, uv: Point2) -> Vec3 {
        self.derivatives2(uv).dv
    }

    fn derivatives2(&self, uv: Point2) -> SurfaceDerivatives {
        let point = self.point_at(uv);
        let rho = uv.coords.norm();
        if rho == 0.0 {
            return SurfaceDerivatives::degenerate(point);
        }
        // P = location − z + g·q with g = 1/ρ and q = u·x + v·y + r·z
        let (u, v) = (uv.x, uv.y);
        let q = u * self.x_axis + v * self.y_axis + self.r() * self.z_axis;
        let g = 1.0 / rho;
        let rho3 = rho * rho * rho;
        let rho5 = rho3 * rho * rho;
        let (gu, gv) = (-u / rho3, -v / rho3);
        let guu = -1.0 / rho3 + 3.0 * u * u / rho5;
        let gvv = -1.0 / rho3 + 3.0 * v * v / rho5;
        let guv = 3.0 * u * v / rho5;
        SurfaceDerivatives {
            point,
            du: g * self.x_axis + gu * q,
            dv: g * self.y_axis + gv * q,
            duu: 2.0 * gu * self.x_axis + guu * q,
            dvv: 2.0 * gv * self.y_axis + gvv * q,
            duv: gu * self.y_axis + gv * self.x_axis + guv * q,
        }
    }

    fn natural_bounds(&self) -> ParamBounds {
        let r = self.r();
        ParamBounds::new(-r, r, -r, r)
    }

    fn fixed_u(&self, u: f64, vmin: f64, vmax: f64) -> Box<dyn Curve3d> {
        let line = Line2d::from_points(Point2::new(u, vmin), Point2::new(u, vmax));
        self.isoline(&line).unwrap_or_else(|| self.make_3d_curve(&line))
    }

    fn fixed_v(&self, v: f64, umin: f64, umax: f64) -> Box<dyn Curve3d> {
        let line = Line2d::from_points(Point2::new(umin, v), Point2::new(umax, v));
        self.isoline(&line).unwrap_or_else(|| self.make_3d_curve(&line))
    }

    fn modify(&mut self, t: &Transform) {
        self.location = t.apply_point(&self.location);
        self.x_axis = t.apply_vec(&self.x_axis);
        self.y_axis = t.apply_vec(&self.y_axis);
        self.z_axis = t.apply_vec(&self.z_axis);
        self.invalidate();
    }

    fn reverse_orientation(&mut self) -> Transform2d {
        self.y_axis = -self.y_axis;
        self.invalidate();
        Transform2d::new(1.0, 0.0, 0.0, -1.0, 0.0, 0.0)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Cylinder
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Closed form through the orthogonal frame.
    fn position_of(&self, p: &Point3) -> Point2 {
        let (theta, f) = self.polar_fraction(p);
        self.uv_at(theta, f)
    }

    fn position_of_near(&self, p: &Point3, _seed: Point2) -> Point2 {
        self.position_of(p)
    }

    fn safe_parameter_steps(&self, bounds: &ParamBounds) -> (Vec<f64>, Vec<f64>) {
        let b = bounds.intersect(&self.natural_bounds());
        let r = self.r();
        let half = 0.5 * r;
        let breaks = [
            0.0,
            half * FRAC_1_SQRT_2,
            half,
            r * FRAC_1_SQRT_2,
            r,
            -half * FRAC_1_SQRT_2,
            -half,
            -r * FRAC_1_SQRT_2,
            -r,
        ];
        (merge_steps(breaks, b.umin, b.umax), merge_steps(breaks, b.vmin, b.vmax))
    }

    fn projected_curve(&self, curve: &dyn Curve3d, precision: f64) -> Option<Box<dyn Curve2d>> {
        Self::PROJECTIONS
            .iter()
            .find_map(|strategy| strategy(self, curve, precision))
            .or_else(|| reuse_curve_on_surface(self, curve))
            .or_else(|| {
                log::debug!("no exact projection for {:?} on cylinder; sampling", curve.curve_type());
                project_curve(self, curve, precision)
            })
    }

    fn make_3d_curve(&self, curve: &dyn Curve2d) -> Box<dyn Curve3d> {
        Self::LIFTS
            .iter()
            .find_map(|strategy| strategy(self, curve))
            .unwrap_or_else(|| Box::new(CurveOnSurface::new(self.clone_box(), curve.clone_box())))
    }

    fn plane_intersection(&self, plane: &Plane, window: &ParamBounds, _precision: f64) -> Vec<DualSurfaceCurve> {
        let window = window.intersect(&self.natural_bounds());
        if window.is_empty() {
            return Vec::new();
        }
        let axial = plane.normal().dot(&self.z_axis.normalize());
        if axial.abs() < Tolerance::current().angular {
            self.parallel_plane_lines(plane, &window)
        } else {
            self.oblique_plane_section(plane, &window)
        }
    }

    fn to_record(&self) -> Option<SurfaceRecord> {
        Some(SurfaceRecord::Cylinder(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use surfkern_geom::CurveKind;

    fn unit() -> CylindricalSurfaceNp {
        CylindricalSurfaceNp::new(Point3::origin(), Vec3::x(), Vec3::y(), Vec3::new(0.0, 0.0, 5.0)).unwrap()
    }

    fn skewed() -> CylindricalSurfaceNp {
        CylindricalSurfaceNp::from_axis(Point3::new(1.0, -2.0, 0.5), Vec3::new(1.0, 2.0, 2.0), 1.5).unwrap()
    }

    #[test]
    fn test_annulus_scenario_is_exact() {
        let c = unit();
        assert_eq!(c.point_at(Point2::new(1.0, 0.0)), Point3::new(1.0, 0.0, 0.0));
        assert_eq!(c.point_at(Point2::new(0.5, 0.0)), Point3::new(1.0, 0.0, 5.0));
        assert_eq!(c.point_at(Point2::origin()), Point3::origin());
        assert_eq!(c.derivatives2(Point2::origin()).du, Vec3::zeros());
    }

    #[test]
    fn test_invalid_frames_are_rejected() {
        let bad_len = CylindricalSurfaceNp::new(Point3::origin(), Vec3::x(), 2.0 * Vec3::y(), Vec3::z());
        assert!(matches!(bad_len, Err(SurfaceError::InvalidConstruction(_))));
        let skew = CylindricalSurfaceNp::new(Point3::origin(), Vec3::x(), Vec3::new(0.6, 0.8, 0.0), Vec3::z());
        assert!(skew.is_err());
        assert!(CylindricalSurfaceNp::new(Point3::origin(), Vec3::x(), Vec3::y(), Vec3::zeros()).is_err());
    }

    #[test]
    fn test_position_of_inverts_point_at() {
        let c = skewed();
        for uv in [Point2::new(1.2, 0.3), Point2::new(-0.5, 0.9), Point2::new(0.1, -1.4), Point2::new(-1.0, -0.2)] {
            let p = c.point_at(uv);
            assert_relative_eq!(c.position_of(&p), uv, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let c = skewed();
        let uv = Point2::new(0.9, -0.6);
        let d = c.derivatives2(uv);
        let h = 1e-5;
        let p = |du: f64, dv: f64| c.point_at(Point2::new(uv.x + du, uv.y + dv));
        assert_relative_eq!(d.du, (p(h, 0.0) - p(-h, 0.0)) / (2.0 * h), epsilon = 1e-7);
        assert_relative_eq!(d.dv, (p(0.0, h) - p(0.0, -h)) / (2.0 * h), epsilon = 1e-7);
        let at = |du: f64, dv: f64| c.derivatives2(Point2::new(uv.x + du, uv.y + dv));
        assert_relative_eq!(d.duu, (at(h, 0.0).du - at(-h, 0.0).du) / (2.0 * h), epsilon = 1e-6);
        assert_relative_eq!(d.dvv, (at(0.0, h).dv - at(0.0, -h).dv) / (2.0 * h), epsilon = 1e-6);
        assert_relative_eq!(d.duv, (at(0.0, h).du - at(0.0, -h).du) / (2.0 * h), epsilon = 1e-6);
    }

    #[test]
    fn test_plane_through_axis_gives_two_generators() {
        let c = unit();
        let hits = c.plane_intersection(&Plane::xz(), &c.natural_bounds(), 1e-9);
        assert_eq!(hits.len(), 2);
        let mut xs: Vec<f64> = hits
            .iter()
            .map(|h| {
                let curve = h.curve3d();
                assert_eq!(curve.curve_type(), CurveKind::Line);
                let d = curve.end_point() - curve.start_point();
                assert_relative_eq!(d.normalize(), Vec3::z(), epsilon = 1e-12);
                assert_relative_eq!(d.norm(), 5.0, epsilon = 1e-12);
                assert!(curve.start_point().y.abs() < 1e-12);
                assert!(h.max_deviation(8) < 1e-9);
                curve.start_point().x
            })
            .collect();
        xs.sort_by(f64::total_cmp);
        assert_relative_eq!(xs[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(xs[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tangent_and_missing_planes() {
        let c = unit();
        let tangent = Plane::from_normal(Point3::new(1.0, 0.0, 0.0), Vec3::x());
        assert_eq!(c.plane_intersection(&tangent, &c.natural_bounds(), 1e-9).len(), 1);
        let outside = Plane::from_normal(Point3::new(2.0, 0.0, 0.0), Vec3::x());
        assert!(c.plane_intersection(&outside, &c.natural_bounds(), 1e-9).is_empty());
    }

    #[test]
    fn test_oblique_plane_gives_exact_ellipse() {
        let c = unit();
        let plane = Plane::from_normal(Point3::new(0.0, 0.0, 2.5), Vec3::new(-0.5, 0.0, 1.0));
        let hits = c.plane_intersection(&plane, &c.natural_bounds(), 1e-9);
        assert_eq!(hits.len(), 1);
        let curve = hits[0].curve3d();
        assert!(curve.is_closed());
        for t in uniform_positions(12) {
            let p = curve.point_at(t);
            assert!(plane.signed_distance(&p).abs() < 1e-12);
            assert!(c.implicit().value(&p).abs() < 1e-12);
        }
        assert!(hits[0].max_deviation(16) < 1e-9);
        let flat = hits[0].curve2d_a();
        assert!(flat.as_any().downcast_ref::<SectionCurve2d>().is_some());
        assert_eq!(flat.curve_type(), CurveKind::Ellipse);
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_relative_eq!(c.point_at(flat.point_at(t)), curve.point_at(t), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_oblique_plane_clipped_to_annulus() {
        let c = unit();
        // z = 2.5 + 4x leaves the axial range for |x| > 0.625
        let plane = Plane::from_normal(Point3::new(0.0, 0.0, 2.5), Vec3::new(-4.0, 0.0, 1.0));
        let hits = c.plane_intersection(&plane, &c.natural_bounds(), 1e-9);
        assert_eq!(hits.len(), 2);
        for h in &hits {
            for t in uniform_positions(8) {
                let z = h.curve3d().point_at(t).z;
                assert!((-1e-9..=5.0 + 1e-9).contains(&z), "z = {z}");
            }
            assert!(h.max_deviation(16) < 1e-9);
        }
    }

    #[test]
    fn test_projection_roundtrip_of_sections() {
        let c = unit();
        let plane = Plane::from_normal(Point3::new(0.0, 0.0, 2.5), Vec3::new(-0.5, 0.3, 1.0));
        let section = c.plane_intersection(&plane, &c.natural_bounds(), 1e-9).remove(0);
        let circle = Ellipse3d::circle(Point3::new(0.0, 0.0, 2.0), 1.0, -Vec3::z());
        let generator = Line3d::from_points(Point3::new(0.0, 1.0, 1.0), Point3::new(0.0, 1.0, 4.0));
        let curves: [&dyn Curve3d; 3] = [section.curve3d(), &circle, &generator];
        for curve in curves {
            let flat = c.projected_curve(curve, 1e-9).unwrap();
            assert_ne!(flat.curve_type(), CurveKind::BSpline);
            let back = c.make_3d_curve(flat.as_ref());
            assert_ne!(back.curve_type(), CurveKind::OnSurface);
            for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
                assert_relative_eq!(c.point_at(flat.point_at(t)), curve.point_at(t), epsilon = 1e-9);
                assert_relative_eq!(back.point_at(t), curve.point_at(t), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_section_parameter_curves_run_in_step() {
        let c = unit();
        let plane = Plane::from_normal(Point3::new(0.0, 0.0, 2.5), Vec3::new(-0.5, 0.3, 1.0));
        let section = c.plane_intersection(&plane, &c.natural_bounds(), 1e-9).remove(0);
        let curve = section.curve3d();
        let projected = c.projected_curve(curve, 1e-9).unwrap();
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let p = curve.point_at(t);
            assert_relative_eq!(c.point_at(projected.point_at(t)), p, epsilon = 1e-9);
            assert_relative_eq!(c.point_at(section.curve2d_a().point_at(t)), p, epsilon = 1e-9);
            assert_relative_eq!(plane.point_at(section.curve2d_b().point_at(t)), p, epsilon = 1e-9);
        }

        // Generators of a plane through the axis, and clipped oblique arcs
        let steep = Plane::from_normal(Point3::new(0.0, 0.0, 2.5), Vec3::new(-4.0, 0.0, 1.0));
        let duals = c
            .plane_intersection(&Plane::xz(), &c.natural_bounds(), 1e-9)
            .into_iter()
            .chain(c.plane_intersection(&steep, &c.natural_bounds(), 1e-9));
        for dual in duals {
            for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let p = dual.curve3d().point_at(t);
                assert_relative_eq!(c.point_at(dual.curve2d_a().point_at(t)), p, epsilon = 1e-9);
            }
            assert!(dual.max_deviation(16) < 1e-9);
        }
    }

    #[test]
    fn test_generic_lines_lift_pointwise() {
        let c = unit();
        let radial = Line2d::from_points(Point2::new(1.0, 0.0), Point2::new(0.5, 0.0));
        let across = Line2d::from_points(Point2::new(0.7, -0.3), Point2::new(0.7, 0.3));
        for line in [radial, across] {
            let lifted = c.make_3d_curve(&line);
            for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
                assert_relative_eq!(lifted.point_at(t), c.point_at(line.point_at(t)), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_section_classification_follows_tolerance() {
        let c = unit();
        // f(θ) = 0.5 + 1e-8·cos θ: a circle at the default tolerance
        let plane = Plane::from_normal(Point3::new(0.0, 0.0, 2.5), Vec3::new(-5e-8, 0.0, 1.0));
        let loose = c.plane_intersection(&plane, &c.natural_bounds(), 1e-9);
        assert_eq!(loose[0].curve2d_a().curve_type(), CurveKind::Circle);
        let _guard = Tolerance::new(1e-12, 1e-12).scoped();
        let tight = c.plane_intersection(&plane, &c.natural_bounds(), 1e-9);
        assert_eq!(tight[0].curve2d_a().curve_type(), CurveKind::Ellipse);
        assert!(tight[0].max_deviation(16) < 1e-9);
    }

    #[test]
    fn test_projection_falls_back_to_sampling() {
        let c = unit();
        let mut flipped = c.clone();
        flipped.reverse_orientation();
        let wiggle = CurveOnSurface::new(
            Box::new(flipped),
            Box::new(Circle2d::arc(Point2::new(0.1, 0.7), 0.15, 0.0, 3.0)),
        );
        let flat = c.projected_curve(&wiggle, 1e-7).unwrap();
        assert_eq!(flat.curve_type(), CurveKind::BSpline);
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_relative_eq!(c.point_at(flat.point_at(t)), wiggle.point_at(t), epsilon = 1e-7);
        }
    }

    #[test]
    fn test_isolines_are_analytic() {
        let c = unit();
        let radial = c.fixed_v(0.0, 0.5, 1.0);
        assert_eq!(radial.curve_type(), CurveKind::Line);
        let iso = c.fixed_u(0.7, -0.3, 0.3);
        assert!(iso.as_any().downcast_ref::<Ellipse3d>().is_some());
        for t in [0.0, 0.5, 1.0] {
            let uv = Point2::new(0.7, -0.3 + 0.6 * t);
            let p = c.point_at(uv);
            let q = iso.point_at(iso.closest_parameter(&p));
            assert_relative_eq!(p, q, epsilon = 1e-9);
        }
        assert_relative_eq!(iso.start_point(), c.point_at(Point2::new(0.7, -0.3)), epsilon = 1e-12);
    }

    #[test]
    fn test_facet_and_domain_helpers() {
        let mut c = unit();
        c.set_radius(2.0);
        assert_relative_eq!(c.radius(), 2.0);
        assert_relative_eq!(c.z_axis().norm(), 5.0);
        assert_relative_eq!(c.point_at(Point2::new(2.0, 0.0)), Point3::new(2.0, 0.0, 0.0), epsilon = 1e-12);

        c.set_axis(Axis {
            location: Point3::new(0.0, 0.0, 1.0),
            direction: Dir3::new_normalize(Vec3::x()),
        });
        assert_relative_eq!(c.axis().direction.into_inner(), Vec3::x(), epsilon = 1e-12);
        assert_relative_eq!(c.z_axis().norm(), 5.0, epsilon = 1e-12);
        assert!(c.validate().is_ok());
        assert!(c.implicit().value(&c.point_at(Point2::new(1.5, 0.2))).abs() < 1e-12);

        assert!(c.is_inside(Point2::new(1.5, 0.0)));
        assert!(!c.is_inside(Point2::new(0.5, 0.0)));
        assert!(c.patch_is_live(&ParamBounds::new(0.9, 1.1, -0.1, 0.1)));
        assert!(!c.patch_is_live(&ParamBounds::new(-0.3, 0.3, -0.3, 0.3)));

        let (us, _) = c.safe_parameter_steps(&c.natural_bounds());
        assert!(us.iter().any(|&u| (u - 1.0).abs() < 1e-12));
        assert!(us.iter().any(|&u| (u + 2.0 * FRAC_1_SQRT_2).abs() < 1e-12));
    }

    #[test]
    fn test_clone_modify_and_reverse() {
        let c = skewed();
        let same = c.modified(&Transform::identity());
        let moved = c.modified(&Transform::translation(1.0, 2.0, 3.0));
        for uv in [Point2::new(1.0, 0.2), Point2::new(-0.4, 1.1)] {
            assert_eq!(same.point_at(uv), c.point_at(uv));
            assert_relative_eq!(moved.point_at(uv), c.point_at(uv) + Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
        }
        let mut r = c.clone();
        let map = r.reverse_orientation();
        let uv = Point2::new(1.0, 0.3);
        assert_relative_eq!(r.point_at(map.apply_point(&uv)), c.point_at(uv), epsilon = 1e-12);
        assert_relative_eq!(r.normal(map.apply_point(&uv)), -c.normal(uv), epsilon = 1e-12);
    }
}
