//! Helical sweep of a planar profile.
//!
//! The profile lives in the local meridian plane (x radial, y axial). It is
//! rotated about the local y axis while advancing `pitch` along it per turn,
//! then placed in world space by `to_surface`.

use std::any::Any;
use std::f64::consts::{PI, TAU};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use surfkern_geom::numeric::second_derivative_2d;
use surfkern_geom::{bounds_2d, intersect, Curve2d, Curve3d, Ellipse3d, Line2d, Plane};
use surfkern_math::{angle, any_perpendicular, Point2, Point3, Tolerance, Transform, Transform2d, Vec2, Vec3};
use surfkern_nurbs::boxed_curve2d;

use crate::error::{Result, SurfaceError};
use crate::newton;
use crate::plane_intersection::march;
use crate::sampling::{linspace, merge_steps};
use crate::{CurveOnSurface, DualSurfaceCurve, ParamBounds, Surface, SurfaceDerivatives, SurfaceKind, SurfaceRecord};

/// Turns searched on each side when a plane intersection window is
/// unbounded in u.
const UNBOUNDED_TURNS: f64 = 2.0;

/// Upper limit on the profile copies examined by inversion and orientation.
const MAX_TURN_CANDIDATES: i64 = 64;

/// A profile curve swept along a helix.
///
/// `P(u, v) = to_surface · (x·cos u, y + pitch·u/2π, −x·sin u)` where `(x, y)`
/// is the profile point at `(v − s)/(e − s)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelicalSurface {
    #[serde(with = "boxed_curve2d")]
    basis_curve: Box<dyn Curve2d>,
    pitch: f64,
    to_surface: Transform,
    curve_start_parameter: f64,
    curve_end_parameter: f64,
    #[serde(skip)]
    from_surface: OnceLock<Transform>,
}

impl HelicalSurface {
    /// Create a helical surface.
    ///
    /// `to_surface` must be invertible and the parameter range `[s, e]`
    /// non-empty.
    pub fn new(
        basis_curve: Box<dyn Curve2d>,
        pitch: f64,
        to_surface: Transform,
        curve_start_parameter: f64,
        curve_end_parameter: f64,
    ) -> Result<Self> {
        let surface = Self {
            basis_curve,
            pitch,
            to_surface,
            curve_start_parameter,
            curve_end_parameter,
            from_surface: OnceLock::new(),
        };
        surface.validate()?;
        Ok(surface)
    }

    /// Sweep about the axis through `origin` along `axis`, with the profile's
    /// x direction chosen perpendicular to the axis.
    pub fn with_axis(
        basis_curve: Box<dyn Curve2d>,
        pitch: f64,
        origin: Point3,
        axis: Vec3,
        curve_start_parameter: f64,
        curve_end_parameter: f64,
    ) -> Result<Self> {
        if axis.norm() == 0.0 {
            return Err(SurfaceError::InvalidConstruction("zero helix axis".into()));
        }
        let y = axis.normalize();
        let x = any_perpendicular(&y);
        let frame = Transform::from_frame(origin, x, y, x.cross(&y));
        Self::new(basis_curve, pitch, frame, curve_start_parameter, curve_end_parameter)
    }

    /// Check the construction invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.pitch.is_finite() {
            return Err(SurfaceError::InvalidConstruction(format!("pitch {} is not finite", self.pitch)));
        }
        if self.curve_start_parameter == self.curve_end_parameter
            || !(self.curve_start_parameter.is_finite() && self.curve_end_parameter.is_finite())
        {
            return Err(SurfaceError::InvalidConstruction(format!(
                "empty profile range [{}, {}]",
                self.curve_start_parameter, self.curve_end_parameter
            )));
        }
        if self.to_surface.determinant().abs() < 1e-12 || self.to_surface.inverse().is_none() {
            return Err(SurfaceError::InvalidConstruction("placement transform is singular".into()));
        }
        Ok(())
    }

    /// The profile curve.
    pub fn basis_curve(&self) -> &dyn Curve2d {
        self.basis_curve.as_ref()
    }

    /// Axial advance per full turn.
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Local-to-world placement.
    pub fn to_surface(&self) -> &Transform {
        &self.to_surface
    }

    /// World-to-local placement, computed on first use.
    pub fn from_surface(&self) -> &Transform {
        self.from_surface.get_or_init(|| {
            self.to_surface.inverse().unwrap_or_else(|| {
                log::warn!("helical placement transform is singular; using identity inverse");
                Transform::identity()
            })
        })
    }

    /// Surface v at the profile start.
    pub fn curve_start_parameter(&self) -> f64 {
        self.curve_start_parameter
    }

    /// Surface v at the profile end.
    pub fn curve_end_parameter(&self) -> f64 {
        self.curve_end_parameter
    }

    fn k(&self) -> f64 {
        self.pitch / TAU
    }

    fn span(&self) -> f64 {
        self.curve_end_parameter - self.curve_start_parameter
    }

    fn profile_parameter(&self, v: f64) -> f64 {
        (v - self.curve_start_parameter) / self.span()
    }

    fn surface_v(&self, t: f64) -> f64 {
        self.curve_start_parameter + t * self.span()
    }

    fn invalidate(&mut self) {
        self.from_surface = OnceLock::new();
    }

    fn profile_deriv2(&self, t: f64) -> (Point2, Vec2, Vec2) {
        self.basis_curve.try_point_deriv2_at(t).unwrap_or_else(|| {
            (
                self.basis_curve.point_at(t),
                self.basis_curve.direction_at(t),
                second_derivative_2d(self.basis_curve.as_ref(), t),
            )
        })
    }

    fn local_point(&self, q: Point2, u: f64) -> Point3 {
        let (s, c) = u.sin_cos();
        Point3::new(q.x * c, q.y + self.k() * u, -q.x * s)
    }

    /// Profile copies seen in the meridian half-plane of the local point
    /// `local`, as `(turn angle, point in profile coordinates)`.
    ///
    /// A point at polar angle φ lies on the copy at φ + 2πn with positive
    /// radius or on the copy at φ + π + 2πn with negative radius.
    fn turn_candidates(&self, local: &Point3) -> Vec<(f64, Point2)> {
        let rho = local.x.hypot(local.z);
        let phi = angle::normalize((-local.z).atan2(local.x));
        let k = self.k();
        let (lo, hi) = bounds_2d(self.basis_curve.as_ref());
        let mut out = Vec::new();
        for (base, radius) in [(phi, rho), (phi + PI, -rho)] {
            if self.pitch == 0.0 {
                out.push((angle::normalize(base), Point2::new(radius, local.y)));
                continue;
            }
            // Turns n for which the profile's axial extent can reach local.y
            let n_of = |y: f64| (local.y - y - k * base) / self.pitch;
            let (a, b) = (n_of(lo.y), n_of(hi.y));
            let first = (a.min(b).floor() as i64) - 1;
            let last = (a.max(b).ceil() as i64 + 1).min(first + MAX_TURN_CANDIDATES);
            for n in first..=last {
                let u = base + TAU * n as f64;
                out.push((u, Point2::new(radius, local.y - k * u)));
            }
        }
        out
    }

    /// Closest profile point over all turn candidates.
    fn closed_form_seed(&self, p: &Point3) -> Option<(Point2, f64)> {
        let local = self.from_surface().apply_point(p);
        self.turn_candidates(&local)
            .into_iter()
            .map(|(u, q)| {
                let t = self.basis_curve.closest_parameter(&q);
                let d = (self.basis_curve.point_at(t) - q).norm();
                (Point2::new(u, self.surface_v(t)), d)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Point inversion by Newton iteration alone, seeded on a grid spanning
    /// two turns around the turn whose profile copy is level with `p`.
    pub fn newton_position_of(&self, p: &Point3) -> Point2 {
        let natural = self.natural_bounds();
        let window = if self.pitch == 0.0 {
            natural
        } else {
            let local = self.from_surface().apply_point(p);
            let (lo, hi) = bounds_2d(self.basis_curve.as_ref());
            let u0 = (local.y - 0.5 * (lo.y + hi.y)) / self.k();
            ParamBounds::new(u0 - TAU, u0 + TAU, natural.vmin, natural.vmax)
        };
        newton::position_in(self, p, &window)
    }

    /// Signed distance of `p` from the surface, measured in the meridian
    /// section. Negative inside the region bounded by the profile copies.
    pub fn orientation(&self, p: &Point3) -> f64 {
        let local = self.from_surface().apply_point(p);
        let rho = local.x.hypot(local.z);
        let phi = (-local.z).atan2(local.x);
        let q = Point2::new(rho, local.y - self.k() * phi);

        let (lo, hi) = bounds_2d(self.basis_curve.as_ref());
        let shifts: Vec<f64> = if self.pitch == 0.0 {
            vec![0.0]
        } else {
            let n_of = |y: f64| (q.y - y) / self.pitch;
            let (a, b) = (n_of(lo.y), n_of(hi.y));
            let first = a.min(b).floor() as i64 - 1;
            let last = (a.max(b).ceil() as i64 + 1).min(first + MAX_TURN_CANDIDATES);
            (first..=last).map(|n| n as f64 * self.pitch).collect()
        };
        let copies: Vec<Box<dyn Curve2d>> = shifts
            .iter()
            .flat_map(|&dy| {
                [
                    Transform2d::new(1.0, 0.0, 0.0, 1.0, 0.0, dy),
                    Transform2d::new(-1.0, 0.0, 0.0, 1.0, 0.0, dy - 0.5 * self.pitch),
                ]
            })
            .map(|t| self.basis_curve.transformed(&t))
            .collect();

        let distance = copies
            .iter()
            .map(|c| (c.point_at(c.closest_parameter(&q)) - q).norm())
            .fold(f64::INFINITY, f64::min);

        let reach = lo.x.abs().max(hi.x.abs()) + rho + 1.0;
        let ray = Line2d::from_points(q, Point2::new(reach, q.y));
        let tol = Tolerance::current().linear;
        let winding: f64 = copies
            .iter()
            .flat_map(|c| {
                intersect(&ray, c.as_ref())
                    .into_iter()
                    .filter(|hit| (hit.point - q).norm() > tol)
                    .map(|hit| c.direction_at(hit.t_b).y.signum())
                    .collect::<Vec<_>>()
            })
            .sum();
        if winding.abs() >= 0.5 {
            -distance
        } else {
            distance
        }
    }

    /// `window ∩ natural_bounds` with an unbounded u range cut to a few turns.
    fn finite_window(&self, window: &ParamBounds) -> ParamBounds {
        let mut b = window.intersect(&self.natural_bounds());
        if !(b.umin.is_finite() && b.umax.is_finite()) {
            let reach = UNBOUNDED_TURNS * TAU;
            (b.umin, b.umax) = match (b.umin.is_finite(), b.umax.is_finite()) {
                (true, _) => (b.umin, b.umin + 2.0 * reach),
                (false, true) => (b.umax - 2.0 * reach, b.umax),
                (false, false) => (-reach, reach),
            };
        }
        b
    }

    fn dual(&self, plane: &Plane, curve3d: Box<dyn Curve3d>, curve2d: Box<dyn Curve2d>) -> DualSurfaceCurve {
        let on_plane = curve3d.project_to_plane(plane);
        DualSurfaceCurve::new(curve3d, self.clone_box(), curve2d, plane.clone_box(), on_plane)
    }

    /// Plane through the axis: whole profile copies in the meridian planes
    /// lying in the plane.
    fn axial_plane_profiles(&self, plane: &Plane, normal: &Vec3, window: &ParamBounds) -> Vec<DualSurfaceCurve> {
        let alpha = normal.x.atan2(normal.z);
        let first = ((window.umin - alpha) / PI).ceil() as i64;
        let last = ((window.umax - alpha) / PI).floor() as i64;
        // On a closed turn u = umin + 2π repeats u = umin
        let eps = Tolerance::current().angular;
        let full_turn = self.is_u_periodic() && window.umax - window.umin >= TAU - eps;
        (first..=last)
            .map(|m| alpha + PI * m as f64)
            .filter(|&u| !(full_turn && u >= window.umin + TAU - eps))
            .map(|u| {
                let c3 = self.fixed_u(u, window.vmin, window.vmax);
                let c2 = Line2d::from_points(Point2::new(u, window.vmin), Point2::new(u, window.vmax));
                self.dual(plane, c3, Box::new(c2))
            })
            .collect()
    }

    /// Zero pitch and a plane across the axis: one circle per profile
    /// crossing of the plane's height.
    fn flat_circles(&self, plane: &Plane, height: f64, window: &ParamBounds) -> Vec<DualSurfaceCurve> {
        let tol = Tolerance::current();
        let (lo, hi) = bounds_2d(self.basis_curve.as_ref());
        let across = Line2d::from_points(Point2::new(lo.x - 1.0, height), Point2::new(hi.x + 1.0, height));
        let mut seen: Vec<Point2> = Vec::new();
        let sweep = window.umax - window.umin;
        intersect(self.basis_curve.as_ref(), &across)
            .into_iter()
            .filter_map(|hit| {
                let x = hit.point.x;
                let v = self.surface_v(hit.t_a);
                if x.abs() <= tol.linear
                    || v < window.vmin - tol.linear
                    || v > window.vmax + tol.linear
                    || seen.iter().any(|p| tol.points2_equal(p, &hit.point))
                {
                    return None;
                }
                seen.push(hit.point);
                let circle = Ellipse3d::arc(
                    self.to_surface.apply_point(&Point3::new(0.0, height, 0.0)),
                    self.to_surface.apply_vec(&Vec3::new(x, 0.0, 0.0)),
                    self.to_surface.apply_vec(&Vec3::new(0.0, 0.0, -x)),
                    window.umin,
                    sweep,
                );
                let c2 = Line2d::from_points(Point2::new(window.umin, v), Point2::new(window.umax, v));
                Some(self.dual(plane, Box::new(circle), Box::new(c2)))
            })
            .collect()
    }
}

impl Surface for HelicalSurface {
    fn point_at(&self, uv: Point2) -> Point3 {
        let q = self.basis_curve.point_at(self.profile_parameter(uv.y));
        self.to_surface.apply_point(&self.local_point(q, uv.x))
    }

    fn u_direction(&self, uv: Point2) -> Vec3 {
        self.derivatives2(uv).du
    }

    fn v_direction(&self, uv: Point2) -> Vec3 {
        self.derivatives2(uv).dv
    }

    fn derivatives2(&self, uv: Point2) -> SurfaceDerivatives {
        let (q, d1, d2) = self.profile_deriv2(self.profile_parameter(uv.y));
        let w = 1.0 / self.span();
        let (s, c) = uv.x.sin_cos();
        let t = &self.to_surface;
        SurfaceDerivatives {
            point: t.apply_point(&self.local_point(q, uv.x)),
            du: t.apply_vec(&Vec3::new(-q.x * s, self.k(), -q.x * c)),
            dv: t.apply_vec(&(w * Vec3::new(d1.x * c, d1.y, -d1.x * s))),
            duu: t.apply_vec(&Vec3::new(-q.x * c, 0.0, q.x * s)),
            dvv: t.apply_vec(&(w * w * Vec3::new(d2.x * c, d2.y, -d2.x * s))),
            duv: t.apply_vec(&(w * Vec3::new(-d1.x * s, 0.0, -d1.x * c))),
        }
    }

    fn natural_bounds(&self) -> ParamBounds {
        let (s, e) = (self.curve_start_parameter, self.curve_end_parameter);
        if self.pitch == 0.0 {
            ParamBounds::new(0.0, TAU, s, e)
        } else {
            ParamBounds::new(f64::NEG_INFINITY, f64::INFINITY, s, e)
        }
    }

    /// The profile itself, turned to angle `u` and raised by `pitch·u/2π`.
    fn fixed_u(&self, u: f64, vmin: f64, vmax: f64) -> Box<dyn Curve3d> {
        let Some(piece) = self.basis_curve.trim(self.profile_parameter(vmin), self.profile_parameter(vmax)) else {
            log::debug!("profile cannot be trimmed to [{vmin}, {vmax}]; isoline kept as a parameter curve");
            let line = Line2d::from_points(Point2::new(u, vmin), Point2::new(u, vmax));
            return Box::new(CurveOnSurface::new(self.clone_box(), Box::new(line)));
        };
        let (s, c) = u.sin_cos();
        piece.lift(
            &self.to_surface.apply_point(&Point3::new(0.0, self.k() * u, 0.0)),
            &self.to_surface.apply_vec(&Vec3::new(c, 0.0, -s)),
            &self.to_surface.apply_vec(&Vec3::y()),
        )
    }

    fn fixed_v(&self, v: f64, umin: f64, umax: f64) -> Box<dyn Curve3d> {
        let line = Line2d::from_points(Point2::new(umin, v), Point2::new(umax, v));
        Box::new(CurveOnSurface::new(self.clone_box(), Box::new(line)))
    }

    fn modify(&mut self, t: &Transform) {
        self.to_surface = t.then(&self.to_surface);
        self.invalidate();
    }

    fn reverse_orientation(&mut self) -> Transform2d {
        self.basis_curve = self.basis_curve.reversed();
        Transform2d::new(1.0, 0.0, 0.0, -1.0, 0.0, self.curve_start_parameter + self.curve_end_parameter)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Helical
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Turn counting picks the profile copy, Newton polishes the result.
    fn position_of(&self, p: &Point3) -> Point2 {
        let Some((seed, _)) = self.closed_form_seed(p) else {
            return self.newton_position_of(p);
        };
        let uv = newton::refine(self, p, seed);
        if self.is_u_periodic() {
            Point2::new(angle::normalize(uv.x), uv.y)
        } else {
            uv
        }
    }

    fn is_u_periodic(&self) -> bool {
        self.pitch == 0.0
    }

    fn u_period(&self) -> f64 {
        if self.pitch == 0.0 {
            TAU
        } else {
            0.0
        }
    }

    fn safe_parameter_steps(&self, bounds: &ParamBounds) -> (Vec<f64>, Vec<f64>) {
        let b = self.finite_window(bounds);
        let quarter = 0.5 * PI;
        let us = if b.umax - b.umin <= 8.0 * TAU {
            let first = (b.umin / quarter).ceil() as i64;
            let last = (b.umax / quarter).floor() as i64;
            merge_steps((first..=last).map(|i| i as f64 * quarter), b.umin, b.umax)
        } else {
            linspace(b.umin, b.umax, 32)
        };
        let vs = merge_steps(
            self.basis_curve.safe_sample_positions().into_iter().map(|t| self.surface_v(t)),
            b.vmin,
            b.vmax,
        );
        (us, vs)
    }

    fn make_3d_curve(&self, curve: &dyn Curve2d) -> Box<dyn Curve3d> {
        if let Some(line) = curve.as_any().downcast_ref::<Line2d>() {
            if line.is_constant_u(Tolerance::current().linear * 1e-3) {
                let (p0, p1) = (line.start_point(), line.end_point());
                return self.fixed_u(p0.x, p0.y, p1.y);
            }
        }
        Box::new(CurveOnSurface::new(self.clone_box(), curve.clone_box()))
    }

    fn plane_intersection(&self, plane: &Plane, window: &ParamBounds, precision: f64) -> Vec<DualSurfaceCurve> {
        if window.intersect(&self.natural_bounds()).is_empty() {
            return Vec::new();
        }
        let w = self.finite_window(window);
        if !(window.umin.is_finite() && window.umax.is_finite()) && !self.is_u_periodic() {
            log::warn!("helical plane intersection window is unbounded in u; searching ±{UNBOUNDED_TURNS} turns");
        }
        let from = self.from_surface();
        let n = from.apply_normal(&plane.normal()).normalize();
        let offset = n.dot(&from.apply_point(&plane.origin).coords);
        let tol = Tolerance::current();

        if n.y.abs() < tol.angular && offset.abs() < tol.linear {
            return self.axial_plane_profiles(plane, &n, &w);
        }
        if self.pitch == 0.0 && n.x.hypot(n.z) < tol.angular {
            return self.flat_circles(plane, offset / n.y, &w);
        }
        march(self, plane, &w, precision)
    }

    fn to_record(&self) -> Option<SurfaceRecord> {
        Some(SurfaceRecord::Helical(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use surfkern_geom::Circle2d;

    fn tube_profile() -> Box<dyn Curve2d> {
        Box::new(Circle2d::new(Point2::new(3.0, 0.0), 1.0))
    }

    fn thread() -> HelicalSurface {
        HelicalSurface::with_axis(tube_profile(), 4.0, Point3::new(1.0, 2.0, 0.0), Vec3::z(), 0.0, 1.0).unwrap()
    }

    fn local(pitch: f64) -> HelicalSurface {
        HelicalSurface::new(tube_profile(), pitch, Transform::identity(), 0.0, 1.0).unwrap()
    }

    #[test]
    fn test_advances_one_pitch_per_turn() {
        let h = thread();
        for uv in [Point2::new(0.0, 0.1), Point2::new(1.3, 0.6), Point2::new(-4.0, 0.9)] {
            let next = h.point_at(Point2::new(uv.x + TAU, uv.y));
            assert_relative_eq!(next - h.point_at(uv), Vec3::new(0.0, 0.0, 4.0), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let h = HelicalSurface::with_axis(tube_profile(), 2.5, Point3::origin(), Vec3::new(1.0, 1.0, 0.0), 0.2, 1.7).unwrap();
        let uv = Point2::new(0.8, 0.9);
        let d = h.derivatives2(uv);
        let e = 1e-5;
        let at = |du: f64, dv: f64| h.derivatives2(Point2::new(uv.x + du, uv.y + dv));
        assert_relative_eq!(d.du, (at(e, 0.0).point - at(-e, 0.0).point) / (2.0 * e), epsilon = 1e-6);
        assert_relative_eq!(d.dv, (at(0.0, e).point - at(0.0, -e).point) / (2.0 * e), epsilon = 1e-6);
        assert_relative_eq!(d.duu, (at(e, 0.0).du - at(-e, 0.0).du) / (2.0 * e), epsilon = 1e-5);
        assert_relative_eq!(d.dvv, (at(0.0, e).dv - at(0.0, -e).dv) / (2.0 * e), epsilon = 1e-5);
        assert_relative_eq!(d.duv, (at(0.0, e).du - at(0.0, -e).du) / (2.0 * e), epsilon = 1e-5);
    }

    #[test]
    fn test_position_of_finds_the_right_turn() {
        let h = thread();
        for uv in [Point2::new(0.3, 0.2), Point2::new(5.0, 0.7), Point2::new(-7.0, 0.45), Point2::new(20.0, 0.6)] {
            let p = h.point_at(uv);
            assert_relative_eq!(h.position_of(&p), uv, epsilon = 1e-9);
        }
        let p = h.point_at(Point2::new(0.3, 0.2));
        assert_relative_eq!(h.newton_position_of(&p), Point2::new(0.3, 0.2), epsilon = 1e-6);

        let torus = local(0.0);
        let uv = Point2::new(5.5, 0.3);
        assert_relative_eq!(torus.position_of(&torus.point_at(uv)), uv, epsilon = 1e-9);
    }

    #[test]
    fn test_straight_profile_sweeps_a_helix() {
        // A profile parallel to the axis traces helices at radius 2
        let pitch = 3.0;
        let profile = Line2d::from_points(Point2::new(2.0, 0.0), Point2::new(2.0, 1.0));
        let h = HelicalSurface::with_axis(Box::new(profile), pitch, Point3::origin(), Vec3::z(), 0.0, 1.0).unwrap();
        for v0 in [0.0, 0.4, 1.0] {
            let rise = h.point_at(Point2::new(TAU, v0)) - h.point_at(Point2::new(0.0, v0));
            assert_relative_eq!(rise, pitch * Vec3::z(), epsilon = 1e-12);
            let p = h.point_at(Point2::new(1.0, v0));
            assert_relative_eq!(p.x.hypot(p.y), 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_newton_window_follows_a_raised_profile() {
        // Profile forty units above the sweep origin, ten pitches up
        let raised = Circle2d::new(Point2::new(3.0, 40.0), 1.0);
        let h = HelicalSurface::new(Box::new(raised), 4.0, Transform::identity(), 0.0, 1.0).unwrap();
        for uv in [Point2::new(0.5, 0.3), Point2::new(-2.0, 0.8)] {
            let p = h.point_at(uv);
            let found = h.newton_position_of(&p);
            assert_relative_eq!(h.point_at(found), p, epsilon = 1e-7);
            assert_relative_eq!(found.x, uv.x, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_projection_then_lift_reproduces_curves() {
        let h = thread();
        let isoline = h.fixed_u(1.1, 0.1, 0.6);
        let diagonal = h.make_3d_curve(&Line2d::from_points(Point2::new(0.2, 0.1), Point2::new(2.0, 0.8)));
        for curve in [isoline, diagonal] {
            let flat = h.projected_curve(curve.as_ref(), 1e-7).unwrap();
            let back = h.make_3d_curve(flat.as_ref());
            for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
                assert_relative_eq!(h.point_at(flat.point_at(t)), curve.point_at(t), epsilon = 1e-7);
                assert_relative_eq!(back.point_at(t), curve.point_at(t), epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn test_isolines() {
        let h = thread();
        let c = h.fixed_u(1.1, 0.1, 0.6);
        for t in [0.0, 0.25, 0.5, 1.0] {
            assert_relative_eq!(c.point_at(t), h.point_at(Point2::new(1.1, 0.1 + 0.5 * t)), epsilon = 1e-12);
        }
        let lifted = h.make_3d_curve(&Line2d::from_points(Point2::new(1.1, 0.1), Point2::new(1.1, 0.6)));
        assert!(lifted.as_any().downcast_ref::<Ellipse3d>().is_some());

        let ring = h.fixed_v(0.25, 0.0, 3.0);
        assert_relative_eq!(ring.point_at(0.5), h.point_at(Point2::new(1.5, 0.25)), epsilon = 1e-12);
    }

    #[test]
    fn test_orientation_sign() {
        let h = local(4.0);
        assert_relative_eq!(h.orientation(&Point3::new(3.0, 0.0, 0.0)), -1.0, epsilon = 1e-9);
        assert_relative_eq!(h.orientation(&Point3::new(5.0, 0.0, 0.0)), 1.0, epsilon = 1e-9);
        // Half a turn further the tube sits half a pitch higher
        assert!(h.orientation(&Point3::new(-3.0, 2.0, 0.0)) < 0.0);
        assert!(h.orientation(&Point3::new(-3.0, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_plane_through_axis_gives_profile_copies() {
        let h = local(4.0);
        let hits = h.plane_intersection(&Plane::xy(), &ParamBounds::new(-0.5, 3.5, 0.0, 1.0), 1e-9);
        assert_eq!(hits.len(), 2);
        for hit in &hits {
            for t in [0.0, 0.3, 0.6, 0.9] {
                assert!(hit.curve3d().point_at(t).z.abs() < 1e-9);
            }
            assert!(hit.max_deviation(8) < 1e-9);
        }
        assert_relative_eq!(hits[1].curve3d().start_point(), Point3::new(-4.0, 2.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_flat_sweep_cut_across_axis_gives_circles() {
        let torus = local(0.0);
        let plane = Plane::from_normal(Point3::new(0.0, 0.5, 0.0), Vec3::y());
        let hits = torus.plane_intersection(&plane, &torus.natural_bounds(), 1e-9);
        assert_eq!(hits.len(), 2);
        let mut radii: Vec<f64> = hits
            .iter()
            .map(|hit| {
                assert!(hit.max_deviation(8) < 1e-9);
                let p = hit.curve3d().point_at(0.4);
                assert_relative_eq!(p.y, 0.5, epsilon = 1e-12);
                p.x.hypot(p.z)
            })
            .collect();
        radii.sort_by(f64::total_cmp);
        assert_relative_eq!(radii[0], 3.0 - 0.75_f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(radii[1], 3.0 + 0.75_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_oblique_plane_is_marched() {
        let torus = local(0.0);
        let plane = Plane::from_normal(Point3::new(3.5, 0.0, 0.0), Vec3::x());
        let hits = torus.plane_intersection(&plane, &torus.natural_bounds(), 1e-7);
        assert!(!hits.is_empty());
        for hit in &hits {
            for t in [0.0, 0.5, 1.0] {
                assert!(plane.signed_distance(&hit.curve3d().point_at(t)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_reverse_orientation_and_modify() {
        let h = thread();
        let mut r = h.clone();
        let map = r.reverse_orientation();
        let uv = Point2::new(0.7, 0.3);
        assert_relative_eq!(r.point_at(map.apply_point(&uv)), h.point_at(uv), epsilon = 1e-12);
        assert_relative_eq!(r.normal(map.apply_point(&uv)), -h.normal(uv), epsilon = 1e-9);

        let same = h.modified(&Transform::identity());
        assert_eq!(same.point_at(uv), h.point_at(uv));
        let moved = h.modified(&Transform::translation(0.0, 0.0, 1.0));
        let p = moved.point_at(uv);
        assert_relative_eq!(p, h.point_at(uv) + Vec3::z(), epsilon = 1e-12);
        assert_relative_eq!(moved.position_of(&p), uv, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(HelicalSurface::new(tube_profile(), 1.0, Transform::identity(), 0.5, 0.5).is_err());
        assert!(HelicalSurface::new(tube_profile(), 1.0, Transform::scale(1.0, 0.0, 1.0), 0.0, 1.0).is_err());
        assert!(HelicalSurface::with_axis(tube_profile(), 1.0, Point3::origin(), Vec3::zeros(), 0.0, 1.0).is_err());
    }
}
