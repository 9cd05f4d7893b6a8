//! Surface of linear extrusion: a 3D curve swept along a fixed direction.

use std::any::Any;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use surfkern_geom::numeric::uniform_positions;
use surfkern_geom::{Curve2d, Curve3d, Line2d, Line3d, Plane};
use surfkern_math::{roots, KernelSettings, Point2, Point3, Tolerance, Transform, Transform2d, Vec3};
use surfkern_nurbs::{boxed_curve3d, BSplineCurve2d};

use crate::error::{Result, SurfaceError};
use crate::plane_intersection::bounded_window;
use crate::sampling::{fit_space_curve, fit_uv_curve, merge_steps, project_curve, reuse_curve_on_surface, unwrap_periodic};
use crate::{CurveOnSurface, DualSurfaceCurve, ParamBounds, Surface, SurfaceDerivatives, SurfaceKind, SurfaceRecord};

type Projection = fn(&SurfaceOfLinearExtrusion, &dyn Curve3d) -> Option<Box<dyn Curve2d>>;
type Lift = fn(&SurfaceOfLinearExtrusion, &dyn Curve2d) -> Option<Box<dyn Curve3d>>;

/// `P(u, v) = C((u − s)/(e − s)) + v·direction`.
///
/// u runs over `[s, e]` along the basis curve, v is unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceOfLinearExtrusion {
    #[serde(with = "boxed_curve3d")]
    basis_curve: Box<dyn Curve3d>,
    direction: Vec3,
    curve_start_parameter: f64,
    curve_end_parameter: f64,
}

impl SurfaceOfLinearExtrusion {
    /// Create an extrusion.
    ///
    /// Fails for a zero direction, an empty parameter range, or a straight
    /// basis curve parallel to the direction.
    pub fn new(
        basis_curve: Box<dyn Curve3d>,
        direction: Vec3,
        curve_start_parameter: f64,
        curve_end_parameter: f64,
    ) -> Result<Self> {
        let surface = Self {
            basis_curve,
            direction,
            curve_start_parameter,
            curve_end_parameter,
        };
        surface.validate()?;
        Ok(surface)
    }

    /// Check the construction invariants.
    pub fn validate(&self) -> Result<()> {
        let len = self.direction.norm();
        if !(len > 0.0 && len.is_finite()) {
            return Err(SurfaceError::InvalidConstruction("zero extrusion direction".into()));
        }
        if self.curve_start_parameter == self.curve_end_parameter {
            return Err(SurfaceError::InvalidConstruction(format!(
                "empty basis range [{}, {}]",
                self.curve_start_parameter, self.curve_end_parameter
            )));
        }
        if let Some(line) = self.basis_curve.as_any().downcast_ref::<Line3d>() {
            let l = line.direction.norm();
            if l == 0.0 || line.direction.cross(&self.direction).norm() <= Tolerance::current().angular * l * len {
                return Err(SurfaceError::InvalidConstruction(
                    "straight basis curve is parallel to the extrusion direction".into(),
                ));
            }
        }
        Ok(())
    }

    /// The swept curve.
    pub fn basis_curve(&self) -> &dyn Curve3d {
        self.basis_curve.as_ref()
    }

    /// The sweep vector for v = 1.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Surface u at the start of the basis curve.
    pub fn curve_start_parameter(&self) -> f64 {
        self.curve_start_parameter
    }

    /// Surface u at the end of the basis curve.
    pub fn curve_end_parameter(&self) -> f64 {
        self.curve_end_parameter
    }

    fn span(&self) -> f64 {
        self.curve_end_parameter - self.curve_start_parameter
    }

    fn curve_parameter(&self, u: f64) -> f64 {
        (u - self.curve_start_parameter) / self.span()
    }

    fn surface_u(&self, t: f64) -> f64 {
        self.curve_start_parameter + t * self.span()
    }

    /// v of `p` relative to the basis point at curve parameter `t`.
    fn height_over(&self, p: &Point3, t: f64) -> f64 {
        (p - self.basis_curve.point_at(t)).dot(&self.direction) / self.direction.norm_squared()
    }

    fn ruling(&self, u: f64, v0: f64, v1: f64) -> Line3d {
        Line3d::from_points(self.point_at(Point2::new(u, v0)), self.point_at(Point2::new(u, v1)))
    }

    // -------------------------------------------------------------------------
    // Lifting strategies
    // -------------------------------------------------------------------------

    const LIFTS: &'static [Lift] = &[Self::lift_ruling, Self::lift_basis_copy, Self::lift_straight_basis, Self::lift_spline];

    fn lift_ruling(&self, curve: &dyn Curve2d) -> Option<Box<dyn Curve3d>> {
        let line = curve.as_any().downcast_ref::<Line2d>()?;
        if !line.is_constant_u(Tolerance::current().linear * 1e-3) {
            return None;
        }
        let (p0, p1) = (line.start_point(), line.end_point());
        Some(Box::new(self.ruling(p0.x, p0.y, p1.y)))
    }

    /// A constant-v line is a trimmed, translated copy of the basis.
    fn lift_basis_copy(&self, curve: &dyn Curve2d) -> Option<Box<dyn Curve3d>> {
        let line = curve.as_any().downcast_ref::<Line2d>()?;
        if !line.is_constant_v(Tolerance::current().linear * 1e-3) {
            return None;
        }
        let (p0, p1) = (line.start_point(), line.end_point());
        let piece = self
            .basis_curve
            .trim(self.curve_parameter(p0.x), self.curve_parameter(p1.x))?;
        Some(piece.transformed(&Transform::translation_by(&(p0.y * self.direction))))
    }

    /// A straight basis makes the surface affine in (u, v).
    fn lift_straight_basis(&self, curve: &dyn Curve2d) -> Option<Box<dyn Curve3d>> {
        let line = curve.as_any().downcast_ref::<Line2d>()?;
        self.basis_curve.as_any().downcast_ref::<Line3d>()?;
        Some(Box::new(Line3d::from_points(
            self.point_at(line.start_point()),
            self.point_at(line.end_point()),
        )))
    }

    fn lift_spline(&self, curve: &dyn Curve2d) -> Option<Box<dyn Curve3d>> {
        curve.as_any().downcast_ref::<BSplineCurve2d>()?;
        let n = 2 * (KernelSettings::current().projection_samples - 1);
        let params = merge_steps(curve.safe_sample_positions().into_iter().chain(uniform_positions(n)), 0.0, 1.0);
        fit_space_curve(&params, |t| self.point_at(curve.point_at(t)))
    }

    // -------------------------------------------------------------------------
    // Projection strategies
    // -------------------------------------------------------------------------

    const PROJECTIONS: &'static [Projection] = &[Self::project_ruling, Self::project_basis_copy];

    /// Lines along the direction are rulings.
    fn project_ruling(&self, curve: &dyn Curve3d) -> Option<Box<dyn Curve2d>> {
        let line = curve.as_any().downcast_ref::<Line3d>()?;
        let tol = Tolerance::current();
        if line.direction.cross(&self.direction).norm() > tol.angular * line.direction.norm() * self.direction.norm() {
            return None;
        }
        let a = self.position_of(&line.start_point());
        if !tol.points_equal(&self.point_at(a), &line.start_point()) {
            return None;
        }
        let v1 = self.height_over(&line.end_point(), self.curve_parameter(a.x));
        Some(Box::new(Line2d::from_points(a, Point2::new(a.x, v1))))
    }

    /// A translated copy of the whole basis curve, either direction.
    fn project_basis_copy(&self, curve: &dyn Curve3d) -> Option<Box<dyn Curve2d>> {
        if curve.curve_type() != self.basis_curve.curve_type() {
            return None;
        }
        let tol = Tolerance::current();
        let (s, e) = (self.curve_start_parameter, self.curve_end_parameter);
        let matches = |flip: bool| {
            let at = |t: f64| self.basis_curve.point_at(if flip { 1.0 - t } else { t });
            let offset = curve.start_point() - at(0.0);
            let v = offset.dot(&self.direction) / self.direction.norm_squared();
            let along = offset - v * self.direction;
            (along.norm() <= tol.linear
                && uniform_positions(4)
                    .into_iter()
                    .all(|t| tol.points_equal(&curve.point_at(t), &(at(t) + offset))))
            .then_some(v)
        };
        if let Some(v) = matches(false) {
            return Some(Box::new(Line2d::from_points(Point2::new(s, v), Point2::new(e, v))));
        }
        let v = matches(true)?;
        Some(Box::new(Line2d::from_points(Point2::new(e, v), Point2::new(s, v))))
    }

    // -------------------------------------------------------------------------
    // Plane intersection
    // -------------------------------------------------------------------------

    fn dual(&self, plane: &Plane, curve3d: Box<dyn Curve3d>, curve2d: Box<dyn Curve2d>) -> DualSurfaceCurve {
        let on_plane = curve3d.project_to_plane(plane);
        DualSurfaceCurve::new(curve3d, self.clone_box(), curve2d, plane.clone_box(), on_plane)
    }

    /// Direction parallel to the plane: one ruling per basis crossing.
    fn ruling_sections(&self, plane: &Plane, window: &ParamBounds) -> Vec<DualSurfaceCurve> {
        let window = bounded_window(self, window);
        let tol = Tolerance::current().linear;
        self.basis_curve
            .plane_intersection(plane)
            .into_iter()
            .map(|t| self.surface_u(t))
            .filter(|&u| u >= window.umin - tol && u <= window.umax + tol)
            .map(|u| {
                let c3 = self.ruling(u, window.vmin, window.vmax);
                let c2 = Line2d::from_points(Point2::new(u, window.vmin), Point2::new(u, window.vmax));
                self.dual(plane, Box::new(c3), Box::new(c2))
            })
            .collect()
    }

    /// Oblique plane: the basis projected along the direction onto the plane,
    /// split into the runs whose v stays inside the window.
    fn oblique_sections(&self, plane: &Plane, window: &ParamBounds) -> Vec<DualSurfaceCurve> {
        let n = plane.normal();
        let d = self.direction;
        let dn = d.dot(&n);
        let linear = Matrix3::identity() - d * n.transpose() / dn;
        let shift = (plane.origin.coords.dot(&n) / dn) * d;
        let along = Transform::translation_by(&shift).then(&Transform::from_matrix(linear.to_homogeneous()));
        let image = self.basis_curve.transformed(&along);

        let height = |t: f64| -plane.signed_distance(&self.basis_curve.point_at(t)) / dn;
        let tol = Tolerance::current().linear;
        let valid = |t: f64| {
            let v = height(t);
            v >= window.vmin - tol && v <= window.vmax + tol
        };
        let (ta, tb) = {
            let (a, b) = (self.curve_parameter(window.umin), self.curve_parameter(window.umax));
            (a.min(b).max(0.0), a.max(b).min(1.0))
        };
        if tb <= ta {
            return Vec::new();
        }

        let grid = 4 * KernelSettings::current().intersection_grid;
        let ts = merge_steps(
            self.basis_curve
                .safe_sample_positions()
                .into_iter()
                .chain(uniform_positions(grid).into_iter().map(|t| ta + t * (tb - ta))),
            ta,
            tb,
        );
        let boundary = |lo: f64, hi: f64| {
            roots::bisect(lo, hi, 1e-14, 200, |t| if valid(t) { 1.0 } else { -1.0 }).unwrap_or(0.5 * (lo + hi))
        };
        let mut runs = Vec::new();
        let mut start = valid(ts[0]).then_some(ts[0]);
        for w in ts.windows(2) {
            match (valid(w[0]), valid(w[1])) {
                (false, true) => start = Some(boundary(w[0], w[1])),
                (true, false) => {
                    if let Some(s) = start.take() {
                        runs.push((s, boundary(w[0], w[1])));
                    }
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, tb));
        }
        // A closed basis cut across its seam gives one run, not two
        let closed = self.basis_curve.is_closed() && ta == 0.0 && tb == 1.0;
        if closed && runs.len() > 1 && runs[0].0 == ta && runs[runs.len() - 1].1 == tb {
            let (head_end, tail_start) = (runs[0].1, runs[runs.len() - 1].0);
            runs.pop();
            runs[0] = (tail_start, head_end + 1.0);
        }
        let wrap = |t: f64| if t > 1.0 { t - 1.0 } else { t };

        let straight = self.basis_curve.as_any().downcast_ref::<Line3d>().is_some();
        let samples = 4 * (KernelSettings::current().projection_samples - 1);
        runs.into_iter()
            .filter(|(a, b)| (b - a) * self.basis_curve.direction_at(wrap(0.5 * (a + b))).norm() > tol)
            .filter_map(|(a, b)| {
                let c3 = image.trim(a, b).or_else(|| {
                    log::debug!("projected basis cannot be trimmed to [{a}, {b}]; refitting");
                    fit_space_curve(&uniform_positions(samples), |s| image.point_at(wrap(a + s * (b - a))))
                })?;
                let uv = |t: f64| Point2::new(self.surface_u(t), height(wrap(t)));
                let c2: Box<dyn Curve2d> = if straight {
                    Box::new(Line2d::from_points(uv(a), uv(b)))
                } else {
                    let params = merge_steps(
                        c3.safe_sample_positions().into_iter().chain(uniform_positions(samples)),
                        0.0,
                        1.0,
                    );
                    fit_uv_curve(&params, |s| uv(a + s * (b - a)))?
                };
                Some(self.dual(plane, c3, c2))
            })
            .collect()
    }
}

impl Surface for SurfaceOfLinearExtrusion {
    fn point_at(&self, uv: Point2) -> Point3 {
        self.basis_curve.point_at(self.curve_parameter(uv.x)) + uv.y * self.direction
    }

    fn u_direction(&self, uv: Point2) -> Vec3 {
        self.basis_curve.direction_at(self.curve_parameter(uv.x)) / self.span()
    }

    fn v_direction(&self, _uv: Point2) -> Vec3 {
        self.direction
    }

    fn derivatives2(&self, uv: Point2) -> SurfaceDerivatives {
        let (p, d1, d2) = self.basis_curve.point_deriv2_at(self.curve_parameter(uv.x));
        let w = 1.0 / self.span();
        SurfaceDerivatives {
            du: d1 * w,
            dv: self.direction,
            duu: d2 * (w * w),
            ..SurfaceDerivatives::degenerate(p + uv.y * self.direction)
        }
    }

    fn natural_bounds(&self) -> ParamBounds {
        ParamBounds::new(
            self.curve_start_parameter,
            self.curve_end_parameter,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
    }

    fn fixed_u(&self, u: f64, vmin: f64, vmax: f64) -> Box<dyn Curve3d> {
        Box::new(self.ruling(u, vmin, vmax))
    }

    fn fixed_v(&self, v: f64, umin: f64, umax: f64) -> Box<dyn Curve3d> {
        self.make_3d_curve(&Line2d::from_points(Point2::new(umin, v), Point2::new(umax, v)))
    }

    fn modify(&mut self, t: &Transform) {
        self.basis_curve = self.basis_curve.transformed(t);
        self.direction = t.apply_vec(&self.direction);
    }

    fn reverse_orientation(&mut self) -> Transform2d {
        self.direction = -self.direction;
        Transform2d::new(1.0, 0.0, 0.0, -1.0, 0.0, 0.0)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Extrusion
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Closed form: along the direction onto the basis plane when there is
    /// one, otherwise in the cross-section plane normal to the direction.
    fn position_of(&self, p: &Point3) -> Point2 {
        let tol = Tolerance::current();
        let d = self.direction;
        let through_plane = self.basis_curve.plane().and_then(|pl| {
            if pl.normal().dot(&d).abs() <= tol.angular * d.norm() {
                return None;
            }
            let s = pl.intersect_line(p, &d)?;
            Some(self.basis_curve.closest_parameter(&(p + s * d)))
        });
        let t = through_plane.unwrap_or_else(|| {
            let section = Plane::from_normal(self.basis_curve.start_point(), d);
            let flat = self.basis_curve.project_to_plane(&section);
            flat.closest_parameter(&section.project(p))
        });
        Point2::new(self.surface_u(t), self.height_over(p, t))
    }

    fn position_of_near(&self, p: &Point3, seed: Point2) -> Point2 {
        unwrap_periodic(self, self.position_of(p), seed)
    }

    fn is_u_periodic(&self) -> bool {
        self.basis_curve.is_closed()
    }

    fn u_period(&self) -> f64 {
        if self.is_u_periodic() {
            self.span().abs()
        } else {
            0.0
        }
    }

    fn safe_parameter_steps(&self, bounds: &ParamBounds) -> (Vec<f64>, Vec<f64>) {
        let b = bounds.intersect(&self.natural_bounds()).clamped(crate::surface::UNBOUNDED_EXTENT);
        let us = merge_steps(
            self.basis_curve.safe_sample_positions().into_iter().map(|t| self.surface_u(t)),
            b.umin,
            b.umax,
        );
        (us, crate::sampling::linspace(b.vmin, b.vmax, 4))
    }

    fn projected_curve(&self, curve: &dyn Curve3d, precision: f64) -> Option<Box<dyn Curve2d>> {
        Self::PROJECTIONS
            .iter()
            .find_map(|strategy| strategy(self, curve))
            .or_else(|| reuse_curve_on_surface(self, curve))
            .or_else(|| {
                log::debug!("no exact projection for {:?} on extrusion; sampling", curve.curve_type());
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
        let d = self.direction;
        if plane.normal().dot(&d).abs() <= Tolerance::current().angular * d.norm() {
            self.ruling_sections(plane, &window)
        } else {
            self.oblique_sections(plane, &window)
        }
    }

    fn to_record(&self) -> Option<SurfaceRecord> {
        Some(SurfaceRecord::Extrusion(self.clone()))
    }
}
