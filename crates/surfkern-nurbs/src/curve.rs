//! Non-rational B-spline curve in 3D.

use std::any::Any;

use surfkern_geom::{Curve2d, Curve3d, Curve3dRecord, CurveKind, Plane, Result};
use surfkern_math::{Point3, Tolerance, Transform, Vec3};

use crate::knots::{self, Coords};
use crate::BSplineCurve2d;

/// Slack accepted on trim parameters outside `[0, 1]`.
pub(crate) const PARAM_EPS: f64 = 1e-12;

/// A non-rational B-spline curve in 3D.
///
/// Defined by control points, a clamped knot vector, and a polynomial degree.
/// The knot vector is rescaled to `[0, 1]` on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve {
    control_points: Vec<Point3>,
    knots: Vec<f64>,
    degree: usize,
}

impl BSplineCurve {
    /// Create a B-spline curve.
    ///
    /// Fails when the knot vector length doesn't match `n + degree + 1`, is
    /// decreasing, or is not clamped.
    pub fn new(control_points: Vec<Point3>, knots: Vec<f64>, degree: usize) -> Result<Self> {
        let knots = knots::normalized_knots(&knots, control_points.len(), degree)?;
        Ok(Self {
            control_points,
            knots,
            degree,
        })
    }

    /// Create a clamped uniform B-spline with the given degree.
    pub fn clamped_uniform(control_points: Vec<Point3>, degree: usize) -> Result<Self> {
        let knots = knots::clamped_uniform_knots(control_points.len(), degree);
        Self::new(control_points, knots, degree)
    }

    /// Interpolate `points` at the given increasing parameters.
    pub fn interpolate(points: &[Point3], params: &[f64], degree: usize) -> Result<Self> {
        let coords: Vec<Coords<3>> = points.iter().map(|p| p.coords).collect();
        let (cps, knots, degree) = knots::interpolate(&coords, params, degree)?;
        Ok(Self::from_coords(&cps, knots, degree))
    }

    /// Interpolate `points` with chord-length parameters.
    pub fn interpolate_chord(points: &[Point3], degree: usize) -> Result<Self> {
        let coords: Vec<Coords<3>> = points.iter().map(|p| p.coords).collect();
        let params = knots::chord_parameters(&coords);
        Self::interpolate(points, &params, degree)
    }

    pub(crate) fn from_coords(cps: &[Coords<3>], knots: Vec<f64>, degree: usize) -> Self {
        Self {
            control_points: cps.iter().map(|c| Point3::from(*c)).collect(),
            knots,
            degree,
        }
    }

    fn coords(&self) -> Vec<Coords<3>> {
        self.control_points.iter().map(|p| p.coords).collect()
    }

    /// Control points.
    pub fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    /// Knot vector on `[0, 1]`.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of control points.
    pub fn num_control_points(&self) -> usize {
        self.control_points.len()
    }

    /// Insert a knot value using Boehm's algorithm.
    ///
    /// Returns a new curve with one additional control point.
    pub fn insert_knot(&self, t: f64) -> Self {
        let (cps, knots) = knots::insert_knot(&self.coords(), &self.knots, self.degree, t);
        Self::from_coords(&cps, knots, self.degree)
    }

    fn map_points(&self, f: impl Fn(&Point3) -> Point3) -> Self {
        Self {
            control_points: self.control_points.iter().map(f).collect(),
            knots: self.knots.clone(),
            degree: self.degree,
        }
    }
}

/// Distinct knots with every span split into `degree + 1` pieces.
pub(crate) fn span_positions(knots: &[f64], degree: usize) -> Vec<f64> {
    let mut distinct: Vec<f64> = knots.to_vec();
    distinct.dedup();
    surfkern_geom::numeric::refine_positions(&distinct, degree + 1)
}

impl Curve3d for BSplineCurve {
    fn point_at(&self, t: f64) -> Point3 {
        let [p, _, _] = knots::evaluate(&self.coords(), &self.knots, self.degree, t);
        Point3::from(p)
    }

    fn direction_at(&self, t: f64) -> Vec3 {
        let [_, d1, _] = knots::evaluate(&self.coords(), &self.knots, self.degree, t);
        d1
    }

    fn point_deriv2_at(&self, t: f64) -> (Point3, Vec3, Vec3) {
        let [p, d1, d2] = knots::evaluate(&self.coords(), &self.knots, self.degree, t);
        (Point3::from(p), d1, d2)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::BSpline
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve3d> {
        let (cps, knots) = knots::reverse(&self.coords(), &self.knots);
        Box::new(Self::from_coords(&cps, knots, self.degree))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve3d>> {
        let range = -PARAM_EPS..=1.0 + PARAM_EPS;
        if !range.contains(&t0) || !range.contains(&t1) {
            log::debug!("b-spline trim [{t0}, {t1}] leaves the knot range");
            return None;
        }
        let (a, b) = (t0.min(t1).clamp(0.0, 1.0), t0.max(t1).clamp(0.0, 1.0));
        let (cps, knots) = knots::extract(&self.coords(), &self.knots, self.degree, a, b);
        let piece = Self::from_coords(&cps, knots, self.degree);
        if t0 > t1 {
            Some(piece.reversed())
        } else {
            Some(Box::new(piece))
        }
    }

    fn transformed(&self, t: &Transform) -> Box<dyn Curve3d> {
        Box::new(self.map_points(|p| t.apply_point(p)))
    }

    fn project_to_plane(&self, plane: &Plane) -> Box<dyn Curve2d> {
        Box::new(BSplineCurve2d::from_parts(
            self.control_points.iter().map(|p| plane.project(p)).collect(),
            self.knots.clone(),
            self.degree,
        ))
    }

    fn plane(&self) -> Option<Plane> {
        let tol = Tolerance::current().linear;
        let origin = self.control_points[0];
        let x = self
            .control_points
            .iter()
            .map(|p| p - origin)
            .find(|d| d.norm() > tol)?;
        let y = self
            .control_points
            .iter()
            .map(|p| p - origin)
            .max_by(|a, b| x.cross(a).norm().total_cmp(&x.cross(b).norm()))?;
        if x.cross(&y).norm() <= tol * x.norm() {
            return None;
        }
        let plane = Plane::new(origin, x, y);
        self.control_points
            .iter()
            .all(|p| plane.signed_distance(p).abs() < tol)
            .then_some(plane)
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        span_positions(&self.knots, self.degree)
    }

    fn to_record(&self) -> Option<Curve3dRecord> {
        Some(Curve3dRecord::BSpline {
            control_points: self.control_points.clone(),
            knots: self.knots.clone(),
            degree: self.degree,
        })
    }
}
