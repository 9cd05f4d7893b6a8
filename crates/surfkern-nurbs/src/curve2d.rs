//! Non-rational B-spline curve in a 2D parameter plane.
//!
//! This is the general-purpose result type of numeric curve projection: the
//! sampled parameter points are interpolated at the source curve's own
//! parameters, so the spline and the source share their parameterization at
//! every sample.

use std::any::Any;

use surfkern_geom::{Curve2d, Curve2dRecord, Curve3d, CurveKind, Result};
use surfkern_math::{Point2, Point3, Transform2d, Vec2, Vec3};

use crate::curve::{span_positions, PARAM_EPS};
use crate::knots::{self, Coords};
use crate::BSplineCurve;

/// A non-rational B-spline curve in 2D.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve2d {
    control_points: Vec<Point2>,
    knots: Vec<f64>,
    degree: usize,
}

impl BSplineCurve2d {
    /// Create a 2D B-spline curve from a clamped knot vector.
    pub fn new(control_points: Vec<Point2>, knots: Vec<f64>, degree: usize) -> Result<Self> {
        let knots = knots::normalized_knots(&knots, control_points.len(), degree)?;
        Ok(Self::from_parts(control_points, knots, degree))
    }

    pub(crate) fn from_parts(control_points: Vec<Point2>, knots: Vec<f64>, degree: usize) -> Self {
        Self {
            control_points,
            knots,
            degree,
        }
    }

    fn from_coords(cps: &[Coords<2>], knots: Vec<f64>, degree: usize) -> Self {
        Self::from_parts(cps.iter().map(|c| Point2::from(*c)).collect(), knots, degree)
    }

    fn coords(&self) -> Vec<Coords<2>> {
        self.control_points.iter().map(|p| p.coords).collect()
    }

    /// Interpolate `points` at the given increasing parameters.
    pub fn interpolate(points: &[Point2], params: &[f64], degree: usize) -> Result<Self> {
        let coords: Vec<Coords<2>> = points.iter().map(|p| p.coords).collect();
        let (cps, knots, degree) = knots::interpolate(&coords, params, degree)?;
        Ok(Self::from_coords(&cps, knots, degree))
    }

    /// Interpolate `points` with chord-length parameters.
    pub fn interpolate_chord(points: &[Point2], degree: usize) -> Result<Self> {
        let coords: Vec<Coords<2>> = points.iter().map(|p| p.coords).collect();
        let params = knots::chord_parameters(&coords);
        Self::interpolate(points, &params, degree)
    }

    /// Control points.
    pub fn control_points(&self) -> &[Point2] {
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

    /// Insert a knot value using Boehm's algorithm.
    pub fn insert_knot(&self, t: f64) -> Self {
        let (cps, knots) = knots::insert_knot(&self.coords(), &self.knots, self.degree, t);
        Self::from_coords(&cps, knots, self.degree)
    }
}

impl Curve2d for BSplineCurve2d {
    fn point_at(&self, t: f64) -> Point2 {
        let [p, _, _] = knots::evaluate(&self.coords(), &self.knots, self.degree, t);
        Point2::from(p)
    }

    fn direction_at(&self, t: f64) -> Vec2 {
        let [_, d1, _] = knots::evaluate(&self.coords(), &self.knots, self.degree, t);
        d1
    }

    fn try_point_deriv2_at(&self, t: f64) -> Option<(Point2, Vec2, Vec2)> {
        let [p, d1, d2] = knots::evaluate(&self.coords(), &self.knots, self.degree, t);
        Some((Point2::from(p), d1, d2))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::BSpline
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve2d> {
        let (cps, knots) = knots::reverse(&self.coords(), &self.knots);
        Box::new(Self::from_coords(&cps, knots, self.degree))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve2d>> {
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

    fn transformed(&self, t: &Transform2d) -> Box<dyn Curve2d> {
        Box::new(Self::from_parts(
            self.control_points.iter().map(|p| t.apply_point(p)).collect(),
            self.knots.clone(),
            self.degree,
        ))
    }

    fn lift(&self, origin: &Point3, x_axis: &Vec3, y_axis: &Vec3) -> Box<dyn Curve3d> {
        let cps: Vec<Coords<3>> = self
            .control_points
            .iter()
            .map(|p| (origin + p.x * x_axis + p.y * y_axis).coords)
            .collect();
        Box::new(BSplineCurve::from_coords(&cps, self.knots.clone(), self.degree))
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        span_positions(&self.knots, self.degree)
    }

    fn to_record(&self) -> Option<Curve2dRecord> {
        Some(Curve2dRecord::BSpline {
            control_points: self.control_points.clone(),
            knots: self.knots.clone(),
            degree: self.degree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use surfkern_geom::{intersect, Line2d};

    fn wave() -> BSplineCurve2d {
        let pts: Vec<Point2> = (0..9)
            .map(|i| {
                let x = i as f64 * 0.5;
                Point2::new(x, x.sin())
            })
            .collect();
        BSplineCurve2d::interpolate_chord(&pts, 3).unwrap()
    }

    #[test]
    fn test_interpolate_at_given_parameters() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 0.0), Point2::new(3.0, 1.0)];
        let params = [0.0, 0.2, 0.7, 1.0];
        let c = BSplineCurve2d::interpolate(&pts, &params, 3).unwrap();
        for (p, t) in pts.iter().zip(params) {
            assert_relative_eq!(c.point_at(t), *p, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_lift_and_transform() {
        let c = wave();
        let lifted = c.lift(&Point3::new(0.0, 0.0, 1.0), &Vec3::x(), &Vec3::z());
        let p = c.point_at(0.4);
        assert_relative_eq!(lifted.point_at(0.4), Point3::new(p.x, 0.0, 1.0 + p.y), epsilon = 1e-12);
        let moved = c.transformed(&Transform2d::translation(1.0, -1.0));
        assert_relative_eq!(moved.point_at(0.4), p + Vec2::new(1.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_generic_intersection_with_line() {
        let c = wave();
        let line = Line2d::from_points(Point2::new(0.0, 0.5), Point2::new(4.0, 0.5));
        let hits = intersect(&line, &c);
        // sin(x) = 0.5 at x = π/6 and 5π/6 on [0, 4]
        assert_eq!(hits.len(), 2);
        for h in &hits {
            assert_relative_eq!(c.point_at(h.t_b).y, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reverse_keeps_points() {
        let c = wave();
        let r = c.reversed();
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_relative_eq!(r.point_at(t), c.point_at(1.0 - t), epsilon = 1e-12);
        }
    }
}
