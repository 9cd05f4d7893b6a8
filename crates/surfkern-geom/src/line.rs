//! Straight line segments in 2D and 3D.

use std::any::Any;

use surfkern_math::{Point2, Point3, Transform, Transform2d, Vec2, Vec3};

use crate::{Curve2d, Curve2dRecord, Curve3d, Curve3dRecord, CurveKind, Plane};

// =============================================================================
// Line3d
// =============================================================================

/// A 3D line segment defined by origin and direction.
///
/// Parameterization: `P(t) = origin + t * direction`
#[derive(Debug, Clone, PartialEq)]
pub struct Line3d {
    /// Starting point.
    pub origin: Point3,
    /// Direction (not necessarily unit length, magnitude determines speed).
    pub direction: Vec3,
}

impl Line3d {
    /// Create a line from two endpoints, parameterized so `t=0` gives `start` and `t=1` gives `end`.
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }

    /// Segment length.
    pub fn length(&self) -> f64 {
        self.direction.norm()
    }

    /// Line parameter of the orthogonal projection of `p` (not clamped).
    pub fn parameter_of(&self, p: &Point3) -> f64 {
        let len2 = self.direction.norm_squared();
        if len2 == 0.0 {
            return 0.0;
        }
        (p - self.origin).dot(&self.direction) / len2
    }
}

impl Curve3d for Line3d {
    fn point_at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    fn direction_at(&self, _t: f64) -> Vec3 {
        self.direction
    }

    fn point_deriv2_at(&self, t: f64) -> (Point3, Vec3, Vec3) {
        (self.point_at(t), self.direction, Vec3::zeros())
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve3d> {
        Box::new(Line3d::from_points(self.end_point(), self.origin))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve3d>> {
        Some(Box::new(Line3d::from_points(self.point_at(t0), self.point_at(t1))))
    }

    fn transformed(&self, t: &Transform) -> Box<dyn Curve3d> {
        Box::new(Line3d::from_points(
            t.apply_point(&self.origin),
            t.apply_point(&self.end_point()),
        ))
    }

    fn project_to_plane(&self, plane: &Plane) -> Box<dyn Curve2d> {
        Box::new(Line2d::from_points(
            plane.project(&self.origin),
            plane.project(&self.end_point()),
        ))
    }

    fn plane_intersection(&self, plane: &Plane) -> Vec<f64> {
        plane
            .intersect_line(&self.origin, &self.direction)
            .filter(|s| (-1e-12..=1.0 + 1e-12).contains(s))
            .map(|s| vec![s.clamp(0.0, 1.0)])
            .unwrap_or_default()
    }

    fn closest_parameter(&self, p: &Point3) -> f64 {
        self.parameter_of(p).clamp(0.0, 1.0)
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        vec![0.0, 1.0]
    }

    fn to_record(&self) -> Option<Curve3dRecord> {
        Some(Curve3dRecord::Line {
            start: self.origin,
            end: self.end_point(),
        })
    }
}

// =============================================================================
// Line2d
// =============================================================================

/// A 2D line segment in parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct Line2d {
    /// Starting point.
    pub origin: Point2,
    /// Direction.
    pub direction: Vec2,
}

impl Line2d {
    /// Create from two endpoints.
    pub fn from_points(start: Point2, end: Point2) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }

    /// Line parameter of the orthogonal projection of `p` (not clamped).
    pub fn parameter_of(&self, p: &Point2) -> f64 {
        let len2 = self.direction.norm_squared();
        if len2 == 0.0 {
            return 0.0;
        }
        (p - self.origin).dot(&self.direction) / len2
    }

    /// Signed distance of `p` from the infinite carrier line (positive on the left).
    pub fn signed_distance(&self, p: &Point2) -> f64 {
        let len = self.direction.norm();
        if len == 0.0 {
            return (p - self.origin).norm();
        }
        self.direction.perp(&(p - self.origin)) / len
    }

    /// Whether the segment is parallel to the u axis (constant v) within `tol`.
    pub fn is_constant_v(&self, tol: f64) -> bool {
        self.direction.y.abs() <= tol
    }

    /// Whether the segment is parallel to the v axis (constant u) within `tol`.
    pub fn is_constant_u(&self, tol: f64) -> bool {
        self.direction.x.abs() <= tol
    }
}

impl Curve2d for Line2d {
    fn point_at(&self, t: f64) -> Point2 {
        self.origin + t * self.direction
    }

    fn direction_at(&self, _t: f64) -> Vec2 {
        self.direction
    }

    fn try_point_deriv2_at(&self, t: f64) -> Option<(Point2, Vec2, Vec2)> {
        Some((self.point_at(t), self.direction, Vec2::zeros()))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reversed(&self) -> Box<dyn Curve2d> {
        Box::new(Line2d::from_points(self.end_point(), self.origin))
    }

    fn trim(&self, t0: f64, t1: f64) -> Option<Box<dyn Curve2d>> {
        Some(Box::new(Line2d::from_points(self.point_at(t0), self.point_at(t1))))
    }

    fn transformed(&self, t: &Transform2d) -> Box<dyn Curve2d> {
        Box::new(Line2d::from_points(
            t.apply_point(&self.origin),
            t.apply_point(&self.end_point()),
        ))
    }

    fn lift(&self, origin: &Point3, x_axis: &Vec3, y_axis: &Vec3) -> Box<dyn Curve3d> {
        let lift = |p: Point2| origin + p.x * x_axis + p.y * y_axis;
        Box::new(Line3d::from_points(lift(self.origin), lift(self.end_point())))
    }

    fn perpendicular_foot(&self, p: &Point2) -> Vec<f64> {
        let t = self.parameter_of(p);
        if (0.0..=1.0).contains(&t) {
            vec![t]
        } else {
            Vec::new()
        }
    }

    fn closest_parameter(&self, p: &Point2) -> f64 {
        self.parameter_of(p).clamp(0.0, 1.0)
    }

    fn safe_sample_positions(&self) -> Vec<f64> {
        vec![0.0, 1.0]
    }

    fn to_record(&self) -> Option<Curve2dRecord> {
        Some(Curve2dRecord::Line {
            start: self.origin,
            end: self.end_point(),
        })
    }
}
