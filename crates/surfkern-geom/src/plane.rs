//! Infinite planes with an orthonormal 2D coordinate frame.

use serde::{Deserialize, Serialize};
use surfkern_math::{any_perpendicular, Dir3, Point2, Point3, Tolerance, Transform, Vec3};

/// An infinite plane defined by an origin point and an orthonormal frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and two spanning vectors.
    ///
    /// The vectors need not be normalized or orthogonal: `x_dir` fixes the u
    /// direction and `y_dir` is orthogonalized against it.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let n = Dir3::new_normalize(x_dir.cross(&y_dir));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// Create a plane from origin and normal. X/Y directions are chosen arbitrarily.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let x = Dir3::new_normalize(any_perpendicular(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// XY plane at the origin.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// XZ plane at the origin.
    pub fn xz() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::z())
    }

    /// YZ plane at the origin.
    pub fn yz() -> Self {
        Self::new(Point3::origin(), Vec3::y(), Vec3::z())
    }

    /// Unit normal as a plain vector.
    pub fn normal(&self) -> Vec3 {
        *self.normal_dir.as_ref()
    }

    /// Evaluate the plane at parameter `(u, v)`.
    pub fn point_at(&self, uv: Point2) -> Point3 {
        self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref()
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// Project a 3D vector onto this plane's (u, v) parameter space.
    pub fn project_vec(&self, v: &Vec3) -> surfkern_math::Vec2 {
        surfkern_math::Vec2::new(v.dot(self.x_dir.as_ref()), v.dot(self.y_dir.as_ref()))
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }

    /// Whether `v` is parallel to the plane within the current angular tolerance.
    pub fn is_parallel_to(&self, v: &Vec3) -> bool {
        let len = v.norm();
        len == 0.0 || (v.dot(self.normal_dir.as_ref()) / len).abs() < Tolerance::current().angular
    }

    /// Intersection of the line `origin + s·dir` with the plane, as the line parameter `s`.
    ///
    /// Returns `None` when the line is parallel to the plane.
    pub fn intersect_line(&self, origin: &Point3, dir: &Vec3) -> Option<f64> {
        let denom = dir.dot(self.normal_dir.as_ref());
        if denom.abs() < 1e-15 * dir.norm().max(1.0) {
            return None;
        }
        Some(-self.signed_distance(origin) / denom)
    }

    /// Transform the plane. The frame is re-orthonormalized.
    pub fn transformed(&self, t: &Transform) -> Self {
        let origin = t.apply_point(&self.origin);
        let x = t.apply_vec(self.x_dir.as_ref());
        let y = t.apply_vec(self.y_dir.as_ref());
        Self::new(origin, x, y)
    }
}
