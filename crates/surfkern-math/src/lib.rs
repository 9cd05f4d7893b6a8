#![warn(missing_docs)]

//! Math types for the surfkern surface kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types
//! for parametric surface geometry: points, vectors, directions, affine
//! transforms in 3D and in parameter space, angle helpers, and the
//! thread-local tolerance policy.

use nalgebra::{Matrix3, Matrix4, Unit, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

pub mod angle;
pub mod roots;
mod settings;

pub use settings::{KernelSettings, SettingsError, SettingsGuard, Tolerance};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 4x4 affine transformation matrix (3x3 linear part plus translation).
///
/// Composition follows matrix order: `m2 * m1` applies `m1` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap an arbitrary affine matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Transform mapping the local frame `(x, y, z, origin)` to world space.
    ///
    /// Local `(1,0,0)` maps to `origin + x`, and so on. The axes are used as
    /// given (no normalization).
    pub fn from_frame(origin: Point3, x: Vec3, y: Vec3, z: Vec3) -> Self {
        let mut m = Matrix4::identity();
        for r in 0..3 {
            m[(r, 0)] = x[r];
            m[(r, 1)] = y[r];
            m[(r, 2)] = z[r];
            m[(r, 3)] = origin[r];
        }
        Self { matrix: m }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Translation by a vector.
    pub fn translation_by(v: &Vec3) -> Self {
        Self::translation(v.x, v.y, v.z)
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Rotation about an arbitrary axis through `center` by `angle` radians.
    ///
    /// Uses Rodrigues' rotation formula.
    pub fn rotation_about_axis(center: &Point3, axis: &Dir3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.as_ref().x, axis.as_ref().y, axis.as_ref().z);
        let mut m = Matrix4::identity();
        m[(0, 0)] = t * x * x + c;
        m[(0, 1)] = t * x * y - s * z;
        m[(0, 2)] = t * x * z + s * y;
        m[(1, 0)] = t * x * y + s * z;
        m[(1, 1)] = t * y * y + c;
        m[(1, 2)] = t * y * z - s * x;
        m[(2, 0)] = t * x * z - s * y;
        m[(2, 1)] = t * y * z + s * x;
        m[(2, 2)] = t * z * z + c;
        let rot = Self { matrix: m };
        let to_origin = Self::translation(-center.x, -center.y, -center.z);
        let back = Self::translation(center.x, center.y, center.z);
        &back * &(&rot * &to_origin)
    }

    /// Compose: `self` then `other` (self * other), i.e. `other` is applied first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation, applies rotation/scale).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.linear_part() * v
    }

    /// Transform a normal vector (uses inverse transpose of upper-left 3x3).
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        if let Some(inv) = self.linear_part().try_inverse() {
            inv.transpose() * n
        } else {
            // Degenerate transform, return input unchanged
            *n
        }
    }

    /// The upper-left 3x3 linear part.
    pub fn linear_part(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation column.
    pub fn translation_part(&self) -> Vec3 {
        Vec3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Determinant of the linear part. Negative for mirroring transforms.
    pub fn determinant(&self) -> f64 {
        self.linear_part().determinant()
    }

    /// Whether the transform is the identity within `tol`.
    pub fn is_identity(&self, tol: f64) -> bool {
        (self.matrix - Matrix4::identity()).abs().max() < tol
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        self.then(rhs)
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.then(&rhs)
    }
}

/// A 3x3 affine transformation of the 2D parameter plane.
///
/// Returned by surface reorientation so that existing parameter-space curves
/// can be remapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform2d {
    /// The underlying 3x3 matrix.
    pub matrix: Matrix3<f64>,
}

impl Transform2d {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Affine map `(x, y) -> (a*x + b*y + tx, c*x + d*y + ty)`.
    pub fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self {
            matrix: Matrix3::new(a, b, tx, c, d, ty, 0.0, 0.0, 1.0),
        }
    }

    /// Translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, dx, dy)
    }

    /// Rotation about the origin by `angle` radians.
    pub fn rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(c, -s, s, c, 0.0, 0.0)
    }

    /// Uniform or non-uniform scale about the origin.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Compose: `self` then `other` (self * other), i.e. `other` is applied first.
    pub fn then(&self, other: &Transform2d) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point2) -> Point2 {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v.x, v.y)
    }

    /// Transform a vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec2) -> Vec2 {
        let r = self.matrix * Vector3::new(v.x, v.y, 0.0);
        Vec2::new(r.x, r.y)
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        self.matrix.fixed_view::<2, 2>(0, 0).determinant()
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform2d {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul<&Transform2d> for &Transform2d {
    type Output = Transform2d;

    fn mul(self, rhs: &Transform2d) -> Transform2d {
        self.then(rhs)
    }
}

/// Pick a unit vector perpendicular to `v` (which must be non-zero).
pub fn any_perpendicular(v: &Vec3) -> Vec3 {
    let n = v.normalize();
    let arbitrary = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    arbitrary.cross(&n).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
        assert!(t.is_identity(1e-15));
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert_relative_eq!(result, Point3::new(11.0, 22.0, 33.0), epsilon = 1e-12);
        // Vectors are not translated
        assert_relative_eq!(t.apply_vec(&Vec3::x()), Vec3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_mul_applies_right_operand_first() {
        let translate = Transform::translation(1.0, 0.0, 0.0);
        let scale = Transform::scale(2.0, 2.0, 2.0);
        // scale * translate: (0,0,0) -> (1,0,0) -> (2,0,0)
        let composed = &scale * &translate;
        let result = composed.apply_point(&Point3::origin());
        assert_relative_eq!(result.x, 2.0, epsilon = 1e-12);
        // translate * scale: (0,0,0) -> (0,0,0) -> (1,0,0)
        let other = translate * scale;
        assert_relative_eq!(other.apply_point(&Point3::origin()).x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_from_frame() {
        let t = Transform::from_frame(
            Point3::new(1.0, 1.0, 1.0),
            Vec3::y(),
            Vec3::z(),
            Vec3::x(),
        );
        let p = t.apply_point(&Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 3.0, 1.0), epsilon = 1e-12);
        let inv = t.inverse().unwrap();
        assert_relative_eq!(
            inv.apply_point(&p),
            Point3::new(2.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rotation_about_axis_off_origin() {
        let axis = Dir3::new_normalize(Vec3::z());
        let t = Transform::rotation_about_axis(&Point3::new(1.0, 0.0, 0.0), &axis, PI / 2.0);
        let p = t.apply_point(&Point3::new(2.0, 0.0, 5.0));
        assert_relative_eq!(p, Point3::new(1.0, 1.0, 5.0), epsilon = 1e-12);
        assert_relative_eq!(t.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mirror_determinant() {
        let t = Transform::scale(-1.0, 1.0, 1.0);
        assert!(t.determinant() < 0.0);
    }

    #[test]
    fn test_transform2d_compose_and_inverse() {
        // Flip v about 3: (u, v) -> (u, 3 - v)
        let flip = Transform2d::new(1.0, 0.0, 0.0, -1.0, 0.0, 3.0);
        let p = flip.apply_point(&Point2::new(0.5, 1.0));
        assert_relative_eq!(p, Point2::new(0.5, 2.0), epsilon = 1e-12);
        let twice = &flip * &flip;
        assert_relative_eq!(
            twice.apply_point(&Point2::new(0.5, 1.0)),
            Point2::new(0.5, 1.0),
            epsilon = 1e-12
        );
        assert!(flip.determinant() < 0.0);
        let inv = flip.inverse().unwrap();
        assert_relative_eq!(inv.apply_point(&p), Point2::new(0.5, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_any_perpendicular() {
        for v in [Vec3::x(), Vec3::z(), Vec3::new(1.0, 2.0, -3.0)] {
            let p = any_perpendicular(&v);
            assert!(p.dot(&v).abs() < 1e-12);
            assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_transform_serde_roundtrip() {
        let t = Transform::rotation_z(0.3).then(&Transform::translation(0.1, 0.2, 0.3));
        let json = serde_json::to_string(&t).unwrap();
        let back: Transform = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
