//! Implicit quadric form of analytic surfaces.

use nalgebra::Matrix3;
use surfkern_math::{Point3, Vec3};

/// The quadric `pᵀ·A·p + b·p + c = 0`.
///
/// Scaled so that the value approximates the signed distance close to the
/// surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadric {
    /// Symmetric quadratic part `A`.
    pub matrix: Matrix3<f64>,
    /// Linear part `b`.
    pub linear: Vec3,
    /// Constant `c`.
    pub constant: f64,
}

impl Quadric {
    /// Infinite circular cylinder through `location` spanned by the
    /// orthogonal, equal-length radial axes `x_axis` and `y_axis`.
    ///
    /// The value is `(ρ² − r²) / 2r` for radial distance `ρ`, which is the
    /// signed distance to first order.
    pub fn cylinder(location: &Point3, x_axis: &Vec3, y_axis: &Vec3) -> Self {
        let r2 = x_axis.norm_squared();
        let r = r2.sqrt();
        // ρ² = ((d·X)² + (d·Y)²) / r²  with d = p − location
        let a = (x_axis * x_axis.transpose() + y_axis * y_axis.transpose()) / (r2 * 2.0 * r);
        let l = location.coords;
        Self {
            matrix: a,
            linear: -2.0 * (a * l),
            constant: l.dot(&(a * l)) - r / 2.0,
        }
    }

    /// Value at `p`.
    pub fn value(&self, p: &Point3) -> f64 {
        let v = p.coords;
        v.dot(&(self.matrix * v)) + self.linear.dot(&v) + self.constant
    }

    /// Gradient at `p`.
    pub fn gradient(&self, p: &Point3) -> Vec3 {
        2.0 * (self.matrix * p.coords) + self.linear
    }

    /// Coefficients `[a, b, c]` of `a·s² + b·s + c` along `origin + s·dir`.
    pub fn on_line(&self, origin: &Point3, dir: &Vec3) -> [f64; 3] {
        let o = origin.coords;
        [
            dir.dot(&(self.matrix * dir)),
            2.0 * o.dot(&(self.matrix * dir)) + self.linear.dot(dir),
            self.value(origin),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use surfkern_math::roots::solve_quadratic;

    fn tube() -> Quadric {
        Quadric::cylinder(&Point3::new(1.0, 0.0, 0.0), &Vec3::new(2.0, 0.0, 0.0), &Vec3::new(0.0, 2.0, 0.0))
    }

    #[test]
    fn test_value_is_signed_distance_near_surface() {
        let q = tube();
        assert_relative_eq!(q.value(&Point3::new(3.0, 0.0, 7.0)), 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.value(&Point3::new(3.001, 0.0, -2.0)), 0.001, epsilon = 1e-6);
        assert!(q.value(&Point3::new(1.0, 0.0, 0.0)) < 0.0);
        let g = q.gradient(&Point3::new(1.0, 2.0, 5.0));
        assert_relative_eq!(g, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_line_substitution() {
        let q = tube();
        let [a, b, c] = q.on_line(&Point3::new(-5.0, 0.0, 3.0), &Vec3::x());
        let roots = solve_quadratic(a, b, c);
        assert_eq!(roots.len(), 2);
        assert_relative_eq!(roots[0], 4.0, epsilon = 1e-12);
        assert_relative_eq!(roots[1], 8.0, epsilon = 1e-12);
    }
}
