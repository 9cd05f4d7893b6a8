//! Intersection curves carried with their parameter curves on both surfaces.

use surfkern_geom::numeric::uniform_positions;
use surfkern_geom::{Curve2d, Curve3d};

use crate::Surface;

/// A 3D curve together with its parameter curves on two surfaces.
///
/// Invariant: `surface_a.point_at(curve2d_a.point_at(t))` equals
/// `curve3d.point_at(t)` within tolerance for every `t`, and likewise for `b`.
#[derive(Debug, Clone)]
pub struct DualSurfaceCurve {
    curve3d: Box<dyn Curve3d>,
    surface_a: Box<dyn Surface>,
    curve2d_a: Box<dyn Curve2d>,
    surface_b: Box<dyn Surface>,
    curve2d_b: Box<dyn Curve2d>,
}

impl DualSurfaceCurve {
    /// Bundle a 3D curve with its parameter curves on two surfaces.
    pub fn new(
        curve3d: Box<dyn Curve3d>,
        surface_a: Box<dyn Surface>,
        curve2d_a: Box<dyn Curve2d>,
        surface_b: Box<dyn Surface>,
        curve2d_b: Box<dyn Curve2d>,
    ) -> Self {
        Self {
            curve3d,
            surface_a,
            curve2d_a,
            surface_b,
            curve2d_b,
        }
    }

    /// The 3D curve.
    pub fn curve3d(&self) -> &dyn Curve3d {
        self.curve3d.as_ref()
    }

    /// The first surface.
    pub fn surface_a(&self) -> &dyn Surface {
        self.surface_a.as_ref()
    }

    /// The parameter curve on the first surface.
    pub fn curve2d_a(&self) -> &dyn Curve2d {
        self.curve2d_a.as_ref()
    }

    /// The second surface.
    pub fn surface_b(&self) -> &dyn Surface {
        self.surface_b.as_ref()
    }

    /// The parameter curve on the second surface.
    pub fn curve2d_b(&self) -> &dyn Curve2d {
        self.curve2d_b.as_ref()
    }

    /// The same curve traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            curve3d: self.curve3d.reversed(),
            surface_a: self.surface_a.clone(),
            curve2d_a: self.curve2d_a.reversed(),
            surface_b: self.surface_b.clone(),
            curve2d_b: self.curve2d_b.reversed(),
        }
    }

    /// Largest distance between the lifted parameter curves and the 3D curve,
    /// compared at equal parameters over `samples + 1` evenly spaced values.
    pub fn max_deviation(&self, samples: usize) -> f64 {
        let side = |surface: &dyn Surface, c2d: &dyn Curve2d| {
            uniform_positions(samples)
                .into_iter()
                .map(|t| (surface.point_at(c2d.point_at(t)) - self.curve3d.point_at(t)).norm())
                .fold(0.0_f64, f64::max)
        };
        side(self.surface_a.as_ref(), self.curve2d_a.as_ref())
            .max(side(self.surface_b.as_ref(), self.curve2d_b.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use surfkern_geom::{Line2d, Line3d, Plane};
    use surfkern_math::{Point2, Point3, Vec3};
    use surfkern_nurbs::BSplineCurve2d;

    fn diagonal(offset: f64) -> DualSurfaceCurve {
        let a = Plane::xy();
        let b = Plane::from_normal(Point3::origin(), Vec3::new(1.0, -1.0, 0.0));
        let line = Line3d::from_points(Point3::origin(), Point3::new(2.0, 2.0, 0.0));
        let on_b = line.project_to_plane(&b);
        DualSurfaceCurve::new(
            Box::new(line),
            Box::new(a),
            Box::new(Line2d::from_points(Point2::new(offset, 0.0), Point2::new(2.0 + offset, 2.0))),
            Box::new(b),
            on_b,
        )
    }

    #[test]
    fn test_reversed_keeps_the_invariant() {
        let dual = diagonal(0.0);
        assert!(dual.max_deviation(8) < 1e-12);
        let back = dual.reversed();
        assert!(back.max_deviation(8) < 1e-12);
        assert_relative_eq!(back.curve3d().start_point(), Point3::new(2.0, 2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(back.curve2d_a().end_point(), Point2::origin(), epsilon = 1e-12);
    }

    #[test]
    fn test_max_deviation_sees_mismatch() {
        assert!(diagonal(0.5).max_deviation(8) > 0.3);
    }

    #[test]
    fn test_max_deviation_compares_equal_parameters() {
        // Same segment as the 3D line, traversed at a different speed
        let slow = BSplineCurve2d::new(
            vec![Point2::origin(), Point2::new(0.2, 0.2), Point2::new(2.0, 2.0)],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            2,
        )
        .unwrap();
        let mut dual = diagonal(0.0);
        dual.curve2d_a = Box::new(slow);
        assert_relative_eq!(dual.curve2d_a().point_at(0.5), Point2::new(0.6, 0.6), epsilon = 1e-12);
        assert!(dual.max_deviation(8) > 0.5);
    }
}
