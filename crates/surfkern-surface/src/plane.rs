//! The plane as a surface: the partner of every plane intersection.

use std::any::Any;

use surfkern_geom::{Curve2d, Curve3d, Line2d, Line3d, Plane};
use surfkern_math::{Dir3, Point2, Point3, Tolerance, Transform, Transform2d, Vec3};

use crate::plane_intersection::{bounded_window, clip_line};
use crate::{DualSurfaceCurve, ParamBounds, Surface, SurfaceDerivatives, SurfaceKind, SurfaceRecord};

impl Surface for Plane {
    fn point_at(&self, uv: Point2) -> Point3 {
        Plane::point_at(self, uv)
    }

    fn u_direction(&self, _uv: Point2) -> Vec3 {
        *self.x_dir.as_ref()
    }

    fn v_direction(&self, _uv: Point2) -> Vec3 {
        *self.y_dir.as_ref()
    }

    fn derivatives2(&self, uv: Point2) -> SurfaceDerivatives {
        SurfaceDerivatives {
            du: *self.x_dir.as_ref(),
            dv: *self.y_dir.as_ref(),
            ..SurfaceDerivatives::degenerate(Plane::point_at(self, uv))
        }
    }

    fn natural_bounds(&self) -> ParamBounds {
        ParamBounds::unbounded()
    }

    fn fixed_u(&self, u: f64, vmin: f64, vmax: f64) -> Box<dyn Curve3d> {
        Box::new(Line3d::from_points(
            Plane::point_at(self, Point2::new(u, vmin)),
            Plane::point_at(self, Point2::new(u, vmax)),
        ))
    }

    fn fixed_v(&self, v: f64, umin: f64, umax: f64) -> Box<dyn Curve3d> {
        Box::new(Line3d::from_points(
            Plane::point_at(self, Point2::new(umin, v)),
            Plane::point_at(self, Point2::new(umax, v)),
        ))
    }

    fn modify(&mut self, t: &Transform) {
        *self = self.transformed(t);
    }

    fn reverse_orientation(&mut self) -> Transform2d {
        self.y_dir = Dir3::new_unchecked(-self.y_dir.into_inner());
        self.normal_dir = Dir3::new_unchecked(-self.normal_dir.into_inner());
        Transform2d::new(1.0, 0.0, 0.0, -1.0, 0.0, 0.0)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn normal(&self, _uv: Point2) -> Vec3 {
        Plane::normal(self)
    }

    fn position_of(&self, p: &Point3) -> Point2 {
        self.project(p)
    }

    fn position_of_near(&self, p: &Point3, _seed: Point2) -> Point2 {
        self.project(p)
    }

    fn projected_curve(&self, curve: &dyn Curve3d, _precision: f64) -> Option<Box<dyn Curve2d>> {
        Some(curve.project_to_plane(self))
    }

    fn make_3d_curve(&self, curve: &dyn Curve2d) -> Box<dyn Curve3d> {
        curve.lift(&self.origin, self.x_dir.as_ref(), self.y_dir.as_ref())
    }

    fn plane_intersection(&self, plane: &Plane, window: &ParamBounds, _precision: f64) -> Vec<DualSurfaceCurve> {
        let n1 = Plane::normal(self);
        let n2 = plane.normal();
        let dir = n1.cross(&n2);
        if dir.norm() < Tolerance::current().angular {
            return Vec::new();
        }
        // Point on both planes closest to the origin of `self`
        let h1 = n1.dot(&self.origin.coords);
        let h2 = n2.dot(&plane.origin.coords);
        let p0 = Point3::from((h1 * n2.cross(&dir) + h2 * dir.cross(&n1)) / dir.norm_squared());
        let o2 = self.project(&p0);
        let d2 = self.project_vec(&dir);

        let window = bounded_window(self, window);
        let Some((s0, s1)) = clip_line(o2, d2, &window, f64::NEG_INFINITY, f64::INFINITY) else {
            return Vec::new();
        };
        let (a, b) = (o2 + s0 * d2, o2 + s1 * d2);
        let line = Line3d::from_points(Plane::point_at(self, a), Plane::point_at(self, b));
        let on_other = line.project_to_plane(plane);
        vec![DualSurfaceCurve::new(
            Box::new(line),
            self.clone_box(),
            Box::new(Line2d::from_points(a, b)),
            plane.clone_box(),
            on_other,
        )]
    }

    fn to_record(&self) -> Option<SurfaceRecord> {
        Some(SurfaceRecord::Plane(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use surfkern_geom::Ellipse3d;

    #[test]
    fn test_plane_surface_roundtrips() {
        let plane = Plane::new(Point3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let uv = Point2::new(0.7, -1.2);
        let p = Surface::point_at(&plane, uv);
        assert_relative_eq!(Surface::position_of(&plane, &p), uv, epsilon = 1e-12);

        let circle = Ellipse3d::circle(Surface::point_at(&plane, Point2::origin()), 2.0, plane.normal());
        let flat = plane.projected_curve(&circle, 1e-9).unwrap();
        let back = plane.make_3d_curve(flat.as_ref());
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_relative_eq!(back.point_at(t), circle.point_at(t), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_plane_plane_line_clipped_to_window() {
        let a = Plane::xy();
        let b = Plane::from_normal(Point3::new(1.0, 0.0, 0.0), Vec3::x());
        let window = ParamBounds::new(-2.0, 2.0, -3.0, 3.0);
        let hits = a.plane_intersection(&b, &window, 1e-9);
        assert_eq!(hits.len(), 1);
        let c = hits[0].curve3d();
        for t in [0.0, 0.5, 1.0] {
            assert_relative_eq!(c.point_at(t).x, 1.0, epsilon = 1e-12);
            assert_relative_eq!(c.point_at(t).z, 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!((c.end_point() - c.start_point()).norm(), 6.0, epsilon = 1e-12);
        assert!(hits[0].max_deviation(8) < 1e-9);
        assert!(a.plane_intersection(&Plane::xy(), &window, 1e-9).is_empty());
    }

    #[test]
    fn test_reverse_orientation_flips_normal() {
        let mut plane = Plane::xy();
        let p = Surface::point_at(&plane, Point2::new(1.0, 2.0));
        let map = plane.reverse_orientation();
        assert_relative_eq!(Surface::normal(&plane, Point2::origin()), -Vec3::z(), epsilon = 1e-12);
        let uv = map.apply_point(&Point2::new(1.0, 2.0));
        assert_relative_eq!(Surface::point_at(&plane, uv), p, epsilon = 1e-12);
    }
}
