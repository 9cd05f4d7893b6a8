#![warn(missing_docs)]

//! Parametric surface kernel facade for surfkern.
//!
//! Re-exports the component crates and gathers the everyday types in
//! [`prelude`].
//!
//! # Example
//!
//! ```
//! use surfkern::prelude::*;
//!
//! let cylinder = CylindricalSurfaceNp::from_axis(Point3::origin(), Vec3::new(0.0, 0.0, 2.0), 1.0).unwrap();
//! let plane = Plane::from_normal(Point3::new(0.0, 0.0, 1.0), Vec3::z());
//! let cuts = cylinder.plane_intersection(&plane, &cylinder.natural_bounds(), 1e-9);
//! assert_eq!(cuts.len(), 1);
//!
//! let json = to_json(&cylinder).unwrap();
//! let back = from_json(&json).unwrap();
//! assert_eq!(back.kind(), SurfaceKind::Cylinder);
//! ```

pub use surfkern_geom;
pub use surfkern_math;
pub use surfkern_nurbs;
pub use surfkern_surface;

/// The types most callers need.
pub mod prelude {
    pub use surfkern_geom::{
        Circle2d, Curve2d, Curve3d, CurveKind, Ellipse2d, Ellipse3d, Line2d, Line3d, Plane,
    };
    pub use surfkern_math::{
        Dir3, KernelSettings, Point2, Point3, Tolerance, Transform, Transform2d, Vec2, Vec3,
    };
    pub use surfkern_nurbs::{BSplineCurve, BSplineCurve2d};
    pub use surfkern_surface::{
        from_json, to_json, Cylinder, CylindricalSurfaceNp, DualSurfaceCurve, HelicalSurface,
        ParamBounds, SectionCurve2d, Surface, SurfaceError, SurfaceKind, SurfaceOfLinearExtrusion,
    };
}
