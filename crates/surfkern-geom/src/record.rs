//! Serializable descriptions of curves.
//!
//! Trait objects cannot derive serde, so every persistable curve converts to
//! one of these tagged enums and back. B-spline variants are rebuilt by
//! `surfkern-nurbs`, which owns the B-spline types.

use serde::{Deserialize, Serialize};
use surfkern_math::{Point2, Point3, Vec2, Vec3};

use crate::{Circle2d, Curve2d, Curve3d, Ellipse2d, Ellipse3d, Line2d, Line3d};

/// Defining state of a 2D curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Curve2dRecord {
    /// Line segment.
    Line {
        /// Start point.
        start: Point2,
        /// End point.
        end: Point2,
    },
    /// Circular arc.
    Circle {
        /// Center.
        center: Point2,
        /// Radius.
        radius: f64,
        /// Angle at the start.
        start_angle: f64,
        /// Signed angular extent.
        sweep: f64,
    },
    /// Elliptical arc by conjugate semi-diameters.
    Ellipse {
        /// Center.
        center: Point2,
        /// Semi-diameter at angle 0.
        major: Vec2,
        /// Semi-diameter at angle π/2.
        minor: Vec2,
        /// Angle at the start.
        start_angle: f64,
        /// Signed angular extent.
        sweep: f64,
    },
    /// Non-rational B-spline on a `[0, 1]` knot vector.
    #[serde(rename = "bspline")]
    BSpline {
        /// Control points.
        control_points: Vec<Point2>,
        /// Clamped knot vector.
        knots: Vec<f64>,
        /// Polynomial degree.
        degree: usize,
    },
}

impl Curve2dRecord {
    /// Rebuild an analytic curve. B-splines return `None`.
    pub fn to_analytic(&self) -> Option<Box<dyn Curve2d>> {
        match self {
            Self::Line { start, end } => Some(Box::new(Line2d::from_points(*start, *end))),
            Self::Circle {
                center,
                radius,
                start_angle,
                sweep,
            } => Some(Box::new(Circle2d::arc(*center, *radius, *start_angle, *sweep))),
            Self::Ellipse {
                center,
                major,
                minor,
                start_angle,
                sweep,
            } => Some(Box::new(Ellipse2d::arc(*center, *major, *minor, *start_angle, *sweep))),
            Self::BSpline { .. } => None,
        }
    }
}

/// Defining state of a 3D curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Curve3dRecord {
    /// Line segment.
    Line {
        /// Start point.
        start: Point3,
        /// End point.
        end: Point3,
    },
    /// Elliptical or circular arc by conjugate semi-diameters.
    Ellipse {
        /// Center.
        center: Point3,
        /// Semi-diameter at angle 0.
        major: Vec3,
        /// Semi-diameter at angle π/2.
        minor: Vec3,
        /// Angle at the start.
        start_angle: f64,
        /// Signed angular extent.
        sweep: f64,
    },
    /// Non-rational B-spline on a `[0, 1]` knot vector.
    #[serde(rename = "bspline")]
    BSpline {
        /// Control points.
        control_points: Vec<Point3>,
        /// Clamped knot vector.
        knots: Vec<f64>,
        /// Polynomial degree.
        degree: usize,
    },
}

impl Curve3dRecord {
    /// Rebuild an analytic curve. B-splines return `None`.
    pub fn to_analytic(&self) -> Option<Box<dyn Curve3d>> {
        match self {
            Self::Line { start, end } => Some(Box::new(Line3d::from_points(*start, *end))),
            Self::Ellipse {
                center,
                major,
                minor,
                start_angle,
                sweep,
            } => Some(Box::new(Ellipse3d::arc(*center, *major, *minor, *start_angle, *sweep))),
            Self::BSpline { .. } => None,
        }
    }
}
