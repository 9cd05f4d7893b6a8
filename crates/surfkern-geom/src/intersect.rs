//! Intersection of two planar curves.

use surfkern_math::{roots, Point2, Tolerance};

use crate::{numeric, Circle2d, Curve2d, Ellipse2d, Line2d};

/// A point shared by two 2D curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveIntersection2d {
    /// The intersection point.
    pub point: Point2,
    /// Parameter on the first curve.
    pub t_a: f64,
    /// Parameter on the second curve.
    pub t_b: f64,
}

impl CurveIntersection2d {
    fn swapped(self) -> Self {
        Self {
            point: self.point,
            t_a: self.t_b,
            t_b: self.t_a,
        }
    }
}

/// Intersect two 2D curves.
///
/// Lines, circles and ellipses are handled in closed form; any other pair
/// falls back to polyline seeding plus Newton refinement. Results are ordered
/// by the parameter on `a`.
pub fn intersect(a: &dyn Curve2d, b: &dyn Curve2d) -> Vec<CurveIntersection2d> {
    let mut hits = match exact(a, b) {
        Some(hits) => hits,
        None => match exact(b, a) {
            Some(hits) => hits.into_iter().map(CurveIntersection2d::swapped).collect(),
            None => {
                log::trace!("intersecting {:?} with {:?} numerically", a.curve_type(), b.curve_type());
                numeric::curve_curve_2d(a, b)
                    .into_iter()
                    .map(|(t_a, t_b)| CurveIntersection2d {
                        point: a.point_at(t_a),
                        t_a,
                        t_b,
                    })
                    .collect()
            }
        },
    };
    hits.sort_by(|x, y| x.t_a.total_cmp(&y.t_a));
    hits
}

/// Closed-form pairs with `a` first. `None` when the pair is not covered.
fn exact(a: &dyn Curve2d, b: &dyn Curve2d) -> Option<Vec<CurveIntersection2d>> {
    let line = a.as_any().downcast_ref::<Line2d>()?;
    let other = b.as_any();
    if let Some(l2) = other.downcast_ref::<Line2d>() {
        return Some(line_line(line, l2));
    }
    if let Some(c) = other.downcast_ref::<Circle2d>() {
        return Some(line_ellipse(line, &c.to_ellipse()));
    }
    if let Some(e) = other.downcast_ref::<Ellipse2d>() {
        return Some(line_ellipse(line, e));
    }
    None
}

fn line_line(a: &Line2d, b: &Line2d) -> Vec<CurveIntersection2d> {
    let tol = Tolerance::current().linear;
    let denom = a.direction.perp(&b.direction);
    let w = b.origin - a.origin;
    if denom.abs() < 1e-300 {
        // Parallel or collinear: only touching end points count
        let mut out = Vec::new();
        for (ta, pa) in [(0.0, a.start_point()), (1.0, a.end_point())] {
            for (tb, pb) in [(0.0, b.start_point()), (1.0, b.end_point())] {
                if (pa - pb).norm() < tol {
                    out.push(CurveIntersection2d { point: pa, t_a: ta, t_b: tb });
                }
            }
        }
        return out;
    }
    let s = w.perp(&b.direction) / denom;
    let t = w.perp(&a.direction) / denom;
    let slack_a = tol / a.direction.norm().max(1e-300);
    let slack_b = tol / b.direction.norm().max(1e-300);
    if (-slack_a..=1.0 + slack_a).contains(&s) && (-slack_b..=1.0 + slack_b).contains(&t) {
        let s = s.clamp(0.0, 1.0);
        vec![CurveIntersection2d {
            point: a.point_at(s),
            t_a: s,
            t_b: t.clamp(0.0, 1.0),
        }]
    } else {
        Vec::new()
    }
}

fn line_ellipse(line: &Line2d, ellipse: &Ellipse2d) -> Vec<CurveIntersection2d> {
    let tol = Tolerance::current().linear;
    let (Some((a0, b0)), Some((a1, b1))) = (
        ellipse.local_coordinates(&line.origin),
        ellipse.local_coordinates(&line.end_point()),
    ) else {
        return Vec::new();
    };
    // Local coordinates are affine in s: (a0 + s·da, b0 + s·db) on the unit circle
    let (da, db) = (a1 - a0, b1 - b0);
    let qa = da * da + db * db;
    let qb = 2.0 * (a0 * da + b0 * db);
    let qc = a0 * a0 + b0 * b0 - 1.0;
    let slack = tol / line.direction.norm().max(1e-300);
    roots::solve_quadratic(qa, qb, qc)
        .into_iter()
        .filter(|s| (-slack..=1.0 + slack).contains(s))
        .filter_map(|s| {
            let s = s.clamp(0.0, 1.0);
            let phi = (b0 + s * db).atan2(a0 + s * da);
            let t = ellipse.parameter_of_angle(phi)?;
            Some(CurveIntersection2d {
                point: line.point_at(s),
                t_a: s,
                t_b: t,
            })
        })
        .collect()
}
