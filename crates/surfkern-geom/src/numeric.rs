//! Sampling-based fallbacks shared by every curve type.
//!
//! Curves with a closed form override the corresponding trait methods; these
//! routines only need point and derivative evaluation.

use surfkern_math::{roots, KernelSettings, Point2, Point3, Tolerance, Vec2};

use crate::{Curve2d, Curve3d, Plane};

/// `n + 1` evenly spaced parameters covering `[0, 1]`.
pub fn uniform_positions(n: usize) -> Vec<f64> {
    let n = n.max(1);
    (0..=n).map(|i| i as f64 / n as f64).collect()
}

/// Split every interval between consecutive `positions` into `factor` pieces.
pub fn refine_positions(positions: &[f64], factor: usize) -> Vec<f64> {
    let factor = factor.max(1);
    let mut out = Vec::with_capacity(positions.len() * factor + 1);
    for w in positions.windows(2) {
        for k in 0..factor {
            out.push(w[0] + (w[1] - w[0]) * k as f64 / factor as f64);
        }
    }
    if let Some(&last) = positions.last() {
        out.push(last);
    }
    out
}

fn dense_2d<C: Curve2d + ?Sized>(curve: &C) -> Vec<f64> {
    refine_positions(&curve.safe_sample_positions(), 4)
}

fn dense_3d<C: Curve3d + ?Sized>(curve: &C) -> Vec<f64> {
    refine_positions(&curve.safe_sample_positions(), 4)
}

/// Second derivative of a 2D curve, by central differences when no closed form exists.
pub fn second_derivative_2d<C: Curve2d + ?Sized>(curve: &C, t: f64) -> Vec2 {
    match curve.try_point_deriv2_at(t) {
        Some((_, _, d2)) => d2,
        None => {
            let h = 1e-5;
            (curve.direction_at(t + h) - curve.direction_at(t - h)) / (2.0 * h)
        }
    }
}

fn foot_newton_2d<C: Curve2d + ?Sized>(curve: &C, p: &Point2, mut t: f64) -> f64 {
    let settings = KernelSettings::current();
    for _ in 0..settings.max_newton_iterations {
        let q = curve.point_at(t);
        let d1 = curve.direction_at(t);
        let d2 = second_derivative_2d(curve, t);
        let g = (q - p).dot(&d1);
        let dg = d1.norm_squared() + (q - p).dot(&d2);
        if dg.abs() < 1e-300 {
            break;
        }
        let step = g / dg;
        t = (t - step).clamp(0.0, 1.0);
        if step.abs() * d1.norm() < settings.tolerance.linear * 1e-3 {
            break;
        }
    }
    t
}

/// Parameter of the point on `curve` nearest to `p`, clamped to `[0, 1]`.
pub fn closest_parameter_2d<C: Curve2d + ?Sized>(curve: &C, p: &Point2) -> f64 {
    let seed = dense_2d(curve)
        .into_iter()
        .min_by(|&a, &b| {
            (curve.point_at(a) - p)
                .norm_squared()
                .total_cmp(&(curve.point_at(b) - p).norm_squared())
        })
        .unwrap_or(0.0);
    foot_newton_2d(curve, p, seed)
}

/// Parameters of all perpendicular feet from `p` onto `curve`.
pub fn perpendicular_feet_2d<C: Curve2d + ?Sized>(curve: &C, p: &Point2) -> Vec<f64> {
    let g = |t: f64| (curve.point_at(t) - p).dot(&curve.direction_at(t));
    let positions = dense_2d(curve);
    let tol = Tolerance::current().linear * 1e-3;
    let mut feet: Vec<f64> = Vec::new();
    for w in positions.windows(2) {
        if let Some(t) = roots::bisect(w[0], w[1], tol, 200, g) {
            let t = foot_newton_2d(curve, p, t);
            if feet.last().map_or(true, |&last| (t - last).abs() > 1e-9) {
                feet.push(t);
            }
        }
    }
    feet
}

/// Parameter of the point on a 3D `curve` nearest to `p`, clamped to `[0, 1]`.
pub fn closest_parameter_3d<C: Curve3d + ?Sized>(curve: &C, p: &Point3) -> f64 {
    let mut t = dense_3d(curve)
        .into_iter()
        .min_by(|&a, &b| {
            (curve.point_at(a) - p)
                .norm_squared()
                .total_cmp(&(curve.point_at(b) - p).norm_squared())
        })
        .unwrap_or(0.0);
    let settings = KernelSettings::current();
    for _ in 0..settings.max_newton_iterations {
        let (q, d1, d2) = curve.point_deriv2_at(t);
        let g = (q - p).dot(&d1);
        let dg = d1.norm_squared() + (q - p).dot(&d2);
        if dg.abs() < 1e-300 {
            break;
        }
        let step = g / dg;
        t = (t - step).clamp(0.0, 1.0);
        if step.abs() * d1.norm() < settings.tolerance.linear * 1e-3 {
            break;
        }
    }
    t
}

/// Parameters in `[0, 1]` where `curve` crosses or touches `plane`.
pub fn plane_crossings<C: Curve3d + ?Sized>(curve: &C, plane: &Plane) -> Vec<f64> {
    let f = |t: f64| plane.signed_distance(&curve.point_at(t));
    let tol = Tolerance::current().linear;
    let mut hits: Vec<f64> = Vec::new();
    let positions = dense_3d(curve);
    for w in positions.windows(2) {
        let hit = if f(w[0]).abs() < tol {
            Some(w[0])
        } else {
            roots::bisect(w[0], w[1], tol * 1e-3, 200, f)
        };
        if let Some(t) = hit {
            if hits.last().map_or(true, |&last| (t - last).abs() > 1e-9) {
                hits.push(t);
            }
        }
    }
    if let Some(&last) = positions.last() {
        if f(last).abs() < tol && hits.last().map_or(true, |&h| (last - h).abs() > 1e-9) {
            hits.push(last);
        }
    }
    hits
}

/// Intersections of two arbitrary 2D curves as `(t_a, t_b)` pairs.
///
/// Both curves are flattened to polylines; every crossing of two segments
/// seeds a 2×2 Newton iteration on `a(s) - b(t) = 0`.
pub fn curve_curve_2d(a: &dyn Curve2d, b: &dyn Curve2d) -> Vec<(f64, f64)> {
    let pa = dense_2d(a);
    let pb = dense_2d(b);
    let qa: Vec<Point2> = pa.iter().map(|&t| a.point_at(t)).collect();
    let qb: Vec<Point2> = pb.iter().map(|&t| b.point_at(t)).collect();
    let tol = Tolerance::current().linear;

    let mut out: Vec<(f64, f64)> = Vec::new();
    for i in 0..qa.len().saturating_sub(1) {
        for j in 0..qb.len().saturating_sub(1) {
            let Some((la, lb)) = segment_crossing(&qa[i], &qa[i + 1], &qb[j], &qb[j + 1], tol) else {
                continue;
            };
            let s0 = pa[i] + la * (pa[i + 1] - pa[i]);
            let t0 = pb[j] + lb * (pb[j + 1] - pb[j]);
            let Some((s, t)) = newton_2x2(a, b, s0, t0) else {
                continue;
            };
            let dup = out
                .iter()
                .any(|&(os, _)| tol_eq(&a.point_at(os), &a.point_at(s), tol));
            if !dup {
                out.push((s, t));
            }
        }
    }
    out
}

fn tol_eq(a: &Point2, b: &Point2, tol: f64) -> bool {
    (a - b).norm() < tol
}

/// Crossing of segments `p0p1` and `q0q1` as fractions along each segment.
///
/// The fractions are slightly extended so that crossings at shared polyline
/// vertices are not lost.
fn segment_crossing(p0: &Point2, p1: &Point2, q0: &Point2, q1: &Point2, tol: f64) -> Option<(f64, f64)> {
    let r = p1 - p0;
    let s = q1 - q0;
    let denom = r.perp(&s);
    let w = q0 - p0;
    if denom.abs() < 1e-300 {
        // Parallel: report touching end points only
        if (p1 - q0).norm() < tol {
            return Some((1.0, 0.0));
        }
        if (p0 - q1).norm() < tol {
            return Some((0.0, 1.0));
        }
        return None;
    }
    let la = w.perp(&s) / denom;
    let lb = w.perp(&r) / denom;
    let slack = 1e-9;
    if (-slack..=1.0 + slack).contains(&la) && (-slack..=1.0 + slack).contains(&lb) {
        Some((la.clamp(0.0, 1.0), lb.clamp(0.0, 1.0)))
    } else {
        None
    }
}

fn newton_2x2(a: &dyn Curve2d, b: &dyn Curve2d, mut s: f64, mut t: f64) -> Option<(f64, f64)> {
    let settings = KernelSettings::current();
    let tol = settings.tolerance.linear;
    for _ in 0..settings.max_newton_iterations {
        let f = a.point_at(s) - b.point_at(t);
        if f.norm() < tol * 1e-3 {
            break;
        }
        let da = a.direction_at(s);
        let db = b.direction_at(t);
        // J = [da, -db]
        let det = -da.x * db.y + da.y * db.x;
        if det.abs() < 1e-300 {
            break;
        }
        let ds = (-f.x * -db.y + db.x * -f.y) / det;
        let dt = (da.x * -f.y - da.y * -f.x) / det;
        s = (s + ds).clamp(0.0, 1.0);
        t = (t + dt).clamp(0.0, 1.0);
    }
    if (a.point_at(s) - b.point_at(t)).norm() < tol {
        Some((s, t))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Circle2d, Ellipse2d, Ellipse3d, Line2d};
    use approx::assert_relative_eq;
    use surfkern_math::Vec3;

    #[test]
    fn test_refine_positions() {
        let r = refine_positions(&[0.0, 0.5, 1.0], 2);
        assert_eq!(r, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_closest_parameter_generic_matches_closed_form() {
        let c = Circle2d::arc(Point2::origin(), 2.0, 0.0, 3.0);
        let p = Point2::new(1.0, 1.0);
        let numeric = closest_parameter_2d(&c, &p);
        assert_relative_eq!(numeric, c.closest_parameter(&p), epsilon = 1e-8);
    }

    #[test]
    fn test_perpendicular_feet_generic() {
        let c = Circle2d::new(Point2::origin(), 1.0);
        let feet = perpendicular_feet_2d(&c, &Point2::new(2.0, 0.0));
        // φ = π is a foot; φ = 0 coincides with both end points
        assert!(feet.iter().any(|&t| (t - 0.5).abs() < 1e-8));
        assert!(feet.iter().any(|&t| t < 1e-8 || t > 1.0 - 1e-8));
    }

    #[test]
    fn test_plane_crossings_generic() {
        let e = Ellipse3d::circle(Point3::origin(), 1.0, Vec3::z());
        let plane = Plane::from_normal(Point3::new(0.5, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0));
        let numeric = plane_crossings(&e, &plane);
        let exact = e.plane_intersection(&plane);
        assert_eq!(numeric.len(), exact.len());
        for (n, x) in numeric.iter().zip(&exact) {
            assert_relative_eq!(n, x, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_curve_curve_ellipse_circle() {
        let e = Ellipse2d::new(Point2::origin(), Vec2::new(2.0, 0.0), Vec2::new(0.0, 1.0));
        let c = Circle2d::new(Point2::origin(), 1.5);
        let hits = curve_curve_2d(&e, &c);
        assert_eq!(hits.len(), 4);
        for (s, t) in hits {
            assert_relative_eq!(e.point_at(s), c.point_at(t), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_curve_curve_lines() {
        let a = Line2d::from_points(Point2::new(0.0, 0.0), Point2::new(2.0, 2.0));
        let b = Line2d::from_points(Point2::new(0.0, 2.0), Point2::new(2.0, 0.0));
        let hits = curve_curve_2d(&a, &b);
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].0, 0.5, epsilon = 1e-9);
    }
}
