//! Small polynomial root solvers.

/// Real roots of `a·x² + b·x + c = 0`, ascending.
///
/// Degenerates to the linear equation when `a` is negligible relative to the
/// other coefficients. A double root is reported once.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale == 0.0 {
        return Vec::new();
    }
    if a.abs() <= 1e-14 * scale {
        if b.abs() <= 1e-14 * scale {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < -1e-14 * scale * scale {
        return Vec::new();
    }
    if disc <= 1e-14 * scale * scale {
        return vec![-b / (2.0 * a)];
    }
    // Numerically stable form avoiding cancellation
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    let (mut r1, mut r2) = if q == 0.0 {
        let s = (-c / a).sqrt();
        (-s, s)
    } else {
        (q / a, c / q)
    };
    if r1 > r2 {
        std::mem::swap(&mut r1, &mut r2);
    }
    vec![r1, r2]
}

/// Find a root of `f` in `[lo, hi]` by bisection, given a sign change.
///
/// Returns `None` when `f(lo)` and `f(hi)` have the same strict sign.
pub fn bisect(mut lo: f64, mut hi: f64, tol: f64, max_iter: usize, f: impl Fn(f64) -> f64) -> Option<f64> {
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return None;
    }
    for _ in 0..max_iter {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo).abs() < tol {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_two_roots() {
        let r = solve_quadratic(1.0, -3.0, 2.0);
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(r[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quadratic_double_and_none() {
        let r = solve_quadratic(1.0, -2.0, 1.0);
        assert_eq!(r.len(), 1);
        assert_relative_eq!(r[0], 1.0, epsilon = 1e-7);
        assert!(solve_quadratic(1.0, 0.0, 1.0).is_empty());
    }

    #[test]
    fn test_quadratic_linear_fallback() {
        let r = solve_quadratic(0.0, 2.0, -4.0);
        assert_eq!(r, vec![2.0]);
    }

    #[test]
    fn test_quadratic_symmetric() {
        let r = solve_quadratic(1.0, 0.0, -4.0);
        assert_relative_eq!(r[0], -2.0, epsilon = 1e-12);
        assert_relative_eq!(r[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bisect() {
        let root = bisect(0.0, 2.0, 1e-12, 200, |x| x * x - 2.0).unwrap();
        assert_relative_eq!(root, 2f64.sqrt(), epsilon = 1e-10);
        assert!(bisect(0.0, 1.0, 1e-12, 200, |x| x + 1.0).is_none());
    }
}
