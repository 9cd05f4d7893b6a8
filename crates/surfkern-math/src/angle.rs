//! Angle helpers.

use std::f64::consts::{PI, TAU};

/// Normalize an angle into `[0, 2π)`.
pub fn normalize(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// Shift `angle` by whole turns so it lies within `(reference - π, reference + π]`.
pub fn near(angle: f64, reference: f64) -> f64 {
    let mut d = (angle - reference).rem_euclid(TAU);
    if d > PI {
        d -= TAU;
    }
    reference + d
}

/// Signed sweep from `start` to `end` travelling in the given direction.
///
/// The result is in `(0, 2π]` for counter-clockwise travel and `[-2π, 0)`
/// for clockwise travel; coincident angles give a full turn.
pub fn sweep(start: f64, end: f64, ccw: bool) -> f64 {
    let d = normalize(end - start);
    match (ccw, d == 0.0) {
        (true, true) => TAU,
        (true, false) => d,
        (false, true) => -TAU,
        (false, false) => d - TAU,
    }
}

/// Whether `angle` lies on the arc starting at `start` with signed `sweep`.
pub fn on_arc(angle: f64, start: f64, sweep: f64, tol: f64) -> bool {
    if sweep.abs() >= TAU - tol {
        return true;
    }
    let d = if sweep >= 0.0 {
        (angle - start).rem_euclid(TAU)
    } else {
        (start - angle).rem_euclid(TAU)
    };
    d <= sweep.abs() + tol || d >= TAU - tol
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize() {
        assert_relative_eq!(normalize(-PI / 2.0), 1.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(normalize(5.0 * PI), PI, epsilon = 1e-12);
        assert_eq!(normalize(0.0), 0.0);
    }

    #[test]
    fn test_near() {
        assert_relative_eq!(near(0.1, TAU), TAU + 0.1, epsilon = 1e-12);
        assert_relative_eq!(near(3.0 * PI / 2.0, 0.0), -PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sweep_directions() {
        assert_relative_eq!(sweep(0.0, PI / 2.0, true), PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(sweep(0.0, PI / 2.0, false), -1.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(sweep(1.0, 1.0, true), TAU, epsilon = 1e-12);
    }

    #[test]
    fn test_on_arc() {
        assert!(on_arc(0.5, 0.0, 1.0, 1e-9));
        assert!(!on_arc(1.5, 0.0, 1.0, 1e-9));
        assert!(on_arc(-0.5, 0.0, -1.0, 1e-9));
        assert!(on_arc(TAU - 0.5, 0.0, -1.0, 1e-9));
        assert!(on_arc(4.0, 1.0, TAU, 1e-9));
    }
}
