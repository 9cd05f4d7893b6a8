//! Numeric projection of 3D curves into parameter space.
//!
//! The sampler is the last link of every projection strategy chain. It lifts
//! the curve's own parameters onto the surface with continuous point
//! inversion and interpolates a cubic B-spline at those same parameters, so
//! the parameter curve and the source curve agree at every sample. Midpoints
//! between samples are checked against `precision` and refined until they
//! pass or `max_refinement_samples` is reached.

use surfkern_geom::numeric::uniform_positions;
use surfkern_geom::{Curve2d, Curve3d};
use surfkern_math::{KernelSettings, Point2, Point3, Tolerance};
use surfkern_nurbs::{BSplineCurve, BSplineCurve2d};

use crate::{CurveOnSurface, Surface};

/// Degree of every sampled fit.
const FIT_DEGREE: usize = 3;

/// `n + 1` evenly spaced values from `a` to `b`.
pub(crate) fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    if a == b || n == 0 {
        return vec![a];
    }
    (0..=n).map(|i| a + (b - a) * i as f64 / n as f64).collect()
}

/// Sorted union of `values` restricted to `[lo, hi]`, with both ends included
/// and near-duplicates removed.
pub(crate) fn merge_steps(values: impl IntoIterator<Item = f64>, lo: f64, hi: f64) -> Vec<f64> {
    let eps = 1e-12 * (hi - lo).abs().max(1.0);
    let mut out: Vec<f64> = values
        .into_iter()
        .filter(|x| x.is_finite() && *x > lo + eps && *x < hi - eps)
        .chain([lo, hi])
        .collect();
    out.sort_by(f64::total_cmp);
    out.dedup_by(|a, b| (*a - *b).abs() <= eps);
    out
}

/// Shift `uv` by whole periods so it lies closest to `reference`.
pub(crate) fn unwrap_periodic<S: Surface + ?Sized>(surface: &S, uv: Point2, reference: Point2) -> Point2 {
    let mut out = uv;
    if surface.is_u_periodic() && surface.u_period() > 0.0 {
        let p = surface.u_period();
        out.x -= p * ((out.x - reference.x) / p).round();
    }
    if surface.is_v_periodic() && surface.v_period() > 0.0 {
        let p = surface.v_period();
        out.y -= p * ((out.y - reference.y) / p).round();
    }
    out
}

/// Interpolate `f` at the given increasing parameters with a cubic B-spline.
pub(crate) fn fit_uv_curve(params: &[f64], f: impl Fn(f64) -> Point2) -> Option<Box<dyn Curve2d>> {
    let points: Vec<Point2> = params.iter().map(|&t| f(t)).collect();
    match BSplineCurve2d::interpolate(&points, params, FIT_DEGREE) {
        Ok(c) => Some(Box::new(c)),
        Err(e) => {
            log::debug!("parameter curve fit failed: {e}");
            None
        }
    }
}

/// Interpolate `f` at the given increasing parameters with a cubic B-spline.
pub(crate) fn fit_space_curve(params: &[f64], f: impl Fn(f64) -> Point3) -> Option<Box<dyn Curve3d>> {
    let points: Vec<Point3> = params.iter().map(|&t| f(t)).collect();
    match BSplineCurve::interpolate(&points, params, FIT_DEGREE) {
        Ok(c) => Some(Box::new(c)),
        Err(e) => {
            log::debug!("space curve fit failed: {e}");
            None
        }
    }
}

/// The parameter curve of a [`CurveOnSurface`] built on this very surface.
///
/// Detected by evaluation, not identity: the wrapped parameter curve is
/// reused when it maps onto `curve` through `surface` at every check point.
pub fn reuse_curve_on_surface<S: Surface + ?Sized>(surface: &S, curve: &dyn Curve3d) -> Option<Box<dyn Curve2d>> {
    let on_surface = curve.as_any().downcast_ref::<CurveOnSurface>()?;
    let tol = Tolerance::current();
    let c2d = on_surface.curve2d();
    uniform_positions(4)
        .into_iter()
        .all(|t| tol.points_equal(&surface.point_at(c2d.point_at(t)), &curve.point_at(t)))
        .then(|| c2d.clone_box())
}

/// Lift curve parameters onto the surface, one inversion per sample.
///
/// The first sample is inverted globally, every later one from its
/// predecessor, with periodic parameters unwrapped to stay continuous.
pub(crate) fn lift_samples<S: Surface + ?Sized>(surface: &S, curve: &dyn Curve3d, params: &[f64]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(params.len());
    for &t in params {
        let p = curve.point_at(t);
        let uv = match out.last() {
            None => surface.position_of(&p),
            Some(prev) => {
                let raw = surface.position_of_near(&p, *prev);
                unwrap_periodic(surface, raw, *prev)
            }
        };
        out.push(uv);
    }
    out
}

/// Project `curve` onto `surface` by sampling, inversion, and interpolation.
pub fn project_curve<S: Surface + ?Sized>(surface: &S, curve: &dyn Curve3d, precision: f64) -> Option<Box<dyn Curve2d>> {
    let settings = KernelSettings::current();
    let seeds = curve
        .safe_sample_positions()
        .into_iter()
        .chain(uniform_positions(settings.projection_samples - 1));
    let mut params = merge_steps(seeds, 0.0, 1.0);

    loop {
        let uvs = lift_samples(surface, curve, &params);
        let spline = match BSplineCurve2d::interpolate(&uvs, &params, FIT_DEGREE) {
            Ok(s) => s,
            Err(e) => {
                log::debug!("projection fit failed with {} samples: {e}", params.len());
                return None;
            }
        };

        let failing: Vec<f64> = params
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .filter(|&tm| (surface.point_at(spline.point_at(tm)) - curve.point_at(tm)).norm() > precision)
            .collect();
        if failing.is_empty() {
            return Some(Box::new(spline));
        }
        if params.len() + failing.len() > settings.max_refinement_samples {
            log::debug!(
                "projection stopped refining at {} samples with {} midpoints above {precision:e}",
                params.len(),
                failing.len()
            );
            return Some(Box::new(spline));
        }
        log::trace!("projection refining {} intervals", failing.len());
        params = merge_steps(params.into_iter().chain(failing), 0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_steps_sorts_and_dedups() {
        let m = merge_steps([0.5, 0.25, 0.5 + 1e-15, 2.0, -1.0, f64::NAN], 0.0, 1.0);
        assert_eq!(m, vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_linspace_includes_ends() {
        assert_eq!(linspace(1.0, 3.0, 4), vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!(linspace(2.0, 2.0, 4), vec![2.0]);
    }
}
