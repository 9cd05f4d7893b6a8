//! Generic point inversion by Newton iteration on the squared distance.
//!
//! Used by every surface without a closed-form inverse and as the refinement
//! step after a closed-form seed. The full Newton step uses second
//! derivatives; when that Hessian is not positive definite the Gauss-Newton
//! step is taken instead. Steps are halved until the distance decreases.

use nalgebra::Matrix2;
use surfkern_math::{KernelSettings, Point2, Point3, Vec2};

use crate::sampling::{linspace, merge_steps};
use crate::surface::UNBOUNDED_EXTENT;
use crate::{ParamBounds, Surface};

/// Grid cells per side when seeding a global inversion.
const SEED_GRID: usize = 8;

/// Largest number of step halvings per iteration.
const MAX_HALVINGS: usize = 8;

fn solve_positive(m: Matrix2<f64>, g: Vec2) -> Option<Vec2> {
    if !(m[(0, 0)] > 0.0 && m.determinant() > 0.0) {
        return None;
    }
    m.try_inverse().map(|inv| inv * g)
}

/// Refine `seed` towards the parameter of the surface point closest to `p`.
///
/// Non-periodic directions stay inside the natural bounds. Returns the best
/// parameter found; logs a warning when the iteration cap is hit.
pub fn refine<S: Surface + ?Sized>(surface: &S, p: &Point3, seed: Point2) -> Point2 {
    let settings = KernelSettings::current();
    let eps = settings.tolerance.linear * 1e-3;
    let bounds = surface.natural_bounds();
    let (wrap_u, wrap_v) = (surface.is_u_periodic(), surface.is_v_periodic());
    let keep_inside = |uv: Point2| {
        let c = bounds.clamp_point(uv);
        Point2::new(if wrap_u { uv.x } else { c.x }, if wrap_v { uv.y } else { c.y })
    };

    let mut uv = keep_inside(seed);
    let mut d = surface.derivatives2(uv);
    let mut dist = (d.point - p).norm();

    for _ in 0..settings.max_newton_iterations {
        if dist <= eps {
            return uv;
        }
        let r = d.point - p;
        let g = Vec2::new(d.du.dot(&r), d.dv.dot(&r));
        let (a, b, c) = (d.du.dot(&d.du), d.du.dot(&d.dv), d.dv.dot(&d.dv));
        let cross = b + d.duv.dot(&r);
        let full = Matrix2::new(a + d.duu.dot(&r), cross, cross, c + d.dvv.dot(&r));
        let Some(step) = solve_positive(full, g).or_else(|| solve_positive(Matrix2::new(a, b, b, c), g)) else {
            return uv;
        };

        let mut lambda = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_HALVINGS {
            let candidate = keep_inside(uv - lambda * step);
            let cd = surface.derivatives2(candidate);
            let cdist = (cd.point - p).norm();
            if cdist <= dist {
                accepted = Some((candidate, cd, cdist));
                break;
            }
            lambda *= 0.5;
        }
        let Some((candidate, cd, cdist)) = accepted else {
            return uv;
        };
        let moved = (cd.point - d.point).norm();
        uv = candidate;
        d = cd;
        dist = cdist;
        if moved <= eps {
            return uv;
        }
    }
    log::warn!(
        "point inversion hit the iteration cap ({}) at distance {dist:.3e}",
        settings.max_newton_iterations
    );
    uv
}

/// Global inversion: the best grid sample inside `window` seeds [`refine`].
///
/// Infinite sides of the window are replaced by a large finite extent.
pub fn position_in<S: Surface + ?Sized>(surface: &S, p: &Point3, window: &ParamBounds) -> Point2 {
    let natural = surface.natural_bounds();
    let mut b = window.intersect(&natural);
    if b.is_empty() {
        b = natural;
    }
    let b = b.clamped(UNBOUNDED_EXTENT);
    let (su, sv) = surface.safe_parameter_steps(&b);
    let us = merge_steps(su.into_iter().chain(linspace(b.umin, b.umax, SEED_GRID)), b.umin, b.umax);
    let vs = merge_steps(sv.into_iter().chain(linspace(b.vmin, b.vmax, SEED_GRID)), b.vmin, b.vmax);

    let seed = us
        .iter()
        .flat_map(|&u| vs.iter().map(move |&v| Point2::new(u, v)))
        .map(|uv| (uv, (surface.point_at(uv) - p).norm_squared()))
        .filter(|(_, d)| d.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or_else(|| b.center(), |(uv, _)| uv);
    refine(surface, p, seed)
}
