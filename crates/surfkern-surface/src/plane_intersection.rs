//! Generic plane intersection by marching squares, the last link of every
//! surface's plane intersection chain.
//!
//! The signed distance to the plane is sampled on a parameter grid (merged
//! with the surface's safe parameter steps). Cell edges with a sign change
//! are solved by bisection, saddle cells are resolved by the sign at the cell
//! center, and segments sharing an edge are chained into branches. Each
//! branch is interpolated in parameter space and in 3D at the same chord
//! parameters, then refined until midpoints lie within `precision`.

use std::collections::HashMap;

use surfkern_geom::{Curve2d, Curve3d, Plane};
use surfkern_math::{roots, KernelSettings, Point2, Point3, Tolerance, Vec2};
use surfkern_nurbs::{BSplineCurve, BSplineCurve2d};

use crate::sampling::{linspace, merge_steps};
use crate::surface::UNBOUNDED_EXTENT;
use crate::{DualSurfaceCurve, ParamBounds, Surface};

/// A grid edge: `H(i, j)` joins nodes `(i, j)` and `(i + 1, j)`, `V(i, j)`
/// joins `(i, j)` and `(i, j + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum EdgeKey {
    H(usize, usize),
    V(usize, usize),
}

/// `window ∩ natural_bounds`, with infinite sides replaced by a finite extent.
pub(crate) fn bounded_window<S: Surface + ?Sized>(surface: &S, window: &ParamBounds) -> ParamBounds {
    let b = window.intersect(&surface.natural_bounds());
    if b.is_bounded() {
        return b;
    }
    log::warn!("plane intersection window {b:?} is unbounded; clamped to ±{UNBOUNDED_EXTENT}");
    b.clamped(UNBOUNDED_EXTENT)
}

/// Clip the line `origin + s·dir`, `s ∈ [s_min, s_max]`, to `bounds`.
///
/// Returns the parameter range inside, or `None` when the clipped piece is
/// no longer than the linear tolerance.
pub(crate) fn clip_line(origin: Point2, dir: Vec2, bounds: &ParamBounds, s_min: f64, s_max: f64) -> Option<(f64, f64)> {
    let (mut lo, mut hi) = (s_min, s_max);
    for (o, d, min, max) in [
        (origin.x, dir.x, bounds.umin, bounds.umax),
        (origin.y, dir.y, bounds.vmin, bounds.vmax),
    ] {
        if d == 0.0 {
            if o < min || o > max {
                return None;
            }
            continue;
        }
        let (a, b) = ((min - o) / d, (max - o) / d);
        lo = lo.max(a.min(b));
        hi = hi.min(a.max(b));
    }
    ((hi - lo) * dir.norm() > Tolerance::current().linear).then_some((lo, hi))
}

fn chord_params(points: &[Point3]) -> Vec<f64> {
    let mut acc = vec![0.0];
    for w in points.windows(2) {
        let last = acc[acc.len() - 1];
        acc.push(last + (w[1] - w[0]).norm());
    }
    let total = acc[acc.len() - 1];
    if total > 0.0 {
        acc.iter_mut().for_each(|x| *x /= total);
    }
    acc
}

/// Move `uv` onto the zero set of the plane distance by Newton steps along
/// the parameter gradient.
fn settle<S: Surface + ?Sized>(surface: &S, plane: &Plane, uv: Point2) -> Point2 {
    let settings = KernelSettings::current();
    let n = plane.normal();
    let mut uv = uv;
    for _ in 0..settings.max_newton_iterations {
        let d = surface.derivatives2(uv);
        let f = plane.signed_distance(&d.point);
        if f.abs() <= settings.tolerance.linear * 1e-3 {
            break;
        }
        let g = Vec2::new(n.dot(&d.du), n.dot(&d.dv));
        let g2 = g.norm_squared();
        if g2 < 1e-300 {
            break;
        }
        uv -= g * (f / g2);
    }
    uv
}

struct Grid<'a, S: Surface + ?Sized> {
    surface: &'a S,
    plane: &'a Plane,
    us: Vec<f64>,
    vs: Vec<f64>,
    values: Vec<Vec<f64>>,
}

impl<S: Surface + ?Sized> Grid<'_, S> {
    fn distance(&self, uv: Point2) -> f64 {
        self.plane.signed_distance(&self.surface.point_at(uv))
    }

    fn positive(&self, i: usize, j: usize) -> bool {
        self.values[i][j] >= 0.0
    }

    fn node(&self, i: usize, j: usize) -> Point2 {
        Point2::new(self.us[i], self.vs[j])
    }

    fn edge_point(&self, key: EdgeKey) -> Point2 {
        let (a, b) = match key {
            EdgeKey::H(i, j) => (self.node(i, j), self.node(i + 1, j)),
            EdgeKey::V(i, j) => (self.node(i, j), self.node(i, j + 1)),
        };
        let at = |s: f64| a + (b - a) * s;
        let s = roots::bisect(0.0, 1.0, 1e-14, 200, |s| self.distance(at(s))).unwrap_or(0.5);
        at(s)
    }

    /// Contour segments of every cell, as pairs of crossed edges.
    fn segments(&self) -> Vec<(EdgeKey, EdgeKey)> {
        let mut out = Vec::new();
        for i in 0..self.us.len() - 1 {
            for j in 0..self.vs.len() - 1 {
                let s = [
                    self.positive(i, j),
                    self.positive(i + 1, j),
                    self.positive(i + 1, j + 1),
                    self.positive(i, j + 1),
                ];
                let bottom = EdgeKey::H(i, j);
                let right = EdgeKey::V(i + 1, j);
                let top = EdgeKey::H(i, j + 1);
                let left = EdgeKey::V(i, j);
                let crossed: Vec<EdgeKey> = [(bottom, s[0] != s[1]), (right, s[1] != s[2]), (top, s[3] != s[2]), (left, s[0] != s[3])]
                    .into_iter()
                    .filter_map(|(e, c)| c.then_some(e))
                    .collect();
                match crossed.len() {
                    2 => out.push((crossed[0], crossed[1])),
                    4 => {
                        let center = Point2::new(0.5 * (self.us[i] + self.us[i + 1]), 0.5 * (self.vs[j] + self.vs[j + 1]));
                        if (self.distance(center) >= 0.0) == s[0] {
                            out.push((bottom, right));
                            out.push((top, left));
                        } else {
                            out.push((bottom, left));
                            out.push((right, top));
                        }
                    }
                    _ => {}
                }
            }
        }
        out
    }
}

/// Chain segments sharing an edge. Open chains come first, then loops.
fn chain_segments(segments: &[(EdgeKey, EdgeKey)]) -> Vec<Vec<EdgeKey>> {
    let mut by_edge: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
    for (k, (a, b)) in segments.iter().enumerate() {
        by_edge.entry(*a).or_default().push(k);
        by_edge.entry(*b).or_default().push(k);
    }
    let mut ends: Vec<EdgeKey> = by_edge
        .iter()
        .filter(|(_, segs)| segs.len() == 1)
        .map(|(e, _)| *e)
        .collect();
    ends.sort();

    let mut used = vec![false; segments.len()];
    let walk = |start: EdgeKey, first: usize, used: &mut [bool]| {
        let mut chain = vec![start];
        let (mut edge, mut seg) = (start, first);
        loop {
            used[seg] = true;
            let (a, b) = segments[seg];
            edge = if a == edge { b } else { a };
            chain.push(edge);
            match by_edge[&edge].iter().find(|&&s| !used[s]) {
                Some(&s) => seg = s,
                None => break,
            }
        }
        chain
    };

    let mut chains = Vec::new();
    for start in ends {
        let first = by_edge[&start][0];
        if !used[first] {
            chains.push(walk(start, first, &mut used));
        }
    }
    for k in 0..segments.len() {
        if !used[k] {
            chains.push(walk(segments[k].0, k, &mut used));
        }
    }
    chains
}

/// Interpolate one branch and refine it until midpoints meet `precision`.
fn build_branch<S: Surface + ?Sized>(surface: &S, plane: &Plane, uvs: Vec<Point2>, precision: f64) -> Option<DualSurfaceCurve> {
    let max_samples = KernelSettings::current().max_refinement_samples;
    let mut uvs = uvs;
    let merge = 1e-3 * Tolerance::current().linear;
    uvs.dedup_by(|a, b| (surface.point_at(*a) - surface.point_at(*b)).norm() <= merge);
    loop {
        if uvs.len() < 2 {
            return None;
        }
        let points: Vec<Point3> = uvs.iter().map(|uv| surface.point_at(*uv)).collect();
        let params = chord_params(&points);
        let c2 = BSplineCurve2d::interpolate(&uvs, &params, 3).ok()?;
        let c3 = BSplineCurve::interpolate(&points, &params, 3).ok()?;

        let inserts: Vec<(usize, Point2)> = params
            .windows(2)
            .enumerate()
            .filter_map(|(k, w)| {
                let tm = 0.5 * (w[0] + w[1]);
                let uv = c2.point_at(tm);
                let q = surface.point_at(uv);
                let off = (q - c3.point_at(tm)).norm().max(plane.signed_distance(&q).abs());
                (off > precision).then(|| (k + 1, settle(surface, plane, uv)))
            })
            .collect();

        if inserts.is_empty() || uvs.len() + inserts.len() > max_samples {
            if !inserts.is_empty() {
                log::debug!("plane intersection branch kept {} samples above {precision:e}", inserts.len());
            }
            let on_plane = c3.project_to_plane(plane);
            return Some(DualSurfaceCurve::new(
                Box::new(c3),
                surface.clone_box(),
                Box::new(c2),
                plane.clone_box(),
                on_plane,
            ));
        }
        for (index, uv) in inserts.into_iter().rev() {
            uvs.insert(index, uv);
        }
    }
}

/// Intersect `surface` with `plane` inside `window` numerically.
pub fn march<S: Surface + ?Sized>(surface: &S, plane: &Plane, window: &ParamBounds, precision: f64) -> Vec<DualSurfaceCurve> {
    if window.intersect(&surface.natural_bounds()).is_empty() {
        return Vec::new();
    }
    let b = bounded_window(surface, window);
    let n = KernelSettings::current().intersection_grid;
    let (su, sv) = surface.safe_parameter_steps(&b);
    let us = merge_steps(su.into_iter().chain(linspace(b.umin, b.umax, n)), b.umin, b.umax);
    let vs = merge_steps(sv.into_iter().chain(linspace(b.vmin, b.vmax, n)), b.vmin, b.vmax);
    if us.len() < 2 || vs.len() < 2 {
        return Vec::new();
    }
    let values = us
        .iter()
        .map(|&u| {
            vs.iter()
                .map(|&v| plane.signed_distance(&surface.point_at(Point2::new(u, v))))
                .collect()
        })
        .collect();
    let grid = Grid {
        surface,
        plane,
        us,
        vs,
        values,
    };

    let segments = grid.segments();
    let mut cache: HashMap<EdgeKey, Point2> = HashMap::new();
    let branches: Vec<DualSurfaceCurve> = chain_segments(&segments)
        .into_iter()
        .filter_map(|chain| {
            let uvs = chain
                .iter()
                .map(|e| *cache.entry(*e).or_insert_with(|| grid.edge_point(*e)))
                .collect();
            build_branch(surface, plane, uvs, precision)
        })
        .collect();
    log::trace!("marching intersection: {} segments, {} branches", segments.len(), branches.len());
    branches
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clip_line_to_rectangle() {
        let b = ParamBounds::new(0.0, 1.0, 0.0, 1.0);
        let (s0, s1) = clip_line(Point2::new(-1.0, 0.5), Vec2::new(1.0, 0.0), &b, f64::NEG_INFINITY, f64::INFINITY).unwrap();
        assert_relative_eq!(s0, 1.0);
        assert_relative_eq!(s1, 2.0);
        assert!(clip_line(Point2::new(-1.0, 2.0), Vec2::new(1.0, 0.0), &b, f64::NEG_INFINITY, f64::INFINITY).is_none());
        assert!(clip_line(Point2::new(0.5, 0.5), Vec2::new(1.0, 1.0), &b, 0.6, 1.0).is_none());
    }

    #[test]
    fn test_clip_line_drops_pieces_below_tolerance() {
        let b = ParamBounds::new(0.0, 1.0, 0.0, 1.0);
        // Only 1e-8 of the line lies inside
        let sliver = || clip_line(Point2::new(1.0 - 1e-8, 0.5), Vec2::new(1.0, 0.0), &b, 0.0, 1.0);
        assert!(sliver().is_none());
        let _guard = Tolerance::new(1e-10, 1e-10).scoped();
        let (s0, s1) = sliver().unwrap();
        assert_relative_eq!(s1 - s0, 1e-8, epsilon = 1e-12);
    }

    #[test]
    fn test_chain_joins_open_and_closed_runs() {
        use EdgeKey::{H, V};
        // An open run of two segments and a separate closed loop of three
        let segs = vec![(H(0, 0), V(1, 0)), (V(1, 0), H(1, 1)), (H(5, 5), V(6, 5)), (V(6, 5), H(5, 6)), (H(5, 6), H(5, 5))];
        let chains = chain_segments(&segs);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].len(), 3);
        assert_eq!(chains[1].first(), chains[1].last());
    }

    #[test]
    fn test_march_plane_plane_is_straight() {
        let surface = Plane::xy();
        let cut = Plane::from_normal(Point3::new(0.3, 0.0, 0.0), cut_normal());
        let window = ParamBounds::new(-1.0, 1.0, -1.0, 1.0);
        let hits = march(&surface, &cut, &window, 1e-7);
        assert_eq!(hits.len(), 1);
        let c = hits[0].curve3d();
        for t in [0.0, 0.3, 0.7, 1.0] {
            assert!(cut.signed_distance(&c.point_at(t)).abs() < 1e-7);
            assert!(c.point_at(t).z.abs() < 1e-12);
        }
        assert!(hits[0].max_deviation(16) < 1e-7);
    }

    fn cut_normal() -> surfkern_math::Vec3 {
        surfkern_math::Vec3::new(1.0, 0.2, 0.5)
    }
}
