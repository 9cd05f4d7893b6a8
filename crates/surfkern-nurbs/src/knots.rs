//! Knot vector algorithms shared by the 2D and 3D curves.
//!
//! Control points are handled as plain coordinate vectors (`SVector<f64, D>`)
//! so the same code serves both dimensions.

use nalgebra::{DMatrix, SVector};
use surfkern_geom::{GeomError, Result};

/// Control point coordinates in `D` dimensions.
pub(crate) type Coords<const D: usize> = SVector<f64, D>;

/// Knots closer than this to a requested parameter are reused instead of
/// inserting a near-duplicate.
const KNOT_SNAP: f64 = 1e-12;

/// Validate a clamped knot vector and rescale it to the domain `[0, 1]`.
pub(crate) fn normalized_knots(knots: &[f64], n_points: usize, degree: usize) -> Result<Vec<f64>> {
    if degree == 0 {
        return Err(GeomError::Degenerate("B-spline degree must be at least 1".into()));
    }
    let expected = n_points + degree + 1;
    if knots.len() != expected || n_points < degree + 1 {
        return Err(GeomError::InvalidKnots {
            len: knots.len(),
            expected,
            n_points,
            degree,
        });
    }
    if knots.windows(2).any(|w| !(w[1] >= w[0])) {
        return Err(GeomError::InvalidKnots {
            len: knots.len(),
            expected,
            n_points,
            degree,
        });
    }
    let (lo, hi) = (knots[0], knots[knots.len() - 1]);
    let clamped = knots[..=degree].iter().all(|&k| k == lo)
        && knots[knots.len() - 1 - degree..].iter().all(|&k| k == hi);
    if !clamped {
        return Err(GeomError::NotClamped { degree });
    }
    if !(hi > lo) {
        return Err(GeomError::Degenerate("empty knot domain".into()));
    }
    Ok(knots.iter().map(|&k| (k - lo) / (hi - lo)).collect())
}

/// Clamped uniform knot vector on `[0, 1]`.
pub(crate) fn clamped_uniform_knots(n_points: usize, degree: usize) -> Vec<f64> {
    let m = n_points + degree + 1;
    let n_internal = m.saturating_sub(2 * (degree + 1));
    let mut knots = vec![0.0; m];
    for i in 0..=degree {
        knots[m - 1 - i] = 1.0;
    }
    for i in 1..=n_internal {
        knots[degree + i] = i as f64 / (n_internal + 1) as f64;
    }
    knots
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to the valid
/// range. `n` is the last control point index.
pub(crate) fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Number of knots exactly equal to `t`.
pub(crate) fn multiplicity(knots: &[f64], t: f64) -> usize {
    knots.iter().filter(|&&k| k == t).count()
}

/// Non-zero basis functions and their first `n_derivs` derivatives at `t`.
///
/// `ders[k][j]` is the k-th derivative of `N_{span-degree+j}`. Derivatives of
/// order above `degree` are zero.
pub(crate) fn basis_derivatives(knots: &[f64], span: usize, degree: usize, t: f64, n_derivs: usize) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            // Lower triangle stores knot differences
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = if ndu[j][r].abs() < 1e-300 {
                0.0
            } else {
                ndu[r][j - 1] / ndu[j][r]
            };
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; n_derivs + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let top = n_derivs.min(p);
    let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
    for r in 0..=p {
        let (mut s1, mut s2) = (0, 1);
        a[0][0] = 1.0;
        for k in 1..=top {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if rk >= 0 {
                a[s2][0] = a[s1][0] / ndu[pk + 1][rk as usize];
                d = a[s2][0] * ndu[rk as usize][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r <= pk + 1 { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                d += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for (k, row) in ders.iter_mut().enumerate().skip(1).take(top) {
        for v in row.iter_mut() {
            *v *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

/// Point and first two derivatives of the curve at `t` (clamped to `[0, 1]`).
pub(crate) fn evaluate<const D: usize>(cps: &[Coords<D>], knots: &[f64], degree: usize, t: f64) -> [Coords<D>; 3] {
    let n = cps.len() - 1;
    let t = t.clamp(knots[degree], knots[n + 1]);
    let span = find_span(knots, n, degree, t);
    let ders = basis_derivatives(knots, span, degree, t, 2);
    let mut out = [Coords::<D>::zeros(); 3];
    for (k, row) in ders.iter().enumerate() {
        for (j, &b) in row.iter().enumerate() {
            out[k] += b * cps[span - degree + j];
        }
    }
    out
}

/// Insert `t` once using Boehm's algorithm. Returns the new control points
/// and knots describing the same curve.
pub(crate) fn insert_knot<const D: usize>(
    cps: &[Coords<D>],
    knots: &[f64],
    degree: usize,
    t: f64,
) -> (Vec<Coords<D>>, Vec<f64>) {
    let n = cps.len() - 1;
    let p = degree;
    let span = find_span(knots, n, p, t);
    let s = multiplicity(knots, t).min(p);

    let mut new_knots = Vec::with_capacity(knots.len() + 1);
    new_knots.extend_from_slice(&knots[..=span]);
    new_knots.push(t);
    new_knots.extend_from_slice(&knots[span + 1..]);

    let mut new_pts = Vec::with_capacity(cps.len() + 1);
    new_pts.extend_from_slice(&cps[..=span - p]);
    for i in (span - p + 1)..=(span - s) {
        let alpha = (t - knots[i]) / (knots[i + p] - knots[i]);
        new_pts.push((1.0 - alpha) * cps[i - 1] + alpha * cps[i]);
    }
    new_pts.extend_from_slice(&cps[span - s..]);

    (new_pts, new_knots)
}

/// Knot value to use for `t`: an existing knot within snapping distance, or `t`.
fn snapped(knots: &[f64], t: f64) -> f64 {
    knots
        .iter()
        .copied()
        .find(|k| (k - t).abs() <= KNOT_SNAP)
        .unwrap_or(t)
}

/// Control points and knots of the piece over `[a, b]` with `0 <= a <= b <= 1`,
/// reparameterized to `[0, 1]`.
pub(crate) fn extract<const D: usize>(
    cps: &[Coords<D>],
    knots: &[f64],
    degree: usize,
    a: f64,
    b: f64,
) -> (Vec<Coords<D>>, Vec<f64>) {
    let a = snapped(knots, a);
    let b = snapped(knots, b);
    if b <= a {
        // Zero-length piece: a constant curve at the point
        let [p, _, _] = evaluate(cps, knots, degree, a);
        let n = degree + 1;
        return (vec![p; n], clamped_uniform_knots(n, degree));
    }

    let (mut pts, mut ks) = (cps.to_vec(), knots.to_vec());
    for value in [a, b] {
        while multiplicity(&ks, value) < degree + 1 {
            let (np, nk) = insert_knot(&pts, &ks, degree, value);
            pts = np;
            ks = nk;
        }
    }
    let first = |v: f64| ks.iter().position(|&k| k == v).unwrap_or(0);
    let (fa, fb) = (first(a), first(b));
    let sub_knots: Vec<f64> = ks[fa..=fb + degree].iter().map(|&k| (k - a) / (b - a)).collect();
    (pts[fa..fb].to_vec(), sub_knots)
}

/// The same curve traversed backwards.
pub(crate) fn reverse<const D: usize>(cps: &[Coords<D>], knots: &[f64]) -> (Vec<Coords<D>>, Vec<f64>) {
    let pts = cps.iter().rev().copied().collect();
    let ks = knots.iter().rev().map(|&k| 1.0 - k).collect();
    (pts, ks)
}

/// Chord-length parameters for `points`, normalized to `[0, 1]`.
pub(crate) fn chord_parameters<const D: usize>(points: &[Coords<D>]) -> Vec<f64> {
    let mut params = Vec::with_capacity(points.len());
    let mut acc = 0.0;
    params.push(0.0);
    for w in points.windows(2) {
        acc += (w[1] - w[0]).norm();
        params.push(acc);
    }
    if acc > 0.0 {
        for p in params.iter_mut() {
            *p /= acc;
        }
    } else {
        let n = (points.len().max(2) - 1) as f64;
        for (i, p) in params.iter_mut().enumerate() {
            *p = i as f64 / n;
        }
    }
    params
}

/// Global interpolation through `points` at the given increasing parameters.
///
/// Knots are placed by averaging the parameters. The degree is lowered when
/// there are too few points. Returns control points, knots and degree.
pub(crate) fn interpolate<const D: usize>(
    points: &[Coords<D>],
    params: &[f64],
    degree: usize,
) -> Result<(Vec<Coords<D>>, Vec<f64>, usize)> {
    let n = points.len();
    if n < 2 || params.len() != n {
        return Err(GeomError::Interpolation(format!(
            "need at least 2 points with one parameter each, got {} points and {} parameters",
            n,
            params.len()
        )));
    }
    let p = degree.clamp(1, n - 1);
    let (t0, t1) = (params[0], params[n - 1]);
    if !(t1 > t0) {
        return Err(GeomError::Interpolation("parameters must increase".into()));
    }
    let u: Vec<f64> = params.iter().map(|&t| (t - t0) / (t1 - t0)).collect();
    if u.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(GeomError::Interpolation("parameters must be strictly increasing".into()));
    }

    let mut knots = vec![0.0; n + p + 1];
    for k in knots.iter_mut().rev().take(p + 1) {
        *k = 1.0;
    }
    for j in 1..n - p {
        knots[j + p] = u[j..j + p].iter().sum::<f64>() / p as f64;
    }

    let mut a = DMatrix::<f64>::zeros(n, n);
    for (row, &t) in u.iter().enumerate() {
        let span = find_span(&knots, n - 1, p, t);
        let basis = &basis_derivatives(&knots, span, p, t, 0)[0];
        for (j, &b) in basis.iter().enumerate() {
            a[(row, span - p + j)] = b;
        }
    }
    let rhs = DMatrix::<f64>::from_fn(n, D, |r, c| points[r][c]);
    let solution = a
        .lu()
        .solve(&rhs)
        .ok_or_else(|| GeomError::Interpolation("singular collocation matrix".into()))?;
    let cps = (0..n)
        .map(|r| Coords::<D>::from_fn(|c, _| solution[(r, c)]))
        .collect();
    Ok((cps, knots, p))
}
