//! Natural cubic spline interpolation with first and second derivatives.
//!
//! Used by the departing-state handler (spec §4.2.2) to fit altitude over
//! elapsed-seconds-since-departure and find where the climb rate (the
//! spline's first derivative) crosses zero. This is a different shape than
//! the teacher's `geometry::spline` Catmull-Rom curve (which smooths a 2D/3D
//! geographic path for display) — a 1D natural cubic spline solved with the
//! standard tridiagonal (Thomas) algorithm, textbook numerics with no
//! external dependency, matching the teacher's habit of hand-rolling its own
//! geometry rather than reaching for a numerics crate.

use crate::error::{AerostateError, Result};

/// A natural cubic spline interpolator: `f(t)`, `f'(t)`, `f''(t)` at arbitrary `t`.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot, solved under the natural boundary
    /// condition (`m[0] == m[n-1] == 0`).
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit a natural cubic spline through `xs`/`ys`.
    ///
    /// `xs` must be strictly increasing and at least 2 samples must be
    /// supplied, matching spec §4.1.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return Err(AerostateError::InsufficientSamples(xs.len().min(ys.len())));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AerostateError::NonMonotonicSamples);
        }

        let n = xs.len();
        let m = solve_second_derivatives(xs, ys, n);

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            m,
        })
    }

    /// Index `i` such that `t` falls in segment `[xs[i], xs[i+1]]`, clamped
    /// to the first/last segment when `t` is outside the fitted range.
    fn segment(&self, t: f64) -> usize {
        let n = self.xs.len();
        if t <= self.xs[0] {
            return 0;
        }
        if t >= self.xs[n - 1] {
            return n - 2;
        }
        // First index with xs[idx] > t, then back up one.
        let idx = self.xs.partition_point(|&x| x <= t);
        idx.saturating_sub(1).min(n - 2)
    }

    /// Interpolated value at `t`.
    pub fn f(&self, t: f64) -> f64 {
        let i = self.segment(t);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - t) / h;
        let b = (t - self.xs[i]) / h;
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a.powi(3) - a) * self.m[i] + (b.powi(3) - b) * self.m[i + 1]) * h * h / 6.0
    }

    /// First derivative at `t`.
    pub fn df(&self, t: f64) -> f64 {
        let i = self.segment(t);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - t) / h;
        let b = (t - self.xs[i]) / h;
        (self.ys[i + 1] - self.ys[i]) / h - (3.0 * a * a - 1.0) / 6.0 * h * self.m[i]
            + (3.0 * b * b - 1.0) / 6.0 * h * self.m[i + 1]
    }

    /// Second derivative at `t`.
    pub fn d2f(&self, t: f64) -> f64 {
        let i = self.segment(t);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - t) / h;
        let b = (t - self.xs[i]) / h;
        a * self.m[i] + b * self.m[i + 1]
    }
}

/// Solve the tridiagonal system for natural-boundary second derivatives.
fn solve_second_derivatives(xs: &[f64], ys: &[f64], n: usize) -> Vec<f64> {
    if n == 2 {
        return vec![0.0, 0.0];
    }

    let h: Vec<f64> = (0..n - 1).map(|i| xs[i + 1] - xs[i]).collect();

    // Interior unknowns m[1..n-2], tridiagonal system of size n-2.
    let interior = n - 2;
    let mut sub = vec![0.0; interior]; // sub-diagonal
    let mut diag = vec![0.0; interior];
    let mut sup = vec![0.0; interior]; // super-diagonal
    let mut rhs = vec![0.0; interior];

    for k in 0..interior {
        let i = k + 1;
        sub[k] = h[i - 1];
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        sup[k] = h[i];
        rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
    }

    let interior_m = thomas_solve(&sub, &diag, &sup, &rhs);

    let mut m = vec![0.0; n];
    for (k, value) in interior_m.into_iter().enumerate() {
        m[k + 1] = value;
    }
    m
}

/// Thomas algorithm for a tridiagonal system `A x = d`.
fn thomas_solve(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    c_prime[0] = sup[0] / diag[0];
    d_prime[0] = rhs[0] / diag[0];

    for i in 1..n {
        let denom = diag[i] - sub[i] * c_prime[i - 1];
        c_prime[i] = sup[i] / denom;
        d_prime[i] = (rhs[i] - sub[i] * d_prime[i - 1]) / denom;
    }

    let mut x = vec![0.0; n];
    x[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d_prime[i] - c_prime[i] * x[i + 1];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_fewer_than_two_samples() {
        assert_eq!(
            CubicSpline::fit(&[1.0], &[1.0]),
            Err(AerostateError::InsufficientSamples(1))
        );
        assert_eq!(
            CubicSpline::fit(&[], &[]),
            Err(AerostateError::InsufficientSamples(0))
        );
    }

    #[test]
    fn rejects_non_increasing_xs() {
        assert_eq!(
            CubicSpline::fit(&[0.0, 1.0, 1.0], &[0.0, 1.0, 2.0]),
            Err(AerostateError::NonMonotonicSamples)
        );
        assert_eq!(
            CubicSpline::fit(&[0.0, 2.0, 1.0], &[0.0, 1.0, 2.0]),
            Err(AerostateError::NonMonotonicSamples)
        );
    }

    #[test]
    fn two_points_interpolates_linearly() {
        let s = CubicSpline::fit(&[0.0, 10.0], &[0.0, 100.0]).unwrap();
        assert!((s.f(5.0) - 50.0).abs() < 1e-9);
        assert!((s.df(5.0) - 10.0).abs() < 1e-9);
        assert!(s.d2f(5.0).abs() < 1e-9);
    }

    #[test]
    fn passes_through_knots() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [0.0, 1.0, 4.0, 9.0, 16.0]; // x^2
        let s = CubicSpline::fit(&xs, &ys).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((s.f(*x) - *y).abs() < 1e-6, "x={x}");
        }
    }

    #[test]
    fn derivative_crosses_zero_at_climb_apex() {
        // Altitude climbs then flattens: derivative should go from positive to ~0.
        let xs = [0.0, 2.0, 4.0, 6.0, 8.0];
        let ys = [0.0, 150.0, 300.0, 380.0, 400.0];
        let s = CubicSpline::fit(&xs, &ys).unwrap();
        assert!(s.df(1.0) > 0.0);
        assert!(s.df(8.0) < s.df(1.0));
    }

    #[test]
    fn extrapolates_beyond_fitted_range_using_boundary_segment() {
        let s = CubicSpline::fit(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]).unwrap();
        // Well-behaved (near-linear) data extrapolates sanely just outside the range.
        assert!(s.f(-0.1) < 0.0);
        assert!(s.f(2.1) > 2.0);
    }
}
