use libm::erf;
use std::f64::consts::PI;

/// Above this argument `F_0` comes from `erf` and the upward recursion is stable.
const BOYS_CROSSOVER: f64 = 30.0;

/// Boys function F_n(x) = \int_0^1 t^{2n} exp(-x t^2) dt.
pub fn boys_function(n: i32, x: f64) -> f64 {
    assert!(n >= 0, "Boys function order must be nonnegative");
    boys_sequence(n as usize, x)[n as usize]
}

/// `[F_0(x), ..., F_{n_max}(x)]` from a single evaluation.
///
/// For small arguments F_{n_max} is summed as a power series and the lower
/// orders follow from the downward recursion
/// `F_n = (2x F_{n+1} + e^{-x}) / (2n + 1)`; for large arguments F_0 comes
/// from the error function and the orders are built upwards.
pub fn boys_sequence(n_max: usize, x: f64) -> Vec<f64> {
    assert!(x >= 0.0, "x must be nonnegative");
    let ex = (-x).exp();
    let mut values = vec![0.0; n_max + 1];

    if x > BOYS_CROSSOVER {
        values[0] = 0.5 * (PI / x).sqrt() * erf(x.sqrt());
        for n in 1..=n_max {
            values[n] = ((2 * n - 1) as f64 * values[n - 1] - ex) / (2.0 * x);
        }
        return values;
    }

    let mut term = 1.0 / (2 * n_max + 1) as f64;
    let mut sum = term;
    let mut k = 1;
    while term > 1e-17 * sum {
        term *= 2.0 * x / (2 * n_max + 2 * k + 1) as f64;
        sum += term;
        k += 1;
    }
    values[n_max] = ex * sum;
    for n in (0..n_max).rev() {
        values[n] = (2.0 * x * values[n + 1] + ex) / (2 * n + 1) as f64;
    }
    values
}

/// Composite Simpson nodes and weights on `[a, b]` with `n` panels
/// (rounded up to even). Weights include the `h / 3` factor.
#[cfg(test)]
pub(crate) fn simpson_nodes(a: f64, b: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n + n % 2;
    let h = (b - a) / n as f64;
    (0..=n)
        .map(|i| {
            let w = match i {
                0 => 1.0,
                i if i == n => 1.0,
                i if i % 2 == 1 => 4.0,
                _ => 2.0,
            };
            (a + i as f64 * h, w * h / 3.0)
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn simpson_integration<F>(f: F, a: f64, b: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    simpson_nodes(a, b, n).into_iter().map(|(x, w)| w * f(x)).sum()
}

/// Tensor-product Simpson rule over the cube `[lower, upper]^3`, rows in parallel.
#[cfg(test)]
pub(crate) fn simpson_integration_3d<F>(f: F, lower: f64, upper: f64, n: usize) -> f64
where
    F: Fn(f64, f64, f64) -> f64 + Sync,
{
    use rayon::prelude::*;
    let nodes = simpson_nodes(lower, upper, n);
    nodes
        .par_iter()
        .map(|&(x, wx)| {
            let mut partial = 0.0;
            for &(y, wy) in &nodes {
                for &(z, wz) in &nodes {
                    partial += wx * wy * wz * f(x, y, z);
                }
            }
            partial
        })
        .sum()
}
