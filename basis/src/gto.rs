#![allow(non_snake_case)]
//! Primitive Cartesian Gaussians and their integrals.
//!
//! All integrals follow McMurchie–Davidson: a product of two Gaussians is
//! expanded in Hermite Gaussians (`HermiteExpansion`, one table per Cartesian
//! direction) and the Coulomb-type integrals reduce to the auxiliary
//! Hermite integrals `R_tuv` (`HermiteCoulomb`), built iteratively from a
//! single Boys-function sequence.

extern crate nalgebra as na;

use crate::basis::Basis;
use crate::helper::boys_sequence;
use itertools::iproduct;
use na::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

fn double_factorial(n: i32) -> f64 {
    (1..=n).rev().step_by(2).fold(1.0, |acc, k| acc * k as f64)
}

/// One Cartesian factor `N x^l exp(-alpha x^2)` of a primitive Gaussian.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO1d {
    pub alpha: f64,
    pub l: i32,
    pub center: f64,
    pub norm: f64,
}

impl GTO1d {
    pub fn new(alpha: f64, l: i32, center: f64) -> Self {
        // N^2 = sqrt(2 alpha / pi) (4 alpha)^l / (2l - 1)!!
        let norm = ((2.0 * alpha / PI).sqrt() * (4.0 * alpha).powi(l) / double_factorial(2 * l - 1))
            .sqrt();
        Self {
            alpha,
            l,
            center,
            norm,
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let x = x - self.center;
        self.norm * x.powi(self.l) * (-self.alpha * x * x).exp()
    }

    /// Second derivative, used to check the kinetic integrals.
    pub fn laplacian(&self, x: f64) -> f64 {
        let x = x - self.center;
        let l = self.l as f64;
        let a = self.alpha;
        let lower = if self.l >= 2 {
            l * (l - 1.0) * x.powi(self.l - 2)
        } else {
            0.0
        };
        let value = lower - 2.0 * a * (2.0 * l + 1.0) * x.powi(self.l)
            + 4.0 * a * a * x.powi(self.l + 2);
        self.norm * value * (-a * x * x).exp()
    }

    /// Overlap and kinetic integrals from one Hermite table.
    pub fn overlap_kinetic(a: &GTO1d, b: &GTO1d) -> (f64, f64) {
        let p = a.alpha + b.alpha;
        let e = HermiteExpansion::new(
            a.l as usize,
            b.l as usize + 2,
            a.alpha,
            b.alpha,
            a.center - b.center,
        );
        let prefactor = a.norm * b.norm * (PI / p).sqrt();
        let s = |j: i32| e.get(a.l, j, 0);

        let lb = b.l as f64;
        let kinetic = lb * (lb - 1.0) * s(b.l - 2) - 2.0 * b.alpha * (2.0 * lb + 1.0) * s(b.l)
            + 4.0 * b.alpha * b.alpha * s(b.l + 2);
        (prefactor * s(b.l), -0.5 * prefactor * kinetic)
    }

    pub fn Sab(a: &GTO1d, b: &GTO1d) -> f64 {
        Self::overlap_kinetic(a, b).0
    }

    pub fn Tab(a: &GTO1d, b: &GTO1d) -> f64 {
        Self::overlap_kinetic(a, b).1
    }
}

/// Hermite expansion coefficients `E^{ij}_t` of a one-dimensional Gaussian
/// product, for all `i <= i_max`, `j <= j_max`.
#[derive(Debug, Clone)]
pub struct HermiteExpansion {
    i_max: usize,
    j_max: usize,
    t_dim: usize,
    values: Vec<f64>,
}

impl HermiteExpansion {
    /// * `a`, `b` exponents of the two factors
    /// * `ab` separation `A - B` of their centres
    pub fn new(i_max: usize, j_max: usize, a: f64, b: f64, ab: f64) -> Self {
        let p = a + b;
        let x_pa = -b / p * ab;
        let x_pb = a / p * ab;
        let half_p = 0.5 / p;
        let t_dim = i_max + j_max + 1;

        let mut table = HermiteExpansion {
            i_max,
            j_max,
            t_dim,
            values: vec![0.0; (i_max + 1) * (j_max + 1) * t_dim],
        };
        table.values[0] = (-a * b / p * ab * ab).exp();

        for (i, j) in iproduct!(0..=i_max, 0..=j_max) {
            if i == 0 && j == 0 {
                continue;
            }
            // raise i along the first column, j everywhere else
            let (src, x) = if j == 0 {
                (table.offset(i - 1, 0), x_pa)
            } else {
                (table.offset(i, j - 1), x_pb)
            };
            let src_top = i + j - 1;
            let dst = table.offset(i, j);
            for t in 0..=(i + j) {
                let mut value = 0.0;
                if t > 0 {
                    value += half_p * table.values[src + t - 1];
                }
                if t <= src_top {
                    value += x * table.values[src + t];
                }
                if t < src_top {
                    value += (t + 1) as f64 * table.values[src + t + 1];
                }
                table.values[dst + t] = value;
            }
        }
        table
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        (i * (self.j_max + 1) + j) * self.t_dim
    }

    /// Zero outside `0 <= t <= i + j`.
    pub fn get(&self, i: i32, j: i32, t: i32) -> f64 {
        if i < 0 || j < 0 || t < 0 || t > i + j {
            return 0.0;
        }
        let (i, j) = (i as usize, j as usize);
        if i > self.i_max || j > self.j_max {
            return 0.0;
        }
        self.values[self.offset(i, j) + t as usize]
    }
}

/// Auxiliary Hermite Coulomb integrals `R_tuv` for `t + u + v <= l_max`.
///
/// Levels `R^n` are filled from `n = l_max` down to `n = 0` with
/// (Helgaker, Jørgensen and Olsen, eq. 9.9.18-20)
/// `R^n_{t+1,u,v} = t R^{n+1}_{t-1,u,v} + X_PC R^{n+1}_{t,u,v}`.
#[derive(Debug, Clone)]
pub struct HermiteCoulomb {
    dim: usize,
    values: Vec<f64>,
}

impl HermiteCoulomb {
    /// * `p` exponent of the (reduced) Gaussian
    /// * `pc` vector between the Gaussian centre and the Coulomb centre
    pub fn new(l_max: usize, p: f64, pc: &Vector3<f64>) -> Self {
        let dim = l_max + 1;
        let idx = |t: usize, u: usize, v: usize| (t * dim + u) * dim + v;
        let boys = boys_sequence(l_max, p * pc.norm_squared());

        let mut level = vec![0.0; dim * dim * dim];
        level[0] = (-2.0 * p).powi(l_max as i32) * boys[l_max];
        for n in (0..l_max).rev() {
            let order = l_max - n;
            let mut next = vec![0.0; dim * dim * dim];
            next[0] = (-2.0 * p).powi(n as i32) * boys[n];
            for (t, u, v) in iproduct!(0..=order, 0..=order, 0..=order) {
                let total = t + u + v;
                if total == 0 || total > order {
                    continue;
                }
                next[idx(t, u, v)] = if t > 0 {
                    let lower = if t > 1 { (t - 1) as f64 * level[idx(t - 2, u, v)] } else { 0.0 };
                    lower + pc.x * level[idx(t - 1, u, v)]
                } else if u > 0 {
                    let lower = if u > 1 { (u - 1) as f64 * level[idx(t, u - 2, v)] } else { 0.0 };
                    lower + pc.y * level[idx(t, u - 1, v)]
                } else {
                    let lower = if v > 1 { (v - 1) as f64 * level[idx(t, u, v - 2)] } else { 0.0 };
                    lower + pc.z * level[idx(t, u, v - 1)]
                };
            }
            level = next;
        }
        HermiteCoulomb { dim, values: level }
    }

    pub fn get(&self, t: usize, u: usize, v: usize) -> f64 {
        self.values[(t * self.dim + u) * self.dim + v]
    }
}

/// Product of two primitives as a Hermite Gaussian at `P`.
struct GaussianProduct {
    p: f64,
    center: Vector3<f64>,
    l_total: Vector3<usize>,
    expansions: [HermiteExpansion; 3],
}

impl GaussianProduct {
    fn new(a: &GTO, b: &GTO) -> Self {
        let p = a.alpha + b.alpha;
        let ab = a.center - b.center;
        let expansion = |k: usize| {
            HermiteExpansion::new(
                a.l_xyz[k] as usize,
                b.l_xyz[k] as usize,
                a.alpha,
                b.alpha,
                ab[k],
            )
        };
        GaussianProduct {
            p,
            center: (a.center * a.alpha + b.center * b.alpha) / p,
            l_total: (a.l_xyz + b.l_xyz).map(|l| l as usize),
            expansions: [expansion(0), expansion(1), expansion(2)],
        }
    }

    /// Non-zero Hermite coefficients `E_t E_u E_v` with their indices.
    fn coefficients(&self, a: &GTO, b: &GTO) -> Vec<((usize, usize, usize), f64)> {
        let l = self.l_total;
        iproduct!(0..=l.x, 0..=l.y, 0..=l.z)
            .filter_map(|(t, u, v)| {
                let e = self.expansions[0].get(a.l_xyz.x, b.l_xyz.x, t as i32)
                    * self.expansions[1].get(a.l_xyz.y, b.l_xyz.y, u as i32)
                    * self.expansions[2].get(a.l_xyz.z, b.l_xyz.z, v as i32);
                (e != 0.0).then_some(((t, u, v), e))
            })
            .collect()
    }

    fn order(&self) -> usize {
        self.l_total.x + self.l_total.y + self.l_total.z
    }
}

/// Normalised primitive Cartesian Gaussian
/// `N x^lx y^ly z^lz exp(-alpha |r - center|^2)`.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO {
    pub alpha: f64,
    pub l_xyz: Vector3<i32>,
    pub center: Vector3<f64>,
    pub norm: f64,
    pub gto1d: [GTO1d; 3],
}

impl GTO {
    pub fn new(alpha: f64, l_xyz: Vector3<i32>, center: Vector3<f64>) -> Self {
        let gto1d = [
            GTO1d::new(alpha, l_xyz.x, center.x),
            GTO1d::new(alpha, l_xyz.y, center.y),
            GTO1d::new(alpha, l_xyz.z, center.z),
        ];
        let norm = gto1d.iter().map(|g| g.norm).product();
        Self {
            alpha,
            l_xyz,
            center,
            norm,
            gto1d,
        }
    }

    /// Moves the primitive, keeping exponent and angular momentum.
    pub fn with_center(&self, center: Vector3<f64>) -> Self {
        GTO::new(self.alpha, self.l_xyz, center)
    }
}

impl Basis for GTO {
    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.gto1d[0].evaluate(r.x) * self.gto1d[1].evaluate(r.y) * self.gto1d[2].evaluate(r.z)
    }

    fn Sab(a: &GTO, b: &GTO) -> f64 {
        (0..3)
            .map(|k| GTO1d::Sab(&a.gto1d[k], &b.gto1d[k]))
            .product()
    }

    fn Tab(a: &GTO, b: &GTO) -> f64 {
        let st: Vec<(f64, f64)> = (0..3)
            .map(|k| GTO1d::overlap_kinetic(&a.gto1d[k], &b.gto1d[k]))
            .collect();
        let (sx, tx) = st[0];
        let (sy, ty) = st[1];
        let (sz, tz) = st[2];
        tx * sy * sz + sx * ty * sz + sx * sy * tz
    }

    fn Vab(a: &GTO, b: &GTO, R: Vector3<f64>, Z: u32) -> f64 {
        let product = GaussianProduct::new(a, b);
        let r = HermiteCoulomb::new(product.order(), product.p, &(product.center - R));
        let sum: f64 = product
            .coefficients(a, b)
            .into_iter()
            .map(|((t, u, v), e)| e * r.get(t, u, v))
            .sum();
        -(Z as f64) * 2.0 * PI / product.p * a.norm * b.norm * sum
    }

    fn JKabcd(a: &GTO, b: &GTO, c: &GTO, d: &GTO) -> f64 {
        let bra = GaussianProduct::new(a, b);
        let ket = GaussianProduct::new(c, d);
        let (p, q) = (bra.p, ket.p);
        let reduced = p * q / (p + q);
        let r = HermiteCoulomb::new(
            bra.order() + ket.order(),
            reduced,
            &(bra.center - ket.center),
        );

        let ket_coefficients = ket.coefficients(c, d);
        let sum: f64 = bra
            .coefficients(a, b)
            .into_iter()
            .map(|((t, u, v), e_ab)| {
                ket_coefficients
                    .iter()
                    .map(|&((tau, nu, phi), e_cd)| {
                        // ket Hermite functions carry (-1)^(tau + nu + phi)
                        let sign = if (tau + nu + phi) % 2 == 0 { 1.0 } else { -1.0 };
                        sign * e_cd * r.get(t + tau, u + nu, v + phi)
                    })
                    .sum::<f64>()
                    * e_ab
            })
            .sum();

        2.0 * PI.powf(2.5) / (p * q * (p + q).sqrt()) * a.norm * b.norm * c.norm * d.norm * sum
    }
}
