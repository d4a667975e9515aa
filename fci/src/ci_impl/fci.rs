//! Determinant-based full CI in a fixed `(n_alpha, n_beta)` sector
//!
//! The Hamiltonian is written with spin-summed excitation operators
//! `E_pq = a+_{p alpha} a_{q alpha} + a+_{p beta} a_{q beta}`:
//!
//! ```text
//! H = sum_pq k_pq E_pq + 1/2 sum_pqrs (pq|rs) E_pq E_rs,   k_pq = h_pq - 1/2 sum_r (pr|rq)
//! ```
//!
//! and `sigma = H c` is built in three passes over the string single-replacement lists:
//! `D_rs(K) = <K|E_rs|c>`, then `G_pq(K) = sum_rs (pq|rs) D_rs(K)`, then
//! `sigma(J) = sum_pq k_pq D_pq(J) + 1/2 sum_pq <J|E_pq|G_pq>`.

extern crate nalgebra as na;

use super::davidson::{diagonal_guess, lowest_diagonal, Davidson, DavidsonEngine};
use crate::fock_space::{annihilate, create, occupied, Bitstring, FockSector, SpinOperators};
use crate::integrals::{ActiveSpace, EriTensor};
use color_eyre::eyre::{eyre, Result, WrapErr};
use na::{DMatrix, DVector};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::info;

/// Solver controls for the CI step.
#[derive(Debug, Clone)]
pub struct FciSettings {
    pub n_roots: usize,
    /// spaces up to this dimension are diagonalised densely
    pub dense_threshold: usize,
    pub davidson_tolerance: f64,
    pub max_iterations: usize,
    pub subspace_multiplier: usize,
    /// determinants in the dense space that seeds Davidson; 0 starts from unit vectors
    pub guess_space: usize,
}

impl Default for FciSettings {
    fn default() -> Self {
        FciSettings {
            n_roots: 2,
            dense_threshold: 400,
            davidson_tolerance: 1e-6,
            max_iterations: 200,
            subspace_multiplier: 20,
            guess_space: 400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagonalizer {
    Dense,
    Davidson,
}

/// Roots of one FCI calculation, ascending.
#[derive(Debug, Clone)]
pub struct FciResult {
    /// total energies, core energy included
    pub energies: Vec<f64>,
    pub vectors: Vec<DVector<f64>>,
    /// `<S^2>` of each root
    pub s_squared: Vec<f64>,
    pub dimension: usize,
    pub diagonalizer: Diagonalizer,
}

pub struct FCI {
    pub sector: FockSector,
    pub n_orb: usize,
    pub core_energy: f64,
    h: DMatrix<f64>,
    /// `k_pq` flattened as `p * n + q`
    k: DVector<f64>,
    /// `(pq|rs)` as an `n^2 x n^2` matrix
    eri_matrix: DMatrix<f64>,
    diagonal: DVector<f64>,
    eri: EriTensor,
    settings: FciSettings,
}

impl FCI {
    pub fn new(active: &ActiveSpace, settings: FciSettings) -> Self {
        Self::from_integrals(
            active.h_eff.clone(),
            active.eri.clone(),
            active.core_energy,
            active.n_alpha,
            active.n_beta,
            settings,
        )
    }

    pub fn from_integrals(
        h: DMatrix<f64>,
        eri: EriTensor,
        core_energy: f64,
        n_alpha: usize,
        n_beta: usize,
        settings: FciSettings,
    ) -> Self {
        let n = h.nrows();
        let sector = FockSector::new(n, n_alpha, n_beta);

        let k = DVector::from_fn(n * n, |pq, _| {
            let (p, q) = (pq / n, pq % n);
            h[(p, q)] - 0.5 * (0..n).map(|r| eri.get(p, r, r, q)).sum::<f64>()
        });
        let eri_matrix = DMatrix::from_fn(n * n, n * n, |rs, pq| {
            eri.get(pq / n, pq % n, rs / n, rs % n)
        });

        let mut fci = FCI {
            sector,
            n_orb: n,
            core_energy,
            h,
            k,
            eri_matrix,
            diagonal: DVector::zeros(0),
            eri,
            settings,
        };
        fci.diagonal = fci.compute_diagonal();

        info!("===========================================");
        info!("        FCI Initialization");
        info!("===========================================");
        info!("Active orbitals: {}", n);
        info!("Active electrons: {} alpha, {} beta", n_alpha, n_beta);
        info!(
            "Alpha strings: {}, beta strings: {}, determinants: {}",
            fci.sector.alpha.len(),
            fci.sector.beta.len(),
            fci.sector.dim()
        );
        info!("Core energy: {:.10} Eh", core_energy);
        info!("===========================================");

        fci
    }

    pub fn dim(&self) -> usize {
        self.sector.dim()
    }

    /// Slater-Condon diagonal `<I|H|I>` without the core energy.
    fn compute_diagonal(&self) -> DVector<f64> {
        let n = self.n_orb;
        let values: Vec<f64> = (0..self.dim())
            .into_par_iter()
            .map(|i| {
                let (ia, ib) = self.sector.determinant(i);
                let alpha: Vec<usize> = occupied(ia, n).collect();
                let beta: Vec<usize> = occupied(ib, n).collect();
                let mut energy = 0.0;
                for occ in [&alpha, &beta] {
                    for &p in occ.iter() {
                        energy += self.h[(p, p)];
                        for &q in occ.iter() {
                            energy += 0.5 * (self.eri.get(p, p, q, q) - self.eri.get(p, q, q, p));
                        }
                    }
                }
                for &p in &alpha {
                    for &q in &beta {
                        energy += self.eri.get(p, p, q, q);
                    }
                }
                energy
            })
            .collect();
        DVector::from_vec(values)
    }

    /// `D[K][rs] = <K|E_rs|c>`, rows are determinants.
    fn excitation_density(&self, c: &[f64]) -> DMatrix<f64> {
        let n2 = self.n_orb * self.n_orb;
        let n_beta = self.sector.beta.len();
        let mut d = vec![0.0; self.dim() * n2];
        d.par_chunks_mut(n2).enumerate().for_each(|(k, row)| {
            let (ka, kb) = (k / n_beta, k % n_beta);
            // <K|E_rs|L> = <L|E_sr|K>: walk the excitations of K
            for ex in self.sector.alpha.singles(ka) {
                row[ex.q * self.n_orb + ex.p] += ex.sign * c[ex.target * n_beta + kb];
            }
            for ex in self.sector.beta.singles(kb) {
                row[ex.q * self.n_orb + ex.p] += ex.sign * c[ka * n_beta + ex.target];
            }
        });
        DMatrix::from_row_slice(self.dim(), n2, &d)
    }

    /// `sigma = H c` (core energy excluded).
    pub fn sigma(&self, c: &DVector<f64>) -> DVector<f64> {
        let n_beta = self.sector.beta.len();
        let d = self.excitation_density(c.as_slice());
        let g = &d * &self.eri_matrix;
        let one_body = &d * &self.k;

        let values: Vec<f64> = (0..self.dim())
            .into_par_iter()
            .map(|j| {
                let (ja, jb) = (j / n_beta, j % n_beta);
                let mut value = one_body[j];
                for ex in self.sector.alpha.singles(ja) {
                    value += 0.5 * ex.sign * g[(ex.target * n_beta + jb, ex.q * self.n_orb + ex.p)];
                }
                for ex in self.sector.beta.singles(jb) {
                    value += 0.5 * ex.sign * g[(ja * n_beta + ex.target, ex.q * self.n_orb + ex.p)];
                }
                value
            })
            .collect();
        DVector::from_vec(values)
    }

    /// `<I|H|J>` (core energy excluded) from the Slater-Condon rules.
    pub fn matrix_element(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return self.diagonal[i];
        }
        let (ia, ib) = self.sector.determinant(i);
        let (ja, jb) = self.sector.determinant(j);
        let alpha_degree = (ia ^ ja).count_ones() / 2;
        let beta_degree = (ib ^ jb).count_ones() / 2;
        match (alpha_degree, beta_degree) {
            (1, 0) => self.single_element(ia, ja, ja, jb),
            (0, 1) => self.single_element(ib, jb, jb, ja),
            (2, 0) => self.same_spin_double(ia, ja),
            (0, 2) => self.same_spin_double(ib, jb),
            (1, 1) => {
                let (q, p) = replacement(ja, ia);
                let (r, t) = replacement(jb, ib);
                match (excite(ja, q, p), excite(jb, r, t)) {
                    (Some((_, sa)), Some((_, sb))) => sa * sb * self.eri.get(p, q, t, r),
                    _ => 0.0,
                }
            }
            _ => 0.0,
        }
    }

    /// `<I|H|J>` for `I` one replacement away from `J` in the spin of
    /// `from`/`to`; `same` and `other` are the occupations of `J`.
    fn single_element(&self, to: Bitstring, from: Bitstring, same: Bitstring, other: Bitstring) -> f64 {
        let (q, p) = replacement(from, to);
        let Some((_, sign)) = excite(from, q, p) else {
            return 0.0;
        };
        let mut value = self.h[(p, q)];
        for k in occupied(same, self.n_orb) {
            value += self.eri.get(p, q, k, k) - self.eri.get(p, k, k, q);
        }
        for k in occupied(other, self.n_orb) {
            value += self.eri.get(p, q, k, k);
        }
        sign * value
    }

    fn same_spin_double(&self, to: Bitstring, from: Bitstring) -> f64 {
        let holes: Vec<usize> = occupied(from & !to, self.n_orb).collect();
        let particles: Vec<usize> = occupied(to & !from, self.n_orb).collect();
        let (q1, q2, p1, p2) = (holes[0], holes[1], particles[0], particles[1]);
        // a+_p2 a_q2 a+_p1 a_q1 |from> = sign |to>
        let sign = excite(from, q1, p1)
            .and_then(|(mid, s1)| excite(mid, q2, p2).map(|(_, s2)| s1 * s2));
        match sign {
            Some(sign) => {
                sign * (self.eri.get(p2, q2, p1, q1) - self.eri.get(p2, q1, p1, q2))
            }
            None => 0.0,
        }
    }

    /// Lowest `count` eigenvectors of `H` over the `size` determinants with
    /// the smallest diagonal, as orthonormal columns of the full space.
    pub fn guess_space_vectors(&self, size: usize, count: usize) -> DMatrix<f64> {
        let dim = self.dim();
        let count = count.min(dim);
        let selected = lowest_diagonal(&self.diagonal, size.max(count));
        let m = selected.len();

        let rows: Vec<Vec<f64>> = selected
            .par_iter()
            .map(|&i| selected.iter().map(|&j| self.matrix_element(i, j)).collect())
            .collect();
        let block = DMatrix::from_fn(m, m, |r, c| rows[r][c]);
        let block = 0.5 * (&block + block.transpose());
        let eig = block.symmetric_eigen();
        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| {
            eig.eigenvalues[a]
                .partial_cmp(&eig.eigenvalues[b])
                .unwrap_or(Ordering::Equal)
        });

        let mut guess = DMatrix::zeros(dim, count);
        for (col, &k) in order.iter().take(count).enumerate() {
            for (r, &det) in selected.iter().enumerate() {
                guess[(det, col)] = eig.eigenvectors[(r, k)];
            }
        }
        info!(
            "Davidson guess space: {} determinants, lowest eigenvalue {:.10} Eh",
            m,
            eig.eigenvalues[order[0]] + self.core_energy
        );
        guess
    }

    /// Explicit Hamiltonian (core energy excluded), one sigma per column.
    pub fn hamiltonian_matrix(&self) -> DMatrix<f64> {
        let dim = self.dim();
        let mut h = DMatrix::zeros(dim, dim);
        for i in 0..dim {
            let mut unit = DVector::zeros(dim);
            unit[i] = 1.0;
            h.set_column(i, &self.sigma(&unit));
        }
        0.5 * (&h + h.transpose())
    }

    pub fn solve(&self) -> Result<FciResult> {
        let dim = self.dim();
        let n_roots = self.settings.n_roots;
        if n_roots == 0 {
            return Err(eyre!("At least one CI root must be requested"));
        }
        if dim < n_roots {
            return Err(eyre!(
                "Requested {} roots but the determinant space has dimension {}",
                n_roots,
                dim
            ));
        }

        let (eigenvalues, vectors, diagonalizer) = if dim <= self.settings.dense_threshold {
            info!("Diagonalising the {}x{} CI matrix directly", dim, dim);
            let (values, vectors) = self.dense_roots(n_roots);
            (values, vectors, Diagonalizer::Dense)
        } else {
            let n_guess = (2 * n_roots).max(n_roots + 6).min(dim);
            let guess = if self.settings.guess_space > 0 {
                self.guess_space_vectors(self.settings.guess_space, n_guess)
            } else {
                diagonal_guess(&self.diagonal, n_guess)
            };
            let davidson = Davidson::new(
                self,
                guess,
                n_roots,
                self.settings.davidson_tolerance,
                self.settings.max_iterations,
                self.settings.subspace_multiplier,
            )
            .wrap_err("FCI eigen-solve failed")?;
            let vectors: Vec<DVector<f64>> = davidson
                .eigenvectors
                .column_iter()
                .map(|c| c.into_owned())
                .collect();
            let values: Vec<f64> = davidson.eigenvalues.iter().cloned().collect();
            (values, vectors, Diagonalizer::Davidson)
        };

        let energies: Vec<f64> = eigenvalues
            .iter()
            .map(|e: &f64| e + self.core_energy)
            .collect();
        if energies.iter().any(|e| !e.is_finite()) {
            return Err(eyre!("FCI produced non-finite energies: {:?}", energies));
        }
        let s_squared: Vec<f64> = vectors
            .iter()
            .map(|v| SpinOperators::expectation_s2(&self.sector, v))
            .collect();

        for (i, (e, s2)) in energies.iter().zip(&s_squared).enumerate() {
            info!("  FCI root {}: E = {:.10} Eh, <S^2> = {:.4}", i, e, s2);
        }

        Ok(FciResult {
            energies,
            vectors,
            s_squared,
            dimension: dim,
            diagonalizer,
        })
    }

    fn dense_roots(&self, n_roots: usize) -> (Vec<f64>, Vec<DVector<f64>>) {
        let eig = self.hamiltonian_matrix().symmetric_eigen();
        let mut indices: Vec<usize> = (0..eig.eigenvalues.len()).collect();
        indices.sort_by(|&a, &b| {
            eig.eigenvalues[a]
                .partial_cmp(&eig.eigenvalues[b])
                .unwrap_or(Ordering::Equal)
        });
        indices
            .into_iter()
            .take(n_roots)
            .map(|i| (eig.eigenvalues[i], eig.eigenvectors.column(i).into_owned()))
            .unzip()
    }
}

/// Orbital emptied and orbital filled going from `from` to `to`, which differ
/// by one replacement.
fn replacement(from: Bitstring, to: Bitstring) -> (usize, usize) {
    (
        (from & !to).trailing_zeros() as usize,
        (to & !from).trailing_zeros() as usize,
    )
}

/// `a+_p a_q |string>`
fn excite(string: Bitstring, q: usize, p: usize) -> Option<(Bitstring, f64)> {
    let (emptied, s1) = annihilate(string, q)?;
    let (filled, s2) = create(emptied, p)?;
    Some((filled, s1 * s2))
}

impl DavidsonEngine for FCI {
    fn size(&self) -> usize {
        self.dim()
    }

    fn compute_products(&self, basis: &DMatrix<f64>) -> DMatrix<f64> {
        let mut products = DMatrix::zeros(basis.nrows(), basis.ncols());
        for (i, column) in basis.column_iter().enumerate() {
            products.set_column(i, &self.sigma(&column.into_owned()));
        }
        products
    }

    fn diagonal(&self) -> &DVector<f64> {
        &self.diagonal
    }
}
