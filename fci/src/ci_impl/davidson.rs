/*!

# Davidson Diagonalization

Block Davidson for the lowest eigenpairs of a large, diagonally dominant
symmetric matrix that is only available through matrix-vector products.
Correction vectors use the diagonal (Jacobi) preconditioner; the subspace
collapses onto the current Ritz vectors once it reaches its maximum size.

*/

extern crate nalgebra as na;

use na::{DMatrix, DVector};
use std::cmp::Ordering;
use std::error;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Matrix access needed by the solver.
pub trait DavidsonEngine {
    fn size(&self) -> usize;
    /// `A V` for every column of `V`.
    fn compute_products(&self, basis: &DMatrix<f64>) -> DMatrix<f64>;
    fn diagonal(&self) -> &DVector<f64>;

    /// `(e - A_ii)^-1 r_i`
    fn precondition(&self, residual: &DVector<f64>, eigenvalue: f64) -> DVector<f64> {
        let diag = self.diagonal();
        DVector::from_fn(residual.len(), |i, _| {
            let denom = eigenvalue - diag[i];
            let denom = if denom.abs() < 1e-8 {
                1e-8_f64.copysign(denom)
            } else {
                denom
            };
            residual[i] / denom
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct DavidsonError {
    pub iterations: usize,
    pub max_residual: f64,
}

impl fmt::Display for DavidsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Davidson algorithm did not converge after {} iterations (max residual {:.3e})",
            self.iterations, self.max_residual
        )
    }
}

impl error::Error for DavidsonError {}

/// Converged eigenpairs, ascending.
pub struct Davidson {
    pub eigenvalues: DVector<f64>,
    pub eigenvectors: DMatrix<f64>,
    pub iterations: usize,
}

impl Davidson {
    /// Lowest `n_roots` eigenpairs of the matrix behind `engine`.
    /// * `guess` orthonormal starting vectors, at least `n_roots` columns.
    /// * `tolerance` bound on every residual norm.
    /// * `subspace_multiplier` the subspace collapses above `subspace_multiplier * n_roots` vectors.
    pub fn new<D: DavidsonEngine>(
        engine: &D,
        guess: DMatrix<f64>,
        n_roots: usize,
        tolerance: f64,
        max_iter: usize,
        subspace_multiplier: usize,
    ) -> Result<Self, DavidsonError> {
        let timer = Instant::now();
        let dim = engine.size();
        let dim_sub_origin = guess.ncols();
        let max_space = (subspace_multiplier * n_roots).max(dim_sub_origin + n_roots);

        info!(
            "Davidson: dimension {}, {} roots, tolerance {:.1e}, max subspace {}",
            dim, n_roots, tolerance, max_space
        );

        let mut basis = guess;
        let mut max_error = f64::INFINITY;

        for iteration in 0..max_iter {
            let ax = engine.compute_products(&basis);
            let a_proj = basis.transpose() * &ax;
            let a_proj = 0.5 * (&a_proj + a_proj.transpose());
            let (u, v) = sorted_eigen(a_proj, n_roots);

            let ritz = &basis * &v;
            let rk = &ax * &v - &ritz * DMatrix::from_diagonal(&u);
            let errors: Vec<f64> = rk.column_iter().map(|col| col.norm()).collect();
            max_error = errors.iter().cloned().fold(0.0, f64::max);
            let roots_cvd = errors.iter().filter(|&&e| e < tolerance).count();

            debug!(
                "Davidson iteration {:3}: subspace {:3}, converged {}/{}, max residual {:.3e}",
                iteration,
                basis.ncols(),
                roots_cvd,
                n_roots,
                max_error
            );

            if roots_cvd == n_roots {
                info!(
                    "Davidson converged in {} iterations ({:.2} s)",
                    iteration + 1,
                    timer.elapsed().as_secs_f64()
                );
                let mut eigenvectors = ritz;
                for mut col in eigenvectors.column_iter_mut() {
                    let norm = col.norm();
                    col /= norm;
                }
                return Ok(Davidson {
                    eigenvalues: u,
                    eigenvectors,
                    iterations: iteration + 1,
                });
            }

            let roots_lft = n_roots - roots_cvd;
            if basis.ncols() + roots_lft > max_space {
                // collapse onto the Ritz vectors
                basis = orthonormalize(&ritz);
                continue;
            }

            let mut added = 0;
            for (idx, _) in errors.iter().enumerate().filter(|(_, &e)| e >= tolerance) {
                let correction = engine.precondition(&rk.column(idx).into_owned(), u[idx]);
                if let Some(new_vec) = project_out(&basis, correction) {
                    let last = basis.ncols();
                    basis = basis.insert_column(last, 0.0);
                    basis.set_column(last, &new_vec);
                    added += 1;
                }
            }
            if added == 0 {
                debug!("Davidson: no new directions, collapsing subspace");
                basis = orthonormalize(&ritz);
            }
        }

        Err(DavidsonError {
            iterations: max_iter,
            max_residual: max_error,
        })
    }
}

fn sorted_eigen(matrix: DMatrix<f64>, n_roots: usize) -> (DVector<f64>, DMatrix<f64>) {
    let eig = matrix.symmetric_eigen();
    let mut indices: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    indices.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .partial_cmp(&eig.eigenvalues[b])
            .unwrap_or(Ordering::Equal)
    });
    indices.truncate(n_roots);
    let values = DVector::from_fn(indices.len(), |i, _| eig.eigenvalues[indices[i]]);
    (values, eig.eigenvectors.select_columns(&indices))
}

/// Remove the components along `basis` (two Gram-Schmidt passes) and
/// normalise. None if nothing new is left.
fn project_out(basis: &DMatrix<f64>, mut vector: DVector<f64>) -> Option<DVector<f64>> {
    let initial = vector.norm();
    if initial == 0.0 {
        return None;
    }
    vector /= initial;
    for _ in 0..2 {
        let overlap = basis.transpose() * &vector;
        vector -= basis * overlap;
    }
    let norm = vector.norm();
    if norm > 1e-7 {
        Some(vector / norm)
    } else {
        None
    }
}

fn orthonormalize(vectors: &DMatrix<f64>) -> DMatrix<f64> {
    let mut basis = DMatrix::zeros(vectors.nrows(), 0);
    for col in vectors.column_iter() {
        if let Some(v) = project_out(&basis, col.into_owned()) {
            let last = basis.ncols();
            basis = basis.insert_column(last, 0.0);
            basis.set_column(last, &v);
        }
    }
    basis
}

/// Indices of the `count` smallest diagonal elements, ties broken by index.
pub fn lowest_diagonal(diagonal: &DVector<f64>, count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..diagonal.len()).collect();
    order.sort_by(|&a, &b| {
        diagonal[a]
            .partial_cmp(&diagonal[b])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(count.min(diagonal.len()));
    order
}

/// Unit vectors on the `count` smallest diagonal elements.
pub fn diagonal_guess(diagonal: &DVector<f64>, count: usize) -> DMatrix<f64> {
    let rows = lowest_diagonal(diagonal, count);
    let mut guess = DMatrix::zeros(diagonal.len(), rows.len());
    for (col, &row) in rows.iter().enumerate() {
        guess[(row, col)] = 1.0;
    }
    guess
}
