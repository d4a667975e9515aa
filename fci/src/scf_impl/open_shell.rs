//! Restricted open-shell Hartree-Fock
//!
//! Alpha and beta electrons share one set of spatial orbitals. Orbitals are
//! closed (doubly occupied), open (alpha only) or virtual. The orbitals come
//! from Roothaan's effective Fock matrix, assembled in the current MO basis
//! from the alpha and beta Fock matrices:
//!
//! ```text
//!            closed   open   virtual
//! closed       Fc      Fb      Fc
//! open         Fb      Fc      Fa
//! virtual      Fc      Fa      Fc        Fc = (Fa + Fb) / 2
//! ```

extern crate nalgebra as na;

use super::{diagonalize_fock, orthogonalizer, LevelShift, ScfSettings, ScfSummary, DIIS, SCF};
use crate::integrals::AoIntegrals;
use na::{DMatrix, DVector};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct OpenShellSCF {
    pub ao: Arc<AoIntegrals>,
    pub num_basis: usize,
    pub n_alpha: usize,
    pub n_beta: usize,
    pub coeffs: DMatrix<f64>,
    pub e_level: DVector<f64>,
    pub density_alpha: DMatrix<f64>,
    pub density_beta: DMatrix<f64>,
    pub fock_alpha: DMatrix<f64>,
    pub fock_beta: DMatrix<f64>,
    /// Roothaan effective Fock matrix in the AO basis
    pub fock_matrix: DMatrix<f64>,
    pub diis: Option<DIIS>,
    level_shift: LevelShift,
    orthogonalizer: DMatrix<f64>,
    settings: ScfSettings,
}

impl OpenShellSCF {
    pub fn new(ao: Arc<AoIntegrals>, n_alpha: usize, n_beta: usize, settings: ScfSettings) -> Self {
        let n = ao.n_basis;
        let orthogonalizer = orthogonalizer(&ao.overlap);
        let diis = (settings.diis_subspace_size > 0).then(|| {
            info!(
                "Enabling DIIS acceleration with subspace size {}",
                settings.diis_subspace_size
            );
            DIIS::new(settings.diis_subspace_size)
        });
        info!(
            "ROHF occupation: {} closed, {} open orbitals",
            n_beta,
            n_alpha - n_beta
        );
        OpenShellSCF {
            num_basis: n,
            n_alpha,
            n_beta,
            coeffs: DMatrix::zeros(n, n),
            e_level: DVector::zeros(n),
            density_alpha: DMatrix::zeros(n, n),
            density_beta: DMatrix::zeros(n, n),
            fock_alpha: ao.h_core.clone(),
            fock_beta: ao.h_core.clone(),
            fock_matrix: ao.h_core.clone(),
            diis,
            level_shift: LevelShift {
                shift: settings.level_shift,
            },
            orthogonalizer,
            settings,
            ao,
        }
    }

    fn rebuild_densities(&mut self) {
        let alpha = self.coeffs.columns(0, self.n_alpha);
        let beta = self.coeffs.columns(0, self.n_beta);
        self.density_alpha = &alpha * alpha.transpose();
        self.density_beta = &beta * beta.transpose();
    }

    /// Assemble the effective Fock matrix from the spin Fock matrices,
    /// using the current orbitals to define the blocks.
    pub fn effective_fock(&self) -> DMatrix<f64> {
        let c = &self.coeffs;
        let fa = c.transpose() * &self.fock_alpha * c;
        let fb = c.transpose() * &self.fock_beta * c;
        let mut feff = 0.5 * (&fa + &fb);
        let n_mo = c.ncols();

        for i in 0..self.n_beta {
            for j in self.n_beta..self.n_alpha {
                feff[(i, j)] = fb[(i, j)];
                feff[(j, i)] = fb[(j, i)];
            }
        }
        for i in self.n_beta..self.n_alpha {
            for j in self.n_alpha..n_mo {
                feff[(i, j)] = fa[(i, j)];
                feff[(j, i)] = fa[(j, i)];
            }
        }

        let sc = &self.ao.overlap * c;
        &sc * feff * sc.transpose()
    }
}

impl SCF for OpenShellSCF {
    fn init_guess(&mut self) {
        let (e_level, coeffs) = diagonalize_fock(&self.ao.h_core, &self.orthogonalizer);
        self.e_level = e_level;
        self.coeffs = coeffs;
        self.rebuild_densities();
    }

    fn update_fock_matrix(&mut self) {
        let (j_a, k_a) = self.ao.coulomb_exchange(&self.density_alpha);
        let (j_b, k_b) = self.ao.coulomb_exchange(&self.density_beta);
        let j = j_a + j_b;
        self.fock_alpha = &self.ao.h_core + &j - k_a;
        self.fock_beta = &self.ao.h_core + &j - k_b;
        self.fock_matrix = self.effective_fock();
    }

    fn update_density_matrix(&mut self) {
        let mut fock = self.fock_matrix.clone();
        let error = self.error_matrix();
        if let Some(diis) = self.diis.as_mut() {
            diis.update(fock.clone(), error);
            if let Some(extrapolated) = diis.extrapolate() {
                fock = extrapolated;
            }
        }
        let shifted = self
            .level_shift
            .apply(&fock, &self.ao.overlap, &self.coeffs, self.n_alpha);

        let (e_level, coeffs) = diagonalize_fock(&shifted, &self.orthogonalizer);
        self.e_level = e_level;
        self.coeffs = coeffs;
        self.rebuild_densities();
    }

    // E = 1/2 Tr[Pa (H + Fa)] + 1/2 Tr[Pb (H + Fb)] + E_nn
    fn calculate_total_energy(&self) -> f64 {
        let h = &self.ao.h_core;
        let alpha = self.density_alpha.component_mul(&(h + &self.fock_alpha)).sum();
        let beta = self.density_beta.component_mul(&(h + &self.fock_beta)).sum();
        0.5 * (alpha + beta) + self.ao.nuclear_repulsion
    }

    fn error_matrix(&self) -> DMatrix<f64> {
        let total = &self.density_alpha + &self.density_beta;
        DIIS::calculate_error_matrix(&self.fock_matrix, &total, &self.ao.overlap)
    }

    // The effective Fock matrix has arbitrary diagonal blocks, so its own
    // eigenvalue order may interleave the shells. Keep the orbitals that
    // built the converged densities.
    fn summary(&self, energy: f64, cycles: usize) -> ScfSummary {
        let shift = self.level_shift.shift;
        let orbital_energies = DVector::from_fn(self.e_level.len(), |i, _| {
            if i >= self.n_alpha {
                self.e_level[i] - shift
            } else {
                self.e_level[i]
            }
        });
        ScfSummary {
            energy,
            cycles,
            mo_coeffs: self.coeffs.clone(),
            orbital_energies,
            n_alpha: self.n_alpha,
            n_beta: self.n_beta,
        }
    }

    fn settings(&self) -> &ScfSettings {
        &self.settings
    }

    fn overlap(&self) -> &DMatrix<f64> {
        &self.ao.overlap
    }

    fn set_orbitals(&mut self, coeffs: DMatrix<f64>) {
        self.coeffs = coeffs;
        self.rebuild_densities();
    }

    fn name(&self) -> &'static str {
        "ROHF"
    }
}
