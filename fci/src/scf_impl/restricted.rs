//! Restricted Hartree-Fock for closed-shell references

extern crate nalgebra as na;

use super::{diagonalize_fock, orthogonalizer, LevelShift, ScfSettings, ScfSummary, DIIS, SCF};
use crate::integrals::AoIntegrals;
use na::{DMatrix, DVector};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct RestrictedSCF {
    pub ao: Arc<AoIntegrals>,
    pub num_basis: usize,
    /// doubly occupied orbitals
    pub n_occ: usize,
    pub coeffs: DMatrix<f64>,
    pub e_level: DVector<f64>,
    /// total density `P = 2 C_occ C_occ^T`
    pub density_matrix: DMatrix<f64>,
    pub fock_matrix: DMatrix<f64>,
    pub diis: Option<DIIS>,
    level_shift: LevelShift,
    orthogonalizer: DMatrix<f64>,
    settings: ScfSettings,
}

impl RestrictedSCF {
    pub fn new(ao: Arc<AoIntegrals>, n_occ: usize, settings: ScfSettings) -> Self {
        let n = ao.n_basis;
        let orthogonalizer = orthogonalizer(&ao.overlap);
        let diis = if settings.diis_subspace_size > 0 {
            info!(
                "Enabling DIIS acceleration with subspace size {}",
                settings.diis_subspace_size
            );
            Some(DIIS::new(settings.diis_subspace_size))
        } else {
            info!("DIIS acceleration disabled");
            None
        };
        RestrictedSCF {
            num_basis: n,
            n_occ,
            coeffs: DMatrix::zeros(n, n),
            e_level: DVector::zeros(n),
            density_matrix: DMatrix::zeros(n, n),
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

    fn rebuild_density(&mut self) {
        let occupied = self.coeffs.columns(0, self.n_occ);
        self.density_matrix = 2.0 * &occupied * occupied.transpose();
    }
}

impl SCF for RestrictedSCF {
    fn init_guess(&mut self) {
        let (e_level, coeffs) = diagonalize_fock(&self.ao.h_core, &self.orthogonalizer);
        self.e_level = e_level;
        self.coeffs = coeffs;
        self.rebuild_density();
    }

    fn update_fock_matrix(&mut self) {
        let (j, k) = self.ao.coulomb_exchange(&self.density_matrix);
        self.fock_matrix = &self.ao.h_core + j - 0.5 * k;
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
            .apply(&fock, &self.ao.overlap, &self.coeffs, self.n_occ);

        let (e_level, coeffs) = diagonalize_fock(&shifted, &self.orthogonalizer);
        self.e_level = e_level;
        self.coeffs = coeffs;
        self.rebuild_density();
    }

    // E = 1/2 Tr[P (H + F)] + E_nn
    fn calculate_total_energy(&self) -> f64 {
        let electronic = 0.5
            * self
                .density_matrix
                .component_mul(&(&self.ao.h_core + &self.fock_matrix))
                .sum();
        electronic + self.ao.nuclear_repulsion
    }

    fn error_matrix(&self) -> DMatrix<f64> {
        DIIS::calculate_error_matrix(&self.fock_matrix, &self.density_matrix, &self.ao.overlap)
    }

    fn summary(&self, energy: f64, cycles: usize) -> ScfSummary {
        // canonical orbitals of the unshifted, unextrapolated final Fock matrix
        let (orbital_energies, mo_coeffs) =
            diagonalize_fock(&self.fock_matrix, &self.orthogonalizer);
        ScfSummary {
            energy,
            cycles,
            mo_coeffs,
            orbital_energies,
            n_alpha: self.n_occ,
            n_beta: self.n_occ,
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
        self.rebuild_density();
    }

    fn name(&self) -> &'static str {
        "RHF"
    }
}
