//! Mean-field references with DIIS acceleration
//!
//! This module provides the SCF trait, the DIIS (Direct Inversion in the
//! Iterative Subspace) accelerator, a virtual-orbital level shift and the two
//! references used ahead of the CI step: restricted Hartree-Fock for closed
//! shells and restricted open-shell Hartree-Fock otherwise.
//!
//! A run starts from the core Hamiltonian or from the orbitals of a nearby
//! geometry. When it does not converge, [`run_reference_from`] retries from
//! the core Hamiltonian with the other level shifts of
//! [`RESCUE_LEVEL_SHIFTS`] and a longer cycle budget.

extern crate nalgebra as na;

mod open_shell;
mod restricted;

pub use open_shell::OpenShellSCF;
pub use restricted::RestrictedSCF;

use crate::geometry::Molecule;
use crate::integrals::AoIntegrals;
use color_eyre::eyre::Result;
use na::{DMatrix, DVector};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Iteration controls shared by both references.
#[derive(Debug, Clone)]
pub struct ScfSettings {
    pub max_cycle: usize,
    /// energy change between cycles; the DIIS error must fall below its square root
    pub convergence_threshold: f64,
    /// 0 disables DIIS
    pub diis_subspace_size: usize,
    /// shift (Eh) added to the virtual block before diagonalisation
    pub level_shift: f64,
}

impl Default for ScfSettings {
    fn default() -> Self {
        ScfSettings {
            max_cycle: 100,
            convergence_threshold: 1e-8,
            diis_subspace_size: 8,
            level_shift: 0.5,
        }
    }
}

/// Level shifts (Eh) tried, in order, after the configured one fails.
pub const RESCUE_LEVEL_SHIFTS: [f64; 3] = [0.5, 0.2, 1.0];

impl ScfSettings {
    /// Settings for the retries: every rescue shift that differs from the
    /// configured one, each with twice the cycle budget.
    pub fn fallbacks(&self) -> Vec<ScfSettings> {
        RESCUE_LEVEL_SHIFTS
            .iter()
            .filter(|&&shift| (shift - self.level_shift).abs() > 1e-12)
            .map(|&shift| ScfSettings {
                level_shift: shift,
                max_cycle: 2 * self.max_cycle,
                ..self.clone()
            })
            .collect()
    }
}

/// Starting orbitals of an SCF run.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InitialGuess {
    #[default]
    CoreHamiltonian,
    /// MO coefficients from another geometry in the same AO basis
    Orbitals(DMatrix<f64>),
}

/// Re-orthonormalise `coeffs` in the metric `overlap`:
/// `C' = C (C^T S C)^-1/2`. None when the shapes differ or the projected
/// orbitals are linearly dependent.
pub fn project_orbitals(coeffs: &DMatrix<f64>, overlap: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = overlap.nrows();
    if coeffs.nrows() != n || coeffs.ncols() != n {
        return None;
    }
    let metric = coeffs.transpose() * overlap * coeffs;
    let eig = metric.symmetric_eigen();
    if eig.eigenvalues.iter().any(|&v| v < 1e-8) {
        return None;
    }
    let inv_sqrt = eig.eigenvalues.map(|v| 1.0 / v.sqrt());
    let m = &eig.eigenvectors * DMatrix::from_diagonal(&inv_sqrt) * eig.eigenvectors.transpose();
    Some(coeffs * m)
}

/// Converged mean-field data handed to the active-space builder.
#[derive(Debug, Clone)]
pub struct ScfSummary {
    pub energy: f64,
    pub cycles: usize,
    pub mo_coeffs: DMatrix<f64>,
    pub orbital_energies: DVector<f64>,
    pub n_alpha: usize,
    pub n_beta: usize,
}

/// The SCF trait defines the interface for Self-Consistent Field calculations
pub trait SCF {
    /// Core-Hamiltonian guess for orbitals and densities.
    fn init_guess(&mut self);
    fn update_fock_matrix(&mut self);
    /// Diagonalise the (extrapolated, shifted) Fock matrix and rebuild densities.
    fn update_density_matrix(&mut self);
    fn calculate_total_energy(&self) -> f64;
    /// Commutator error of the current Fock and density matrices.
    fn error_matrix(&self) -> DMatrix<f64>;
    fn summary(&self, energy: f64, cycles: usize) -> ScfSummary;
    fn settings(&self) -> &ScfSettings;
    fn name(&self) -> &'static str;
    fn overlap(&self) -> &DMatrix<f64>;
    /// Take orthonormal MO coefficients as the current orbitals.
    fn set_orbitals(&mut self, coeffs: DMatrix<f64>);

    /// Prepare the first cycle. Orbitals that do not fit this basis fall
    /// back to the core-Hamiltonian guess.
    fn start_from(&mut self, guess: &InitialGuess) {
        match guess {
            InitialGuess::CoreHamiltonian => self.init_guess(),
            InitialGuess::Orbitals(coeffs) => match project_orbitals(coeffs, self.overlap()) {
                Some(projected) => {
                    debug!("{} starts from supplied orbitals", self.name());
                    self.set_orbitals(projected);
                }
                None => {
                    warn!(
                        "Supplied orbitals do not fit the {}x{} AO basis, using the core Hamiltonian",
                        self.overlap().nrows(),
                        self.overlap().ncols()
                    );
                    self.init_guess();
                }
            },
        }
    }

    /// Iterate to self-consistency. Exhausting `max_cycle` is an error.
    fn scf_cycle(&mut self) -> Result<ScfSummary> {
        let settings = self.settings().clone();
        let error_threshold = settings.convergence_threshold.sqrt();
        let mut old_energy = 0.0;

        for cycle in 0..settings.max_cycle {
            self.update_fock_matrix();
            let total_energy = self.calculate_total_energy();
            let energy_change = total_energy - old_energy;
            let error = self.error_matrix().amax();
            self.update_density_matrix();

            info!(
                "{} cycle {:3}: E = {:.12} au, dE = {:.3e}, max|FDS-SDF| = {:.3e}",
                self.name(),
                cycle,
                total_energy,
                energy_change,
                error
            );

            let converged = energy_change.abs() < settings.convergence_threshold
                && error < error_threshold;
            if cycle > 0 && converged {
                info!("{} converged in {} cycles.", self.name(), cycle + 1);
                return Ok(self.summary(total_energy, cycle + 1));
            }
            old_energy = total_energy;
        }

        Err(color_eyre::eyre::eyre!(
            "{} did not converge within {} cycles",
            self.name(),
            settings.max_cycle
        ))
    }
}

/// Pick ROHF for open shells and RHF otherwise, then run it from the
/// core-Hamiltonian guess.
pub fn run_reference(
    molecule: &Molecule,
    ao: Arc<AoIntegrals>,
    settings: ScfSettings,
) -> Result<ScfSummary> {
    run_reference_from(molecule, ao, settings, &InitialGuess::CoreHamiltonian)
}

/// Like [`run_reference`], starting from `guess`. A run that does not
/// converge is repeated from the core Hamiltonian with the configured
/// settings (when `guess` held orbitals) and then with each of
/// [`ScfSettings::fallbacks`]; the last failure is returned.
pub fn run_reference_from(
    molecule: &Molecule,
    ao: Arc<AoIntegrals>,
    settings: ScfSettings,
    guess: &InitialGuess,
) -> Result<ScfSummary> {
    let n_alpha = molecule.n_alpha();
    let n_beta = molecule.n_beta();
    if n_alpha == n_beta {
        info!("Using restricted Hartree-Fock (RHF) for a closed-shell reference");
    } else {
        info!(
            "Using restricted open-shell Hartree-Fock (ROHF), multiplicity {}",
            molecule.multiplicity
        );
    }

    let mut attempts = vec![(guess.clone(), settings.clone())];
    if *guess != InitialGuess::CoreHamiltonian {
        attempts.push((InitialGuess::CoreHamiltonian, settings.clone()));
    }
    attempts.extend(
        settings
            .fallbacks()
            .into_iter()
            .map(|s| (InitialGuess::CoreHamiltonian, s)),
    );

    let mut failure = None;
    for (attempt, (start, attempt_settings)) in attempts.into_iter().enumerate() {
        if attempt > 0 {
            warn!(
                "SCF retry {}: level shift {:.2} Eh, at most {} cycles, {} guess",
                attempt,
                attempt_settings.level_shift,
                attempt_settings.max_cycle,
                match &start {
                    InitialGuess::CoreHamiltonian => "core-Hamiltonian",
                    InitialGuess::Orbitals(_) => "orbital",
                }
            );
        }
        let outcome = if n_alpha == n_beta {
            let mut scf = RestrictedSCF::new(ao.clone(), n_alpha, attempt_settings);
            scf.start_from(&start);
            scf.scf_cycle()
        } else {
            let mut scf = OpenShellSCF::new(ao.clone(), n_alpha, n_beta, attempt_settings);
            scf.start_from(&start);
            scf.scf_cycle()
        };
        match outcome {
            Ok(summary) => return Ok(summary),
            Err(e) => {
                warn!("{}", e);
                failure = Some(e);
            }
        }
    }
    Err(failure.unwrap_or_else(|| color_eyre::eyre::eyre!("No SCF attempt was made")))
}

/// DIIS (Direct Inversion in the Iterative Subspace) convergence accelerator
///
/// The error matrix is the commutator `E = FDS - SDF`. The extrapolated Fock
/// matrix `F = sum c_i F_i` minimises `||sum c_i E_i||^2` subject to
/// `sum c_i = 1`.
#[derive(Clone)]
pub struct DIIS {
    error_matrices: Vec<DMatrix<f64>>,
    fock_matrices: Vec<DMatrix<f64>>,
    max_subspace_size: usize,
}

impl DIIS {
    pub fn new(max_subspace_size: usize) -> Self {
        DIIS {
            error_matrices: Vec::new(),
            fock_matrices: Vec::new(),
            max_subspace_size,
        }
    }

    pub fn calculate_error_matrix(
        fock: &DMatrix<f64>,
        density: &DMatrix<f64>,
        overlap: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        fock * density * overlap - overlap * density * fock
    }

    /// Store a Fock/error pair, dropping the oldest entry when full.
    pub fn update(&mut self, fock_matrix: DMatrix<f64>, error: DMatrix<f64>) {
        if self.error_matrices.len() >= self.max_subspace_size {
            self.error_matrices.remove(0);
            self.fock_matrices.remove(0);
        }
        self.error_matrices.push(error);
        self.fock_matrices.push(fock_matrix);
    }

    /// Returns None when the subspace is empty or the DIIS equations cannot be solved.
    pub fn extrapolate(&self) -> Option<DMatrix<f64>> {
        let n = self.error_matrices.len();
        if n == 0 {
            return None;
        }
        if n == 1 {
            return Some(self.fock_matrices[0].clone());
        }

        let mut b = DMatrix::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in 0..=i {
                let dot = self.error_matrices[i].dot(&self.error_matrices[j]);
                b[(i, j)] = dot;
                b[(j, i)] = dot;
            }
            b[(i, n)] = -1.0;
            b[(n, i)] = -1.0;
        }

        // scale the error block so the singular-value cutoff is relative
        let scale = (0..n).map(|i| b[(i, i)]).fold(0.0_f64, f64::max);
        if scale > 0.0 {
            for i in 0..n {
                for j in 0..n {
                    b[(i, j)] /= scale;
                }
            }
        }

        let mut rhs = DVector::zeros(n + 1);
        rhs[n] = -1.0;

        let coeffs = match b.svd(true, true).solve(&rhs, 1e-12) {
            Ok(x) => x,
            Err(e) => {
                debug!("DIIS extrapolation failed: {}", e);
                return None;
            }
        };

        let mut fock_extrapolated =
            DMatrix::zeros(self.fock_matrices[0].nrows(), self.fock_matrices[0].ncols());
        for i in 0..n {
            fock_extrapolated += &self.fock_matrices[i] * coeffs[i];
        }

        debug!("DIIS extrapolation with {} vectors", n);
        Some(fock_extrapolated)
    }

    pub fn reset(&mut self) {
        self.error_matrices.clear();
        self.fock_matrices.clear();
    }

    pub fn size(&self) -> usize {
        self.error_matrices.len()
    }
}

/// Raises the orbitals from `first_virtual` upwards by `shift` Eh:
/// `F + shift * S C_v C_v^T S`.
#[derive(Debug, Clone, Copy)]
pub struct LevelShift {
    pub shift: f64,
}

impl LevelShift {
    pub fn apply(
        &self,
        fock: &DMatrix<f64>,
        overlap: &DMatrix<f64>,
        coeffs: &DMatrix<f64>,
        first_virtual: usize,
    ) -> DMatrix<f64> {
        let n_virtual = coeffs.ncols().saturating_sub(first_virtual);
        if self.shift == 0.0 || n_virtual == 0 {
            return fock.clone();
        }
        let cv = coeffs.columns(first_virtual, n_virtual);
        let sc = overlap * cv;
        fock + self.shift * &sc * sc.transpose()
    }
}

/// Orthogonaliser `X` with `X^T S X = 1`. Symmetric (`S^-1/2`) when `S` is
/// well conditioned, canonical with near-dependent combinations dropped
/// otherwise.
pub fn orthogonalizer(overlap: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = overlap.clone().symmetric_eigen();
    let threshold = 1e-8;
    let kept: Vec<usize> = (0..eig.eigenvalues.len())
        .filter(|&i| eig.eigenvalues[i] > threshold)
        .collect();

    if kept.len() == eig.eigenvalues.len() {
        let inv_sqrt = eig.eigenvalues.map(|v| 1.0 / v.sqrt());
        &eig.eigenvectors * DMatrix::from_diagonal(&inv_sqrt) * eig.eigenvectors.transpose()
    } else {
        info!(
            "Dropping {} near-linearly-dependent basis combinations",
            eig.eigenvalues.len() - kept.len()
        );
        let u = eig.eigenvectors.select_columns(&kept);
        let inv_sqrt = DVector::from_fn(kept.len(), |i, _| 1.0 / eig.eigenvalues[kept[i]].sqrt());
        u * DMatrix::from_diagonal(&inv_sqrt)
    }
}

/// Solve `F C = S C e` through `X`, returning ascending orbital energies and
/// sign-aligned coefficients.
pub fn diagonalize_fock(fock: &DMatrix<f64>, x: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let f_prime = x.transpose() * fock * x;
    let eig = f_prime.symmetric_eigen();

    let mut indices: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    indices.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .partial_cmp(&eig.eigenvalues[b])
            .unwrap_or(Ordering::Equal)
    });
    let sorted_eigenvalues =
        DVector::from_fn(eig.eigenvalues.len(), |i, _| eig.eigenvalues[indices[i]]);
    let sorted_eigenvectors = eig.eigenvectors.select_columns(&indices);

    (sorted_eigenvalues, align_eigenvectors(x * sorted_eigenvectors))
}

/// Given a matrix where each column is an eigenvector,
/// this function aligns each eigenvector so that the entry with the largest
/// absolute value is positive.
pub fn align_eigenvectors(mut eigvecs: DMatrix<f64>) -> DMatrix<f64> {
    for j in 0..eigvecs.ncols() {
        let max_val = eigvecs
            .column(j)
            .iter()
            .copied()
            .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(Ordering::Less));
        if matches!(max_val, Some(v) if v < 0.0) {
            eigvecs.column_mut(j).neg_mut();
        }
    }
    eigvecs
}
