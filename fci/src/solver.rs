//! One solver step: geometry descriptor in, ground and first excited energy out.
//!
//! The chain is basis loading, AO integrals, the mean-field reference (RHF or
//! ROHF by multiplicity), the frozen-core active space and a two-root FCI.
//! Only the reference retries with stronger level shifts; every other
//! failure is returned as is.

use crate::ci_impl::{FciSettings, FCI};
use crate::fock_space::spin_multiplicity;
use crate::geometry::GeometryDescriptor;
use crate::integrals::{ActiveSpace, AoIntegrals};
use crate::scf_impl::{run_reference_from, InitialGuess, ScfSettings};
use basis::library::BasisLibrary;
use color_eyre::eyre::{eyre, Result, WrapErr};
use nalgebra::DMatrix;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub basis: String,
    pub library: BasisLibrary,
    pub charge: i32,
    pub multiplicity: usize,
    pub scf: ScfSettings,
    pub fci: FciSettings,
    /// `None` correlates every orbital above the frozen core
    pub n_active_orbitals: Option<usize>,
    /// `None` correlates every electron
    pub n_active_electrons: Option<usize>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            basis: "sto-3g".to_string(),
            library: BasisLibrary::new(),
            charge: 0,
            multiplicity: 2,
            scf: ScfSettings::default(),
            fci: FciSettings::default(),
            n_active_orbitals: Some(8),
            n_active_electrons: Some(9),
        }
    }
}

/// Energies of one sample, in hartree.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub ground: f64,
    pub excited: f64,
    pub scf_energy: f64,
    /// `<S^2>` of the ground and the excited root
    pub s_squared: [f64; 2],
    /// converged reference orbitals, a starting guess for a nearby geometry
    pub orbitals: DMatrix<f64>,
}

impl SolverOutput {
    pub fn energy_pair(&self) -> (f64, f64) {
        (self.ground, self.excited)
    }
}

pub fn solve_energies(
    descriptor: &GeometryDescriptor,
    settings: &SolverSettings,
) -> Result<SolverOutput> {
    solve_energies_from(descriptor, settings, &InitialGuess::CoreHamiltonian)
}

/// [`solve_energies`] with the reference started from `guess`.
pub fn solve_energies_from(
    descriptor: &GeometryDescriptor,
    settings: &SolverSettings,
    guess: &InitialGuess,
) -> Result<SolverOutput> {
    if settings.fci.n_roots < 2 {
        return Err(eyre!(
            "Two CI roots are needed for the energy pair, {} requested",
            settings.fci.n_roots
        ));
    }
    let timer = Instant::now();

    let molecule = descriptor.to_molecule(settings.charge, settings.multiplicity)?;
    info!("Geometry: {}", descriptor.atom_string());
    info!(
        "Point group: {}, {} electrons ({} alpha, {} beta)",
        molecule.point_group(),
        molecule.n_electrons(),
        molecule.n_alpha(),
        molecule.n_beta()
    );

    let ao = AoIntegrals::for_molecule(&molecule, &settings.library, &settings.basis)
        .wrap_err_with(|| format!("Failed to build integrals in basis '{}'", settings.basis))?;
    let ao = Arc::new(ao);
    info!("Nuclear repulsion: {:.10} Eh", ao.nuclear_repulsion);

    let reference = run_reference_from(&molecule, ao.clone(), settings.scf.clone(), guess)
        .wrap_err("SCF reference calculation failed")?;
    info!("SCF energy: {:.10} Eh", reference.energy);

    let active = ActiveSpace::build(
        &ao,
        &reference.mo_coeffs,
        reference.n_alpha,
        reference.n_beta,
        settings.n_active_orbitals,
        settings.n_active_electrons,
    )?;
    info!(
        "Active space: {} frozen core orbitals, ({}e, {}o)",
        active.n_core,
        active.n_alpha + active.n_beta,
        active.n_orbitals
    );

    let result = FCI::new(&active, settings.fci.clone()).solve()?;
    let (ground, excited) = (result.energies[0], result.energies[1]);
    let s_squared = [result.s_squared[0], result.s_squared[1]];
    if ground > excited {
        return Err(eyre!(
            "CI roots out of order: {:.10} above {:.10}",
            ground,
            excited
        ));
    }

    for (label, s2) in ["ground", "excited"].iter().zip(&s_squared) {
        info!(
            "  {} state: <S^2> = {:.4}, 2S+1 = {:.2}",
            label,
            s2,
            spin_multiplicity(*s2)
        );
    }
    info!(
        "FCI correlation energy: {:.10} Eh ({:.2} s)",
        ground - reference.energy,
        timer.elapsed().as_secs_f64()
    );

    Ok(SolverOutput {
        ground,
        excited,
        scf_energy: reference.energy,
        s_squared,
        orbitals: reference.mo_coeffs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hydrogen_settings() -> SolverSettings {
        SolverSettings {
            library: BasisLibrary::new().offline(),
            multiplicity: 1,
            n_active_orbitals: None,
            n_active_electrons: None,
            ..SolverSettings::default()
        }
    }

    #[test]
    fn test_h2_energy_pair() {
        let descriptor = GeometryDescriptor::diatomic("H", "H", 0.74, true);
        let output = solve_energies(&descriptor, &hydrogen_settings()).unwrap();
        assert!(output.ground < output.scf_energy);
        assert!(output.ground < output.excited);
        assert_relative_eq!(output.s_squared[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(output.s_squared[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_single_root_is_rejected() {
        let descriptor = GeometryDescriptor::diatomic("H", "H", 0.74, true);
        let mut settings = hydrogen_settings();
        settings.fci.n_roots = 1;
        assert!(solve_energies(&descriptor, &settings).is_err());
    }

    #[test]
    fn test_unknown_basis_offline_fails() {
        let descriptor = GeometryDescriptor::diatomic("H", "H", 0.74, true);
        let settings = SolverSettings {
            basis: "cc-pvtz".to_string(),
            ..hydrogen_settings()
        };
        assert!(solve_energies(&descriptor, &settings).is_err());
    }

    #[test]
    fn test_incompatible_multiplicity_fails() {
        let descriptor = GeometryDescriptor::diatomic("H", "H", 0.74, true);
        let settings = SolverSettings {
            multiplicity: 2,
            ..hydrogen_settings()
        };
        assert!(solve_energies(&descriptor, &settings).is_err());
    }
}
