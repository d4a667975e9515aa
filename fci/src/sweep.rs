//! Sequential bond-length scan
//!
//! Each distance becomes a descriptor, goes through one solver step and
//! appends to parallel result sequences. A failure at any point aborts the
//! whole scan with the offending distance attached. The reference at each
//! distance starts from the orbitals converged at the previous one.

use crate::geometry::{scan_distances, GeometryDescriptor};
use crate::scf_impl::InitialGuess;
use crate::solver::{solve_energies_from, SolverOutput, SolverSettings};
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Distances and the diatomic being scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub first: String,
    pub second: String,
    pub distances: Vec<f64>,
    pub symmetry: bool,
}

impl ScanPlan {
    pub fn evenly_spaced(
        first: &str,
        second: &str,
        start: f64,
        stop: f64,
        points: usize,
        symmetry: bool,
    ) -> Self {
        ScanPlan {
            first: first.to_string(),
            second: second.to_string(),
            distances: scan_distances(start, stop, points),
            symmetry,
        }
    }

    pub fn descriptor(&self, distance: f64) -> GeometryDescriptor {
        GeometryDescriptor::diatomic(&self.first, &self.second, distance, self.symmetry)
    }
}

/// Positionally aligned results of a scan. Energies in hartree, distances in angstrom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResults {
    pub basis: String,
    pub distances: Vec<f64>,
    pub ground: Vec<f64>,
    pub excited: Vec<f64>,
    pub scf_energies: Vec<f64>,
    pub s_squared_ground: Vec<f64>,
    pub s_squared_excited: Vec<f64>,
}

impl ScanResults {
    pub fn new(basis: &str) -> Self {
        ScanResults {
            basis: basis.to_string(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, distance: f64, output: &SolverOutput) {
        self.distances.push(distance);
        self.ground.push(output.ground);
        self.excited.push(output.excited);
        self.scf_energies.push(output.scf_energy);
        self.s_squared_ground.push(output.s_squared[0]);
        self.s_squared_excited.push(output.s_squared[1]);
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Every sequence has one entry per distance.
    pub fn check_consistency(&self) -> Result<()> {
        let n = self.distances.len();
        let lengths = [
            ("ground", self.ground.len()),
            ("excited", self.excited.len()),
            ("scf_energies", self.scf_energies.len()),
            ("s_squared_ground", self.s_squared_ground.len()),
            ("s_squared_excited", self.s_squared_excited.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(eyre!(
                    "Scan sequence '{}' has {} entries for {} distances",
                    name,
                    len,
                    n
                ));
            }
        }
        Ok(())
    }

    /// Distance with the lowest ground-state energy.
    pub fn minimum(&self) -> Option<(f64, f64)> {
        self.distances
            .iter()
            .zip(&self.ground)
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&r, &e)| (r, e))
    }
}

/// Run the scan with a caller-supplied solver step.
pub fn run_scan_with<F>(plan: &ScanPlan, basis: &str, mut solve: F) -> Result<ScanResults>
where
    F: FnMut(&GeometryDescriptor) -> Result<SolverOutput>,
{
    let timer = Instant::now();
    let mut results = ScanResults::new(basis);
    let total = plan.distances.len();

    for (i, &distance) in plan.distances.iter().enumerate() {
        info!("-------------------------------------------");
        info!(
            "Point {}/{}: {}-{} distance {:.4} Angstrom",
            i + 1,
            total,
            plan.first,
            plan.second,
            distance
        );
        let descriptor = plan.descriptor(distance);
        let output = solve(&descriptor)
            .wrap_err_with(|| format!("Solver failed at distance {:.4} Angstrom", distance))?;
        info!(
            "  E(S0) = {:.10} Eh, E(S1) = {:.10} Eh",
            output.ground, output.excited
        );
        results.push(distance, &output);
    }

    results.check_consistency()?;
    info!(
        "Scan of {} points finished in {:.1} s",
        results.len(),
        timer.elapsed().as_secs_f64()
    );
    Ok(results)
}

pub fn run_scan(plan: &ScanPlan, settings: &SolverSettings) -> Result<ScanResults> {
    let mut guess = InitialGuess::CoreHamiltonian;
    run_scan_with(plan, &settings.basis, |descriptor| {
        let output = solve_energies_from(descriptor, settings, &guess)?;
        guess = InitialGuess::Orbitals(output.orbitals.clone());
        Ok(output)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_output(distance: f64) -> SolverOutput {
        let ground = (distance - 1.2).powi(2) - 92.0;
        SolverOutput {
            ground,
            excited: ground + 0.05,
            scf_energy: ground + 0.1,
            s_squared: [0.75, 0.75],
            orbitals: nalgebra::DMatrix::zeros(0, 0),
        }
    }

    fn bond_length(descriptor: &GeometryDescriptor) -> f64 {
        descriptor.atoms[1].position[2]
    }

    #[test]
    fn test_scan_collects_every_point() {
        let plan = ScanPlan::evenly_spaced("C", "N", 0.8, 2.2, 15, true);
        let results = run_scan_with(&plan, "sto-3g", |d| Ok(fake_output(bond_length(d)))).unwrap();
        assert_eq!(results.len(), 15);
        assert_eq!(results.ground.len(), 15);
        assert_eq!(results.excited.len(), 15);
        assert_eq!(results.distances, plan.distances);
        assert!(results
            .ground
            .iter()
            .zip(&results.excited)
            .all(|(g, e)| g <= e));
        let (r_min, _) = results.minimum().unwrap();
        assert!((r_min - 1.2).abs() < 0.06);
    }

    #[test]
    fn test_scan_aborts_on_failure() {
        let plan = ScanPlan::evenly_spaced("C", "N", 0.8, 2.2, 15, true);
        let mut calls = 0;
        let err = run_scan_with(&plan, "sto-3g", |d| {
            calls += 1;
            if bond_length(d) > 1.55 {
                Err(eyre!("no convergence"))
            } else {
                Ok(fake_output(bond_length(d)))
            }
        })
        .unwrap_err();
        assert!(format!("{}", err).contains("1.6000"));
        assert_eq!(calls, 9);
    }

    #[test]
    fn test_consistency_check() {
        let mut results = ScanResults::new("sto-3g");
        results.push(1.0, &fake_output(1.0));
        assert!(results.check_consistency().is_ok());
        results.ground.pop();
        assert!(results.check_consistency().is_err());
    }

    #[test]
    fn test_results_serialize() {
        let mut results = ScanResults::new("sto-3g");
        results.push(1.0, &fake_output(1.0));
        let json = serde_json::to_string(&results).unwrap();
        let back: ScanResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back, results);
    }
}
