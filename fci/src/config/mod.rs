//! Configuration management for the bond-length scan
//!
//! The YAML file and every field in it are optional. Missing values are
//! filled by `with_defaults`, and command-line flags override the result.
//! The defaults describe the CN radical in STO-3G scanned over 0.8-2.2 Å.

mod args;

pub use args::Args;

use crate::ci_impl::FciSettings;
use crate::scf_impl::ScfSettings;
use crate::solver::SolverSettings;
use crate::sweep::ScanPlan;
use basis::library::BasisLibrary;
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub molecule: MoleculeParams,
    #[serde(default)]
    pub basis: BasisParams,
    #[serde(default)]
    pub scan: ScanParams,
    #[serde(default)]
    pub scf_params: ScfParams,
    #[serde(default)]
    pub fci: FciParams,
    #[serde(default)]
    pub output: OutputParams,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoleculeParams {
    /// element at the origin
    pub first: Option<String>,
    /// element displaced along +z
    pub second: Option<String>,
    pub charge: Option<i32>,
    pub multiplicity: Option<usize>,
    pub symmetry: Option<bool>,
}

impl MoleculeParams {
    pub fn with_defaults(mut self) -> Self {
        self.first.get_or_insert_with(|| "C".to_string());
        self.second.get_or_insert_with(|| "N".to_string());
        self.charge.get_or_insert(0);
        self.multiplicity.get_or_insert(2);
        self.symmetry.get_or_insert(true);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BasisParams {
    pub name: Option<String>,
    /// directory searched for `<basis>.<element>.nwchem` before the bundled data
    pub local_dir: Option<String>,
    /// allow downloads from the Basis Set Exchange
    pub download: Option<bool>,
}

impl BasisParams {
    pub fn with_defaults(mut self) -> Self {
        self.name.get_or_insert_with(|| "sto-3g".to_string());
        self.download.get_or_insert(true);
        self
    }
}

/// Bond-length interval in angstrom, both ends included
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScanParams {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub points: Option<usize>,
}

impl ScanParams {
    pub fn with_defaults(mut self) -> Self {
        self.start.get_or_insert(0.8);
        self.stop.get_or_insert(2.2);
        self.points.get_or_insert(15);
        self
    }
}

/// SCF calculation parameters
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScfParams {
    pub max_cycle: Option<usize>,
    pub convergence_threshold: Option<f64>,
    /// 0 disables DIIS
    pub diis_subspace_size: Option<usize>,
    pub level_shift: Option<f64>,
}

impl ScfParams {
    pub fn with_defaults(mut self) -> Self {
        let defaults = ScfSettings::default();
        self.max_cycle.get_or_insert(defaults.max_cycle);
        self.convergence_threshold
            .get_or_insert(defaults.convergence_threshold);
        self.diis_subspace_size
            .get_or_insert(defaults.diis_subspace_size);
        self.level_shift.get_or_insert(defaults.level_shift);
        self
    }
}

/// CI parameters. A `null` active space correlates everything.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FciParams {
    pub n_roots: Option<usize>,
    #[serde(default = "default_active_orbitals")]
    pub n_active_orbitals: Option<usize>,
    #[serde(default = "default_active_electrons")]
    pub n_active_electrons: Option<usize>,
    pub davidson_tolerance: Option<f64>,
    pub max_iterations: Option<usize>,
    pub dense_threshold: Option<usize>,
    /// determinants diagonalised for the Davidson starting vectors
    pub guess_space: Option<usize>,
}

fn default_active_orbitals() -> Option<usize> {
    Some(8)
}

fn default_active_electrons() -> Option<usize> {
    Some(9)
}

impl Default for FciParams {
    fn default() -> Self {
        FciParams {
            n_roots: None,
            n_active_orbitals: default_active_orbitals(),
            n_active_electrons: default_active_electrons(),
            davidson_tolerance: None,
            max_iterations: None,
            dense_threshold: None,
            guess_space: None,
        }
    }
}

impl FciParams {
    pub fn with_defaults(mut self) -> Self {
        let defaults = FciSettings::default();
        self.n_roots.get_or_insert(defaults.n_roots);
        self.davidson_tolerance
            .get_or_insert(defaults.davidson_tolerance);
        self.max_iterations.get_or_insert(defaults.max_iterations);
        self.dense_threshold.get_or_insert(defaults.dense_threshold);
        self.guess_space.get_or_insert(defaults.guess_space);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputParams {
    pub log_file: Option<String>,
    pub plot_file: Option<String>,
    pub results_file: Option<String>,
}

impl OutputParams {
    pub fn with_defaults(mut self) -> Self {
        self.log_file.get_or_insert_with(|| "cn_fci.log".to_string());
        self.plot_file
            .get_or_insert_with(|| "cn_fci_curves.png".to_string());
        self
    }
}

impl Config {
    /// Apply default values to any missing configuration fields
    pub fn with_defaults(mut self) -> Self {
        self.molecule = self.molecule.with_defaults();
        self.basis = self.basis.with_defaults();
        self.scan = self.scan.with_defaults();
        self.scf_params = self.scf_params.with_defaults();
        self.fci = self.fci.with_defaults();
        self.output = self.output.with_defaults();
        self
    }

    /// Fold command-line overrides into the configuration.
    pub fn apply_args(mut self, args: &Args) -> Self {
        fn merge<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
        merge(&mut self.output.log_file, &args.log_file);
        merge(&mut self.output.plot_file, &args.plot_file);
        merge(&mut self.output.results_file, &args.results_file);
        merge(&mut self.basis.name, &args.basis);
        merge(&mut self.scan.points, &args.points);
        merge(&mut self.molecule.charge, &args.charge);
        merge(&mut self.molecule.multiplicity, &args.multiplicity);
        merge(&mut self.fci.n_active_orbitals, &args.n_active_orbitals);
        merge(&mut self.fci.n_active_electrons, &args.n_active_electrons);
        merge(&mut self.scf_params.max_cycle, &args.max_cycle);
        merge(
            &mut self.scf_params.convergence_threshold,
            &args.convergence_threshold,
        );
        merge(
            &mut self.scf_params.diis_subspace_size,
            &args.diis_subspace_size,
        );
        self
    }

    pub fn validate(&self) -> Result<()> {
        let start = self.scan.start.unwrap_or_default();
        let stop = self.scan.stop.unwrap_or_default();
        if !(start > 0.0 && stop >= start) {
            return Err(eyre!(
                "Scan interval [{}, {}] must be positive and ordered",
                start,
                stop
            ));
        }
        if self.scan.points.unwrap_or_default() == 0 {
            return Err(eyre!("The scan needs at least one point"));
        }
        if self.fci.n_roots.unwrap_or_default() < 2 {
            return Err(eyre!("At least two CI roots are required"));
        }
        if self.scf_params.convergence_threshold.unwrap_or_default() <= 0.0 {
            return Err(eyre!("The SCF convergence threshold must be positive"));
        }
        Ok(())
    }

    pub fn scan_plan(&self) -> ScanPlan {
        ScanPlan::evenly_spaced(
            self.molecule.first.as_deref().unwrap_or("C"),
            self.molecule.second.as_deref().unwrap_or("N"),
            self.scan.start.unwrap_or(0.8),
            self.scan.stop.unwrap_or(2.2),
            self.scan.points.unwrap_or(15),
            self.molecule.symmetry.unwrap_or(true),
        )
    }

    pub fn solver_settings(&self) -> SolverSettings {
        let scf_defaults = ScfSettings::default();
        let fci_defaults = FciSettings::default();

        let mut library = BasisLibrary::new();
        if let Some(dir) = &self.basis.local_dir {
            library = library.with_local_dir(dir);
        }
        if !self.basis.download.unwrap_or(true) {
            library = library.offline();
        }

        SolverSettings {
            basis: self
                .basis
                .name
                .clone()
                .unwrap_or_else(|| "sto-3g".to_string()),
            library,
            charge: self.molecule.charge.unwrap_or(0),
            multiplicity: self.molecule.multiplicity.unwrap_or(2),
            scf: ScfSettings {
                max_cycle: self.scf_params.max_cycle.unwrap_or(scf_defaults.max_cycle),
                convergence_threshold: self
                    .scf_params
                    .convergence_threshold
                    .unwrap_or(scf_defaults.convergence_threshold),
                diis_subspace_size: self
                    .scf_params
                    .diis_subspace_size
                    .unwrap_or(scf_defaults.diis_subspace_size),
                level_shift: self
                    .scf_params
                    .level_shift
                    .unwrap_or(scf_defaults.level_shift),
            },
            fci: FciSettings {
                n_roots: self.fci.n_roots.unwrap_or(fci_defaults.n_roots),
                dense_threshold: self
                    .fci
                    .dense_threshold
                    .unwrap_or(fci_defaults.dense_threshold),
                davidson_tolerance: self
                    .fci
                    .davidson_tolerance
                    .unwrap_or(fci_defaults.davidson_tolerance),
                max_iterations: self
                    .fci
                    .max_iterations
                    .unwrap_or(fci_defaults.max_iterations),
                guess_space: self.fci.guess_space.unwrap_or(fci_defaults.guess_space),
                ..fci_defaults
            },
            n_active_orbitals: self.fci.n_active_orbitals,
            n_active_electrons: self.fci.n_active_electrons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default().with_defaults();
        assert_eq!(config.molecule.first.as_deref(), Some("C"));
        assert_eq!(config.molecule.second.as_deref(), Some("N"));
        assert_eq!(config.molecule.multiplicity, Some(2));
        assert_eq!(config.basis.name.as_deref(), Some("sto-3g"));
        assert_eq!(config.scan.points, Some(15));
        assert_eq!(config.fci.n_roots, Some(2));
        assert_eq!(config.fci.n_active_orbitals, Some(8));
        assert_eq!(config.fci.n_active_electrons, Some(9));
        assert_eq!(config.fci.guess_space, Some(400));
        assert_eq!(config.output.log_file.as_deref(), Some("cn_fci.log"));
        assert!(config.validate().is_ok());

        let plan = config.scan_plan();
        assert_eq!(plan.distances.len(), 15);
        assert_eq!(plan.distances[0], 0.8);
        assert_eq!(plan.distances[14], 2.2);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
molecule:
  first: C
  second: N
  multiplicity: 2

basis:
  name: "STO-3G"
  download: false

scan:
  start: 1.0
  stop: 1.4
  points: 5

scf_params:
  max_cycle: 50
  diis_subspace_size: 6

fci:
  n_active_orbitals: null
  n_active_electrons: null
"#;
        let config: Config = serde_yml::from_str::<Config>(yaml).unwrap().with_defaults();
        assert_eq!(config.scan.points, Some(5));
        assert_eq!(config.scf_params.max_cycle, Some(50));
        assert_eq!(config.scf_params.level_shift, Some(0.5));
        assert_eq!(config.fci.n_active_orbitals, None);

        let settings = config.solver_settings();
        assert_eq!(settings.basis, "STO-3G");
        assert_eq!(settings.scf.diis_subspace_size, 6);
        assert_eq!(settings.n_active_electrons, None);
    }

    #[test]
    fn test_missing_fci_section_keeps_active_space() {
        let config: Config = serde_yml::from_str::<Config>("basis:\n  name: sto-3g\n")
            .unwrap()
            .with_defaults();
        assert_eq!(config.fci.n_active_orbitals, Some(8));
        assert_eq!(config.fci.n_active_electrons, Some(9));
    }

    #[test]
    fn test_partial_fci_section_keeps_active_space() {
        let config: Config = serde_yml::from_str::<Config>("fci:\n  n_roots: 3\n")
            .unwrap()
            .with_defaults();
        assert_eq!(config.fci.n_roots, Some(3));
        assert_eq!(config.fci.n_active_orbitals, Some(8));
    }

    #[test]
    fn test_args_override_config() {
        let args = Args {
            points: Some(3),
            basis: Some("6-31g".to_string()),
            charge: Some(-1),
            multiplicity: Some(1),
            diis_subspace_size: Some(0),
            ..Args::default()
        };
        let config = Config::default().with_defaults().apply_args(&args);
        assert_eq!(config.scan.points, Some(3));
        assert_eq!(config.basis.name.as_deref(), Some("6-31g"));
        let settings = config.solver_settings();
        assert_eq!(settings.charge, -1);
        assert_eq!(settings.multiplicity, 1);
        assert_eq!(settings.scf.diis_subspace_size, 0);
        assert_eq!(settings.scf.max_cycle, 100);
    }

    #[test]
    fn test_invalid_scan_rejected() {
        let mut config = Config::default().with_defaults();
        config.scan.start = Some(2.0);
        config.scan.stop = Some(1.0);
        assert!(config.validate().is_err());

        let mut config = Config::default().with_defaults();
        config.fci.n_roots = Some(1);
        assert!(config.validate().is_err());
    }
}
