//! Command-line argument parsing for the CN FCI scan

use clap::Parser;

/// FCI potential-energy scan of a diatomic with YAML configuration
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config_file: Option<String>,

    /// Override the log file path
    #[arg(long)]
    pub log_file: Option<String>,

    /// Override the plot file path (.png or .svg)
    #[arg(long)]
    pub plot_file: Option<String>,

    /// Write the scan results as JSON to this path
    #[arg(long)]
    pub results_file: Option<String>,

    /// Override the basis set name
    #[arg(long)]
    pub basis: Option<String>,

    /// Override the number of scan points
    #[arg(long)]
    pub points: Option<usize>,

    /// Molecular charge
    #[arg(long)]
    pub charge: Option<i32>,

    /// Spin multiplicity (2S+1)
    #[arg(long)]
    pub multiplicity: Option<usize>,

    /// Number of active orbitals
    #[arg(long)]
    pub n_active_orbitals: Option<usize>,

    /// Number of active electrons
    #[arg(long)]
    pub n_active_electrons: Option<usize>,

    /// Override maximum SCF cycles
    #[arg(long)]
    pub max_cycle: Option<usize>,

    /// Override SCF convergence threshold
    #[arg(long)]
    pub convergence_threshold: Option<f64>,

    /// Override DIIS subspace size (0 disables DIIS)
    #[arg(long)]
    pub diis_subspace_size: Option<usize>,
}
