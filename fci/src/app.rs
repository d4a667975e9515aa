use crate::config::{Args, Config};
use crate::io::{print_scan_table, setup_output, write_results_json};
use crate::plot::{plot_energy_curves, PlotStyle};
use crate::sweep::{run_scan, ScanResults};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use std::path::Path;
use tracing::info;

pub struct CnFciApplication {
    config: Config,
}

impl CnFciApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        Self::from_args(&args)
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let config = load_config(args)?.apply_args(args);
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(self) -> Result<ScanResults> {
        setup_output(self.config.output.log_file.as_deref())?;
        info!("Configuration:\n{:?}", self.config);

        let plan = self.config.scan_plan();
        let settings = self.config.solver_settings();
        info!(
            "Scanning {}-{} over {} points in basis {} (charge {}, multiplicity {})",
            plan.first,
            plan.second,
            plan.distances.len(),
            settings.basis,
            settings.charge,
            settings.multiplicity
        );

        let results = run_scan(&plan, &settings)?;

        let mut table = Vec::new();
        print_scan_table(&mut table, &results)?;
        info!("\n{}", String::from_utf8_lossy(&table));
        if let Some((r, e)) = results.minimum() {
            info!("Lowest ground-state energy {:.10} Eh at {:.4} Angstrom", e, r);
        }

        if let Some(path) = &self.config.output.results_file {
            write_results_json(Path::new(path), &results)?;
        }
        if let Some(path) = &self.config.output.plot_file {
            plot_energy_curves(
                &results.distances,
                &results.ground,
                &results.excited,
                Path::new(path),
                &PlotStyle::default(),
            )
            .wrap_err_with(|| format!("Failed to render plot {}", path))?;
        }
        Ok(results)
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let Some(path) = &args.config_file else {
        return Ok(Config::default().with_defaults());
    };
    let config_content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", path))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    Ok(config)
}
