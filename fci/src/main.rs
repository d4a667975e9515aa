//! CN full-CI potential-energy scan
//!
//! Entry point: reads the optional YAML configuration, runs the scan and
//! writes the log, the plot and optionally a JSON results file.

use cn_fci::app::CnFciApplication;
use color_eyre::eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    CnFciApplication::from_cli()?.run()?;
    Ok(())
}
