//! Logging setup and result files

use crate::sweep::ScanResults;
use color_eyre::eyre::{Result, WrapErr};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    filter::LevelFilter, fmt::format::Writer, fmt::layer, fmt::time::FormatTime,
    layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = StdSystemTime::now();
        let duration = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        // HH:MM:SS
        let total_seconds = duration.as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Log to stdout and, when a path is given, to that file as well.
///
/// Fails if the log file cannot be created. A subscriber that is already
/// installed is kept, so calling this twice is harmless.
pub fn setup_output(log_path: Option<&str>) -> Result<()> {
    let stdout_layer = layer()
        .with_writer(std::io::stdout)
        .with_timer(SecondPrecisionTimer)
        .with_ansi(true)
        .with_filter(LevelFilter::INFO);

    let file_layer = match log_path {
        Some(path) => {
            let log = File::create(path)
                .wrap_err_with(|| format!("Unable to create log file: {}", path))?;
            Some(
                layer()
                    .with_writer(log)
                    .with_timer(SecondPrecisionTimer)
                    .with_ansi(false)
                    .with_filter(LevelFilter::INFO),
            )
        }
        None => None,
    };

    if Registry::default()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        return Ok(());
    }

    match log_path {
        Some(path) => info!("Log will be written to: {}", path),
        None => info!("Output will be printed to stdout"),
    }
    Ok(())
}

/// Write the scan as pretty-printed JSON.
pub fn write_results_json(path: &Path, results: &ScanResults) -> Result<()> {
    results.check_consistency()?;
    let file = File::create(path)
        .wrap_err_with(|| format!("Unable to create results file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, results).wrap_err("Failed to serialise scan results")?;
    writeln!(writer)?;
    writer.flush()?;
    info!("Scan results written to {}", path.display());
    Ok(())
}

/// Fixed-width table of the scan, one row per distance.
pub fn print_scan_table<W: Write>(writer: &mut W, results: &ScanResults) -> Result<()> {
    writeln!(
        writer,
        "{:>10} {:>18} {:>18} {:>18} {:>8} {:>8}",
        "R (Å)", "E(SCF) / Eh", "E(S0) / Eh", "E(S1) / Eh", "<S2>_0", "<S2>_1"
    )?;
    for i in 0..results.len() {
        writeln!(
            writer,
            "{:>10.4} {:>18.10} {:>18.10} {:>18.10} {:>8.4} {:>8.4}",
            results.distances[i],
            results.scf_energies[i],
            results.ground[i],
            results.excited[i],
            results.s_squared_ground[i],
            results.s_squared_excited[i]
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverOutput;

    fn sample_results() -> ScanResults {
        let mut results = ScanResults::new("sto-3g");
        for (i, r) in [1.0, 1.2].iter().enumerate() {
            results.push(
                *r,
                &SolverOutput {
                    ground: -91.5 - 0.1 * i as f64,
                    excited: -91.4 - 0.1 * i as f64,
                    scf_energy: -91.2,
                    s_squared: [0.75, 0.75],
                    orbitals: nalgebra::DMatrix::zeros(0, 0),
                },
            );
        }
        results
    }

    #[test]
    fn test_results_json_round_trip() {
        let path = std::env::temp_dir().join(format!("cn_fci_results_{}.json", std::process::id()));
        let results = sample_results();
        write_results_json(&path, &results).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: ScanResults = serde_json::from_str(&text).unwrap();
        assert_eq!(back, results);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_inconsistent_results_not_written() {
        let path = std::env::temp_dir().join(format!("cn_fci_bad_{}.json", std::process::id()));
        let mut results = sample_results();
        results.excited.pop();
        assert!(write_results_json(&path, &results).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_scan_table_rows() {
        let mut buffer = Vec::new();
        print_scan_table(&mut buffer, &sample_results()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("-91.5000000000"));
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let path = std::env::temp_dir()
            .join(format!("cn_fci_missing_{}", std::process::id()))
            .join("run.log");
        let err = setup_output(path.to_str()).unwrap_err();
        assert!(err.to_string().contains("Unable to create log file"));
    }
}
