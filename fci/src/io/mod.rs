//! Input/Output operations for the scan
//!
//! This module handles logging setup and the result files.

mod output;

pub use output::{print_scan_table, setup_output, write_results_json};
