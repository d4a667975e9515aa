// Main library file for the CN FCI scan

pub mod app;
pub mod ci_impl;
pub mod config;
pub mod fock_space;
pub mod geometry;
pub mod integrals;
pub mod io;
pub mod plot;
pub mod scf_impl;
pub mod solver;
pub mod sweep;
