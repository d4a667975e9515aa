//! Gaussian basis functions and molecular integrals.
//!
//! `gto` holds primitive Cartesian Gaussians and the McMurchie–Davidson
//! integrals, `cgto` contracts them into shells read from NWChem-format
//! basis files, and `library` resolves a basis-set name to data, either
//! bundled with the crate or downloaded from the Basis Set Exchange.

pub mod basis;
pub mod cgto;
pub mod gto;
pub mod helper;
pub mod library;

#[cfg(test)]
mod gto_test;
