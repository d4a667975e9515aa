//! Configuration Interaction (CI) module
//!
//! Full CI over the active space produced by the frozen-core transformation.
//! The determinant basis is the alpha/beta string product of
//! [`crate::fock_space::FockSector`]; the lowest roots come from dense
//! diagonalisation for small spaces and from a Davidson solver otherwise.
//! Davidson starts from the eigenvectors of `H` over the determinants with
//! the lowest diagonal energies, built from Slater-Condon matrix elements.
//! Sigma builds never mix spatial symmetries, so the starting vectors must
//! already contain every symmetry the lowest roots may have.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cn_fci::ci_impl::{FciSettings, FCI};
//!
//! // after the reference calculation and active-space transformation
//! let fci = FCI::new(&active, FciSettings::default());
//! let result = fci.solve()?;
//! println!("E0 = {}, E1 = {}", result.energies[0], result.energies[1]);
//! ```

mod davidson;
mod fci;
mod tests;

pub use davidson::{diagonal_guess, lowest_diagonal, Davidson, DavidsonEngine, DavidsonError};
pub use fci::{Diagonalizer, FciResult, FciSettings, FCI};
