#![allow(non_snake_case)]
use nalgebra::Vector3;
use std::sync::Arc;

/// A single real basis function together with its one- and two-electron
/// integrals. Positions and exponents are in atomic units (bohr).
pub trait Basis {
    fn evaluate(&self, r: &Vector3<f64>) -> f64;
    // overlap integral <a|b>
    fn Sab(a: &Self, b: &Self) -> f64;
    // kinetic integral <a|-1/2 nabla^2|b>
    fn Tab(a: &Self, b: &Self) -> f64;
    // nuclear attraction <a|-Z/|r-R||b>
    fn Vab(a: &Self, b: &Self, R: Vector3<f64>, Z: u32) -> f64;
    // electron repulsion (ab|cd) in chemists' notation
    fn JKabcd(a: &Self, b: &Self, c: &Self, d: &Self) -> f64;
}

/// The set of basis functions that belong to one atom.
pub trait AOBasis {
    type BasisType: Basis;

    fn basis_size(&self) -> usize;
    fn get_basis(&self) -> Vec<Arc<Self::BasisType>>;
    fn set_center(&mut self, center: Vector3<f64>);
    fn get_center(&self) -> Option<Vector3<f64>>;
}
