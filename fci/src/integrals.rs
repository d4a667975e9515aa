//! AO integrals, the MO transformation and the frozen-core active space
//!
//! Electron-repulsion integrals are kept in chemists' notation `(pq|rs)` with
//! eightfold permutational symmetry packed into a flat buffer.

extern crate nalgebra as na;

use crate::fock_space::MAX_ORBITALS;
use crate::geometry::Molecule;
use basis::basis::{AOBasis, Basis};
use basis::library::BasisLibrary;
use color_eyre::eyre::{eyre, Result, WrapErr};
use na::DMatrix;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

#[inline]
fn pair_index(i: usize, j: usize) -> usize {
    if i >= j {
        i * (i + 1) / 2 + j
    } else {
        j * (j + 1) / 2 + i
    }
}

/// Two-electron integrals `(pq|rs)` over `n` real orbitals.
#[derive(Debug, Clone)]
pub struct EriTensor {
    n: usize,
    data: Vec<f64>,
}

impl EriTensor {
    pub fn zeros(n: usize) -> Self {
        let n_pair = n * (n + 1) / 2;
        EriTensor {
            n,
            data: vec![0.0; n_pair * (n_pair + 1) / 2],
        }
    }

    /// Build from a closure evaluated once per symmetry-unique quartet.
    pub fn from_fn<F>(n: usize, f: F) -> Self
    where
        F: Fn(usize, usize, usize, usize) -> f64 + Sync,
    {
        let n_pair = n * (n + 1) / 2;
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (0..=i).map(move |j| (i, j)))
            .collect();

        // pairs[ij] has pair_index == ij, so quartet ordering matches `data`
        let quartets: Vec<(usize, usize)> = (0..n_pair)
            .flat_map(|ij| (0..=ij).map(move |kl| (ij, kl)))
            .collect();

        let data: Vec<f64> = quartets
            .par_iter()
            .map(|&(ij, kl)| {
                let (i, j) = pairs[ij];
                let (k, l) = pairs[kl];
                f(i, j, k, l)
            })
            .collect();

        EriTensor { n, data }
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, p: usize, q: usize, r: usize, s: usize) -> f64 {
        self.data[pair_index(pair_index(p, q), pair_index(r, s))]
    }

    pub fn set(&mut self, p: usize, q: usize, r: usize, s: usize, value: f64) {
        let idx = pair_index(pair_index(p, q), pair_index(r, s));
        self.data[idx] = value;
    }

    /// Four-index transformation `(pq|rs) = sum C_mp C_nq C_lr C_ss (mn|ls)`,
    /// done one index at a time.
    pub fn transform(&self, coeffs: &DMatrix<f64>) -> EriTensor {
        let n_ao = self.n;
        let n_mo = coeffs.ncols();

        // (mn|ls) -> (mn|rs)
        let mut half = vec![0.0; n_ao * n_ao * n_mo * n_mo];
        half.par_chunks_mut(n_mo * n_mo)
            .enumerate()
            .for_each(|(mn, chunk)| {
                let (m, nu) = (mn / n_ao, mn % n_ao);
                let mut tmp = DMatrix::<f64>::zeros(n_ao, n_mo);
                for l in 0..n_ao {
                    for s in 0..n_ao {
                        let v = self.get(m, nu, l, s);
                        if v == 0.0 {
                            continue;
                        }
                        for b in 0..n_mo {
                            tmp[(l, b)] += v * coeffs[(s, b)];
                        }
                    }
                }
                let rs = coeffs.transpose() * tmp;
                for r in 0..n_mo {
                    for s in 0..n_mo {
                        chunk[r * n_mo + s] = rs[(r, s)];
                    }
                }
            });

        EriTensor::from_fn(n_mo, |p, q, r, s| {
            let mut value = 0.0;
            for m in 0..n_ao {
                let c_mp = coeffs[(m, p)];
                if c_mp == 0.0 {
                    continue;
                }
                for nu in 0..n_ao {
                    value += c_mp * coeffs[(nu, q)] * half[(m * n_ao + nu) * n_mo * n_mo + r * n_mo + s];
                }
            }
            value
        })
    }
}

/// Gather the basis functions of every atom, centred on the atom positions.
pub fn assemble_basis<A: AOBasis>(
    molecule: &Molecule,
    mut atoms: Vec<A>,
) -> Vec<Arc<A::BasisType>> {
    let mut functions = Vec::new();
    for (atom, coord) in atoms.iter_mut().zip(&molecule.coords) {
        atom.set_center(*coord);
        functions.extend(atom.get_basis());
    }
    functions
}

/// Load one atomic basis per atom of `molecule`.
pub fn load_atomic_bases(
    molecule: &Molecule,
    library: &BasisLibrary,
    basis_name: &str,
) -> Result<Vec<basis::cgto::AtomicBasis>> {
    molecule
        .elements
        .iter()
        .map(|element| {
            library
                .load(basis_name, element.get_symbol())
                .wrap_err_with(|| {
                    format!(
                        "Unable to load basis '{}' for element {}",
                        basis_name,
                        element.get_symbol()
                    )
                })
        })
        .collect()
}

/// Overlap, core Hamiltonian, ERIs and nuclear repulsion in the AO basis.
#[derive(Debug, Clone)]
pub struct AoIntegrals {
    pub n_basis: usize,
    pub overlap: DMatrix<f64>,
    pub h_core: DMatrix<f64>,
    pub eri: EriTensor,
    pub nuclear_repulsion: f64,
}

impl AoIntegrals {
    /// Load the basis for every atom, place it and evaluate all integrals.
    pub fn for_molecule(
        molecule: &Molecule,
        library: &BasisLibrary,
        basis_name: &str,
    ) -> Result<Self> {
        let atoms = load_atomic_bases(molecule, library, basis_name)?;
        let functions = assemble_basis(molecule, atoms);
        if functions.is_empty() {
            return Err(eyre!("Basis '{}' provides no functions", basis_name));
        }
        Ok(Self::compute(molecule, &functions))
    }

    pub fn compute<B: Basis + Send + Sync>(molecule: &Molecule, functions: &[Arc<B>]) -> Self {
        let n = functions.len();
        info!("Computing AO integrals over {} basis functions", n);

        let ij_pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .collect();

        let overlap_values: Vec<f64> = ij_pairs
            .par_iter()
            .map(|&(i, j)| B::Sab(&functions[i], &functions[j]))
            .collect();

        let h_values: Vec<f64> = ij_pairs
            .par_iter()
            .map(|&(i, j)| {
                let kinetic = B::Tab(&functions[i], &functions[j]);
                let nuclear: f64 = molecule
                    .coords
                    .iter()
                    .zip(&molecule.elements)
                    .map(|(coord, elem)| {
                        B::Vab(
                            &functions[i],
                            &functions[j],
                            *coord,
                            elem.get_atomic_number() as u32,
                        )
                    })
                    .sum();
                kinetic + nuclear
            })
            .collect();

        let overlap = DMatrix::from_fn(n, n, |i, j| overlap_values[i * n + j]);
        let h_core = DMatrix::from_fn(n, n, |i, j| h_values[i * n + j]);

        let eri = EriTensor::from_fn(n, |i, j, k, l| {
            B::JKabcd(&functions[i], &functions[j], &functions[k], &functions[l])
        });

        AoIntegrals {
            n_basis: n,
            overlap,
            h_core,
            eri,
            nuclear_repulsion: molecule.nuclear_repulsion(),
        }
    }

    /// Coulomb and exchange matrices for a density `P` (no spin factors).
    pub fn coulomb_exchange(&self, density: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = self.n_basis;
        let ij_pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .collect();

        let jk_values: Vec<(f64, f64)> = ij_pairs
            .par_iter()
            .map(|&(i, j)| {
                let mut j_ij = 0.0;
                let mut k_ij = 0.0;
                for k in 0..n {
                    for l in 0..n {
                        let p_kl = density[(k, l)];
                        j_ij += p_kl * self.eri.get(i, j, k, l);
                        k_ij += p_kl * self.eri.get(i, k, j, l);
                    }
                }
                (j_ij, k_ij)
            })
            .collect();

        let j = DMatrix::from_fn(n, n, |i, jj| jk_values[i * n + jj].0);
        let k = DMatrix::from_fn(n, n, |i, jj| jk_values[i * n + jj].1);
        (j, k)
    }
}

/// Integrals of the correlated orbital window after freezing the core.
#[derive(Debug, Clone)]
pub struct ActiveSpace {
    pub n_core: usize,
    pub n_orbitals: usize,
    pub n_alpha: usize,
    pub n_beta: usize,
    /// nuclear repulsion plus the frozen-core energy
    pub core_energy: f64,
    pub h_eff: DMatrix<f64>,
    pub eri: EriTensor,
}

impl ActiveSpace {
    /// Freeze the lowest `n_core` orbitals of `coeffs` and transform the next
    /// `n_active` orbitals. `n_active = None` keeps every remaining orbital.
    pub fn build(
        ao: &AoIntegrals,
        coeffs: &DMatrix<f64>,
        n_alpha: usize,
        n_beta: usize,
        n_active: Option<usize>,
        n_active_electrons: Option<usize>,
    ) -> Result<Self> {
        let n_mo = coeffs.ncols();
        let n_electrons = n_alpha + n_beta;
        let n_active_electrons = n_active_electrons.unwrap_or(n_electrons);
        if n_active_electrons > n_electrons {
            return Err(eyre!(
                "Active electron count {} exceeds the {} electrons of the molecule",
                n_active_electrons,
                n_electrons
            ));
        }
        if (n_electrons - n_active_electrons) % 2 != 0 {
            return Err(eyre!(
                "Frozen electrons ({}) must fill closed shells",
                n_electrons - n_active_electrons
            ));
        }
        let n_core = (n_electrons - n_active_electrons) / 2;
        if n_core > n_beta {
            return Err(eyre!(
                "Cannot freeze {} core orbitals with only {} beta electrons",
                n_core,
                n_beta
            ));
        }
        let n_orbitals = n_active.unwrap_or(n_mo - n_core);
        if n_orbitals == 0 {
            return Err(eyre!("The active space must contain at least one orbital"));
        }
        if n_core + n_orbitals > n_mo {
            return Err(eyre!(
                "Active space of {} orbitals above {} core orbitals exceeds {} molecular orbitals",
                n_orbitals,
                n_core,
                n_mo
            ));
        }
        if n_orbitals > MAX_ORBITALS {
            return Err(eyre!(
                "Active space of {} orbitals exceeds the {}-orbital limit of the determinant strings",
                n_orbitals,
                MAX_ORBITALS
            ));
        }
        let act_alpha = n_alpha - n_core;
        let act_beta = n_beta - n_core;
        if act_alpha > n_orbitals || act_beta > n_orbitals {
            return Err(eyre!(
                "{} alpha / {} beta electrons do not fit into {} active orbitals",
                act_alpha,
                act_beta,
                n_orbitals
            ));
        }

        // frozen-core density and its mean field
        let core = coeffs.columns(0, n_core);
        let core_density = 2.0 * &core * core.transpose();
        let (j, k) = ao.coulomb_exchange(&core_density);
        let core_fock = &ao.h_core + j - 0.5 * k;
        let core_energy = ao.nuclear_repulsion
            + 0.5 * (core_density.component_mul(&(&ao.h_core + &core_fock))).sum();

        let active = coeffs.columns(n_core, n_orbitals).into_owned();
        let h_eff = active.transpose() * core_fock * &active;
        let eri = ao.eri.transform(&active);

        info!(
            "Active space: {} frozen core orbitals, ({}e, {}o), E_core = {:.10} Eh",
            n_core,
            act_alpha + act_beta,
            n_orbitals,
            core_energy
        );

        Ok(ActiveSpace {
            n_core,
            n_orbitals,
            n_alpha: act_alpha,
            n_beta: act_beta,
            core_energy,
            h_eff,
            eri,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn random_eri(n: usize) -> EriTensor {
        EriTensor::from_fn(n, |i, j, k, l| {
            let x = (i + 1) as f64 * 0.37 + (j + 1) as f64 * 0.11;
            let y = (k + 1) as f64 * 0.37 + (l + 1) as f64 * 0.11;
            (x * y).sin() + (x + y).cos() * 0.25
                + if (i, j) == (k, l) || (i, j) == (l, k) { 1.0 } else { 0.0 }
        })
    }

    #[test]
    fn test_eri_permutational_symmetry() {
        let eri = random_eri(4);
        for (p, q, r, s) in [(0, 1, 2, 3), (3, 2, 1, 0), (1, 1, 0, 2)] {
            let v = eri.get(p, q, r, s);
            assert_eq!(v, eri.get(q, p, r, s));
            assert_eq!(v, eri.get(p, q, s, r));
            assert_eq!(v, eri.get(r, s, p, q));
            assert_eq!(v, eri.get(s, r, q, p));
        }
    }

    #[test]
    fn test_transform_matches_direct_sum() {
        let eri = random_eri(3);
        let c = DMatrix::from_row_slice(3, 2, &[0.8, 0.1, -0.3, 0.7, 0.2, -0.5]);
        let mo = eri.transform(&c);
        for (p, q, r, s) in [(0, 0, 0, 0), (0, 1, 1, 0), (1, 1, 0, 1), (1, 0, 1, 1)] {
            let mut direct = 0.0;
            for a in 0..3 {
                for b in 0..3 {
                    for g in 0..3 {
                        for d in 0..3 {
                            direct += c[(a, p)] * c[(b, q)] * c[(g, r)] * c[(d, s)]
                                * eri.get(a, b, g, d);
                        }
                    }
                }
            }
            assert_relative_eq!(mo.get(p, q, r, s), direct, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_identity_transform_is_noop() {
        let eri = random_eri(3);
        let mo = eri.transform(&DMatrix::identity(3, 3));
        for p in 0..3 {
            for q in 0..3 {
                assert_relative_eq!(mo.get(p, q, 1, 2), eri.get(p, q, 1, 2), epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_set_updates_every_permutation() {
        let mut eri = EriTensor::zeros(3);
        eri.set(2, 0, 1, 1, 0.5);
        assert_eq!(eri.get(1, 1, 0, 2), 0.5);
        assert_eq!(eri.dim(), 3);
    }

    #[test]
    fn test_oversized_active_space_is_an_error() {
        let n = MAX_ORBITALS + 1;
        let ao = AoIntegrals {
            n_basis: n,
            overlap: DMatrix::identity(n, n),
            h_core: DMatrix::zeros(n, n),
            eri: EriTensor::zeros(n),
            nuclear_repulsion: 0.0,
        };
        let coeffs = DMatrix::identity(n, n);
        let err = ActiveSpace::build(&ao, &coeffs, 1, 1, None, None).unwrap_err();
        assert!(err.to_string().contains("64-orbital limit"));
        assert!(ActiveSpace::build(&ao, &coeffs, 1, 1, Some(4), None).is_ok());
    }
}
