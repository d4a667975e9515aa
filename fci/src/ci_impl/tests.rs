//! Tests for the FCI implementation

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::geometry::Molecule;
    use crate::integrals::{ActiveSpace, AoIntegrals, EriTensor};
    use crate::scf_impl::{run_reference, ScfSettings, ScfSummary};
    use approx::assert_relative_eq;
    use basis::library::BasisLibrary;
    use nalgebra::{DMatrix, DVector, Vector3};
    use periodic_table_on_an_enum::Element;
    use std::sync::Arc;

    fn hydrogen_chain(
        positions: &[f64],
        charge: i32,
        multiplicity: usize,
    ) -> (Arc<AoIntegrals>, ScfSummary) {
        let h = Element::from_symbol("H").unwrap();
        let molecule = Molecule::new(
            vec![h; positions.len()],
            positions.iter().map(|&z| Vector3::new(0.0, 0.0, z)).collect(),
            charge,
            multiplicity,
            false,
        )
        .unwrap();
        let ao = Arc::new(
            AoIntegrals::for_molecule(&molecule, &BasisLibrary::new().offline(), "sto-3g").unwrap(),
        );
        let scf = run_reference(&molecule, ao.clone(), ScfSettings::default()).unwrap();
        (ao, scf)
    }

    fn full_space(ao: &AoIntegrals, scf: &ScfSummary) -> ActiveSpace {
        ActiveSpace::build(ao, &scf.mo_coeffs, scf.n_alpha, scf.n_beta, None, None).unwrap()
    }

    #[test]
    fn test_h2_fci_equals_two_determinant_ci() {
        let (ao, scf) = hydrogen_chain(&[0.0, 1.4], 0, 1);
        let active = full_space(&ao, &scf);
        let result = FCI::new(&active, FciSettings::default()).solve().unwrap();

        // |g^2> and |u^2> are the only determinants of Sigma_g+ symmetry
        let h = &active.h_eff;
        let g = &active.eri;
        let e_gg = 2.0 * h[(0, 0)] + g.get(0, 0, 0, 0);
        let e_uu = 2.0 * h[(1, 1)] + g.get(1, 1, 1, 1);
        let k = g.get(0, 1, 1, 0);
        let ci = DMatrix::from_row_slice(2, 2, &[e_gg, k, k, e_uu]);
        let lowest = ci.symmetric_eigen().eigenvalues.min() + active.core_energy;

        assert_relative_eq!(result.energies[0], lowest, epsilon = 1e-10);
        // Szabo & Ostlund: E(FCI) = -1.1373 Eh
        assert_relative_eq!(result.energies[0], -1.1373, epsilon = 1e-4);
        assert!(result.energies[0] < scf.energy);
        assert_eq!(result.diagonalizer, Diagonalizer::Dense);
        assert_eq!(result.dimension, 4);
    }

    #[test]
    fn test_h2_spin_of_roots() {
        let (ao, scf) = hydrogen_chain(&[0.0, 1.4], 0, 1);
        let active = full_space(&ao, &scf);
        let result = FCI::new(&active, FciSettings::default()).solve().unwrap();
        assert_relative_eq!(result.s_squared[0], 0.0, epsilon = 1e-8);
        // first excited state is the sigma_g sigma_u triplet
        assert_relative_eq!(result.s_squared[1], 2.0, epsilon = 1e-8);
        assert!(result.energies[0] <= result.energies[1]);
    }

    #[test]
    fn test_one_electron_fci_matches_reference() {
        let (ao, scf) = hydrogen_chain(&[0.0, 1.4], 1, 2);
        let active = full_space(&ao, &scf);
        let result = FCI::new(&active, FciSettings::default()).solve().unwrap();
        assert_relative_eq!(result.energies[0], scf.energy, epsilon = 1e-8);
        assert_relative_eq!(result.s_squared[0], 0.75, epsilon = 1e-10);
    }

    #[test]
    fn test_davidson_agrees_with_dense() {
        let (ao, scf) = hydrogen_chain(&[0.0, 1.5, 3.0, 4.5], 0, 1);
        let active = full_space(&ao, &scf);

        let dense_settings = FciSettings {
            n_roots: 3,
            ..FciSettings::default()
        };
        let dense = FCI::new(&active, dense_settings.clone()).solve().unwrap();
        assert_eq!(dense.diagonalizer, Diagonalizer::Dense);

        let davidson_settings = FciSettings {
            dense_threshold: 0,
            davidson_tolerance: 1e-8,
            ..dense_settings
        };
        let iterative = FCI::new(&active, davidson_settings).solve().unwrap();
        assert_eq!(iterative.diagonalizer, Diagonalizer::Davidson);
        assert_eq!(iterative.dimension, 36);

        for (a, b) in dense.energies.iter().zip(&iterative.energies) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
        for (a, b) in dense.s_squared.iter().zip(&iterative.s_squared) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_frozen_core_matches_full_space_for_empty_core() {
        let (ao, scf) = hydrogen_chain(&[0.0, 1.5, 3.0, 4.5], 0, 1);
        let full = full_space(&ao, &scf);
        let explicit = ActiveSpace::build(&ao, &scf.mo_coeffs, 2, 2, Some(4), Some(4)).unwrap();
        assert_eq!(explicit.n_core, 0);
        assert_relative_eq!(full.core_energy, explicit.core_energy, epsilon = 1e-12);
        let a = FCI::new(&full, FciSettings::default()).solve().unwrap();
        let b = FCI::new(&explicit, FciSettings::default()).solve().unwrap();
        assert_relative_eq!(a.energies[0], b.energies[0], epsilon = 1e-12);
    }

    #[test]
    fn test_frozen_core_single_determinant() {
        // freezing both electrons leaves only the reference determinant
        let (ao, scf) = hydrogen_chain(&[0.0, 1.4], 0, 1);
        let active = ActiveSpace::build(&ao, &scf.mo_coeffs, 1, 1, Some(1), Some(0)).unwrap();
        assert_eq!(active.n_core, 1);
        let result = FCI::new(
            &active,
            FciSettings {
                n_roots: 1,
                ..FciSettings::default()
            },
        )
        .solve()
        .unwrap();
        assert_relative_eq!(result.energies[0], scf.energy, epsilon = 1e-8);
    }

    #[test]
    fn test_active_space_validation() {
        let (ao, scf) = hydrogen_chain(&[0.0, 1.4], 0, 1);
        // odd number of frozen electrons
        assert!(ActiveSpace::build(&ao, &scf.mo_coeffs, 1, 1, Some(2), Some(1)).is_err());
        // more orbitals than exist
        assert!(ActiveSpace::build(&ao, &scf.mo_coeffs, 1, 1, Some(3), None).is_err());
        // more electrons than the molecule has
        assert!(ActiveSpace::build(&ao, &scf.mo_coeffs, 1, 1, Some(2), Some(4)).is_err());
    }

    fn model_integrals(n: usize) -> (DMatrix<f64>, EriTensor) {
        let h = DMatrix::from_fn(n, n, |p, q| {
            if p == q {
                -2.0 + 0.5 * p as f64
            } else {
                0.1 / (1.0 + (p as f64 - q as f64).abs())
            }
        });
        let eri = EriTensor::from_fn(n, |p, q, r, s| {
            let pq = if p == q { 1.0 } else { 0.2 / (1 + p + q) as f64 };
            let rs = if r == s { 1.0 } else { 0.2 / (1 + r + s) as f64 };
            0.6 * pq * rs
        });
        (h, eri)
    }

    #[test]
    fn test_hamiltonian_diagonal_matches_slater_condon() {
        let (h, eri) = model_integrals(4);
        let fci = FCI::from_integrals(h, eri, 0.0, 2, 1, FciSettings::default());
        let matrix = fci.hamiltonian_matrix();
        let diagonal = DavidsonEngine::diagonal(&fci);
        for i in 0..fci.dim() {
            assert_relative_eq!(matrix[(i, i)], diagonal[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sigma_is_symmetric() {
        let (h, eri) = model_integrals(4);
        let fci = FCI::from_integrals(h, eri, 0.0, 2, 2, FciSettings::default());
        let dim = fci.dim();
        let unit = |i: usize| {
            let mut v = DVector::zeros(dim);
            v[i] = 1.0;
            v
        };
        for (i, j) in [(0, 5), (3, 17), (10, 35), (7, 7)] {
            let hij = unit(i).dot(&fci.sigma(&unit(j)));
            let hji = unit(j).dot(&fci.sigma(&unit(i)));
            assert_relative_eq!(hij, hji, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sigma_is_linear() {
        let (h, eri) = model_integrals(3);
        let fci = FCI::from_integrals(h, eri, 0.0, 2, 1, FciSettings::default());
        let a = DVector::from_fn(fci.dim(), |i, _| (i as f64 * 0.3).sin());
        let b = DVector::from_fn(fci.dim(), |i, _| (i as f64 * 0.7).cos());
        let lhs = fci.sigma(&(&a * 2.0 + &b));
        let rhs = fci.sigma(&a) * 2.0 + fci.sigma(&b);
        assert_relative_eq!(lhs, rhs, epsilon = 1e-12);
    }

    #[test]
    fn test_too_many_roots_is_an_error() {
        let (h, eri) = model_integrals(2);
        let fci = FCI::from_integrals(
            h,
            eri,
            0.0,
            1,
            1,
            FciSettings {
                n_roots: 5,
                ..FciSettings::default()
            },
        );
        assert_eq!(fci.dim(), 4);
        assert!(fci.solve().is_err());
    }

    #[test]
    fn test_core_energy_shifts_roots() {
        let (h, eri) = model_integrals(3);
        let base = FCI::from_integrals(h.clone(), eri.clone(), 0.0, 1, 1, FciSettings::default())
            .solve()
            .unwrap();
        let shifted = FCI::from_integrals(h, eri, -10.0, 1, 1, FciSettings::default())
            .solve()
            .unwrap();
        for (a, b) in base.energies.iter().zip(&shifted.energies) {
            assert_relative_eq!(a - 10.0, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_diagonal_guess_picks_lowest_entries() {
        let diag = DVector::from_vec(vec![0.5, -1.0, 0.2, -1.0]);
        assert_eq!(lowest_diagonal(&diag, 3), vec![1, 3, 2]);
        let guess = diagonal_guess(&diag, 3);
        assert_eq!(guess.ncols(), 3);
        assert_eq!(guess[(1, 0)], 1.0);
        assert_eq!(guess[(3, 1)], 1.0);
        assert_eq!(guess[(2, 2)], 1.0);
    }

    #[test]
    fn test_slater_condon_elements_match_sigma() {
        let (h, eri) = model_integrals(4);
        for (n_alpha, n_beta) in [(2, 2), (3, 1), (2, 1)] {
            let fci = FCI::from_integrals(h.clone(), eri.clone(), 0.0, n_alpha, n_beta, FciSettings::default());
            let matrix = fci.hamiltonian_matrix();
            for i in 0..fci.dim() {
                for j in 0..fci.dim() {
                    assert_relative_eq!(fci.matrix_element(i, j), matrix[(i, j)], epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_full_guess_space_is_exact() {
        let (h, eri) = model_integrals(4);
        let fci = FCI::from_integrals(h, eri, 0.0, 2, 2, FciSettings::default());
        let guess = fci.guess_space_vectors(fci.dim(), 3);
        assert_eq!(guess.shape(), (36, 3));
        assert_relative_eq!(guess.transpose() * &guess, DMatrix::identity(3, 3), epsilon = 1e-10);

        let dense = fci.hamiltonian_matrix().symmetric_eigen();
        let mut exact: Vec<f64> = dense.eigenvalues.iter().cloned().collect();
        exact.sort_by(|a, b| a.total_cmp(b));
        let davidson = Davidson::new(&fci, guess, 3, 1e-8, 5, 20).unwrap();
        assert_eq!(davidson.iterations, 1);
        for (a, b) in davidson.eigenvalues.iter().zip(&exact) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_davidson_guess_options_agree() {
        let (ao, scf) = hydrogen_chain(&[0.0, 1.5, 3.0, 4.5], 0, 1);
        let active = full_space(&ao, &scf);
        let dense = FCI::new(
            &active,
            FciSettings {
                n_roots: 3,
                ..FciSettings::default()
            },
        )
        .solve()
        .unwrap();

        for guess_space in [0, 6, 20] {
            let settings = FciSettings {
                n_roots: 3,
                dense_threshold: 0,
                davidson_tolerance: 1e-8,
                guess_space,
                ..FciSettings::default()
            };
            let iterative = FCI::new(&active, settings).solve().unwrap();
            assert_eq!(iterative.diagonalizer, Diagonalizer::Davidson);
            for (a, b) in dense.energies.iter().zip(&iterative.energies) {
                assert_relative_eq!(a, b, epsilon = 1e-9);
            }
        }
    }
}
