#![allow(non_snake_case)]
use crate::basis::Basis;
use crate::gto::{HermiteExpansion, GTO1d, GTO};
use crate::helper::*;
use nalgebra::Vector3;
use rand::Rng;
use std::f64::consts::PI;

#[test]
fn test_gto1d_normalization() {
    let gto = GTO1d::new(1.0, 2, 1.0);
    let integral = simpson_integration(|x: f64| gto.evaluate(x).powi(2), -10.0, 10.0, 10_000);
    assert!((integral - 1.0).abs() < 1e-5, "Integral is not close to 1: got {}", integral);
}

#[test]
fn test_gto1d_overlap() {
    let gto1 = GTO1d::new(1.2, 1, 1.0);
    let gto2 = GTO1d::new(0.8, 1, 3.0);
    let integral = simpson_integration(|x| gto1.evaluate(x) * gto2.evaluate(x), -10.0, 10.0, 10_000);
    let overlap = GTO1d::Sab(&gto1, &gto2);
    assert!(
        (integral - overlap).abs() < 1e-5,
        "Overlap is not close to integral: got {}",
        overlap
    );
}

#[test]
fn test_gto_overlap_matches_quadrature() {
    let gto1 = GTO::new(1.2, Vector3::new(1, 0, 0), Vector3::new(0.0, 0.0, 0.0));
    let gto2 = GTO::new(0.8, Vector3::new(1, 0, 0), Vector3::new(0.5, 0.0, 0.3));
    let integrand =
        |x, y, z| gto1.evaluate(&Vector3::new(x, y, z)) * gto2.evaluate(&Vector3::new(x, y, z));

    let integral = simpson_integration_3d(integrand, -8.0, 8.0, 80);
    let overlap = GTO::Sab(&gto1, &gto2);
    assert!(
        (integral - overlap).abs() < 1e-5,
        "Overlap {} does not match quadrature {}",
        overlap,
        integral
    );
}

#[test]
fn test_gto1d_kinetic_random() {
    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        let l1 = rng.gen_range(0..3);
        let l2 = rng.gen_range(0..3);
        let gto1 = GTO1d::new(rng.gen_range(0.3..2.0), l1, rng.gen_range(-1.0..1.0));
        let gto2 = GTO1d::new(rng.gen_range(0.3..2.0), l2, rng.gen_range(-1.0..1.0));

        let integral = simpson_integration(
            |x: f64| -0.5 * gto1.evaluate(x) * gto2.laplacian(x),
            -12.0,
            12.0,
            20_000,
        );
        let kinetic = GTO1d::Tab(&gto1, &gto2);
        assert!(
            (integral - kinetic).abs() < 1e-5,
            "Kinetic integral mismatch: analytic {}, numeric {}",
            kinetic,
            integral
        );
    }
}

#[test]
fn test_boys_function_limits() {
    // F_n(0) = 1 / (2n + 1)
    for n in 0..6 {
        assert!((boys_function(n, 0.0) - 1.0 / (2 * n + 1) as f64).abs() < 1e-14);
    }
    // F_0(x) = sqrt(pi / x) erf(sqrt x) / 2
    for &x in &[0.1, 1.0, 5.0, 29.0, 31.0, 60.0] {
        let exact = 0.5 * (PI / x).sqrt() * libm::erf(x.sqrt());
        assert!(
            (boys_function(0, x) - exact).abs() < 1e-12,
            "F_0({}) mismatch",
            x
        );
    }
}

#[test]
fn test_boys_function_quadrature() {
    for n in 0..5 {
        for &x in &[0.3, 2.5, 12.0, 35.0] {
            let numeric =
                simpson_integration(|t: f64| t.powi(2 * n) * (-x * t * t).exp(), 0.0, 1.0, 4000);
            let analytic = boys_function(n, x);
            assert!(
                (numeric - analytic).abs() < 1e-9,
                "F_{}({}) = {} but quadrature gives {}",
                n,
                x,
                analytic,
                numeric
            );
        }
    }
}

#[test]
fn test_electron_repulsion_s_functions() {
    // (ss|ss) for four identical normalised s primitives at one centre:
    // 2 pi^{5/2} N^4 / (p q sqrt(p + q)) with p = q = 2 alpha
    let alpha = 0.7;
    let g = GTO::new(alpha, Vector3::new(0, 0, 0), Vector3::zeros());
    let n = (2.0 * alpha / PI).powf(0.75);
    let p = 2.0 * alpha;
    let expected = 2.0 * PI.powf(2.5) * n.powi(4) / (p * p * (2.0 * p).sqrt());
    let computed = GTO::JKabcd(&g, &g, &g, &g);
    assert!((computed - expected).abs() < 1e-12);
}

#[test]
fn test_electron_repulsion_permutational_symmetry() {
    let a = GTO::new(0.9, Vector3::new(1, 0, 0), Vector3::new(0.0, 0.0, 0.0));
    let b = GTO::new(0.5, Vector3::new(0, 0, 1), Vector3::new(0.0, 0.0, 1.2));
    let c = GTO::new(1.3, Vector3::new(0, 0, 0), Vector3::new(0.0, 0.3, 0.6));
    let d = GTO::new(0.4, Vector3::new(0, 0, 1), Vector3::new(0.2, 0.0, 1.0));

    let abcd = GTO::JKabcd(&a, &b, &c, &d);
    for other in [
        GTO::JKabcd(&b, &a, &c, &d),
        GTO::JKabcd(&a, &b, &d, &c),
        GTO::JKabcd(&c, &d, &a, &b),
        GTO::JKabcd(&d, &c, &b, &a),
    ] {
        assert!((abcd - other).abs() < 1e-12, "{} != {}", abcd, other);
    }
}

#[test]
fn test_nuclear_attraction_s_function_at_nucleus() {
    // <s|-Z/r|s> = -2 Z sqrt(2 alpha / pi) for a normalised s primitive on the nucleus
    let alpha = 1.3;
    let g = GTO::new(alpha, Vector3::new(0, 0, 0), Vector3::zeros());
    let expected = -2.0 * 7.0 * (2.0 * alpha / PI).sqrt();
    assert!((GTO::Vab(&g, &g, Vector3::zeros(), 7) - expected).abs() < 1e-12);
}

#[test]
fn test_hermite_expansion_base_and_bounds() {
    let e = HermiteExpansion::new(2, 2, 0.8, 1.1, 0.6);
    let mu = 0.8 * 1.1 / 1.9;
    assert!((e.get(0, 0, 0) - (-mu * 0.36_f64).exp()).abs() < 1e-14);
    // the top coefficient is E^{00}_0 / (2p)^{i+j}
    assert!((e.get(2, 2, 4) - e.get(0, 0, 0) / 3.8_f64.powi(4)).abs() < 1e-14);
    assert_eq!(e.get(1, 1, 3), 0.0);
    assert_eq!(e.get(3, 0, 0), 0.0);
    assert_eq!(e.get(0, -1, 0), 0.0);
}

#[test]
fn test_boys_sequence_matches_single_orders() {
    for &x in &[0.0, 0.7, 15.0, 45.0] {
        let sequence = boys_sequence(6, x);
        for (n, value) in sequence.iter().enumerate() {
            assert!((value - boys_function(n as i32, x)).abs() < 1e-13);
        }
    }
}

#[test]
fn test_nuclear_attraction_is_hermitian() {
    let a = GTO::new(0.9, Vector3::new(0, 0, 1), Vector3::new(0.0, 0.0, 0.0));
    let b = GTO::new(0.6, Vector3::new(1, 0, 0), Vector3::new(0.2, 0.0, 0.8));
    let c = Vector3::new(0.3, -0.1, 0.4);
    let vab = GTO::Vab(&a, &b, c, 6);
    let vba = GTO::Vab(&b, &a, c, 6);
    assert!((vab - vba).abs() < 1e-12, "{} != {}", vab, vba);
}
