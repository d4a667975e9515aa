//! Occupation-string basis of a fixed-particle sector and spin operators
//!
//! A determinant is stored as a pair of bitstrings `(alpha, beta)`; bit `p`
//! set means spatial orbital `p` is occupied. The second-quantised order is
//! all alpha creators (ascending) to the left of all beta creators
//! (ascending), which fixes every fermionic sign below.

extern crate nalgebra as na;

use itertools::Itertools;
use na::DVector;
use std::collections::HashMap;
use std::sync::Arc;

pub type Bitstring = u64;

/// Orbitals representable in one [`Bitstring`].
pub const MAX_ORBITALS: usize = Bitstring::BITS as usize;

/// Sign of moving an operator for orbital `p` past the occupied orbitals below it.
#[inline]
fn parity_below(string: Bitstring, p: usize) -> f64 {
    if (string & ((1u64 << p) - 1)).count_ones() % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// `a_p` applied to `string`: the new string and its sign, or None if `p` is empty.
pub fn annihilate(string: Bitstring, p: usize) -> Option<(Bitstring, f64)> {
    if string & (1u64 << p) == 0 {
        return None;
    }
    Some((string ^ (1u64 << p), parity_below(string, p)))
}

/// `a+_p` applied to `string`, or None if `p` is already occupied.
pub fn create(string: Bitstring, p: usize) -> Option<(Bitstring, f64)> {
    if string & (1u64 << p) != 0 {
        return None;
    }
    Some((string | (1u64 << p), parity_below(string, p)))
}

pub fn occupied(string: Bitstring, n_orb: usize) -> impl Iterator<Item = usize> {
    (0..n_orb).filter(move |&p| string & (1u64 << p) != 0)
}

/// One term of `a+_p a_q |I> = sign |J>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Excitation {
    pub target: usize,
    pub p: usize,
    pub q: usize,
    pub sign: f64,
}

/// All strings of `n_elec` electrons in `n_orb` orbitals, lexicographic in
/// their occupied index lists, with single-replacement tables.
#[derive(Debug, Clone)]
pub struct StringSpace {
    pub n_orb: usize,
    pub n_elec: usize,
    strings: Vec<Bitstring>,
    index: HashMap<Bitstring, usize>,
    singles: Vec<Vec<Excitation>>,
}

impl StringSpace {
    /// Panics when `n_orb` exceeds [`MAX_ORBITALS`].
    pub fn new(n_orb: usize, n_elec: usize) -> Self {
        assert!(n_orb <= MAX_ORBITALS, "at most 64 orbitals fit in a bitstring");
        let strings: Vec<Bitstring> = if n_elec > n_orb {
            Vec::new()
        } else {
            (0..n_orb)
                .combinations(n_elec)
                .map(|occ| occ.iter().fold(0u64, |acc, &p| acc | (1u64 << p)))
                .collect()
        };
        let index: HashMap<Bitstring, usize> =
            strings.iter().enumerate().map(|(i, &s)| (s, i)).collect();

        let singles = strings
            .iter()
            .map(|&string| {
                let mut list = Vec::new();
                for q in occupied(string, n_orb) {
                    let Some((removed, sign_q)) = annihilate(string, q) else {
                        continue;
                    };
                    for p in 0..n_orb {
                        if let Some((added, sign_p)) = create(removed, p) {
                            list.push(Excitation {
                                target: index[&added],
                                p,
                                q,
                                sign: sign_q * sign_p,
                            });
                        }
                    }
                }
                list
            })
            .collect();

        StringSpace {
            n_orb,
            n_elec,
            strings,
            index,
            singles,
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn string(&self, i: usize) -> Bitstring {
        self.strings[i]
    }

    pub fn strings(&self) -> &[Bitstring] {
        &self.strings
    }

    pub fn index_of(&self, string: Bitstring) -> Option<usize> {
        self.index.get(&string).copied()
    }

    /// Non-zero `a+_p a_q` images of string `i`, diagonal `p == q` included.
    pub fn singles(&self, i: usize) -> &[Excitation] {
        &self.singles[i]
    }
}

/// Product determinant basis `(alpha string, beta string)` of one
/// particle-number sector, alpha-major.
#[derive(Debug, Clone)]
pub struct FockSector {
    pub n_orb: usize,
    pub alpha: Arc<StringSpace>,
    pub beta: Arc<StringSpace>,
}

impl FockSector {
    pub fn new(n_orb: usize, n_alpha: usize, n_beta: usize) -> Self {
        let alpha = Arc::new(StringSpace::new(n_orb, n_alpha));
        let beta = if n_alpha == n_beta {
            alpha.clone()
        } else {
            Arc::new(StringSpace::new(n_orb, n_beta))
        };
        FockSector { n_orb, alpha, beta }
    }

    pub fn n_alpha(&self) -> usize {
        self.alpha.n_elec
    }

    pub fn n_beta(&self) -> usize {
        self.beta.n_elec
    }

    pub fn dim(&self) -> usize {
        self.alpha.len() * self.beta.len()
    }

    #[inline]
    pub fn index(&self, ia: usize, ib: usize) -> usize {
        ia * self.beta.len() + ib
    }

    pub fn determinant(&self, i: usize) -> (Bitstring, Bitstring) {
        let nb = self.beta.len();
        (self.alpha.string(i / nb), self.beta.string(i % nb))
    }

    pub fn index_of(&self, alpha: Bitstring, beta: Bitstring) -> Option<usize> {
        Some(self.index(self.alpha.index_of(alpha)?, self.beta.index_of(beta)?))
    }

    /// `S_z` eigenvalue shared by every determinant of the sector.
    pub fn s_z(&self) -> f64 {
        0.5 * (self.n_alpha() as f64 - self.n_beta() as f64)
    }
}

/// Total-spin operators acting on CI vectors of a sector.
pub struct SpinOperators;

impl SpinOperators {
    /// `S_+ = sum_p a+_{p alpha} a_{p beta}`, mapping into `(na + 1, nb - 1)`.
    /// None when the target sector is empty.
    pub fn s_plus(sector: &FockSector, c: &DVector<f64>) -> Option<(FockSector, DVector<f64>)> {
        let n_orb = sector.n_orb;
        if sector.n_beta() == 0 || sector.n_alpha() >= n_orb {
            return None;
        }
        let target = FockSector::new(n_orb, sector.n_alpha() + 1, sector.n_beta() - 1);
        // a_{p beta} passes every alpha creator
        let crossing = if sector.n_alpha() % 2 == 0 { 1.0 } else { -1.0 };
        let mut out = DVector::zeros(target.dim());
        for i in 0..sector.dim() {
            if c[i] == 0.0 {
                continue;
            }
            let (ia, ib) = sector.determinant(i);
            for p in 0..n_orb {
                let Some((nb, sb)) = annihilate(ib, p) else {
                    continue;
                };
                let Some((na, sa)) = create(ia, p) else {
                    continue;
                };
                if let Some(j) = target.index_of(na, nb) {
                    out[j] += crossing * sb * sa * c[i];
                }
            }
        }
        Some((target, out))
    }

    /// `S_- = sum_p a+_{p beta} a_{p alpha}`, mapping into `(na - 1, nb + 1)`.
    pub fn s_minus(sector: &FockSector, c: &DVector<f64>) -> Option<(FockSector, DVector<f64>)> {
        let n_orb = sector.n_orb;
        if sector.n_alpha() == 0 || sector.n_beta() >= n_orb {
            return None;
        }
        let target = FockSector::new(n_orb, sector.n_alpha() - 1, sector.n_beta() + 1);
        // a+_{p beta} passes the remaining na - 1 alpha creators
        let crossing = if (sector.n_alpha() - 1) % 2 == 0 { 1.0 } else { -1.0 };
        let mut out = DVector::zeros(target.dim());
        for i in 0..sector.dim() {
            if c[i] == 0.0 {
                continue;
            }
            let (ia, ib) = sector.determinant(i);
            for p in 0..n_orb {
                let Some((na, sa)) = annihilate(ia, p) else {
                    continue;
                };
                let Some((nb, sb)) = create(ib, p) else {
                    continue;
                };
                if let Some(j) = target.index_of(na, nb) {
                    out[j] += crossing * sa * sb * c[i];
                }
            }
        }
        Some((target, out))
    }

    /// `S^2 c = S_- S_+ c + S_z (S_z + 1) c`
    pub fn s_squared(sector: &FockSector, c: &DVector<f64>) -> DVector<f64> {
        let sz = sector.s_z();
        let mut out = c * (sz * (sz + 1.0));
        if let Some((raised, c_raised)) = Self::s_plus(sector, c) {
            if let Some((_, lowered)) = Self::s_minus(&raised, &c_raised) {
                out += lowered;
            }
        }
        out
    }

    /// `<c|S^2|c> / <c|c>` using `<c|S_- S_+|c> = |S_+ c|^2`.
    pub fn expectation_s2(sector: &FockSector, c: &DVector<f64>) -> f64 {
        let norm2 = c.norm_squared();
        if norm2 == 0.0 {
            return 0.0;
        }
        let sz = sector.s_z();
        let raised = Self::s_plus(sector, c)
            .map(|(_, v)| v.norm_squared())
            .unwrap_or(0.0);
        raised / norm2 + sz * (sz + 1.0)
    }
}

/// `2S + 1` from `<S^2> = S (S + 1)`.
pub fn spin_multiplicity(s2: f64) -> f64 {
    (1.0 + 4.0 * s2.max(0.0)).sqrt()
}
