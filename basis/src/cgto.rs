/* Contracted gaussian type orbitals (CGTO) built on the primitives of
   gto.rs, and the per-atom shell sets read from NWChem-format basis files.
*/
#![allow(non_snake_case)]

use crate::basis::{AOBasis, Basis};
use crate::gto::GTO;
use nalgebra::Vector3;
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BasisError {
    #[error("unknown element symbol '{0}' in basis data")]
    UnknownElement(String),

    #[error("unsupported shell type '{shell}' for element {element}")]
    UnsupportedShell { element: String, shell: String },

    #[error("shell '{shell}' for element {element} needs spherical harmonics, only Cartesian functions are built")]
    SphericalShell { element: String, shell: String },

    #[error("malformed primitive line '{line}': {reason}")]
    MalformedLine { line: String, reason: String },

    #[error("basis set '{basis}' has no entry for element {element}")]
    MissingElement { basis: String, element: String },

    #[error("failed to fetch basis set '{basis}' for {element}: {reason}")]
    Fetch {
        basis: String,
        element: String,
        reason: String,
    },

    #[error("failed to read basis file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A contracted Gaussian: `N sum_i c_i g_i(r)` with normalised primitives
/// `g_i` and `N` chosen so that the contraction has unit norm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractedGTO {
    pub primitives: Vec<GTO>,
    pub coefficients: Vec<f64>,
    // shell_type: 1s, 2s, 2px, 2py, 2pz, 3dxx, ...
    pub shell_type: String,
    pub n: i32,
    pub l: i32,
    pub norm: f64,
}

impl ContractedGTO {
    pub fn new(
        primitives: Vec<GTO>,
        coefficients: Vec<f64>,
        shell_type: String,
        n: i32,
        l: i32,
    ) -> Self {
        let mut cgto = ContractedGTO {
            primitives,
            coefficients,
            shell_type,
            n,
            l,
            norm: 1.0,
        };
        let self_overlap = ContractedGTO::Sab(&cgto, &cgto);
        if self_overlap > 0.0 {
            cgto.norm = 1.0 / self_overlap.sqrt();
        }
        cgto
    }

    pub fn center(&self) -> Vector3<f64> {
        self.primitives
            .first()
            .map(|p| p.center)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn set_center(&mut self, center: Vector3<f64>) {
        for p in self.primitives.iter_mut() {
            *p = p.with_center(center);
        }
    }

    fn pairs<'a>(a: &'a Self, b: &'a Self) -> impl Iterator<Item = (f64, &'a GTO, &'a GTO)> + 'a {
        a.coefficients
            .iter()
            .zip(a.primitives.iter())
            .flat_map(move |(ca, pa)| {
                b.coefficients
                    .iter()
                    .zip(b.primitives.iter())
                    .map(move |(cb, pb)| (ca * cb, pa, pb))
            })
    }
}

impl Basis for ContractedGTO {
    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.norm
            * self
                .coefficients
                .iter()
                .zip(self.primitives.iter())
                .map(|(c, p)| c * p.evaluate(r))
                .sum::<f64>()
    }

    fn Sab(a: &Self, b: &Self) -> f64 {
        a.norm * b.norm * Self::pairs(a, b).map(|(c, pa, pb)| c * GTO::Sab(pa, pb)).sum::<f64>()
    }

    fn Tab(a: &Self, b: &Self) -> f64 {
        a.norm * b.norm * Self::pairs(a, b).map(|(c, pa, pb)| c * GTO::Tab(pa, pb)).sum::<f64>()
    }

    fn Vab(a: &Self, b: &Self, R: Vector3<f64>, Z: u32) -> f64 {
        a.norm
            * b.norm
            * Self::pairs(a, b)
                .map(|(c, pa, pb)| c * GTO::Vab(pa, pb, R, Z))
                .sum::<f64>()
    }

    fn JKabcd(a: &Self, b: &Self, c: &Self, d: &Self) -> f64 {
        let bra: Vec<(f64, &GTO, &GTO)> = Self::pairs(a, b).collect();
        let ket: Vec<(f64, &GTO, &GTO)> = Self::pairs(c, d).collect();

        let mut val = 0.0;
        for &(cab, pa, pb) in &bra {
            for &(ccd, pc, pd) in &ket {
                val += cab * ccd * GTO::JKabcd(pa, pb, pc, pd);
            }
        }
        a.norm * b.norm * c.norm * d.norm * val
    }
}

/// All contracted functions centred on one atom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicBasis {
    // name of the basis set family, e.g. sto-3g
    pub name: String,
    pub symbol: String,
    pub atomic_number: u32,
    pub center: Vector3<f64>,
    pub basis_set: Vec<ContractedGTO>,
}

// Cartesian components per shell letter, in the order they enter the AO list.
const P_COMPONENTS: [(&str, [i32; 3]); 3] =
    [("px", [1, 0, 0]), ("py", [0, 1, 0]), ("pz", [0, 0, 1])];
const D_COMPONENTS: [(&str, [i32; 3]); 6] = [
    ("dxx", [2, 0, 0]),
    ("dxy", [1, 1, 0]),
    ("dxz", [1, 0, 1]),
    ("dyy", [0, 2, 0]),
    ("dyz", [0, 1, 1]),
    ("dzz", [0, 0, 2]),
];

impl AtomicBasis {
    // Example of nwchem format:
    // #----------------------------------------------------------------------
    // # Basis Set Exchange
    // #   Basis set: STO-3G
    // #----------------------------------------------------------------------
    // BASIS "ao basis" SPHERICAL PRINT
    // #BASIS SET: (6s,3p) -> [2s,1p]
    // C    S
    //      0.7161683735E+02       0.1543289673E+00
    //      0.1304509632E+02       0.5353281423E+00
    //      0.3530512160E+01       0.4446345422E+00
    // C    SP
    //      0.2941249355E+01      -0.9996722919E-01       0.1559162750E+00
    //      0.6834830964E+00       0.3995128261E+00       0.6076837186E+00
    //      0.2222899159E+00       0.7001154689E+00       0.3919573931E+00
    // END
    fn parse_primitive_block(
        lines: &[&str],
        center: Vector3<f64>,
        element: &str,
        basis_type: &str,
        n: i32,
    ) -> Result<Vec<ContractedGTO>, BasisError> {
        let mut exponents = Vec::with_capacity(lines.len());
        let mut columns: Vec<Vec<f64>> = Vec::new();

        for line in lines {
            let values = line
                .split_whitespace()
                .map(|tok| tok.replace(['D', 'd'], "E").parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| BasisError::MalformedLine {
                    line: line.to_string(),
                    reason: e.to_string(),
                })?;
            if values.len() < 2 {
                return Err(BasisError::MalformedLine {
                    line: line.to_string(),
                    reason: "expected an exponent and at least one coefficient".to_string(),
                });
            }
            exponents.push(values[0]);
            if columns.is_empty() {
                columns = vec![Vec::new(); values.len() - 1];
            }
            if values.len() - 1 != columns.len() {
                return Err(BasisError::MalformedLine {
                    line: line.to_string(),
                    reason: "inconsistent number of contraction columns".to_string(),
                });
            }
            for (col, v) in columns.iter_mut().zip(values[1..].iter()) {
                col.push(*v);
            }
        }

        // one coefficient column per angular letter, e.g. SP -> [S, P]
        let letters: Vec<char> = basis_type.chars().collect();
        if letters.len() != columns.len() {
            return Err(BasisError::UnsupportedShell {
                element: element.to_string(),
                shell: basis_type.to_string(),
            });
        }

        let mut res = Vec::new();
        for (letter, coeffs) in letters.iter().zip(columns.iter()) {
            let components: Vec<(String, [i32; 3])> = match letter {
                'S' => vec![("s".to_string(), [0, 0, 0])],
                'P' => P_COMPONENTS.iter().map(|(s, l)| (s.to_string(), *l)).collect(),
                'D' => D_COMPONENTS.iter().map(|(s, l)| (s.to_string(), *l)).collect(),
                _ => {
                    return Err(BasisError::UnsupportedShell {
                        element: element.to_string(),
                        shell: basis_type.to_string(),
                    })
                }
            };
            for (label, l_xyz) in components {
                let l_vec = Vector3::new(l_xyz[0], l_xyz[1], l_xyz[2]);
                let primitives = exponents
                    .iter()
                    .map(|&alpha| GTO::new(alpha, l_vec, center))
                    .collect();
                res.push(ContractedGTO::new(
                    primitives,
                    coeffs.clone(),
                    format!("{}{}", n, label),
                    n,
                    l_xyz.iter().sum(),
                ));
            }
        }

        Ok(res)
    }

    fn flush_block(
        name: &str,
        spherical: bool,
        header: &Option<(String, String)>,
        block: &mut Vec<&str>,
        shell_counter: &mut HashMap<String, i32>,
        result: &mut HashMap<String, AtomicBasis>,
    ) -> Result<(), BasisError> {
        let Some((symbol, shell)) = header else {
            return Ok(());
        };
        if block.is_empty() {
            return Ok(());
        }
        let element = Element::from_symbol(symbol)
            .ok_or_else(|| BasisError::UnknownElement(symbol.clone()))?;
        // s and p shells coincide in both conventions
        if spherical && shell.chars().any(|c| c != 'S' && c != 'P') {
            return Err(BasisError::SphericalShell {
                element: symbol.clone(),
                shell: shell.clone(),
            });
        }
        let center = Vector3::zeros();
        let counter = shell_counter.entry(symbol.clone()).or_insert(0);
        *counter += 1;
        let parsed = Self::parse_primitive_block(block, center, symbol, shell, *counter)?;
        let entry = result.entry(symbol.clone()).or_insert_with(|| AtomicBasis {
            name: name.to_lowercase(),
            symbol: element.get_symbol().to_string(),
            atomic_number: element.get_atomic_number() as u32,
            center,
            basis_set: Vec::new(),
        });
        entry.basis_set.extend(parsed);
        block.clear();
        Ok(())
    }

    /// Parses NWChem-format basis data, returning one `AtomicBasis` per
    /// element found in the input. All functions start at the origin.
    pub fn parse_nwchem(input: &str, name: &str) -> Result<HashMap<String, AtomicBasis>, BasisError> {
        let mut result: HashMap<String, AtomicBasis> = HashMap::new();
        let mut current_block: Vec<&str> = Vec::new();
        let mut current_header: Option<(String, String)> = None;
        let mut shell_counter: HashMap<String, i32> = HashMap::new();
        let mut spherical = false;

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with("BASIS") {
                spherical = line
                    .split_whitespace()
                    .any(|tok| tok.eq_ignore_ascii_case("SPHERICAL"));
                if spherical {
                    debug!("basis block '{}' declares spherical harmonics", name);
                }
                continue;
            }
            if line.eq_ignore_ascii_case("END") {
                Self::flush_block(
                    name,
                    spherical,
                    &current_header,
                    &mut current_block,
                    &mut shell_counter,
                    &mut result,
                )?;
                current_header = None;
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let is_header = tokens.len() == 2
                && tokens[0].chars().all(char::is_alphabetic)
                && tokens[1].chars().all(char::is_alphabetic);
            if is_header {
                Self::flush_block(
                    name,
                    spherical,
                    &current_header,
                    &mut current_block,
                    &mut shell_counter,
                    &mut result,
                )?;
                current_header = Some((tokens[0].to_string(), tokens[1].to_uppercase()));
            } else if current_header.is_some() {
                current_block.push(line);
            }
        }
        Self::flush_block(
            name,
            spherical,
            &current_header,
            &mut current_block,
            &mut shell_counter,
            &mut result,
        )?;

        Ok(result)
    }
}

impl AOBasis for AtomicBasis {
    type BasisType = ContractedGTO;

    fn basis_size(&self) -> usize {
        self.basis_set.len()
    }

    fn get_basis(&self) -> Vec<Arc<Self::BasisType>> {
        self.basis_set.iter().cloned().map(Arc::new).collect()
    }

    fn set_center(&mut self, center: Vector3<f64>) {
        self.center = center;
        for cgto in self.basis_set.iter_mut() {
            cgto.set_center(center);
        }
    }

    fn get_center(&self) -> Option<Vector3<f64>> {
        Some(self.center)
    }
}
