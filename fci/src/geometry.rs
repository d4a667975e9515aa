//! Geometry descriptors for the bond-length scan
//!
//! A descriptor is the textual `"A x y z; B x y z"` form (angstrom) together
//! with a symmetry flag. It converts into a [`Molecule`] in bohr that the
//! integral and SCF layers consume.

use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use nalgebra::Vector3;
use periodic_table_on_an_enum::Element;

/// Bohr radius in angstrom (CODATA 2010)
pub const BOHR_RADIUS_ANGSTROM: f64 = 0.52917721092;
pub const ANGSTROM_TO_BOHR: f64 = 1.0 / BOHR_RADIUS_ANGSTROM;

/// One atom of a descriptor, coordinates in angstrom.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomSite {
    pub symbol: String,
    pub position: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDescriptor {
    pub atoms: Vec<AtomSite>,
    pub symmetry: bool,
}

impl GeometryDescriptor {
    /// First atom at the origin, second displaced along +z by `distance` angstrom.
    pub fn diatomic(first: &str, second: &str, distance: f64, symmetry: bool) -> Self {
        GeometryDescriptor {
            atoms: vec![
                AtomSite {
                    symbol: first.to_string(),
                    position: [0.0, 0.0, 0.0],
                },
                AtomSite {
                    symbol: second.to_string(),
                    position: [0.0, 0.0, distance],
                },
            ],
            symmetry,
        }
    }

    pub fn atom_string(&self) -> String {
        self.atoms
            .iter()
            .map(|a| {
                format!(
                    "{} {:.6} {:.6} {:.6}",
                    a.symbol, a.position[0], a.position[1], a.position[2]
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Read a `;`-separated list of `Symbol x y z` entries.
    pub fn parse(text: &str, symmetry: bool) -> Result<Self> {
        let mut atoms = Vec::new();
        for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let fields: Vec<&str> = entry.split_whitespace().collect();
            if fields.len() != 4 {
                bail!("Expected 'Symbol x y z', got '{}'", entry);
            }
            let symbol = fields[0];
            if Element::from_symbol(symbol).is_none() {
                bail!("Invalid element symbol: {}", symbol);
            }
            let mut position = [0.0; 3];
            for (slot, field) in position.iter_mut().zip(&fields[1..]) {
                *slot = field
                    .parse::<f64>()
                    .wrap_err_with(|| format!("Malformed coordinate '{}' in '{}'", field, entry))?;
            }
            atoms.push(AtomSite {
                symbol: symbol.to_string(),
                position,
            });
        }
        if atoms.is_empty() {
            bail!("Geometry descriptor contains no atoms");
        }
        Ok(GeometryDescriptor { atoms, symmetry })
    }

    /// Distance between the first two atoms, angstrom.
    pub fn bond_length(&self) -> Option<f64> {
        match self.atoms.as_slice() {
            [a, b, ..] => {
                let d: f64 = a
                    .position
                    .iter()
                    .zip(&b.position)
                    .map(|(x, y)| (x - y).powi(2))
                    .sum();
                Some(d.sqrt())
            }
            _ => None,
        }
    }

    /// Convert to a molecule in bohr, checking charge and multiplicity against
    /// the electron count.
    pub fn to_molecule(&self, charge: i32, multiplicity: usize) -> Result<Molecule> {
        let mut elements = Vec::with_capacity(self.atoms.len());
        let mut coords = Vec::with_capacity(self.atoms.len());
        for atom in &self.atoms {
            let element = Element::from_symbol(&atom.symbol)
                .ok_or_else(|| eyre!("Invalid element symbol: {}", atom.symbol))?;
            elements.push(element);
            coords.push(Vector3::from(atom.position) * ANGSTROM_TO_BOHR);
        }
        Molecule::new(elements, coords, charge, multiplicity, self.symmetry)
    }
}

/// Nuclear framework plus electron bookkeeping, coordinates in bohr.
#[derive(Debug, Clone)]
pub struct Molecule {
    pub elements: Vec<Element>,
    pub coords: Vec<Vector3<f64>>,
    pub charge: i32,
    pub multiplicity: usize,
    pub symmetry: bool,
}

impl Molecule {
    pub fn new(
        elements: Vec<Element>,
        coords: Vec<Vector3<f64>>,
        charge: i32,
        multiplicity: usize,
        symmetry: bool,
    ) -> Result<Self> {
        if multiplicity == 0 {
            bail!("Spin multiplicity must be at least 1");
        }
        let nuclear_charge: i32 = elements.iter().map(|e| e.get_atomic_number() as i32).sum();
        let n_electrons = nuclear_charge - charge;
        if n_electrons < 0 {
            bail!(
                "Charge {} leaves a negative electron count ({})",
                charge,
                n_electrons
            );
        }
        let n_unpaired = multiplicity as i32 - 1;
        if n_unpaired > n_electrons || (n_electrons - n_unpaired) % 2 != 0 {
            bail!(
                "Multiplicity {} is incompatible with {} electrons",
                multiplicity,
                n_electrons
            );
        }
        Ok(Molecule {
            elements,
            coords,
            charge,
            multiplicity,
            symmetry,
        })
    }

    pub fn n_electrons(&self) -> usize {
        let z: i32 = self
            .elements
            .iter()
            .map(|e| e.get_atomic_number() as i32)
            .sum();
        (z - self.charge) as usize
    }

    pub fn n_alpha(&self) -> usize {
        (self.n_electrons() + self.multiplicity - 1) / 2
    }

    pub fn n_beta(&self) -> usize {
        self.n_electrons() - self.n_alpha()
    }

    pub fn nuclear_repulsion(&self) -> f64 {
        let mut energy = 0.0;
        for i in 0..self.elements.len() {
            for j in (i + 1)..self.elements.len() {
                let z_i = self.elements[i].get_atomic_number() as f64;
                let z_j = self.elements[j].get_atomic_number() as f64;
                let r_ij = (self.coords[i] - self.coords[j]).norm();
                if r_ij > 1e-10 {
                    energy += z_i * z_j / r_ij;
                }
            }
        }
        energy
    }

    /// Point-group label used for logging. Only linear frameworks are
    /// recognised; anything else is reported as C1.
    pub fn point_group(&self) -> &'static str {
        if !self.symmetry {
            return "C1";
        }
        if self.elements.len() == 1 {
            return "SO3";
        }
        if !self.is_linear() {
            return "C1";
        }
        if self.has_inversion_centre() {
            "Dooh"
        } else {
            "Coov"
        }
    }

    fn is_linear(&self) -> bool {
        let origin = self.coords[0];
        let Some(axis) = self
            .coords
            .iter()
            .map(|c| c - origin)
            .find(|d| d.norm() > 1e-8)
        else {
            return false;
        };
        let axis = axis.normalize();
        self.coords
            .iter()
            .all(|c| (c - origin).cross(&axis).norm() < 1e-6)
    }

    fn has_inversion_centre(&self) -> bool {
        let n = self.coords.len() as f64;
        let centre = self.coords.iter().fold(Vector3::zeros(), |acc, c| acc + c) / n;
        self.coords.iter().zip(&self.elements).all(|(c, e)| {
            let image = 2.0 * centre - c;
            self.coords
                .iter()
                .zip(&self.elements)
                .any(|(d, f)| {
                    f.get_atomic_number() == e.get_atomic_number() && (d - image).norm() < 1e-6
                })
        })
    }
}

/// `count` evenly spaced values from `start` to `stop`, both included.
pub fn scan_distances(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        stop
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diatomic_descriptor_text() {
        let descriptor = GeometryDescriptor::diatomic("C", "N", 1.0, true);
        assert_eq!(
            descriptor.atom_string(),
            "C 0.000000 0.000000 0.000000; N 0.000000 0.000000 1.000000"
        );
        assert!(descriptor.symmetry);
    }

    #[test]
    fn test_second_atom_offset_along_z() {
        for r in scan_distances(0.8, 2.2, 15) {
            let descriptor = GeometryDescriptor::diatomic("C", "N", r, true);
            let parsed = GeometryDescriptor::parse(&descriptor.atom_string(), true).unwrap();
            assert_eq!(parsed.atoms[0].position, [0.0, 0.0, 0.0]);
            assert_eq!(parsed.atoms[1].position[0], 0.0);
            assert_eq!(parsed.atoms[1].position[1], 0.0);
            assert_relative_eq!(parsed.atoms[1].position[2], r, epsilon = 1e-6);
            assert_relative_eq!(parsed.bond_length().unwrap(), r, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(GeometryDescriptor::parse("Xx 0 0 0", false).is_err());
        assert!(GeometryDescriptor::parse("C 0 0", false).is_err());
        assert!(GeometryDescriptor::parse("C 0 0 zero", false).is_err());
        assert!(GeometryDescriptor::parse("  ;  ", false).is_err());
    }

    #[test]
    fn test_molecule_conversion_to_bohr() {
        let molecule = GeometryDescriptor::diatomic("C", "N", 1.0, true)
            .to_molecule(0, 2)
            .unwrap();
        assert_relative_eq!(molecule.coords[1].z, ANGSTROM_TO_BOHR, epsilon = 1e-12);
        assert_eq!(molecule.n_electrons(), 13);
        assert_eq!(molecule.n_alpha(), 7);
        assert_eq!(molecule.n_beta(), 6);
        assert_relative_eq!(
            molecule.nuclear_repulsion(),
            42.0 / ANGSTROM_TO_BOHR,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_spin_parity_is_checked() {
        let cn = GeometryDescriptor::diatomic("C", "N", 1.1, true);
        assert!(cn.to_molecule(0, 1).is_err());
        assert!(cn.to_molecule(-1, 1).is_ok());
        assert!(cn.to_molecule(0, 0).is_err());
    }

    #[test]
    fn test_point_groups() {
        let cn = GeometryDescriptor::diatomic("C", "N", 1.1, true)
            .to_molecule(0, 2)
            .unwrap();
        assert_eq!(cn.point_group(), "Coov");
        let n2 = GeometryDescriptor::diatomic("N", "N", 1.1, true)
            .to_molecule(0, 1)
            .unwrap();
        assert_eq!(n2.point_group(), "Dooh");
        let no_symmetry = GeometryDescriptor::diatomic("N", "N", 1.1, false)
            .to_molecule(0, 1)
            .unwrap();
        assert_eq!(no_symmetry.point_group(), "C1");
    }

    #[test]
    fn test_scan_distances_are_inclusive() {
        let distances = scan_distances(0.8, 2.2, 15);
        assert_eq!(distances.len(), 15);
        assert_eq!(distances[0], 0.8);
        assert_eq!(distances[14], 2.2);
        assert_relative_eq!(distances[1] - distances[0], 0.1, epsilon = 1e-12);
        assert!(scan_distances(0.8, 2.2, 0).is_empty());
        assert_eq!(scan_distances(1.0, 2.0, 1), vec![1.0]);
    }
}
