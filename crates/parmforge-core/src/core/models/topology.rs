use super::element::Element;
use super::record::TopologyRecord;
use super::system::BoxVectors;
use phf::{Set, phf_set};
use serde::Serialize;

/// Residue names recognized as water molecules.
pub static WATER_RESIDUES: Set<&'static str> = phf_set! {
    "WAT", "HOH", "H2O", "SOL", "TIP3", "TIP4", "TIP5", "T3P", "T4P", "T5P", "SPC", "SPCE", "OPC",
};

pub fn is_water_residue_name(name: &str) -> bool {
    WATER_RESIDUES.contains(name.trim())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyAtom {
    pub name: String,
    pub element: Option<Element>,
    pub residue: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyResidue {
    pub name: String,
    pub first_atom: usize,
    pub atom_count: usize,
}

/// Chemical view of the system: named atoms with elements, residues and the
/// chemical bond graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Topology {
    pub atoms: Vec<TopologyAtom>,
    pub residues: Vec<TopologyResidue>,
    pub bonds: Vec<[usize; 2]>,
    pub box_vectors: Option<BoxVectors>,
}

impl Topology {
    /// Builds the companion topology of a parsed record.
    ///
    /// Elements come from `ATOMIC_NUMBER` when present and are otherwise guessed
    /// from the mass; extra points have none. `WAT` residues are reported as
    /// `HOH`, and the hydrogen–hydrogen bond that rigid water models carry is
    /// not a chemical bond, so it is left out.
    pub fn from_record(record: &TopologyRecord) -> Self {
        let residues: Vec<TopologyResidue> = record
            .residues
            .iter()
            .enumerate()
            .map(|(index, residue)| {
                let label = residue.label.trim();
                TopologyResidue {
                    name: if label == "WAT" { "HOH" } else { label }.to_string(),
                    first_atom: residue.first_atom,
                    atom_count: record.residue_atoms(index).len(),
                }
            })
            .collect();

        let atoms: Vec<TopologyAtom> = record
            .atoms
            .iter()
            .map(|atom| TopologyAtom {
                name: atom.name.clone(),
                element: if atom.is_extra_point() {
                    None
                } else {
                    atom.atomic_number
                        .and_then(Element::from_atomic_number)
                        .or_else(|| Element::guess_from_mass(atom.mass))
                },
                residue: atom.residue,
            })
            .collect();

        let mut topology = Self {
            atoms,
            residues,
            bonds: Vec::with_capacity(record.bonds.len()),
            box_vectors: None,
        };
        let water = topology.water_atoms();
        topology.bonds = record
            .bonds
            .iter()
            .map(|b| b.atoms)
            .filter(|&[i, j]| {
                !(water[i] && water[j] && topology.is_hydrogen(i) && topology.is_hydrogen(j))
            })
            .collect();
        topology
    }

    pub fn element(&self, atom: usize) -> Option<Element> {
        self.atoms.get(atom).and_then(|a| a.element)
    }

    pub fn is_hydrogen(&self, atom: usize) -> bool {
        self.element(atom).is_some_and(|e| e.is_hydrogen())
    }

    pub fn is_water_residue(&self, residue: usize) -> bool {
        self.residues
            .get(residue)
            .is_some_and(|r| is_water_residue_name(&r.name))
    }

    /// Per-atom flag: the atom belongs to a water residue.
    pub fn water_atoms(&self) -> Vec<bool> {
        self.atoms
            .iter()
            .map(|a| self.is_water_residue(a.residue))
            .collect()
    }

    pub fn residue_name_of(&self, atom: usize) -> Option<&str> {
        self.atoms
            .get(atom)
            .and_then(|a| self.residues.get(a.residue))
            .map(|r| r.name.as_str())
    }
}
