//! The immutable, validated view of a parameter-topology file.
//!
//! Every index stored here is 0-based and every quantity is in the units the
//! file uses (Å, kcal/mol, radians), except charges, which are already divided
//! by the AMBER charge factor. Conversion to output units happens in the
//! resolver.

use std::ops::Range;

/// The 31 counts of the `POINTERS` section, in file order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pointers {
    pub natom: usize,
    pub ntypes: usize,
    pub nbonh: usize,
    pub mbona: usize,
    pub ntheth: usize,
    pub mtheta: usize,
    pub nphih: usize,
    pub mphia: usize,
    pub nhparm: usize,
    pub nparm: usize,
    pub nnb: usize,
    pub nres: usize,
    pub nbona: usize,
    pub ntheta: usize,
    pub nphia: usize,
    pub numbnd: usize,
    pub numang: usize,
    pub nptra: usize,
    pub natyp: usize,
    pub nphb: usize,
    pub ifpert: usize,
    pub nbper: usize,
    pub ngper: usize,
    pub ndper: usize,
    pub mbper: usize,
    pub mgper: usize,
    pub mdper: usize,
    pub ifbox: usize,
    pub nmxrs: usize,
    pub ifcap: usize,
    pub numextra: usize,
}

impl Pointers {
    /// Minimum number of values a `POINTERS` section must carry. `NUMEXTRA`
    /// (the 31st) is absent from files written before extra points existed.
    pub const REQUIRED_LEN: usize = 30;

    /// Builds the pointer block from raw values. Returns `None` if fewer than
    /// [`Self::REQUIRED_LEN`] values are given.
    pub fn from_values(values: &[usize]) -> Option<Self> {
        if values.len() < Self::REQUIRED_LEN {
            return None;
        }
        let at = |i: usize| values.get(i).copied().unwrap_or(0);
        Some(Self {
            natom: at(0),
            ntypes: at(1),
            nbonh: at(2),
            mbona: at(3),
            ntheth: at(4),
            mtheta: at(5),
            nphih: at(6),
            mphia: at(7),
            nhparm: at(8),
            nparm: at(9),
            nnb: at(10),
            nres: at(11),
            nbona: at(12),
            ntheta: at(13),
            nphia: at(14),
            numbnd: at(15),
            numang: at(16),
            nptra: at(17),
            natyp: at(18),
            nphb: at(19),
            ifpert: at(20),
            nbper: at(21),
            ngper: at(22),
            ndper: at(23),
            mbper: at(24),
            mgper: at(25),
            mdper: at(26),
            ifbox: at(27),
            nmxrs: at(28),
            ifcap: at(29),
            numextra: at(30),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub name: String,
    /// AMBER atom type name (`AMBER_ATOM_TYPE`), empty when the section is absent.
    pub type_name: String,
    /// Partial charge in units of e.
    pub charge: f64,
    pub mass: f64,
    /// 0-based Lennard-Jones type index.
    pub lj_type: usize,
    pub atomic_number: Option<u8>,
    pub residue: usize,
    /// Intrinsic Born radius in Å (`RADII`).
    pub gb_radius: Option<f64>,
    /// Born screening factor (`SCREEN`).
    pub gb_screen: Option<f64>,
}

impl AtomRecord {
    /// Extra points (virtual sites) are massless or carry an `EP` type name.
    pub fn is_extra_point(&self) -> bool {
        self.mass == 0.0 || self.type_name.starts_with("EP")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueRecord {
    pub label: String,
    pub first_atom: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondRecord {
    pub atoms: [usize; 2],
    pub type_index: usize,
    pub with_hydrogen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AngleRecord {
    pub atoms: [usize; 3],
    pub type_index: usize,
    pub with_hydrogen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DihedralRecord {
    pub atoms: [usize; 4],
    pub type_index: usize,
    pub with_hydrogen: bool,
    /// The 1-4 pair of this dihedral is not a nonbonded 1-4 interaction.
    pub ignore_end_groups: bool,
    pub improper: bool,
}

impl DihedralRecord {
    /// Whether the dihedral contributes a scaled 1-4 nonbonded pair.
    pub fn has_14_pair(&self) -> bool {
        !self.ignore_end_groups && !self.improper
    }
}

/// Harmonic bond parameters: kcal/mol/Å² and Å.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondType {
    pub force_constant: f64,
    pub equilibrium: f64,
}

/// Harmonic angle parameters: kcal/mol/rad² and rad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleType {
    pub force_constant: f64,
    pub equilibrium: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DihedralType {
    pub amplitude: f64,
    pub periodicity: f64,
    pub phase: f64,
    pub scee: Option<f64>,
    pub scnb: Option<f64>,
}

/// Lennard-Jones coefficient tables in file units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LennardJonesTable {
    pub ntypes: usize,
    /// `NONBONDED_PARM_INDEX`, row-major `ntypes × ntypes`, 1-based entries.
    pub parm_index: Vec<i64>,
    pub acoef: Vec<f64>,
    pub bcoef: Vec<f64>,
    /// 12-6-4 `C` coefficients (`LENNARD_JONES_CCOEF`).
    pub ccoef: Option<Vec<f64>>,
    /// Chamber 1-4 tables (`LENNARD_JONES_14_ACOEF`/`_BCOEF`).
    pub acoef_14: Option<Vec<f64>>,
    pub bcoef_14: Option<Vec<f64>>,
}

impl LennardJonesTable {
    /// Number of entries in each coefficient table.
    pub fn pair_count(&self) -> usize {
        self.ntypes * (self.ntypes + 1) / 2
    }

    /// Raw `NONBONDED_PARM_INDEX` entry for a pair of 0-based types.
    pub fn raw_pair_index(&self, type_i: usize, type_j: usize) -> Option<i64> {
        if type_i >= self.ntypes || type_j >= self.ntypes {
            return None;
        }
        self.parm_index.get(self.ntypes * type_i + type_j).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UreyBradleyRecord {
    pub atoms: [usize; 2],
    pub type_index: usize,
}

/// Urey–Bradley parameters: kcal/mol/Å² and Å.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UreyBradleyType {
    pub force_constant: f64,
    pub equilibrium: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImproperRecord {
    pub atoms: [usize; 4],
    pub type_index: usize,
}

/// CHARMM harmonic improper: kcal/mol/rad² and rad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImproperType {
    pub force_constant: f64,
    pub phase: f64,
}

/// A CMAP correction grid in file order (kcal/mol, `resolution²` values).
#[derive(Debug, Clone, PartialEq)]
pub struct CmapGrid {
    pub resolution: usize,
    pub values: Vec<f64>,
}

/// Five consecutive atoms defining two coupled torsions (a-b-c-d, b-c-d-e).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmapRecord {
    pub atoms: [usize; 5],
    pub type_index: usize,
}

/// CHARMM-only sections present in Chamber files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChamberRecords {
    pub urey_bradleys: Vec<UreyBradleyRecord>,
    pub urey_bradley_types: Vec<UreyBradleyType>,
    pub impropers: Vec<ImproperRecord>,
    pub improper_types: Vec<ImproperType>,
    pub cmap_grids: Vec<CmapGrid>,
    pub cmaps: Vec<CmapRecord>,
}

/// Periodic box as stored in `BOX_DIMENSIONS`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxInfo {
    pub ifbox: usize,
    /// Box angle β in degrees, applied to all three angles.
    pub beta: f64,
    /// Box lengths in Å.
    pub lengths: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyRecord {
    pub title: String,
    pub version: String,
    pub is_chamber: bool,
    pub pointers: Pointers,
    pub atoms: Vec<AtomRecord>,
    pub residues: Vec<ResidueRecord>,
    pub bonds: Vec<BondRecord>,
    pub angles: Vec<AngleRecord>,
    pub dihedrals: Vec<DihedralRecord>,
    pub bond_types: Vec<BondType>,
    pub angle_types: Vec<AngleType>,
    pub dihedral_types: Vec<DihedralType>,
    pub lennard_jones: LennardJonesTable,
    /// Per-atom excluded partners (0-based, placeholders removed).
    pub exclusions: Vec<Vec<usize>>,
    pub chamber: Option<ChamberRecords>,
    pub periodic_box: Option<BoxInfo>,
    pub radius_set: Option<String>,
}

impl TopologyRecord {
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Atom index range of residue `index`.
    pub fn residue_atoms(&self, index: usize) -> Range<usize> {
        let start = self.residues.get(index).map_or(0, |r| r.first_atom);
        let end = self
            .residues
            .get(index + 1)
            .map_or(self.atoms.len(), |r| r.first_atom);
        start..end
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic_box.is_some()
    }

    pub fn has_extra_points(&self) -> bool {
        self.pointers.numextra > 0 || self.atoms.iter().any(AtomRecord::is_extra_point)
    }

    pub fn residue_label_of(&self, atom: usize) -> Option<&str> {
        self.atoms
            .get(atom)
            .and_then(|a| self.residues.get(a.residue))
            .map(|r| r.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointers_require_thirty_values_and_default_numextra() {
        assert!(Pointers::from_values(&[0; 29]).is_none());
        let mut values = vec![0usize; 30];
        values[0] = 9;
        values[27] = 1;
        let pointers = Pointers::from_values(&values).unwrap();
        assert_eq!(pointers.natom, 9);
        assert_eq!(pointers.ifbox, 1);
        assert_eq!(pointers.numextra, 0);
    }

    #[test]
    fn extra_point_detection_uses_mass_and_type_name() {
        let mut atom = AtomRecord {
            name: "EP1".into(),
            type_name: "EP".into(),
            charge: -0.1,
            mass: 0.0,
            lj_type: 0,
            atomic_number: None,
            residue: 0,
            gb_radius: None,
            gb_screen: None,
        };
        assert!(atom.is_extra_point());
        atom.mass = 1.0;
        assert!(atom.is_extra_point());
        atom.type_name = "HC".into();
        assert!(!atom.is_extra_point());
    }

    #[test]
    fn dihedral_14_flag_respects_end_groups_and_impropers() {
        let mut dihedral = DihedralRecord {
            atoms: [0, 1, 2, 3],
            type_index: 0,
            with_hydrogen: false,
            ignore_end_groups: false,
            improper: false,
        };
        assert!(dihedral.has_14_pair());
        dihedral.ignore_end_groups = true;
        assert!(!dihedral.has_14_pair());
        dihedral.ignore_end_groups = false;
        dihedral.improper = true;
        assert!(!dihedral.has_14_pair());
    }

    #[test]
    fn lennard_jones_pair_index_is_row_major() {
        let table = LennardJonesTable {
            ntypes: 2,
            parm_index: vec![1, 2, 2, 3],
            acoef: vec![1.0, 2.0, 3.0],
            bcoef: vec![1.0, 2.0, 3.0],
            ..Default::default()
        };
        assert_eq!(table.pair_count(), 3);
        assert_eq!(table.raw_pair_index(1, 1), Some(3));
        assert_eq!(table.raw_pair_index(0, 1), Some(2));
        assert_eq!(table.raw_pair_index(2, 0), None);
    }
}
