//! Synthetic prmtop files for tests: methanol plus one TIP3P water.

use crate::core::io::prmtop::PrmtopFile;
use crate::core::io::traits::AmberFile;
use crate::core::models::record::TopologyRecord;
use std::fmt::Write;

pub(crate) const ATOM_NAMES: [&str; 9] = ["C1", "H1", "H2", "H3", "O1", "HO", "OW", "HW1", "HW2"];
pub(crate) const CHARGES: [f64; 9] = [
    0.1166, 0.0372, 0.0372, 0.0372, -0.6497, 0.4215, -0.834, 0.417, 0.417,
];
const LJ_TYPES: [i64; 9] = [1, 2, 2, 2, 3, 2, 3, 2, 2];
const MASSES: [f64; 9] = [12.01, 1.008, 1.008, 1.008, 16.0, 1.008, 16.0, 1.008, 1.008];
const ATOMIC_NUMBERS: [i64; 9] = [6, 1, 1, 1, 8, 1, 8, 1, 1];
const AMBER_TYPES: [&str; 9] = ["CT", "HC", "HC", "HC", "OH", "HO", "OW", "HW", "HW"];
const RADII: [f64; 9] = [1.7, 1.2, 1.2, 1.2, 1.5, 1.2, 1.5, 1.2, 1.2];
const SCREEN: [f64; 9] = [0.72, 0.85, 0.85, 0.85, 0.85, 0.85, 0.85, 0.85, 0.85];

/// Half of r_min (Å) and well depth (kcal/mol) for the C, H and O types.
pub(crate) const LJ_PARAMS: [(f64, f64); 3] = [(1.908, 0.086), (0.6, 0.0157), (1.6612, 0.21)];

pub(crate) const BOND_TYPES: [(f64, f64); 4] =
    [(340.0, 1.09), (320.0, 1.41), (553.0, 0.9572), (553.0, 1.5136)];
pub(crate) const ANGLE_TYPES_DEG: [(f64, f64); 3] = [(35.0, 109.5), (50.0, 109.5), (55.0, 108.5)];
pub(crate) const DIHEDRAL_TYPES: [(f64, f64, f64); 2] = [(0.167, 3.0, 0.0), (0.25, 1.0, 0.0)];

/// Bonds as (atom, atom, 1-based type); the first seven involve hydrogen.
const BONDS: [(i64, i64, i64); 8] = [
    (0, 1, 1),
    (0, 2, 1),
    (0, 3, 1),
    (4, 5, 3),
    (6, 7, 3),
    (6, 8, 3),
    (7, 8, 4),
    (0, 4, 2),
];
const ANGLES: [(i64, i64, i64, i64); 7] = [
    (1, 0, 2, 1),
    (1, 0, 3, 1),
    (2, 0, 3, 1),
    (1, 0, 4, 2),
    (2, 0, 4, 2),
    (3, 0, 4, 2),
    (0, 4, 5, 3),
];
const EXCLUSIONS: [&[i64]; 9] = [
    &[2, 3, 4, 5, 6],
    &[3, 4, 5, 6],
    &[4, 5, 6],
    &[5, 6],
    &[6],
    &[0],
    &[8, 9],
    &[9],
    &[0],
];

/// Describes which variant of the methanol/water prmtop to render.
#[derive(Debug, Clone)]
pub(crate) struct Fixture {
    pub periodic: bool,
    pub chamber: bool,
    /// Scales the C–O pair's A and B away from the combining rule.
    pub nbfix: bool,
    /// Adds a `LENNARD_JONES_CCOEF` section with one nonzero entry.
    pub c4: bool,
    pub truncate_charges: bool,
    pub out_of_bounds_bond: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            periodic: true,
            chamber: false,
            nbfix: false,
            c4: false,
            truncate_charges: false,
            out_of_bounds_bond: false,
        }
    }
}

/// 1-based index into the packed coefficient tables for 1-based types.
pub(crate) fn packed_pair_index(i: usize, j: usize) -> usize {
    let (hi, lo) = if i >= j { (i, j) } else { (j, i) };
    hi * (hi - 1) / 2 + lo
}

/// Lorentz–Berthelot A and B for a pair of 0-based types.
pub(crate) fn combined_ab(i: usize, j: usize) -> (f64, f64) {
    let (ri, ei) = LJ_PARAMS[i];
    let (rj, ej) = LJ_PARAMS[j];
    let r = ri + rj;
    let eps = (ei * ej).sqrt();
    (eps * r.powi(12), 2.0 * eps * r.powi(6))
}

fn ints(out: &mut String, flag: &str, values: &[i64]) {
    let _ = writeln!(out, "%FLAG {flag}\n%FORMAT(10I8)");
    for chunk in values.chunks(10) {
        for v in chunk {
            let _ = write!(out, "{v:8}");
        }
        out.push('\n');
    }
    if values.is_empty() {
        out.push('\n');
    }
}

fn reals(out: &mut String, flag: &str, values: &[f64]) {
    let _ = writeln!(out, "%FLAG {flag}\n%FORMAT(5E16.8)");
    for chunk in values.chunks(5) {
        for v in chunk {
            let _ = write!(out, "{v:16.8E}");
        }
        out.push('\n');
    }
    if values.is_empty() {
        out.push('\n');
    }
}

fn fixed_reals(out: &mut String, flag: &str, values: &[f64]) {
    let _ = writeln!(out, "%FLAG {flag}\n%COMMENT fixed-point grid\n%FORMAT(8F9.5)");
    for chunk in values.chunks(8) {
        for v in chunk {
            let _ = write!(out, "{v:9.5}");
        }
        out.push('\n');
    }
}

fn texts(out: &mut String, flag: &str, values: &[&str]) {
    let _ = writeln!(out, "%FLAG {flag}\n%FORMAT(20a4)");
    for chunk in values.chunks(20) {
        for v in chunk {
            let _ = write!(out, "{v:<4}");
        }
        out.push('\n');
    }
}

fn line(out: &mut String, flag: &str, text: &str) {
    let _ = writeln!(out, "%FLAG {flag}\n%FORMAT(a80)\n{text}");
}

impl Fixture {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("%VERSION  VERSION_STAMP = V0001.000  DATE = 01/01/24  00:00:00\n");
        if self.chamber {
            line(&mut out, "CTITLE", "chamber fixture");
        } else {
            line(&mut out, "TITLE", "methanol and water");
        }

        let ifbox = if self.periodic { 1 } else { 0 };
        let pointers = [
            9, 3, 7, 1, 7, 0, 4, 0, 0, 0, 20, 2, 1, 0, 0, 4, 3, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0,
            ifbox, 6, 0, 0,
        ];
        ints(&mut out, "POINTERS", &pointers);
        texts(&mut out, "ATOM_NAME", &ATOM_NAMES);

        let mut charges: Vec<f64> = CHARGES.iter().map(|q| q * 18.2223).collect();
        if self.truncate_charges {
            charges.pop();
        }
        reals(&mut out, "CHARGE", &charges);
        ints(&mut out, "ATOMIC_NUMBER", &ATOMIC_NUMBERS);
        reals(&mut out, "MASS", &MASSES);
        ints(&mut out, "ATOM_TYPE_INDEX", &LJ_TYPES);
        ints(&mut out, "NUMBER_EXCLUDED_ATOMS", &EXCLUSIONS.map(|e| e.len() as i64));

        let mut parm_index = Vec::with_capacity(9);
        for i in 1..=3 {
            for j in 1..=3 {
                parm_index.push(packed_pair_index(i, j) as i64);
            }
        }
        ints(&mut out, "NONBONDED_PARM_INDEX", &parm_index);
        texts(&mut out, "RESIDUE_LABEL", &["MOL", "WAT"]);
        ints(&mut out, "RESIDUE_POINTER", &[1, 7]);

        reals(&mut out, "BOND_FORCE_CONSTANT", &BOND_TYPES.map(|b| b.0));
        reals(&mut out, "BOND_EQUIL_VALUE", &BOND_TYPES.map(|b| b.1));
        reals(&mut out, "ANGLE_FORCE_CONSTANT", &ANGLE_TYPES_DEG.map(|a| a.0));
        reals(
            &mut out,
            "ANGLE_EQUIL_VALUE",
            &ANGLE_TYPES_DEG.map(|a| a.1.to_radians()),
        );
        reals(&mut out, "DIHEDRAL_FORCE_CONSTANT", &DIHEDRAL_TYPES.map(|d| d.0));
        reals(&mut out, "DIHEDRAL_PERIODICITY", &DIHEDRAL_TYPES.map(|d| d.1));
        reals(&mut out, "DIHEDRAL_PHASE", &DIHEDRAL_TYPES.map(|d| d.2));
        if !self.chamber {
            reals(&mut out, "SCEE_SCALE_FACTOR", &[1.2, 1.2]);
            reals(&mut out, "SCNB_SCALE_FACTOR", &[2.0, 2.0]);
        }

        let mut acoef = vec![0.0; 6];
        let mut bcoef = vec![0.0; 6];
        for i in 0..3 {
            for j in 0..=i {
                let (a, b) = combined_ab(i, j);
                let k = packed_pair_index(i + 1, j + 1) - 1;
                acoef[k] = a;
                bcoef[k] = b;
            }
        }
        if self.nbfix {
            let k = packed_pair_index(3, 1) - 1;
            acoef[k] *= 1.2;
            bcoef[k] *= 0.9;
        }
        reals(&mut out, "LENNARD_JONES_ACOEF", &acoef);
        reals(&mut out, "LENNARD_JONES_BCOEF", &bcoef);
        if self.c4 {
            let mut ccoef = vec![0.0; 6];
            ccoef[packed_pair_index(3, 1) - 1] = 5.0;
            reals(&mut out, "LENNARD_JONES_CCOEF", &ccoef);
        }
        if self.chamber {
            reals(
                &mut out,
                "LENNARD_JONES_14_ACOEF",
                &acoef.iter().map(|a| a * 0.5).collect::<Vec<_>>(),
            );
            reals(
                &mut out,
                "LENNARD_JONES_14_BCOEF",
                &bcoef.iter().map(|b| b * 0.5).collect::<Vec<_>>(),
            );
        }

        let mut bonds_h = Vec::new();
        let mut bonds_heavy = Vec::new();
        for (index, &(i, j, t)) in BONDS.iter().enumerate() {
            let target = if index < 7 { &mut bonds_h } else { &mut bonds_heavy };
            target.extend([3 * i, 3 * j, t]);
        }
        if self.out_of_bounds_bond {
            bonds_heavy[1] = 3 * 9;
        }
        ints(&mut out, "BONDS_INC_HYDROGEN", &bonds_h);
        ints(&mut out, "BONDS_WITHOUT_HYDROGEN", &bonds_heavy);

        let angles: Vec<i64> = ANGLES
            .iter()
            .flat_map(|&(i, j, k, t)| [3 * i, 3 * j, 3 * k, t])
            .collect();
        ints(&mut out, "ANGLES_INC_HYDROGEN", &angles);
        ints(&mut out, "ANGLES_WITHOUT_HYDROGEN", &[]);

        let dihedrals = [
            3, 0, 12, 15, 1, //
            6, 0, 12, 15, 1, //
            9, 0, 12, 15, 1, //
            3, 0, -12, 15, 2,
        ];
        ints(&mut out, "DIHEDRALS_INC_HYDROGEN", &dihedrals);
        ints(&mut out, "DIHEDRALS_WITHOUT_HYDROGEN", &[]);

        let excluded: Vec<i64> = EXCLUSIONS.iter().flat_map(|e| e.iter().copied()).collect();
        ints(&mut out, "EXCLUDED_ATOMS_LIST", &excluded);
        texts(&mut out, "AMBER_ATOM_TYPE", &AMBER_TYPES);
        line(&mut out, "RADIUS_SET", "modified Bondi radii (mbondi2)");
        reals(&mut out, "RADII", &RADII);
        reals(&mut out, "SCREEN", &SCREEN);

        if self.periodic {
            reals(&mut out, "BOX_DIMENSIONS", &[90.0, 30.0, 30.0, 30.0]);
        }

        if self.chamber {
            ints(&mut out, "CHARMM_UREY_BRADLEY_COUNT", &[1, 1]);
            ints(&mut out, "CHARMM_UREY_BRADLEY", &[2, 5, 1]);
            reals(&mut out, "CHARMM_UREY_BRADLEY_FORCE_CONSTANT", &[26.0]);
            reals(&mut out, "CHARMM_UREY_BRADLEY_EQUIL_VALUE", &[2.05]);
            ints(&mut out, "CHARMM_NUM_IMPROPERS", &[1]);
            ints(&mut out, "CHARMM_IMPROPERS", &[1, 2, 3, 5, 1]);
            ints(&mut out, "CHARMM_NUM_IMPR_TYPES", &[1]);
            reals(&mut out, "CHARMM_IMPROPER_FORCE_CONSTANT", &[1.5]);
            reals(&mut out, "CHARMM_IMPROPER_PHASE", &[0.0]);
            ints(&mut out, "CHARMM_CMAP_COUNT", &[1, 1]);
            ints(&mut out, "CHARMM_CMAP_RESOLUTION", &[4]);
            let grid: Vec<f64> = (0..16).map(f64::from).collect();
            fixed_reals(&mut out, "CHARMM_CMAP_PARAMETER_01", &grid);
            ints(&mut out, "CHARMM_CMAP_INDEX", &[3, 2, 1, 5, 6, 1]);
        }
        out
    }

    pub fn record(&self) -> TopologyRecord {
        PrmtopFile::read_from_str(&self.render()).expect("fixture should parse")
    }
}
