use super::term::{CmapMap, CmapTorsion, HarmonicBond, ImproperTorsion, PeriodicTorsion};
use crate::core::models::record::{LennardJonesTable, TopologyRecord};
use crate::core::units::{
    ANGSTROM_TO_NM, KCAL_TO_KJ, angle_force_constant, bond_force_constant,
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Default 1-4 electrostatic scale divisor for AMBER force fields.
pub const DEFAULT_SCEE: f64 = 1.2;
/// Default 1-4 Lennard-Jones scale divisor for AMBER force fields.
pub const DEFAULT_SCNB: f64 = 2.0;
/// CHARMM (Chamber) files apply 1-4 interactions unscaled.
pub const CHAMBER_SCEE: f64 = 1.0;
pub const CHAMBER_SCNB: f64 = 1.0;

/// Relative deviation from the combining rule above which a type pair is
/// treated as an explicit (NBFIX) override.
pub const NBFIX_TOLERANCE: f64 = 1e-6;

/// Half r_min (Å) assigned to types whose A or B coefficient is zero.
const NULL_TYPE_HALF_RMIN: f64 = 1.0;
/// Sigma (nm) used for 1-4 pairs without Lennard-Jones interaction.
const NULL_PAIR_SIGMA: f64 = 0.1;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Type index {index} is outside the {table} table ({len} entries)")]
pub struct UnresolvedTypeIndexError {
    pub table: &'static str,
    /// The offending index as numbered in the file (1-based).
    pub index: i64,
    pub len: usize,
}

fn lookup<T: Copy>(table: &'static str, values: &[T], index: usize) -> Result<T, UnresolvedTypeIndexError> {
    values.get(index).copied().ok_or(UnresolvedTypeIndexError {
        table,
        index: index as i64 + 1,
        len: values.len(),
    })
}

/// Resolves a pair of 0-based LJ types to a 0-based index into the packed
/// coefficient tables.
///
/// Negative `NONBONDED_PARM_INDEX` entries select 10-12 hydrogen-bond terms,
/// which have no output representation and are reported as unresolved.
pub fn packed_index(
    table: &LennardJonesTable,
    type_i: usize,
    type_j: usize,
) -> Result<usize, UnresolvedTypeIndexError> {
    let ntypes = table.ntypes;
    let raw = table
        .raw_pair_index(type_i, type_j)
        .ok_or(UnresolvedTypeIndexError {
            table: "ATOM_TYPE_INDEX",
            index: type_i.max(type_j) as i64 + 1,
            len: ntypes,
        })?;
    let len = table.acoef.len().min(table.bcoef.len());
    if raw < 1 || raw as usize > len {
        return Err(UnresolvedTypeIndexError {
            table: "LENNARD_JONES_ACOEF",
            index: raw,
            len,
        });
    }
    Ok(raw as usize - 1)
}

/// Lennard-Jones parameters of one particle in output units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LjParticle {
    /// nm
    pub sigma: f64,
    /// kJ/mol
    pub epsilon: f64,
}

/// A bond in output units, tagged with the section it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBond {
    pub atoms: [usize; 2],
    pub length: f64,
    pub k: f64,
    pub with_hydrogen: bool,
}

impl ResolvedBond {
    pub fn to_harmonic(&self) -> HarmonicBond {
        HarmonicBond {
            atoms: self.atoms,
            length: self.length,
            k: self.k,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedAngle {
    pub atoms: [usize; 3],
    pub angle: f64,
    pub k: f64,
}

/// A scaled 1-4 nonbonded pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair14 {
    pub atoms: [usize; 2],
    /// Multiplies `qi·qj` (1/SCEE).
    pub charge_scale: f64,
    pub sigma: f64,
    /// Already divided by SCNB, kJ/mol.
    pub epsilon: f64,
}

/// Every entry of a [`TopologyRecord`] expanded into output-unit coefficients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    pub bonds: Vec<ResolvedBond>,
    pub angles: Vec<ResolvedAngle>,
    pub torsions: Vec<PeriodicTorsion>,
    pub urey_bradleys: Vec<HarmonicBond>,
    pub impropers: Vec<ImproperTorsion>,
    pub cmap_maps: Vec<CmapMap>,
    pub cmap_torsions: Vec<CmapTorsion>,
    pub lj: Vec<LjParticle>,
    pub pairs_14: Vec<Pair14>,
    /// Type pairs (0-based, `i <= j`) whose coefficients break the combining rule.
    pub nbfix_pairs: Vec<[usize; 2]>,
    pub has_c4: bool,
}

impl ResolvedParameters {
    pub fn has_nbfix(&self) -> bool {
        !self.nbfix_pairs.is_empty()
    }

    /// Whether Lennard-Jones must move to a tabulated custom term.
    pub fn needs_custom_nonbonded(&self) -> bool {
        self.has_nbfix() || self.has_c4
    }
}

/// Per-type half r_min (Å) and well depth (kcal/mol) from the LJ diagonal.
#[derive(Debug, Clone, Copy)]
struct TypeLj {
    half_rmin: f64,
    depth: f64,
}

pub struct ParameterTableResolver<'a> {
    record: &'a TopologyRecord,
}

impl<'a> ParameterTableResolver<'a> {
    pub fn new(record: &'a TopologyRecord) -> Self {
        Self { record }
    }

    /// Expands every type-indexed entry of the record.
    ///
    /// # Errors
    ///
    /// Returns [`UnresolvedTypeIndexError`] for the first entry whose type index
    /// falls outside its table.
    pub fn resolve(&self) -> Result<ResolvedParameters, UnresolvedTypeIndexError> {
        let type_lj = self.type_lennard_jones()?;
        let mut resolved = ResolvedParameters {
            bonds: self.bonds()?,
            angles: self.angles()?,
            torsions: self.torsions()?,
            lj: self.particles(&type_lj)?,
            pairs_14: self.pairs_14()?,
            nbfix_pairs: self.nbfix_pairs(&type_lj)?,
            has_c4: self
                .record
                .lennard_jones
                .ccoef
                .as_ref()
                .is_some_and(|c| c.iter().any(|&v| v != 0.0)),
            ..Default::default()
        };
        self.chamber_terms(&mut resolved)?;

        debug!(
            bonds = resolved.bonds.len(),
            angles = resolved.angles.len(),
            torsions = resolved.torsions.len(),
            pairs_14 = resolved.pairs_14.len(),
            nbfix_pairs = resolved.nbfix_pairs.len(),
            has_c4 = resolved.has_c4,
            "Resolved parameter tables"
        );
        Ok(resolved)
    }

    fn bonds(&self) -> Result<Vec<ResolvedBond>, UnresolvedTypeIndexError> {
        self.record
            .bonds
            .iter()
            .map(|b| {
                let t = lookup("BOND", &self.record.bond_types, b.type_index)?;
                Ok(ResolvedBond {
                    atoms: b.atoms,
                    length: t.equilibrium * ANGSTROM_TO_NM,
                    k: bond_force_constant(t.force_constant),
                    with_hydrogen: b.with_hydrogen,
                })
            })
            .collect()
    }

    fn angles(&self) -> Result<Vec<ResolvedAngle>, UnresolvedTypeIndexError> {
        self.record
            .angles
            .iter()
            .map(|a| {
                let t = lookup("ANGLE", &self.record.angle_types, a.type_index)?;
                Ok(ResolvedAngle {
                    atoms: a.atoms,
                    angle: t.equilibrium,
                    k: angle_force_constant(t.force_constant),
                })
            })
            .collect()
    }

    fn torsions(&self) -> Result<Vec<PeriodicTorsion>, UnresolvedTypeIndexError> {
        self.record
            .dihedrals
            .iter()
            .map(|d| {
                let t = lookup("DIHEDRAL", &self.record.dihedral_types, d.type_index)?;
                Ok(PeriodicTorsion {
                    atoms: d.atoms,
                    periodicity: (t.periodicity.abs() + 0.5) as u32,
                    phase: t.phase,
                    k: t.amplitude * KCAL_TO_KJ,
                })
            })
            .collect()
    }

    fn type_lennard_jones(&self) -> Result<Vec<TypeLj>, UnresolvedTypeIndexError> {
        let table = &self.record.lennard_jones;
        (0..table.ntypes)
            .map(|t| {
                let k = packed_index(table, t, t)?;
                let (a, b) = (table.acoef[k], table.bcoef[k]);
                Ok(if a == 0.0 || b == 0.0 {
                    TypeLj {
                        half_rmin: 0.0,
                        depth: 0.0,
                    }
                } else {
                    TypeLj {
                        half_rmin: (2.0 * a / b).powf(1.0 / 6.0) / 2.0,
                        depth: b * b / (4.0 * a),
                    }
                })
            })
            .collect()
    }

    fn particles(&self, type_lj: &[TypeLj]) -> Result<Vec<LjParticle>, UnresolvedTypeIndexError> {
        let sigma_factor = 2.0 * ANGSTROM_TO_NM / 2f64.powf(1.0 / 6.0);
        self.record
            .atoms
            .iter()
            .map(|atom| {
                let t = type_lj.get(atom.lj_type).ok_or(UnresolvedTypeIndexError {
                    table: "ATOM_TYPE_INDEX",
                    index: atom.lj_type as i64 + 1,
                    len: type_lj.len(),
                })?;
                Ok(if t.depth == 0.0 {
                    LjParticle {
                        sigma: NULL_TYPE_HALF_RMIN * sigma_factor,
                        epsilon: 0.0,
                    }
                } else {
                    LjParticle {
                        sigma: t.half_rmin * sigma_factor,
                        epsilon: t.depth * KCAL_TO_KJ,
                    }
                })
            })
            .collect()
    }

    fn pairs_14(&self) -> Result<Vec<Pair14>, UnresolvedTypeIndexError> {
        let record = self.record;
        let table = &record.lennard_jones;
        let (default_scee, default_scnb) = if record.is_chamber {
            (CHAMBER_SCEE, CHAMBER_SCNB)
        } else {
            (DEFAULT_SCEE, DEFAULT_SCNB)
        };
        let (acoef, bcoef) = match (&table.acoef_14, &table.bcoef_14) {
            (Some(a), Some(b)) if record.is_chamber => (a, b),
            _ => (&table.acoef, &table.bcoef),
        };

        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for dihedral in record.dihedrals.iter().filter(|d| d.has_14_pair()) {
            let [i, _, _, l] = dihedral.atoms;
            let key = if i < l { (i, l) } else { (l, i) };
            if i == l || !seen.insert(key) {
                continue;
            }
            let t = lookup("DIHEDRAL", &record.dihedral_types, dihedral.type_index)?;
            let scee = t.scee.filter(|&s| s > 0.0).unwrap_or(default_scee);
            let scnb = t.scnb.filter(|&s| s > 0.0).unwrap_or(default_scnb);

            let type_i = record.atoms[i].lj_type;
            let type_l = record.atoms[l].lj_type;
            let k = packed_index(table, type_i, type_l)?;
            let (a, b) = (
                lookup("LENNARD_JONES_14_ACOEF", acoef, k)?,
                lookup("LENNARD_JONES_14_BCOEF", bcoef, k)?,
            );
            let (sigma, epsilon) = if a == 0.0 || b == 0.0 {
                (NULL_PAIR_SIGMA, 0.0)
            } else {
                let rmin = (2.0 * a / b).powf(1.0 / 6.0);
                (
                    rmin * ANGSTROM_TO_NM / 2f64.powf(1.0 / 6.0),
                    b * b / (4.0 * a) * KCAL_TO_KJ / scnb,
                )
            };
            pairs.push(Pair14 {
                atoms: [i, l],
                charge_scale: 1.0 / scee,
                sigma,
                epsilon,
            });
        }
        Ok(pairs)
    }

    fn nbfix_pairs(&self, type_lj: &[TypeLj]) -> Result<Vec<[usize; 2]>, UnresolvedTypeIndexError> {
        let table = &self.record.lennard_jones;
        let mut pairs = Vec::new();
        for i in 0..table.ntypes {
            for j in i..table.ntypes {
                let k = packed_index(table, i, j)?;
                let (a, b) = (table.acoef[k], table.bcoef[k]);
                let rij = type_lj[i].half_rmin + type_lj[j].half_rmin;
                let wdij = (type_lj[i].depth * type_lj[j].depth).sqrt();
                let deviates = if a == 0.0 || b == 0.0 {
                    a != 0.0 || b != 0.0 || (wdij != 0.0 && rij != 0.0)
                } else {
                    ((a - wdij * rij.powi(12)) / a).abs() > NBFIX_TOLERANCE
                        || ((b - 2.0 * wdij * rij.powi(6)) / b).abs() > NBFIX_TOLERANCE
                };
                if deviates {
                    pairs.push([i, j]);
                }
            }
        }
        Ok(pairs)
    }

    fn chamber_terms(&self, resolved: &mut ResolvedParameters) -> Result<(), UnresolvedTypeIndexError> {
        let Some(chamber) = &self.record.chamber else {
            return Ok(());
        };

        resolved.urey_bradleys = chamber
            .urey_bradleys
            .iter()
            .map(|ub| {
                let t = lookup("CHARMM_UREY_BRADLEY", &chamber.urey_bradley_types, ub.type_index)?;
                Ok(HarmonicBond {
                    atoms: ub.atoms,
                    length: t.equilibrium * ANGSTROM_TO_NM,
                    k: bond_force_constant(t.force_constant),
                })
            })
            .collect::<Result<_, UnresolvedTypeIndexError>>()?;

        resolved.impropers = chamber
            .impropers
            .iter()
            .map(|imp| {
                let t = lookup("CHARMM_IMPROPER", &chamber.improper_types, imp.type_index)?;
                Ok(ImproperTorsion {
                    atoms: imp.atoms,
                    theta0: t.phase,
                    k: t.force_constant * KCAL_TO_KJ,
                })
            })
            .collect::<Result<_, UnresolvedTypeIndexError>>()?;

        resolved.cmap_maps = chamber
            .cmap_grids
            .iter()
            .map(|grid| reorder_cmap_grid(grid.resolution, &grid.values))
            .collect();

        resolved.cmap_torsions = chamber
            .cmaps
            .iter()
            .map(|cmap| {
                if cmap.type_index >= chamber.cmap_grids.len() {
                    return Err(UnresolvedTypeIndexError {
                        table: "CMAP",
                        index: cmap.type_index as i64 + 1,
                        len: chamber.cmap_grids.len(),
                    });
                }
                let [a, b, c, d, e] = cmap.atoms;
                Ok(CmapTorsion {
                    map: cmap.type_index,
                    phi: [a, b, c, d],
                    psi: [b, c, d, e],
                })
            })
            .collect::<Result<_, UnresolvedTypeIndexError>>()?;
        Ok(())
    }
}

/// Converts a file-order CMAP grid (ψ fastest, origin at -180°) to kJ/mol
/// with φ varying fastest and the origin shifted by half a period.
pub fn reorder_cmap_grid(size: usize, values: &[f64]) -> CmapMap {
    let shift = size / 2;
    let mut energy = vec![0.0; size * size];
    for i in 0..size {
        for j in 0..size {
            let source = ((i + shift) % size) * size + (j + shift) % size;
            energy[i + size * j] = values.get(source).copied().unwrap_or(0.0) * KCAL_TO_KJ;
        }
    }
    CmapMap { size, energy }
}
