use super::format::{FieldKind, FortranFormat, ParseFormatError, parse_real};
use super::traits::AmberFile;
use crate::core::models::record::{
    AngleRecord, AngleType, AtomRecord, BondRecord, BondType, BoxInfo, ChamberRecords, CmapGrid,
    CmapRecord, DihedralRecord, DihedralType, ImproperRecord, ImproperType, LennardJonesTable,
    Pointers, ResidueRecord, TopologyRecord, UreyBradleyRecord, UreyBradleyType,
};
use crate::core::units::AMBER_CHARGE_FACTOR;
use std::collections::HashMap;
use std::io::{self, BufRead};
use thiserror::Error;
use tracing::debug;

/// The only `%VERSION` stamp this reader understands.
pub const SUPPORTED_VERSION: &str = "V0001.000";

#[derive(Debug, Error)]
pub enum PrmtopError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed prmtop in section '{section}': {reason}")]
    MalformedFormat { section: String, reason: String },
    #[error("Unsupported prmtop version '{version}' (only V0001.000 is supported)")]
    UnsupportedVersion { version: String },
}

fn malformed(section: &str, reason: impl Into<String>) -> PrmtopError {
    PrmtopError::MalformedFormat {
        section: section.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionData {
    Text(Vec<String>),
    Integers(Vec<i64>),
    Reals(Vec<f64>),
}

impl SectionData {
    fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => SectionData::Text(Vec::new()),
            FieldKind::Integer => SectionData::Integers(Vec::new()),
            FieldKind::Real => SectionData::Reals(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SectionData::Text(v) => v.len(),
            SectionData::Integers(v) => v.len(),
            SectionData::Reals(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct Section {
    format: Option<FortranFormat>,
    data: Option<SectionData>,
}

impl Section {
    fn push_line(&mut self, flag: &str, line: &str) -> Result<(), PrmtopError> {
        let (Some(format), Some(data)) = (&self.format, &mut self.data) else {
            return Err(malformed(flag, "data line before %FORMAT"));
        };
        let fields = format.fields(line);
        match data {
            SectionData::Text(values) => values.extend(fields.into_iter().map(str::to_string)),
            SectionData::Integers(values) => {
                for field in fields {
                    let value = field
                        .parse::<i64>()
                        .map_err(|_| malformed(flag, format!("invalid integer '{field}'")))?;
                    values.push(value);
                }
            }
            SectionData::Reals(values) => {
                for field in fields {
                    let value = parse_real(field)
                        .ok_or_else(|| malformed(flag, format!("invalid real '{field}'")))?;
                    values.push(value);
                }
            }
        }
        Ok(())
    }
}

/// The raw `%FLAG` sections of a prmtop file, before any interpretation.
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    version: Option<String>,
    sections: HashMap<String, Section>,
    order: Vec<String>,
}

impl SectionTable {
    /// Reads every section of a prmtop file.
    ///
    /// # Errors
    ///
    /// Returns [`PrmtopError::UnsupportedVersion`] for old-style files or an
    /// unknown version stamp, and [`PrmtopError::MalformedFormat`] for
    /// structural problems (data outside a section, missing `%FORMAT`,
    /// unparsable values, duplicate flags).
    pub fn parse(reader: &mut impl BufRead) -> Result<Self, PrmtopError> {
        let mut table = SectionTable::default();
        let mut current: Option<String> = None;
        let mut buffer = String::new();

        loop {
            buffer.clear();
            if reader.read_line(&mut buffer)? == 0 {
                break;
            }
            let line = buffer.trim_end_matches(['\r', '\n']);

            if let Some(rest) = line.strip_prefix("%VERSION") {
                let version = parse_version_stamp(rest);
                if version != SUPPORTED_VERSION {
                    return Err(PrmtopError::UnsupportedVersion { version });
                }
                table.version = Some(version);
            } else if let Some(rest) = line.strip_prefix("%FLAG") {
                let flag = rest.trim();
                if flag.is_empty() {
                    return Err(malformed("%FLAG", "missing section name"));
                }
                table.close(current.take())?;
                if table.sections.contains_key(flag) {
                    return Err(malformed(flag, "duplicate section"));
                }
                table.sections.insert(
                    flag.to_string(),
                    Section {
                        format: None,
                        data: None,
                    },
                );
                table.order.push(flag.to_string());
                current = Some(flag.to_string());
            } else if let Some(rest) = line.strip_prefix("%FORMAT") {
                let Some(flag) = current.as_deref() else {
                    return Err(malformed("%FORMAT", "format line before any %FLAG"));
                };
                let format: FortranFormat = rest
                    .trim()
                    .parse()
                    .map_err(|e: ParseFormatError| malformed(flag, e.to_string()))?;
                if let Some(section) = table.sections.get_mut(flag) {
                    section.format = Some(format);
                    section.data = Some(SectionData::empty(format.kind));
                }
            } else if line.starts_with('%') {
                // %COMMENT and unknown directives carry no data.
                continue;
            } else {
                match current.as_deref() {
                    Some(flag) => {
                        if let Some(section) = table.sections.get_mut(flag) {
                            section.push_line(flag, line)?;
                        }
                    }
                    None if line.trim().is_empty() => continue,
                    None if table.version.is_none() => {
                        return Err(PrmtopError::UnsupportedVersion {
                            version: "none (old-style prmtop without %VERSION header)".into(),
                        });
                    }
                    None => return Err(malformed("<header>", "data line before any %FLAG")),
                }
            }
        }
        table.close(current)?;

        if table.version.is_none() {
            return Err(PrmtopError::UnsupportedVersion {
                version: "none (missing %VERSION header)".into(),
            });
        }
        debug!(sections = table.order.len(), "Read prmtop sections");
        Ok(table)
    }

    fn close(&self, flag: Option<String>) -> Result<(), PrmtopError> {
        match flag {
            Some(flag) if self.sections.get(&flag).is_some_and(|s| s.format.is_none()) => {
                Err(malformed(&flag, "%FLAG without %FORMAT"))
            }
            _ => Ok(()),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.sections.contains_key(flag)
    }

    /// Section names in file order.
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn data(&self, flag: &str) -> Option<&SectionData> {
        self.sections.get(flag).and_then(|s| s.data.as_ref())
    }

    pub fn integers(&self, flag: &str) -> Result<Option<&[i64]>, PrmtopError> {
        match self.data(flag) {
            None => Ok(None),
            Some(SectionData::Integers(values)) => Ok(Some(values)),
            Some(_) => Err(malformed(flag, "expected integer data")),
        }
    }

    /// Real-valued section data. Integer-formatted sections are widened.
    pub fn reals(&self, flag: &str) -> Result<Option<Vec<f64>>, PrmtopError> {
        match self.data(flag) {
            None => Ok(None),
            Some(SectionData::Reals(values)) => Ok(Some(values.clone())),
            Some(SectionData::Integers(values)) => {
                Ok(Some(values.iter().map(|&v| v as f64).collect()))
            }
            Some(SectionData::Text(_)) => Err(malformed(flag, "expected numeric data")),
        }
    }

    pub fn texts(&self, flag: &str) -> Result<Option<&[String]>, PrmtopError> {
        match self.data(flag) {
            None => Ok(None),
            Some(SectionData::Text(values)) => Ok(Some(values)),
            Some(_) => Err(malformed(flag, "expected text data")),
        }
    }
}

fn parse_version_stamp(rest: &str) -> String {
    rest.split_once("VERSION_STAMP")
        .and_then(|(_, after)| after.trim_start().strip_prefix('='))
        .and_then(|after| after.split_whitespace().next())
        .unwrap_or_else(|| rest.trim())
        .to_string()
}

fn check_len(flag: &str, actual: usize, expected: usize) -> Result<(), PrmtopError> {
    if actual != expected {
        return Err(malformed(
            flag,
            format!("expected {expected} values, found {actual}"),
        ));
    }
    Ok(())
}

fn required_ints<'a>(
    table: &'a SectionTable,
    flag: &str,
    expected: usize,
) -> Result<&'a [i64], PrmtopError> {
    match table.integers(flag)? {
        Some(values) => {
            check_len(flag, values.len(), expected)?;
            Ok(values)
        }
        None if expected == 0 => Ok(&[]),
        None => Err(malformed(flag, "required section is missing")),
    }
}

fn required_reals(
    table: &SectionTable,
    flag: &str,
    expected: usize,
) -> Result<Vec<f64>, PrmtopError> {
    match table.reals(flag)? {
        Some(values) => {
            check_len(flag, values.len(), expected)?;
            Ok(values)
        }
        None if expected == 0 => Ok(Vec::new()),
        None => Err(malformed(flag, "required section is missing")),
    }
}

fn required_texts<'a>(
    table: &'a SectionTable,
    flag: &str,
    expected: usize,
) -> Result<&'a [String], PrmtopError> {
    match table.texts(flag)? {
        Some(values) => {
            check_len(flag, values.len(), expected)?;
            Ok(values)
        }
        None if expected == 0 => Ok(&[]),
        None => Err(malformed(flag, "required section is missing")),
    }
}

fn optional_reals(
    table: &SectionTable,
    flag: &str,
    expected: usize,
) -> Result<Option<Vec<f64>>, PrmtopError> {
    match table.reals(flag)? {
        Some(values) => {
            check_len(flag, values.len(), expected)?;
            Ok(Some(values))
        }
        None => Ok(None),
    }
}

fn count(flag: &str, value: i64) -> Result<usize, PrmtopError> {
    usize::try_from(value).map_err(|_| malformed(flag, format!("negative count {value}")))
}

/// Number of values a section must hold for `n` entries of `per_entry` values.
fn section_len(flag: &str, n: usize, per_entry: usize) -> Result<usize, PrmtopError> {
    n.checked_mul(per_entry)
        .ok_or_else(|| malformed(flag, format!("entry count {n} overflows the section length")))
}

/// Converts a `3·index` coordinate offset into a 0-based atom index.
fn coordinate_atom(flag: &str, raw: i64, natom: usize) -> Result<usize, PrmtopError> {
    let raw = raw.unsigned_abs();
    if raw % 3 != 0 {
        return Err(malformed(
            flag,
            format!("atom offset {raw} is not a multiple of 3"),
        ));
    }
    let index = usize::try_from(raw / 3).unwrap_or(usize::MAX);
    if index >= natom {
        return Err(malformed(
            flag,
            format!("atom index {index} out of bounds for {natom} atoms"),
        ));
    }
    Ok(index)
}

fn one_based_atom(flag: &str, raw: i64, natom: usize) -> Result<usize, PrmtopError> {
    if raw < 1 || raw as usize > natom {
        return Err(malformed(
            flag,
            format!("atom number {raw} out of bounds for {natom} atoms"),
        ));
    }
    Ok(raw as usize - 1)
}

fn one_based_type(flag: &str, raw: i64) -> Result<usize, PrmtopError> {
    if raw < 1 {
        return Err(malformed(flag, format!("invalid type index {raw}")));
    }
    Ok(raw as usize - 1)
}

fn read_pointers(table: &SectionTable) -> Result<Pointers, PrmtopError> {
    const FLAG: &str = "POINTERS";
    let raw = table
        .integers(FLAG)?
        .ok_or_else(|| malformed(FLAG, "required section is missing"))?;
    let values = raw
        .iter()
        .map(|&v| count(FLAG, v))
        .collect::<Result<Vec<_>, _>>()?;
    Pointers::from_values(&values).ok_or_else(|| {
        malformed(
            FLAG,
            format!(
                "expected at least {} values, found {}",
                Pointers::REQUIRED_LEN,
                values.len()
            ),
        )
    })
}

fn read_atoms(table: &SectionTable, p: &Pointers) -> Result<Vec<AtomRecord>, PrmtopError> {
    let n = p.natom;
    let names = required_texts(table, "ATOM_NAME", n)?;
    let charges = required_reals(table, "CHARGE", n)?;
    let masses = required_reals(table, "MASS", n)?;
    let type_indices = required_ints(table, "ATOM_TYPE_INDEX", n)?;
    let type_names = match table.texts("AMBER_ATOM_TYPE")? {
        Some(values) => {
            check_len("AMBER_ATOM_TYPE", values.len(), n)?;
            Some(values)
        }
        None => None,
    };
    let atomic_numbers = match table.integers("ATOMIC_NUMBER")? {
        Some(values) => {
            check_len("ATOMIC_NUMBER", values.len(), n)?;
            Some(values)
        }
        None => None,
    };
    let radii = optional_reals(table, "RADII", n)?;
    let screens = optional_reals(table, "SCREEN", n)?;

    (0..n)
        .map(|i| {
            Ok(AtomRecord {
                name: names[i].clone(),
                type_name: type_names.map(|t| t[i].clone()).unwrap_or_default(),
                charge: charges[i] / AMBER_CHARGE_FACTOR,
                mass: masses[i],
                lj_type: one_based_type("ATOM_TYPE_INDEX", type_indices[i])?,
                atomic_number: atomic_numbers
                    .and_then(|z| u8::try_from(z[i]).ok())
                    .filter(|&z| z > 0),
                residue: 0,
                gb_radius: radii.as_ref().map(|r| r[i]),
                gb_screen: screens.as_ref().map(|s| s[i]),
            })
        })
        .collect()
}

fn read_residues(
    table: &SectionTable,
    p: &Pointers,
    atoms: &mut [AtomRecord],
) -> Result<Vec<ResidueRecord>, PrmtopError> {
    let labels = required_texts(table, "RESIDUE_LABEL", p.nres)?;
    let pointers = required_ints(table, "RESIDUE_POINTER", p.nres)?;

    let mut residues = Vec::with_capacity(p.nres);
    for (index, (&raw, label)) in pointers.iter().zip(labels).enumerate() {
        let first_atom = one_based_atom("RESIDUE_POINTER", raw, p.natom)?;
        let bad_first = index == 0 && first_atom != 0;
        let decreasing = residues
            .last()
            .is_some_and(|prev: &ResidueRecord| prev.first_atom >= first_atom);
        if bad_first || decreasing {
            return Err(malformed(
                "RESIDUE_POINTER",
                format!("residue {} starts at atom {raw}, out of order", index + 1),
            ));
        }
        residues.push(ResidueRecord {
            label: label.clone(),
            first_atom,
        });
    }

    for (index, residue) in residues.iter().enumerate() {
        let end = residues.get(index + 1).map_or(atoms.len(), |r| r.first_atom);
        for atom in &mut atoms[residue.first_atom..end] {
            atom.residue = index;
        }
    }
    Ok(residues)
}

fn read_bonds(
    table: &SectionTable,
    flag: &str,
    n: usize,
    natom: usize,
    with_hydrogen: bool,
) -> Result<Vec<BondRecord>, PrmtopError> {
    required_ints(table, flag, section_len(flag, n, 3)?)?
        .chunks_exact(3)
        .map(|c| {
            Ok(BondRecord {
                atoms: [
                    coordinate_atom(flag, c[0], natom)?,
                    coordinate_atom(flag, c[1], natom)?,
                ],
                type_index: one_based_type(flag, c[2])?,
                with_hydrogen,
            })
        })
        .collect()
}

fn read_angles(
    table: &SectionTable,
    flag: &str,
    n: usize,
    natom: usize,
    with_hydrogen: bool,
) -> Result<Vec<AngleRecord>, PrmtopError> {
    required_ints(table, flag, section_len(flag, n, 4)?)?
        .chunks_exact(4)
        .map(|c| {
            Ok(AngleRecord {
                atoms: [
                    coordinate_atom(flag, c[0], natom)?,
                    coordinate_atom(flag, c[1], natom)?,
                    coordinate_atom(flag, c[2], natom)?,
                ],
                type_index: one_based_type(flag, c[3])?,
                with_hydrogen,
            })
        })
        .collect()
}

fn read_dihedrals(
    table: &SectionTable,
    flag: &str,
    n: usize,
    natom: usize,
    with_hydrogen: bool,
) -> Result<Vec<DihedralRecord>, PrmtopError> {
    required_ints(table, flag, section_len(flag, n, 5)?)?
        .chunks_exact(5)
        .map(|c| {
            Ok(DihedralRecord {
                atoms: [
                    coordinate_atom(flag, c[0], natom)?,
                    coordinate_atom(flag, c[1], natom)?,
                    coordinate_atom(flag, c[2], natom)?,
                    coordinate_atom(flag, c[3], natom)?,
                ],
                type_index: one_based_type(flag, c[4])?,
                with_hydrogen,
                ignore_end_groups: c[2] < 0,
                improper: c[3] < 0,
            })
        })
        .collect()
}

fn read_parameter_types(
    table: &SectionTable,
    p: &Pointers,
) -> Result<(Vec<BondType>, Vec<AngleType>, Vec<DihedralType>), PrmtopError> {
    let bond_k = required_reals(table, "BOND_FORCE_CONSTANT", p.numbnd)?;
    let bond_eq = required_reals(table, "BOND_EQUIL_VALUE", p.numbnd)?;
    let bond_types = bond_k
        .into_iter()
        .zip(bond_eq)
        .map(|(force_constant, equilibrium)| BondType {
            force_constant,
            equilibrium,
        })
        .collect();

    let angle_k = required_reals(table, "ANGLE_FORCE_CONSTANT", p.numang)?;
    let angle_eq = required_reals(table, "ANGLE_EQUIL_VALUE", p.numang)?;
    let angle_types = angle_k
        .into_iter()
        .zip(angle_eq)
        .map(|(force_constant, equilibrium)| AngleType {
            force_constant,
            equilibrium,
        })
        .collect();

    let amplitudes = required_reals(table, "DIHEDRAL_FORCE_CONSTANT", p.nptra)?;
    let periodicities = required_reals(table, "DIHEDRAL_PERIODICITY", p.nptra)?;
    let phases = required_reals(table, "DIHEDRAL_PHASE", p.nptra)?;
    let scee = optional_reals(table, "SCEE_SCALE_FACTOR", p.nptra)?;
    let scnb = optional_reals(table, "SCNB_SCALE_FACTOR", p.nptra)?;
    let dihedral_types = (0..p.nptra)
        .map(|i| DihedralType {
            amplitude: amplitudes[i],
            periodicity: periodicities[i],
            phase: phases[i],
            scee: scee.as_ref().map(|s| s[i]),
            scnb: scnb.as_ref().map(|s| s[i]),
        })
        .collect();

    Ok((bond_types, angle_types, dihedral_types))
}

fn read_lennard_jones(
    table: &SectionTable,
    p: &Pointers,
) -> Result<LennardJonesTable, PrmtopError> {
    let ntypes = p.ntypes;
    let pairs = section_len("POINTERS", ntypes, ntypes.saturating_add(1))? / 2;
    let square = section_len("NONBONDED_PARM_INDEX", ntypes, ntypes)?;
    Ok(LennardJonesTable {
        ntypes,
        parm_index: required_ints(table, "NONBONDED_PARM_INDEX", square)?.to_vec(),
        acoef: required_reals(table, "LENNARD_JONES_ACOEF", pairs)?,
        bcoef: required_reals(table, "LENNARD_JONES_BCOEF", pairs)?,
        ccoef: optional_reals(table, "LENNARD_JONES_CCOEF", pairs)?,
        acoef_14: optional_reals(table, "LENNARD_JONES_14_ACOEF", pairs)?,
        bcoef_14: optional_reals(table, "LENNARD_JONES_14_BCOEF", pairs)?,
    })
}

fn read_exclusions(table: &SectionTable, p: &Pointers) -> Result<Vec<Vec<usize>>, PrmtopError> {
    let counts = required_ints(table, "NUMBER_EXCLUDED_ATOMS", p.natom)?;
    let list = required_ints(table, "EXCLUDED_ATOMS_LIST", p.nnb)?;

    let counts = counts
        .iter()
        .map(|&c| count("NUMBER_EXCLUDED_ATOMS", c))
        .collect::<Result<Vec<_>, _>>()?;
    let total = counts
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(n))
        .ok_or_else(|| malformed("NUMBER_EXCLUDED_ATOMS", "counts overflow"))?;
    if total != list.len() {
        return Err(malformed(
            "NUMBER_EXCLUDED_ATOMS",
            format!(
                "counts sum to {total} but EXCLUDED_ATOMS_LIST has {}",
                list.len()
            ),
        ));
    }

    let mut offset = 0;
    let mut exclusions = Vec::with_capacity(p.natom);
    for n in counts {
        let mut partners = Vec::with_capacity(n);
        for &raw in &list[offset..offset + n] {
            if raw == 0 {
                continue;
            }
            partners.push(one_based_atom("EXCLUDED_ATOMS_LIST", raw, p.natom)?);
        }
        offset += n;
        exclusions.push(partners);
    }
    Ok(exclusions)
}

/// Reads a two-value-or-more count header such as `CHARMM_UREY_BRADLEY_COUNT`.
fn header_counts(table: &SectionTable, flag: &str) -> Result<Option<Vec<usize>>, PrmtopError> {
    match table.integers(flag)? {
        Some(values) if values.is_empty() => Err(malformed(flag, "empty count section")),
        Some(values) => values
            .iter()
            .map(|&v| count(flag, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        None => Ok(None),
    }
}

fn read_urey_bradley(
    table: &SectionTable,
    natom: usize,
    chamber: &mut ChamberRecords,
) -> Result<(), PrmtopError> {
    let Some(counts) = header_counts(table, "CHARMM_UREY_BRADLEY_COUNT")? else {
        return Ok(());
    };
    let n_terms = counts[0];
    let n_types = match counts.get(1) {
        Some(&n) => n,
        None => table
            .reals("CHARMM_UREY_BRADLEY_FORCE_CONSTANT")?
            .map_or(0, |v| v.len()),
    };

    const TERMS: &str = "CHARMM_UREY_BRADLEY";
    chamber.urey_bradleys = required_ints(table, TERMS, section_len(TERMS, n_terms, 3)?)?
        .chunks_exact(3)
        .map(|c| {
            Ok(UreyBradleyRecord {
                atoms: [
                    one_based_atom(TERMS, c[0], natom)?,
                    one_based_atom(TERMS, c[1], natom)?,
                ],
                type_index: one_based_type(TERMS, c[2])?,
            })
        })
        .collect::<Result<_, PrmtopError>>()?;

    let k = required_reals(table, "CHARMM_UREY_BRADLEY_FORCE_CONSTANT", n_types)?;
    let eq = required_reals(table, "CHARMM_UREY_BRADLEY_EQUIL_VALUE", n_types)?;
    chamber.urey_bradley_types = k
        .into_iter()
        .zip(eq)
        .map(|(force_constant, equilibrium)| UreyBradleyType {
            force_constant,
            equilibrium,
        })
        .collect();
    Ok(())
}

fn read_impropers(
    table: &SectionTable,
    natom: usize,
    chamber: &mut ChamberRecords,
) -> Result<(), PrmtopError> {
    let Some(counts) = header_counts(table, "CHARMM_NUM_IMPROPERS")? else {
        return Ok(());
    };
    let n_terms = counts[0];
    let n_types = match header_counts(table, "CHARMM_NUM_IMPR_TYPES")? {
        Some(types) => types[0],
        None => table
            .reals("CHARMM_IMPROPER_FORCE_CONSTANT")?
            .map_or(0, |v| v.len()),
    };

    const TERMS: &str = "CHARMM_IMPROPERS";
    chamber.impropers = required_ints(table, TERMS, section_len(TERMS, n_terms, 5)?)?
        .chunks_exact(5)
        .map(|c| {
            Ok(ImproperRecord {
                atoms: [
                    one_based_atom(TERMS, c[0], natom)?,
                    one_based_atom(TERMS, c[1], natom)?,
                    one_based_atom(TERMS, c[2], natom)?,
                    one_based_atom(TERMS, c[3], natom)?,
                ],
                type_index: one_based_type(TERMS, c[4])?,
            })
        })
        .collect::<Result<_, PrmtopError>>()?;

    let k = required_reals(table, "CHARMM_IMPROPER_FORCE_CONSTANT", n_types)?;
    let phase = required_reals(table, "CHARMM_IMPROPER_PHASE", n_types)?;
    chamber.improper_types = k
        .into_iter()
        .zip(phase)
        .map(|(force_constant, phase)| ImproperType {
            force_constant,
            phase,
        })
        .collect();
    Ok(())
}

fn read_cmap(
    table: &SectionTable,
    natom: usize,
    chamber: &mut ChamberRecords,
) -> Result<(), PrmtopError> {
    let prefix = if table.contains("CHARMM_CMAP_COUNT") {
        "CHARMM_CMAP_"
    } else if table.contains("CMAP_COUNT") {
        "CMAP_"
    } else {
        return Ok(());
    };
    let count_flag = format!("{prefix}COUNT");
    let counts = header_counts(table, &count_flag)?.unwrap_or_default();
    let (n_terms, n_types) = match counts.as_slice() {
        [terms, types, ..] => (*terms, *types),
        _ => return Err(malformed(&count_flag, "expected term and grid counts")),
    };

    let resolution_flag = format!("{prefix}RESOLUTION");
    let resolutions = required_ints(table, &resolution_flag, n_types)?;
    for (index, &raw) in resolutions.iter().enumerate() {
        let resolution = count(&resolution_flag, raw)?;
        let grid_flag = format!("{prefix}PARAMETER_{:02}", index + 1);
        let len = section_len(&resolution_flag, resolution, resolution)?;
        let values = required_reals(table, &grid_flag, len)?;
        chamber.cmap_grids.push(CmapGrid { resolution, values });
    }

    let index_flag = format!("{prefix}INDEX");
    chamber.cmaps = required_ints(table, &index_flag, section_len(&index_flag, n_terms, 6)?)?
        .chunks_exact(6)
        .map(|c| {
            let mut atoms = [0usize; 5];
            for (slot, &raw) in atoms.iter_mut().zip(&c[..5]) {
                *slot = one_based_atom(&index_flag, raw, natom)?;
            }
            Ok(CmapRecord {
                atoms,
                type_index: one_based_type(&index_flag, c[5])?,
            })
        })
        .collect::<Result<_, PrmtopError>>()?;
    Ok(())
}

fn read_chamber(
    table: &SectionTable,
    natom: usize,
    is_chamber: bool,
) -> Result<Option<ChamberRecords>, PrmtopError> {
    let mut chamber = ChamberRecords::default();
    read_urey_bradley(table, natom, &mut chamber)?;
    read_impropers(table, natom, &mut chamber)?;
    read_cmap(table, natom, &mut chamber)?;

    let any = !chamber.urey_bradleys.is_empty()
        || !chamber.impropers.is_empty()
        || !chamber.cmaps.is_empty();
    Ok((is_chamber || any).then_some(chamber))
}

fn read_box(table: &SectionTable, p: &Pointers) -> Result<Option<BoxInfo>, PrmtopError> {
    if p.ifbox == 0 {
        return Ok(None);
    }
    const FLAG: &str = "BOX_DIMENSIONS";
    let values = table
        .reals(FLAG)?
        .ok_or_else(|| malformed(FLAG, "IFBOX is set but the section is missing"))?;
    if values.len() < 4 {
        return Err(malformed(
            FLAG,
            format!("expected 4 values, found {}", values.len()),
        ));
    }
    Ok(Some(BoxInfo {
        ifbox: p.ifbox,
        beta: values[0],
        lengths: [values[1], values[2], values[3]],
    }))
}

fn joined_text(table: &SectionTable, flag: &str) -> Result<Option<String>, PrmtopError> {
    Ok(table.texts(flag)?.map(|parts| parts.join(" ").trim().to_string()))
}

/// Interprets the raw sections into a validated [`TopologyRecord`].
pub fn build_record(table: &SectionTable) -> Result<TopologyRecord, PrmtopError> {
    let pointers = read_pointers(table)?;
    let natom = pointers.natom;
    let is_chamber = table.contains("CTITLE");

    let mut atoms = read_atoms(table, &pointers)?;
    let residues = read_residues(table, &pointers, &mut atoms)?;

    let mut bonds = read_bonds(table, "BONDS_INC_HYDROGEN", pointers.nbonh, natom, true)?;
    bonds.extend(read_bonds(
        table,
        "BONDS_WITHOUT_HYDROGEN",
        pointers.mbona,
        natom,
        false,
    )?);
    let mut angles = read_angles(table, "ANGLES_INC_HYDROGEN", pointers.ntheth, natom, true)?;
    angles.extend(read_angles(
        table,
        "ANGLES_WITHOUT_HYDROGEN",
        pointers.mtheta,
        natom,
        false,
    )?);
    let mut dihedrals = read_dihedrals(
        table,
        "DIHEDRALS_INC_HYDROGEN",
        pointers.nphih,
        natom,
        true,
    )?;
    dihedrals.extend(read_dihedrals(
        table,
        "DIHEDRALS_WITHOUT_HYDROGEN",
        pointers.mphia,
        natom,
        false,
    )?);

    let (bond_types, angle_types, dihedral_types) = read_parameter_types(table, &pointers)?;
    let lennard_jones = read_lennard_jones(table, &pointers)?;
    let exclusions = read_exclusions(table, &pointers)?;
    let chamber = read_chamber(table, natom, is_chamber)?;
    let periodic_box = read_box(table, &pointers)?;

    let title = if is_chamber {
        joined_text(table, "CTITLE")?
    } else {
        joined_text(table, "TITLE")?
    }
    .unwrap_or_default();

    debug!(
        atoms = atoms.len(),
        bonds = bonds.len(),
        angles = angles.len(),
        dihedrals = dihedrals.len(),
        chamber = is_chamber,
        "Parsed topology record"
    );

    Ok(TopologyRecord {
        title,
        version: table.version().unwrap_or(SUPPORTED_VERSION).to_string(),
        is_chamber,
        pointers,
        atoms,
        residues,
        bonds,
        angles,
        dihedrals,
        bond_types,
        angle_types,
        dihedral_types,
        lennard_jones,
        exclusions,
        chamber,
        periodic_box,
        radius_set: joined_text(table, "RADIUS_SET")?,
    })
}

/// Reader for AMBER parameter-topology files (prmtop / parm7, including Chamber).
pub struct PrmtopFile;

impl AmberFile for PrmtopFile {
    type Record = TopologyRecord;
    type Error = PrmtopError;

    fn read_from(reader: &mut impl BufRead) -> Result<TopologyRecord, PrmtopError> {
        let table = SectionTable::parse(reader)?;
        build_record(&table)
    }
}
