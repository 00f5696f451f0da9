use crate::cli::InspectArgs;
use crate::error::{CliError, Result};
use parmforge::core::forcefield::params::ParameterTableResolver;
use parmforge::core::io::prmtop::PrmtopFile;
use parmforge::core::io::traits::AmberFile;
use parmforge::core::models::record::TopologyRecord;
use parmforge::engine::error::BuildError;
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

/// Counts and flags describing one parameter-topology file.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologySummary {
    pub title: String,
    pub version: String,
    pub chamber: bool,
    pub atoms: usize,
    pub residues: usize,
    pub bonds_with_hydrogen: usize,
    pub bonds_without_hydrogen: usize,
    pub angles: usize,
    pub dihedrals: usize,
    pub impropers_in_dihedrals: usize,
    pub atom_types: usize,
    pub lennard_jones_types: usize,
    pub nbfix_pairs: usize,
    pub has_c4: bool,
    pub urey_bradleys: usize,
    pub charmm_impropers: usize,
    pub cmap_grids: usize,
    pub cmap_terms: usize,
    pub extra_points: bool,
    /// Lengths in Å and angle β in degrees.
    pub periodic_box: Option<([f64; 3], f64)>,
    pub radius_set: Option<String>,
}

impl TopologySummary {
    pub fn from_record(record: &TopologyRecord) -> std::result::Result<Self, BuildError> {
        let resolved = ParameterTableResolver::new(record).resolve()?;
        let bonds_with_hydrogen = record.bonds.iter().filter(|b| b.with_hydrogen).count();
        let chamber = record.chamber.as_ref();
        Ok(Self {
            title: record.title.clone(),
            version: record.version.clone(),
            chamber: record.is_chamber,
            atoms: record.atom_count(),
            residues: record.residues.len(),
            bonds_with_hydrogen,
            bonds_without_hydrogen: record.bonds.len() - bonds_with_hydrogen,
            angles: record.angles.len(),
            dihedrals: record.dihedrals.len(),
            impropers_in_dihedrals: record.dihedrals.iter().filter(|d| d.improper).count(),
            atom_types: record
                .atoms
                .iter()
                .map(|a| a.type_name.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            lennard_jones_types: record.lennard_jones.ntypes,
            nbfix_pairs: resolved.nbfix_pairs.len(),
            has_c4: resolved.has_c4,
            urey_bradleys: chamber.map_or(0, |c| c.urey_bradleys.len()),
            charmm_impropers: chamber.map_or(0, |c| c.impropers.len()),
            cmap_grids: chamber.map_or(0, |c| c.cmap_grids.len()),
            cmap_terms: chamber.map_or(0, |c| c.cmaps.len()),
            extra_points: record.has_extra_points(),
            periodic_box: record.periodic_box.map(|b| (b.lengths, b.beta)),
            radius_set: record.radius_set.clone(),
        })
    }
}

impl fmt::Display for TopologySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title:            {}", self.title)?;
        writeln!(f, "Version:          {}", self.version)?;
        writeln!(
            f,
            "Flavor:           {}",
            if self.chamber { "chamber (CHARMM)" } else { "amber" }
        )?;
        writeln!(f, "Atoms:            {}", self.atoms)?;
        writeln!(f, "Residues:         {}", self.residues)?;
        writeln!(
            f,
            "Bonds:            {} ({} with hydrogen)",
            self.bonds_with_hydrogen + self.bonds_without_hydrogen,
            self.bonds_with_hydrogen
        )?;
        writeln!(f, "Angles:           {}", self.angles)?;
        writeln!(
            f,
            "Dihedrals:        {} ({} improper)",
            self.dihedrals, self.impropers_in_dihedrals
        )?;
        writeln!(f, "Atom types:       {}", self.atom_types)?;
        writeln!(
            f,
            "LJ types:         {} ({} NBFIX pairs{})",
            self.lennard_jones_types,
            self.nbfix_pairs,
            if self.has_c4 { ", 12-6-4" } else { "" }
        )?;
        if self.chamber {
            writeln!(f, "Urey-Bradley:     {}", self.urey_bradleys)?;
            writeln!(f, "Impropers:        {}", self.charmm_impropers)?;
            writeln!(
                f,
                "CMAP:             {} terms, {} grids",
                self.cmap_terms, self.cmap_grids
            )?;
        }
        writeln!(f, "Extra points:     {}", if self.extra_points { "yes" } else { "no" })?;
        match self.periodic_box {
            Some((lengths, beta)) => writeln!(
                f,
                "Box:              {:.4} x {:.4} x {:.4} Å, β = {:.4}°",
                lengths[0], lengths[1], lengths[2], beta
            )?,
            None => writeln!(f, "Box:              none")?,
        }
        write!(
            f,
            "Radius set:       {}",
            self.radius_set.as_deref().unwrap_or("none")
        )
    }
}

pub fn run(args: InspectArgs) -> Result<TopologySummary> {
    info!("Inspecting {:?}", args.prmtop);
    let input_error = |source: BuildError| CliError::Input {
        path: args.prmtop.clone(),
        source,
    };
    let record = PrmtopFile::read_from_path(&args.prmtop).map_err(|e| input_error(e.into()))?;
    let summary = TopologySummary::from_record(&record).map_err(input_error)?;
    println!("{summary}");
    Ok(summary)
}
