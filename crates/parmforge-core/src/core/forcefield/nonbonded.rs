use super::error::InvalidParameterError;
use super::params::{ResolvedParameters, packed_index};
use crate::core::models::record::TopologyRecord;
use crate::core::units::KCAL_TO_KJ;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_CUTOFF: f64 = 1.0;
pub const DEFAULT_EWALD_ERROR_TOLERANCE: f64 = 5e-4;
pub const DEFAULT_REACTION_FIELD_DIELECTRIC: f64 = 78.3;

/// Sigma (nm) given to zeroed exceptions; any positive value is equivalent.
const EXCLUDED_SIGMA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NonbondedMethod {
    #[default]
    #[serde(rename = "no-cutoff")]
    NoCutoff,
    #[serde(rename = "cutoff-non-periodic")]
    CutoffNonPeriodic,
    #[serde(rename = "cutoff-periodic")]
    CutoffPeriodic,
    #[serde(rename = "ewald")]
    Ewald,
    #[serde(rename = "pme")]
    Pme,
    #[serde(rename = "ljpme", alias = "lj-pme")]
    LjPme,
}

impl NonbondedMethod {
    pub fn is_periodic(&self) -> bool {
        matches!(
            self,
            Self::CutoffPeriodic | Self::Ewald | Self::Pme | Self::LjPme
        )
    }

    pub fn uses_cutoff(&self) -> bool {
        *self != Self::NoCutoff
    }

    /// Whether long-range electrostatics are handled by a reciprocal-space sum.
    pub fn is_ewald_family(&self) -> bool {
        matches!(self, Self::Ewald | Self::Pme | Self::LjPme)
    }

    pub fn cutoff_treatment(&self) -> CutoffTreatment {
        match self {
            Self::NoCutoff => CutoffTreatment::NoCutoff,
            Self::CutoffNonPeriodic => CutoffTreatment::CutoffNonPeriodic,
            _ => CutoffTreatment::CutoffPeriodic,
        }
    }
}

impl FromStr for NonbondedMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "nocutoff" => Ok(Self::NoCutoff),
            "cutoffnonperiodic" => Ok(Self::CutoffNonPeriodic),
            "cutoffperiodic" => Ok(Self::CutoffPeriodic),
            "ewald" => Ok(Self::Ewald),
            "pme" => Ok(Self::Pme),
            "ljpme" => Ok(Self::LjPme),
            _ => Err(format!("unknown nonbonded method '{s}'")),
        }
    }
}

impl fmt::Display for NonbondedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoCutoff => "no-cutoff",
            Self::CutoffNonPeriodic => "cutoff-non-periodic",
            Self::CutoffPeriodic => "cutoff-periodic",
            Self::Ewald => "ewald",
            Self::Pme => "pme",
            Self::LjPme => "ljpme",
        })
    }
}

/// Cutoff handling for terms without a reciprocal-space part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CutoffTreatment {
    NoCutoff,
    CutoffNonPeriodic,
    CutoffPeriodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NonbondedParticle {
    pub charge: f64,
    pub sigma: f64,
    pub epsilon: f64,
}

/// A pair whose interaction replaces the default one: scaled for 1-4 pairs,
/// zero for every other excluded pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NonbondedException {
    pub atoms: [usize; 2],
    pub charge_product: f64,
    pub sigma: f64,
    pub epsilon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonbondedTerm {
    pub method: NonbondedMethod,
    /// nm
    pub cutoff: f64,
    pub switching_distance: Option<f64>,
    pub ewald_error_tolerance: f64,
    pub reaction_field_dielectric: f64,
    pub use_dispersion_correction: bool,
    pub particles: Vec<NonbondedParticle>,
    pub exceptions: Vec<NonbondedException>,
}

impl NonbondedTerm {
    pub fn set_use_dispersion_correction(&mut self, enabled: bool) {
        self.use_dispersion_correction = enabled;
    }
}

/// Tabulated Lennard-Jones (and 12-6-4) interactions for systems whose pair
/// coefficients cannot be expressed by per-particle parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomNonbondedTerm {
    pub energy_expression: String,
    pub method: CutoffTreatment,
    pub cutoff: f64,
    pub switching_distance: Option<f64>,
    pub use_long_range_correction: bool,
    pub num_types: usize,
    /// 0-based LJ type of every particle.
    pub particle_types: Vec<usize>,
    /// `sqrt(A)` per type pair, `num_types × num_types`, kJ^½·nm⁶/mol^½.
    pub acoef: Vec<f64>,
    /// `B` per type pair, kJ·nm⁶/mol.
    pub bcoef: Vec<f64>,
    /// `C` per type pair, kJ·nm⁴/mol.
    pub ccoef: Option<Vec<f64>>,
    /// Type pairs (`i <= j`) whose coefficients break the combining rule.
    pub overridden_pairs: Vec<[usize; 2]>,
    pub exclusions: Vec<[usize; 2]>,
}

impl CustomNonbondedTerm {
    pub fn set_use_long_range_correction(&mut self, enabled: bool) {
        self.use_long_range_correction = enabled;
    }

    pub fn coefficient_index(&self, type_i: usize, type_j: usize) -> usize {
        type_i + self.num_types * type_j
    }
}

pub const LJ_EXPRESSION: &str =
    "(a/r6)^2-b/r6; r6=r^6; a=acoef(type1, type2); b=bcoef(type1, type2)";
pub const LJ_1264_EXPRESSION: &str = "(a/r6)^2-b/r6-c/r^4; r6=r^6; a=acoef(type1, type2); b=bcoef(type1, type2); c=ccoef(type1, type2)";

/// Settings for the nonbonded terms after option validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonbondedSettings {
    pub method: NonbondedMethod,
    pub cutoff: f64,
    pub switch_distance: Option<f64>,
    pub ewald_error_tolerance: f64,
    pub use_dispersion_correction: bool,
    /// Solute dielectric when an implicit-solvent model is active.
    pub implicit_solute_dielectric: Option<f64>,
}

impl Default for NonbondedSettings {
    fn default() -> Self {
        Self {
            method: NonbondedMethod::NoCutoff,
            cutoff: DEFAULT_CUTOFF,
            switch_distance: None,
            ewald_error_tolerance: DEFAULT_EWALD_ERROR_TOLERANCE,
            use_dispersion_correction: true,
            implicit_solute_dielectric: None,
        }
    }
}

impl NonbondedSettings {
    /// Checks cutoff, switching distance and Ewald tolerance ranges, and that
    /// periodic methods have a box to work with.
    pub fn validate(&self, periodic_box: bool) -> Result<(), InvalidParameterError> {
        if self.cutoff.is_nan() || self.cutoff <= 0.0 {
            return Err(InvalidParameterError::new(
                "nonbonded_cutoff",
                format!("must be positive, got {}", self.cutoff),
            ));
        }
        if let Some(s) = self.switching_distance() {
            if !(0.0..self.cutoff).contains(&s) {
                return Err(InvalidParameterError::new(
                    "switch_distance",
                    format!("must satisfy 0 <= s < cutoff ({}), got {s}", self.cutoff),
                ));
            }
        }
        let tolerance = self.ewald_error_tolerance;
        if tolerance.is_nan() || tolerance <= 0.0 || tolerance >= 1.0 {
            return Err(InvalidParameterError::new(
                "ewald_error_tolerance",
                format!("must lie in (0, 1), got {}", self.ewald_error_tolerance),
            ));
        }
        if self.method.is_periodic() && !periodic_box {
            return Err(InvalidParameterError::new(
                "nonbonded_method",
                format!("{} requires a periodic box", self.method),
            ));
        }
        Ok(())
    }

    fn switching_distance(&self) -> Option<f64> {
        self.switch_distance.filter(|_| self.method.uses_cutoff())
    }

    fn long_range_correction(&self) -> bool {
        self.use_dispersion_correction && self.method.uses_cutoff()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonbondedOutput {
    pub nonbonded: NonbondedTerm,
    pub custom: Option<CustomNonbondedTerm>,
}

pub struct NonbondedAssembler<'a> {
    record: &'a TopologyRecord,
    resolved: &'a ResolvedParameters,
    settings: NonbondedSettings,
}

impl<'a> NonbondedAssembler<'a> {
    pub fn new(
        record: &'a TopologyRecord,
        resolved: &'a ResolvedParameters,
        settings: NonbondedSettings,
    ) -> Self {
        Self {
            record,
            resolved,
            settings,
        }
    }

    /// Every excluded pair, sorted with `i < j`: file exclusion lists, 1-2
    /// bonds, 1-3 angle ends and 1-4 pairs.
    pub fn excluded_pairs(&self) -> Vec<[usize; 2]> {
        let record = self.record;
        let from_lists = record
            .exclusions
            .iter()
            .enumerate()
            .flat_map(|(i, partners)| partners.iter().map(move |&j| (i, j)));
        let from_bonds = record.bonds.iter().map(|b| (b.atoms[0], b.atoms[1]));
        let from_angles = record.angles.iter().map(|a| (a.atoms[0], a.atoms[2]));
        let from_14 = self.resolved.pairs_14.iter().map(|p| (p.atoms[0], p.atoms[1]));

        from_lists
            .chain(from_bonds)
            .chain(from_angles)
            .chain(from_14)
            .filter(|(i, j)| i != j)
            .map(|(i, j)| if i < j { [i, j] } else { [j, i] })
            .sorted()
            .dedup()
            .collect()
    }

    /// Builds the primary nonbonded term and, when NBFIX or 12-6-4
    /// coefficients are present, the tabulated custom term.
    pub fn assemble(
        &self,
        charges: &[f64],
        periodic_box: bool,
    ) -> Result<NonbondedOutput, InvalidParameterError> {
        let settings = &self.settings;
        settings.validate(periodic_box)?;

        let (charge_scale, product_scale, reaction_field_dielectric) =
            match settings.implicit_solute_dielectric {
                Some(solute) => (1.0 / solute.sqrt(), 1.0 / solute, 1.0),
                None => (1.0, 1.0, DEFAULT_REACTION_FIELD_DIELECTRIC),
            };
        let custom_lj = self.resolved.needs_custom_nonbonded();

        let particles = charges
            .iter()
            .zip(&self.resolved.lj)
            .map(|(&q, lj)| NonbondedParticle {
                charge: q * charge_scale,
                sigma: lj.sigma,
                epsilon: if custom_lj { 0.0 } else { lj.epsilon },
            })
            .collect();

        let mut exceptions = Vec::new();
        let mut seen = HashSet::new();
        for pair in &self.resolved.pairs_14 {
            let [i, j] = pair.atoms;
            seen.insert(if i < j { [i, j] } else { [j, i] });
            exceptions.push(NonbondedException {
                atoms: pair.atoms,
                charge_product: charges[i] * charges[j] * pair.charge_scale * product_scale,
                sigma: pair.sigma,
                epsilon: pair.epsilon,
            });
        }
        for pair in self.excluded_pairs() {
            if seen.contains(&pair) {
                continue;
            }
            exceptions.push(NonbondedException {
                atoms: pair,
                charge_product: 0.0,
                sigma: EXCLUDED_SIGMA,
                epsilon: 0.0,
            });
        }

        let custom = custom_lj.then(|| self.custom_term(&exceptions));
        let nonbonded = NonbondedTerm {
            method: settings.method,
            cutoff: settings.cutoff,
            switching_distance: settings.switching_distance(),
            ewald_error_tolerance: settings.ewald_error_tolerance,
            reaction_field_dielectric,
            use_dispersion_correction: settings.long_range_correction(),
            particles,
            exceptions,
        };

        debug!(
            particles = nonbonded.particles.len(),
            exceptions = nonbonded.exceptions.len(),
            custom = custom.is_some(),
            "Assembled nonbonded terms"
        );
        Ok(NonbondedOutput { nonbonded, custom })
    }

    fn custom_term(&self, exceptions: &[NonbondedException]) -> CustomNonbondedTerm {
        let table = &self.record.lennard_jones;
        let n = table.ntypes;
        let mut acoef = vec![0.0; n * n];
        let mut bcoef = vec![0.0; n * n];
        let mut ccoef = self.resolved.has_c4.then(|| vec![0.0; n * n]);
        let mut c4_pairs = Vec::new();

        for i in 0..n {
            for j in 0..n {
                let Ok(k) = packed_index(table, i, j) else {
                    continue;
                };
                let at = i + n * j;
                acoef[at] = (table.acoef[k] * KCAL_TO_KJ).sqrt() * 1e-6;
                bcoef[at] = table.bcoef[k] * KCAL_TO_KJ * 1e-6;
                if let (Some(out), Some(c)) = (ccoef.as_mut(), table.ccoef.as_ref()) {
                    let value = c.get(k).copied().unwrap_or(0.0);
                    out[at] = value * KCAL_TO_KJ * 1e-4;
                    if value != 0.0 && i <= j {
                        c4_pairs.push([i, j]);
                    }
                }
            }
        }

        let expression = if ccoef.is_some() {
            LJ_1264_EXPRESSION
        } else {
            LJ_EXPRESSION
        };
        CustomNonbondedTerm {
            energy_expression: expression.to_string(),
            method: self.settings.method.cutoff_treatment(),
            cutoff: self.settings.cutoff,
            switching_distance: self.settings.switching_distance(),
            use_long_range_correction: self.settings.long_range_correction(),
            num_types: n,
            particle_types: self.record.atoms.iter().map(|a| a.lj_type).collect(),
            acoef,
            bcoef,
            ccoef,
            overridden_pairs: self
                .resolved
                .nbfix_pairs
                .iter()
                .copied()
                .chain(c4_pairs)
                .sorted()
                .dedup()
                .collect(),
            exclusions: exceptions.iter().map(|e| e.atoms).collect(),
        }
    }
}
