//! Generalized Born implicit-solvent terms.
//!
//! Each GB model is a [`GbStrategy`]: it receives the atoms one at a time
//! through [`GbStrategy::register_particle`], applying its own radius/screen
//! overrides and bounds, and [`GbStrategy::finish`] turns the collected
//! particles into a [`GeneralizedBornTerm`]. [`ImplicitSolventBuilder`] drives
//! a strategy over a whole topology.

mod models;
pub mod tables;

pub use models::{Gbn2Strategy, GbnStrategy, HctStrategy, Obc1Strategy, Obc2Strategy};

use super::error::InvalidParameterError;
use super::nonbonded::CutoffTreatment;
use crate::core::models::element::Element;
use crate::core::models::record::TopologyRecord;
use crate::core::models::topology::Topology;
use crate::core::units::ANGSTROM_TO_NM;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Nonpolar (ACE) surface-area energy, kJ/mol/nm².
pub const ACE_SURFACE_AREA_ENERGY: f64 = 2.25936;
/// Solvent probe radius for the surface-area term, nm.
pub const PROBE_RADIUS: f64 = 0.14;
pub const DEFAULT_TEMPERATURE: f64 = 298.15;
pub const DEFAULT_SOLVENT_DIELECTRIC: f64 = 78.5;
pub const DEFAULT_SOLUTE_DIELECTRIC: f64 = 1.0;

/// Debye–Hückel screening: κ = KAPPA_FACTOR · sqrt(c / (ε_solvent · T)) nm⁻¹.
const KAPPA_FACTOR: f64 = 50.33355 * 7.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GbModel {
    Hct,
    Obc1,
    Obc2,
    Gbn,
    Gbn2,
}

impl GbModel {
    pub fn formulation(&self) -> GbFormulation {
        match self {
            GbModel::Hct | GbModel::Obc1 | GbModel::Gbn => GbFormulation::Pairwise,
            GbModel::Obc2 | GbModel::Gbn2 => GbFormulation::ClosedForm,
        }
    }

    pub fn strategy(&self) -> Box<dyn GbStrategy> {
        match self {
            GbModel::Hct => Box::new(HctStrategy::default()),
            GbModel::Obc1 => Box::new(Obc1Strategy::default()),
            GbModel::Obc2 => Box::new(Obc2Strategy::default()),
            GbModel::Gbn => Box::new(GbnStrategy::default()),
            GbModel::Gbn2 => Box::new(Gbn2Strategy::default()),
        }
    }
}

impl FromStr for GbModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hct" => Ok(GbModel::Hct),
            "obc1" => Ok(GbModel::Obc1),
            "obc2" => Ok(GbModel::Obc2),
            "gbn" => Ok(GbModel::Gbn),
            "gbn2" => Ok(GbModel::Gbn2),
            _ => Err(format!(
                "unknown implicit solvent model '{s}' (expected HCT, OBC1, OBC2, GBn or GBn2)"
            )),
        }
    }
}

impl fmt::Display for GbModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GbModel::Hct => "HCT",
            GbModel::Obc1 => "OBC1",
            GbModel::Obc2 => "OBC2",
            GbModel::Gbn => "GBn",
            GbModel::Gbn2 => "GBn2",
        })
    }
}

/// How the Born radii are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GbFormulation {
    /// Descreening sums over atom pairs feed a tabulated radius expression.
    Pairwise,
    /// The effective radius follows a closed-form rescaling (tanh) of the sum.
    ClosedForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceAreaModel {
    #[default]
    Ace,
    None,
}

impl SurfaceAreaModel {
    pub fn energy(&self) -> f64 {
        match self {
            SurfaceAreaModel::Ace => ACE_SURFACE_AREA_ENERGY,
            SurfaceAreaModel::None => 0.0,
        }
    }
}

impl FromStr for SurfaceAreaModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ace" => Ok(SurfaceAreaModel::Ace),
            "none" => Ok(SurfaceAreaModel::None),
            _ => Err(format!("unknown surface area model '{s}' (expected ace or none)")),
        }
    }
}

/// One atom as seen by a GB strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbAtom<'a> {
    pub charge: f64,
    /// Intrinsic radius, nm.
    pub radius: f64,
    pub screen: f64,
    pub element: Option<Element>,
    pub residue_name: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GbParticle {
    pub charge: f64,
    pub radius: f64,
    pub screen: f64,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
}

impl GbParticle {
    pub fn new(charge: f64, radius: f64, screen: f64) -> Self {
        Self {
            charge,
            radius,
            screen,
            alpha: None,
            beta: None,
            gamma: None,
        }
    }
}

/// Model-independent settings shared by every GB term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbEnvironment {
    pub solute_dielectric: f64,
    pub solvent_dielectric: f64,
    pub kappa: f64,
    pub surface_area: SurfaceAreaModel,
    pub cutoff_treatment: CutoffTreatment,
    pub cutoff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralizedBornTerm {
    pub model: GbModel,
    pub formulation: GbFormulation,
    pub method: CutoffTreatment,
    pub cutoff: f64,
    pub solute_dielectric: f64,
    pub solvent_dielectric: f64,
    /// Debye–Hückel screening parameter, nm⁻¹.
    pub kappa: f64,
    /// kJ/mol/nm²; zero when the surface-area term is disabled.
    pub surface_area_energy: f64,
    pub probe_radius: f64,
    /// Radius offset, nm.
    pub offset: f64,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub neck_scale: Option<f64>,
    pub neck_cutoff: Option<f64>,
    pub particles: Vec<GbParticle>,
}

/// Contract implemented by every GB model.
pub trait GbStrategy {
    fn model(&self) -> GbModel;

    fn formulation(&self) -> GbFormulation {
        self.model().formulation()
    }

    /// Applies the model's parameter overrides and bounds to one atom and
    /// records it.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameterError`] when the (overridden) radius or screen
    /// falls outside the range the model supports.
    fn register_particle(&mut self, atom: &GbAtom) -> Result<(), InvalidParameterError>;

    /// Consumes the registered particles into the final term.
    fn finish(&mut self, environment: &GbEnvironment) -> GeneralizedBornTerm;

    fn surface_area_energy(&self, model: SurfaceAreaModel) -> f64 {
        model.energy()
    }
}

/// Settings for [`ImplicitSolventBuilder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImplicitSolventSettings {
    pub model: GbModel,
    pub solute_dielectric: f64,
    pub solvent_dielectric: f64,
    /// Molar.
    pub salt_concentration: f64,
    pub kappa: Option<f64>,
    /// Kelvin.
    pub temperature: f64,
    pub surface_area: SurfaceAreaModel,
    pub cutoff_treatment: CutoffTreatment,
    pub cutoff: f64,
}

impl ImplicitSolventSettings {
    pub fn new(model: GbModel) -> Self {
        Self {
            model,
            solute_dielectric: DEFAULT_SOLUTE_DIELECTRIC,
            solvent_dielectric: DEFAULT_SOLVENT_DIELECTRIC,
            salt_concentration: 0.0,
            kappa: None,
            temperature: DEFAULT_TEMPERATURE,
            surface_area: SurfaceAreaModel::Ace,
            cutoff_treatment: CutoffTreatment::NoCutoff,
            cutoff: super::nonbonded::DEFAULT_CUTOFF,
        }
    }

    /// The explicit κ when given, otherwise the Debye–Hückel value for the
    /// salt concentration (zero without salt).
    pub fn kappa(&self) -> f64 {
        match self.kappa {
            Some(kappa) => kappa,
            None if self.salt_concentration > 0.0 => {
                KAPPA_FACTOR
                    * (self.salt_concentration / self.solvent_dielectric / self.temperature).sqrt()
            }
            None => 0.0,
        }
    }
}

pub struct ImplicitSolventBuilder {
    settings: ImplicitSolventSettings,
}

impl ImplicitSolventBuilder {
    pub fn new(settings: ImplicitSolventSettings) -> Self {
        Self { settings }
    }

    /// Builds the GB term for every atom of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameterError`] if the topology carries no `RADII` or
    /// `SCREEN` data, or a particle violates the model's bounds.
    pub fn build(
        &self,
        record: &TopologyRecord,
        topology: &Topology,
    ) -> Result<GeneralizedBornTerm, InvalidParameterError> {
        let mut strategy = self.settings.model.strategy();
        for (index, atom) in record.atoms.iter().enumerate() {
            let (Some(radius), Some(screen)) = (atom.gb_radius, atom.gb_screen) else {
                return Err(InvalidParameterError::new(
                    "implicit_solvent",
                    "topology has no RADII/SCREEN sections",
                ));
            };
            strategy.register_particle(&GbAtom {
                charge: atom.charge,
                radius: radius * ANGSTROM_TO_NM,
                screen,
                element: topology.element(index),
                residue_name: record.residue_label_of(index).unwrap_or(""),
            })?;
        }

        let environment = GbEnvironment {
            solute_dielectric: self.settings.solute_dielectric,
            solvent_dielectric: self.settings.solvent_dielectric,
            kappa: self.settings.kappa(),
            surface_area: self.settings.surface_area,
            cutoff_treatment: self.settings.cutoff_treatment,
            cutoff: self.settings.cutoff,
        };
        let term = strategy.finish(&environment);
        debug!(
            model = %term.model,
            particles = term.particles.len(),
            kappa = term.kappa,
            "Built generalized Born term"
        );
        Ok(term)
    }
}
