use crate::core::forcefield::constraints::ConstraintPolicy;
use crate::core::forcefield::error::InvalidParameterError;
use crate::core::forcefield::implicit::{
    DEFAULT_SOLUTE_DIELECTRIC, DEFAULT_SOLVENT_DIELECTRIC, DEFAULT_TEMPERATURE, GbModel,
    SurfaceAreaModel,
};
use crate::core::forcefield::nonbonded::{
    DEFAULT_CUTOFF, DEFAULT_EWALD_ERROR_TOLERANCE, NonbondedMethod,
};
use crate::core::models::system::BoxVectors;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidValue(#[from] InvalidParameterError),
}

/// Options controlling how a topology is compiled into an interaction system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SystemOptions {
    pub nonbonded_method: NonbondedMethod,
    /// nm.
    pub nonbonded_cutoff: f64,
    /// nm; ignored without a cutoff.
    pub switch_distance: Option<f64>,
    pub ewald_error_tolerance: f64,
    pub constraints: ConstraintPolicy,
    pub rigid_water: bool,
    pub implicit_solvent: Option<GbModel>,
    /// Molar.
    pub implicit_solvent_salt_conc: f64,
    /// nm⁻¹; overrides the value derived from the salt concentration.
    pub implicit_solvent_kappa: Option<f64>,
    /// Kelvin.
    pub temperature: f64,
    pub solute_dielectric: f64,
    pub solvent_dielectric: f64,
    pub gbsa_model: SurfaceAreaModel,
    /// Dalton; enables hydrogen mass repartitioning.
    pub hydrogen_mass: Option<f64>,
    pub remove_cm_motion: bool,
    /// Keep energy terms for constrained bonds and angles.
    pub flexible_constraints: bool,
    pub use_dispersion_correction: bool,
    /// Replaces the box stored in the topology.
    pub box_vectors: Option<BoxVectors>,
}

impl Default for SystemOptions {
    fn default() -> Self {
        Self {
            nonbonded_method: NonbondedMethod::NoCutoff,
            nonbonded_cutoff: DEFAULT_CUTOFF,
            switch_distance: None,
            ewald_error_tolerance: DEFAULT_EWALD_ERROR_TOLERANCE,
            constraints: ConstraintPolicy::None,
            rigid_water: true,
            implicit_solvent: None,
            implicit_solvent_salt_conc: 0.0,
            implicit_solvent_kappa: None,
            temperature: DEFAULT_TEMPERATURE,
            solute_dielectric: DEFAULT_SOLUTE_DIELECTRIC,
            solvent_dielectric: DEFAULT_SOLVENT_DIELECTRIC,
            gbsa_model: SurfaceAreaModel::Ace,
            hydrogen_mass: None,
            remove_cm_motion: true,
            flexible_constraints: false,
            use_dispersion_correction: true,
            box_vectors: None,
        }
    }
}

fn require_positive(parameter: &'static str, value: f64) -> Result<(), InvalidParameterError> {
    if value.is_nan() || value <= 0.0 {
        return Err(InvalidParameterError::new(
            parameter,
            format!("must be positive, got {value}"),
        ));
    }
    Ok(())
}

impl SystemOptions {
    pub fn builder() -> SystemOptionsBuilder {
        SystemOptionsBuilder::new()
    }

    /// Checks the ranges that do not depend on the topology. Cutoff and box
    /// requirements are checked again when the nonbonded terms are assembled.
    pub fn validate(&self) -> Result<(), InvalidParameterError> {
        require_positive("nonbonded_cutoff", self.nonbonded_cutoff)?;
        require_positive("temperature", self.temperature)?;
        require_positive("solute_dielectric", self.solute_dielectric)?;
        require_positive("solvent_dielectric", self.solvent_dielectric)?;
        if let Some(mass) = self.hydrogen_mass {
            require_positive("hydrogen_mass", mass)?;
        }
        let salt = self.implicit_solvent_salt_conc;
        if salt.is_nan() || salt < 0.0 {
            return Err(InvalidParameterError::new(
                "implicit_solvent_salt_conc",
                format!("must not be negative, got {salt}"),
            ));
        }
        if let Some(kappa) = self.implicit_solvent_kappa {
            if kappa.is_nan() || kappa < 0.0 {
                return Err(InvalidParameterError::new(
                    "implicit_solvent_kappa",
                    format!("must not be negative, got {kappa}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SystemOptionsBuilder {
    options: SystemOptions,
}

impl SystemOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nonbonded_method(mut self, method: NonbondedMethod) -> Self {
        self.options.nonbonded_method = method;
        self
    }
    pub fn nonbonded_cutoff(mut self, cutoff: f64) -> Self {
        self.options.nonbonded_cutoff = cutoff;
        self
    }
    pub fn switch_distance(mut self, distance: f64) -> Self {
        self.options.switch_distance = Some(distance);
        self
    }
    pub fn ewald_error_tolerance(mut self, tolerance: f64) -> Self {
        self.options.ewald_error_tolerance = tolerance;
        self
    }
    pub fn constraints(mut self, policy: ConstraintPolicy) -> Self {
        self.options.constraints = policy;
        self
    }
    pub fn rigid_water(mut self, rigid: bool) -> Self {
        self.options.rigid_water = rigid;
        self
    }
    pub fn implicit_solvent(mut self, model: GbModel) -> Self {
        self.options.implicit_solvent = Some(model);
        self
    }
    pub fn implicit_solvent_salt_conc(mut self, molar: f64) -> Self {
        self.options.implicit_solvent_salt_conc = molar;
        self
    }
    pub fn implicit_solvent_kappa(mut self, kappa: f64) -> Self {
        self.options.implicit_solvent_kappa = Some(kappa);
        self
    }
    pub fn temperature(mut self, kelvin: f64) -> Self {
        self.options.temperature = kelvin;
        self
    }
    pub fn solute_dielectric(mut self, dielectric: f64) -> Self {
        self.options.solute_dielectric = dielectric;
        self
    }
    pub fn solvent_dielectric(mut self, dielectric: f64) -> Self {
        self.options.solvent_dielectric = dielectric;
        self
    }
    pub fn gbsa_model(mut self, model: SurfaceAreaModel) -> Self {
        self.options.gbsa_model = model;
        self
    }
    pub fn hydrogen_mass(mut self, mass: f64) -> Self {
        self.options.hydrogen_mass = Some(mass);
        self
    }
    pub fn remove_cm_motion(mut self, remove: bool) -> Self {
        self.options.remove_cm_motion = remove;
        self
    }
    pub fn flexible_constraints(mut self, flexible: bool) -> Self {
        self.options.flexible_constraints = flexible;
        self
    }
    pub fn use_dispersion_correction(mut self, enabled: bool) -> Self {
        self.options.use_dispersion_correction = enabled;
        self
    }
    pub fn box_vectors(mut self, vectors: BoxVectors) -> Self {
        self.options.box_vectors = Some(vectors);
        self
    }

    pub fn build(self) -> Result<SystemOptions, ConfigError> {
        self.options.validate()?;
        Ok(self.options)
    }
}
