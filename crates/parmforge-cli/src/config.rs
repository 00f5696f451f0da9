use crate::cli::{BuildArgs, RigidWater};
use crate::error::{CliError, Result};
use parmforge::core::forcefield::constraints::ConstraintPolicy;
use parmforge::core::forcefield::implicit::{GbModel, SurfaceAreaModel};
use parmforge::core::forcefield::nonbonded::NonbondedMethod;
use parmforge::core::models::system::BoxVectors;
use parmforge::engine::config::{SystemOptions, SystemOptionsBuilder};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialNonbondedConfig {
    method: Option<NonbondedMethod>,
    cutoff: Option<f64>,
    switch_distance: Option<f64>,
    ewald_error_tolerance: Option<f64>,
    use_dispersion_correction: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialConstraintsConfig {
    policy: Option<ConstraintPolicy>,
    rigid_water: Option<bool>,
    flexible: Option<bool>,
    hydrogen_mass: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialImplicitSolventConfig {
    model: Option<GbModel>,
    salt_conc: Option<f64>,
    kappa: Option<f64>,
    temperature: Option<f64>,
    solute_dielectric: Option<f64>,
    solvent_dielectric: Option<f64>,
    gbsa_model: Option<SurfaceAreaModel>,
}

/// Options file as written by users. Every field is optional; missing values
/// fall back to the library defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialSystemConfig {
    nonbonded: Option<PartialNonbondedConfig>,
    constraints: Option<PartialConstraintsConfig>,
    implicit_solvent: Option<PartialImplicitSolventConfig>,
    remove_cm_motion: Option<bool>,
    box_vectors: Option<BoxVectors>,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    parse_value(key, value)
}

impl PartialSystemConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            CliError::Config(message) => CliError::FileParsing {
                path: path.to_path_buf(),
                source: anyhow::anyhow!(message),
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Applies CLI flags over the file values, then validates the result.
    /// `box_override` (from a restart file) wins over a box in the file.
    pub fn merge_with_cli(
        mut self,
        args: &BuildArgs,
        box_override: Option<BoxVectors>,
    ) -> Result<SystemOptions> {
        self.apply_set_values(&args.set_values)?;

        let nonbonded = self.nonbonded.take().unwrap_or_default();
        let constraints = self.constraints.take().unwrap_or_default();
        let implicit = self.implicit_solvent.take().unwrap_or_default();
        let defaults = SystemOptions::default();

        let mut builder = SystemOptionsBuilder::new()
            .nonbonded_method(
                args.nonbonded_method
                    .or(nonbonded.method)
                    .unwrap_or(defaults.nonbonded_method),
            )
            .nonbonded_cutoff(
                args.cutoff
                    .or(nonbonded.cutoff)
                    .unwrap_or(defaults.nonbonded_cutoff),
            )
            .ewald_error_tolerance(
                nonbonded
                    .ewald_error_tolerance
                    .unwrap_or(defaults.ewald_error_tolerance),
            )
            .use_dispersion_correction(
                !args.no_dispersion_correction
                    && nonbonded
                        .use_dispersion_correction
                        .unwrap_or(defaults.use_dispersion_correction),
            )
            .constraints(
                args.constraints
                    .or(constraints.policy)
                    .unwrap_or(defaults.constraints),
            )
            .rigid_water(Self::merge_rigid_water(
                args.rigid_water,
                constraints.rigid_water,
                defaults.rigid_water,
            ))
            .flexible_constraints(
                args.flexible_constraints || constraints.flexible.unwrap_or(false),
            )
            .implicit_solvent_salt_conc(
                args.salt_conc
                    .or(implicit.salt_conc)
                    .unwrap_or(defaults.implicit_solvent_salt_conc),
            )
            .temperature(implicit.temperature.unwrap_or(defaults.temperature))
            .solute_dielectric(
                implicit
                    .solute_dielectric
                    .unwrap_or(defaults.solute_dielectric),
            )
            .solvent_dielectric(
                implicit
                    .solvent_dielectric
                    .unwrap_or(defaults.solvent_dielectric),
            )
            .gbsa_model(
                args.gbsa_model
                    .or(implicit.gbsa_model)
                    .unwrap_or(defaults.gbsa_model),
            )
            .remove_cm_motion(
                !args.no_cm_motion_removal
                    && self.remove_cm_motion.unwrap_or(defaults.remove_cm_motion),
            );

        if let Some(distance) = args.switch_distance.or(nonbonded.switch_distance) {
            builder = builder.switch_distance(distance);
        }
        if let Some(mass) = args.hydrogen_mass.or(constraints.hydrogen_mass) {
            builder = builder.hydrogen_mass(mass);
        }
        if let Some(model) = args.implicit_solvent.or(implicit.model) {
            builder = builder.implicit_solvent(model);
        }
        if let Some(kappa) = implicit.kappa {
            builder = builder.implicit_solvent_kappa(kappa);
        }
        if let Some(vectors) = box_override.or(self.box_vectors) {
            builder = builder.box_vectors(vectors);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_rigid_water(cli_flags: RigidWater, file_val: Option<bool>, default: bool) -> bool {
        if cli_flags.rigid_water {
            true
        } else if cli_flags.flexible_water {
            false
        } else {
            file_val.unwrap_or(default)
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "nonbonded.method" => {
                    self.nonbonded.get_or_insert_with(Default::default).method =
                        Some(parse_value(key, value)?);
                }
                "nonbonded.cutoff" => {
                    self.nonbonded.get_or_insert_with(Default::default).cutoff =
                        Some(parse_value(key, value)?);
                }
                "nonbonded.switch-distance" => {
                    self.nonbonded
                        .get_or_insert_with(Default::default)
                        .switch_distance = Some(parse_value(key, value)?);
                }
                "nonbonded.ewald-error-tolerance" => {
                    self.nonbonded
                        .get_or_insert_with(Default::default)
                        .ewald_error_tolerance = Some(parse_value(key, value)?);
                }
                "constraints.policy" => {
                    self.constraints.get_or_insert_with(Default::default).policy =
                        Some(parse_value(key, value)?);
                }
                "constraints.rigid-water" => {
                    self.constraints
                        .get_or_insert_with(Default::default)
                        .rigid_water = Some(parse_bool(key, value)?);
                }
                "constraints.hydrogen-mass" => {
                    self.constraints
                        .get_or_insert_with(Default::default)
                        .hydrogen_mass = Some(parse_value(key, value)?);
                }
                "implicit-solvent.model" => {
                    self.implicit_solvent
                        .get_or_insert_with(Default::default)
                        .model = Some(parse_value(key, value)?);
                }
                "implicit-solvent.salt-conc" => {
                    self.implicit_solvent
                        .get_or_insert_with(Default::default)
                        .salt_conc = Some(parse_value(key, value)?);
                }
                "implicit-solvent.kappa" => {
                    self.implicit_solvent
                        .get_or_insert_with(Default::default)
                        .kappa = Some(parse_value(key, value)?);
                }
                "temperature" | "implicit-solvent.temperature" => {
                    self.implicit_solvent
                        .get_or_insert_with(Default::default)
                        .temperature = Some(parse_value(key, value)?);
                }
                "remove-cm-motion" => {
                    self.remove_cm_motion = Some(parse_bool(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
