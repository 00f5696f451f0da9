use clap::{Args, Parser, Subcommand};
use parmforge::core::forcefield::constraints::ConstraintPolicy;
use parmforge::core::forcefield::implicit::{GbModel, SurfaceAreaModel};
use parmforge::core::forcefield::nonbonded::NonbondedMethod;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "parmforge - compile AMBER prmtop topologies (including CHARMM Chamber files) into fully specified interaction systems.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to build several files in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile one or more prmtop files into interaction systems.
    Build(BuildArgs),
    /// Print the section counts parsed from a prmtop file.
    Inspect(InspectArgs),
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    // --- Core Arguments ---
    /// Input prmtop files. Each one is compiled independently.
    #[arg(required = true, value_name = "PRMTOP")]
    pub inputs: Vec<PathBuf>,

    /// Restart file whose periodic box overrides the topology's box.
    #[arg(long, value_name = "PATH")]
    pub inpcrd: Option<PathBuf>,

    /// Path to a system options file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory receiving one `<stem>.system.toml` per input.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    // --- Nonbonded Overrides ---
    /// Nonbonded method: no-cutoff, cutoff-non-periodic, cutoff-periodic, ewald, pme or ljpme.
    #[arg(short = 'm', long, value_name = "METHOD")]
    pub nonbonded_method: Option<NonbondedMethod>,

    /// Nonbonded cutoff distance in nm.
    #[arg(long, value_name = "NM")]
    pub cutoff: Option<f64>,

    /// Switching distance in nm; must be smaller than the cutoff.
    #[arg(long, value_name = "NM")]
    pub switch_distance: Option<f64>,

    /// Disable the long-range dispersion correction.
    #[arg(long)]
    pub no_dispersion_correction: bool,

    // --- Constraint Overrides ---
    /// Constraint policy: none, h-bonds, all-bonds or h-angles.
    #[arg(long, value_name = "POLICY")]
    pub constraints: Option<ConstraintPolicy>,

    /// Override `rigid-water` from the config file.
    #[command(flatten)]
    pub rigid_water: RigidWater,

    /// Keep energy terms for constrained bonds and angles (debugging only).
    #[arg(long)]
    pub flexible_constraints: bool,

    /// Repartition hydrogen masses to this value in Da.
    #[arg(long, value_name = "DA")]
    pub hydrogen_mass: Option<f64>,

    // --- Implicit Solvent Overrides ---
    /// Generalized Born model: HCT, OBC1, OBC2, GBn or GBn2.
    #[arg(long, value_name = "MODEL")]
    pub implicit_solvent: Option<GbModel>,

    /// Salt concentration in mol/L for Debye screening.
    #[arg(long, value_name = "MOLAR")]
    pub salt_conc: Option<f64>,

    /// Surface area term: ace or none.
    #[arg(long, value_name = "MODEL")]
    pub gbsa_model: Option<SurfaceAreaModel>,

    /// Do not add a center-of-mass motion remover.
    #[arg(long)]
    pub no_cm_motion_removal: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S temperature=310
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// A group to handle mutually exclusive rigid-water flags.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct RigidWater {
    /// Constrain water geometry even without a constraint policy.
    #[arg(long)]
    pub rigid_water: bool,
    /// Leave water flexible when no constraint policy is active.
    #[arg(long)]
    pub flexible_water: bool,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// The prmtop file to inspect.
    #[arg(required = true, value_name = "PRMTOP")]
    pub prmtop: PathBuf,
}
