use crate::cli::BuildArgs;
use crate::config::PartialSystemConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use parmforge::core::forcefield::term::ForceKind;
use parmforge::core::io::inpcrd::InpcrdFile;
use parmforge::core::io::prmtop::PrmtopFile;
use parmforge::core::io::traits::AmberFile;
use parmforge::core::models::system::BoxVectors;
use parmforge::core::units::ANGSTROM_TO_NM;
use parmforge::core::utils::geometry::compute_box_vectors;
use parmforge::engine::config::SystemOptions;
use parmforge::engine::error::BuildError;
use parmforge::engine::progress::ProgressReporter;
use parmforge::workflows;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// What was written for one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub particles: usize,
    pub forces: Vec<ForceKind>,
    pub constraints: usize,
    pub periodic: bool,
}

pub fn run(args: BuildArgs, quiet: bool) -> Result<Vec<BuildSummary>> {
    let partial_config = match &args.config {
        Some(path) => PartialSystemConfig::from_file(path)?,
        None => PartialSystemConfig::default(),
    };
    let box_override = match &args.inpcrd {
        Some(path) => read_restart_box(path)?,
        None => None,
    };
    info!("Merging configuration from file and CLI arguments...");
    let options = partial_config.merge_with_cli(&args, box_override)?;

    check_distinct_outputs(&args.inputs, &args.output_dir)?;
    std::fs::create_dir_all(&args.output_dir)?;

    let total = args.inputs.len();
    let progress = if quiet {
        CliProgressHandler::hidden(total as u64)
    } else {
        CliProgressHandler::new(total as u64)
    };
    info!("Building {} input file(s) in parallel.", total);

    let results: Vec<Result<BuildSummary>> = args
        .inputs
        .par_iter()
        .map(|input| {
            let result = build_one(input, &options, &args.output_dir, &progress);
            progress.file_finished();
            result
        })
        .collect();
    progress.finish();

    let mut summaries = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(summary) => {
                print_summary(&summary);
                summaries.push(summary);
            }
            Err(e) => {
                error!("{}", e);
                eprintln!("✗ {}", e);
                failures.push(e);
            }
        }
    }

    match failures.len() {
        0 => Ok(summaries),
        1 if total == 1 => Err(failures.remove(0)),
        failed => Err(CliError::Batch { failed, total }),
    }
}

fn read_restart_box(path: &Path) -> Result<Option<BoxVectors>> {
    info!("Reading periodic box from {:?}", path);
    let restart = InpcrdFile::read_from_path(path).map_err(|e| CliError::Input {
        path: path.to_path_buf(),
        source: BuildError::from(e),
    })?;
    let Some(dimensions) = restart.box_dimensions else {
        warn!(
            "Restart file {:?} has no box; keeping the topology's box.",
            path
        );
        return Ok(None);
    };
    let lengths = dimensions.lengths.map(|l| l * ANGSTROM_TO_NM);
    Ok(Some(BoxVectors::from(compute_box_vectors(
        lengths,
        dimensions.angles,
    ))))
}

fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "system".to_string());
    output_dir.join(format!("{stem}.system.toml"))
}

/// Rejects input lists in which two files map to the same output file.
fn check_distinct_outputs(inputs: &[PathBuf], output_dir: &Path) -> Result<()> {
    let mut seen: HashMap<PathBuf, &PathBuf> = HashMap::with_capacity(inputs.len());
    for input in inputs {
        let output = output_path(input, output_dir);
        if let Some(first) = seen.get(&output) {
            return Err(CliError::DuplicateOutput {
                first: (*first).clone(),
                second: input.clone(),
                output,
            });
        }
        seen.insert(output, input);
    }
    Ok(())
}

fn build_one(
    input: &Path,
    options: &SystemOptions,
    output_dir: &Path,
    progress: &CliProgressHandler,
) -> Result<BuildSummary> {
    let input_error = |source: BuildError| CliError::Input {
        path: input.to_path_buf(),
        source,
    };

    info!("Loading topology from {:?}", input);
    let record = PrmtopFile::read_from_path(input).map_err(|e| input_error(e.into()))?;

    let output = output_path(input, output_dir);
    let label = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let reporter = ProgressReporter::with_callback(progress.callback_for(label));
    let built = workflows::build::run(&record, options, &reporter).map_err(input_error)?;

    let document = built.to_toml_string()?;
    std::fs::write(&output, document)?;
    info!("Wrote {:?}", output);

    let system = &built.system;
    Ok(BuildSummary {
        input: input.to_path_buf(),
        output,
        particles: system.particle_count(),
        forces: system.force_kinds(),
        constraints: system.constraints.len(),
        periodic: system.is_periodic(),
    })
}

fn print_summary(summary: &BuildSummary) {
    let forces: Vec<String> = summary.forces.iter().map(ToString::to_string).collect();
    println!(
        "✓ {} -> {} ({} particles, {} constraints, {}, forces: {})",
        summary.input.display(),
        summary.output.display(),
        summary.particles,
        summary.constraints,
        if summary.periodic {
            "periodic"
        } else {
            "non-periodic"
        },
        forces.join(", ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::commands::testdata::{water_inpcrd, water_prmtop};
    use clap::Parser;
    use tempfile::TempDir;

    fn build_args(argv: &[&str]) -> BuildArgs {
        let mut full = vec!["parmforge", "build"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Build(args) => args,
            other => panic!("expected build arguments, got {other:?}"),
        }
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn writes_one_system_file_per_input() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(&dir, "first.prmtop", &water_prmtop(true));
        let second = write(&dir, "second.parm7", &water_prmtop(false));
        let out = dir.path().join("out");
        let out_str = out.to_string_lossy().into_owned();

        let summaries = run(
            build_args(&[&first, &second, "--output-dir", &out_str]),
            true,
        )
        .unwrap();

        assert_eq!(summaries.len(), 2);
        assert!(out.join("first.system.toml").is_file());
        assert!(out.join("second.system.toml").is_file());
        let periodic: Vec<bool> = summaries.iter().map(|s| s.periodic).collect();
        assert_eq!(periodic, vec![true, false]);
        assert!(summaries.iter().all(|s| s.particles == 3));
        assert!(summaries.iter().all(|s| s.constraints == 3));

        let text = std::fs::read_to_string(out.join("first.system.toml")).unwrap();
        let document: toml::Table = toml::from_str(&text).unwrap();
        assert!(document.contains_key("system"));
        assert!(document.contains_key("topology"));
    }

    #[test]
    fn restart_box_overrides_the_topology_box() {
        let dir = tempfile::tempdir().unwrap();
        let prmtop = write(&dir, "water.prmtop", &water_prmtop(true));
        let inpcrd = write(&dir, "water.inpcrd", &water_inpcrd());
        let out = dir.path().to_string_lossy().into_owned();

        run(
            build_args(&[&prmtop, "--inpcrd", &inpcrd, "--output-dir", &out]),
            true,
        )
        .unwrap();

        let text = std::fs::read_to_string(dir.path().join("water.system.toml")).unwrap();
        let document: toml::Table = toml::from_str(&text).unwrap();
        let first = &document["system"]["box_vectors"].as_array().unwrap()[0];
        let a_x = first.as_array().unwrap()[0].as_float().unwrap();
        assert!((a_x - 2.5).abs() < 1e-9);
    }

    #[test]
    fn cli_overrides_reach_the_built_system() {
        let dir = tempfile::tempdir().unwrap();
        let prmtop = write(&dir, "water.prmtop", &water_prmtop(true));
        let out = dir.path().to_string_lossy().into_owned();

        let summaries = run(
            build_args(&[
                &prmtop,
                "--output-dir",
                &out,
                "--nonbonded-method",
                "pme",
                "--flexible-water",
                "--no-cm-motion-removal",
            ]),
            true,
        )
        .unwrap();

        assert_eq!(summaries[0].constraints, 0);
        assert_eq!(
            summaries[0].forces,
            vec![
                ForceKind::HarmonicBond,
                ForceKind::HarmonicAngle,
                ForceKind::PeriodicTorsion,
                ForceKind::Nonbonded,
            ]
        );
    }

    #[test]
    fn missing_input_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.prmtop");
        let out = dir.path().to_string_lossy().into_owned();
        let result = run(
            build_args(&[&missing.to_string_lossy(), "--output-dir", &out]),
            true,
        );
        match result {
            Err(CliError::Input { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected an input error, got {other:?}"),
        }
    }

    #[test]
    fn inputs_sharing_a_stem_are_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        let first = write(&dir, "a/water.prmtop", &water_prmtop(true));
        let second = write(&dir, "b/water.parm7", &water_prmtop(false));
        let out = dir.path().join("out");
        let out_str = out.to_string_lossy().into_owned();

        let result = run(build_args(&[&first, &second, "--output-dir", &out_str]), true);
        match result {
            Err(CliError::DuplicateOutput { output, .. }) => {
                assert_eq!(output, out.join("water.system.toml"))
            }
            other => panic!("expected a duplicate output error, got {other:?}"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn batch_failures_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "good.prmtop", &water_prmtop(true));
        let bad = write(&dir, "bad.prmtop", "%VERSION  VERSION_STAMP = V0002.000\n");
        let missing = dir.path().join("missing.prmtop");
        let out = dir.path().to_string_lossy().into_owned();

        let result = run(
            build_args(&[&good, &bad, &missing.to_string_lossy(), "--output-dir", &out]),
            true,
        );
        assert!(matches!(
            result,
            Err(CliError::Batch {
                failed: 2,
                total: 3
            })
        ));
        assert!(dir.path().join("good.system.toml").is_file());
    }
}
