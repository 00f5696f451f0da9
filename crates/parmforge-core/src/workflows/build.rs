use crate::core::forcefield::constraints::{AtomFacts, ConstraintPolicy, ConstraintResolver};
use crate::core::forcefield::error::InvalidParameterError;
use crate::core::forcefield::implicit::{ImplicitSolventBuilder, ImplicitSolventSettings};
use crate::core::forcefield::nonbonded::{NonbondedAssembler, NonbondedMethod, NonbondedSettings};
use crate::core::forcefield::params::{ParameterTableResolver, ResolvedParameters};
use crate::core::forcefield::term::{
    CmMotionRemover, CmapTorsionTerm, ForceTerm, HarmonicAngle, HarmonicAngleTerm, HarmonicBond,
    HarmonicBondTerm, ImproperTorsionTerm, PeriodicTorsionTerm, UreyBradleyTerm,
};
use crate::core::models::record::TopologyRecord;
use crate::core::models::system::{BoxVectors, InteractionSystem};
use crate::core::models::topology::Topology;
use crate::core::units::ANGSTROM_TO_NM;
use crate::core::utils::geometry::{compute_box_vectors, reduce_box_vectors};
use crate::engine::config::SystemOptions;
use crate::engine::error::BuildError;
use crate::engine::progress::{Progress, ProgressReporter};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildOutput {
    pub system: InteractionSystem,
    pub topology: Topology,
}

impl BuildOutput {
    /// Renders the system and its topology as one TOML document with
    /// `[system]` and `[topology]` tables.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// Compiles a parsed topology into an interaction system.
///
/// Force terms are emitted in a fixed order: harmonic bonds, harmonic angles,
/// Urey–Bradley (Chamber only), periodic torsions, impropers (Chamber only),
/// CMAP (when present), nonbonded, the custom LJ table (NBFIX or 12-6-4 only),
/// generalized Born (implicit solvent only) and center-of-mass motion removal.
///
/// # Errors
///
/// Any [`BuildError`]; no partial system is returned.
#[instrument(skip_all, name = "build_workflow")]
pub fn run(
    record: &TopologyRecord,
    options: &SystemOptions,
    reporter: &ProgressReporter,
) -> Result<BuildOutput, BuildError> {
    options.validate()?;
    info!(
        atoms = record.atom_count(),
        chamber = record.is_chamber,
        "Compiling topology '{}'",
        record.title
    );

    // === Phase 1: Parameter resolution ===
    reporter.report(Progress::PhaseStart {
        name: "Parameters",
    });
    let mut topology = Topology::from_record(record);
    let resolved = ParameterTableResolver::new(record).resolve()?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Particles and box ===
    reporter.report(Progress::PhaseStart { name: "Particles" });
    let mut masses: Vec<f64> = record.atoms.iter().map(|a| a.mass).collect();
    if let Some(hydrogen_mass) = options.hydrogen_mass {
        repartition_hydrogen_mass(&mut masses, &topology, hydrogen_mass)?;
    }
    let charges: Vec<f64> = record.atoms.iter().map(|a| a.charge).collect();
    let box_vectors = resolve_box(record, options);
    topology.box_vectors = box_vectors;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Constraints ===
    reporter.report(Progress::PhaseStart {
        name: "Constraints",
    });
    let elements: Vec<_> = topology.atoms.iter().map(|a| a.element).collect();
    let in_water = topology.water_atoms();
    let facts = AtomFacts {
        masses: &masses,
        elements: &elements,
        in_water: &in_water,
    };
    let rigid_water = options.rigid_water || options.constraints != ConstraintPolicy::None;
    let constrained = ConstraintResolver::new(
        options.constraints,
        rigid_water,
        options.flexible_constraints,
    )
    .resolve(&resolved.bonds, &resolved.angles, &facts);
    if !constrained.skipped.is_empty() {
        warn!(
            skipped = constrained.skipped.len(),
            "Some constraints involve massless particles and were kept as force terms"
        );
    }
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Force terms ===
    reporter.report(Progress::PhaseStart {
        name: "Force terms",
    });
    let mut forces = bonded_terms(record, &resolved, constrained.bonds, constrained.angles);

    let method = effective_method(options);
    let settings = NonbondedSettings {
        method,
        cutoff: options.nonbonded_cutoff,
        switch_distance: options.switch_distance,
        ewald_error_tolerance: options.ewald_error_tolerance,
        use_dispersion_correction: options.use_dispersion_correction,
        implicit_solute_dielectric: options.implicit_solvent.map(|_| options.solute_dielectric),
    };
    let nonbonded = NonbondedAssembler::new(record, &resolved, settings)
        .assemble(&charges, box_vectors.is_some())?;
    forces.push(ForceTerm::Nonbonded(nonbonded.nonbonded));
    if let Some(custom) = nonbonded.custom {
        forces.push(ForceTerm::CustomNonbonded(custom));
    }

    if let Some(model) = options.implicit_solvent {
        let settings = ImplicitSolventSettings {
            model,
            solute_dielectric: options.solute_dielectric,
            solvent_dielectric: options.solvent_dielectric,
            salt_concentration: options.implicit_solvent_salt_conc,
            kappa: options.implicit_solvent_kappa,
            temperature: options.temperature,
            surface_area: options.gbsa_model,
            cutoff_treatment: method.cutoff_treatment(),
            cutoff: options.nonbonded_cutoff,
        };
        let gb = ImplicitSolventBuilder::new(settings).build(record, &topology)?;
        forces.push(ForceTerm::GeneralizedBorn(gb));
    }

    if options.remove_cm_motion {
        forces.push(ForceTerm::CmMotionRemover(CmMotionRemover::default()));
    }
    reporter.report(Progress::PhaseFinish);

    let system = InteractionSystem {
        masses,
        charges,
        forces,
        constraints: constrained.constraints,
        box_vectors,
    };
    info!(
        particles = system.particle_count(),
        forces = system.forces.len(),
        constraints = system.constraints.len(),
        periodic = system.is_periodic(),
        "Interaction system assembled"
    );
    Ok(BuildOutput { system, topology })
}

/// Ewald-family methods have no meaning for an implicit-solvent system.
fn effective_method(options: &SystemOptions) -> NonbondedMethod {
    let requested = options.nonbonded_method;
    if options.implicit_solvent.is_some() && requested.is_ewald_family() {
        warn!(
            requested = %requested,
            "Implicit solvent does not support {requested}; using cutoff-non-periodic instead"
        );
        return NonbondedMethod::CutoffNonPeriodic;
    }
    requested
}

/// Sets every non-water hydrogen bonded to a heavy atom to `hydrogen_mass`,
/// taking the difference from its heavy partner.
fn repartition_hydrogen_mass(
    masses: &mut [f64],
    topology: &Topology,
    hydrogen_mass: f64,
) -> Result<(), InvalidParameterError> {
    let in_water = topology.water_atoms();
    let mut repartitioned = 0usize;
    for &[a, b] in &topology.bonds {
        let (heavy, hydrogen) = if topology.is_hydrogen(a) { (b, a) } else { (a, b) };
        if !topology.is_hydrogen(hydrogen) || in_water[hydrogen] {
            continue;
        }
        if topology.element(heavy).is_none() || topology.is_hydrogen(heavy) {
            continue;
        }
        let transfer = hydrogen_mass - masses[hydrogen];
        masses[hydrogen] = hydrogen_mass;
        masses[heavy] -= transfer;
        if masses[heavy] <= 0.0 {
            return Err(InvalidParameterError::new(
                "hydrogen_mass",
                format!(
                    "repartitioning {hydrogen_mass} Da onto hydrogens leaves atom {heavy} with mass {}",
                    masses[heavy]
                ),
            ));
        }
        repartitioned += 1;
    }
    debug!(repartitioned, hydrogen_mass, "Repartitioned hydrogen masses");
    Ok(())
}

/// The override box if given, otherwise the topology's own box, in reduced form.
fn resolve_box(record: &TopologyRecord, options: &SystemOptions) -> Option<BoxVectors> {
    if let Some(vectors) = options.box_vectors {
        return Some(BoxVectors::from(reduce_box_vectors(vectors.to_vectors())));
    }
    record.periodic_box.as_ref().map(|info| {
        let lengths = info.lengths.map(|l| l * ANGSTROM_TO_NM);
        BoxVectors::from(compute_box_vectors(lengths, [info.beta; 3]))
    })
}

fn bonded_terms(
    record: &TopologyRecord,
    resolved: &ResolvedParameters,
    bonds: Vec<HarmonicBond>,
    angles: Vec<HarmonicAngle>,
) -> Vec<ForceTerm> {
    let mut forces = vec![
        ForceTerm::HarmonicBond(HarmonicBondTerm { bonds }),
        ForceTerm::HarmonicAngle(HarmonicAngleTerm { angles }),
    ];
    if record.chamber.is_some() {
        forces.push(ForceTerm::UreyBradley(UreyBradleyTerm {
            bonds: resolved.urey_bradleys.clone(),
        }));
    }
    forces.push(ForceTerm::PeriodicTorsion(PeriodicTorsionTerm {
        torsions: resolved.torsions.clone(),
    }));
    if record.chamber.is_some() {
        forces.push(ForceTerm::ImproperTorsion(ImproperTorsionTerm {
            torsions: resolved.impropers.clone(),
        }));
    }
    if !resolved.cmap_maps.is_empty() {
        forces.push(ForceTerm::CmapTorsion(CmapTorsionTerm {
            maps: resolved.cmap_maps.clone(),
            torsions: resolved.cmap_torsions.clone(),
        }));
    }
    forces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::implicit::{GbModel, SurfaceAreaModel};
    use crate::core::forcefield::nonbonded::NonbondedTerm;
    use crate::core::forcefield::term::ForceKind;
    use crate::core::io::fixtures::Fixture;

    fn build(fixture: Fixture, options: SystemOptions) -> Result<BuildOutput, BuildError> {
        run(&fixture.record(), &options, &ProgressReporter::new())
    }

    fn build_default(options: SystemOptions) -> BuildOutput {
        build(Fixture::default(), options).unwrap()
    }

    fn nonbonded(system: &InteractionSystem) -> &NonbondedTerm {
        match system.force(ForceKind::Nonbonded) {
            Some(ForceTerm::Nonbonded(term)) => term,
            other => panic!("expected a nonbonded term, got {other:?}"),
        }
    }

    #[test]
    fn default_build_emits_terms_in_order() {
        let output = build_default(SystemOptions::default());
        assert_eq!(
            output.system.force_kinds(),
            vec![
                ForceKind::HarmonicBond,
                ForceKind::HarmonicAngle,
                ForceKind::PeriodicTorsion,
                ForceKind::Nonbonded,
                ForceKind::CmMotionRemover,
            ]
        );
        assert_eq!(output.system.particle_count(), 9);
        assert_eq!(output.topology.atoms.len(), 9);
    }

    #[test]
    fn force_kinds_are_sorted_for_a_full_chamber_build() {
        let fixture = Fixture {
            chamber: true,
            nbfix: true,
            ..Fixture::default()
        };
        let options = SystemOptions::builder()
            .implicit_solvent(GbModel::Obc2)
            .build()
            .unwrap();
        let kinds = build(fixture, options).unwrap().system.force_kinds();
        assert_eq!(
            kinds,
            vec![
                ForceKind::HarmonicBond,
                ForceKind::HarmonicAngle,
                ForceKind::UreyBradley,
                ForceKind::PeriodicTorsion,
                ForceKind::ImproperTorsion,
                ForceKind::CmapTorsion,
                ForceKind::Nonbonded,
                ForceKind::CustomNonbonded,
                ForceKind::GeneralizedBorn,
                ForceKind::CmMotionRemover,
            ]
        );
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
    }

    #[test]
    fn every_nonbonded_method_is_reported_as_requested() {
        let methods = [
            NonbondedMethod::NoCutoff,
            NonbondedMethod::CutoffNonPeriodic,
            NonbondedMethod::CutoffPeriodic,
            NonbondedMethod::Ewald,
            NonbondedMethod::Pme,
            NonbondedMethod::LjPme,
        ];
        for method in methods {
            let options = SystemOptions::builder()
                .nonbonded_method(method)
                .nonbonded_cutoff(0.9)
                .build()
                .unwrap();
            let output = build_default(options);
            let term = nonbonded(&output.system);
            assert_eq!(term.method, method);
            if method.uses_cutoff() {
                assert_eq!(term.cutoff, 0.9);
            }
        }
    }

    #[test]
    fn constraint_policies_partition_bonds_and_angles() {
        let record = Fixture::default().record();
        let resolved = ParameterTableResolver::new(&record).resolve().unwrap();
        let policies = [
            ConstraintPolicy::None,
            ConstraintPolicy::HBonds,
            ConstraintPolicy::AllBonds,
            ConstraintPolicy::HAngles,
        ];
        for policy in policies {
            for rigid_water in [false, true] {
                let options = SystemOptions::builder()
                    .constraints(policy)
                    .rigid_water(rigid_water)
                    .build()
                    .unwrap();
                let system = run(&record, &options, &ProgressReporter::new())
                    .unwrap()
                    .system;
                let constraints = &system.constraints;

                let Some(ForceTerm::HarmonicBond(bond_term)) = system.force(ForceKind::HarmonicBond)
                else {
                    panic!("missing bond term");
                };
                let constrained_bonds = resolved
                    .bonds
                    .iter()
                    .filter(|b| constraints.contains(b.atoms[0], b.atoms[1]))
                    .count();
                assert_eq!(constrained_bonds + bond_term.bonds.len(), resolved.bonds.len());
                assert!(
                    bond_term
                        .bonds
                        .iter()
                        .all(|b| !constraints.contains(b.atoms[0], b.atoms[1]))
                );

                let Some(ForceTerm::HarmonicAngle(angle_term)) =
                    system.force(ForceKind::HarmonicAngle)
                else {
                    panic!("missing angle term");
                };
                let constrained_angles = resolved
                    .angles
                    .iter()
                    .filter(|a| constraints.contains(a.atoms[0], a.atoms[2]))
                    .count();
                assert_eq!(
                    constrained_angles + angle_term.angles.len(),
                    resolved.angles.len()
                );

                let water_rigid = constraints.contains(6, 7)
                    && constraints.contains(6, 8)
                    && constraints.contains(7, 8);
                let expect_rigid = rigid_water || policy != ConstraintPolicy::None;
                assert_eq!(water_rigid, expect_rigid, "{policy} rigid_water={rigid_water}");
            }
        }
    }

    #[test]
    fn flexible_constraints_keep_energy_terms() {
        let options = SystemOptions::builder()
            .constraints(ConstraintPolicy::HAngles)
            .flexible_constraints(true)
            .build()
            .unwrap();
        let system = build_default(options).system;
        assert_eq!(system.constraints.len(), 12);
        assert_eq!(system.force(ForceKind::HarmonicBond).map(ForceTerm::len), Some(8));
        assert_eq!(system.force(ForceKind::HarmonicAngle).map(ForceTerm::len), Some(7));
    }

    #[test]
    fn hydrogen_mass_repartitioning_conserves_total_mass() {
        let plain = build_default(SystemOptions::default()).system;
        let options = SystemOptions::builder().hydrogen_mass(3.024).build().unwrap();
        let heavy = build_default(options).system;

        assert!((plain.total_mass() - heavy.total_mass()).abs() < 1e-9);
        for h in [1, 2, 3, 5] {
            assert_eq!(heavy.masses[h], 3.024);
        }
        assert!((heavy.masses[0] - (12.01 - 3.0 * (3.024 - 1.008))).abs() < 1e-9);
        assert!((heavy.masses[4] - (16.0 - (3.024 - 1.008))).abs() < 1e-9);
        assert_eq!(&heavy.masses[6..], &plain.masses[6..]);
    }

    #[test]
    fn hydrogen_mass_that_empties_a_heavy_atom_is_rejected() {
        let options = SystemOptions::builder().hydrogen_mass(6.0).build().unwrap();
        let err = build(Fixture::default(), options).unwrap_err();
        assert!(matches!(
            err,
            BuildError::InvalidParameter { ref source } if source.parameter == "hydrogen_mass"
        ));
    }

    #[test]
    fn out_of_range_options_fail_as_invalid_parameters() {
        let cases = [
            (
                SystemOptions {
                    nonbonded_cutoff: -1.0,
                    ..Default::default()
                },
                "nonbonded_cutoff",
            ),
            (
                SystemOptions {
                    solvent_dielectric: 0.0,
                    ..Default::default()
                },
                "solvent_dielectric",
            ),
            (
                SystemOptions {
                    implicit_solvent_kappa: Some(-2.0),
                    ..Default::default()
                },
                "implicit_solvent_kappa",
            ),
        ];
        for (options, expected) in cases {
            match build(Fixture::default(), options) {
                Err(BuildError::InvalidParameter { source }) => {
                    assert_eq!(source.parameter, expected)
                }
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn nbfix_exceptions_match_custom_exclusions() {
        for fixture in [
            Fixture {
                nbfix: true,
                ..Fixture::default()
            },
            Fixture {
                c4: true,
                ..Fixture::default()
            },
        ] {
            let system = build(fixture, SystemOptions::default()).unwrap().system;
            let Some(ForceTerm::CustomNonbonded(custom)) = system.force(ForceKind::CustomNonbonded)
            else {
                panic!("missing custom nonbonded term");
            };
            assert_eq!(nonbonded(&system).exceptions.len(), custom.exclusions.len());
        }
    }

    #[test]
    fn switch_distance_is_validated() {
        for bad in [-0.1, 0.9, 1.2] {
            let options = SystemOptions::builder()
                .nonbonded_method(NonbondedMethod::Pme)
                .nonbonded_cutoff(0.9)
                .switch_distance(bad)
                .build()
                .unwrap();
            assert!(matches!(
                build(Fixture::default(), options),
                Err(BuildError::InvalidParameter { .. })
            ));
        }

        let options = SystemOptions::builder()
            .nonbonded_method(NonbondedMethod::Pme)
            .nonbonded_cutoff(0.9)
            .switch_distance(0.8)
            .build()
            .unwrap();
        let output = build_default(options);
        assert_eq!(nonbonded(&output.system).switching_distance, Some(0.8));
    }

    #[test]
    fn periodic_methods_require_a_box() {
        let fixture = Fixture {
            periodic: false,
            ..Fixture::default()
        };
        let options = SystemOptions::builder()
            .nonbonded_method(NonbondedMethod::Pme)
            .build()
            .unwrap();
        assert!(matches!(
            build(fixture, options),
            Err(BuildError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn box_comes_from_the_record_in_nanometers() {
        let output = build_default(SystemOptions::default());
        let vectors = output.system.box_vectors.unwrap();
        assert!((vectors.0[0][0] - 3.0).abs() < 1e-9);
        assert!((vectors.0[1][1] - 3.0).abs() < 1e-9);
        assert!((vectors.0[2][2] - 3.0).abs() < 1e-9);
        assert!((vectors.volume() - 27.0).abs() < 1e-9);
        assert_eq!(output.topology.box_vectors, Some(vectors));
    }

    #[test]
    fn box_override_replaces_the_record_box() {
        let override_box = BoxVectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [3.0, 0.0, 4.0]]);
        let options = SystemOptions::builder().box_vectors(override_box).build().unwrap();
        let vectors = build_default(options).system.box_vectors.unwrap();
        assert_eq!(vectors.0[0], [4.0, 0.0, 0.0]);
        assert_eq!(vectors.0[2], [-1.0, 0.0, 4.0]);
    }

    #[test]
    fn implicit_solvent_downgrades_ewald_methods() {
        let options = SystemOptions::builder()
            .nonbonded_method(NonbondedMethod::Pme)
            .implicit_solvent(GbModel::Obc1)
            .build()
            .unwrap();
        let system = build_default(options).system;
        let term = nonbonded(&system);
        assert_eq!(term.method, NonbondedMethod::CutoffNonPeriodic);
        assert_eq!(term.reaction_field_dielectric, 1.0);
    }

    #[test]
    fn disabled_surface_area_keeps_the_gb_term_with_zero_energy() {
        let options = SystemOptions::builder()
            .implicit_solvent(GbModel::Obc2)
            .gbsa_model(SurfaceAreaModel::None)
            .build()
            .unwrap();
        let system = build_default(options).system;
        let Some(ForceTerm::GeneralizedBorn(gb)) = system.force(ForceKind::GeneralizedBorn) else {
            panic!("missing generalized Born term");
        };
        assert_eq!(gb.surface_area_energy, 0.0);
        assert_eq!(gb.particles.len(), 9);
    }

    #[test]
    fn cm_motion_remover_is_optional() {
        let options = SystemOptions::builder().remove_cm_motion(false).build().unwrap();
        let system = build_default(options).system;
        assert!(system.force(ForceKind::CmMotionRemover).is_none());
    }

    #[test]
    fn output_renders_as_toml() {
        let output = build_default(SystemOptions::default());
        let text = output.to_toml_string().unwrap();
        let document: toml::Table = toml::from_str(&text).unwrap();
        let system = document["system"].as_table().unwrap();
        assert_eq!(system["masses"].as_array().unwrap().len(), 9);
        let forces = system["forces"].as_array().unwrap();
        assert_eq!(forces.len(), 5);
        assert_eq!(forces[0]["kind"].as_str(), Some("HarmonicBond"));
        let residues = document["topology"]["residues"].as_array().unwrap();
        assert_eq!(residues[1]["name"].as_str(), Some("HOH"));
    }

    #[test]
    fn reports_phases_to_the_callback() {
        use std::sync::Mutex;
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));
        run(&Fixture::default().record(), &SystemOptions::default(), &reporter).unwrap();
        assert_eq!(
            *phases.lock().unwrap(),
            vec!["Parameters", "Particles", "Constraints", "Force terms"]
        );
    }
}
