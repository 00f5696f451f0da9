use super::params::{ResolvedAngle, ResolvedBond};
use super::term::{HarmonicAngle, HarmonicBond};
use crate::core::models::element::Element;
use crate::core::models::system::ConstraintSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Which bonds and angles are replaced by rigid distance constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintPolicy {
    #[default]
    None,
    /// Bonds from the hydrogen section of the file.
    HBonds,
    AllBonds,
    /// All bonds plus angles closing an H–X–H or H–O–X triangle.
    HAngles,
}

impl FromStr for ConstraintPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "hbonds" => Ok(Self::HBonds),
            "allbonds" => Ok(Self::AllBonds),
            "hangles" => Ok(Self::HAngles),
            _ => Err(format!(
                "unknown constraint policy '{s}' (expected none, h-bonds, all-bonds or h-angles)"
            )),
        }
    }
}

impl fmt::Display for ConstraintPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::HBonds => "h-bonds",
            Self::AllBonds => "all-bonds",
            Self::HAngles => "h-angles",
        })
    }
}

/// A requested constraint that cannot be applied because it involves a
/// massless particle. The term is kept as an ordinary force term.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cannot constrain {kind} {atoms:?}: atom {massless_atom} has no mass")]
pub struct ConstraintSingularityError {
    pub kind: &'static str,
    pub atoms: Vec<usize>,
    pub massless_atom: usize,
}

/// Per-atom facts the resolver needs.
#[derive(Debug, Clone, Copy)]
pub struct AtomFacts<'a> {
    pub masses: &'a [f64],
    pub elements: &'a [Option<Element>],
    pub in_water: &'a [bool],
}

impl AtomFacts<'_> {
    fn massless(&self, atoms: &[usize]) -> Option<usize> {
        atoms.iter().copied().find(|&a| self.masses[a] == 0.0)
    }

    fn is_element(&self, atom: usize, element: Element) -> bool {
        self.elements[atom] == Some(element)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintOutput {
    pub constraints: ConstraintSet,
    /// Bonds still emitted as harmonic force terms.
    pub bonds: Vec<HarmonicBond>,
    /// Angles still emitted as harmonic force terms.
    pub angles: Vec<HarmonicAngle>,
    pub skipped: Vec<ConstraintSingularityError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintResolver {
    pub policy: ConstraintPolicy,
    pub rigid_water: bool,
    /// Keep constrained bonds and angles as force terms as well.
    pub flexible: bool,
}

impl ConstraintResolver {
    pub fn new(policy: ConstraintPolicy, rigid_water: bool, flexible: bool) -> Self {
        Self {
            policy,
            rigid_water,
            flexible,
        }
    }

    fn wants_bond(&self, bond: &ResolvedBond, facts: &AtomFacts) -> bool {
        let [i, j] = bond.atoms;
        let rigid_water_bond =
            self.rigid_water && bond.with_hydrogen && facts.in_water[i] && facts.in_water[j];
        match self.policy {
            ConstraintPolicy::None => rigid_water_bond,
            ConstraintPolicy::HBonds => bond.with_hydrogen || rigid_water_bond,
            ConstraintPolicy::AllBonds | ConstraintPolicy::HAngles => true,
        }
    }

    fn wants_angle(&self, angle: &ResolvedAngle, facts: &AtomFacts) -> bool {
        if self.policy != ConstraintPolicy::HAngles {
            return false;
        }
        let [i, j, k] = angle.atoms;
        let hydrogens = [i, k]
            .iter()
            .filter(|&&a| facts.is_element(a, Element::H))
            .count();
        hydrogens == 2 || (hydrogens == 1 && facts.is_element(j, Element::O))
    }

    /// Splits bonds and angles into constraints and remaining force terms.
    pub fn resolve(
        &self,
        bonds: &[ResolvedBond],
        angles: &[ResolvedAngle],
        facts: &AtomFacts,
    ) -> ConstraintOutput {
        let mut output = ConstraintOutput::default();

        for bond in bonds {
            if !self.wants_bond(bond, facts) {
                output.bonds.push(bond.to_harmonic());
                continue;
            }
            if let Some(massless_atom) = facts.massless(&bond.atoms) {
                let err = ConstraintSingularityError {
                    kind: "bond",
                    atoms: bond.atoms.to_vec(),
                    massless_atom,
                };
                warn!("{err}");
                output.skipped.push(err);
                output.bonds.push(bond.to_harmonic());
                continue;
            }
            output
                .constraints
                .add(bond.atoms[0], bond.atoms[1], bond.length);
            if self.flexible {
                output.bonds.push(bond.to_harmonic());
            }
        }

        for angle in angles {
            let harmonic = HarmonicAngle {
                atoms: angle.atoms,
                angle: angle.angle,
                k: angle.k,
            };
            if !self.wants_angle(angle, facts) {
                output.angles.push(harmonic);
                continue;
            }
            if let Some(massless_atom) = facts.massless(&angle.atoms) {
                let err = ConstraintSingularityError {
                    kind: "angle",
                    atoms: angle.atoms.to_vec(),
                    massless_atom,
                };
                warn!("{err}");
                output.skipped.push(err);
                output.angles.push(harmonic);
                continue;
            }
            let [i, j, k] = angle.atoms;
            let lengths = (
                output.constraints.distance(i, j),
                output.constraints.distance(j, k),
            );
            let (Some(l1), Some(l2)) = lengths else {
                output.angles.push(harmonic);
                continue;
            };
            let distance = (l1 * l1 + l2 * l2 - 2.0 * l1 * l2 * angle.angle.cos()).sqrt();
            output.constraints.add(i, k, distance);
            if self.flexible {
                output.angles.push(harmonic);
            }
        }

        debug!(
            constraints = output.constraints.len(),
            bonds = output.bonds.len(),
            angles = output.angles.len(),
            skipped = output.skipped.len(),
            "Resolved constraints"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{ParameterTableResolver, ResolvedParameters};
    use crate::core::io::fixtures::Fixture;
    use crate::core::models::record::TopologyRecord;
    use crate::core::models::topology::Topology;

    struct Setup {
        resolved: ResolvedParameters,
        masses: Vec<f64>,
        elements: Vec<Option<Element>>,
        in_water: Vec<bool>,
    }

    impl Setup {
        fn new(record: &TopologyRecord) -> Self {
            let topology = Topology::from_record(record);
            Self {
                resolved: ParameterTableResolver::new(record).resolve().unwrap(),
                masses: record.atoms.iter().map(|a| a.mass).collect(),
                elements: topology.atoms.iter().map(|a| a.element).collect(),
                in_water: topology.water_atoms(),
            }
        }

        fn run(&self, resolver: ConstraintResolver) -> ConstraintOutput {
            let facts = AtomFacts {
                masses: &self.masses,
                elements: &self.elements,
                in_water: &self.in_water,
            };
            resolver.resolve(&self.resolved.bonds, &self.resolved.angles, &facts)
        }
    }

    fn fixture_setup() -> Setup {
        Setup::new(&Fixture::default().record())
    }

    #[test]
    fn no_policy_with_rigid_water_constrains_only_water() {
        let out = fixture_setup().run(ConstraintResolver::new(ConstraintPolicy::None, true, false));
        assert_eq!(out.constraints.len(), 3);
        assert!(out.constraints.contains(7, 8));
        assert_eq!(out.bonds.len(), 5);
        assert_eq!(out.angles.len(), 7);
    }

    #[test]
    fn no_policy_without_rigid_water_constrains_nothing() {
        let out = fixture_setup().run(ConstraintResolver::new(ConstraintPolicy::None, false, false));
        assert!(out.constraints.is_empty());
        assert_eq!(out.bonds.len(), 8);
    }

    #[test]
    fn hbonds_constrains_hydrogen_section_bonds() {
        let out = fixture_setup().run(ConstraintResolver::new(ConstraintPolicy::HBonds, false, false));
        assert_eq!(out.constraints.len(), 7);
        assert_eq!(out.bonds.len(), 1);
        assert_eq!(out.bonds[0].atoms, [0, 4]);
        assert!((out.constraints.distance(0, 1).unwrap() - 0.109).abs() < 1e-9);
    }

    #[test]
    fn all_bonds_constrains_every_bond_and_keeps_angles() {
        let out = fixture_setup().run(ConstraintResolver::new(ConstraintPolicy::AllBonds, true, false));
        assert_eq!(out.constraints.len(), 8);
        assert!(out.bonds.is_empty());
        assert_eq!(out.angles.len(), 7);
    }

    #[test]
    fn hangles_constrains_hxh_and_hox_angles() {
        let out = fixture_setup().run(ConstraintResolver::new(ConstraintPolicy::HAngles, true, false));
        assert_eq!(out.constraints.len(), 8 + 4);
        assert_eq!(out.angles.len(), 3);

        let l = 0.109;
        let expected = (2.0 * l * l * (1.0 - 109.5f64.to_radians().cos())).sqrt();
        let hch = out.constraints.distance(1, 2).unwrap();
        assert!((hch - expected).abs() < 1e-9);

        let (l1, l2) = (0.141, 0.09572);
        let theta = 108.5f64.to_radians();
        let expected = (l1 * l1 + l2 * l2 - 2.0 * l1 * l2 * theta.cos()).sqrt();
        assert!((out.constraints.distance(0, 5).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn constrained_and_remaining_partition_the_input() {
        let setup = fixture_setup();
        for policy in [
            ConstraintPolicy::None,
            ConstraintPolicy::HBonds,
            ConstraintPolicy::AllBonds,
            ConstraintPolicy::HAngles,
        ] {
            let out = setup.run(ConstraintResolver::new(policy, true, false));
            let angle_constraints = if policy == ConstraintPolicy::HAngles { 4 } else { 0 };
            assert_eq!(
                out.constraints.len() - angle_constraints + out.bonds.len(),
                setup.resolved.bonds.len(),
                "{policy}"
            );
            assert_eq!(out.angles.len() + angle_constraints, setup.resolved.angles.len());
        }
    }

    #[test]
    fn massless_particles_are_never_constrained() {
        let mut record = Fixture::default().record();
        record.atoms[5].mass = 0.0;
        let out = Setup::new(&record).run(ConstraintResolver::new(ConstraintPolicy::HBonds, true, false));
        assert_eq!(out.constraints.len(), 6);
        assert!(!out.constraints.contains(4, 5));
        assert_eq!(out.bonds.len(), 2);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].massless_atom, 5);
        assert_eq!(out.skipped[0].kind, "bond");
    }

    #[test]
    fn massless_hydrogen_keeps_its_angles_harmonic() {
        let mut setup = fixture_setup();
        setup.masses[2] = 0.0;
        let out = setup.run(ConstraintResolver::new(ConstraintPolicy::HAngles, true, false));

        let kinds: Vec<_> = out.skipped.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec!["bond", "angle", "angle"]);
        assert!(out.skipped.iter().all(|e| e.massless_atom == 2));
        assert_eq!(out.skipped[1].atoms, vec![1, 0, 2]);
        assert_eq!(out.skipped[2].atoms, vec![2, 0, 3]);

        assert!(!out.constraints.contains(1, 2));
        assert!(!out.constraints.contains(2, 3));
        assert!(out.constraints.contains(1, 3));
        assert_eq!(out.constraints.len(), 7 + 2);
        let harmonic: Vec<_> = out.angles.iter().map(|a| a.atoms).collect();
        assert!(harmonic.contains(&[1, 0, 2]));
        assert!(harmonic.contains(&[2, 0, 3]));
        assert_eq!(out.angles.len(), 5);
    }

    #[test]
    fn hangles_without_a_constrained_side_bond_stay_harmonic() {
        let mut record = Fixture::default().record();
        record.bonds.retain(|b| b.atoms != [0, 1] && b.atoms != [1, 0]);
        let out = Setup::new(&record).run(ConstraintResolver::new(ConstraintPolicy::HAngles, true, false));

        assert!(out.skipped.is_empty());
        assert!(!out.constraints.contains(1, 2));
        assert!(!out.constraints.contains(1, 3));
        assert!(out.constraints.contains(2, 3));
        assert!(out.constraints.contains(0, 5));
        assert_eq!(out.constraints.len(), 7 + 2);
        assert_eq!(out.angles.len(), 5);
    }

    #[test]
    fn flexible_mode_keeps_constrained_terms() {
        let out = fixture_setup().run(ConstraintResolver::new(ConstraintPolicy::HAngles, true, true));
        assert_eq!(out.constraints.len(), 12);
        assert_eq!(out.bonds.len(), 8);
        assert_eq!(out.angles.len(), 7);
    }

    #[test]
    fn policy_parses_common_spellings() {
        assert_eq!("HBonds".parse::<ConstraintPolicy>(), Ok(ConstraintPolicy::HBonds));
        assert_eq!("all-bonds".parse::<ConstraintPolicy>(), Ok(ConstraintPolicy::AllBonds));
        assert_eq!("h_angles".parse::<ConstraintPolicy>(), Ok(ConstraintPolicy::HAngles));
        assert!("rigid".parse::<ConstraintPolicy>().is_err());
        assert_eq!(ConstraintPolicy::HAngles.to_string(), "h-angles");
    }
}
