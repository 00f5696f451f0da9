use crate::core::forcefield::term::{ForceKind, ForceTerm};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Periodic box vectors in nm, one row per vector (a, b, c).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxVectors(pub [[f64; 3]; 3]);

impl BoxVectors {
    pub fn to_vectors(&self) -> [Vector3<f64>; 3] {
        self.0.map(Vector3::from)
    }

    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.to_vectors();
        a.dot(&b.cross(&c)).abs()
    }
}

impl From<[Vector3<f64>; 3]> for BoxVectors {
    fn from(vectors: [Vector3<f64>; 3]) -> Self {
        Self(vectors.map(|v| [v.x, v.y, v.z]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Constraint {
    pub atoms: [usize; 2],
    /// nm
    pub distance: f64,
}

/// Distance constraints with at most one entry per unordered atom pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
    #[serde(skip)]
    index: HashMap<(usize, usize), usize>,
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint unless the pair is already constrained. Returns
    /// whether it was added.
    pub fn add(&mut self, a: usize, b: usize, distance: f64) -> bool {
        let key = pair_key(a, b);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.constraints.len());
        self.constraints.push(Constraint {
            atoms: [a, b],
            distance,
        });
        true
    }

    pub fn distance(&self, a: usize, b: usize) -> Option<f64> {
        self.index
            .get(&pair_key(a, b))
            .map(|&i| self.constraints[i].distance)
    }

    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.index.contains_key(&pair_key(a, b))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// The compiled interaction system: particles, force terms, constraints and box.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionSystem {
    /// Dalton.
    pub masses: Vec<f64>,
    /// Elementary charge, as written in the topology (before dielectric scaling).
    pub charges: Vec<f64>,
    pub forces: Vec<ForceTerm>,
    pub constraints: ConstraintSet,
    pub box_vectors: Option<BoxVectors>,
}

impl InteractionSystem {
    pub fn particle_count(&self) -> usize {
        self.masses.len()
    }

    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }

    pub fn force(&self, kind: ForceKind) -> Option<&ForceTerm> {
        self.forces.iter().find(|f| f.kind() == kind)
    }

    pub fn force_kinds(&self) -> Vec<ForceKind> {
        self.forces.iter().map(ForceTerm::kind).collect()
    }

    pub fn is_periodic(&self) -> bool {
        self.box_vectors.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_set_rejects_duplicate_unordered_pairs() {
        let mut set = ConstraintSet::new();
        assert!(set.add(1, 2, 0.1));
        assert!(!set.add(2, 1, 0.2));
        assert_eq!(set.len(), 1);
        assert_eq!(set.distance(2, 1), Some(0.1));
        assert!(set.contains(1, 2));
        assert!(!set.contains(1, 3));
    }

    #[test]
    fn box_vectors_convert_from_nalgebra_and_compute_volume() {
        let vectors = BoxVectors::from([
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 3.0, 0.0),
            Vector3::new(0.0, 0.0, 4.0),
        ]);
        assert_eq!(vectors.0[1], [0.0, 3.0, 0.0]);
        assert!((vectors.volume() - 24.0).abs() < 1e-12);
        assert_eq!(vectors.to_vectors()[2], Vector3::new(0.0, 0.0, 4.0));
    }

    #[test]
    fn empty_system_has_no_particles_or_forces() {
        let system = InteractionSystem::default();
        assert_eq!(system.particle_count(), 0);
        assert_eq!(system.total_mass(), 0.0);
        assert!(system.force(ForceKind::Nonbonded).is_none());
        assert!(!system.is_periodic());
    }
}
