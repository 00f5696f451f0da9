use super::implicit::GeneralizedBornTerm;
use super::nonbonded::{CustomNonbondedTerm, NonbondedTerm};
use serde::Serialize;
use std::fmt;

/// Identifies the kind of a [`ForceTerm`], in the order terms are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ForceKind {
    HarmonicBond,
    HarmonicAngle,
    UreyBradley,
    PeriodicTorsion,
    ImproperTorsion,
    CmapTorsion,
    Nonbonded,
    CustomNonbonded,
    GeneralizedBorn,
    CmMotionRemover,
}

impl fmt::Display for ForceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForceKind::HarmonicBond => "HarmonicBond",
            ForceKind::HarmonicAngle => "HarmonicAngle",
            ForceKind::UreyBradley => "UreyBradley",
            ForceKind::PeriodicTorsion => "PeriodicTorsion",
            ForceKind::ImproperTorsion => "ImproperTorsion",
            ForceKind::CmapTorsion => "CmapTorsion",
            ForceKind::Nonbonded => "Nonbonded",
            ForceKind::CustomNonbonded => "CustomNonbonded",
            ForceKind::GeneralizedBorn => "GeneralizedBorn",
            ForceKind::CmMotionRemover => "CmMotionRemover",
        };
        f.write_str(name)
    }
}

/// `E = k/2 (r - length)²`, with `length` in nm and `k` in kJ/mol/nm².
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HarmonicBond {
    pub atoms: [usize; 2],
    pub length: f64,
    pub k: f64,
}

/// `E = k/2 (θ - angle)²`, with `angle` in rad and `k` in kJ/mol/rad².
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HarmonicAngle {
    pub atoms: [usize; 3],
    pub angle: f64,
    pub k: f64,
}

/// `E = k (1 + cos(n φ - phase))`, with `k` in kJ/mol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodicTorsion {
    pub atoms: [usize; 4],
    pub periodicity: u32,
    pub phase: f64,
    pub k: f64,
}

/// Harmonic improper `E = k (φ - theta0)²`, with `k` in kJ/mol/rad².
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImproperTorsion {
    pub atoms: [usize; 4],
    pub theta0: f64,
    pub k: f64,
}

/// A CMAP energy grid in kJ/mol, `size × size` values with φ varying fastest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CmapMap {
    pub size: usize,
    pub energy: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CmapTorsion {
    pub map: usize,
    pub phi: [usize; 4],
    pub psi: [usize; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HarmonicBondTerm {
    pub bonds: Vec<HarmonicBond>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HarmonicAngleTerm {
    pub angles: Vec<HarmonicAngle>,
}

/// Urey–Bradley 1-3 springs, stored as harmonic bonds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UreyBradleyTerm {
    pub bonds: Vec<HarmonicBond>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodicTorsionTerm {
    pub torsions: Vec<PeriodicTorsion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImproperTorsionTerm {
    pub torsions: Vec<ImproperTorsion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CmapTorsionTerm {
    pub maps: Vec<CmapMap>,
    pub torsions: Vec<CmapTorsion>,
}

/// Removes center-of-mass motion every `frequency` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CmMotionRemover {
    pub frequency: u32,
}

impl Default for CmMotionRemover {
    fn default() -> Self {
        Self { frequency: 1 }
    }
}

/// One interaction term of an [`InteractionSystem`](crate::core::models::system::InteractionSystem).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ForceTerm {
    HarmonicBond(HarmonicBondTerm),
    HarmonicAngle(HarmonicAngleTerm),
    UreyBradley(UreyBradleyTerm),
    PeriodicTorsion(PeriodicTorsionTerm),
    ImproperTorsion(ImproperTorsionTerm),
    CmapTorsion(CmapTorsionTerm),
    Nonbonded(NonbondedTerm),
    CustomNonbonded(CustomNonbondedTerm),
    GeneralizedBorn(GeneralizedBornTerm),
    CmMotionRemover(CmMotionRemover),
}

impl ForceTerm {
    pub fn kind(&self) -> ForceKind {
        match self {
            ForceTerm::HarmonicBond(_) => ForceKind::HarmonicBond,
            ForceTerm::HarmonicAngle(_) => ForceKind::HarmonicAngle,
            ForceTerm::UreyBradley(_) => ForceKind::UreyBradley,
            ForceTerm::PeriodicTorsion(_) => ForceKind::PeriodicTorsion,
            ForceTerm::ImproperTorsion(_) => ForceKind::ImproperTorsion,
            ForceTerm::CmapTorsion(_) => ForceKind::CmapTorsion,
            ForceTerm::Nonbonded(_) => ForceKind::Nonbonded,
            ForceTerm::CustomNonbonded(_) => ForceKind::CustomNonbonded,
            ForceTerm::GeneralizedBorn(_) => ForceKind::GeneralizedBorn,
            ForceTerm::CmMotionRemover(_) => ForceKind::CmMotionRemover,
        }
    }

    /// Number of interactions (bonds, torsions, particles...) the term carries.
    pub fn len(&self) -> usize {
        match self {
            ForceTerm::HarmonicBond(t) => t.bonds.len(),
            ForceTerm::HarmonicAngle(t) => t.angles.len(),
            ForceTerm::UreyBradley(t) => t.bonds.len(),
            ForceTerm::PeriodicTorsion(t) => t.torsions.len(),
            ForceTerm::ImproperTorsion(t) => t.torsions.len(),
            ForceTerm::CmapTorsion(t) => t.torsions.len(),
            ForceTerm::Nonbonded(t) => t.particles.len(),
            ForceTerm::CustomNonbonded(t) => t.particle_types.len(),
            ForceTerm::GeneralizedBorn(t) => t.particles.len(),
            ForceTerm::CmMotionRemover(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
