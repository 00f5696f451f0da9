use super::tables::{
    GBN_DEFAULT_SCREEN, GBN_SCREEN, GBN2_DEFAULT, GBN2_NUCLEIC, GBN2_PROTEIN, is_nucleic_residue,
};
use super::{
    GbAtom, GbEnvironment, GbModel, GbParticle, GbStrategy, GeneralizedBornTerm,
    PROBE_RADIUS,
};
use crate::core::forcefield::error::InvalidParameterError;

const DEFAULT_OFFSET: f64 = 0.009;
const GBN2_OFFSET: f64 = 0.0195141;
const NECK_CUTOFF: f64 = 0.68;

const RADIUS_RANGE: (f64, f64) = (0.1, 0.2);
const SCREEN_RANGE: (f64, f64) = (-1.0, 2.0);

/// Model-wide constants written into the finished term.
#[derive(Debug, Clone, Copy, Default)]
struct ModelConstants {
    offset: f64,
    alpha: Option<f64>,
    beta: Option<f64>,
    gamma: Option<f64>,
    neck_scale: Option<f64>,
    neck_cutoff: Option<f64>,
}

fn finish_term<S: GbStrategy>(
    strategy: &S,
    constants: ModelConstants,
    particles: Vec<GbParticle>,
    environment: &GbEnvironment,
) -> GeneralizedBornTerm {
    GeneralizedBornTerm {
        model: strategy.model(),
        formulation: strategy.formulation(),
        method: environment.cutoff_treatment,
        cutoff: environment.cutoff,
        solute_dielectric: environment.solute_dielectric,
        solvent_dielectric: environment.solvent_dielectric,
        kappa: environment.kappa,
        surface_area_energy: strategy.surface_area_energy(environment.surface_area),
        probe_radius: PROBE_RADIUS,
        offset: constants.offset,
        alpha: constants.alpha,
        beta: constants.beta,
        gamma: constants.gamma,
        neck_scale: constants.neck_scale,
        neck_cutoff: constants.neck_cutoff,
        particles,
    }
}

fn check_bounds(model: GbModel, atom: &GbAtom) -> Result<(), InvalidParameterError> {
    let (lo, hi) = RADIUS_RANGE;
    if !(lo..=hi).contains(&atom.radius) {
        return Err(InvalidParameterError::new(
            "radius",
            format!(
                "{} nm is outside the range [{lo}, {hi}] supported by {model}",
                atom.radius
            ),
        ));
    }
    let (lo, hi) = SCREEN_RANGE;
    if !(lo..=hi).contains(&atom.screen) {
        return Err(InvalidParameterError::new(
            "screen",
            format!(
                "{} is outside the range [{lo}, {hi}] supported by {model}",
                atom.screen
            ),
        ));
    }
    Ok(())
}

fn element_symbol(atom: &GbAtom) -> &'static str {
    atom.element.map(|e| e.symbol()).unwrap_or("")
}

/// Pass-through registration shared by HCT and both OBC variants.
macro_rules! plain_strategy {
    ($name:ident, $model:expr, $constants:expr) => {
        #[derive(Debug, Default)]
        pub struct $name {
            particles: Vec<GbParticle>,
        }

        impl GbStrategy for $name {
            fn model(&self) -> GbModel {
                $model
            }

            fn register_particle(&mut self, atom: &GbAtom) -> Result<(), InvalidParameterError> {
                self.particles
                    .push(GbParticle::new(atom.charge, atom.radius, atom.screen));
                Ok(())
            }

            fn finish(&mut self, environment: &GbEnvironment) -> GeneralizedBornTerm {
                let particles = std::mem::take(&mut self.particles);
                finish_term(&*self, $constants, particles, environment)
            }
        }
    };
}

plain_strategy!(
    HctStrategy,
    GbModel::Hct,
    ModelConstants {
        offset: DEFAULT_OFFSET,
        ..ModelConstants::default()
    }
);

plain_strategy!(
    Obc1Strategy,
    GbModel::Obc1,
    ModelConstants {
        offset: DEFAULT_OFFSET,
        alpha: Some(0.8),
        beta: Some(0.0),
        gamma: Some(2.909125),
        ..ModelConstants::default()
    }
);

plain_strategy!(
    Obc2Strategy,
    GbModel::Obc2,
    ModelConstants {
        offset: DEFAULT_OFFSET,
        alpha: Some(1.0),
        beta: Some(0.8),
        gamma: Some(4.85),
        ..ModelConstants::default()
    }
);

/// GBn: element-specific screening with a neck correction.
#[derive(Debug, Default)]
pub struct GbnStrategy {
    particles: Vec<GbParticle>,
}

impl GbStrategy for GbnStrategy {
    fn model(&self) -> GbModel {
        GbModel::Gbn
    }

    fn register_particle(&mut self, atom: &GbAtom) -> Result<(), InvalidParameterError> {
        check_bounds(GbModel::Gbn, atom)?;
        let screen = GBN_SCREEN
            .get(element_symbol(atom))
            .copied()
            .unwrap_or(GBN_DEFAULT_SCREEN);
        self.particles
            .push(GbParticle::new(atom.charge, atom.radius, screen));
        Ok(())
    }

    fn finish(&mut self, environment: &GbEnvironment) -> GeneralizedBornTerm {
        let constants = ModelConstants {
            offset: DEFAULT_OFFSET,
            alpha: Some(1.09511284),
            beta: Some(1.907992938),
            gamma: Some(2.50798245),
            neck_scale: Some(0.361825),
            neck_cutoff: Some(NECK_CUTOFF),
        };
        let particles = std::mem::take(&mut self.particles);
        finish_term(&*self, constants, particles, environment)
    }
}

/// GBn2: per-particle screen and rescaling constants, with separate tables
/// for protein and nucleic-acid residues.
#[derive(Debug, Default)]
pub struct Gbn2Strategy {
    particles: Vec<GbParticle>,
}

impl GbStrategy for Gbn2Strategy {
    fn model(&self) -> GbModel {
        GbModel::Gbn2
    }

    fn register_particle(&mut self, atom: &GbAtom) -> Result<(), InvalidParameterError> {
        check_bounds(GbModel::Gbn2, atom)?;
        let table = if is_nucleic_residue(atom.residue_name) {
            &GBN2_NUCLEIC
        } else {
            &GBN2_PROTEIN
        };
        let params = table
            .get(element_symbol(atom))
            .copied()
            .unwrap_or(GBN2_DEFAULT);
        self.particles.push(GbParticle {
            charge: atom.charge,
            radius: atom.radius,
            screen: params.screen,
            alpha: Some(params.alpha),
            beta: Some(params.beta),
            gamma: Some(params.gamma),
        });
        Ok(())
    }

    fn finish(&mut self, environment: &GbEnvironment) -> GeneralizedBornTerm {
        let constants = ModelConstants {
            offset: GBN2_OFFSET,
            neck_scale: Some(0.826836),
            neck_cutoff: Some(NECK_CUTOFF),
            ..ModelConstants::default()
        };
        let particles = std::mem::take(&mut self.particles);
        finish_term(&*self, constants, particles, environment)
    }
}
