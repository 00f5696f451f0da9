//! Conversion factors from AMBER file units (Å, kcal/mol, degrees, scaled
//! charge) to the units of every emitted quantity (nm, kJ/mol, rad, e).

/// Prmtop charges are stored multiplied by this factor (sqrt of the Coulomb
/// constant in kcal·Å/(mol·e²)).
pub const AMBER_CHARGE_FACTOR: f64 = 18.2223;

pub const KCAL_TO_KJ: f64 = 4.184;

pub const ANGSTROM_TO_NM: f64 = 0.1;

#[inline]
pub fn bond_force_constant(k_kcal_per_a2: f64) -> f64 {
    // AMBER writes k(r - r0)^2, harmonic terms here use (k/2)(r - r0)^2.
    2.0 * k_kcal_per_a2 * KCAL_TO_KJ / (ANGSTROM_TO_NM * ANGSTROM_TO_NM)
}

#[inline]
pub fn angle_force_constant(k_kcal_per_rad2: f64) -> f64 {
    2.0 * k_kcal_per_rad2 * KCAL_TO_KJ
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bond_force_constant_doubles_and_rescales() {
        let k = bond_force_constant(340.0);
        assert!((k - 2.0 * 340.0 * 4.184 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn angle_force_constant_doubles_energy_only() {
        assert!((angle_force_constant(50.0) - 418.4).abs() < 1e-12);
    }
}
