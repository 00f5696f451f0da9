use serde::Serialize;

/// Chemical elements that occur in biomolecular AMBER and CHARMM topologies.
///
/// Only the elements needed to classify atoms (hydrogen detection, GB screening
/// tables, water recognition) are enumerated. Anything else is carried as
/// [`Element::Other`] with its atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Element {
    H,
    Li,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    P,
    S,
    Cl,
    K,
    Ca,
    Fe,
    Zn,
    Br,
    I,
    Other(u8),
}

const KNOWN: &[(Element, u8, &str, f64)] = &[
    (Element::H, 1, "H", 1.008),
    (Element::Li, 3, "Li", 6.94),
    (Element::C, 6, "C", 12.011),
    (Element::N, 7, "N", 14.007),
    (Element::O, 8, "O", 15.999),
    (Element::F, 9, "F", 18.998),
    (Element::Na, 11, "Na", 22.990),
    (Element::Mg, 12, "Mg", 24.305),
    (Element::P, 15, "P", 30.974),
    (Element::S, 16, "S", 32.06),
    (Element::Cl, 17, "Cl", 35.45),
    (Element::K, 19, "K", 39.098),
    (Element::Ca, 20, "Ca", 40.078),
    (Element::Fe, 26, "Fe", 55.845),
    (Element::Zn, 30, "Zn", 65.38),
    (Element::Br, 35, "Br", 79.904),
    (Element::I, 53, "I", 126.904),
];

/// Largest mass difference (dalton) accepted when guessing an element from mass.
const MASS_GUESS_TOLERANCE: f64 = 1.0;

impl Element {
    pub fn from_atomic_number(number: u8) -> Option<Self> {
        if number == 0 {
            return None;
        }
        Some(
            KNOWN
                .iter()
                .find(|(_, z, _, _)| *z == number)
                .map(|(e, _, _, _)| *e)
                .unwrap_or(Element::Other(number)),
        )
    }

    /// Guesses an element from an atomic mass.
    ///
    /// Picks the closest tabulated element; masses of repartitioned hydrogens
    /// (up to about 4 Da) are still recognized as hydrogen. Returns `None` for
    /// massless particles and for masses that match nothing.
    pub fn guess_from_mass(mass: f64) -> Option<Self> {
        if mass <= 0.0 {
            return None;
        }
        if mass < 4.5 {
            return Some(Element::H);
        }
        KNOWN
            .iter()
            .map(|(e, _, _, m)| (*e, (m - mass).abs()))
            .filter(|(_, diff)| *diff <= MASS_GUESS_TOLERANCE)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, _)| e)
    }

    pub fn atomic_number(&self) -> u8 {
        match self {
            Element::Other(z) => *z,
            known => KNOWN
                .iter()
                .find(|(e, _, _, _)| e == known)
                .map(|(_, z, _, _)| *z)
                .unwrap_or(0),
        }
    }

    pub fn symbol(&self) -> &'static str {
        KNOWN
            .iter()
            .find(|(e, _, _, _)| e == self)
            .map(|(_, _, s, _)| *s)
            .unwrap_or("X")
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self, Element::H)
    }
}
