use phf::{Map, Set, phf_map, phf_set};

/// GBn screening factors by element symbol.
pub static GBN_SCREEN: Map<&'static str, f64> = phf_map! {
    "C" => 0.48435382330,
    "H" => 1.09085413633,
    "N" => 0.700147318409,
    "O" => 1.06557401132,
    "S" => 0.602256336067,
};

pub const GBN_DEFAULT_SCREEN: f64 = 0.5;

/// GBn2 per-element parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gbn2Params {
    pub screen: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

const fn gbn2(screen: f64, alpha: f64, beta: f64, gamma: f64) -> Gbn2Params {
    Gbn2Params {
        screen,
        alpha,
        beta,
        gamma,
    }
}

pub const GBN2_DEFAULT: Gbn2Params = gbn2(0.5, 1.0, 0.8, 4.85);

pub static GBN2_PROTEIN: Map<&'static str, Gbn2Params> = phf_map! {
    "H" => gbn2(1.425952, 0.788440, 0.798699, 0.437334),
    "C" => gbn2(1.058554, 0.733756, 0.506378, 0.205844),
    "N" => gbn2(0.733599, 0.503364, 0.316828, 0.192915),
    "O" => gbn2(1.061039, 0.867814, 0.876635, 0.387882),
    "S" => gbn2(-0.703469, 0.867814, 0.876635, 0.387882),
};

pub static GBN2_NUCLEIC: Map<&'static str, Gbn2Params> = phf_map! {
    "H" => gbn2(1.696538, 0.537050, 0.362861, 0.116704),
    "C" => gbn2(1.268902, 0.331670, 0.196842, 0.093422),
    "N" => gbn2(1.4259728, 0.686311, 0.463189, 0.138722),
    "O" => gbn2(0.1840098, 0.606344, 0.463006, 0.142262),
    "P" => gbn2(1.5450597, 0.418365, 0.290054, 0.1064245),
};

/// Residue names that take the nucleic-acid GBn2 parameters.
pub static NUCLEIC_RESIDUES: Set<&'static str> = phf_set! {
    "A", "C", "G", "U", "T",
    "A3", "A5", "AN", "C3", "C5", "CN", "G3", "G5", "GN", "U3", "U5", "UN",
    "RA", "RC", "RG", "RU", "RA3", "RA5", "RC3", "RC5", "RG3", "RG5", "RU3", "RU5",
    "DA", "DC", "DG", "DT", "DU",
    "DA3", "DA5", "DAN", "DC3", "DC5", "DCN", "DG3", "DG5", "DGN", "DT3", "DT5", "DTN",
};

pub fn is_nucleic_residue(name: &str) -> bool {
    NUCLEIC_RESIDUES.contains(name.trim())
}
