use thiserror::Error;

use crate::core::forcefield::error::InvalidParameterError;
use crate::core::forcefield::params::UnresolvedTypeIndexError;
use crate::core::io::inpcrd::InpcrdError;
use crate::core::io::prmtop::PrmtopError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to read topology: {source}")]
    Prmtop {
        #[from]
        source: PrmtopError,
    },

    #[error("Failed to read coordinates: {source}")]
    Inpcrd {
        #[from]
        source: InpcrdError,
    },

    #[error("Parameter table lookup failed: {source}")]
    UnresolvedTypeIndex {
        #[from]
        source: UnresolvedTypeIndexError,
    },

    #[error("{source}")]
    InvalidParameter {
        #[from]
        source: InvalidParameterError,
    },
}
