//! Readers for the AMBER file formats consumed by the system builder.
//!
//! The parameter-topology reader works in two passes: [`prmtop::SectionTable`]
//! collects the raw `%FLAG` sections according to their Fortran `%FORMAT`
//! descriptors, then [`prmtop::build_record`] interprets and validates them
//! into a [`TopologyRecord`](crate::core::models::record::TopologyRecord).

pub mod format;
pub mod inpcrd;
pub mod prmtop;
pub mod traits;

#[cfg(test)]
pub(crate) mod fixtures;
