//! # Core Module
//!
//! The fundamental building blocks of the topology compiler: file readers,
//! record and system models, force field compilation, and geometry utilities.
//!
//! ## Architecture
//!
//! - **File I/O** ([`io`]) - Sectioned `prmtop` parsing and `inpcrd` restart files
//! - **Data Models** ([`models`]) - Raw topology records, the chemical topology, and the compiled system
//! - **Force Field** ([`forcefield`]) - Parameter resolution, constraints, nonbonded and implicit-solvent terms
//! - **Utilities** ([`utils`]) - Periodic box geometry
//! - **Units** ([`units`]) - AMBER-to-internal unit conversions

pub mod forcefield;
pub mod io;
pub mod models;
pub mod units;
pub mod utils;
