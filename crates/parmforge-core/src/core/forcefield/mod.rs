//! # Force Field Module
//!
//! Turns the raw parameter tables of a [`TopologyRecord`](crate::core::models::record::TopologyRecord)
//! into the force terms of an [`InteractionSystem`](crate::core::models::system::InteractionSystem).
//!
//! ## Overview
//!
//! Compilation happens in three stages, each owned by one submodule:
//!
//! - **Parameter resolution** ([`params`]) expands every bonded record through its
//!   type index, converts AMBER units to SI-style kJ/mol/nm, derives per-type
//!   Lennard-Jones particles, collects the unique 1-4 pairs, and detects NBFIX
//!   type pairs.
//! - **Constraint selection** ([`constraints`]) partitions bonds and angles into
//!   rigid constraints and remaining force terms according to a
//!   [`ConstraintPolicy`](constraints::ConstraintPolicy).
//! - **Nonbonded assembly** ([`nonbonded`]) and **implicit solvent** ([`implicit`])
//!   produce the long-range terms.
//!
//! ## Key Components
//!
//! - [`term`] - Serializable force-term containers and the [`ForceTerm`](term::ForceTerm) enum
//! - [`error`] - Errors raised for out-of-range derived values

pub mod constraints;
pub mod error;
pub mod implicit;
pub mod nonbonded;
pub mod params;
pub mod term;
