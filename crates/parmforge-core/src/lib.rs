//! # parmforge Core Library
//!
//! Compiles AMBER `prmtop` topologies (including CHARMM topologies converted by
//! Chamber) into a self-contained, serializable
//! [`InteractionSystem`](core::models::system::InteractionSystem): per-particle
//! masses and charges, an ordered list of force terms, geometric constraints,
//! and optional periodic box vectors.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless file readers, data models, unit
//!   conversions, and the individual compilation stages (parameter resolution,
//!   constraint selection, nonbonded and implicit-solvent assembly).
//!
//! - **[`engine`]: The Support Layer.** Build options with validation,
//!   the unified error type, and progress reporting.
//!
//! - **[`workflows`]: The Public API.** [`workflows::build::run`] drives every
//!   stage in order and returns the assembled system together with its
//!   chemical topology.

pub mod core;
pub mod engine;
pub mod workflows;
