//! # Core Models Module
//!
//! Data structures shared by the readers and the system builder.
//!
//! - [`record`] - The validated, file-unit view of a parameter-topology file
//! - [`element`] - Chemical elements and their identification from mass
//! - [`topology`] - The companion chemical topology (atoms, residues, bonds)
//! - [`system`] - The compiled [`InteractionSystem`](system::InteractionSystem)
//!   and its constraint set and box vectors

pub mod element;
pub mod record;
pub mod system;
pub mod topology;
