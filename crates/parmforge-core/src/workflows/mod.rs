//! # Workflows Module
//!
//! High-level entry points that run a complete compilation.
//!
//! ## Architecture
//!
//! - **Build Workflow** ([`build`]) - Parameter resolution, mass repartitioning, box
//!   geometry, constraint selection and force-term assembly, in that order,
//!   producing an [`InteractionSystem`](crate::core::models::system::InteractionSystem)
//!   and its companion [`Topology`](crate::core::models::topology::Topology).

pub mod build;
