//! # Engine Module
//!
//! Support layer shared by the compilation workflows.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - [`SystemOptions`](config::SystemOptions) and its builder, with range validation
//! - **Error Handling** ([`error`]) - [`BuildError`](error::BuildError), wrapping every fatal error of the pipeline
//! - **Progress Monitoring** ([`progress`]) - Callback-based phase and task reporting

pub mod config;
pub mod error;
pub mod progress;
