//! Simulation and tooling harness for sketchzone.
//!
//! This crate provides:
//! - Structured logging: canonical JSONL events for every safe-zone decision
//! - Monitoring simulation: baseline sketch, reference margins, per-site
//!   epochs of perturbed sketches, admissibility vs. certification tallies
//! - Error types shared by the CLI

#![forbid(unsafe_code)]

pub mod error;
pub mod simulation;
pub mod structured_log;

pub use error::HarnessError;
pub use simulation::{Bound, SimulationConfig, SimulationReport, run_simulation};
