//! Local safe-zone monitoring primitives for distributed streams.
//!
//! Each monitoring site summarizes its local stream in a randomized AGMS
//! sketch and decides, without talking to a coordinator, whether the global
//! aggregate can possibly have crossed a threshold.
//!
//! # Architecture
//!
//! - **AGMS sketch** (`sketch`): hashed, signed linear projection of stream
//!   updates into a depth×width matrix with a fixed seed table
//! - **Quorum safe zone** (`safezone`): k-out-of-n certificate over a
//!   reference vector, raw or normalized ("eikonal") evaluation
//! - **Array operations** (`array_ops`): elementwise helpers and the
//!   median-of-rows self-join estimator
//! - **Configuration** (`config`): default evaluation mode control
//! - **Metrics** (`metrics`): atomic counters for observability

#![deny(unsafe_code)]

pub mod array_ops;
pub mod config;
pub mod metrics;
pub mod safezone;
pub mod sketch;

pub use config::EvaluationMode;
pub use metrics::{SafezoneMetrics, SketchMetrics};
pub use safezone::{PreparedReference, QuorumSafezone, SafezoneError, ZoneVerdict};
pub use sketch::{AgmsSketch, SeedTable};
