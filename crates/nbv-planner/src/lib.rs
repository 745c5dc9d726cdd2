#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Seed poses for the optimizer.
pub mod candidates;

/// Configuration of the planner.
pub mod config;

/// Render-backed cost evaluation of candidate poses.
pub mod cost;

/// Error types for the planner.
pub mod error;

/// Per-face geometry and observation baseline.
pub mod geometry;

/// Per-face viewing metrics and cost terms.
pub mod metrics;

/// Bounded finite-difference gradient descent.
pub mod optim;

mod planner;
pub use planner::*;

/// Visible face extraction from face id buffers.
pub mod visibility;

pub use config::{CoveragePolicy, PlannerConfig};
pub use error::{InitializationError, PlannerError};
pub use optim::{DescentResult, OptimizerSettings, PoseOptimizer, TerminationReason};
