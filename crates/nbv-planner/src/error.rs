use nbv_3d::MeshError;
use nbv_render::RenderError;

use crate::planner::PlannerState;

/// Reasons the planner cannot be initialized.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InitializationError {
    /// The mesh is empty or malformed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// There is no camera to compute the observation baseline from.
    #[error("The scene has no reconstruction camera to use as reference")]
    NoReferenceCamera,
}

/// An error type for the planner.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlannerError {
    /// The planner could not be initialized; it stays uninitialized.
    #[error("Initialization failed: {0}")]
    Initialization(#[from] InitializationError),

    /// A render pass failed.
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    /// The operation is not allowed in the current state.
    #[error("Invalid planner state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        /// The state the operation needs.
        expected: PlannerState,
        /// The state the planner is in.
        actual: PlannerState,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<MeshError> for PlannerError {
    fn from(err: MeshError) -> Self {
        PlannerError::Initialization(err.into())
    }
}
