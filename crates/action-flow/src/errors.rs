//! Run-level error types

use agent_core::{AgentError, PlanValidationError};
use thiserror::Error;

/// Errors that stop a run before it produces a trace.
///
/// Step-level failures never surface here; they are recorded on the
/// [`crate::StepResult`] and the run carries on or stops according to the
/// step's criticality.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The plan was rejected as a whole; no browser work happened
    #[error(transparent)]
    PlanValidation(#[from] PlanValidationError),

    /// The planner could not produce a plan
    #[error("Planner error: {0}")]
    Planner(#[from] AgentError),
}
