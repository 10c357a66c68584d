use thiserror::Error;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Raised when an instruction is empty or otherwise unusable.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),

    /// Raised when a plan document cannot be decoded.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Raised when a planner cannot produce a plan.
    #[error("planner failed: {0}")]
    Planner(String),

    #[error("failed to read plan: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan(message.into())
    }

    pub fn planner(message: impl Into<String>) -> Self {
        Self::Planner(message.into())
    }
}
