//! Compiler error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Export document could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export step carries a tool call that does not exist
    #[error("step {index}: invalid tool call '{tool}': {reason}")]
    InvalidToolCall {
        index: usize,
        tool: String,
        reason: String,
    },

    /// Export steps are out of order or missing
    #[error("export step at position {position} has index {index}")]
    StepOrder { position: usize, index: usize },
}
