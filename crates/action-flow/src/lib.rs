//! Step execution and run orchestration
//!
//! Turns a validated [`agent_core::ExecutionPlan`] into an [`ExecutionTrace`]:
//! each step is resolved to selector candidates, executed with candidate
//! fallback and bounded retry, and appended to the trace in plan order.

pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod strategies;
pub mod types;

pub use errors::FlowError;
pub use executor::{build_tool_call, DefaultStepExecutor, StepExecutor};
pub use orchestrator::RunOrchestrator;
pub use strategies::RetryPolicy;
pub use types::{
    AttemptRecord, ErrorKind, ExecutionTrace, RunStatus, StepResult, StepStatus, TraceBuilder,
};
pub use tokio_util::sync::CancellationToken;
