//! JSON export of an execution trace, and its re-import.
//!
//! The export is the programmatic counterpart of the script: every planned
//! step appears in order with its tool call, outcome and selector history.
//! It carries the whole trace, so re-importing it and compiling again yields
//! the same artifacts byte for byte.

use action_flow::{AttemptRecord, ErrorKind, ExecutionTrace, RunStatus, StepResult, StepStatus};
use action_locator::SelectorCandidate;
use action_primitives::{ToolCall, ToolOutput};
use agent_core::PlanStep;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracecraft_core_types::RunId;

use crate::errors::CompileError;

pub const EXPORT_FORMAT: &str = "tracecraft.trace/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceExport {
    pub instruction: String,
    #[serde(default)]
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub status: RunStatus,
    pub steps: Vec<ExportedStep>,
    #[serde(default)]
    pub usage_notes: UsageNotes,
}

/// One step of the export. The plan step's own fields are flattened in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedStep {
    pub index: usize,
    #[serde(flatten)]
    pub step: PlanStep,
    pub tool: Option<String>,
    #[serde(default)]
    pub arguments: Value,
    pub executed: bool,
    pub success: bool,
    pub status: StepStatus,
    pub result: Option<ToolOutput>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    /// Expression of the chosen candidate, repeated for convenience.
    pub selector: Option<String>,
    pub chosen_candidate: Option<SelectorCandidate>,
    #[serde(default)]
    pub attempted_candidates: Vec<SelectorCandidate>,
    #[serde(default)]
    pub rejected_candidates: Vec<SelectorCandidate>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    pub duration_ms: u64,
}

/// Fixed guidance embedded in every export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageNotes {
    pub format: String,
    pub replay: String,
    pub selectors: String,
    pub statuses: String,
}

impl Default for UsageNotes {
    fn default() -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            replay: "Re-dispatch each step with success=true using its tool and arguments, in index order. \
                     String arguments may contain {{key}} placeholders to substitute before replay."
                .to_string(),
            selectors: "Selectors are only emitted for successful element steps. LOW tier selectors \
                        with ambiguity risk should be narrowed to the first match; REJECTED selectors \
                        are never replayable."
                .to_string(),
            statuses: "status is succeeded, failed or skipped. Skipped steps were never attempted \
                       because the run stopped earlier (critical failure, lost session or cancellation)."
                .to_string(),
        }
    }
}

impl ExportedStep {
    fn from_result(index: usize, result: &StepResult) -> Self {
        Self {
            index,
            step: result.step.clone(),
            tool: result.tool_call.as_ref().map(|call| call.name().to_string()),
            arguments: result
                .tool_call
                .as_ref()
                .map(ToolCall::arguments)
                .unwrap_or(Value::Null),
            executed: result.status != StepStatus::Skipped,
            success: result.succeeded(),
            status: result.status,
            result: result.returned_data.clone(),
            error_kind: result.error_kind,
            error: result.error.clone(),
            selector: result
                .chosen_candidate
                .as_ref()
                .map(|candidate| candidate.expression.clone()),
            chosen_candidate: result.chosen_candidate.clone(),
            attempted_candidates: result.attempted_candidates.clone(),
            rejected_candidates: result.rejected_candidates.clone(),
            attempts: result.attempts.clone(),
            duration_ms: result.duration_ms,
        }
    }

    fn into_result(self) -> Result<StepResult, CompileError> {
        let tool_call = match self.tool {
            Some(tool) => Some(ToolCall::from_parts(&tool, self.arguments).map_err(|err| {
                CompileError::InvalidToolCall {
                    index: self.index,
                    tool: tool.clone(),
                    reason: err.to_string(),
                }
            })?),
            None => None,
        };
        let mut result = StepResult::new(&self.step);
        result.status = self.status;
        result.attempted_candidates = self.attempted_candidates;
        result.rejected_candidates = self.rejected_candidates;
        result.chosen_candidate = self.chosen_candidate;
        result.tool_call = tool_call;
        result.error_kind = self.error_kind;
        result.error = self.error;
        result.attempts = self.attempts;
        result.returned_data = self.result;
        result.duration_ms = self.duration_ms;
        Ok(result)
    }
}

/// Export view of `trace`. Step indexes are 1-based.
pub fn export_trace(trace: &ExecutionTrace) -> TraceExport {
    TraceExport {
        instruction: trace.instruction().to_string(),
        reasoning: trace.reasoning().to_string(),
        timestamp: trace.timestamp(),
        run_id: trace.run_id().clone(),
        status: trace.status(),
        steps: trace
            .results()
            .iter()
            .enumerate()
            .map(|(position, result)| ExportedStep::from_result(position + 1, result))
            .collect(),
        usage_notes: UsageNotes::default(),
    }
}

/// Rebuild the trace an export was produced from.
pub fn trace_from_export(export: TraceExport) -> Result<ExecutionTrace, CompileError> {
    let mut results = Vec::with_capacity(export.steps.len());
    for (position, step) in export.steps.into_iter().enumerate() {
        if step.index != position + 1 {
            return Err(CompileError::StepOrder {
                position: position + 1,
                index: step.index,
            });
        }
        results.push(step.into_result()?);
    }
    Ok(ExecutionTrace::from_parts(
        export.run_id,
        export.instruction,
        export.reasoning,
        export.timestamp,
        export.status,
        results,
    ))
}

pub fn trace_from_export_value(value: &Value) -> Result<ExecutionTrace, CompileError> {
    let export: TraceExport = serde_json::from_value(value.clone())?;
    trace_from_export(export)
}

pub fn trace_from_export_str(raw: &str) -> Result<ExecutionTrace, CompileError> {
    let export: TraceExport = serde_json::from_str(raw)?;
    trace_from_export(export)
}
