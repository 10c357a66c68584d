//! Step results and the execution trace

use action_locator::SelectorCandidate;
use action_primitives::{ToolCall, ToolOutput};
use agent_core::PlanStep;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracecraft_core_types::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Never attempted because the run stopped first.
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A single attempt failed in a way worth retrying. Recorded per attempt;
    /// a step whose retries run out ends as `AllCandidatesFailed`.
    TransientActionFailure,
    /// No usable selector candidate exists for the target.
    Unresolvable,
    /// Every candidate was tried and failed.
    AllCandidatesFailed,
    /// The browser session is gone.
    SessionFatal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientActionFailure => "TransientActionFailure",
            ErrorKind::Unresolvable => "Unresolvable",
            ErrorKind::AllCandidatesFailed => "AllCandidatesFailed",
            ErrorKind::SessionFatal => "SessionFatal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub attempt: u32,
    pub error: String,
    pub transient: bool,
}

/// Outcome of executing one plan step. Created exactly once per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step: PlanStep,
    pub status: StepStatus,
    #[serde(default)]
    pub attempted_candidates: Vec<SelectorCandidate>,
    #[serde(default)]
    pub rejected_candidates: Vec<SelectorCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_candidate: Option<SelectorCandidate>,
    /// Call that succeeded, or the last one issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_data: Option<ToolOutput>,
    pub duration_ms: u64,
}

impl StepResult {
    /// Fresh, not yet successful result for `step`.
    pub fn new(step: &PlanStep) -> Self {
        Self {
            step: step.clone(),
            status: StepStatus::Failed,
            attempted_candidates: Vec::new(),
            rejected_candidates: Vec::new(),
            chosen_candidate: None,
            tool_call: None,
            error_kind: None,
            error: None,
            attempts: Vec::new(),
            returned_data: None,
            duration_ms: 0,
        }
    }

    pub fn skipped(step: &PlanStep, reason: impl Into<String>) -> Self {
        let mut result = Self::new(step);
        result.status = StepStatus::Skipped;
        result.error = Some(reason.into());
        result
    }

    pub fn failed(step: &PlanStep, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self::new(step).with_failure(kind, error)
    }

    pub fn with_failure(mut self, kind: ErrorKind, error: impl Into<String>) -> Self {
        self.mark_failed(kind, error);
        self
    }

    pub fn with_success(mut self, call: ToolCall, output: ToolOutput) -> Self {
        self.mark_succeeded(call, output);
        self
    }

    pub fn mark_failed(&mut self, kind: ErrorKind, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error_kind = Some(kind);
        self.error = Some(error.into());
    }

    pub fn mark_succeeded(&mut self, call: ToolCall, output: ToolOutput) {
        self.status = StepStatus::Succeeded;
        self.tool_call = Some(call);
        self.returned_data = Some(output);
        self.error_kind = None;
        self.error = None;
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    pub fn is_skipped(&self) -> bool {
        self.status == StepStatus::Skipped
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.len() + usize::from(self.succeeded())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Every step was attempted; some non-critical ones may have failed.
    Completed,
    CriticalFailure,
    Aborted,
    SessionFatal,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CriticalFailure => "criticalFailure",
            RunStatus::Aborted => "aborted",
            RunStatus::SessionFatal => "sessionFatal",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen record of a run, in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    run_id: RunId,
    instruction: String,
    #[serde(default)]
    reasoning: String,
    timestamp: DateTime<Utc>,
    status: RunStatus,
    results: Vec<StepResult>,
}

impl ExecutionTrace {
    /// Assemble a trace from stored parts (e.g. a re-imported export).
    pub fn from_parts(
        run_id: RunId,
        instruction: impl Into<String>,
        reasoning: impl Into<String>,
        timestamp: DateTime<Utc>,
        status: RunStatus,
        results: Vec<StepResult>,
    ) -> Self {
        Self {
            run_id,
            instruction: instruction.into(),
            reasoning: reasoning.into(),
            timestamp,
            status,
            results,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    /// Completed with every step succeeded.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && self.results.iter().all(StepResult::succeeded)
    }
}

/// Append-only builder used while a run is in progress.
#[derive(Debug)]
pub struct TraceBuilder {
    run_id: RunId,
    instruction: String,
    reasoning: String,
    timestamp: DateTime<Utc>,
    results: Vec<StepResult>,
}

impl TraceBuilder {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            instruction: instruction.into(),
            reasoning: String::new(),
            timestamp: Utc::now(),
            results: Vec::new(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn push(&mut self, result: StepResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn finish(self, status: RunStatus) -> ExecutionTrace {
        ExecutionTrace {
            run_id: self.run_id,
            instruction: self.instruction,
            reasoning: self.reasoning,
            timestamp: self.timestamp,
            status,
            results: self.results,
        }
    }
}
