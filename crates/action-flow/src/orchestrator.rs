//! Run orchestration: plan in, frozen trace out.

use std::sync::Arc;

use action_locator::{DefaultLocatorResolver, LocatorResolver, ResolvedCandidates};
use action_primitives::{BrowserSession, PageSnapshot, SessionFactory, SessionScope};
use agent_core::{ExecutionPlan, PlanStep, PlanValidator, Planner};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::FlowError;
use crate::executor::{DefaultStepExecutor, StepExecutor};
use crate::types::{ErrorKind, ExecutionTrace, RunStatus, StepResult, TraceBuilder};

/// Drives a plan step by step against one browser session.
pub struct RunOrchestrator {
    validator: PlanValidator,
    resolver: Arc<dyn LocatorResolver>,
    executor: Arc<dyn StepExecutor>,
    sessions: Arc<dyn SessionFactory>,
}

impl RunOrchestrator {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            validator: PlanValidator::default(),
            resolver: Arc::new(DefaultLocatorResolver::new()),
            executor: Arc::new(DefaultStepExecutor::default()),
            sessions,
        }
    }

    pub fn with_validator(mut self, validator: PlanValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn LocatorResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Ask `planner` for a plan, then run it.
    pub async fn run_instruction(
        &self,
        planner: &dyn Planner,
        instruction: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionTrace, FlowError> {
        let plan = planner.generate_plan(instruction).await?;
        self.run(instruction, &plan, cancel).await
    }

    /// Run `plan` to completion, critical failure, session loss or cancellation.
    ///
    /// Only an invalid plan is an error. Once validation passes a trace is
    /// always returned, holding exactly one result per planned step.
    pub async fn run(
        &self,
        instruction: &str,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
    ) -> Result<ExecutionTrace, FlowError> {
        let mut plan = plan.clone();
        plan.assign_missing_ids();
        self.validator.validate(&plan)?;

        let mut builder = TraceBuilder::new(instruction).with_reasoning(plan.reasoning.clone());
        info!(run = %builder.run_id(), steps = plan.len(), "starting run");

        let mut scope = SessionScope::new(Arc::clone(&self.sessions));
        let mut stopped: Option<(RunStatus, String)> = None;

        for step in &plan.steps {
            if let Some((_, reason)) = &stopped {
                builder.push(StepResult::skipped(step, reason.clone()));
                continue;
            }
            if cancel.is_cancelled() {
                info!(step = %step.id, "run cancelled");
                let reason = "run cancelled".to_string();
                builder.push(StepResult::skipped(step, reason.clone()));
                stopped = Some((RunStatus::Aborted, reason));
                continue;
            }

            let result = self.run_step(&mut scope, step).await;
            if result.error_kind == Some(ErrorKind::SessionFatal) {
                stopped = Some((
                    RunStatus::SessionFatal,
                    format!("browser session lost at step '{}'", step.id),
                ));
            } else if step.critical && !result.succeeded() {
                stopped = Some((
                    RunStatus::CriticalFailure,
                    format!("critical step '{}' failed", step.id),
                ));
            }
            builder.push(result);
        }

        // A cancel that arrived while the last step was in flight still aborts the run.
        if stopped.is_none() && cancel.is_cancelled() {
            info!("run cancelled after the final step");
            stopped = Some((RunStatus::Aborted, "run cancelled".to_string()));
        }

        if let Err(err) = scope.release().await {
            warn!(error = %err, "failed to release browser session");
        }

        let status = stopped
            .map(|(status, _)| status)
            .unwrap_or(RunStatus::Completed);
        let trace = builder.finish(status);
        info!(
            run = %trace.run_id(),
            status = %trace.status(),
            succeeded = trace.succeeded_count(),
            failed = trace.failed_count(),
            skipped = trace.skipped_count(),
            "run finished"
        );
        Ok(trace)
    }

    async fn run_step(&self, scope: &mut SessionScope, step: &PlanStep) -> StepResult {
        let session = match scope.acquire().await {
            Ok(session) => session,
            Err(err) => {
                warn!(step = %step.id, error = %err, "no browser session available");
                return StepResult::failed(step, ErrorKind::SessionFatal, err.to_string());
            }
        };

        let resolved = if step.targets_element() {
            match self.resolve(session.as_ref(), step).await {
                Ok(resolved) => resolved,
                Err(result) => return result,
            }
        } else {
            ResolvedCandidates::default()
        };

        self.executor.execute(session.as_ref(), step, &resolved).await
    }

    /// Snapshot the page and resolve the step's target against it.
    ///
    /// A snapshot failure that leaves the session usable degrades to an empty
    /// page, so only targets that are already selectors can still resolve.
    async fn resolve(
        &self,
        session: &dyn BrowserSession,
        step: &PlanStep,
    ) -> Result<ResolvedCandidates, StepResult> {
        let snapshot = match session.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_session_fatal() => {
                return Err(StepResult::failed(step, ErrorKind::SessionFatal, err.to_string()));
            }
            Err(err) => {
                warn!(step = %step.id, error = %err, "page snapshot failed");
                PageSnapshot::blank()
            }
        };
        let resolved = self.resolver.resolve(step, &snapshot);
        debug!(
            step = %step.id,
            candidates = resolved.candidates.len(),
            rejected = resolved.rejected.len(),
            "candidates ready"
        );
        Ok(resolved)
    }
}
