//! Step executor implementation

use std::time::{Duration, Instant};

use action_locator::{ResolvedCandidates, SelectorCandidate};
use action_primitives::{dispatch, ActionError, BrowserSession, ToolCall, ToolOutput};
use agent_core::{AssertionType, PlanStep, StepType, WaitCondition};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::strategies::RetryPolicy;
use crate::types::{AttemptRecord, ErrorKind, StepResult};

/// Executes one plan step against a live session.
///
/// Never returns an error: every failure is folded into the [`StepResult`].
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        session: &dyn BrowserSession,
        step: &PlanStep,
        resolved: &ResolvedCandidates,
    ) -> StepResult;
}

/// Candidate fallback with bounded retry per candidate.
#[derive(Debug, Clone)]
pub struct DefaultStepExecutor {
    retry: RetryPolicy,
    default_timeout: Duration,
}

impl Default for DefaultStepExecutor {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// How the attempts against one candidate ended.
enum CandidateOutcome {
    Succeeded(ToolCall, ToolOutput),
    Abandoned(ActionError),
    Fatal(ActionError),
}

impl DefaultStepExecutor {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Self::default()
        }
    }

    pub fn with_default_timeout(mut self, default_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn step_timeout(&self, step: &PlanStep) -> Duration {
        step.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }

    /// Walk the candidates in order until one succeeds.
    async fn execute_with_candidates(
        &self,
        session: &dyn BrowserSession,
        step: &PlanStep,
        resolved: &ResolvedCandidates,
        result: &mut StepResult,
    ) {
        let mut last_error: Option<ActionError> = None;

        for candidate in &resolved.candidates {
            if candidate.is_rejected() {
                debug!(step = %step.id, selector = %candidate.expression, "abandoning rejected candidate");
                if !result.rejected_candidates.contains(candidate) {
                    result.rejected_candidates.push(candidate.clone());
                }
                continue;
            }

            result.attempted_candidates.push(candidate.clone());
            match self
                .attempt_candidate(session, step, Some(&candidate.expression), result)
                .await
            {
                CandidateOutcome::Succeeded(call, output) => {
                    self.record_success(result, Some(candidate), call, output);
                    return;
                }
                CandidateOutcome::Fatal(err) => {
                    result.mark_failed(ErrorKind::SessionFatal, err.to_string());
                    return;
                }
                CandidateOutcome::Abandoned(err) => {
                    debug!(
                        step = %step.id,
                        selector = %candidate.expression,
                        error = %err,
                        severity = err.severity(),
                        "candidate abandoned"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            None => {
                let message = format!("no usable selector for '{}'", step.target);
                result.mark_failed(ErrorKind::Unresolvable, message);
            }
            Some(err) => {
                let message = format!(
                    "all {} candidate(s) failed for '{}'; last error: {}",
                    result.attempted_candidates.len(),
                    step.target,
                    err
                );
                result.mark_failed(ErrorKind::AllCandidatesFailed, message);
            }
        }
    }

    /// Page-level steps: one implicit candidate with the same retry budget.
    async fn execute_without_candidate(
        &self,
        session: &dyn BrowserSession,
        step: &PlanStep,
        result: &mut StepResult,
    ) {
        match self.attempt_candidate(session, step, None, result).await {
            CandidateOutcome::Succeeded(call, output) => {
                self.record_success(result, None, call, output);
            }
            CandidateOutcome::Fatal(err) => {
                result.mark_failed(ErrorKind::SessionFatal, err.to_string());
            }
            CandidateOutcome::Abandoned(err) => {
                result.mark_failed(ErrorKind::AllCandidatesFailed, err.to_string());
            }
        }
    }

    fn record_success(
        &self,
        result: &mut StepResult,
        candidate: Option<&SelectorCandidate>,
        call: ToolCall,
        output: ToolOutput,
    ) {
        result.mark_succeeded(call, output);
        result.chosen_candidate = candidate.cloned();
    }

    /// Issue the call for one candidate, retrying transient failures.
    async fn attempt_candidate(
        &self,
        session: &dyn BrowserSession,
        step: &PlanStep,
        expression: Option<&str>,
        result: &mut StepResult,
    ) -> CandidateOutcome {
        let budget = self.step_timeout(step);
        let call = build_tool_call(step, expression, budget);
        // Fixed-duration waits need their own duration on top of the step budget.
        let deadline = match &call {
            ToolCall::WaitFor {
                condition: WaitCondition::Duration,
                timeout_ms,
                ..
            } => budget + Duration::from_millis(*timeout_ms),
            _ => budget,
        };

        let mut attempt = 1;
        loop {
            let outcome = match timeout(deadline, dispatch(session, &call)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ActionError::WaitTimeout(format!(
                    "{} exceeded {} ms",
                    call.name(),
                    deadline.as_millis()
                ))),
            };

            let err = match outcome {
                Ok(output) => return CandidateOutcome::Succeeded(call, output),
                Err(err) => err,
            };

            result.attempts.push(AttemptRecord {
                expression: expression.map(str::to_string),
                attempt,
                error: err.to_string(),
                transient: err.is_retryable(),
            });
            result.tool_call = Some(call.clone());

            if err.is_session_fatal() {
                warn!(step = %step.id, error = %err, severity = err.severity(), "browser session lost");
                return CandidateOutcome::Fatal(err);
            }
            if !self.retry.should_retry(attempt, &err) {
                return CandidateOutcome::Abandoned(err);
            }

            let delay = self.retry.backoff(attempt);
            debug!(
                step = %step.id,
                selector = expression.unwrap_or("-"),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl StepExecutor for DefaultStepExecutor {
    async fn execute(
        &self,
        session: &dyn BrowserSession,
        step: &PlanStep,
        resolved: &ResolvedCandidates,
    ) -> StepResult {
        let started = Instant::now();
        let mut result = StepResult::new(step);
        result.rejected_candidates = resolved.rejected.clone();

        if step.targets_element() {
            self.execute_with_candidates(session, step, resolved, &mut result)
                .await;
        } else {
            self.execute_without_candidate(session, step, &mut result)
                .await;
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        if result.succeeded() {
            info!(step = %step.id, action = %step.describe(), attempts = result.total_attempts(), "step succeeded");
        } else {
            warn!(
                step = %step.id,
                action = %step.describe(),
                kind = ?result.error_kind,
                error = result.error.as_deref().unwrap_or(""),
                "step failed"
            );
        }
        result
    }
}

/// Concrete tool call for `step`, acting on `selector` when the step targets an element.
pub fn build_tool_call(step: &PlanStep, selector: Option<&str>, step_timeout: Duration) -> ToolCall {
    let selector_text = selector.unwrap_or_default().to_string();
    let value = step.value.clone().unwrap_or_default();
    match step.step_type {
        StepType::Navigate => ToolCall::Navigate {
            url: step.target.trim().to_string(),
        },
        StepType::Click => ToolCall::Click {
            selector: selector_text,
        },
        StepType::Fill => ToolCall::Fill {
            selector: selector_text,
            text: value,
        },
        StepType::Read => ToolCall::ReadText {
            selector: selector_text,
        },
        StepType::ReadAll => ToolCall::ReadAllText {
            selector: selector_text,
        },
        StepType::Screenshot => ToolCall::Screenshot {
            full_page: step.full_page,
        },
        StepType::Wait => {
            let condition = step.effective_wait_condition();
            let timeout_ms = if condition == WaitCondition::Duration {
                value.trim().parse().unwrap_or(0)
            } else {
                step_timeout.as_millis() as u64
            };
            ToolCall::WaitFor {
                selector: selector.map(str::to_string),
                condition,
                timeout_ms,
            }
        }
        StepType::Assert => ToolCall::Assert {
            selector: selector.map(str::to_string),
            assertion: step.assertion_type.unwrap_or(AssertionType::Visible),
            expected: step.expected_value.clone().unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::{Classification, ConfidenceTier, StrategyKind};
    use action_primitives::{FixtureBrowser, FixturePage, SessionFactory, SiteFixture, SnapshotNode};
    use std::sync::Arc;

    fn fast() -> DefaultStepExecutor {
        DefaultStepExecutor::new(RetryPolicy::new(3, 1))
    }

    fn candidate(expr: &str, tier: ConfidenceTier) -> SelectorCandidate {
        SelectorCandidate::new(
            expr,
            StrategyKind::RawCss,
            Classification {
                tier,
                ambiguity_risk: tier == ConfidenceTier::Low,
            },
        )
    }

    async fn session_on(page: FixturePage) -> (FixtureBrowser, Arc<dyn BrowserSession>) {
        let browser = FixtureBrowser::new(SiteFixture::new().with_page("https://app.test/", page));
        let session = browser.create().await.unwrap();
        session.navigate("https://app.test/").await.unwrap();
        (browser, session)
    }

    #[test]
    fn builds_calls_for_every_step_type() {
        let budget = Duration::from_millis(500);
        assert_eq!(
            build_tool_call(&PlanStep::navigate(" https://a.test "), None, budget),
            ToolCall::Navigate {
                url: "https://a.test".into()
            }
        );
        assert_eq!(
            build_tool_call(&PlanStep::fill("email", "a@b.c"), Some("#email"), budget),
            ToolCall::Fill {
                selector: "#email".into(),
                text: "a@b.c".into()
            }
        );
        assert_eq!(
            build_tool_call(&PlanStep::wait_ms(250), None, budget),
            ToolCall::WaitFor {
                selector: None,
                condition: WaitCondition::Duration,
                timeout_ms: 250
            }
        );
        assert_eq!(
            build_tool_call(&PlanStep::wait_for("banner", WaitCondition::Hidden), Some("#b"), budget),
            ToolCall::WaitFor {
                selector: Some("#b".into()),
                condition: WaitCondition::Hidden,
                timeout_ms: 500
            }
        );
        assert_eq!(
            build_tool_call(&PlanStep::screenshot(true), None, budget),
            ToolCall::Screenshot { full_page: true }
        );
    }

    #[tokio::test]
    async fn falls_back_to_next_candidate() {
        let (browser, session) =
            session_on(FixturePage::new("App").with_node(SnapshotNode::new("button").with_id("go"))).await;
        let resolved = ResolvedCandidates {
            candidates: vec![
                candidate("#missing", ConfidenceTier::Medium),
                candidate("#go", ConfidenceTier::Medium),
            ],
            rejected: vec![],
        };
        let result = fast().execute(session.as_ref(), &PlanStep::click("go"), &resolved).await;
        assert!(result.succeeded());
        assert_eq!(result.chosen_candidate.unwrap().expression, "#go");
        assert_eq!(result.attempted_candidates.len(), 2);
        assert_eq!(result.attempts.len(), 1);
        assert!(!result.attempts[0].transient);
        let clicks = browser.call_log().iter().filter(|c| c.tool == "click").count();
        assert_eq!(clicks, 2);
    }

    #[tokio::test]
    async fn transient_failures_retry_the_same_candidate() {
        let (browser, session) = session_on(
            FixturePage::new("App").with_flaky_node(SnapshotNode::new("button").with_id("save"), 2),
        )
        .await;
        let resolved = ResolvedCandidates {
            candidates: vec![candidate("#save", ConfidenceTier::Medium)],
            rejected: vec![],
        };
        let result = fast().execute(session.as_ref(), &PlanStep::click("save"), &resolved).await;
        assert!(result.succeeded());
        assert_eq!(result.attempts.len(), 2);
        assert!(result.attempts.iter().all(|a| a.transient));
        assert_eq!(browser.call_log().iter().filter(|c| c.tool == "click").count(), 3);
    }

    #[tokio::test]
    async fn retry_budget_is_never_exceeded() {
        let (browser, session) = session_on(
            FixturePage::new("App").with_node(SnapshotNode::new("button").with_id("off").disabled()),
        )
        .await;
        let resolved = ResolvedCandidates {
            candidates: vec![candidate("#off", ConfidenceTier::Medium)],
            rejected: vec![],
        };
        let result = fast().execute(session.as_ref(), &PlanStep::click("off"), &resolved).await;
        assert!(!result.succeeded());
        assert_eq!(result.error_kind, Some(ErrorKind::AllCandidatesFailed));
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(browser.call_log().iter().filter(|c| c.tool == "click").count(), 3);
    }

    #[tokio::test]
    async fn rejected_candidates_are_never_tried() {
        let (browser, session) =
            session_on(FixturePage::new("App").with_node(SnapshotNode::new("li").with_text("One"))).await;
        let resolved = ResolvedCandidates {
            candidates: vec![candidate("li:nth-child(1)", ConfidenceTier::Rejected)],
            rejected: vec![],
        };
        let result = fast().execute(session.as_ref(), &PlanStep::click("one"), &resolved).await;
        assert_eq!(result.error_kind, Some(ErrorKind::Unresolvable));
        assert!(result.chosen_candidate.is_none());
        assert_eq!(result.rejected_candidates.len(), 1);
        assert!(browser.call_log().iter().all(|c| c.tool != "click"));
    }

    #[tokio::test]
    async fn no_candidates_is_unresolvable() {
        let (_browser, session) = session_on(FixturePage::new("App")).await;
        let result = fast()
            .execute(session.as_ref(), &PlanStep::click("mystery button"), &ResolvedCandidates::default())
            .await;
        assert_eq!(result.error_kind, Some(ErrorKind::Unresolvable));
        assert!(result.error.unwrap().contains("mystery button"));
        assert!(result.tool_call.is_none());
    }

    #[tokio::test]
    async fn page_steps_run_without_candidates() {
        let (_browser, session) = session_on(FixturePage::new("App")).await;
        let shot = fast()
            .execute(session.as_ref(), &PlanStep::screenshot(false), &ResolvedCandidates::default())
            .await;
        assert!(shot.succeeded());
        assert!(shot.chosen_candidate.is_none());

        let step = PlanStep::assert_that("", AssertionType::UrlContains, "/nowhere");
        let failed = fast()
            .execute(session.as_ref(), &step, &ResolvedCandidates::default())
            .await;
        assert_eq!(failed.error_kind, Some(ErrorKind::AllCandidatesFailed));
        assert_eq!(failed.attempts.len(), 1);
    }

    #[tokio::test]
    async fn closed_session_is_fatal() {
        let (_browser, session) = session_on(FixturePage::new("App")).await;
        session.close().await.unwrap();
        let result = fast()
            .execute(session.as_ref(), &PlanStep::screenshot(false), &ResolvedCandidates::default())
            .await;
        assert_eq!(result.error_kind, Some(ErrorKind::SessionFatal));
        assert_eq!(result.attempts.len(), 1);
    }
}
