use std::collections::HashSet;

use thiserror::Error;
use tracecraft_core_types::WaitCondition;
use tracing::debug;
use url::Url;

use crate::plan::{ExecutionPlan, PlanStep, StepType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanValidationIssue {
    #[error("plan contains no steps")]
    EmptyPlan,
    #[error("step '{step_id}' has an empty id or shares it with another step")]
    DuplicateStepId { step_id: String },
    #[error("step '{step_id}' ({step_type}) needs a target description")]
    MissingTarget { step_id: String, step_type: StepType },
    #[error("step '{step_id}' navigate target '{url}' is not an absolute http(s) url: {reason}")]
    InvalidUrl {
        step_id: String,
        url: String,
        reason: String,
    },
    #[error("step '{step_id}' fill requires a value")]
    MissingFillValue { step_id: String },
    #[error("step '{step_id}' assert requires an assertion type")]
    MissingAssertionType { step_id: String },
    #[error("step '{step_id}' assert requires an expected value")]
    MissingExpectedValue { step_id: String },
    #[error("step '{step_id}' wait duration '{value}' is not a number of milliseconds")]
    InvalidWaitDuration { step_id: String, value: String },
    #[error("strict validation requires the plan to start with navigate, found {found}")]
    MissingInitialNavigation { found: StepType },
}

impl PlanValidationIssue {
    pub fn telemetry_label(&self) -> &'static str {
        match self {
            PlanValidationIssue::EmptyPlan => "empty_plan",
            PlanValidationIssue::DuplicateStepId { .. } => "duplicate_step_id",
            PlanValidationIssue::MissingTarget { .. } => "missing_target",
            PlanValidationIssue::InvalidUrl { .. } => "invalid_url",
            PlanValidationIssue::MissingFillValue { .. } => "fill_missing_value",
            PlanValidationIssue::MissingAssertionType { .. } => "assert_missing_type",
            PlanValidationIssue::MissingExpectedValue { .. } => "assert_missing_expected",
            PlanValidationIssue::InvalidWaitDuration { .. } => "wait_invalid_duration",
            PlanValidationIssue::MissingInitialNavigation { .. } => "missing_initial_navigation",
        }
    }
}

/// Rejection of a whole plan. Carries every issue found, not just the first.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("plan validation failed: {}", join_issues(.issues))]
pub struct PlanValidationError {
    pub issues: Vec<PlanValidationIssue>,
}

fn join_issues(issues: &[PlanValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[derive(Debug, Clone, Default)]
pub struct PlanValidator {
    strict: bool,
}

impl PlanValidator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn validate(&self, plan: &ExecutionPlan) -> Result<(), PlanValidationError> {
        let mut issues = Vec::new();

        if plan.steps.is_empty() {
            issues.push(PlanValidationIssue::EmptyPlan);
        }

        let mut seen = HashSet::new();
        for step in &plan.steps {
            if step.id.trim().is_empty() || !seen.insert(step.id.as_str()) {
                issues.push(PlanValidationIssue::DuplicateStepId {
                    step_id: step.id.clone(),
                });
            }
            collect_step_issues(step, &mut issues);
        }

        if self.strict {
            if let Some(first) = plan.steps.first() {
                if first.step_type != StepType::Navigate {
                    issues.push(PlanValidationIssue::MissingInitialNavigation {
                        found: first.step_type,
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            for issue in &issues {
                debug!(label = issue.telemetry_label(), "plan validation issue: {}", issue);
            }
            Err(PlanValidationError { issues })
        }
    }
}

fn collect_step_issues(step: &PlanStep, issues: &mut Vec<PlanValidationIssue>) {
    let step_id = step.id.clone();
    match step.step_type {
        StepType::Navigate => {
            if let Err(reason) = check_navigation_url(&step.target) {
                issues.push(PlanValidationIssue::InvalidUrl {
                    step_id,
                    url: step.target.clone(),
                    reason,
                });
            }
        }
        StepType::Fill => {
            if step.value.is_none() {
                issues.push(PlanValidationIssue::MissingFillValue {
                    step_id: step_id.clone(),
                });
            }
            require_target(step, issues);
        }
        StepType::Click | StepType::Read | StepType::ReadAll => require_target(step, issues),
        StepType::Screenshot => {}
        StepType::Wait => {
            if step.effective_wait_condition() == WaitCondition::Duration {
                let raw = step.value.clone().unwrap_or_default();
                if raw.trim().parse::<u64>().is_err() {
                    issues.push(PlanValidationIssue::InvalidWaitDuration {
                        step_id,
                        value: raw,
                    });
                }
            } else if step.targets_element() {
                require_target(step, issues);
            }
        }
        StepType::Assert => {
            if step.assertion_type.is_none() {
                issues.push(PlanValidationIssue::MissingAssertionType {
                    step_id: step_id.clone(),
                });
            }
            if step.expected_value.is_none() {
                issues.push(PlanValidationIssue::MissingExpectedValue {
                    step_id: step_id.clone(),
                });
            }
            if step.assertion_type.is_some() && step.targets_element() {
                require_target(step, issues);
            }
        }
    }
}

fn require_target(step: &PlanStep, issues: &mut Vec<PlanValidationIssue>) {
    if step.target.trim().is_empty() {
        issues.push(PlanValidationIssue::MissingTarget {
            step_id: step.id.clone(),
            step_type: step.step_type,
        });
    }
}

fn check_navigation_url(raw: &str) -> Result<(), String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("url is empty".to_string());
    }
    let parsed = Url::parse(trimmed).map_err(|err| err.to_string())?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if parsed.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
