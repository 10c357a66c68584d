//! Execution plan model.
//!
//! A plan is an ordered list of [`PlanStep`]s produced by a planner. Steps are
//! immutable once handed to the orchestrator; every later stage works on
//! copies or references.

use serde::{Deserialize, Serialize};
use tracecraft_core_types::{AssertionType, WaitCondition};

use crate::errors::AgentError;

/// Closed set of step kinds the executor and compiler dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepType {
    Navigate,
    Click,
    Fill,
    Read,
    ReadAll,
    Screenshot,
    Wait,
    Assert,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Navigate => "navigate",
            StepType::Click => "click",
            StepType::Fill => "fill",
            StepType::Read => "read",
            StepType::ReadAll => "readAll",
            StepType::Screenshot => "screenshot",
            StepType::Wait => "wait",
            StepType::Assert => "assert",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    #[serde(default)]
    pub id: String,
    pub step_type: StepType,
    /// Free-text description of the element to act on. For `navigate` this is the URL.
    #[serde(default, alias = "targetDescription")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_condition: Option<WaitCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_type: Option<AssertionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
    #[serde(default)]
    pub full_page: bool,
}

impl PlanStep {
    pub fn new(step_type: StepType, target: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            step_type,
            target: target.into(),
            value: None,
            wait_condition: None,
            timeout_ms: None,
            critical: false,
            assertion_type: None,
            expected_value: None,
            full_page: false,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(StepType::Navigate, url)
    }

    pub fn click(target: impl Into<String>) -> Self {
        Self::new(StepType::Click, target)
    }

    pub fn fill(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(StepType::Fill, target).with_value(value)
    }

    pub fn read(target: impl Into<String>) -> Self {
        Self::new(StepType::Read, target)
    }

    pub fn read_all(target: impl Into<String>) -> Self {
        Self::new(StepType::ReadAll, target)
    }

    pub fn screenshot(full_page: bool) -> Self {
        let mut step = Self::new(StepType::Screenshot, "");
        step.full_page = full_page;
        step
    }

    pub fn wait_for(target: impl Into<String>, condition: WaitCondition) -> Self {
        let mut step = Self::new(StepType::Wait, target);
        step.wait_condition = Some(condition);
        step
    }

    pub fn wait_ms(ms: u64) -> Self {
        let mut step = Self::new(StepType::Wait, "");
        step.wait_condition = Some(WaitCondition::Duration);
        step.value = Some(ms.to_string());
        step
    }

    pub fn assert_that(
        target: impl Into<String>,
        assertion: AssertionType,
        expected: impl Into<String>,
    ) -> Self {
        let mut step = Self::new(StepType::Assert, target);
        step.assertion_type = Some(assertion);
        step.expected_value = Some(expected.into());
        step
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Wait condition after defaults are applied: a targeted wait blocks until
    /// visible, a wait with a value sleeps, anything else waits for load.
    pub fn effective_wait_condition(&self) -> WaitCondition {
        if let Some(condition) = self.wait_condition {
            return condition;
        }
        if !self.target.trim().is_empty() {
            WaitCondition::Visible
        } else if self.value.is_some() {
            WaitCondition::Duration
        } else {
            WaitCondition::Load
        }
    }

    /// Whether executing this step requires resolving `target` to an element.
    pub fn targets_element(&self) -> bool {
        match self.step_type {
            StepType::Click | StepType::Fill | StepType::Read | StepType::ReadAll => true,
            StepType::Navigate | StepType::Screenshot => false,
            StepType::Wait => self.effective_wait_condition().is_element_scoped(),
            StepType::Assert => self
                .assertion_type
                .map(|assertion| assertion.is_element_scoped())
                .unwrap_or(true),
        }
    }

    /// Short human label, used in logs and generated comments.
    pub fn describe(&self) -> String {
        let target = self.target.trim();
        if target.is_empty() {
            self.step_type.to_string()
        } else {
            format!("{} \"{}\"", self.step_type, target)
        }
    }
}

/// Ordered plan returned by a planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub reasoning: String,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        let mut plan = Self {
            steps,
            reasoning: String::new(),
        };
        plan.assign_missing_ids();
        plan
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AgentError> {
        let mut plan: ExecutionPlan = serde_json::from_str(raw)
            .map_err(|err| AgentError::invalid_plan(format!("plan json: {err}")))?;
        plan.assign_missing_ids();
        Ok(plan)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, AgentError> {
        let mut plan: ExecutionPlan = serde_yaml::from_str(raw)
            .map_err(|err| AgentError::invalid_plan(format!("plan yaml: {err}")))?;
        plan.assign_missing_ids();
        Ok(plan)
    }

    /// Give every step without an id the positional id `step-<n>`.
    pub fn assign_missing_ids(&mut self) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            if step.id.trim().is_empty() {
                step.id = format!("step-{}", index + 1);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_positional_ids() {
        let plan = ExecutionPlan::new(vec![
            PlanStep::navigate("https://example.com"),
            PlanStep::click("Sign in button").with_id("login"),
            PlanStep::screenshot(false),
        ]);
        let ids: Vec<_> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["step-1", "login", "step-3"]);
    }

    #[test]
    fn parses_camel_case_json() {
        let raw = r#"{
            "reasoning": "log in",
            "steps": [
                {"stepType": "navigate", "target": "https://example.com"},
                {"stepType": "fill", "targetDescription": "email field", "value": "a@b.c", "critical": true},
                {"stepType": "readAll", "target": "result titles"},
                {"stepType": "wait", "waitCondition": "networkIdle"},
                {"stepType": "assert", "target": "banner", "assertionType": "textContains", "expectedValue": "Welcome"}
            ]
        }"#;
        let plan = ExecutionPlan::from_json_str(raw).unwrap();
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.steps[1].target, "email field");
        assert!(plan.steps[1].critical);
        assert_eq!(plan.steps[2].step_type, StepType::ReadAll);
        assert_eq!(
            plan.steps[3].wait_condition,
            Some(WaitCondition::NetworkIdle)
        );
        assert_eq!(plan.steps[4].assertion_type, Some(AssertionType::TextContains));
    }

    #[test]
    fn parses_yaml() {
        let raw = "steps:\n  - stepType: navigate\n    target: https://example.com\n  - stepType: click\n    target: Pricing link\n";
        let plan = ExecutionPlan::from_yaml_str(raw).unwrap();
        assert_eq!(plan.steps[1].id, "step-2");
    }

    #[test]
    fn rejects_unknown_step_type() {
        let raw = r#"{"steps": [{"stepType": "hover", "target": "x"}]}"#;
        assert!(ExecutionPlan::from_json_str(raw).is_err());
    }

    #[test]
    fn element_targeting_rules() {
        assert!(PlanStep::click("ok").targets_element());
        assert!(!PlanStep::navigate("https://example.com").targets_element());
        assert!(!PlanStep::wait_ms(100).targets_element());
        assert!(PlanStep::new(StepType::Wait, "spinner").targets_element());
        assert!(!PlanStep::assert_that("", AssertionType::UrlContains, "/home").targets_element());
        assert!(PlanStep::assert_that("banner", AssertionType::Visible, "true").targets_element());
    }
}
