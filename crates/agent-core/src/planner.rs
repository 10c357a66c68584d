//! Planner seam.
//!
//! Turning an instruction into a plan is an external concern. The run
//! pipeline only sees this trait; anything from an LLM client to a plan file
//! on disk can sit behind it.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::errors::AgentError;
use crate::plan::ExecutionPlan;

#[async_trait]
pub trait Planner: Send + Sync {
    /// Produce an ordered plan for `instruction`. Plans may have any length
    /// of at least one step; validation happens downstream.
    async fn generate_plan(&self, instruction: &str) -> Result<ExecutionPlan, AgentError>;
}

/// Serves a pre-generated plan for every instruction.
#[derive(Debug, Clone)]
pub struct StaticPlanner {
    plan: ExecutionPlan,
}

impl StaticPlanner {
    pub fn new(plan: ExecutionPlan) -> Self {
        Self { plan }
    }

    /// Load a plan document, picking the decoder from the file extension
    /// (`.yaml`/`.yml` are YAML, everything else is JSON).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"))
            .unwrap_or(false);
        let plan = if is_yaml {
            ExecutionPlan::from_yaml_str(&raw)?
        } else {
            ExecutionPlan::from_json_str(&raw)?
        };
        info!(path = %path.display(), steps = plan.len(), "loaded plan file");
        Ok(Self { plan })
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn generate_plan(&self, instruction: &str) -> Result<ExecutionPlan, AgentError> {
        if instruction.trim().is_empty() {
            return Err(AgentError::invalid_request("instruction is empty"));
        }
        Ok(self.plan.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStep;

    #[test]
    fn static_planner_returns_plan() {
        let planner = StaticPlanner::new(ExecutionPlan::new(vec![PlanStep::navigate(
            "https://example.com",
        )]));
        let plan = tokio_test::block_on(planner.generate_plan("open example")).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn static_planner_rejects_blank_instruction() {
        let planner = StaticPlanner::new(ExecutionPlan::default());
        let err = tokio_test::block_on(planner.generate_plan("  ")).unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
    }
}
