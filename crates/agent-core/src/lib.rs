//! Agent core primitives.
//!
//! Holds the execution plan model produced by planners, the validator that
//! gates a plan before any browser work starts, and the planner seam itself.

pub mod errors;
pub mod plan;
pub mod plan_validator;
pub mod planner;

pub use errors::AgentError;
pub use plan::{ExecutionPlan, PlanStep, StepType};
pub use plan_validator::{PlanValidationError, PlanValidationIssue, PlanValidator};
pub use planner::{Planner, StaticPlanner};
pub use tracecraft_core_types::{AssertionType, WaitCondition};
