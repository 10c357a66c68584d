//! Locator layer
//!
//! Classifies selector expressions by how reliably they identify exactly one
//! element, and resolves a step's free-text target into a ranked list of such
//! expressions drawn from a page snapshot.

pub mod classifier;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use classifier::{classify, strategy_kind_of, SelectorClassifier};
pub use resolver::{DefaultLocatorResolver, LocatorResolver};
pub use strategies::{default_strategies, LocatorStrategy, TargetDescription};
pub use types::{
    Classification, ConfidenceTier, ResolvedCandidates, SelectorCandidate, StrategyKind,
};
