//! Candidate resolution for plan steps.

use std::collections::HashSet;

use action_primitives::PageSnapshot;
use agent_core::PlanStep;
use tracing::{debug, trace};

use crate::classifier::{strategy_kind_of, SelectorClassifier};
use crate::strategies::{default_strategies, LocatorStrategy, TargetDescription};
use crate::types::{ResolvedCandidates, SelectorCandidate, StrategyKind};

/// Turns a step's target description into ranked selector candidates.
pub trait LocatorResolver: Send + Sync {
    /// Candidates best first. An empty `candidates` list means the step is
    /// unresolved; no fallback selector is invented.
    fn resolve(&self, step: &PlanStep, snapshot: &PageSnapshot) -> ResolvedCandidates;
}

/// Keyword matcher over the snapshot plus the default strategy chain.
pub struct DefaultLocatorResolver {
    strategies: Vec<Box<dyn LocatorStrategy>>,
    classifier: SelectorClassifier,
    max_candidates: usize,
    max_nodes: usize,
}

impl Default for DefaultLocatorResolver {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            classifier: SelectorClassifier::new(),
            max_candidates: 8,
            max_nodes: 3,
        }
    }
}

impl DefaultLocatorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self
    }

    /// Node indexes that fit the description, best first.
    fn matching_nodes(&self, target: &TargetDescription, snapshot: &PageSnapshot) -> Vec<usize> {
        let mut scored: Vec<(usize, f32)> = snapshot
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.visible)
            .map(|(index, node)| (index, target.score(node)))
            .filter(|(_, score)| *score >= 0.5)
            .collect();
        // Stable: equal scores keep document order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(self.max_nodes)
            .map(|(index, _)| index)
            .collect()
    }
}

impl LocatorResolver for DefaultLocatorResolver {
    fn resolve(&self, step: &PlanStep, snapshot: &PageSnapshot) -> ResolvedCandidates {
        let raw = step.target.trim();
        if raw.is_empty() {
            return ResolvedCandidates::default();
        }

        let mut proposals: Vec<(String, StrategyKind)> = Vec::new();
        if looks_like_selector(raw) {
            proposals.push((raw.to_string(), strategy_kind_of(raw)));
        }

        let target = TargetDescription::parse(raw);
        for index in self.matching_nodes(&target, snapshot) {
            for strategy in &self.strategies {
                let proposed = strategy.propose(snapshot, index);
                if !proposed.is_empty() {
                    trace!(step = %step.id, node = index, strategy = strategy.name(), count = proposed.len(), "strategy proposed selectors");
                }
                for expression in proposed {
                    proposals.push((expression, strategy.kind()));
                }
            }
        }

        let mut seen = HashSet::new();
        let mut resolved = ResolvedCandidates::default();
        for (expression, kind) in proposals {
            if !seen.insert(expression.clone()) {
                continue;
            }
            let classification = self.classifier.classify(&expression);
            let candidate = SelectorCandidate::new(expression, kind, classification);
            if candidate.is_rejected() {
                resolved.rejected.push(candidate);
            } else {
                resolved.candidates.push(candidate);
            }
        }

        resolved.candidates.sort_by_key(|candidate| candidate.confidence_tier);
        resolved.candidates.truncate(self.max_candidates);

        debug!(
            step = %step.id,
            target = raw,
            candidates = resolved.candidates.len(),
            rejected = resolved.rejected.len(),
            "resolved locator candidates"
        );
        resolved
    }
}

/// Whether a target description is already a selector expression.
fn looks_like_selector(raw: &str) -> bool {
    raw.starts_with('#')
        || raw.starts_with('.')
        || raw.starts_with('[')
        || ["role=", "text=", "label="]
            .iter()
            .any(|prefix| raw.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfidenceTier;
    use action_primitives::SnapshotNode;

    fn login_page() -> PageSnapshot {
        PageSnapshot::new(
            "https://app.test/login",
            "Login",
            vec![
                SnapshotNode::new("input")
                    .with_label("Email")
                    .with_attribute("type", "email"),
                SnapshotNode::new("button")
                    .with_text("Sign in")
                    .with_test_id("login-submit"),
                SnapshotNode::new("button").with_text("Sign in with SSO").hidden(),
            ],
        )
    }

    #[test]
    fn high_confidence_candidates_come_first() {
        let resolver = DefaultLocatorResolver::new();
        let resolved = resolver.resolve(&PlanStep::click("Sign in button"), &login_page());
        let first = resolved.best().unwrap();
        assert_eq!(first.expression, r#"[data-testid="login-submit"]"#);
        assert_eq!(first.strategy_kind, StrategyKind::TestId);
        let tiers: Vec<_> = resolved.candidates.iter().map(|c| c.confidence_tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[test]
    fn rejected_expressions_are_bucketed_separately() {
        let resolver = DefaultLocatorResolver::new();
        let resolved = resolver.resolve(&PlanStep::click("Sign in button"), &login_page());
        assert!(resolved.candidates.iter().all(|c| !c.is_rejected()));
        assert!(resolved
            .rejected
            .iter()
            .any(|c| c.expression == "button:nth-of-type(1)"));
    }

    #[test]
    fn hidden_nodes_are_ignored() {
        let resolver = DefaultLocatorResolver::new();
        let resolved = resolver.resolve(&PlanStep::click("Sign in with SSO"), &login_page());
        assert!(resolved
            .candidates
            .iter()
            .all(|c| !c.expression.contains("SSO")));
    }

    #[test]
    fn nothing_matches_means_unresolved() {
        let resolver = DefaultLocatorResolver::new();
        let resolved = resolver.resolve(&PlanStep::click("mystery widget"), &login_page());
        assert!(resolved.is_unresolved());
        assert!(resolved.rejected.is_empty());

        let blank = resolver.resolve(&PlanStep::click("  "), &login_page());
        assert!(blank.is_unresolved());
    }

    #[test]
    fn explicit_selectors_pass_through() {
        let resolver = DefaultLocatorResolver::new();
        let resolved = resolver.resolve(&PlanStep::click("#checkout"), &PageSnapshot::blank());
        assert_eq!(resolved.candidates.len(), 1);
        assert_eq!(resolved.candidates[0].strategy_kind, StrategyKind::RawCss);
        assert_eq!(resolved.candidates[0].confidence_tier, ConfidenceTier::Medium);

        let positional = resolver.resolve(&PlanStep::click("li:nth-child(2)"), &PageSnapshot::blank());
        assert!(positional.is_unresolved());
    }

    #[test]
    fn only_generic_candidates_are_flagged_ambiguous() {
        let page = PageSnapshot::new(
            "https://app.test/search",
            "Search",
            vec![SnapshotNode::new("input").with_attribute("placeholder", "Search products")],
        );
        let resolver = DefaultLocatorResolver::new();
        let resolved = resolver.resolve(&PlanStep::fill("search box", "shoes"), &page);
        assert!(!resolved.is_unresolved());
        let low: Vec<_> = resolved
            .candidates
            .iter()
            .filter(|c| c.confidence_tier == ConfidenceTier::Low)
            .collect();
        assert!(low.iter().all(|c| c.ambiguity_risk));
        assert!(low.iter().any(|c| c.expression == "input"));
    }

    #[test]
    fn candidate_count_is_capped() {
        let resolver = DefaultLocatorResolver::new().with_max_candidates(2);
        let resolved = resolver.resolve(&PlanStep::click("Sign in button"), &login_page());
        assert_eq!(resolved.candidates.len(), 2);
    }
}
