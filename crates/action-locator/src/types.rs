//! Core types for locator system

use serde::{Deserialize, Serialize};

/// Confidence that an expression matches exactly the intended element.
///
/// Ordered best first, so sorting candidates by tier puts HIGH at the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    Rejected,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "HIGH",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::Low => "LOW",
            ConfidenceTier::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a selector expression identifies its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    TestId,
    RoleAndName,
    Role,
    Label,
    Text,
    RawCss,
    /// No usable selector; rendered as a comment.
    None,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::TestId => "testId",
            StrategyKind::RoleAndName => "roleAndName",
            StrategyKind::Role => "role",
            StrategyKind::Label => "label",
            StrategyKind::Text => "text",
            StrategyKind::RawCss => "rawCss",
            StrategyKind::None => "none",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying one expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub tier: ConfidenceTier,
    pub ambiguity_risk: bool,
}

/// A selector expression proposed for a step, with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorCandidate {
    pub expression: String,
    pub strategy_kind: StrategyKind,
    pub confidence_tier: ConfidenceTier,
    pub ambiguity_risk: bool,
}

impl SelectorCandidate {
    pub fn new(expression: impl Into<String>, strategy_kind: StrategyKind, classification: Classification) -> Self {
        Self {
            expression: expression.into(),
            strategy_kind,
            confidence_tier: classification.tier,
            ambiguity_risk: classification.ambiguity_risk,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.confidence_tier == ConfidenceTier::Rejected
    }

    /// LOW-tier expressions that may match several elements.
    pub fn needs_first_match(&self) -> bool {
        self.confidence_tier == ConfidenceTier::Low && self.ambiguity_risk
    }
}

/// Resolver output: usable candidates best first, plus the rejected bucket
/// kept for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCandidates {
    pub candidates: Vec<SelectorCandidate>,
    #[serde(default)]
    pub rejected: Vec<SelectorCandidate>,
}

impl ResolvedCandidates {
    pub fn is_unresolved(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn best(&self) -> Option<&SelectorCandidate> {
        self.candidates.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_sort_best_first() {
        let mut tiers = vec![
            ConfidenceTier::Rejected,
            ConfidenceTier::Low,
            ConfidenceTier::High,
            ConfidenceTier::Medium,
        ];
        tiers.sort();
        assert_eq!(
            tiers,
            vec![
                ConfidenceTier::High,
                ConfidenceTier::Medium,
                ConfidenceTier::Low,
                ConfidenceTier::Rejected
            ]
        );
    }

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_string(&ConfidenceTier::High).unwrap(), "\"HIGH\"");
        assert_eq!(
            serde_json::to_string(&StrategyKind::RoleAndName).unwrap(),
            "\"roleAndName\""
        );
        assert_eq!(serde_json::to_string(&StrategyKind::RawCss).unwrap(), "\"rawCss\"");
    }
}
