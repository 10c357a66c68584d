//! Selector confidence classification.
//!
//! Pure function of the expression text; the page is never consulted. Rules
//! are evaluated in order and the first match wins:
//!
//! 1. empty or whitespace-only: REJECTED, ambiguous
//! 2. test-id attribute on a single compound, or role with accessible name: HIGH
//! 3. bare role, text match or label association: MEDIUM
//! 4. only generic tags, classes and attributes (at most two parts): LOW, ambiguous
//! 5. positional pseudo-classes, index steps or unanchored chains of three or
//!    more parts: REJECTED, ambiguous
//! 6. anything else: MEDIUM
//!
//! The generic vocabularies below are a fixed heuristic. They trade recall for
//! precision: a page that really does have one `<form>` still gets its `form`
//! selector qualified as first-match, and a site whose `.card` class is unique
//! is flagged all the same.

use action_primitives::query::{CssCompound, SelectorQuery};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Classification, ConfidenceTier, StrategyKind};

const GENERIC_TAGS: &[&str] = &[
    "a", "article", "button", "div", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "i", "img", "input", "label", "li", "main", "nav", "ol", "option", "p", "section",
    "select", "span", "svg", "table", "td", "textarea", "th", "tr", "ul", "*",
];

const GENERIC_CLASSES: &[&str] = &[
    "active", "box", "btn", "button", "card", "col", "container", "content", "field", "icon",
    "input", "item", "label", "link", "row", "selected", "text", "title", "wrapper",
];

const GENERIC_ATTRIBUTES: &[&str] = &["type", "class", "role", "style"];

const TEST_ID_ATTRIBUTES: &[&str] = &["data-testid", "data-test-id", "data-test"];

static TEST_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:[A-Za-z][\w-]*)?\[\s*data-test(?:id|-id)?\s*=\s*(?:"(?:[^"\\]|\\.)+"|'[^']+'|[^\]\s"']+)\s*\]$"#,
    )
    .expect("test id regex")
});

static POSITIONAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i):nth-(?:child|of-type|last-child|last-of-type)\(|:nth\(|:(?:first|last)-(?:child|of-type)|>>\s*nth=|\[\d+\]|^/|^\(//",
    )
    .expect("positional selector regex")
});

/// Stateless classifier over selector expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorClassifier;

impl SelectorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, expression: &str) -> Classification {
        classify(expression)
    }
}

/// Classify one selector expression.
pub fn classify(expression: &str) -> Classification {
    let expr = expression.trim();

    if expr.is_empty() {
        return rejected();
    }

    if TEST_ID_RE.is_match(expr) {
        return tier(ConfidenceTier::High, false);
    }

    let parsed = SelectorQuery::parse(expr);
    match &parsed {
        Ok(SelectorQuery::Role { name: Some(_), .. }) => return tier(ConfidenceTier::High, false),
        Ok(SelectorQuery::Role { name: None, .. })
        | Ok(SelectorQuery::Text { .. })
        | Ok(SelectorQuery::Label { .. }) => return tier(ConfidenceTier::Medium, false),
        Ok(SelectorQuery::Css(chain)) if chain.len() <= 2 && chain.iter().all(is_generic) => {
            return tier(ConfidenceTier::Low, true);
        }
        _ => {}
    }

    if POSITIONAL_RE.is_match(expr) {
        return rejected();
    }

    match parsed {
        Ok(SelectorQuery::Css(chain)) if chain.len() >= 3 && !chain.iter().any(is_anchor) => {
            rejected()
        }
        Ok(_) => tier(ConfidenceTier::Medium, false),
        // Unparseable expressions cannot be held to a single match.
        Err(_) => rejected(),
    }
}

/// Strategy kind implied by an expression's syntax.
pub fn strategy_kind_of(expression: &str) -> StrategyKind {
    let expr = expression.trim();
    if expr.is_empty() {
        return StrategyKind::None;
    }
    if TEST_ID_RE.is_match(expr) {
        return StrategyKind::TestId;
    }
    match SelectorQuery::parse(expr) {
        Ok(SelectorQuery::Role { name: Some(_), .. }) => StrategyKind::RoleAndName,
        Ok(SelectorQuery::Role { name: None, .. }) => StrategyKind::Role,
        Ok(SelectorQuery::Text { .. }) => StrategyKind::Text,
        Ok(SelectorQuery::Label { .. }) => StrategyKind::Label,
        _ => StrategyKind::RawCss,
    }
}

fn tier(tier: ConfidenceTier, ambiguity_risk: bool) -> Classification {
    Classification {
        tier,
        ambiguity_risk,
    }
}

fn rejected() -> Classification {
    tier(ConfidenceTier::Rejected, true)
}

fn is_generic(compound: &CssCompound) -> bool {
    let has_part = compound.tag.is_some() || !compound.classes.is_empty() || !compound.attributes.is_empty();
    has_part
        && compound.id.is_none()
        && compound.position.is_none()
        && compound
            .tag
            .as_deref()
            .map(|tag| GENERIC_TAGS.contains(&tag))
            .unwrap_or(true)
        && compound
            .classes
            .iter()
            .all(|class| GENERIC_CLASSES.contains(&class.to_ascii_lowercase().as_str()))
        && compound
            .attributes
            .iter()
            .all(|attr| GENERIC_ATTRIBUTES.contains(&attr.name.as_str()))
}

fn is_anchor(compound: &CssCompound) -> bool {
    compound.id.is_some()
        || compound
            .attributes
            .iter()
            .any(|attr| TEST_ID_ATTRIBUTES.contains(&attr.name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(expr: &str) -> (ConfidenceTier, bool) {
        let c = classify(expr);
        (c.tier, c.ambiguity_risk)
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(check(""), (ConfidenceTier::Rejected, true));
        assert_eq!(check("   \t"), (ConfidenceTier::Rejected, true));
    }

    #[test]
    fn test_ids_and_named_roles_are_high() {
        assert_eq!(check(r#"[data-testid="login-submit"]"#), (ConfidenceTier::High, false));
        assert_eq!(check("[data-test-id=checkout]"), (ConfidenceTier::High, false));
        assert_eq!(check(r#"button[data-test='buy']"#), (ConfidenceTier::High, false));
        assert_eq!(check(r#"role=button[name="Save"]"#), (ConfidenceTier::High, false));
    }

    #[test]
    fn roles_text_and_labels_are_medium() {
        assert_eq!(check("role=button"), (ConfidenceTier::Medium, false));
        assert_eq!(check(r#"text="Pricing""#), (ConfidenceTier::Medium, false));
        assert_eq!(check("text=pricing"), (ConfidenceTier::Medium, false));
        assert_eq!(check(r#"label="Email""#), (ConfidenceTier::Medium, false));
    }

    #[test]
    fn generic_vocabulary_is_low_and_ambiguous() {
        for expr in [
            "button",
            "input",
            "div",
            "span",
            "a",
            ".btn",
            ".item",
            "button.btn",
            r#"input[type="text"]"#,
            "[class=wrapper]",
            "div span",
            "ul > li",
        ] {
            assert_eq!(check(expr), (ConfidenceTier::Low, true), "{expr}");
        }
    }

    #[test]
    fn positional_and_deep_chains_are_rejected() {
        for expr in [
            "li:nth-child(3)",
            "tr:nth-of-type(2)",
            "div:first-child",
            "button >> nth=1",
            "//div[2]/span",
            "div > ul > li > a",
            "main section .title",
            "text=",
            "role=",
        ] {
            assert_eq!(check(expr), (ConfidenceTier::Rejected, true), "{expr}");
        }
    }

    #[test]
    fn anchored_selectors_are_medium() {
        assert_eq!(check("#login"), (ConfidenceTier::Medium, false));
        assert_eq!(check(".submit-order"), (ConfidenceTier::Medium, false));
        assert_eq!(check("form#checkout div span"), (ConfidenceTier::Medium, false));
        assert_eq!(check(r#"input[name="email"]"#), (ConfidenceTier::Medium, false));
        assert_eq!(check("[data-testid]"), (ConfidenceTier::Medium, false));
    }

    #[test]
    fn classification_is_pure() {
        let classifier = SelectorClassifier::new();
        for expr in ["button", "#x", "li:nth-child(2)", "role=link"] {
            assert_eq!(classifier.classify(expr), classifier.classify(expr));
        }
    }

    #[test]
    fn infers_strategy_kind() {
        assert_eq!(strategy_kind_of(r#"[data-testid="x"]"#), StrategyKind::TestId);
        assert_eq!(strategy_kind_of(r#"role=link[name="Docs"]"#), StrategyKind::RoleAndName);
        assert_eq!(strategy_kind_of("role=link"), StrategyKind::Role);
        assert_eq!(strategy_kind_of("text=Docs"), StrategyKind::Text);
        assert_eq!(strategy_kind_of(r#"label="Email""#), StrategyKind::Label);
        assert_eq!(strategy_kind_of("#main"), StrategyKind::RawCss);
        assert_eq!(strategy_kind_of(" "), StrategyKind::None);
    }
}
