//! Candidate generation strategies.
//!
//! A target description is matched against snapshot nodes by keyword; every
//! matched node is then handed to each [`LocatorStrategy`] in turn, which
//! proposes the selector expressions it knows how to build for it.

use action_primitives::{quote_value, PageSnapshot, SnapshotNode};

use crate::types::StrategyKind;

/// Words that carry no identifying signal in a target description.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "at", "by", "click", "element", "enter", "for", "from", "in", "into",
    "of", "on", "open", "page", "press", "select", "tap", "the", "to", "type", "with",
];

/// Parsed form of a free-text target description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescription {
    pub raw: String,
    pub keywords: Vec<String>,
    pub role_hint: Option<&'static str>,
    /// Text quoted inside the description, e.g. `the "Sign in" button`.
    pub quoted: Option<String>,
}

impl TargetDescription {
    pub fn parse(raw: &str) -> Self {
        let quoted = extract_quoted(raw);
        let lowered = raw.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut role_hint = None;
        let mut keywords = Vec::new();
        for (index, word) in words.iter().enumerate() {
            let next = words.get(index + 1).copied();
            if let Some(role) = role_word(word, next) {
                role_hint = Some(role);
                continue;
            }
            if STOP_WORDS.contains(word) {
                continue;
            }
            if !keywords.iter().any(|k: &String| k.as_str() == *word) {
                keywords.push(word.to_string());
            }
        }

        Self {
            raw: raw.trim().to_string(),
            keywords,
            role_hint,
            quoted,
        }
    }

    /// How well `node` fits this description, 0.0 meaning no match.
    pub fn score(&self, node: &SnapshotNode) -> f32 {
        let node_role = node.effective_role();
        let role_matches = match (self.role_hint, node_role.as_deref()) {
            (Some(hint), Some(role)) => role_matches(hint, role, node),
            (Some(hint), None) => hint == "textbox" && node.is_editable(),
            (None, _) => false,
        };

        if self.keywords.is_empty() {
            return if role_matches { 0.5 } else { 0.0 };
        }

        if let Some(quoted) = &self.quoted {
            let quoted = quoted.to_lowercase();
            let exact = [node.accessible_name(), Some(node.visible_text()), node.label.clone()]
                .into_iter()
                .flatten()
                .any(|value| value.to_lowercase() == quoted);
            if exact {
                return if role_matches { 2.0 } else { 1.5 };
            }
        }

        let haystack = haystack(node);
        let hits = self
            .keywords
            .iter()
            .filter(|keyword| haystack.contains(keyword.as_str()))
            .count();
        let coverage = hits as f32 / self.keywords.len() as f32;
        if coverage < 0.5 {
            return 0.0;
        }
        match self.role_hint {
            Some(_) if role_matches => coverage + 0.5,
            Some(_) => coverage - 0.25,
            None => coverage,
        }
    }
}

fn extract_quoted(raw: &str) -> Option<String> {
    for quote in ['"', '\'', '“'] {
        let close = if quote == '“' { '”' } else { quote };
        if let Some(start) = raw.find(quote) {
            let rest = &raw[start + quote.len_utf8()..];
            if let Some(end) = rest.find(close) {
                let inner = rest[..end].trim();
                if !inner.is_empty() {
                    return Some(inner.to_string());
                }
            }
        }
    }
    None
}

/// Map description words to ARIA roles.
fn role_word(word: &str, next: Option<&str>) -> Option<&'static str> {
    let role = match word {
        "button" | "btn" => "button",
        "link" | "hyperlink" => "link",
        "field" | "input" | "textbox" | "textarea" | "searchbox" => "textbox",
        "box" if !matches!(next, Some("button")) => "textbox",
        "checkbox" => "checkbox",
        "radio" => "radio",
        "dropdown" | "combobox" | "picker" => "combobox",
        "heading" | "headline" => "heading",
        "tab" => "tab",
        "menuitem" => "menuitem",
        "menu" if matches!(next, Some("item")) => "menuitem",
        "image" | "picture" | "img" | "logo" => "img",
        _ => return None,
    };
    Some(role)
}

fn role_matches(hint: &str, role: &str, node: &SnapshotNode) -> bool {
    hint == role || (hint == "textbox" && (role == "searchbox" || node.is_editable()))
}

fn haystack(node: &SnapshotNode) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.extend(node.accessible_name());
    parts.push(node.visible_text());
    parts.extend(node.label.clone());
    parts.extend(node.test_id.as_deref().map(split_identifier));
    parts.extend(node.id.as_deref().map(split_identifier));
    parts.extend(node.classes.iter().map(|class| split_identifier(class)));
    for attr in ["placeholder", "name", "title", "aria-label", "alt", "value"] {
        parts.extend(node.attributes.get(attr).cloned());
    }
    parts.join(" ").to_lowercase()
}

fn split_identifier(raw: &str) -> String {
    raw.replace(['-', '_'], " ")
}

/// Proposes selector expressions for one matched node.
pub trait LocatorStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn propose(&self, snapshot: &PageSnapshot, index: usize) -> Vec<String>;
}

/// `[data-testid="..."]`
pub struct TestIdStrategy;

impl LocatorStrategy for TestIdStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TestId
    }

    fn propose(&self, snapshot: &PageSnapshot, index: usize) -> Vec<String> {
        snapshot.nodes[index]
            .test_id
            .iter()
            .filter(|id| !id.trim().is_empty())
            .map(|id| format!("[data-testid={}]", quote_value(id)))
            .collect()
    }
}

/// `role=<role>[name="..."]`
pub struct RoleAndNameStrategy;

impl LocatorStrategy for RoleAndNameStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RoleAndName
    }

    fn propose(&self, snapshot: &PageSnapshot, index: usize) -> Vec<String> {
        let node = &snapshot.nodes[index];
        match (node.effective_role(), node.accessible_name()) {
            (Some(role), Some(name)) => vec![format!("role={role}[name={}]", quote_value(&name))],
            _ => Vec::new(),
        }
    }
}

/// `role=<role>`
pub struct RoleStrategy;

impl LocatorStrategy for RoleStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Role
    }

    fn propose(&self, snapshot: &PageSnapshot, index: usize) -> Vec<String> {
        snapshot.nodes[index]
            .effective_role()
            .map(|role| vec![format!("role={role}")])
            .unwrap_or_default()
    }
}

/// `text="..."`, skipped for long or empty text.
pub struct TextStrategy {
    pub max_len: usize,
}

impl Default for TextStrategy {
    fn default() -> Self {
        Self { max_len: 80 }
    }
}

impl LocatorStrategy for TextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Text
    }

    fn propose(&self, snapshot: &PageSnapshot, index: usize) -> Vec<String> {
        let text = snapshot.nodes[index].visible_text();
        if text.is_empty() || text.chars().count() > self.max_len {
            return Vec::new();
        }
        vec![format!("text={}", quote_value(&text))]
    }
}

/// `label="..."`
pub struct LabelStrategy;

impl LocatorStrategy for LabelStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Label
    }

    fn propose(&self, snapshot: &PageSnapshot, index: usize) -> Vec<String> {
        let node = &snapshot.nodes[index];
        node.label
            .iter()
            .chain(node.attributes.get("aria-label"))
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .take(1)
            .map(|label| format!("label={}", quote_value(label)))
            .collect()
    }
}

/// Raw CSS built from the node's structure: `#id`, else `tag.class`, else
/// the bare tag, followed by a positional variant.
pub struct StructuralStrategy;

impl LocatorStrategy for StructuralStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawCss
    }

    fn propose(&self, snapshot: &PageSnapshot, index: usize) -> Vec<String> {
        let node = &snapshot.nodes[index];
        let mut out = Vec::new();
        if let Some(id) = node.id.as_deref().filter(|id| is_css_ident(id)) {
            out.push(format!("#{id}"));
        } else if let Some(class) = node.classes.iter().find(|class| is_css_ident(class)) {
            out.push(format!("{}.{}", node.tag, class));
        } else {
            out.push(node.tag.clone());
        }
        out.push(format!("{}:nth-of-type({})", node.tag, snapshot.nth_of_type(index)));
        out
    }
}

fn is_css_ident(raw: &str) -> bool {
    let mut chars = raw.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Strategies in generation order.
pub fn default_strategies() -> Vec<Box<dyn LocatorStrategy>> {
    vec![
        Box::new(TestIdStrategy),
        Box::new(RoleAndNameStrategy),
        Box::new(RoleStrategy),
        Box::new(TextStrategy::default()),
        Box::new(LabelStrategy),
        Box::new(StructuralStrategy),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PageSnapshot {
        PageSnapshot::new(
            "https://app.test",
            "App",
            vec![
                SnapshotNode::new("button")
                    .with_text("Sign in")
                    .with_test_id("login-submit")
                    .with_id("signin"),
                SnapshotNode::new("input")
                    .with_label("Email address")
                    .with_attribute("type", "email"),
                SnapshotNode::new("div").with_class("hero-banner").with_text("Welcome back"),
            ],
        )
    }

    #[test]
    fn parses_keywords_and_role_hint() {
        let target = TargetDescription::parse("Click the Sign in button");
        assert_eq!(target.keywords, vec!["sign".to_string()]);
        assert_eq!(target.role_hint, Some("button"));

        let search = TargetDescription::parse("search box");
        assert_eq!(search.keywords, vec!["search".to_string()]);
        assert_eq!(search.role_hint, Some("textbox"));

        let quoted = TargetDescription::parse("the \"Add to cart\" link");
        assert_eq!(quoted.quoted.as_deref(), Some("Add to cart"));
        assert_eq!(quoted.role_hint, Some("link"));
    }

    #[test]
    fn scores_prefer_role_matches() {
        let snap = snapshot();
        let target = TargetDescription::parse("Sign in button");
        assert!(target.score(&snap.nodes[0]) > 1.0);
        assert_eq!(target.score(&snap.nodes[2]), 0.0);

        let email = TargetDescription::parse("email field");
        assert!(email.score(&snap.nodes[1]) >= 1.0);

        let role_only = TargetDescription::parse("button");
        assert_eq!(role_only.score(&snap.nodes[0]), 0.5);
        assert_eq!(role_only.score(&snap.nodes[1]), 0.0);
    }

    #[test]
    fn strategies_propose_expected_expressions() {
        let snap = snapshot();
        let proposals: Vec<(StrategyKind, Vec<String>)> = default_strategies()
            .iter()
            .map(|s| (s.kind(), s.propose(&snap, 0)))
            .collect();
        assert_eq!(proposals[0].1, vec![r#"[data-testid="login-submit"]"#.to_string()]);
        assert_eq!(proposals[1].1, vec![r#"role=button[name="Sign in"]"#.to_string()]);
        assert_eq!(proposals[2].1, vec!["role=button".to_string()]);
        assert_eq!(proposals[3].1, vec![r#"text="Sign in""#.to_string()]);
        assert!(proposals[4].1.is_empty());
        assert_eq!(
            proposals[5].1,
            vec!["#signin".to_string(), "button:nth-of-type(1)".to_string()]
        );

        let label = LabelStrategy.propose(&snap, 1);
        assert_eq!(label, vec![r#"label="Email address""#.to_string()]);
        let structural = StructuralStrategy.propose(&snap, 2);
        assert_eq!(structural[0], "div.hero-banner");
    }
}
