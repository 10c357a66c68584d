//! Locator rendering and the hoisted constant table.

use std::collections::{HashMap, HashSet};

use action_locator::{classify, Classification, SelectorCandidate, StrategyKind};
use action_primitives::query::CssCompound;
use action_primitives::SelectorQuery;

/// A locator hoisted into a named constant at the top of the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorConstant {
    pub name: String,
    pub expression: String,
    pub kind: StrategyKind,
    pub classification: Classification,
    /// Playwright expression building the locator from `page`.
    pub code: String,
}

/// Constants keyed by `(expression, strategy kind)`, in first-use order.
#[derive(Debug, Default)]
pub struct LocatorTable {
    constants: Vec<LocatorConstant>,
    by_key: HashMap<(String, StrategyKind), usize>,
    names: HashSet<String>,
}

impl LocatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant for `candidate`, registered on first use.
    pub fn intern(&mut self, candidate: &SelectorCandidate) -> &LocatorConstant {
        let key = (candidate.expression.clone(), candidate.strategy_kind);
        if let Some(&index) = self.by_key.get(&key) {
            return &self.constants[index];
        }

        let base = constant_base(&candidate.expression);
        let mut name = base.clone();
        let mut suffix = 2;
        while self.names.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.names.insert(name.clone());

        let index = self.constants.len();
        self.constants.push(LocatorConstant {
            name,
            expression: candidate.expression.clone(),
            kind: candidate.strategy_kind,
            classification: classify(&candidate.expression),
            code: render_locator(&candidate.expression),
        });
        self.by_key.insert(key, index);
        &self.constants[index]
    }

    pub fn constants(&self) -> &[LocatorConstant] {
        &self.constants
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

/// Playwright locator for a selector expression.
pub fn render_locator(expression: &str) -> String {
    let expr = expression.trim();
    match SelectorQuery::parse(expr) {
        Ok(SelectorQuery::Role {
            role,
            name: Some(name),
        }) => format!(
            "page.getByRole({}, {{ name: {}, exact: true }})",
            js_string(&role),
            js_string(&name)
        ),
        Ok(SelectorQuery::Role { role, name: None }) => {
            format!("page.getByRole({})", js_string(&role))
        }
        Ok(SelectorQuery::Text { text, exact }) => {
            format!("page.getByText({}{})", js_string(&text), exact_option(exact))
        }
        Ok(SelectorQuery::Label { text, exact }) => {
            format!("page.getByLabel({}{})", js_string(&text), exact_option(exact))
        }
        Ok(SelectorQuery::Css(chain)) => match test_id_of(&chain) {
            Some(test_id) => format!("page.getByTestId({})", js_string(test_id)),
            None => format!("page.locator({})", js_string(expr)),
        },
        Err(_) => format!("page.locator({})", js_string(expr)),
    }
}

/// JavaScript string literal for `raw`.
///
/// JSON leaves U+2028 and U+2029 unescaped, but JavaScript treats both as line
/// terminators, so they are escaped here to keep a literal on one line.
pub fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn exact_option(exact: bool) -> &'static str {
    if exact {
        ", { exact: true }"
    } else {
        ""
    }
}

/// `data-testid` value when the chain is nothing but that attribute.
fn test_id_of(chain: &[CssCompound]) -> Option<&str> {
    let [compound] = chain else {
        return None;
    };
    let plain = compound.tag.is_none()
        && compound.id.is_none()
        && compound.classes.is_empty()
        && compound.position.is_none();
    match compound.attributes.as_slice() {
        [attr] if plain && attr.name == "data-testid" => attr.value.as_deref(),
        _ => None,
    }
}

fn constant_base(expression: &str) -> String {
    let (prefix, words) = match SelectorQuery::parse(expression) {
        Ok(SelectorQuery::Role {
            role,
            name: Some(name),
        }) => (upper_words(&role), upper_words(&name)),
        Ok(SelectorQuery::Role { role, name: None }) => ("ROLE".to_string(), upper_words(&role)),
        Ok(SelectorQuery::Text { text, .. }) => ("TEXT".to_string(), upper_words(&text)),
        Ok(SelectorQuery::Label { text, .. }) => ("LABEL".to_string(), upper_words(&text)),
        Ok(SelectorQuery::Css(chain)) => match test_id_of(&chain) {
            Some(test_id) => ("TESTID".to_string(), upper_words(test_id)),
            None => ("CSS".to_string(), upper_words(expression)),
        },
        Err(_) => ("CSS".to_string(), upper_words(expression)),
    };
    let prefix = if prefix.is_empty() {
        "LOCATOR".to_string()
    } else {
        prefix
    };
    if words.is_empty() {
        prefix
    } else {
        format!("{prefix}_{words}")
    }
}

/// First four ASCII alphanumeric runs, upper-cased and joined by `_`.
fn upper_words(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .take(4)
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::strategy_kind_of;

    fn candidate(expr: &str) -> SelectorCandidate {
        SelectorCandidate::new(expr, strategy_kind_of(expr), classify(expr))
    }

    #[test]
    fn renders_playwright_locators() {
        assert_eq!(
            render_locator(r#"[data-testid="login-submit"]"#),
            r#"page.getByTestId("login-submit")"#
        );
        assert_eq!(
            render_locator(r#"role=button[name="Sign in"]"#),
            r#"page.getByRole("button", { name: "Sign in", exact: true })"#
        );
        assert_eq!(render_locator("role=link"), r#"page.getByRole("link")"#);
        assert_eq!(
            render_locator(r#"text="Pricing""#),
            r#"page.getByText("Pricing", { exact: true })"#
        );
        assert_eq!(render_locator(r#"label="Email""#), r#"page.getByLabel("Email", { exact: true })"#);
        assert_eq!(render_locator("#total"), r##"page.locator("#total")"##);
        assert_eq!(
            render_locator(r#"[data-test="buy"]"#),
            r#"page.locator("[data-test=\"buy\"]")"#
        );
    }

    #[test]
    fn names_constants_after_what_they_match() {
        let mut table = LocatorTable::new();
        assert_eq!(table.intern(&candidate(r#"role=button[name="Sign in"]"#)).name, "BUTTON_SIGN_IN");
        assert_eq!(table.intern(&candidate(r#"[data-testid="login"]"#)).name, "TESTID_LOGIN");
        assert_eq!(table.intern(&candidate(r#"label="Email""#)).name, "LABEL_EMAIL");
        assert_eq!(table.intern(&candidate("text=Pricing")).name, "TEXT_PRICING");
        assert_eq!(table.intern(&candidate("input")).name, "CSS_INPUT");
        assert_eq!(table.intern(&candidate("role=textbox")).name, "ROLE_TEXTBOX");
    }

    #[test]
    fn same_expression_and_kind_share_a_constant() {
        let mut table = LocatorTable::new();
        let first = table.intern(&candidate("#total")).name.clone();
        let again = table.intern(&candidate("#total")).name.clone();
        assert_eq!(first, again);
        assert_eq!(table.constants().len(), 1);

        let other_kind = SelectorCandidate::new("#total", StrategyKind::Text, classify("#total"));
        assert_eq!(table.intern(&other_kind).name, "CSS_TOTAL_2");
        assert_eq!(table.constants().len(), 2);
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let mut table = LocatorTable::new();
        assert_eq!(table.intern(&candidate("text=Sign in")).name, "TEXT_SIGN_IN");
        assert_eq!(table.intern(&candidate(r#"text="Sign in""#)).name, "TEXT_SIGN_IN_2");
        assert_eq!(table.intern(&candidate(r#"text="Sign-in""#)).name, "TEXT_SIGN_IN_3");
    }
}
