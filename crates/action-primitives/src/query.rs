//! Selector expression language.
//!
//! Expressions are the strings carried by [`crate::ToolCall`]s and emitted by
//! the locator:
//!
//! - `role=button[name="Sign in"]` / `role=button`
//! - `text="Pricing"` (exact) / `text=pricing` (substring, case-insensitive)
//! - `label="Email"`
//! - a CSS subset: tags, `#id`, `.class`, `[attr]`, `[attr="v"]`,
//!   `:nth-of-type(n)`, `:nth-child(n)`, `:first-child`, `:last-child` and
//!   descendant chains. Snapshots are flat, so only the last compound of a
//!   chain is checked against a node.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ActionError;
use crate::snapshot::{normalize_whitespace, PageSnapshot, SnapshotNode};

static ROLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^([A-Za-z][\w-]*)\s*(?:\[\s*name\s*=\s*(?:"((?:[^"\\]|\\.)*)"|'([^']*)'|([^\]"']*?))\s*\])?$"#,
    )
    .expect("role selector regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorQuery {
    Role { role: String, name: Option<String> },
    Text { text: String, exact: bool },
    Label { text: String, exact: bool },
    Css(Vec<CssCompound>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssCompound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeMatch>,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatch {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Nth(usize),
    Last,
}

impl SelectorQuery {
    pub fn parse(expression: &str) -> Result<Self, ActionError> {
        let expr = expression.trim();
        if expr.is_empty() {
            return Err(ActionError::InvalidSelector("empty selector".to_string()));
        }
        if let Some(rest) = expr.strip_prefix("role=") {
            return parse_role(rest.trim(), expression);
        }
        if let Some(rest) = expr.strip_prefix("text=") {
            let (text, exact) = parse_text_value(rest, expression)?;
            return Ok(SelectorQuery::Text { text, exact });
        }
        if let Some(rest) = expr.strip_prefix("label=") {
            let (text, exact) = parse_text_value(rest, expression)?;
            return Ok(SelectorQuery::Label { text, exact });
        }
        parse_css(expr).map(SelectorQuery::Css)
    }

    /// Whether `snapshot.nodes[index]` matches this query.
    pub fn matches(&self, snapshot: &PageSnapshot, index: usize) -> bool {
        let Some(node) = snapshot.nodes.get(index) else {
            return false;
        };
        match self {
            SelectorQuery::Role { role, name } => {
                let role_ok = node
                    .effective_role()
                    .map(|actual| actual.eq_ignore_ascii_case(role))
                    .unwrap_or(false);
                role_ok
                    && match name {
                        Some(expected) => node
                            .accessible_name()
                            .map(|actual| {
                                actual.to_lowercase() == normalize_whitespace(expected).to_lowercase()
                            })
                            .unwrap_or(false),
                        None => true,
                    }
            }
            SelectorQuery::Text { text, exact } => text_matches(&node.visible_text(), text, *exact),
            SelectorQuery::Label { text, exact } => {
                let labels = [node.label.as_deref(), node.attributes.get("aria-label").map(String::as_str)];
                labels
                    .into_iter()
                    .flatten()
                    .any(|label| label_matches(label, text, *exact))
            }
            SelectorQuery::Css(chain) => chain
                .last()
                .map(|compound| compound_matches(compound, node, snapshot, index))
                .unwrap_or(false),
        }
    }

    /// Indexes of every matching node, in document order.
    pub fn select(&self, snapshot: &PageSnapshot) -> Vec<usize> {
        (0..snapshot.nodes.len())
            .filter(|index| self.matches(snapshot, *index))
            .collect()
    }
}

/// Quote a value for use inside a selector expression.
pub fn quote_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_role(rest: &str, original: &str) -> Result<SelectorQuery, ActionError> {
    let caps = ROLE_RE
        .captures(rest)
        .ok_or_else(|| ActionError::InvalidSelector(original.to_string()))?;
    let role = caps
        .get(1)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let name = caps
        .get(2)
        .map(|m| unescape(m.as_str()))
        .or_else(|| caps.get(3).map(|m| m.as_str().to_string()))
        .or_else(|| caps.get(4).map(|m| m.as_str().trim().to_string()))
        .filter(|name| !name.is_empty());
    Ok(SelectorQuery::Role { role, name })
}

fn parse_text_value(rest: &str, original: &str) -> Result<(String, bool), ActionError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(ActionError::InvalidSelector(original.to_string()));
    }
    if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
        return Ok((unescape(&rest[1..rest.len() - 1]), true));
    }
    if rest.len() >= 2 && rest.starts_with('\'') && rest.ends_with('\'') {
        return Ok((rest[1..rest.len() - 1].to_string(), true));
    }
    Ok((rest.to_string(), false))
}

fn text_matches(actual: &str, expected: &str, exact: bool) -> bool {
    let expected = normalize_whitespace(expected);
    if exact {
        actual == expected
    } else {
        actual.to_lowercase().contains(&expected.to_lowercase())
    }
}

fn label_matches(actual: &str, expected: &str, exact: bool) -> bool {
    let actual = normalize_whitespace(actual).to_lowercase();
    let expected = normalize_whitespace(expected).to_lowercase();
    if exact {
        actual == expected
    } else {
        actual.contains(&expected)
    }
}

fn compound_matches(
    compound: &CssCompound,
    node: &SnapshotNode,
    snapshot: &PageSnapshot,
    index: usize,
) -> bool {
    if let Some(tag) = &compound.tag {
        if tag != "*" && !tag.eq_ignore_ascii_case(&node.tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if node.id.as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    if !compound
        .classes
        .iter()
        .all(|class| node.classes.iter().any(|c| c == class))
    {
        return false;
    }
    for attr in &compound.attributes {
        match (node.attribute(&attr.name), &attr.value) {
            (None, _) => return false,
            (Some(actual), Some(expected)) if &actual != expected => return false,
            _ => {}
        }
    }
    match compound.position {
        Some(Position::Nth(n)) => snapshot.nth_of_type(index) == n,
        Some(Position::Last) => {
            let total = snapshot.nodes.iter().filter(|n| n.tag == node.tag).count();
            snapshot.nth_of_type(index) == total
        }
        None => true,
    }
}

fn parse_css(expr: &str) -> Result<Vec<CssCompound>, ActionError> {
    let invalid = || ActionError::InvalidSelector(expr.to_string());
    let chars: Vec<char> = expr.chars().collect();
    let mut chain = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        while pos < chars.len() && (chars[pos].is_whitespace() || matches!(chars[pos], '>' | '+' | '~')) {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }
        let mut compound = CssCompound::default();
        let start = pos;
        while pos < chars.len() && !chars[pos].is_whitespace() && !matches!(chars[pos], '>' | '+' | '~') {
            match chars[pos] {
                '#' => {
                    pos += 1;
                    compound.id = Some(read_ident(&chars, &mut pos).ok_or_else(invalid)?);
                }
                '.' => {
                    pos += 1;
                    compound
                        .classes
                        .push(read_ident(&chars, &mut pos).ok_or_else(invalid)?);
                }
                '[' => {
                    pos += 1;
                    compound
                        .attributes
                        .push(read_attribute(&chars, &mut pos).ok_or_else(invalid)?);
                }
                ':' => {
                    pos += 1;
                    compound.position = Some(read_pseudo(&chars, &mut pos).ok_or_else(invalid)?);
                }
                '*' if pos == start => {
                    pos += 1;
                    compound.tag = Some("*".to_string());
                }
                c if (c.is_ascii_alphabetic()) && pos == start => {
                    compound.tag = Some(
                        read_ident(&chars, &mut pos)
                            .ok_or_else(invalid)?
                            .to_ascii_lowercase(),
                    );
                }
                _ => return Err(invalid()),
            }
        }
        chain.push(compound);
    }

    if chain.is_empty() {
        return Err(invalid());
    }
    Ok(chain)
}

fn read_ident(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && (chars[*pos].is_alphanumeric() || matches!(chars[*pos], '-' | '_')) {
        *pos += 1;
    }
    (*pos > start).then(|| chars[start..*pos].iter().collect())
}

fn read_attribute(chars: &[char], pos: &mut usize) -> Option<AttributeMatch> {
    skip_spaces(chars, pos);
    let name = read_ident(chars, pos)?;
    skip_spaces(chars, pos);
    let value = match chars.get(*pos)? {
        ']' => None,
        '=' => {
            *pos += 1;
            skip_spaces(chars, pos);
            Some(read_attribute_value(chars, pos)?)
        }
        _ => return None,
    };
    skip_spaces(chars, pos);
    if chars.get(*pos) != Some(&']') {
        return None;
    }
    *pos += 1;
    Some(AttributeMatch {
        name: name.to_ascii_lowercase(),
        value,
    })
}

fn read_attribute_value(chars: &[char], pos: &mut usize) -> Option<String> {
    match chars.get(*pos)? {
        quote @ ('"' | '\'') => {
            let quote = *quote;
            *pos += 1;
            let mut value = String::new();
            while let Some(&c) = chars.get(*pos) {
                *pos += 1;
                if c == '\\' {
                    value.push(*chars.get(*pos)?);
                    *pos += 1;
                } else if c == quote {
                    return Some(value);
                } else {
                    value.push(c);
                }
            }
            None
        }
        _ => {
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != ']' && !chars[*pos].is_whitespace() {
                *pos += 1;
            }
            (*pos > start).then(|| chars[start..*pos].iter().collect())
        }
    }
}

fn read_pseudo(chars: &[char], pos: &mut usize) -> Option<Position> {
    let name = read_ident(chars, pos)?.to_ascii_lowercase();
    match name.as_str() {
        "first-child" | "first-of-type" => Some(Position::Nth(1)),
        "last-child" | "last-of-type" => Some(Position::Last),
        "nth-child" | "nth-of-type" => {
            if chars.get(*pos) != Some(&'(') {
                return None;
            }
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos].is_ascii_digit() {
                *pos += 1;
            }
            let n: usize = chars[start..*pos].iter().collect::<String>().parse().ok()?;
            if chars.get(*pos) != Some(&')') {
                return None;
            }
            *pos += 1;
            Some(Position::Nth(n))
        }
        _ => None,
    }
}

fn skip_spaces(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}
