//! Page snapshots handed to the locator.
//!
//! A snapshot is a flat list of element nodes with the accessibility and
//! attribute data strategies need. Position information is derived from the
//! list order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One element as seen by the locator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Accessible name when it differs from the visible text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Text of an associated `<label>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl SnapshotNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            visible: true,
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Explicit role, or the implicit ARIA role of the tag.
    pub fn effective_role(&self) -> Option<String> {
        if let Some(role) = &self.role {
            return Some(role.to_ascii_lowercase());
        }
        let implied = match self.tag.as_str() {
            "button" => "button",
            "a" if self.attributes.contains_key("href") => "link",
            "input" => match self.input_type().as_str() {
                "button" | "submit" | "reset" => "button",
                "checkbox" => "checkbox",
                "radio" => "radio",
                "hidden" => return None,
                _ => "textbox",
            },
            "textarea" => "textbox",
            "select" => "combobox",
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            "img" => "img",
            "li" => "listitem",
            "ul" | "ol" => "list",
            "nav" => "navigation",
            "table" => "table",
            "option" => "option",
            _ => return None,
        };
        Some(implied.to_string())
    }

    /// Accessible name: explicit name, aria-label, label text, then visible text.
    pub fn accessible_name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.attributes.get("aria-label").cloned())
            .or_else(|| self.label.clone())
            .or_else(|| self.text.clone())
            .map(|name| normalize_whitespace(&name))
            .filter(|name| !name.is_empty())
    }

    pub fn visible_text(&self) -> String {
        self.text
            .as_deref()
            .map(normalize_whitespace)
            .unwrap_or_default()
    }

    /// Attribute lookup that also answers for the fields lifted out of the
    /// attribute map (`id`, `class`, test ids and `role`).
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" => (!self.classes.is_empty()).then(|| self.classes.join(" ")),
            "data-testid" | "data-test-id" | "data-test" => self
                .test_id
                .clone()
                .or_else(|| self.attributes.get(name).cloned()),
            "role" => self.role.clone(),
            _ => self.attributes.get(name).cloned(),
        }
    }

    pub fn input_type(&self) -> String {
        self.attributes
            .get("type")
            .map(|t| t.to_ascii_lowercase())
            .unwrap_or_else(|| "text".to_string())
    }

    /// Whether `fill` makes sense on this element.
    pub fn is_editable(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.input_type().as_str(),
                "button" | "submit" | "reset" | "checkbox" | "radio" | "hidden" | "image"
            ),
            _ => self
                .attributes
                .get("contenteditable")
                .map(|v| v != "false")
                .unwrap_or(false),
        }
    }
}

/// Flat page snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>, nodes: Vec<SnapshotNode>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            nodes,
        }
    }

    pub fn blank() -> Self {
        Self::new("about:blank", "", Vec::new())
    }

    /// 1-based position of `nodes[index]` among nodes sharing its tag.
    pub fn nth_of_type(&self, index: usize) -> usize {
        let Some(node) = self.nodes.get(index) else {
            return 0;
        };
        self.nodes[..=index]
            .iter()
            .filter(|candidate| candidate.tag == node.tag)
            .count()
    }
}

pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_roles() {
        assert_eq!(
            SnapshotNode::new("BUTTON").effective_role().as_deref(),
            Some("button")
        );
        assert_eq!(
            SnapshotNode::new("a")
                .with_attribute("href", "/x")
                .effective_role()
                .as_deref(),
            Some("link")
        );
        assert_eq!(SnapshotNode::new("a").effective_role(), None);
        assert_eq!(
            SnapshotNode::new("input")
                .with_attribute("type", "email")
                .effective_role()
                .as_deref(),
            Some("textbox")
        );
        assert_eq!(
            SnapshotNode::new("div")
                .with_role("Tab")
                .effective_role()
                .as_deref(),
            Some("tab")
        );
    }

    #[test]
    fn accessible_name_precedence() {
        let node = SnapshotNode::new("button")
            .with_text("  Sign   in ")
            .with_attribute("aria-label", "Log in");
        assert_eq!(node.accessible_name().as_deref(), Some("Log in"));
        let plain = SnapshotNode::new("button").with_text("  Sign   in ");
        assert_eq!(plain.accessible_name().as_deref(), Some("Sign in"));
    }

    #[test]
    fn nth_of_type_counts_same_tag_only() {
        let snapshot = PageSnapshot::new(
            "https://example.com",
            "Example",
            vec![
                SnapshotNode::new("li"),
                SnapshotNode::new("span"),
                SnapshotNode::new("li"),
            ],
        );
        assert_eq!(snapshot.nth_of_type(0), 1);
        assert_eq!(snapshot.nth_of_type(2), 2);
        assert_eq!(snapshot.nth_of_type(9), 0);
    }

    #[test]
    fn editable_elements() {
        assert!(SnapshotNode::new("input").is_editable());
        assert!(!SnapshotNode::new("input")
            .with_attribute("type", "submit")
            .is_editable());
        assert!(SnapshotNode::new("div")
            .with_attribute("contenteditable", "true")
            .is_editable());
        assert!(!SnapshotNode::new("button").is_editable());
    }
}
