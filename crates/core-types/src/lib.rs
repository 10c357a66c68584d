//! Shared primitives used across the TraceCraft crates.
//!
//! Identifiers are uuid-backed newtypes; the step vocabulary enums are the
//! small closed sets that both the plan model and the browser tool surface
//! need to agree on.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

impl CoreError {
    fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Condition a `wait` step blocks on.
///
/// The first four are scoped to an element and need a target; the load
/// states apply to the page; `Duration` sleeps for the step's value in ms.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum WaitCondition {
    Visible,
    Hidden,
    Attached,
    Detached,
    Load,
    DomContentLoaded,
    NetworkIdle,
    Duration,
}

impl WaitCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitCondition::Visible => "visible",
            WaitCondition::Hidden => "hidden",
            WaitCondition::Attached => "attached",
            WaitCondition::Detached => "detached",
            WaitCondition::Load => "load",
            WaitCondition::DomContentLoaded => "domcontentloaded",
            WaitCondition::NetworkIdle => "networkidle",
            WaitCondition::Duration => "duration",
        }
    }

    pub fn is_element_scoped(&self) -> bool {
        matches!(
            self,
            WaitCondition::Visible
                | WaitCondition::Hidden
                | WaitCondition::Attached
                | WaitCondition::Detached
        )
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaitCondition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visible" => Ok(WaitCondition::Visible),
            "hidden" => Ok(WaitCondition::Hidden),
            "attached" => Ok(WaitCondition::Attached),
            "detached" => Ok(WaitCondition::Detached),
            "load" => Ok(WaitCondition::Load),
            "domcontentloaded" => Ok(WaitCondition::DomContentLoaded),
            "networkidle" => Ok(WaitCondition::NetworkIdle),
            "duration" | "timeout" => Ok(WaitCondition::Duration),
            other => Err(CoreError::unknown("wait condition", other)),
        }
    }
}

/// Check performed by an `assert` step.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AssertionType {
    TextEquals,
    TextContains,
    Visible,
    Hidden,
    UrlContains,
    TitleContains,
}

impl AssertionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionType::TextEquals => "textEquals",
            AssertionType::TextContains => "textContains",
            AssertionType::Visible => "visible",
            AssertionType::Hidden => "hidden",
            AssertionType::UrlContains => "urlContains",
            AssertionType::TitleContains => "titleContains",
        }
    }

    /// Whether the assertion inspects an element rather than the page.
    pub fn is_element_scoped(&self) -> bool {
        !matches!(
            self,
            AssertionType::UrlContains | AssertionType::TitleContains
        )
    }
}

impl fmt::Display for AssertionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssertionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "textequals" => Ok(AssertionType::TextEquals),
            "textcontains" => Ok(AssertionType::TextContains),
            "visible" => Ok(AssertionType::Visible),
            "hidden" => Ok(AssertionType::Hidden),
            "urlcontains" => Ok(AssertionType::UrlContains),
            "titlecontains" => Ok(AssertionType::TitleContains),
            _ => Err(CoreError::unknown("assertion type", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
        assert_ne!(SessionId::new().to_string(), SessionId::new().to_string());
    }

    #[test]
    fn wait_condition_scope() {
        assert!(WaitCondition::Visible.is_element_scoped());
        assert!(!WaitCondition::NetworkIdle.is_element_scoped());
        assert!(!WaitCondition::Duration.is_element_scoped());
    }

    #[test]
    fn parses_wait_condition_case_insensitively() {
        assert_eq!(
            "NetworkIdle".parse::<WaitCondition>().unwrap(),
            WaitCondition::NetworkIdle
        );
        assert_eq!(
            "timeout".parse::<WaitCondition>().unwrap(),
            WaitCondition::Duration
        );
        assert!("sideways".parse::<WaitCondition>().is_err());
    }

    #[test]
    fn parses_assertion_type_spellings() {
        assert_eq!(
            "text_contains".parse::<AssertionType>().unwrap(),
            AssertionType::TextContains
        );
        assert_eq!(
            "urlContains".parse::<AssertionType>().unwrap(),
            AssertionType::UrlContains
        );
        assert!(!AssertionType::TitleContains.is_element_scoped());
        assert!(AssertionType::Visible.is_element_scoped());
    }

    #[cfg(feature = "serde-full")]
    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&WaitCondition::DomContentLoaded).unwrap();
        assert_eq!(json, "\"domContentLoaded\"");
        let back: AssertionType = serde_json::from_str("\"textEquals\"").unwrap();
        assert_eq!(back, AssertionType::TextEquals);
    }
}
