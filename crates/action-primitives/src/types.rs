//! Tool call and tool output types

use serde::{Deserialize, Serialize};
use tracecraft_core_types::{AssertionType, WaitCondition};

/// A concrete browser tool invocation.
///
/// Serializes as `{"tool": "<name>", "arguments": {...}}`, which is also the
/// shape stored in the JSON trace export, so an exported step can be fed
/// straight back into [`crate::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "camelCase")]
pub enum ToolCall {
    Navigate {
        url: String,
    },
    Click {
        selector: String,
    },
    Fill {
        selector: String,
        text: String,
    },
    ReadText {
        selector: String,
    },
    ReadAllText {
        selector: String,
    },
    #[serde(rename_all = "camelCase")]
    Screenshot {
        full_page: bool,
    },
    #[serde(rename_all = "camelCase")]
    WaitFor {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        condition: WaitCondition,
        timeout_ms: u64,
    },
    Assert {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        assertion: AssertionType,
        expected: String,
    },
}

impl ToolCall {
    /// Tool name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Navigate { .. } => "navigate",
            ToolCall::Click { .. } => "click",
            ToolCall::Fill { .. } => "fill",
            ToolCall::ReadText { .. } => "readText",
            ToolCall::ReadAllText { .. } => "readAllText",
            ToolCall::Screenshot { .. } => "screenshot",
            ToolCall::WaitFor { .. } => "waitFor",
            ToolCall::Assert { .. } => "assert",
        }
    }

    /// Selector the call acts on, if any.
    pub fn selector(&self) -> Option<&str> {
        match self {
            ToolCall::Click { selector }
            | ToolCall::Fill { selector, .. }
            | ToolCall::ReadText { selector }
            | ToolCall::ReadAllText { selector } => Some(selector),
            ToolCall::WaitFor { selector, .. } | ToolCall::Assert { selector, .. } => {
                selector.as_deref()
            }
            ToolCall::Navigate { .. } | ToolCall::Screenshot { .. } => None,
        }
    }

    /// Arguments object alone, without the tool tag.
    pub fn arguments(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut value| value.get_mut("arguments").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }

    /// Rebuild a call from a tool name and its arguments object.
    pub fn from_parts(tool: &str, arguments: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "tool": tool, "arguments": arguments }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigateOutput {
    pub status: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickOutput {
    pub status: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOutput {
    pub status: String,
    pub selector: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadTextOutput {
    pub status: String,
    pub selector: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAllTextOutput {
    pub status: String,
    pub selector: String,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotOutput {
    pub status: String,
    pub path: String,
    pub image_bytes_base64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOutput {
    pub status: String,
    pub condition: WaitCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertOutput {
    pub status: String,
    pub actual: String,
}

/// Result payload of a successful tool call, tagged with its tool kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ToolOutput {
    Navigate(NavigateOutput),
    Click(ClickOutput),
    Fill(FillOutput),
    ReadText(ReadTextOutput),
    ReadAllText(ReadAllTextOutput),
    Screenshot(ScreenshotOutput),
    WaitFor(WaitOutput),
    Assert(AssertOutput),
}

impl ToolOutput {
    /// Text returned by read-style calls.
    pub fn text(&self) -> Option<&str> {
        match self {
            ToolOutput::ReadText(out) => Some(&out.text),
            _ => None,
        }
    }

    pub fn texts(&self) -> Option<&[String]> {
        match self {
            ToolOutput::ReadAllText(out) => Some(&out.texts),
            _ => None,
        }
    }
}

pub(crate) const STATUS_OK: &str = "ok";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_wire_shape() {
        let call = ToolCall::Fill {
            selector: "label=\"Email\"".into(),
            text: "a@b.c".into(),
        };
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["tool"], "fill");
        assert_eq!(value["arguments"]["text"], "a@b.c");
        assert_eq!(call.arguments(), value["arguments"]);
    }

    #[test]
    fn rebuilds_from_parts() {
        let call = ToolCall::from_parts("screenshot", json!({"fullPage": true})).unwrap();
        assert_eq!(call, ToolCall::Screenshot { full_page: true });
        let wait = ToolCall::from_parts(
            "waitFor",
            json!({"condition": "networkIdle", "timeoutMs": 500}),
        )
        .unwrap();
        assert_eq!(wait.selector(), None);
        assert!(ToolCall::from_parts("hover", json!({})).is_err());
    }

    #[test]
    fn output_carries_kind_tag() {
        let out = ToolOutput::ReadAllText(ReadAllTextOutput {
            status: STATUS_OK.into(),
            selector: "li".into(),
            texts: vec!["a".into(), "b".into()],
        });
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["kind"], "readAllText");
        assert_eq!(value["texts"], json!(["a", "b"]));
        let back: ToolOutput = serde_json::from_value(value).unwrap();
        assert_eq!(back.texts().map(|t| t.len()), Some(2));
    }
}
