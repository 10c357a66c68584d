//! Tool dispatch table.
//!
//! The single place a [`ToolCall`] is turned into a session method call.
//! Live execution and trace replay both go through here.

use std::time::Duration;

use tracing::debug;

use crate::errors::ActionError;
use crate::session::BrowserSession;
use crate::types::{ToolCall, ToolOutput};

pub async fn dispatch(
    session: &dyn BrowserSession,
    call: &ToolCall,
) -> Result<ToolOutput, ActionError> {
    debug!(tool = call.name(), selector = ?call.selector(), "dispatching tool call");
    match call {
        ToolCall::Navigate { url } => session.navigate(url).await.map(ToolOutput::Navigate),
        ToolCall::Click { selector } => session.click(selector).await.map(ToolOutput::Click),
        ToolCall::Fill { selector, text } => {
            session.fill(selector, text).await.map(ToolOutput::Fill)
        }
        ToolCall::ReadText { selector } => {
            session.read_text(selector).await.map(ToolOutput::ReadText)
        }
        ToolCall::ReadAllText { selector } => session
            .read_all_text(selector)
            .await
            .map(ToolOutput::ReadAllText),
        ToolCall::Screenshot { full_page } => session
            .screenshot(*full_page)
            .await
            .map(ToolOutput::Screenshot),
        ToolCall::WaitFor {
            selector,
            condition,
            timeout_ms,
        } => session
            .wait_for(
                selector.as_deref(),
                *condition,
                Duration::from_millis(*timeout_ms),
            )
            .await
            .map(ToolOutput::WaitFor),
        ToolCall::Assert {
            selector,
            assertion,
            expected,
        } => session
            .assert(selector.as_deref(), *assertion, expected)
            .await
            .map(ToolOutput::Assert),
    }
}
