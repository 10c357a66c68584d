//! Error types for browser tool calls

use thiserror::Error;

/// Failures a single tool call can produce.
///
/// The executor only cares about two questions: can the same call be tried
/// again ([`ActionError::is_retryable`]), and is the session gone for good
/// ([`ActionError::is_session_fatal`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Navigation timed out waiting for page load
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// Navigation was refused (unknown host, error page)
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Wait operation timed out
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Element exists but cannot take input right now (obscured, disabled, animating)
    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    /// Selector matched nothing on the live page
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Selector matched more than one element where exactly one is required
    #[error("Selector '{selector}' matched {count} elements")]
    AmbiguousMatch { selector: String, count: usize },

    /// Element cannot perform the requested action (fill on a button, ...)
    #[error("Action mismatch: {0}")]
    ActionMismatch(String),

    /// Selector expression could not be parsed
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Assertion step observed a different value
    #[error("Assertion failed: expected '{expected}', found '{actual}'")]
    AssertionFailed { expected: String, actual: String },

    /// Browser session crashed or was closed
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Protocol or transport hiccup
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable against the same selector
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::NavTimeout(_)
                | ActionError::WaitTimeout(_)
                | ActionError::NotInteractable(_)
                | ActionError::CdpIo(_)
        )
    }

    /// Check if the browser session can no longer be used
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ActionError::SessionClosed(_))
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::SessionClosed(_) | ActionError::Internal(_) => 3,
            ActionError::NavTimeout(_)
            | ActionError::NavigationFailed(_)
            | ActionError::CdpIo(_) => 2,
            ActionError::WaitTimeout(_)
            | ActionError::ElementNotFound(_)
            | ActionError::AmbiguousMatch { .. }
            | ActionError::AssertionFailed { .. } => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ActionError::NotInteractable("covered".into()).is_retryable());
        assert!(ActionError::WaitTimeout("slow".into()).is_retryable());
        assert!(!ActionError::ElementNotFound("#x".into()).is_retryable());
        assert!(!ActionError::AmbiguousMatch {
            selector: "button".into(),
            count: 3
        }
        .is_retryable());
        assert!(!ActionError::SessionClosed("crash".into()).is_retryable());
    }

    #[test]
    fn only_closed_session_is_fatal() {
        assert!(ActionError::SessionClosed("gone".into()).is_session_fatal());
        assert!(!ActionError::CdpIo("reset".into()).is_session_fatal());
        assert_eq!(ActionError::SessionClosed("gone".into()).severity(), 3);
    }
}
