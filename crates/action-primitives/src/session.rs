//! Browser session seam and its scoped ownership.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracecraft_core_types::{AssertionType, SessionId, WaitCondition};
use tracing::{debug, warn};

use crate::errors::ActionError;
use crate::snapshot::PageSnapshot;
use crate::types::{
    AssertOutput, ClickOutput, FillOutput, NavigateOutput, ReadAllTextOutput, ReadTextOutput,
    ScreenshotOutput, WaitOutput,
};

/// A live browser page driven one call at a time.
///
/// Implementations enforce exactly-one-match semantics for single-element
/// calls: a selector matching several elements fails with
/// [`ActionError::AmbiguousMatch`] instead of picking one.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn id(&self) -> &SessionId;

    async fn navigate(&self, url: &str) -> Result<NavigateOutput, ActionError>;

    async fn click(&self, selector: &str) -> Result<ClickOutput, ActionError>;

    async fn fill(&self, selector: &str, text: &str) -> Result<FillOutput, ActionError>;

    async fn read_text(&self, selector: &str) -> Result<ReadTextOutput, ActionError>;

    async fn read_all_text(&self, selector: &str) -> Result<ReadAllTextOutput, ActionError>;

    async fn screenshot(&self, full_page: bool) -> Result<ScreenshotOutput, ActionError>;

    async fn wait_for(
        &self,
        selector: Option<&str>,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<WaitOutput, ActionError>;

    async fn assert(
        &self,
        selector: Option<&str>,
        assertion: AssertionType,
        expected: &str,
    ) -> Result<AssertOutput, ActionError>;

    /// Capture the element data the locator works from.
    async fn snapshot(&self) -> Result<PageSnapshot, ActionError>;

    async fn close(&self) -> Result<(), ActionError>;
}

/// Creates independent sessions; one per run.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn BrowserSession>, ActionError>;
}

/// Exclusive owner of a run's browser session.
///
/// The session is created on first [`SessionScope::acquire`], reused for the
/// rest of the run and closed exactly once by [`SessionScope::release`].
pub struct SessionScope {
    factory: Arc<dyn SessionFactory>,
    session: Option<Arc<dyn BrowserSession>>,
    released: bool,
}

impl SessionScope {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            session: None,
            released: false,
        }
    }

    pub async fn acquire(&mut self) -> Result<Arc<dyn BrowserSession>, ActionError> {
        if self.released {
            return Err(ActionError::SessionClosed(
                "session scope already released".to_string(),
            ));
        }
        if let Some(session) = &self.session {
            return Ok(Arc::clone(session));
        }
        let session = self.factory.create().await?;
        debug!(session = %session.id(), "browser session created");
        self.session = Some(Arc::clone(&session));
        Ok(session)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some() && !self.released
    }

    /// Close the session if one was created. Safe to call more than once.
    pub async fn release(&mut self) -> Result<(), ActionError> {
        self.released = true;
        match self.session.take() {
            Some(session) => {
                debug!(session = %session.id(), "releasing browser session");
                session.close().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            warn!(session = %session.id(), "session scope dropped without release");
        }
    }
}
