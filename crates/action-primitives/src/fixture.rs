//! Offline fixture browser.
//!
//! A [`SessionFactory`] whose pages come from a YAML or JSON site description
//! instead of a real browser. It follows the same contract as a live driver
//! (strict single-match, visibility and enablement checks, link navigation)
//! so runs against it are deterministic and need no network.
//!
//! ```yaml
//! pages:
//!   https://shop.test/:
//!     title: Shop
//!     nodes:
//!       - tag: a
//!         text: Pricing
//!         attributes: { href: /pricing }
//!       - tag: button
//!         text: Subscribe
//!         flaky: 2        # first two interactions fail transiently
//!   https://shop.test/pricing:
//!     title: Pricing
//!     slowLoads: 1        # first load times out
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracecraft_core_types::{AssertionType, SessionId, WaitCondition};
use tracing::debug;
use url::Url;

use crate::errors::ActionError;
use crate::query::SelectorQuery;
use crate::session::{BrowserSession, SessionFactory};
use crate::snapshot::{normalize_whitespace, PageSnapshot, SnapshotNode};
use crate::types::{
    AssertOutput, ClickOutput, FillOutput, NavigateOutput, ReadAllTextOutput, ReadTextOutput,
    ScreenshotOutput, WaitOutput, STATUS_OK,
};

/// 1x1 transparent PNG returned by fixture screenshots.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFixture {
    #[serde(default)]
    pub pages: BTreeMap<String, FixturePage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixturePage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<FixtureNode>,
    /// Navigating here kills the session.
    #[serde(default)]
    pub crash: bool,
    /// Number of initial loads that time out.
    #[serde(default)]
    pub slow_loads: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureNode {
    #[serde(flatten)]
    pub node: SnapshotNode,
    /// Number of initial interactions that fail as not interactable.
    #[serde(default)]
    pub flaky: u32,
}

impl SiteFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, page: FixturePage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ActionError> {
        serde_yaml::from_str(raw).map_err(|err| ActionError::Internal(format!("fixture yaml: {err}")))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ActionError> {
        serde_json::from_str(raw).map_err(|err| ActionError::Internal(format!("fixture json: {err}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ActionError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ActionError::Internal(format!("failed to read fixture {}: {err}", path.display()))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_yaml_str(&raw),
        }
    }

    /// Look a page up by url, tolerating a trailing slash mismatch.
    fn page_key(&self, url: &str) -> Option<&str> {
        let trimmed = url.trim_end_matches('/');
        self.pages
            .keys()
            .find(|key| key.as_str() == url || key.trim_end_matches('/') == trimmed)
            .map(String::as_str)
    }
}

impl FixturePage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node: SnapshotNode) -> Self {
        self.nodes.push(FixtureNode { node, flaky: 0 });
        self
    }

    pub fn with_flaky_node(mut self, node: SnapshotNode, failures: u32) -> Self {
        self.nodes.push(FixtureNode {
            node,
            flaky: failures,
        });
        self
    }

    pub fn crashing(mut self) -> Self {
        self.crash = true;
        self
    }

    pub fn with_slow_loads(mut self, loads: u32) -> Self {
        self.slow_loads = loads;
        self
    }
}

/// One call seen by a fixture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub session: SessionId,
    pub tool: &'static str,
    pub selector: Option<String>,
    pub error: Option<String>,
}

impl CallRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
struct BrowserLog {
    calls: Mutex<Vec<CallRecord>>,
    created: AtomicUsize,
    closed: AtomicUsize,
}

/// Session factory over a [`SiteFixture`]. Clones share the call log.
#[derive(Debug, Clone)]
pub struct FixtureBrowser {
    site: Arc<SiteFixture>,
    log: Arc<BrowserLog>,
}

impl FixtureBrowser {
    pub fn new(site: SiteFixture) -> Self {
        Self {
            site: Arc::new(site),
            log: Arc::new(BrowserLog::default()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ActionError> {
        SiteFixture::from_path(path).map(Self::new)
    }

    /// Every call made by every session, in order.
    pub fn call_log(&self) -> Vec<CallRecord> {
        self.log.calls.lock().clone()
    }

    pub fn sessions_created(&self) -> usize {
        self.log.created.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.log.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FixtureBrowser {
    async fn create(&self) -> Result<Arc<dyn BrowserSession>, ActionError> {
        self.log.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FixtureSession {
            id: SessionId::new(),
            site: Arc::clone(&self.site),
            log: Arc::clone(&self.log),
            state: Mutex::new(SessionState::default()),
        }))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current: Option<String>,
    closed: bool,
    values: HashMap<(String, usize), String>,
    flaky_used: HashMap<(String, usize), u32>,
    loads: HashMap<String, u32>,
    screenshots: u32,
}

pub struct FixtureSession {
    id: SessionId,
    site: Arc<SiteFixture>,
    log: Arc<BrowserLog>,
    state: Mutex<SessionState>,
}

impl FixtureSession {
    fn record<T>(&self, tool: &'static str, selector: Option<&str>, result: &Result<T, ActionError>) {
        self.log.calls.lock().push(CallRecord {
            session: self.id.clone(),
            tool,
            selector: selector.map(str::to_string),
            error: result.as_ref().err().map(ToString::to_string),
        });
    }

    fn ensure_open(state: &SessionState) -> Result<(), ActionError> {
        if state.closed {
            Err(ActionError::SessionClosed("fixture session is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn page<'a>(&'a self, state: &SessionState) -> Option<(&'a str, &'a FixturePage)> {
        let current = state.current.as_deref()?;
        let key = self.site.page_key(current)?;
        self.site.pages.get(key).map(|page| (key, page))
    }

    fn snapshot_of(&self, state: &SessionState) -> PageSnapshot {
        let Some((key, page)) = self.page(state) else {
            return PageSnapshot::blank();
        };
        let nodes = page
            .nodes
            .iter()
            .enumerate()
            .map(|(index, fixture)| {
                let mut node = fixture.node.clone();
                if let Some(value) = state.values.get(&(key.to_string(), index)) {
                    node.attributes.insert("value".to_string(), value.clone());
                }
                node
            })
            .collect();
        PageSnapshot::new(key, page.title.clone(), nodes)
    }

    fn select(snapshot: &PageSnapshot, selector: &str) -> Result<Vec<usize>, ActionError> {
        Ok(SelectorQuery::parse(selector)?.select(snapshot))
    }

    /// Resolve `selector` to exactly one node.
    fn locate_one(
        &self,
        state: &SessionState,
        selector: &str,
    ) -> Result<(PageSnapshot, usize), ActionError> {
        Self::ensure_open(state)?;
        let snapshot = self.snapshot_of(state);
        let matches = Self::select(&snapshot, selector)?;
        match matches.as_slice() {
            [] => Err(ActionError::ElementNotFound(selector.to_string())),
            [index] => Ok((snapshot, *index)),
            many => Err(ActionError::AmbiguousMatch {
                selector: selector.to_string(),
                count: many.len(),
            }),
        }
    }

    fn check_interactable(
        &self,
        state: &mut SessionState,
        snapshot: &PageSnapshot,
        index: usize,
    ) -> Result<(), ActionError> {
        let node = &snapshot.nodes[index];
        if !node.visible {
            return Err(ActionError::WaitTimeout(format!("<{}> never became visible", node.tag)));
        }
        if !node.enabled {
            return Err(ActionError::NotInteractable(format!("<{}> is disabled", node.tag)));
        }
        let flaky = self
            .page(state)
            .and_then(|(_, page)| page.nodes.get(index))
            .map(|fixture| fixture.flaky)
            .unwrap_or(0);
        let used = state
            .flaky_used
            .entry((snapshot.url.clone(), index))
            .or_insert(0);
        if *used < flaky {
            *used += 1;
            return Err(ActionError::NotInteractable(format!(
                "<{}> is covered by another element",
                node.tag
            )));
        }
        Ok(())
    }

    fn load(&self, state: &mut SessionState, url: &str) -> Result<NavigateOutput, ActionError> {
        Self::ensure_open(state)?;
        let target = match (&state.current, Url::parse(url)) {
            (_, Ok(parsed)) => parsed.to_string(),
            (Some(current), Err(_)) => Url::parse(current)
                .and_then(|base| base.join(url))
                .map(|joined| joined.to_string())
                .map_err(|err| ActionError::NavigationFailed(format!("{url}: {err}")))?,
            (None, Err(err)) => return Err(ActionError::NavigationFailed(format!("{url}: {err}"))),
        };
        let key = self
            .site
            .page_key(&target)
            .ok_or_else(|| ActionError::NavigationFailed(format!("no page at {target}")))?;
        let page = &self.site.pages[key];
        if page.crash {
            state.closed = true;
            return Err(ActionError::SessionClosed(format!("page crashed loading {key}")));
        }
        let loads = state.loads.entry(key.to_string()).or_insert(0);
        if *loads < page.slow_loads {
            *loads += 1;
            return Err(ActionError::NavTimeout(format!("{key} did not finish loading")));
        }
        state.current = Some(key.to_string());
        debug!(session = %self.id, url = key, "fixture page loaded");
        Ok(NavigateOutput {
            status: STATUS_OK.to_string(),
            url: key.to_string(),
            title: page.title.clone(),
        })
    }

    fn page_condition(&self, state: &SessionState, condition: WaitCondition) -> Result<(), ActionError> {
        if self.page(state).is_some() {
            Ok(())
        } else {
            Err(ActionError::WaitTimeout(format!("no page reached {condition}")))
        }
    }

    fn element_condition(
        &self,
        state: &SessionState,
        selector: &str,
        condition: WaitCondition,
    ) -> Result<(), ActionError> {
        let snapshot = self.snapshot_of(state);
        let matches = Self::select(&snapshot, selector)?;
        let visible = matches
            .iter()
            .filter(|index| snapshot.nodes[**index].visible)
            .count();
        let satisfied = match condition {
            WaitCondition::Visible | WaitCondition::Attached => {
                let count = if condition == WaitCondition::Visible {
                    visible
                } else {
                    matches.len()
                };
                if count > 1 {
                    return Err(ActionError::AmbiguousMatch {
                        selector: selector.to_string(),
                        count,
                    });
                }
                count == 1
            }
            WaitCondition::Hidden => visible == 0,
            WaitCondition::Detached => matches.is_empty(),
            _ => true,
        };
        if satisfied {
            Ok(())
        } else {
            Err(ActionError::WaitTimeout(format!("'{selector}' never became {condition}")))
        }
    }

    fn evaluate_assertion(
        &self,
        state: &SessionState,
        selector: Option<&str>,
        assertion: AssertionType,
        expected: &str,
    ) -> Result<AssertOutput, ActionError> {
        Self::ensure_open(state)?;
        let expected_norm = normalize_whitespace(expected);
        let (passed, actual) = match assertion {
            AssertionType::UrlContains => {
                let url = state.current.clone().unwrap_or_default();
                (url.contains(&expected_norm), url)
            }
            AssertionType::TitleContains => {
                let title = self.page(state).map(|(_, p)| p.title.clone()).unwrap_or_default();
                (title.contains(&expected_norm), title)
            }
            AssertionType::Hidden => {
                let selector = require_selector(selector)?;
                let snapshot = self.snapshot_of(state);
                let visible = Self::select(&snapshot, selector)?
                    .into_iter()
                    .any(|index| snapshot.nodes[index].visible);
                (!visible, if visible { "visible" } else { "hidden" }.to_string())
            }
            AssertionType::Visible => {
                let (snapshot, index) = self.locate_one(state, require_selector(selector)?)?;
                let visible = snapshot.nodes[index].visible;
                (visible, if visible { "visible" } else { "hidden" }.to_string())
            }
            AssertionType::TextEquals | AssertionType::TextContains => {
                let (snapshot, index) = self.locate_one(state, require_selector(selector)?)?;
                let text = node_text(&snapshot.nodes[index]);
                let passed = if assertion == AssertionType::TextEquals {
                    text == expected_norm
                } else {
                    text.contains(&expected_norm)
                };
                (passed, text)
            }
        };
        if passed {
            Ok(AssertOutput {
                status: "passed".to_string(),
                actual,
            })
        } else {
            Err(ActionError::AssertionFailed {
                expected: expected.to_string(),
                actual,
            })
        }
    }
}

fn require_selector(selector: Option<&str>) -> Result<&str, ActionError> {
    selector
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ActionError::InvalidSelector("element check without selector".to_string()))
}

fn node_text(node: &SnapshotNode) -> String {
    let text = node.visible_text();
    if text.is_empty() {
        node.attributes
            .get("value")
            .map(|v| normalize_whitespace(v))
            .unwrap_or_default()
    } else {
        text
    }
}

#[async_trait]
impl BrowserSession for FixtureSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn navigate(&self, url: &str) -> Result<NavigateOutput, ActionError> {
        let result = {
            let mut state = self.state.lock();
            self.load(&mut state, url)
        };
        self.record("navigate", None, &result);
        result
    }

    async fn click(&self, selector: &str) -> Result<ClickOutput, ActionError> {
        let result = {
            let mut state = self.state.lock();
            self.locate_one(&state, selector).and_then(|(snapshot, index)| {
                self.check_interactable(&mut state, &snapshot, index)?;
                if let Some(href) = snapshot.nodes[index].attributes.get("href") {
                    self.load(&mut state, href)?;
                }
                Ok(ClickOutput {
                    status: STATUS_OK.to_string(),
                    selector: selector.to_string(),
                })
            })
        };
        self.record("click", Some(selector), &result);
        result
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<FillOutput, ActionError> {
        let result = {
            let mut state = self.state.lock();
            self.locate_one(&state, selector).and_then(|(snapshot, index)| {
                self.check_interactable(&mut state, &snapshot, index)?;
                let node = &snapshot.nodes[index];
                if !node.is_editable() {
                    return Err(ActionError::ActionMismatch(format!(
                        "<{}> does not accept text input",
                        node.tag
                    )));
                }
                state
                    .values
                    .insert((snapshot.url.clone(), index), text.to_string());
                Ok(FillOutput {
                    status: STATUS_OK.to_string(),
                    selector: selector.to_string(),
                    text: text.to_string(),
                })
            })
        };
        self.record("fill", Some(selector), &result);
        result
    }

    async fn read_text(&self, selector: &str) -> Result<ReadTextOutput, ActionError> {
        let result = {
            let state = self.state.lock();
            self.locate_one(&state, selector).and_then(|(snapshot, index)| {
                let node = &snapshot.nodes[index];
                if !node.visible {
                    return Err(ActionError::WaitTimeout(format!(
                        "<{}> never became visible",
                        node.tag
                    )));
                }
                Ok(ReadTextOutput {
                    status: STATUS_OK.to_string(),
                    selector: selector.to_string(),
                    text: node_text(node),
                })
            })
        };
        self.record("readText", Some(selector), &result);
        result
    }

    async fn read_all_text(&self, selector: &str) -> Result<ReadAllTextOutput, ActionError> {
        let result = {
            let state = self.state.lock();
            Self::ensure_open(&state).and_then(|_| {
                let snapshot = self.snapshot_of(&state);
                let texts: Vec<String> = Self::select(&snapshot, selector)?
                    .into_iter()
                    .map(|index| &snapshot.nodes[index])
                    .filter(|node| node.visible)
                    .map(node_text)
                    .collect();
                if texts.is_empty() {
                    return Err(ActionError::ElementNotFound(selector.to_string()));
                }
                Ok(ReadAllTextOutput {
                    status: STATUS_OK.to_string(),
                    selector: selector.to_string(),
                    texts,
                })
            })
        };
        self.record("readAllText", Some(selector), &result);
        result
    }

    async fn screenshot(&self, full_page: bool) -> Result<ScreenshotOutput, ActionError> {
        let result = {
            let mut state = self.state.lock();
            Self::ensure_open(&state).map(|_| {
                state.screenshots += 1;
                let suffix = if full_page { "-full" } else { "" };
                ScreenshotOutput {
                    status: STATUS_OK.to_string(),
                    path: format!("screenshot-{}{}.png", state.screenshots, suffix),
                    image_bytes_base64: Base64.encode(PLACEHOLDER_PNG),
                }
            })
        };
        self.record("screenshot", None, &result);
        result
    }

    async fn wait_for(
        &self,
        selector: Option<&str>,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<WaitOutput, ActionError> {
        let checked = {
            let state = self.state.lock();
            Self::ensure_open(&state).and_then(|_| match condition {
                WaitCondition::Duration => Ok(()),
                c if c.is_element_scoped() => {
                    self.element_condition(&state, require_selector(selector)?, c)
                }
                c => self.page_condition(&state, c),
            })
        };
        if checked.is_ok() && condition == WaitCondition::Duration {
            tokio::time::sleep(timeout).await;
        }
        let result = checked.map(|_| WaitOutput {
            status: STATUS_OK.to_string(),
            condition,
        });
        self.record("waitFor", selector, &result);
        result
    }

    async fn assert(
        &self,
        selector: Option<&str>,
        assertion: AssertionType,
        expected: &str,
    ) -> Result<AssertOutput, ActionError> {
        let result = {
            let state = self.state.lock();
            self.evaluate_assertion(&state, selector, assertion, expected)
        };
        self.record("assert", selector, &result);
        result
    }

    async fn snapshot(&self) -> Result<PageSnapshot, ActionError> {
        let state = self.state.lock();
        Self::ensure_open(&state)?;
        Ok(self.snapshot_of(&state))
    }

    async fn close(&self) -> Result<(), ActionError> {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            self.log.closed.fetch_add(1, Ordering::SeqCst);
            debug!(session = %self.id, "fixture session closed");
        }
        Ok(())
    }
}
