//! Programmatic replay of a JSON trace export
//!
//! Every step that succeeded when the trace was recorded is re-dispatched, in
//! index order, through the same dispatch table live runs use. String
//! arguments may carry `{{key}}` placeholders that are substituted first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use action_primitives::{dispatch, SessionFactory, SessionScope, ToolCall, ToolOutput};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use trace_compiler::{ExportedStep, TraceExport};

/// Replays exported traces against sessions from a factory.
pub struct TraceReplayer {
    sessions: Arc<dyn SessionFactory>,
    overrides: BTreeMap<String, String>,
    fail_fast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayedStep {
    pub index: usize,
    pub tool: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ToolOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Results from one replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub success: bool,
    pub replayed: Vec<ReplayedStep>,
    /// Indexes left out because they did not succeed originally.
    pub not_replayable: Vec<usize>,
    /// Set when the replay stopped before the last step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<usize>,
}

impl ReplayReport {
    pub fn failures(&self) -> usize {
        self.replayed.iter().filter(|step| !step.success).count()
    }
}

impl TraceReplayer {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            sessions,
            overrides: BTreeMap::new(),
            fail_fast: false,
        }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub async fn replay(&self, export: &TraceExport) -> Result<ReplayReport> {
        let mut scope = SessionScope::new(Arc::clone(&self.sessions));
        let outcome = self.replay_in(&mut scope, export).await;
        if let Err(err) = scope.release().await {
            warn!(%err, "failed to release replay session");
        }
        outcome
    }

    async fn replay_in(&self, scope: &mut SessionScope, export: &TraceExport) -> Result<ReplayReport> {
        let mut report = ReplayReport {
            success: true,
            replayed: Vec::new(),
            not_replayable: Vec::new(),
            stopped_at: None,
        };

        for step in &export.steps {
            if report.stopped_at.is_some() {
                break;
            }
            let Some(call) = self.replayable_call(step)? else {
                report.not_replayable.push(step.index);
                continue;
            };

            let session = scope
                .acquire()
                .await
                .context("failed to open a browser session for replay")?;
            let started = Instant::now();
            let outcome = dispatch(session.as_ref(), &call).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    info!(index = step.index, tool = call.name(), "replayed step");
                    report.replayed.push(ReplayedStep {
                        index: step.index,
                        tool: call.name().to_string(),
                        success: true,
                        output: Some(output),
                        error: None,
                        duration_ms,
                    });
                }
                Err(err) => {
                    warn!(index = step.index, tool = call.name(), %err, "replayed step failed");
                    report.success = false;
                    if self.fail_fast || err.is_session_fatal() {
                        report.stopped_at = Some(step.index);
                    }
                    report.replayed.push(ReplayedStep {
                        index: step.index,
                        tool: call.name().to_string(),
                        success: false,
                        output: None,
                        error: Some(err.to_string()),
                        duration_ms,
                    });
                }
            }
        }

        Ok(report)
    }

    fn replayable_call(&self, step: &ExportedStep) -> Result<Option<ToolCall>> {
        let Some(tool) = step.tool.as_deref() else {
            return Ok(None);
        };
        if !step.success {
            return Ok(None);
        }
        let arguments = substitute(&step.arguments, &self.overrides);
        let call = ToolCall::from_parts(tool, arguments)
            .with_context(|| format!("step {} has unusable arguments for '{tool}'", step.index))?;
        Ok(Some(call))
    }
}

/// Replace `{{key}}` in every string of `value`. Unknown keys stay as written.
pub fn substitute(value: &Value, overrides: &BTreeMap<String, String>) -> Value {
    match value {
        Value::String(raw) => Value::String(substitute_str(raw, overrides)),
        Value::Array(items) => Value::Array(items.iter().map(|item| substitute(item, overrides)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), substitute(item, overrides)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(raw: &str, overrides: &BTreeMap<String, String>) -> String {
    let mut out = raw.to_string();
    for (key, replacement) in overrides {
        out = out.replace(&format!("{{{{{key}}}}}"), replacement);
    }
    out
}

/// Parse `key=value` pairs from the command line.
pub fn parse_overrides(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut overrides = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("override '{pair}' is not key=value"))?;
        let key = key.trim();
        anyhow::ensure!(!key.is_empty(), "override '{pair}' has an empty key");
        overrides.insert(key.to_string(), value.to_string());
    }
    Ok(overrides)
}
