//! Trace compiler
//!
//! Turns a frozen [`action_flow::ExecutionTrace`] into two artifacts: a
//! Playwright script that only ever acts through selectors classified as
//! safe, and a JSON export that carries the full trace for programmatic
//! replay. Compilation is pure; the same trace always yields the same bytes.

pub mod errors;
pub mod export;
pub mod locators;
pub mod script;

use action_flow::ExecutionTrace;
use tracing::debug;

pub use errors::CompileError;
pub use export::{
    export_trace, trace_from_export, trace_from_export_str, trace_from_export_value, ExportedStep,
    TraceExport, UsageNotes, EXPORT_FORMAT,
};
pub use locators::{render_locator, LocatorConstant, LocatorTable};
pub use script::render_script;

/// Output of one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Playwright script for Node.js.
    pub script: String,
    /// Pretty-printed [`TraceExport`] document.
    pub json_export: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeCompiler;

impl CodeCompiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, trace: &ExecutionTrace) -> Result<CompiledArtifact, CompileError> {
        let script = render_script(trace);
        let mut json_export = serde_json::to_string_pretty(&export_trace(trace))?;
        json_export.push('\n');
        debug!(
            run = %trace.run_id(),
            steps = trace.results().len(),
            script_bytes = script.len(),
            export_bytes = json_export.len(),
            "compiled trace"
        );
        Ok(CompiledArtifact {
            script,
            json_export,
        })
    }
}

/// Compile `trace` with the default compiler.
pub fn compile(trace: &ExecutionTrace) -> Result<CompiledArtifact, CompileError> {
    CodeCompiler::new().compile(trace)
}
