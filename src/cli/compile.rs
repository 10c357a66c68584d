use std::path::{Path, PathBuf};

use action_flow::ExecutionTrace;
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::info;
use trace_compiler::{compile, trace_from_export_value, CompiledArtifact};

use crate::cli::context::CliContext;

pub const TRACE_FILE: &str = "trace.json";
pub const SCRIPT_FILE: &str = "script.js";
pub const EXPORT_FILE: &str = "export.json";

#[derive(Args, Clone, Debug)]
pub struct CompileArgs {
    /// Saved trace (trace.json) or JSON export (export.json)
    pub input: PathBuf,

    /// Directory for script.js and export.json (defaults to the input's directory)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Print the script to stdout instead of writing files
    #[arg(long)]
    pub stdout: bool,
}

/// Where one compilation was written.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenArtifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<PathBuf>,
    pub script: PathBuf,
    pub export: PathBuf,
}

pub async fn cmd_compile(args: CompileArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    let trace = parse_trace_document(&raw)
        .with_context(|| format!("parsing {}", args.input.display()))?;
    let artifact = compile(&trace)?;

    if args.stdout {
        print!("{}", artifact.script);
        return Ok(());
    }

    let out_dir = match args.out_dir {
        Some(dir) => dir,
        None => args
            .input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let written = write_artifacts(&out_dir, None, &artifact).await?;
    ctx.output().emit(&written, || {
        println!("Compiled run {} ({})", trace.run_id(), trace.status());
        println!("- script: {}", written.script.display());
        println!("- export: {}", written.export.display());
    })
}

/// Accept either a serialized [`ExecutionTrace`] or a JSON export.
pub fn parse_trace_document(raw: &str) -> Result<ExecutionTrace> {
    let value: Value = serde_json::from_str(raw)?;
    if value.get("results").is_some() {
        Ok(serde_json::from_value(value)?)
    } else if value.get("steps").is_some() {
        Ok(trace_from_export_value(&value)?)
    } else {
        bail!("document is neither a trace (results) nor an export (steps)")
    }
}

/// Write the artifacts (and optionally the raw trace) into `dir`.
pub async fn write_artifacts(
    dir: &Path,
    trace: Option<&ExecutionTrace>,
    artifact: &CompiledArtifact,
) -> Result<WrittenArtifacts> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let trace_path = match trace {
        Some(trace) => {
            let path = dir.join(TRACE_FILE);
            let mut raw = serde_json::to_string_pretty(trace)?;
            raw.push('\n');
            fs::write(&path, raw)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    let script = dir.join(SCRIPT_FILE);
    fs::write(&script, &artifact.script)
        .await
        .with_context(|| format!("writing {}", script.display()))?;
    let export = dir.join(EXPORT_FILE);
    fs::write(&export, &artifact.json_export)
        .await
        .with_context(|| format!("writing {}", export.display()))?;

    info!(dir = %dir.display(), "wrote compiled artifacts");
    Ok(WrittenArtifacts {
        trace: trace_path,
        script,
        export,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::{RunStatus, StepResult, TraceBuilder};
    use agent_core::PlanStep;
    use trace_compiler::export_trace;

    fn trace() -> ExecutionTrace {
        let mut builder = TraceBuilder::new("open the page");
        builder.push(StepResult::skipped(
            &PlanStep::navigate("https://example.com").with_id("step-1"),
            "run cancelled",
        ));
        builder.finish(RunStatus::Aborted)
    }

    #[test]
    fn both_document_shapes_are_accepted() {
        let trace = trace();
        let as_trace = serde_json::to_string(&trace).unwrap();
        let as_export = serde_json::to_string(&export_trace(&trace)).unwrap();
        assert_eq!(parse_trace_document(&as_trace).unwrap(), trace);
        assert_eq!(parse_trace_document(&as_export).unwrap(), trace);
        assert!(parse_trace_document("{\"other\": 1}").is_err());
    }
}
